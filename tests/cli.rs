//! Exercises the compiled binary directly, checking the process exit code
//! for each class of failure the CLI reports.
//!
//! `process::exit` codes are truncated to an unsigned byte by the OS before
//! a parent process observes them (`exit(-1)` arrives as `255`, `exit(-2)`
//! as `254`), so the assertions below check for the truncated values rather
//! than the signed ones `bcvm.rs` passes to `process::exit`.

use std::io::Write as _;
use std::process::Command;

use bcvm::writer::ModuleWriter;

fn bcvm_bin() -> &'static str {
    env!("CARGO_BIN_EXE_bcvm")
}

fn write_fixture(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp fixture file");
    file.write_all(bytes).expect("write fixture bytes");
    file
}

#[test]
fn no_arguments_exits_zero() {
    let status = Command::new(bcvm_bin()).status().expect("spawn bcvm");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn unreadable_file_exits_zero() {
    let status = Command::new(bcvm_bin())
        .arg("/nonexistent/path/bcvm-fixture-does-not-exist")
        .status()
        .expect("spawn bcvm");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn load_failure_exits_negative_one() {
    let mut w = ModuleWriter::new();
    w.function("not_main", "void", 0, vec![], &[0xb1]);
    let file = write_fixture(&w.finish());

    let status = Command::new(bcvm_bin())
        .arg(file.path())
        .status()
        .expect("spawn bcvm");
    assert_eq!(status.code(), Some(255));
}

#[test]
fn missing_function_body_exits_negative_one() {
    let mut w = ModuleWriter::new();
    let ghost_index = w.next_const_index();
    let (hi, lo) = ((ghost_index >> 8) as u8, ghost_index as u8);
    // A function constant with no bytecode looks built-in to the engine,
    // but isn't one of the three fixed built-in slots.
    w.function("ghost", "void", 0, vec![], &[]);
    w.function("main", "void", 0, vec![], &[0xb8, hi, lo, 0xb1]);
    let file = write_fixture(&w.finish());

    let status = Command::new(bcvm_bin())
        .arg(file.path())
        .status()
        .expect("spawn bcvm");
    assert_eq!(status.code(), Some(255));
}

#[test]
fn unknown_opcode_exits_negative_two() {
    let mut w = ModuleWriter::new();
    w.function("main", "void", 0, vec![], &[0xff]);
    let file = write_fixture(&w.finish());

    let status = Command::new(bcvm_bin())
        .arg(file.path())
        .status()
        .expect("spawn bcvm");
    assert_eq!(status.code(), Some(254));
}
