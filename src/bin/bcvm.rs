//! Command-line entry point: load a bytecode file, run it, report failures
//! through the process exit code rather than a panic.
//!
//! Exit codes: `0` for a clean run, a missing/unreadable file, or no
//! arguments at all; `-1` for a missing `main` or a function constant with
//! no body; `-2` for an unknown opcode.

#![deny(clippy::expect_used)]

use std::{env, fs, process};

use bcvm::error::EngineError;
use bcvm::{engine, loader};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(0);
    }

    let path = &args[1];
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("bcvm: can not read '{path}': {e}");
            process::exit(0);
        }
    };

    let module = match loader::load(&bytes) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("bcvm: {e}");
            process::exit(-1);
        }
    };

    if let Err(e) = engine::run(&module) {
        eprintln!("bcvm: {e}");
        let code = match e {
            EngineError::UnknownOpcode(_) => -2,
            EngineError::MissingFunctionBody(_) | EngineError::FrameTooLarge { .. } => -1,
        };
        process::exit(code);
    }
}

fn print_usage(prog: &str) {
    println!("bcvm {VERSION}");
    println!("usage: {prog} <bytecode-file>");
}
