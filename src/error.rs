//! Error types for module loading and execution.
//!
//! Following the crate's own idiom for closed, small error enums: plain
//! `Display`/`Error` impls rather than a derive macro.

use std::fmt;

/// Fatal errors raised while decoding a bytecode stream into a [`crate::module::Module`].
///
/// Every variant corresponds to a fatal decode failure: truncated input, an
/// unknown type or constant kind, an unresolved type name, or a missing
/// `main` function.
#[derive(Debug)]
pub enum LoadError {
    /// The stream ended before the declared structure was fully read.
    UnexpectedEof,
    /// A type's `kind` byte did not match `1` (simple), `2` (function), or `3` (union).
    UnknownTypeKind(u8),
    /// A constant's `constKind` byte did not match `1`, `2`, or `3`.
    UnknownConstKind(u8),
    /// A type or function reference named a type that never appeared in the type table.
    UnresolvedTypeName(String),
    /// No function symbol named `main` was present in the constant pool.
    MissingMain,
    /// I/O failure reading the bytecode file from disk.
    Io(std::io::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnexpectedEof => write!(f, "truncated bytecode stream"),
            LoadError::UnknownTypeKind(k) => write!(f, "unknown type kind: {}", k),
            LoadError::UnknownConstKind(k) => write!(f, "unknown constant kind: {}", k),
            LoadError::UnresolvedTypeName(name) => {
                write!(f, "unresolved type name: '{}'", name)
            }
            LoadError::MissingMain => write!(f, "module has no 'main' function"),
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Fatal errors raised by the dispatch loop while executing a loaded module.
///
/// Unlike [`LoadError`], these are detected mid-execution: the frame chain at
/// the point of failure is simply dropped, there is no recovery path.
#[derive(Debug)]
pub enum EngineError {
    /// The byte at the instruction pointer did not match any known opcode.
    UnknownOpcode(u8),
    /// A non-built-in function constant whose symbol carries no bytecode.
    MissingFunctionBody(String),
    /// A single activation record did not fit in one arena block.
    FrameTooLarge { needed: usize, capacity: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownOpcode(op) => write!(f, "unknown op code: {:#x}", op),
            EngineError::MissingFunctionBody(name) => {
                write!(f, "can not find code for function '{}'", name)
            }
            EngineError::FrameTooLarge { needed, capacity } => write!(
                f,
                "frame of {} bytes does not fit in a {}-byte arena block",
                needed, capacity
            ),
        }
    }
}

impl std::error::Error for EngineError {}
