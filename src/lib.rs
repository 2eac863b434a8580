//! A stack-based bytecode virtual machine for a small statically-typed
//! scripting language, modeled after a subset of the JVM instruction set.
//!
//! The crate is organized bottom-up: [`types`] and [`symbol`]/[`constant`]
//! model the data a [`module::Module`] is made of; [`arena`] and [`frame`]
//! supply the allocator and activation records the [`engine`] runs against;
//! [`loader`] turns a raw byte stream into a `Module`, and [`engine::run`]
//! executes one.

#![deny(clippy::print_stderr)]

/// The VM's uniform operand word. Every local, stack slot, and constant
/// number is this width.
pub type VmInt = i32;

pub mod arena;
pub mod constant;
pub mod engine;
pub mod error;
pub mod frame;
pub mod loader;
pub mod module;
pub mod opcode;
pub mod symbol;
pub mod types;

/// Byte-stream fixture builder used by this crate's own tests and by
/// integration tests under `tests/`. Not part of the VM itself.
pub mod writer;
