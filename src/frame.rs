//! Per-call activation record.
//!
//! A frame's variable-length parts — locals and the operand stack — live in
//! one arena allocation. The small fixed fields (bytecode reference, resume
//! site, the operand-stack top index) are plain Rust struct fields rather
//! than bytes packed into the same slab.
//!
//! There is no explicit link to the caller's frame. The engine's
//! `Vec<Frame>` call stack already is that chain: push/pop order matches
//! LIFO call/return nesting, so a navigation-only pointer field would be
//! redundant.

use crate::arena::{self, AllocId, Arena};
use crate::symbol::FunctionSymbol;

/// One activation record.
#[derive(Debug)]
pub struct Frame<'m> {
    bytecode: &'m [u8],
    function_name: &'m str,
    /// Position of the next instruction to execute in this frame's own
    /// bytecode. While this frame is the active top of the call stack the
    /// dispatch loop advances it after every instruction; while it is
    /// suspended as a caller, it already points just past the
    /// `invokestatic` that made the call, which is exactly the resume site
    /// the engine jumps back to on return.
    ip: usize,
    alloc: AllocId,
    num_locals: usize,
    /// Index of the top element; `-1` when the operand stack is empty.
    top: i32,
}

impl<'m> Frame<'m> {
    /// Allocate and initialize a new frame for `function` from `arena`.
    pub fn create(
        arena: &mut Arena,
        function: &'m FunctionSymbol,
    ) -> Result<Self, crate::error::EngineError> {
        let num_locals = function.num_vars();
        let op_stack_capacity = function.op_stack_size;
        let words = num_locals + op_stack_capacity;
        let alloc = arena.allocate(words * 4)?;

        Ok(Self {
            bytecode: &function.bytecode,
            function_name: &function.name,
            ip: 0,
            alloc,
            num_locals,
            top: -1,
        })
    }

    /// Release this frame's storage back to the arena. Must be called in
    /// exact LIFO order with [`Frame::create`].
    pub fn destroy(self, arena: &mut Arena) {
        arena.deallocate();
    }

    pub fn bytecode(&self) -> &'m [u8] {
        self.bytecode
    }

    pub fn function_name(&self) -> &'m str {
        self.function_name
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn set_ip(&mut self, index: usize) {
        self.ip = index;
    }

    pub fn get_local(&self, arena: &Arena, index: usize) -> i32 {
        arena::read_word(arena.payload(self.alloc), index)
    }

    pub fn set_local(&self, arena: &mut Arena, index: usize, value: i32) {
        arena::write_word(arena.payload_mut(self.alloc), index, value)
    }

    /// Push onto the operand stack. No bounds check: the loader's fixed
    /// 20-word capacity override is assumed to be enough for any function
    /// the loader accepts.
    pub fn push(&mut self, arena: &mut Arena, value: i32) {
        self.top += 1;
        let word = self.num_locals + self.top as usize;
        arena::write_word(arena.payload_mut(self.alloc), word, value);
    }

    /// `return opstack.data[top--]`.
    pub fn pop(&mut self, arena: &Arena) -> i32 {
        let word = self.num_locals + self.top as usize;
        let value = arena::read_word(arena.payload(self.alloc), word);
        self.top -= 1;
        value
    }

    /// Current operand-stack height.
    pub fn stack_height(&self) -> i32 {
        self.top + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FunctionSymbol, VarSymbol};

    fn make_fn(name: &str, num_vars: usize, bytecode: Vec<u8>) -> FunctionSymbol {
        let vars = (0..num_vars)
            .map(|i| VarSymbol::new(format!("v{i}"), 6))
            .collect();
        FunctionSymbol::new(name, 0, vars, bytecode)
    }

    #[test]
    fn push_pop_round_trips() {
        let mut arena = Arena::with_block_size(256);
        let f = make_fn("main", 2, vec![0xb1]);
        let mut frame = Frame::create(&mut arena, &f).unwrap();

        assert_eq!(frame.stack_height(), 0);
        frame.push(&mut arena, 7);
        frame.push(&mut arena, 9);
        assert_eq!(frame.stack_height(), 2);
        assert_eq!(frame.pop(&arena), 9);
        assert_eq!(frame.pop(&arena), 7);
        assert_eq!(frame.stack_height(), 0);

        frame.destroy(&mut arena);
    }

    #[test]
    fn locals_are_independently_addressable() {
        let mut arena = Arena::with_block_size(256);
        let f = make_fn("main", 3, vec![]);
        let frame = Frame::create(&mut arena, &f).unwrap();

        frame.set_local(&mut arena, 0, 10);
        frame.set_local(&mut arena, 1, 20);
        frame.set_local(&mut arena, 2, 30);

        assert_eq!(frame.get_local(&arena, 0), 10);
        assert_eq!(frame.get_local(&arena, 1), 20);
        assert_eq!(frame.get_local(&arena, 2), 30);

        frame.destroy(&mut arena);
    }
}
