//! LIFO region allocator for activation records.
//!
//! A grow-only sequence of fixed-size blocks plus a cursor over the active
//! one. Each allocation writes its pre-allocation offset immediately after
//! its own payload, forming an implicit LIFO stack inside each block — that
//! trailing offset word is how [`Arena::deallocate`] recovers the previous
//! cursor position without walking anything.
//!
//! Allocations are expressed as byte offsets into an owned `Vec<u8>`, sliced
//! rather than reached through a typed pointer.

use crate::error::EngineError;
use std::env;

/// Width of the trailing bookkeeping word written after each allocation.
pub const OFFSET_WORD_SIZE: usize = 4;

/// Fallback block capacity when `BCVM_ARENA_BLOCK_SIZE` is unset or invalid.
pub const DEFAULT_ARENA_BLOCK_SIZE: usize = 4096;

const ARENA_BLOCK_SIZE_ENV: &str = "BCVM_ARENA_BLOCK_SIZE";

#[derive(Debug)]
struct Block {
    payload: Vec<u8>,
    offset: usize,
}

impl Block {
    fn new(capacity: usize) -> Self {
        Self {
            payload: vec![0u8; capacity],
            offset: 0,
        }
    }
}

/// A handle to one allocation's byte range. Opaque outside this module:
/// callers never compute addresses themselves, only index through
/// [`Arena::payload`]/[`Arena::payload_mut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocId {
    block: usize,
    start: usize,
    len: usize,
}

/// The arena itself: an ordered sequence of blocks and a cursor.
#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Block>,
    pos: usize,
    block_size: usize,
}

impl Arena {
    /// Create an arena using the block size from `BCVM_ARENA_BLOCK_SIZE`,
    /// falling back to [`DEFAULT_ARENA_BLOCK_SIZE`].
    pub fn new() -> Self {
        Self::with_block_size(block_size_from_env())
    }

    /// Create an arena with an explicit block size, bypassing the
    /// environment override. Useful for tests that want a small block to
    /// exercise block-growth behavior cheaply.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: vec![Block::new(block_size)],
            pos: 0,
            block_size,
        }
    }

    /// `(active block index, active block's write offset)` — this tuple
    /// returns to its pre-call value after a balanced allocate/deallocate
    /// pair, however many nested allocations happened in between.
    pub fn position(&self) -> (usize, usize) {
        (self.pos, self.blocks[self.pos].offset)
    }

    /// Acquire `n` bytes in one contiguous slab.
    pub fn allocate(&mut self, n: usize) -> Result<AllocId, EngineError> {
        if n + OFFSET_WORD_SIZE > self.block_size {
            return Err(EngineError::FrameTooLarge {
                needed: n + OFFSET_WORD_SIZE,
                capacity: self.block_size,
            });
        }

        if self.blocks[self.pos].offset + n + OFFSET_WORD_SIZE > self.block_size {
            if self.pos + 1 < self.blocks.len() {
                self.pos += 1;
                self.blocks[self.pos].offset = 0;
            } else {
                self.blocks.push(Block::new(self.block_size));
                self.pos = self.blocks.len() - 1;
            }
        }

        let block = &mut self.blocks[self.pos];
        let last_offset = block.offset;
        let start = block.offset;

        block.offset += n;
        let word_start = block.offset;
        block.payload[word_start..word_start + OFFSET_WORD_SIZE]
            .copy_from_slice(&(last_offset as u32).to_le_bytes());
        block.offset += OFFSET_WORD_SIZE;

        Ok(AllocId {
            block: self.pos,
            start,
            len: n,
        })
    }

    /// Return the most recent allocation to the arena. Must be called in
    /// exact reverse order of [`Arena::allocate`]; the arena has no way to
    /// detect a mismatched return.
    pub fn deallocate(&mut self) {
        let block = &mut self.blocks[self.pos];
        let word_start = block.offset - OFFSET_WORD_SIZE;
        let prev_offset = u32::from_le_bytes(
            block.payload[word_start..word_start + OFFSET_WORD_SIZE]
                .try_into()
                .expect("offset word is exactly 4 bytes"),
        ) as usize;
        block.offset = prev_offset;

        if block.offset == 0 && self.pos > 0 {
            self.pos -= 1;
        }
    }

    pub fn payload(&self, id: AllocId) -> &[u8] {
        &self.blocks[id.block].payload[id.start..id.start + id.len]
    }

    pub fn payload_mut(&mut self, id: AllocId) -> &mut [u8] {
        &mut self.blocks[id.block].payload[id.start..id.start + id.len]
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

fn block_size_from_env() -> usize {
    env::var(ARENA_BLOCK_SIZE_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > OFFSET_WORD_SIZE)
        .unwrap_or(DEFAULT_ARENA_BLOCK_SIZE)
}

/// Read a little-endian `i32` word at `word_index` (not byte index) from `buf`.
pub fn read_word(buf: &[u8], word_index: usize) -> i32 {
    let o = word_index * 4;
    i32::from_le_bytes(buf[o..o + 4].try_into().expect("word is 4 bytes"))
}

/// Write a little-endian `i32` word at `word_index` (not byte index) into `buf`.
pub fn write_word(buf: &mut [u8], word_index: usize, value: i32) {
    let o = word_index * 4;
    buf[o..o + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_deallocate_is_a_no_op_on_position() {
        let mut arena = Arena::with_block_size(256);
        let before = arena.position();
        let id = arena.allocate(32).unwrap();
        assert_ne!(arena.position(), before);
        let _ = arena.payload(id);
        arena.deallocate();
        assert_eq!(arena.position(), before);
    }

    #[test]
    fn nested_allocations_unwind_in_lifo_order() {
        let mut arena = Arena::with_block_size(256);
        let before = arena.position();

        let mut ids = Vec::new();
        for _ in 0..9 {
            ids.push(arena.allocate(8).unwrap());
        }
        for _ in 0..9 {
            arena.deallocate();
        }

        assert_eq!(arena.position(), before);
    }

    #[test]
    fn allocation_grows_into_a_new_block_when_full() {
        let mut arena = Arena::with_block_size(32);
        let id1 = arena.allocate(16).unwrap();
        assert_eq!(arena.position().0, 0);
        let id2 = arena.allocate(16).unwrap();
        assert_eq!(arena.position().0, 1);
        assert_ne!(id1, id2);

        arena.deallocate();
        assert_eq!(arena.position().0, 0);
        arena.deallocate();
        assert_eq!(arena.position(), (0, 0));
    }

    #[test]
    fn reused_block_is_picked_up_on_regrowth() {
        let mut arena = Arena::with_block_size(32);
        arena.allocate(16).unwrap();
        arena.allocate(16).unwrap(); // grows to block 1
        arena.deallocate();
        arena.deallocate(); // back to block 0, offset 0

        arena.allocate(16).unwrap();
        let before_growth_len = 2; // blocks allocated so far
        arena.allocate(16).unwrap(); // should reuse block 1, not allocate a third
        assert_eq!(arena_block_count(&arena), before_growth_len);
    }

    fn arena_block_count(arena: &Arena) -> usize {
        arena.blocks.len()
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut arena = Arena::with_block_size(16);
        let err = arena.allocate(64).unwrap_err();
        assert!(matches!(err, EngineError::FrameTooLarge { .. }));
    }

    #[test]
    fn read_write_word_round_trip() {
        let mut buf = vec![0u8; 16];
        write_word(&mut buf, 2, -42);
        assert_eq!(read_word(&buf, 2), -42);
    }
}
