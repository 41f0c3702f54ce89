//! The message arena.
//!
//! One fixed-capacity buffer serves every message of every session. Per
//! message it is split into an input view `[0, payload)` and a response view
//! `[payload, capacity)`; the two share storage but never overlap.

use std::fmt;

use crate::error::ArenaError;
use crate::response::{format_bounded, ResponseWriter};

/// Default arena capacity.
pub const DEFAULT_ARENA_CAPACITY: usize = 0x400;

/// Fixed-capacity request/response buffer.
#[derive(Debug)]
pub struct Arena {
    buf: Box<[u8]>,
    input_len: usize,
}

impl Arena {
    /// Allocate an arena of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Arena {
            buf: vec![0u8; capacity].into_boxed_slice(),
            input_len: 0,
        }
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Reserve the whole arena for the next input.
    pub fn reset(&mut self) {
        self.input_len = 0;
    }

    /// Claim `[0, len)` as the input view and return it for filling.
    pub fn input_slot(&mut self, len: usize) -> Result<&mut [u8], ArenaError> {
        if len > self.buf.len() {
            return Err(ArenaError::InputTooLarge {
                len,
                capacity: self.buf.len(),
            });
        }
        self.input_len = len;
        Ok(&mut self.buf[..len])
    }

    /// The current input view.
    pub fn input(&self) -> &[u8] {
        &self.buf[..self.input_len]
    }

    /// Split into the input view and a writer over the response view.
    pub fn split(&mut self) -> (&[u8], ResponseWriter<'_>) {
        let (input, response) = self.buf.split_at_mut(self.input_len);
        (input, ResponseWriter::new(response))
    }

    /// The whole arena, for building outbound messages outside a Call.
    pub fn scratch(&mut self) -> &mut [u8] {
        self.input_len = 0;
        &mut self.buf
    }

    /// Format error text from the start of the arena, truncated to capacity.
    ///
    /// Overwrites the input view.
    pub fn format_error(&mut self, args: fmt::Arguments<'_>) -> &[u8] {
        self.input_len = 0;
        let len = format_bounded(&mut self.buf, args);
        &self.buf[..len]
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_views_are_disjoint() {
        let mut arena = Arena::new(1024);
        arena.input_slot(10).unwrap().copy_from_slice(b"0123456789");

        let (input, mut resp) = arena.split();
        assert_eq!(input, b"0123456789");
        assert_eq!(resp.capacity(), 1014);
        resp.append(b"result").unwrap();
        assert_eq!(resp.written(), b"result");

        assert_eq!(arena.input(), b"0123456789");
    }

    #[test]
    fn test_response_overflow_is_rejected() {
        let mut arena = Arena::new(1024);
        arena.input_slot(10).unwrap();
        let (_, mut resp) = arena.split();
        let big = vec![0x55u8; 2000];
        assert!(matches!(
            resp.append(&big),
            Err(ArenaError::Overflow {
                requested: 2000,
                remaining: 1014
            })
        ));
        assert!(resp.is_empty());
    }

    #[test]
    fn test_input_slot_bounds() {
        let mut arena = Arena::new(64);
        assert!(arena.input_slot(64).is_ok());
        assert_eq!(
            arena.input_slot(65).unwrap_err(),
            ArenaError::InputTooLarge {
                len: 65,
                capacity: 64
            }
        );
    }

    #[test]
    fn test_reset_reserves_full_capacity() {
        let mut arena = Arena::new(32);
        arena.input_slot(20).unwrap();
        arena.reset();
        let (input, resp) = arena.split();
        assert!(input.is_empty());
        assert_eq!(resp.capacity(), 32);
    }

    #[test]
    fn test_format_error_bounded() {
        let mut arena = Arena::new(16);
        let text = arena.format_error(format_args!("{}", "a very long error message"));
        assert_eq!(text, b"a very long erro");
        assert!(arena.input().is_empty());
    }
}
