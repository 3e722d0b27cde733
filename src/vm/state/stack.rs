//! This module contains the implementation of a frame's operand stack.

use crate::{
    constant::DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH,
    error::execution::{Error, Result},
    vm::value::Value,
};

/// The operand stack of one frame.
///
/// # Indexing
///
/// Depths are zero-based, where depth 0 is the top of the stack.
///
/// # Width
///
/// Every value takes exactly one entry, whatever its category.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stack {
    data:  Vec<Value>,
    limit: usize,
}

impl Stack {
    /// Creates a new stack without any items on it that holds at most `limit`
    /// entries.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let data = Vec::new();
        Self { data, limit }
    }

    /// Pushes the provided value onto the top of the stack.
    ///
    /// # Errors
    ///
    /// If the stack cannot grow to accommodate the requested `value`.
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.data.len() + 1 > self.limit {
            return Err(Error::OperandStackOverflow {
                requested: self.data.len() + 1,
            });
        }
        self.data.push(value);
        Ok(())
    }

    /// Pops the top value from the stack.
    ///
    /// # Errors
    ///
    /// If the stack has no item to pop.
    pub fn pop(&mut self) -> Result<Value> {
        self.data.pop().ok_or(Error::OperandStackUnderflow {
            requested: 1,
            available: 0,
        })
    }

    /// Pops the top `count` values, returning them in the order they were
    /// pushed. Nothing is popped if fewer than `count` values are available.
    ///
    /// # Errors
    ///
    /// If the stack holds fewer than `count` values.
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Value>> {
        self.check_depth(count)?;
        let split = self.data.len() - count;
        Ok(self.data.split_off(split))
    }

    /// Reads the value at the provided `depth` without popping it.
    ///
    /// # Errors
    ///
    /// If `depth` does not exist in the stack.
    pub fn peek(&self, depth: usize) -> Result<&Value> {
        self.check_depth(depth + 1)?;
        Ok(&self.data[self.data.len() - 1 - depth])
    }

    /// Duplicates the value at `depth` onto the top of the stack.
    ///
    /// # Errors
    ///
    /// If `depth` doesn't exist or the stack is full.
    pub fn dup(&mut self, depth: usize) -> Result<()> {
        let value = self.peek(depth)?.clone();
        self.push(value)
    }

    /// Gets the current size of the stack.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Checks if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Iterates over the stack from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.data.iter()
    }

    fn check_depth(&self, count: usize) -> Result<()> {
        if count > self.data.len() {
            return Err(Error::OperandStackUnderflow {
                requested: count,
                available: self.data.len(),
            });
        }
        Ok(())
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new(DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH)
    }
}
