//! Argument cursor
//!
//! Calculations receive their arguments as an ordered slice of parsed
//! values. The cursor walks that slice left to right with typed
//! accessors, so a calculation body never indexes raw positions.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Extent, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CursorError {
    #[error("argument {position} requested but only {supplied} supplied")]
    Exhausted { position: usize, supplied: usize },
    #[error("argument {position} is {found}, expected {expected}")]
    WrongKind {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{remaining} trailing argument(s) never consumed")]
    Unconsumed { remaining: usize },
}

/// Ordered, typed access to a calculation's bound arguments
#[derive(Debug)]
pub struct ArgumentCursor<'a> {
    args: &'a [Value],
    index: usize,
}

impl<'a> ArgumentCursor<'a> {
    pub fn new(args: &'a [Value]) -> Self {
        ArgumentCursor { args, index: 0 }
    }

    pub fn has_more(&self) -> bool {
        self.index < self.args.len()
    }

    pub fn remaining(&self) -> usize {
        self.args.len() - self.index
    }

    /// Next value regardless of kind
    pub fn next(&mut self) -> Result<&'a Value, CursorError> {
        let value = self.args.get(self.index).ok_or(CursorError::Exhausted {
            position: self.index + 1,
            supplied: self.args.len(),
        })?;
        self.index += 1;
        Ok(value)
    }

    pub fn next_boolean(&mut self) -> Result<bool, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_boolean()
            .ok_or_else(|| wrong_kind(position, "BOOLEAN", value))
    }

    pub fn next_integer(&mut self) -> Result<i64, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_integer()
            .ok_or_else(|| wrong_kind(position, "INTEGER", value))
    }

    /// Next numeric value; integers and cell sizes widen to float
    pub fn next_float(&mut self) -> Result<f64, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_float()
            .ok_or_else(|| wrong_kind(position, "FLOAT", value))
    }

    pub fn next_str(&mut self) -> Result<&'a str, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_str()
            .ok_or_else(|| wrong_kind(position, "STRING", value))
    }

    pub fn next_cell_size(&mut self) -> Result<f64, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        match value {
            Value::CellSize(size) => Ok(*size),
            other => Err(wrong_kind(position, "CELLSIZE", other)),
        }
    }

    pub fn next_extent(&mut self) -> Result<Extent, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_extent()
            .ok_or_else(|| wrong_kind(position, "EXTENT", value))
    }

    pub fn next_path(&mut self) -> Result<&'a Path, CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_path()
            .ok_or_else(|| wrong_kind(position, "PATH", value))
    }

    pub fn next_path_list(&mut self) -> Result<&'a [PathBuf], CursorError> {
        let position = self.index + 1;
        let value = self.next()?;
        value
            .as_path_list()
            .ok_or_else(|| wrong_kind(position, "PATHLIST", value))
    }

    /// Assert every argument was consumed.
    pub fn finish(&self) -> Result<(), CursorError> {
        if self.has_more() {
            return Err(CursorError::Unconsumed {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

fn wrong_kind(position: usize, expected: &'static str, found: &Value) -> CursorError {
    CursorError::WrongKind {
        position,
        expected,
        found: found.kind_name(),
    }
}
