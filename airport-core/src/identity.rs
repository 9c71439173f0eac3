use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::repository::PersistenceError;
use crate::validation::ValidationError;
use crate::CoreResult;

/// Fixed-width record code: one uppercase letter followed by a zero-padded
/// decimal suffix, e.g. `P0001` for width 5.
///
/// Because every code of a format has the same length and the suffix is
/// zero-padded, ordering codes as strings is the same as ordering their
/// suffixes as numbers. The "latest" code lookup relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFormat {
    prefix: char,
    width: usize,
}

pub const PASSENGER_CODE: CodeFormat = CodeFormat::new('P', 5);
pub const EMPLOYEE_CODE: CodeFormat = CodeFormat::new('E', 5);

impl CodeFormat {
    pub const fn new(prefix: char, width: usize) -> Self {
        assert!(prefix.is_ascii_uppercase(), "code prefix must be an uppercase ASCII letter");
        assert!(width >= 2 && width <= 10, "code width must leave room for a suffix");
        Self { prefix, width }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn digits(&self) -> usize {
        self.width - 1
    }

    /// Largest suffix the width can hold (9999 for width 5)
    pub fn max_suffix(&self) -> u64 {
        10u64.pow(self.digits() as u32) - 1
    }

    pub fn matches(&self, value: &str) -> bool {
        value.len() == self.width
            && value.starts_with(self.prefix)
            && value[1..].bytes().all(|b| b.is_ascii_digit())
    }

    /// POSIX regex restricting a key column to this format
    pub fn sql_pattern(&self) -> String {
        format!("^{}[0-9]{{{}}}$", self.prefix, self.digits())
    }

    /// Validate a caller-supplied code
    pub fn parse(&self, value: &str) -> Result<RecordCode, ValidationError> {
        if !self.matches(value) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                value: value.to_string(),
            });
        }
        Ok(RecordCode(value.to_string()))
    }

    pub fn suffix(&self, code: &RecordCode) -> Option<u64> {
        if !self.matches(code.as_str()) {
            return None;
        }
        code.as_str()[1..].parse().ok()
    }

    pub fn first(&self) -> RecordCode {
        self.render(1)
    }

    /// Derive the code following the current maximum, or the first code for an
    /// empty table.
    pub fn next_after(&self, current: Option<&RecordCode>) -> CoreResult<RecordCode> {
        let Some(current) = current else {
            return Ok(self.first());
        };

        let suffix = self.suffix(current).ok_or_else(|| ValidationError::InvalidFormat {
            field: "code",
            value: current.to_string(),
        })?;

        if suffix >= self.max_suffix() {
            return Err(PersistenceError::KeyOverflow {
                last: current.to_string(),
                width: self.width,
            }
            .into());
        }

        Ok(self.render(suffix + 1))
    }

    fn render(&self, suffix: u64) -> RecordCode {
        RecordCode(format!("{}{:0>width$}", self.prefix, suffix, width = self.digits()))
    }
}

/// A code that satisfied its format when it was created or was read back from storage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCode(String);

impl RecordCode {
    /// Wrap a key loaded from storage; the storage boundary owns its format.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RecordCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}
