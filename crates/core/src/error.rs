//! Error types for txmatrix-core
//!
//! The only fallible operation in this crate is turning a flag or
//! environment value back into an axis value.

use crate::axis::AxisKind;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ParseAxisError>;

/// A string did not name any value of the given axis
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {axis} value: '{value}' (expected one of: {expected})")]
pub struct ParseAxisError {
    /// Axis being parsed
    pub axis: AxisKind,
    /// Offending input
    pub value: String,
    /// Comma-separated list of accepted values
    pub expected: String,
}

impl ParseAxisError {
    /// Create a parse error for `axis` with the rejected `value`
    pub fn new(axis: AxisKind, value: impl Into<String>, expected: &[&str]) -> Self {
        Self {
            axis,
            value: value.into(),
            expected: expected.join(", "),
        }
    }
}
