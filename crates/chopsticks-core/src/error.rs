//! Shared validation error type, grounded on
//! `queue-keeper-core::ValidationError`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} is too long: {actual} chars (max {max})")]
    TooLong {
        field: String,
        actual: usize,
        max: usize,
    },

    #[error("{field} is too short: {actual} chars (min {min})")]
    TooShort {
        field: String,
        actual: usize,
        min: usize,
    },
}
