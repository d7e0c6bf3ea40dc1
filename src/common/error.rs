//! Common error types for the converter pipeline
//!
//! # Design Principles (KISS)
//! - One error enum per concern; components wrap or propagate with `?`
//! - Truncation is a recoverable signal (spill granularity), not a panic
//! - Use thiserror for ergonomic error handling

use thiserror::Error;

/// Errors raised while decoding the raw byte stream.
///
/// `Truncated` and `WordBudgetExceeded` are recovered at spill granularity:
/// the spill reader discards the current spill and the driver moves on.
/// `Io` is unrecoverable and stops the run.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Fewer bytes remain in the source than an in-progress decode requires
    #[error("input truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: u64, remaining: u64 },

    /// An event would consume more words than the channel dump declared
    #[error("channel dump word budget exceeded: needed {needed} words, {remaining} remaining")]
    WordBudgetExceeded { needed: u32, remaining: u32 },

    /// I/O error from the underlying reader
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// True for conditions recovered by discarding the current spill.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecodeError::Truncated { .. } | DecodeError::WordBudgetExceeded { .. }
        )
    }
}

/// Result type alias using DecodeError
pub type DecodeResult<T> = Result<T, DecodeError>;
