//! Error types for timing feed processing.
//!
//! This module provides the error taxonomy for the livetiming library.
//! All errors implement the `std::error::Error` trait and include structured context
//! for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Malformed Payloads**: A recognized category whose payload no longer matches the
//!   documented wire shape. Fatal, since it means the feed format changed.
//! - **Capture Errors**: Unreadable capture records or capture files
//! - **Running Order Errors**: The position tracker lost track of the running order
//! - **Resync Errors**: No recorded snapshot matches an observed sample, or a
//!   requested sequence was never recorded
//!
//! Unrecognized categories and end of stream are *not* errors: the decoder drops the
//! former and providers report the latter as `Ok(None)`.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use livetiming::TimingError;
//!
//! let error = TimingError::NoMatch { snapshots: 120 };
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for timing operations.
pub type Result<T, E = TimingError> = std::result::Result<T, E>;

/// Main error type for timing operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimingError {
    #[error("Malformed {category} payload: {details}")]
    Malformed { category: String, details: String },

    #[error("Invalid capture record on line {line}: {details}")]
    Capture { line: usize, details: String },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Running order lost: driver {driver} moved to P{position} \
         but no driver holds P{missing_slot}"
    )]
    PositionInvariant { driver: u32, position: u32, missing_slot: u32 },

    #[error("No recorded snapshot matches the observed intervals ({snapshots} snapshots searched)")]
    NoMatch { snapshots: usize },

    #[error("Sequence {sequence} has not been recorded (last recorded: {recorded:?})")]
    SequenceNotFound { sequence: u64, recorded: Option<u64> },

    #[error("Subscriber failed: {details}")]
    Subscriber { details: String },

    #[error("Driver task failed: {reason}")]
    Task { reason: String },
}

impl TimingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TimingError::NoMatch { .. } => true,
            TimingError::SequenceNotFound { .. } => true,
            TimingError::File { .. } => false,
            TimingError::Malformed { .. } => false,
            TimingError::Capture { .. } => false,
            TimingError::PositionInvariant { .. } => false,
            TimingError::Subscriber { .. } => false,
            TimingError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TimingError::Malformed { .. } => vec![
                "Check whether the feed's wire format changed",
                "Capture the offending payload for inspection",
                "Update the decoder for the new shape",
            ],
            TimingError::Capture { .. } => vec![
                "Verify the record follows <timestamp_ns>:<category>:<json>",
                "Check the capture was not truncated mid-line",
            ],
            TimingError::File { .. } => {
                vec!["Check file exists and is readable", "Check file permissions"]
            }
            TimingError::PositionInvariant { .. } => vec![
                "Restart from the session's initial snapshot",
                "Check the source for dropped or reordered updates",
            ],
            TimingError::NoMatch { .. } => vec![
                "Wait for more of the reference feed to be recorded and retry",
                "Verify the observed sample's driver numbers",
                "Supply a smaller, more certain sample",
            ],
            TimingError::SequenceNotFound { .. } => vec![
                "Wait until the sequence has been recorded",
                "Use a sequence returned by a successful search",
            ],
            TimingError::Subscriber { .. } => vec![
                "Inspect the earlier subscriber failure that poisoned shared state",
                "Rebuild the pipeline from a fresh session",
            ],
            TimingError::Task { .. } => {
                vec!["Check logs for a panic in the driver task", "Restart the connection"]
            }
        }
    }

    /// Helper constructor for malformed payload errors.
    pub fn malformed(category: impl Into<String>, details: impl Into<String>) -> Self {
        TimingError::Malformed { category: category.into(), details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TimingError::File { path, source }
    }

    /// Helper constructor for capture record errors.
    pub fn capture(line: usize, details: impl Into<String>) -> Self {
        TimingError::Capture { line, details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            category in "[A-Za-z]+",
            details in ".*",
            driver in 1u32..100,
            position in 1u32..30,
        ) {
            let malformed = TimingError::malformed(category.clone(), details.clone());
            let message = malformed.to_string();
            prop_assert!(message.contains(&category));
            prop_assert!(message.contains(&details));

            let lost = TimingError::PositionInvariant { driver, position, missing_slot: position };
            let message = lost.to_string();
            prop_assert!(message.contains(&driver.to_string()));
            let slot = format!("P{position}");
            prop_assert!(message.contains(&slot));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TimingError>();

        let error = TimingError::malformed("TimingData", "Lines missing");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn resync_failures_are_retryable_but_feed_errors_are_not() {
        assert!(TimingError::NoMatch { snapshots: 0 }.is_retryable());
        assert!(TimingError::SequenceNotFound { sequence: 4, recorded: Some(2) }.is_retryable());
        assert!(!TimingError::malformed("TimingData", "x").is_retryable());
        assert!(
            !TimingError::PositionInvariant { driver: 4, position: 1, missing_slot: 2 }
                .is_retryable()
        );

        for suggestion in (TimingError::NoMatch { snapshots: 3 }).recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
    }
}
