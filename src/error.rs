use std::sync::Arc;

use thiserror::Error;

/// Errors reported by lists, change sets and operators.
///
/// Call-time contract violations are returned directly from the call that
/// caused them. Runtime consistency failures inside an operator are sent to
/// the subscriber's [`Observer::on_error`](crate::Observer::on_error) and end
/// that subscription.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An index did not address an element of the collection.
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// An operator could not locate an item it was tracking.
    ///
    /// This signals that an upstream stream broke the change-set contract,
    /// for example by removing an item it never added.
    #[error("`{operation}` could not find the item it was asked to locate")]
    ItemNotFound { operation: &'static str },

    /// A reason filter was given an empty set of reasons.
    #[error("at least one change reason must be specified")]
    NoReasons,

    /// The target collection cannot perform the requested operation.
    #[error("`{operation}` is not supported by this collection")]
    NotSupported { operation: &'static str },

    /// A window or page request had invalid parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The list was disposed.
    #[error("the list has been disposed")]
    Disposed,

    /// An error raised by a user supplied upstream stream.
    #[error("source stream failed: {0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn from_source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source(Arc::new(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
