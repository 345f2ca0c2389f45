//! Error types for `lru_dict`.
//!
//! A unified error type for every `LruDict` operation. Error codes follow
//! the pattern `LRUDICT-XXX` for easy debugging across log lines.

use thiserror::Error;

/// Result type alias for `lru_dict` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `LruDict` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested key is not present (LRUDICT-001).
    #[error("[LRUDICT-001] key not found")]
    NotFound,

    /// Operation requires at least one entry but the dict is empty
    /// (LRUDICT-002).
    #[error("[LRUDICT-002] dict is empty")]
    Empty,

    /// An argument failed validation (LRUDICT-003).
    #[error("[LRUDICT-003] invalid argument: {0}")]
    BadArgument(&'static str),

    /// The critical section is held by a conflicting operation and
    /// `detect_conflict` refused to block (LRUDICT-004).
    #[error("[LRUDICT-004] dict is busy; conflicting operation in progress")]
    Busy,

    /// The purge queue or an internal allocation could not grow further
    /// (LRUDICT-005).
    #[error("[LRUDICT-005] out of memory: {0}")]
    OutOfMemory(String),

    /// An invariant was violated internally; should never be observed in
    /// practice (LRUDICT-006).
    #[error("[LRUDICT-006] internal error: {0}")]
    Internal(String),

    /// The eviction callback panicked with a [`crate::dict::CallbackAbort`]
    /// payload, requesting that the drain that invoked it abandon any
    /// remaining items and propagate to the caller, rather than being
    /// logged and swallowed like an ordinary callback panic (LRUDICT-007).
    #[error("[LRUDICT-007] eviction callback requested shutdown: {0}")]
    CallbackAborted(String),
}

impl Error {
    /// Returns the error code (e.g., "LRUDICT-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "LRUDICT-001",
            Self::Empty => "LRUDICT-002",
            Self::BadArgument(_) => "LRUDICT-003",
            Self::Busy => "LRUDICT-004",
            Self::OutOfMemory(_) => "LRUDICT-005",
            Self::Internal(_) => "LRUDICT-006",
            Self::CallbackAborted(_) => "LRUDICT-007",
        }
    }

    /// Returns true if this error is recoverable, i.e. the dict remains
    /// usable after it. An internal invariant violation is not; a callback
    /// abort is — the dict's own structure was never left inconsistent by
    /// it, only the in-progress drain was cut short.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}
