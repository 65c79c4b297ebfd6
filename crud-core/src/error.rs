//! Error handling in [`crud_core`][crate]
use std::time::Duration;

use thiserror::Error;

use crate::ObjectKey;

/// Type-erased error, used where the concrete error comes from a caller or a backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a [`ResourceStore`](crate::ResourceStore)
///
/// A version conflict is its own variant so that the update loop can tell
/// "somebody else wrote first" apart from every other failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The submitted `resourceVersion` does not match the stored one
    #[error("resource version conflict on {key}: {message}")]
    Conflict {
        /// The object that was written concurrently
        key: ObjectKey,
        /// Details from the store
        message: String,
    },

    /// No object is stored under the key
    #[error("{key} not found")]
    NotFound {
        /// The missing object
        key: ObjectKey,
    },

    /// An object is already stored under the key
    #[error("{key} already exists")]
    AlreadyExists {
        /// The existing object
        key: ObjectKey,
    },

    /// The store refused the object as malformed
    #[error("invalid object: {message}")]
    Invalid {
        /// Why the object was refused
        message: String,
    },

    /// Transport, authentication, or any other backend failure
    #[error("store backend failed: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Whether this error is a version conflict, i.e. worth retrying with a fresh read
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors from [`RetryOnConflict`](crate::RetryOnConflict)
///
/// Each variant ends the update. Only [`StoreError::Conflict`] is ever retried, and running
/// out of retries is reported as [`UpdateError::RetryBudgetExhausted`] rather than as the
/// raw conflict.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Reading the current state failed
    #[error("failed to fetch {key}")]
    Fetch {
        /// The object being updated
        key: ObjectKey,
        /// The store error
        source: StoreError,
    },

    /// The mutation refused the fetched state
    #[error("failed to mutate {key}")]
    Mutate {
        /// The object being updated
        key: ObjectKey,
        /// The error returned by the mutation
        source: BoxError,
    },

    /// The store rejected the write for a reason other than a version conflict
    #[error("failed to update {key}")]
    Update {
        /// The object being updated
        key: ObjectKey,
        /// The store error
        source: StoreError,
    },

    /// Every allowed attempt ran into a version conflict
    #[error("gave up updating {key} after {attempts} conflicting attempts")]
    RetryBudgetExhausted {
        /// The object being updated
        key: ObjectKey,
        /// How many writes were submitted
        attempts: u32,
        /// The conflict that ended the last attempt
        #[source]
        last: StoreError,
    },

    /// The overall timeout elapsed before any attempt succeeded
    #[error("timed out updating {key} after {attempts} attempts ({elapsed:?})")]
    TimedOut {
        /// The object being updated
        key: ObjectKey,
        /// How many attempts were started
        attempts: u32,
        /// Time spent before giving up
        elapsed: Duration,
    },
}

impl UpdateError {
    /// The object this error refers to
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        match self {
            Self::Fetch { key, .. }
            | Self::Mutate { key, .. }
            | Self::Update { key, .. }
            | Self::RetryBudgetExhausted { key, .. }
            | Self::TimedOut { key, .. } => key,
        }
    }
}
