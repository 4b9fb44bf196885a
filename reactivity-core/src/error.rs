//! Error types.
//!
//! The reactive surface itself never fails: misuse such as wrapping a
//! primitive or keying a weak map by a string is a silent pass-through. Only
//! the typed conversions and serialisation return errors.

use thiserror::Error;

use crate::reactive::ObjectId;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A typed view was requested over a value of another kind.
    #[error("expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },

    /// The value graph contains itself and cannot be serialised.
    #[error("cyclic value: object {id} is reachable from itself")]
    CyclicValue { id: ObjectId },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
