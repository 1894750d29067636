//! Programmer-misuse errors.
//!
//! Validation failures are not errors in this sense: they are ordinary data in
//! a control's error map and status. A [`ControlError`] means the caller broke
//! an invariant (addressed a child that does not exist, handed a container a
//! value of the wrong shape) and is always returned before any state is
//! touched.

use thiserror::Error;

use crate::control::ControlKind;
use crate::key::ChildKey;

pub type Result<T, E = ControlError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// A value or path addressed a child key the container does not have.
    #[error("unknown child key `{0}`")]
    UnknownChildKey(ChildKey),

    /// `set_value` on a container was missing an entry for an existing child.
    #[error("missing value for child `{0}`")]
    MissingChildKey(ChildKey),

    /// Array index outside `0..len` (or `0..=len` when inserting).
    #[error("invalid index {index} for array of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// Two children registered under the same group key.
    #[error("duplicate child key `{0}`")]
    DuplicateChildKey(ChildKey),

    /// A container received a value that is not an object (group) or array
    /// (array).
    #[error("expected {expected} value, found {found}")]
    ValueShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An incoming event carries something this kind of control cannot
    /// hold, such as child events for a leaf.
    #[error("{kind:?} control cannot apply {reason}")]
    IncompatibleEvent { kind: ControlKind, reason: &'static str },
}

impl ControlError {
    pub(crate) fn shape(expected: &'static str, found: &serde_json::Value) -> Self {
        ControlError::ValueShapeMismatch {
            expected,
            found: json_kind(found),
        }
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
