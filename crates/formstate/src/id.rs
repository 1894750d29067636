//! Control identity and contributor identity.
//!
//! Every control gets a [`ControlId`] at construction that never changes. Ids
//! come from an [`IdGenerator`] injected through
//! [`ControlConfig`](crate::ControlConfig); clones reuse the generator of the
//! control they were cloned from.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a control (or of any other event source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(Uuid);

impl ControlId {
    /// A fresh random id. UI adapters and async validators use this to get a
    /// contributor identity of their own.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ControlId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Id generation
// ============================================================================

/// Source of fresh control ids.
pub trait IdGenerator {
    fn next_id(&self) -> ControlId;
}

/// Shared handle to an id generator.
pub type SharedIds = Rc<dyn IdGenerator>;

/// UUID v4 ids. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> ControlId {
        ControlId::new()
    }
}

/// Deterministic ids counting up from 1, for reproducible tests and logs.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: Cell<u128>,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for `Rc::new(SequentialIds::new())`.
    pub fn shared() -> SharedIds {
        Rc::new(Self::new())
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> ControlId {
        let n = self.next.get() + 1;
        self.next.set(n);
        ControlId(Uuid::from_u128(n))
    }
}

pub(crate) fn default_ids() -> SharedIds {
    Rc::new(RandomIds)
}

// ============================================================================
// Contributors
// ============================================================================

/// String form of [`Contributor::Own`]; also the prefix used when child
/// errors are re-keyed into a container's merged error map.
pub const SELF_MARKER: &str = "self";

/// Who contributed an error payload, a validator, or a pending reason.
///
/// `Own` is the control itself: its validators write their result there and
/// bare payloads default to it. External contributors (UI adapters, async
/// validators) use their own id so their entries never collide with the
/// control's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Contributor {
    Own,
    Source(ControlId),
}

impl From<ControlId> for Contributor {
    fn from(id: ControlId) -> Self {
        Contributor::Source(id)
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contributor::Own => f.write_str(SELF_MARKER),
            Contributor::Source(id) => write!(f, "{id}"),
        }
    }
}

impl From<Contributor> for String {
    fn from(contributor: Contributor) -> Self {
        contributor.to_string()
    }
}

impl FromStr for Contributor {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SELF_MARKER {
            return Ok(Contributor::Own);
        }
        Uuid::parse_str(s).map(|uuid| Contributor::Source(ControlId(uuid)))
    }
}

impl TryFrom<String> for Contributor {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
