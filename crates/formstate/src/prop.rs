//! The statically declared property list and change payloads.
//!
//! [`Prop`] is declared in dependency order: inputs before what derives from
//! them (raw value before value and validity; errors store before self errors;
//! self flags before combined flags; everything before status). The derived
//! `Ord` is that order, so a [`ChangeSet`] iterates in it and event processing
//! dispatches properties correctly without any extra bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::control::Control;
use crate::facet::ControlStatus;
use crate::key::ChildKey;
use crate::validation::{ErrorMap, ErrorsStore, PendingStore, ValidationErrors, ValidatorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Prop {
    Controls,
    RawValue,
    Value,
    ValidatorStore,
    ErrorsStore,
    SelfErrors,
    ChildErrors,
    Errors,
    SelfDisabled,
    ChildDisabled,
    ChildrenDisabled,
    Disabled,
    SelfTouched,
    ChildTouched,
    ChildrenTouched,
    Touched,
    SelfDirty,
    ChildDirty,
    ChildrenDirty,
    Dirty,
    SelfReadonly,
    ChildReadonly,
    ChildrenReadonly,
    Readonly,
    SelfSubmitted,
    ChildSubmitted,
    ChildrenSubmitted,
    Submitted,
    PendingStore,
    SelfPending,
    ChildPending,
    ChildrenPending,
    Pending,
    ChildInvalid,
    ChildrenInvalid,
    Data,
    Status,
}

impl Prop {
    /// Every property, in dependency order.
    pub const ALL: [Prop; 37] = [
        Prop::Controls,
        Prop::RawValue,
        Prop::Value,
        Prop::ValidatorStore,
        Prop::ErrorsStore,
        Prop::SelfErrors,
        Prop::ChildErrors,
        Prop::Errors,
        Prop::SelfDisabled,
        Prop::ChildDisabled,
        Prop::ChildrenDisabled,
        Prop::Disabled,
        Prop::SelfTouched,
        Prop::ChildTouched,
        Prop::ChildrenTouched,
        Prop::Touched,
        Prop::SelfDirty,
        Prop::ChildDirty,
        Prop::ChildrenDirty,
        Prop::Dirty,
        Prop::SelfReadonly,
        Prop::ChildReadonly,
        Prop::ChildrenReadonly,
        Prop::Readonly,
        Prop::SelfSubmitted,
        Prop::ChildSubmitted,
        Prop::ChildrenSubmitted,
        Prop::Submitted,
        Prop::PendingStore,
        Prop::SelfPending,
        Prop::ChildPending,
        Prop::ChildrenPending,
        Prop::Pending,
        Prop::ChildInvalid,
        Prop::ChildrenInvalid,
        Prop::Data,
        Prop::Status,
    ];

    /// Properties a leaf exposes.
    pub const LEAF: [Prop; 21] = [
        Prop::RawValue,
        Prop::Value,
        Prop::ValidatorStore,
        Prop::ErrorsStore,
        Prop::SelfErrors,
        Prop::Errors,
        Prop::SelfDisabled,
        Prop::Disabled,
        Prop::SelfTouched,
        Prop::Touched,
        Prop::SelfDirty,
        Prop::Dirty,
        Prop::SelfReadonly,
        Prop::Readonly,
        Prop::SelfSubmitted,
        Prop::Submitted,
        Prop::PendingStore,
        Prop::SelfPending,
        Prop::Pending,
        Prop::Data,
        Prop::Status,
    ];

    /// Properties an event may set directly. Everything else is recomputed
    /// by the receiving control.
    pub fn is_settable(self) -> bool {
        matches!(
            self,
            Prop::Controls
                | Prop::RawValue
                | Prop::ValidatorStore
                | Prop::ErrorsStore
                | Prop::SelfDisabled
                | Prop::SelfTouched
                | Prop::SelfDirty
                | Prop::SelfReadonly
                | Prop::SelfSubmitted
                | Prop::PendingStore
                | Prop::Data
        )
    }

    /// Properties only containers have.
    pub fn is_container_only(self) -> bool {
        matches!(
            self,
            Prop::Controls
                | Prop::ChildErrors
                | Prop::ChildDisabled
                | Prop::ChildrenDisabled
                | Prop::ChildTouched
                | Prop::ChildrenTouched
                | Prop::ChildDirty
                | Prop::ChildrenDirty
                | Prop::ChildReadonly
                | Prop::ChildrenReadonly
                | Prop::ChildSubmitted
                | Prop::ChildrenSubmitted
                | Prop::ChildPending
                | Prop::ChildrenPending
                | Prop::ChildInvalid
                | Prop::ChildrenInvalid
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Prop::Controls => "controls",
            Prop::RawValue => "rawValue",
            Prop::Value => "value",
            Prop::ValidatorStore => "validatorStore",
            Prop::ErrorsStore => "errorsStore",
            Prop::SelfErrors => "selfErrors",
            Prop::ChildErrors => "childErrors",
            Prop::Errors => "errors",
            Prop::SelfDisabled => "selfDisabled",
            Prop::ChildDisabled => "childDisabled",
            Prop::ChildrenDisabled => "childrenDisabled",
            Prop::Disabled => "disabled",
            Prop::SelfTouched => "selfTouched",
            Prop::ChildTouched => "childTouched",
            Prop::ChildrenTouched => "childrenTouched",
            Prop::Touched => "touched",
            Prop::SelfDirty => "selfDirty",
            Prop::ChildDirty => "childDirty",
            Prop::ChildrenDirty => "childrenDirty",
            Prop::Dirty => "dirty",
            Prop::SelfReadonly => "selfReadonly",
            Prop::ChildReadonly => "childReadonly",
            Prop::ChildrenReadonly => "childrenReadonly",
            Prop::Readonly => "readonly",
            Prop::SelfSubmitted => "selfSubmitted",
            Prop::ChildSubmitted => "childSubmitted",
            Prop::ChildrenSubmitted => "childrenSubmitted",
            Prop::Submitted => "submitted",
            Prop::PendingStore => "pendingStore",
            Prop::SelfPending => "selfPending",
            Prop::ChildPending => "childPending",
            Prop::ChildrenPending => "childrenPending",
            Prop::Pending => "pending",
            Prop::ChildInvalid => "childInvalid",
            Prop::ChildrenInvalid => "childrenInvalid",
            Prop::Data => "data",
            Prop::Status => "status",
        }
    }
}

// ============================================================================
// Property values
// ============================================================================

/// The value of one property, as carried in a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Children in key order. Controls compare by identity.
    Controls(Vec<(ChildKey, Control)>),
    /// Raw value, value and data.
    Json(Value),
    Flag(bool),
    Validators(ValidatorStore),
    ErrorsStore(ErrorsStore),
    SelfErrors(Option<ValidationErrors>),
    Errors(ErrorMap),
    Pending(PendingStore),
    Status(ControlStatus),
}

impl PropValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            PropValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<ControlStatus> {
        match self {
            PropValue::Status(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_errors(&self) -> Option<&ErrorMap> {
        match self {
            PropValue::Errors(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_controls(&self) -> Option<&[(ChildKey, Control)]> {
        match self {
            PropValue::Controls(c) => Some(c),
            _ => None,
        }
    }
}

/// Changed properties with their new values, iterated in dependency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet(BTreeMap<Prop, PropValue>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prop: Prop, value: PropValue) {
        self.0.insert(prop, value);
    }

    pub fn get(&self, prop: Prop) -> Option<&PropValue> {
        self.0.get(&prop)
    }

    pub fn contains(&self, prop: Prop) -> bool {
        self.0.contains_key(&prop)
    }

    pub fn flag(&self, prop: Prop) -> Option<bool> {
        self.get(prop).and_then(PropValue::as_flag)
    }

    pub fn json(&self, prop: Prop) -> Option<&Value> {
        self.get(prop).and_then(PropValue::as_json)
    }

    pub fn status(&self) -> Option<ControlStatus> {
        self.get(Prop::Status).and_then(PropValue::as_status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Prop, &PropValue)> {
        self.0.iter().map(|(p, v)| (*p, v))
    }

    pub fn props(&self) -> ChangedProps {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fold a later change set over this one; later values win.
    pub(crate) fn absorb(&mut self, later: &ChangeSet) {
        for (prop, value) in &later.0 {
            self.0.insert(*prop, value.clone());
        }
    }
}

impl FromIterator<(Prop, PropValue)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (Prop, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Changed property names
// ============================================================================

/// Names of the properties a mutation changed, sorted and unique. Empty means
/// the mutation was a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedProps(SmallVec<[Prop; 8]>);

impl ChangedProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prop: Prop) {
        if let Err(pos) = self.0.binary_search(&prop) {
            self.0.insert(pos, prop);
        }
    }

    pub fn extend(&mut self, other: ChangedProps) {
        for prop in other.0 {
            self.insert(prop);
        }
    }

    pub fn contains(&self, prop: Prop) -> bool {
        self.0.binary_search(&prop).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Prop> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Prop] {
        &self.0
    }
}

impl FromIterator<Prop> for ChangedProps {
    fn from_iter<I: IntoIterator<Item = Prop>>(iter: I) -> Self {
        let mut props = ChangedProps::new();
        for prop in iter {
            props.insert(prop);
        }
        props
    }
}

impl<'a> IntoIterator for &'a ChangedProps {
    type Item = Prop;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Prop>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}
