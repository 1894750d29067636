//! The control abstraction shared by leaves and containers.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Weak;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::container::{ArrayControl, ContainerInner, GroupControl, Indexed, Keyed};
use crate::core::ControlCore;
use crate::error::Result;
use crate::event::{ControlEvent, EventKind, EventOptions, EventStream, StateChange, Subscription};
use crate::facet::{ControlStatus, Facet, FacetFlags};
use crate::id::ControlId;
use crate::key::ChildKey;
use crate::leaf::LeafControl;
use crate::prop::{ChangeSet, ChangedProps, Prop, PropValue};
use crate::validation::{ErrorMap, ErrorsStore, PendingStore, ValidationErrors, ValidatorSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Leaf,
    Group,
    Array,
}

/// How `replay_state` treats a container's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Put detached clones of the children in the snapshot instead of the
    /// children themselves. Off by default, which keeps replaying a control
    /// into itself a no-op.
    pub clone_children: bool,
}

impl ReplayOptions {
    pub fn cloning() -> Self {
        Self { clone_children: true }
    }
}

// ============================================================================
// Node
// ============================================================================

/// Storage every control kind wraps: identity, state and outgoing stream.
#[doc(hidden)]
pub struct Node {
    pub(crate) id: ControlId,
    pub(crate) core: RefCell<ControlCore>,
    pub(crate) events: EventStream,
}

impl Node {
    pub(crate) fn new(core: ControlCore) -> Self {
        Self {
            id: core.id(),
            core: RefCell::new(core),
            events: EventStream::new(),
        }
    }

    /// Emit the state change for `changed` read back from current state.
    pub(crate) fn commit(&self, changed: ChangedProps, opts: &EventOptions, operation: &str) -> ChangedProps {
        let changes = self.core.borrow().change_set(&changed);
        self.emit_state(changes, BTreeMap::new(), opts, operation);
        changed
    }

    /// Emit one state-change event, followed by the validation-start pair when
    /// the raw value is part of it. Nothing is emitted for an empty change or
    /// when `opts` suppress this control's events.
    pub(crate) fn emit_state(
        &self,
        changes: ChangeSet,
        child_events: BTreeMap<ChildKey, ControlEvent>,
        opts: &EventOptions,
        operation: &str,
    ) -> Option<ControlEvent> {
        if opts.no_event || (changes.is_empty() && child_events.is_empty()) {
            return None;
        }
        let raw_value = changes.json(Prop::RawValue).cloned();
        let event = opts.build_event(self.id, EventKind::StateChange(StateChange { changes, child_events }), operation);
        self.events.emit(&event);

        if let Some(value) = raw_value {
            let start = EventKind::ValidationStart {
                control_id: self.id,
                value: value.clone(),
            };
            self.events.emit(&opts.build_event(self.id, start, "validation_start"));
            let async_start = EventKind::AsyncValidationStart { control_id: self.id, value };
            self.events.emit(&opts.build_event(self.id, async_start, "async_validation_start"));
        }
        Some(event)
    }

    /// Re-emit a targeted event addressed to this control.
    pub(crate) fn echo(&self, event: &ControlEvent) -> Option<ControlEvent> {
        if event.kind.target() != Some(self.id) {
            return None;
        }
        self.events.emit(event);
        Some(event.clone())
    }
}

/// Back-reference from a child to its container. Never keeps the container
/// alive.
#[doc(hidden)]
#[derive(Clone)]
pub enum ParentRef {
    Group { id: ControlId, inner: Weak<ContainerInner<Keyed>> },
    Array { id: ControlId, inner: Weak<ContainerInner<Indexed>> },
}

impl ParentRef {
    pub(crate) fn id(&self) -> ControlId {
        match self {
            ParentRef::Group { id, .. } | ParentRef::Array { id, .. } => *id,
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Control> {
        match self {
            ParentRef::Group { inner, .. } => inner.upgrade().map(|inner| Control::Group(GroupControl::from_inner(inner))),
            ParentRef::Array { inner, .. } => inner.upgrade().map(|inner| Control::Array(ArrayControl::from_inner(inner))),
        }
    }
}

// ============================================================================
// AbstractControl
// ============================================================================

/// Behaviour common to every control.
///
/// Accessors read through [`core`](AbstractControl::core). Mutators return
/// the properties they changed (empty for a no-op) and emit at most one
/// state-change event, after every internal borrow is released, so
/// subscribers may freely read or mutate the control they are observing.
pub trait AbstractControl {
    #[doc(hidden)]
    fn node(&self) -> &Node;

    fn kind(&self) -> ControlKind;

    /// Apply an event from this control's own stream, a linked peer or a
    /// snapshot. Returns the event this control emitted in response, if any.
    ///
    /// The whole event is checked before anything is applied; an
    /// [`Err`](crate::ControlError) leaves the control untouched.
    fn process_event(&self, event: &ControlEvent) -> Result<Option<ControlEvent>>;

    /// One state-change event holding every public property of this control.
    /// Does not mutate anything.
    fn replay_state(&self, opts: ReplayOptions) -> ControlEvent;

    /// A fresh, parentless control of the same kind in the same state, with a
    /// new id from the same id generator.
    fn clone_control(&self) -> Self
    where
        Self: Sized;

    fn snapshot(&self) -> StateSnapshot;

    fn read_prop(&self, prop: Prop) -> Option<PropValue> {
        self.core().read(prop)
    }

    /// Borrow the control's state. Release it before mutating the control.
    fn core(&self) -> Ref<'_, ControlCore> {
        self.node().core.borrow()
    }

    fn events(&self) -> &EventStream {
        &self.node().events
    }

    fn subscribe(&self, callback: impl Fn(&ControlEvent) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.events().subscribe(callback)
    }

    /// Passive observation of one property: `callback` gets the current value
    /// immediately, then the new value from every state change touching
    /// `prop`, except events flagged `no_observe`.
    fn observe(&self, prop: Prop, callback: impl Fn(&PropValue) + 'static) -> Subscription
    where
        Self: Sized,
    {
        if let Some(current) = self.read_prop(prop) {
            callback(&current);
        }
        self.events().subscribe(move |event| {
            if event.no_observe {
                return;
            }
            if let Some(value) = event.state_change().and_then(|change| change.changes.get(prop)) {
                callback(value);
            }
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    fn id(&self) -> ControlId {
        self.node().id
    }

    fn raw_value(&self) -> Value {
        self.core().raw_value().clone()
    }

    fn value(&self) -> Value {
        self.core().value().clone()
    }

    fn errors(&self) -> ErrorMap {
        self.core().errors().clone()
    }

    fn self_errors(&self) -> Option<ValidationErrors> {
        self.core().self_errors().cloned()
    }

    fn errors_store(&self) -> ErrorsStore {
        self.core().errors_store().clone()
    }

    fn pending_store(&self) -> PendingStore {
        self.core().pending_store().clone()
    }

    fn status(&self) -> ControlStatus {
        self.core().status()
    }

    fn data(&self) -> Value {
        self.core().data().clone()
    }

    fn self_flags(&self) -> FacetFlags {
        self.core().self_flags()
    }

    fn flags(&self) -> FacetFlags {
        self.core().flags()
    }

    fn disabled(&self) -> bool {
        self.flags().disabled
    }

    fn enabled(&self) -> bool {
        !self.disabled()
    }

    fn touched(&self) -> bool {
        self.flags().touched
    }

    fn dirty(&self) -> bool {
        self.flags().dirty
    }

    fn readonly(&self) -> bool {
        self.flags().readonly
    }

    fn submitted(&self) -> bool {
        self.flags().submitted
    }

    fn pending(&self) -> bool {
        self.flags().pending
    }

    fn invalid(&self) -> bool {
        !self.core().errors().is_empty()
    }

    fn valid(&self) -> bool {
        !self.invalid()
    }

    fn parent(&self) -> Option<Control> {
        self.core().parent().and_then(ParentRef::upgrade)
    }

    // ------------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------------

    /// Replace validators. A single validator or list is filed under the
    /// options' source (the control itself by default); a store replaces
    /// everything. Re-validates synchronously.
    fn set_validators(&self, validators: impl Into<ValidatorSet>, opts: &EventOptions) -> ChangedProps
    where
        Self: Sized,
    {
        let changed = self
            .node()
            .core
            .borrow_mut()
            .set_validators(validators.into(), opts.contributor());
        self.node().commit(changed, opts, "set_validators")
    }

    /// Replace the options' source's error payload; `None` or an empty
    /// payload deletes it.
    fn set_errors(&self, errors: Option<ValidationErrors>, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().set_errors(opts.contributor(), errors);
        self.node().commit(changed, opts, "set_errors")
    }

    /// Merge error names into the options' source's payload. A `null` detail
    /// removes that name.
    fn patch_errors(&self, partial: ValidationErrors, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().patch_errors(opts.contributor(), partial);
        self.node().commit(changed, opts, "patch_errors")
    }

    fn set_errors_store(&self, store: ErrorsStore, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().set_errors_store(store);
        self.node().commit(changed, opts, "set_errors_store")
    }

    /// Set this control's own flag for `facet`. For [`Facet::Pending`] the
    /// options' source adds or removes its pending reason.
    fn mark(&self, facet: Facet, value: bool, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().mark(facet, value, opts.contributor());
        self.node().commit(changed, opts, "mark")
    }

    fn mark_disabled(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Disabled, value, opts)
    }

    fn mark_touched(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Touched, value, opts)
    }

    fn mark_dirty(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Dirty, value, opts)
    }

    fn mark_readonly(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Readonly, value, opts)
    }

    fn mark_submitted(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Submitted, value, opts)
    }

    fn mark_pending(&self, value: bool, opts: &EventOptions) -> ChangedProps {
        self.mark(Facet::Pending, value, opts)
    }

    fn set_pending_store(&self, store: PendingStore, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().set_pending_store(store);
        self.node().commit(changed, opts, "set_pending_store")
    }

    fn set_data(&self, data: Value, opts: &EventOptions) -> ChangedProps {
        let changed = self.node().core.borrow_mut().set_data(data);
        self.node().commit(changed, opts, "set_data")
    }

    /// Ask UI adapters to move input focus to (or away from) this control.
    /// Never changes state.
    fn focus(&self, focus: bool, opts: &EventOptions) {
        if opts.no_event {
            return;
        }
        let id = self.id();
        let event = opts.build_event(id, EventKind::Focus { control_id: id, focus }, "focus");
        self.events().emit(&event);
    }

    fn emit_debug(&self, message: impl Into<String>, opts: &EventOptions)
    where
        Self: Sized,
    {
        if opts.no_event {
            return;
        }
        let id = self.id();
        let kind = EventKind::Debug {
            control_id: id,
            message: message.into(),
        };
        self.events().emit(&opts.build_event(id, kind, "debug"));
    }
}

// ============================================================================
// Control
// ============================================================================

/// A handle to any control. Cloning the handle shares the node; use
/// [`clone_control`](AbstractControl::clone_control) for an independent copy.
#[derive(Clone)]
pub enum Control {
    Leaf(LeafControl),
    Group(GroupControl),
    Array(ArrayControl),
}

/// How a container matches an incoming value against its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueMode {
    /// Every child present, no unknown keys.
    Exact,
    /// A subset of the children, no unknown keys.
    Patch,
    /// Whatever matches; unknown keys are skipped.
    Lenient,
}

impl Control {
    pub fn as_leaf(&self) -> Option<&LeafControl> {
        match self {
            Control::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupControl> {
        match self {
            Control::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayControl> {
        match self {
            Control::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Control::Leaf(_))
    }

    pub fn parent_id(&self) -> Option<ControlId> {
        self.core().parent_id()
    }

    /// Descendant at `path`; an empty path is this control.
    pub fn get(&self, path: &[ChildKey]) -> Option<Control> {
        match self {
            _ if path.is_empty() => Some(self.clone()),
            Control::Leaf(_) => None,
            Control::Group(group) => group.get(path),
            Control::Array(array) => array.get(path),
        }
    }

    /// Children in key order; empty for a leaf.
    pub fn controls(&self) -> Vec<(ChildKey, Control)> {
        match self {
            Control::Leaf(_) => Vec::new(),
            Control::Group(group) => group.controls(),
            Control::Array(array) => array.controls(),
        }
    }

    /// Set the value of this control and, for containers, every child.
    pub fn set_value(&self, value: Value, opts: &EventOptions) -> Result<ChangedProps> {
        match self {
            Control::Leaf(leaf) => Ok(leaf.set_value(value, opts)),
            Control::Group(group) => group.set_value(value, opts),
            Control::Array(array) => array.set_value(value, opts),
        }
    }

    pub fn patch_value(&self, value: Value, opts: &EventOptions) -> Result<ChangedProps> {
        match self {
            Control::Leaf(leaf) => Ok(leaf.patch_value(value, opts)),
            Control::Group(group) => group.patch_value(value, opts),
            Control::Array(array) => array.patch_value(value, opts),
        }
    }

    pub(crate) fn check_value(&self, value: &Value, mode: ValueMode) -> Result<()> {
        match self {
            Control::Leaf(_) => Ok(()),
            Control::Group(group) => group.check_value(value, mode),
            Control::Array(array) => array.check_value(value, mode),
        }
    }

    /// Write a value already accepted by [`check_value`](Self::check_value).
    pub(crate) fn write_value(&self, value: &Value, mode: ValueMode, opts: &EventOptions) -> ChangedProps {
        match self {
            Control::Leaf(leaf) => leaf.set_value(value.clone(), opts),
            Control::Group(group) => group.write_value(value, mode, opts),
            Control::Array(array) => array.write_value(value, mode, opts),
        }
    }

    pub(crate) fn check_event(&self, event: &ControlEvent) -> Result<()> {
        match self {
            Control::Leaf(leaf) => leaf.check_event(event),
            Control::Group(group) => group.check_event(event),
            Control::Array(array) => array.check_event(event),
        }
    }

    /// Apply an event already accepted by [`check_event`](Self::check_event).
    pub(crate) fn apply_event(&self, event: &ControlEvent) -> Option<ControlEvent> {
        match self {
            Control::Leaf(leaf) => leaf.apply_event(event),
            Control::Group(group) => group.apply_event(event),
            Control::Array(array) => array.apply_event(event),
        }
    }

    /// Mark `facet` on every child, and on theirs when `deep`. No-op for a
    /// leaf.
    pub fn mark_children(&self, facet: Facet, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        match self {
            Control::Leaf(_) => ChangedProps::new(),
            Control::Group(group) => group.mark_children(facet, value, deep, opts),
            Control::Array(array) => array.mark_children(facet, value, deep, opts),
        }
    }
}

impl AbstractControl for Control {
    fn node(&self) -> &Node {
        match self {
            Control::Leaf(leaf) => leaf.node(),
            Control::Group(group) => group.node(),
            Control::Array(array) => array.node(),
        }
    }

    fn kind(&self) -> ControlKind {
        match self {
            Control::Leaf(_) => ControlKind::Leaf,
            Control::Group(_) => ControlKind::Group,
            Control::Array(_) => ControlKind::Array,
        }
    }

    fn process_event(&self, event: &ControlEvent) -> Result<Option<ControlEvent>> {
        self.check_event(event)?;
        Ok(self.apply_event(event))
    }

    fn replay_state(&self, opts: ReplayOptions) -> ControlEvent {
        match self {
            Control::Leaf(leaf) => leaf.replay_state(opts),
            Control::Group(group) => group.replay_state(opts),
            Control::Array(array) => array.replay_state(opts),
        }
    }

    fn clone_control(&self) -> Self {
        match self {
            Control::Leaf(leaf) => Control::Leaf(leaf.clone_control()),
            Control::Group(group) => Control::Group(group.clone_control()),
            Control::Array(array) => Control::Array(array.clone_control()),
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        match self {
            Control::Leaf(leaf) => leaf.snapshot(),
            Control::Group(group) => group.snapshot(),
            Control::Array(array) => array.snapshot(),
        }
    }

    fn read_prop(&self, prop: Prop) -> Option<PropValue> {
        match self {
            Control::Leaf(leaf) => leaf.read_prop(prop),
            Control::Group(group) => group.read_prop(prop),
            Control::Array(array) => array.read_prop(prop),
        }
    }
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Control {}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.id())
    }
}

impl From<LeafControl> for Control {
    fn from(leaf: LeafControl) -> Self {
        Control::Leaf(leaf)
    }
}

impl From<GroupControl> for Control {
    fn from(group: GroupControl) -> Self {
        Control::Group(group)
    }
}

impl From<ArrayControl> for Control {
    fn from(array: ArrayControl) -> Self {
        Control::Array(array)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Plain, identity-free picture of a control tree, for structural
/// comparison and serialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub kind: ControlKind,
    pub raw_value: Value,
    pub value: Value,
    pub self_flags: FacetFlags,
    pub flags: FacetFlags,
    pub self_errors: Option<ValidationErrors>,
    pub errors: ErrorMap,
    pub pending_store: PendingStore,
    pub status: ControlStatus,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSnapshot {
    pub key: ChildKey,
    pub state: StateSnapshot,
}

impl StateSnapshot {
    pub(crate) fn of(core: &ControlCore, kind: ControlKind, children: Vec<ChildSnapshot>) -> Self {
        Self {
            kind,
            raw_value: core.raw_value().clone(),
            value: core.value().clone(),
            self_flags: core.self_flags(),
            flags: core.flags(),
            self_errors: core.self_errors().cloned(),
            errors: core.errors().clone(),
            pending_store: core.pending_store().clone(),
            status: core.status(),
            data: core.data().clone(),
            children,
        }
    }
}
