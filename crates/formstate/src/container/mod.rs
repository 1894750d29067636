//! Container controls: keyed ([`GroupControl`]) and indexed
//! ([`ArrayControl`]) collections of children.
//!
//! A container composes a [`ControlCore`] for its own state and derives its
//! raw value, value and child aggregates from its children after every
//! change.
//!
//! # Batches
//!
//! Operations that touch several children (`set_value`, `mark_children`,
//! structural changes, external event processing) run as a batch: the
//! container hands each child options stamped with its own
//! [`Provenance`](crate::Provenance), and the child events that come back
//! with that stamp are folded into the batch instead of being re-broadcast.
//! When the batch closes the container re-aggregates once and emits a single
//! state change whose `child_events` hold one delta per touched child.
//!
//! Targeted child events (focus, validation starts, nested envelopes) carrying
//! the container's stamp are not folded: inside a batch they are re-wrapped
//! as [`ChildEvent`](crate::EventKind::ChildEvent) envelopes and emitted
//! after the batch's state change. Outside a batch the only stamped targeted
//! event is one the container is forwarding from a peer, and the container
//! re-emits that envelope itself once the child accepts it, so the child's
//! copy is dropped.
//!
//! A child mutated directly, outside any batch of its container, bubbles up
//! immediately as a state change carrying that child's event.
//!
//! # Reconciling a peer's children
//!
//! An incoming `Controls` payload names a peer's children, not ours. Each
//! entry resolves to, in order: a child already registered here, the local
//! child previously matched to that peer child, the local child under the
//! same key (same position for arrays), or else a clone of the peer's child.
//! Matches must be of the same [`ControlKind`]. The incoming event is checked
//! against this resolved list before anything is applied.

mod array;
mod group;

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde_json::Value;

pub use array::{ArrayControl, Indexed};
pub use group::{GroupControl, Keyed};

use crate::aggregate::{aggregate, Aggregates, ChildView};
use crate::config::ControlConfig;
use crate::control::{
    AbstractControl, ChildSnapshot, Control, ControlKind, Node, ParentRef, ReplayOptions, StateSnapshot, ValueMode,
};
use crate::core::ControlCore;
use crate::error::{ControlError, Result};
use crate::event::{ControlEvent, EventKind, EventOptions, Provenance, StateChange, Subscription};
use crate::facet::Facet;
use crate::id::ControlId;
use crate::key::ChildKey;
use crate::leaf::check_payload;
use crate::prop::{ChangeSet, ChangedProps, Prop, PropValue};

/// The shape of a container: how children are keyed and how their values
/// assemble into the container's value.
pub trait ContainerKind: Sized + 'static {
    const KIND: ControlKind;

    /// JSON kind a value for this container must have.
    #[doc(hidden)]
    const SHAPE: &'static str;

    /// Whether incoming children from a peer match existing ones by key. An
    /// indexed container only matches positions when lengths agree.
    #[doc(hidden)]
    const MATCH_BY_KEY: bool;

    /// Canonical form of a lookup key, `None` if it can never address a child.
    #[doc(hidden)]
    fn normalize(key: &ChildKey) -> Option<ChildKey>;

    /// Key for the child at `position` when adopting a peer's child list.
    #[doc(hidden)]
    fn slot_key(position: usize, key: &ChildKey) -> ChildKey;

    #[doc(hidden)]
    fn entries(value: &Value) -> Option<Vec<(ChildKey, &Value)>>;

    #[doc(hidden)]
    fn assemble(entries: Vec<(ChildKey, Value)>) -> Value;

    #[doc(hidden)]
    fn unknown_key(key: &ChildKey, len: usize) -> ControlError;

    #[doc(hidden)]
    fn parent_ref(inner: &Rc<ContainerInner<Self>>) -> ParentRef;
}

// ============================================================================
// State
// ============================================================================

#[doc(hidden)]
pub struct ContainerInner<K> {
    node: Node,
    children: RefCell<Children>,
    kind: PhantomData<K>,
}

#[derive(Default)]
struct Children {
    slots: Vec<Slot>,
    /// Open batches, innermost last.
    batches: Vec<Batch>,
    /// Peer child id to the local child it was matched with.
    peers: BTreeMap<ControlId, ControlId>,
}

struct Slot {
    key: ChildKey,
    control: Control,
    _subscription: Subscription,
}

#[derive(Default)]
struct Batch {
    child_events: BTreeMap<ChildKey, ControlEvent>,
    /// Non-state child events raised by this batch, emitted after it closes.
    wrapped: Vec<ControlEvent>,
}

impl<K> Drop for ContainerInner<K> {
    fn drop(&mut self) {
        for slot in self.children.get_mut().slots.drain(..) {
            if let Ok(mut core) = slot.control.node().core.try_borrow_mut() {
                if core.parent_id() == Some(self.node.id) {
                    core.set_parent(None);
                }
            }
        }
    }
}

/// A collection of child controls whose state folds into its own.
///
/// Cloning the handle shares the container.
pub struct ContainerControl<K: ContainerKind> {
    inner: Rc<ContainerInner<K>>,
}

impl<K: ContainerKind> Clone for ContainerControl<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: ContainerKind> ContainerControl<K> {
    pub(crate) fn build(children: Vec<(ChildKey, Control)>, config: ControlConfig) -> Self {
        let empty = K::assemble(Vec::new());
        let core = ControlCore::new(config, empty.clone(), empty, Aggregates::default());
        let container = Self {
            inner: Rc::new(ContainerInner {
                node: Node::new(core),
                children: RefCell::new(Children::default()),
                kind: PhantomData,
            }),
        };
        container.replace_children(children);
        container.refresh();
        container
    }

    pub(crate) fn from_inner(inner: Rc<ContainerInner<K>>) -> Self {
        Self { inner }
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Children in key order.
    pub fn controls(&self) -> Vec<(ChildKey, Control)> {
        self.inner
            .children
            .borrow()
            .slots
            .iter()
            .map(|slot| (slot.key.clone(), slot.control.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.children.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn child(&self, key: &ChildKey) -> Option<Control> {
        let key = K::normalize(key)?;
        self.inner
            .children
            .borrow()
            .slots
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| slot.control.clone())
    }

    /// Descendant at `path`, walking through nested containers.
    pub fn get(&self, path: &[ChildKey]) -> Option<Control> {
        let (first, rest) = path.split_first()?;
        self.child(first)?.get(rest)
    }

    fn key_of(&self, id: ControlId) -> Option<ChildKey> {
        self.inner
            .children
            .borrow()
            .slots
            .iter()
            .find(|slot| slot.control.id() == id)
            .map(|slot| slot.key.clone())
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    /// Set every child's value. The value must address exactly the current
    /// children; nothing changes if it does not.
    pub fn set_value(&self, value: Value, opts: &EventOptions) -> Result<ChangedProps> {
        self.check_value(&value, ValueMode::Exact)?;
        Ok(self.write_value(&value, ValueMode::Exact, opts))
    }

    /// Set the values of some children. Unknown keys are an error.
    pub fn patch_value(&self, value: Value, opts: &EventOptions) -> Result<ChangedProps> {
        self.check_value(&value, ValueMode::Patch)?;
        Ok(self.write_value(&value, ValueMode::Patch, opts))
    }

    pub(crate) fn check_value(&self, value: &Value, mode: ValueMode) -> Result<()> {
        Self::check_value_against(&self.controls(), value, mode)
    }

    fn check_value_against(children: &[(ChildKey, Control)], value: &Value, mode: ValueMode) -> Result<()> {
        let entries = K::entries(value).ok_or_else(|| ControlError::shape(K::SHAPE, value))?;
        for (key, child_value) in &entries {
            match children.iter().find(|(k, _)| k == key) {
                Some((_, child)) => child.check_value(child_value, mode)?,
                None if mode == ValueMode::Lenient => {}
                None => return Err(K::unknown_key(key, children.len())),
            }
        }
        if mode == ValueMode::Exact {
            if let Some((missing, _)) = children.iter().find(|(k, _)| !entries.iter().any(|(e, _)| e == k)) {
                return Err(ControlError::MissingChildKey(missing.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn write_value(&self, value: &Value, mode: ValueMode, opts: &EventOptions) -> ChangedProps {
        let operation = match mode {
            ValueMode::Exact => "set_value",
            ValueMode::Patch => "patch_value",
            ValueMode::Lenient => "sync_value",
        };
        self.batch(opts, operation, |child_opts| {
            self.write_children(value, mode, child_opts);
            ChangedProps::new()
        })
    }

    fn write_children(&self, value: &Value, mode: ValueMode, child_opts: &EventOptions) {
        let Some(entries) = K::entries(value) else {
            return;
        };
        let targets: Vec<(Control, &Value)> = entries
            .into_iter()
            .filter_map(|(key, v)| self.child(&key).map(|child| (child, v)))
            .collect();
        for (child, child_value) in targets {
            child.write_value(child_value, mode, child_opts);
        }
    }

    // ------------------------------------------------------------------------
    // Facets
    // ------------------------------------------------------------------------

    /// Set `facet` on every child (and every descendant when `deep`) as one
    /// batch.
    pub fn mark_children(&self, facet: Facet, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.batch(opts, "mark_children", |child_opts| {
            for (_, child) in self.controls() {
                child.mark(facet, value, child_opts);
                if deep {
                    child.mark_children(facet, value, true, child_opts);
                }
            }
            ChangedProps::new()
        })
    }

    pub fn mark_children_disabled(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Disabled, value, deep, opts)
    }

    pub fn mark_children_touched(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Touched, value, deep, opts)
    }

    pub fn mark_children_dirty(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Dirty, value, deep, opts)
    }

    pub fn mark_children_readonly(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Readonly, value, deep, opts)
    }

    pub fn mark_children_submitted(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Submitted, value, deep, opts)
    }

    pub fn mark_children_pending(&self, value: bool, deep: bool, opts: &EventOptions) -> ChangedProps {
        self.mark_children(Facet::Pending, value, deep, opts)
    }

    // ------------------------------------------------------------------------
    // Batching and aggregation
    // ------------------------------------------------------------------------

    fn batch(&self, opts: &EventOptions, operation: &str, f: impl FnOnce(&EventOptions) -> ChangedProps) -> ChangedProps {
        self.run_batch(opts, operation, f).0
    }

    fn run_batch(
        &self,
        opts: &EventOptions,
        operation: &str,
        f: impl FnOnce(&EventOptions) -> ChangedProps,
    ) -> (ChangedProps, Option<ControlEvent>) {
        self.inner.children.borrow_mut().batches.push(Batch::default());
        let mut changed = f(&opts.for_child(self.id()));
        let batch = self.inner.children.borrow_mut().batches.pop().unwrap_or_default();

        changed.extend(self.refresh());
        let changes = self.change_set(&changed);
        let emitted = self.inner.node.emit_state(changes, batch.child_events, opts, operation);
        if !opts.no_event {
            for mut wrapped in batch.wrapped {
                wrapped.provenance = opts.provenance;
                self.inner.node.events.emit(&wrapped);
            }
        }
        (changed, emitted)
    }

    /// Recompute raw value, value and aggregates from the children.
    fn refresh(&self) -> ChangedProps {
        let (raw_value, value, aggregates) = {
            let children = self.inner.children.borrow();
            let mut raw = Vec::with_capacity(children.slots.len());
            let mut enabled = Vec::with_capacity(children.slots.len());
            let mut views = Vec::with_capacity(children.slots.len());
            for slot in &children.slots {
                let core = slot.control.core();
                raw.push((slot.key.clone(), core.raw_value().clone()));
                if !core.flags().disabled {
                    enabled.push((slot.key.clone(), core.value().clone()));
                }
                views.push(ChildView {
                    key: slot.key.clone(),
                    flags: core.flags(),
                    errors: core.errors().clone(),
                });
            }
            (K::assemble(raw), K::assemble(enabled), aggregate(&views))
        };
        self.inner.node.core.borrow_mut().set_derived(raw_value, value, aggregates)
    }

    fn change_set(&self, changed: &ChangedProps) -> ChangeSet {
        let mut changes = self.inner.node.core.borrow().change_set(changed);
        if changed.contains(Prop::Controls) {
            changes.insert(Prop::Controls, PropValue::Controls(self.controls()));
        }
        changes
    }

    fn on_child_event(&self, child_id: ControlId, event: &ControlEvent) {
        let Some(key) = self.key_of(child_id) else {
            return;
        };
        let dispatched_here = event.provenance.is_from(self.id());

        if event.is_state_change() {
            if dispatched_here && self.fold_into_batch(&key, event) {
                return;
            }
            let changed = self.refresh();
            let opts = EventOptions {
                source: Some(event.source),
                meta: event.meta.clone(),
                provenance: Provenance::default(),
                no_event: false,
                no_observe: event.no_observe,
                debug_path: Some(event.debug_path.clone()),
            };
            let changes = self.change_set(&changed);
            self.inner
                .node
                .emit_state(changes, BTreeMap::from([(key, event.clone())]), &opts, "child_change");
            return;
        }

        let wrapped = ControlEvent {
            source: event.source,
            kind: EventKind::ChildEvent {
                key,
                event: Box::new(event.clone()),
            },
            meta: event.meta.clone(),
            provenance: Provenance::default(),
            debug_path: event.debug_path.clone(),
            no_observe: event.no_observe,
        };
        if dispatched_here {
            // outside a batch, apply_event re-emits the envelope itself
            if let Some(batch) = self.inner.children.borrow_mut().batches.last_mut() {
                batch.wrapped.push(wrapped);
            }
            return;
        }
        self.inner.node.events.emit(&wrapped);
    }

    fn fold_into_batch(&self, key: &ChildKey, event: &ControlEvent) -> bool {
        let mut children = self.inner.children.borrow_mut();
        let Some(batch) = children.batches.last_mut() else {
            return false;
        };
        tracing::trace!(container = %self.inner.node.id, key = %key, "folding child event into batch");
        match batch.child_events.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
            }
            Entry::Occupied(mut slot) => fold_event(slot.get_mut(), event),
        }
        true
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Run a structural change as a batch.
    fn restructure(&self, desired: Vec<(ChildKey, Control)>, opts: &EventOptions, operation: &str) -> ChangedProps {
        self.batch(opts, operation, |_| self.replace_children(desired))
    }

    /// Make `desired` the child list. Children already registered here keep
    /// their subscription; children of another container are cloned; removed
    /// children are detached.
    fn replace_children(&self, desired: Vec<(ChildKey, Control)>) -> ChangedProps {
        let before: Vec<(ChildKey, ControlId)> = self.slot_ids();
        let mut old = std::mem::take(&mut self.inner.children.borrow_mut().slots);

        let mut slots = Vec::with_capacity(desired.len());
        for (key, control) in desired {
            if let Some(pos) = old.iter().position(|slot| slot.control.id() == control.id()) {
                let mut slot = old.remove(pos);
                slot.key = key;
                slots.push(slot);
                continue;
            }
            let control = if control.parent_id().is_some() {
                control.clone_control()
            } else {
                control
            };
            control.node().core.borrow_mut().set_parent(Some(K::parent_ref(&self.inner)));
            let subscription = self.watch(&control);
            tracing::trace!(container = %self.inner.node.id, child = %control.id(), key = %key, "registered child");
            slots.push(Slot {
                key,
                control,
                _subscription: subscription,
            });
        }

        for slot in &old {
            let mut core = slot.control.node().core.borrow_mut();
            if core.parent_id() == Some(self.inner.node.id) {
                core.set_parent(None);
            }
        }
        {
            let mut children = self.inner.children.borrow_mut();
            children
                .peers
                .retain(|_, local| slots.iter().any(|slot| slot.control.id() == *local));
            children.slots = slots;
        }
        drop(old);

        let mut changed = ChangedProps::new();
        if self.slot_ids() != before {
            changed.insert(Prop::Controls);
        }
        changed
    }

    fn slot_ids(&self) -> Vec<(ChildKey, ControlId)> {
        self.inner
            .children
            .borrow()
            .slots
            .iter()
            .map(|slot| (slot.key.clone(), slot.control.id()))
            .collect()
    }

    fn watch(&self, control: &Control) -> Subscription {
        let container = Rc::downgrade(&self.inner);
        let child_id = control.id();
        control.events().subscribe(move |event| {
            if let Some(inner) = container.upgrade() {
                ContainerControl::<K>::from_inner(inner).on_child_event(child_id, event);
            }
        })
    }

    /// Adopt a peer's child list, keeping every local child that matches.
    fn reconcile_controls(&self, incoming: &[(ChildKey, Control)]) -> ChangedProps {
        let changed = self.replace_children(self.resolve_controls(incoming));

        let local = self.slot_ids();
        let mut children = self.inner.children.borrow_mut();
        for ((_, peer), (_, local_id)) in incoming.iter().zip(&local) {
            if peer.id() != *local_id {
                children.peers.insert(peer.id(), *local_id);
            }
        }
        changed
    }

    /// The child list `incoming` resolves to. Reads only.
    fn resolve_controls(&self, incoming: &[(ChildKey, Control)]) -> Vec<(ChildKey, Control)> {
        let id = self.id();
        let current = self.controls();
        let peers = self.inner.children.borrow().peers.clone();
        let local = |child_id: ControlId| current.iter().map(|(_, c)| c).find(|c| c.id() == child_id);

        // own children and remembered peers first, so a fallback never takes
        // a child some later entry is already matched with
        let mut claimed = BTreeSet::new();
        let mut resolved: Vec<Option<Control>> = incoming
            .iter()
            .map(|(_, control)| {
                let matched = if control.parent_id() == Some(id) {
                    Some(control.clone())
                } else {
                    peers
                        .get(&control.id())
                        .and_then(|local_id| local(*local_id))
                        .filter(|c| c.kind() == control.kind())
                        .cloned()
                };
                matched.filter(|c| claimed.insert(c.id()))
            })
            .collect();

        for (position, ((key, control), slot)) in incoming.iter().zip(&mut resolved).enumerate() {
            if slot.is_some() {
                continue;
            }
            let fallback = if K::MATCH_BY_KEY {
                current.iter().find(|(k, _)| *k == K::slot_key(position, key))
            } else {
                current.get(position)
            };
            *slot = fallback
                .map(|(_, c)| c)
                .filter(|c| c.kind() == control.kind() && !claimed.contains(&c.id()))
                .cloned();
            if let Some(c) = slot {
                claimed.insert(c.id());
            }
        }

        incoming
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(position, ((key, control), slot))| {
                (K::slot_key(position, key), slot.unwrap_or_else(|| control.clone()))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Event processing
    // ------------------------------------------------------------------------

    pub(crate) fn check_event(&self, event: &ControlEvent) -> Result<()> {
        match &event.kind {
            EventKind::StateChange(change) => {
                check_payload(&change.changes, K::KIND)?;
                let children = match change.changes.get(Prop::Controls) {
                    Some(PropValue::Controls(incoming)) => self.resolve_controls(incoming),
                    _ => self.controls(),
                };
                if let Some(raw) = change.changes.json(Prop::RawValue) {
                    Self::check_value_against(&children, raw, ValueMode::Lenient)?;
                }
                for (key, child_event) in &change.child_events {
                    let child = K::normalize(key).and_then(|key| children.iter().find(|(k, _)| *k == key));
                    if let Some((_, child)) = child {
                        child.check_event(child_event)?;
                    }
                }
                Ok(())
            }
            EventKind::ChildEvent { key, event } => match self.child(key) {
                Some(child) => child.check_event(event),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn apply_event(&self, event: &ControlEvent) -> Option<ControlEvent> {
        let change = match &event.kind {
            EventKind::StateChange(change) => change,
            EventKind::ChildEvent { key, event: nested } => return self.forward_child_event(event, key, nested),
            _ => return self.inner.node.echo(event),
        };

        let opts = EventOptions::from_event(event);
        let (_, emitted) = self.run_batch(&opts, "process_event", |child_opts| {
            let mut changed = ChangedProps::new();
            if let Some(PropValue::Controls(incoming)) = change.changes.get(Prop::Controls) {
                changed.extend(self.reconcile_controls(incoming));
            }
            for (key, child_event) in &change.child_events {
                match self.child(key) {
                    Some(child) => {
                        child.apply_event(&child_event.dispatched_by(self.id()));
                    }
                    None => tracing::debug!(container = %self.inner.node.id, key = %key, "ignoring event for unknown child"),
                }
            }
            if let Some(raw) = change.changes.json(Prop::RawValue) {
                self.write_children(raw, ValueMode::Lenient, child_opts);
            }
            // derived state first, so re-validation cannot clobber incoming error stores
            changed.extend(self.refresh());
            let mut core = self.inner.node.core.borrow_mut();
            for (prop, value) in change.changes.iter() {
                if let Some(props) = core.apply(prop, value) {
                    changed.extend(props);
                }
            }
            changed
        });

        if emitted.is_none() {
            tracing::debug!(control = %self.inner.node.id, path = %event.debug_path, "event changed nothing");
        }
        emitted
    }

    fn forward_child_event(&self, envelope: &ControlEvent, key: &ChildKey, nested: &ControlEvent) -> Option<ControlEvent> {
        let Some(child) = self.child(key) else {
            tracing::debug!(container = %self.inner.node.id, key = %key, "ignoring event for unknown child");
            return None;
        };
        child.apply_event(&nested.dispatched_by(self.id()))?;
        self.inner.node.events.emit(envelope);
        Some(envelope.clone())
    }
}

/// Merge a later event from the same child into the one already recorded.
fn fold_event(into: &mut ControlEvent, later: &ControlEvent) {
    let (EventKind::StateChange(into_change), EventKind::StateChange(later_change)) = (&mut into.kind, &later.kind) else {
        return;
    };
    into_change.changes.absorb(&later_change.changes);
    for (key, event) in &later_change.child_events {
        match into_change.child_events.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
            }
            Entry::Occupied(mut slot) => fold_event(slot.get_mut(), event),
        }
    }
}

impl<K: ContainerKind> AbstractControl for ContainerControl<K> {
    fn node(&self) -> &Node {
        &self.inner.node
    }

    fn kind(&self) -> ControlKind {
        K::KIND
    }

    fn process_event(&self, event: &ControlEvent) -> Result<Option<ControlEvent>> {
        self.check_event(event)?;
        Ok(self.apply_event(event))
    }

    fn replay_state(&self, opts: ReplayOptions) -> ControlEvent {
        let mut controls = self.controls();
        if opts.clone_children {
            for (_, control) in &mut controls {
                *control = control.clone_control();
            }
        }
        let child_events = controls
            .iter()
            .map(|(key, control)| (key.clone(), control.replay_state(ReplayOptions::default())))
            .collect();
        let mut changes = self.core().change_set(Prop::ALL);
        changes.insert(Prop::Controls, PropValue::Controls(controls));

        EventOptions::new().build_event(
            self.id(),
            EventKind::StateChange(StateChange { changes, child_events }),
            "replay_state",
        )
    }

    fn clone_control(&self) -> Self {
        let clone = Self::build(Vec::new(), self.core().sibling_config());
        clone.apply_event(&self.replay_state(ReplayOptions::cloning()));
        clone
    }

    fn snapshot(&self) -> StateSnapshot {
        let children = self
            .controls()
            .into_iter()
            .map(|(key, control)| ChildSnapshot {
                key,
                state: control.snapshot(),
            })
            .collect();
        StateSnapshot::of(&self.core(), K::KIND, children)
    }

    fn read_prop(&self, prop: Prop) -> Option<PropValue> {
        match prop {
            Prop::Controls => Some(PropValue::Controls(self.controls())),
            _ => self.core().read(prop),
        }
    }
}

impl<K: ContainerKind> PartialEq for ContainerControl<K> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K: ContainerKind> fmt::Debug for ContainerControl<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerControl")
            .field("kind", &K::KIND)
            .field("id", &self.id())
            .field("children", &self.controls())
            .field("status", &self.status())
            .finish()
    }
}
