//! Event envelopes, mutation options and the per-control event stream.
//!
//! Every control owns an [`EventStream`]. Mutations that change something
//! emit one [`ControlEvent`] on it; observers subscribe and get every event in
//! emission order, synchronously, inside the mutating call.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::id::{ControlId, Contributor};
use crate::key::ChildKey;
use crate::prop::ChangeSet;

/// Free-form metadata collaborators attach to events to tag and filter them.
pub type Meta = BTreeMap<String, Value>;

/// Typed loop-prevention tag.
///
/// When a container dispatches a mutation down to a child it stamps its own
/// id here. The child's resulting event carries the stamp back up, which is
/// how the container recognises "caused by me" and folds the event into the
/// batch in flight instead of re-broadcasting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub container: Option<ControlId>,
}

impl Provenance {
    pub fn from_container(id: ControlId) -> Self {
        Self { container: Some(id) }
    }

    pub fn is_from(&self, id: ControlId) -> bool {
        self.container == Some(id)
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    /// Who caused the change: the mutated control unless the caller named
    /// itself in [`EventOptions::source`].
    pub source: ControlId,
    pub kind: EventKind,
    pub meta: Meta,
    pub provenance: Provenance,
    /// Breadcrumb naming the operation that produced the event.
    pub debug_path: String,
    /// Exclude from [`observe`](crate::AbstractControl::observe) callbacks.
    /// Full stream subscribers still see the event.
    pub no_observe: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    StateChange(StateChange),
    /// Raw value changed; external synchronous validators may run.
    ValidationStart { control_id: ControlId, value: Value },
    /// Raw value changed; external async validators may mark pending.
    AsyncValidationStart { control_id: ControlId, value: Value },
    /// One-shot request for a UI adapter to move input focus.
    Focus { control_id: ControlId, focus: bool },
    /// A child's non-state-change event, re-wrapped by its container.
    ChildEvent { key: ChildKey, event: Box<ControlEvent> },
    Debug { control_id: ControlId, message: String },
}

impl EventKind {
    /// The control a targeted (non-state-change) event is addressed to.
    pub fn target(&self) -> Option<ControlId> {
        match self {
            EventKind::ValidationStart { control_id, .. }
            | EventKind::AsyncValidationStart { control_id, .. }
            | EventKind::Focus { control_id, .. }
            | EventKind::Debug { control_id, .. } => Some(*control_id),
            EventKind::StateChange(_) | EventKind::ChildEvent { .. } => None,
        }
    }
}

/// Payload of a state-change event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChange {
    /// Exactly the properties that changed, with their new values.
    pub changes: ChangeSet,
    /// Per-child deltas that produced this change, for containers. A linked
    /// peer replays these by key instead of reconstructing them.
    pub child_events: BTreeMap<ChildKey, ControlEvent>,
}

impl ControlEvent {
    pub fn state_change(&self) -> Option<&StateChange> {
        match &self.kind {
            EventKind::StateChange(change) => Some(change),
            _ => None,
        }
    }

    pub fn is_state_change(&self) -> bool {
        matches!(self.kind, EventKind::StateChange(_))
    }

    /// Copy with the provenance restamped for dispatch into a child.
    pub(crate) fn dispatched_by(&self, container: ControlId) -> ControlEvent {
        let mut event = self.clone();
        event.provenance = Provenance::from_container(container);
        event
    }
}

// ============================================================================
// Mutation options
// ============================================================================

/// Options accepted by every mutator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    /// Who is making the change. Also the contributor for `set_errors`,
    /// `patch_errors`, `mark_pending` and single-validator `set_validators`;
    /// `None` means the control itself.
    pub source: Option<ControlId>,
    pub meta: Meta,
    pub provenance: Provenance,
    /// Suppress this control's own event. Children touched by a container
    /// operation still emit theirs.
    pub no_event: bool,
    pub no_observe: bool,
    pub debug_path: Option<String>,
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: ControlId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn silent(mut self) -> Self {
        self.no_event = true;
        self
    }

    pub fn no_observe(mut self) -> Self {
        self.no_observe = true;
        self
    }

    pub fn debug_path(mut self, path: impl Into<String>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    /// Error/validator/pending contributor these options stand for.
    pub fn contributor(&self) -> Contributor {
        self.source.map_or(Contributor::Own, Contributor::Source)
    }

    /// Options replaying an incoming event: its source, meta, provenance,
    /// breadcrumb and observe flag.
    pub fn from_event(event: &ControlEvent) -> Self {
        Self {
            source: Some(event.source),
            meta: event.meta.clone(),
            provenance: event.provenance,
            no_event: false,
            no_observe: event.no_observe,
            debug_path: Some(event.debug_path.clone()),
        }
    }

    /// Options a container hands to its children during a batch.
    pub(crate) fn for_child(&self, container: ControlId) -> Self {
        Self {
            source: self.source,
            meta: self.meta.clone(),
            provenance: Provenance::from_container(container),
            no_event: false,
            no_observe: self.no_observe,
            debug_path: self.debug_path.clone(),
        }
    }

    pub(crate) fn build_event(&self, control_id: ControlId, kind: EventKind, operation: &str) -> ControlEvent {
        ControlEvent {
            source: self.source.unwrap_or(control_id),
            kind,
            meta: self.meta.clone(),
            provenance: self.provenance,
            debug_path: self.debug_path.clone().unwrap_or_else(|| format!("{control_id}::{operation}")),
            no_observe: self.no_observe,
        }
    }
}

// ============================================================================
// Event stream
// ============================================================================

type Callback = Rc<dyn Fn(&ControlEvent)>;

struct StreamInner {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(u64, Callback)>>,
}

/// Append-only, multi-subscriber stream of a control's events.
///
/// Subscribers run synchronously in registration order. Emission iterates a
/// snapshot of the subscriber list, so callbacks may subscribe, unsubscribe
/// or emit on the same stream without invalidating the loop.
#[derive(Clone)]
pub struct EventStream {
    inner: Rc<StreamInner>,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StreamInner {
                next_id: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn(&ControlEvent) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.subscribers.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            stream: Rc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub(crate) fn emit(&self, event: &ControlEvent) {
        let callbacks: Vec<Callback> = self.inner.subscribers.borrow().iter().map(|(_, cb)| Rc::clone(cb)).collect();
        tracing::trace!(
            source = %event.source,
            path = %event.debug_path,
            subscribers = callbacks.len(),
            "emit"
        );
        for callback in callbacks {
            callback(event);
        }
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard for a stream subscription; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    stream: Weak<StreamInner>,
    id: u64,
}

impl Subscription {
    /// Keep the callback registered for the stream's whole lifetime.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.subscribers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.stream.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn debug_event(message: &str) -> ControlEvent {
        EventOptions::new().build_event(
            ControlId::new(),
            EventKind::Debug {
                control_id: ControlId::new(),
                message: message.to_owned(),
            },
            "test",
        )
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let stream = EventStream::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = stream.subscribe(move |e| {
            if let EventKind::Debug { message, .. } = &e.kind {
                s.borrow_mut().push(message.clone());
            }
        });

        stream.emit(&debug_event("a"));
        stream.emit(&debug_event("b"));
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let stream = EventStream::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = stream.subscribe(move |_| c.set(c.get() + 1));
        assert_eq!(stream.subscriber_count(), 1);

        stream.emit(&debug_event("x"));
        drop(sub);
        stream.emit(&debug_event("y"));
        assert_eq!(count.get(), 1);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let stream = EventStream::new();
        stream.subscribe(|_| {}).detach();
        assert_eq!(stream.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_can_unsubscribe_during_emit() {
        let stream = EventStream::new();
        let holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let h = Rc::clone(&holder);
        let sub = stream.subscribe(move |_| {
            h.borrow_mut().take();
        });
        *holder.borrow_mut() = Some(sub);

        stream.emit(&debug_event("x"));
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn options_build_envelopes() {
        let ui = ControlId::new();
        let control = ControlId::new();
        let opts = EventOptions::new().source(ui).meta("origin", json!("keyboard")).no_observe();
        let event = opts.build_event(
            control,
            EventKind::Focus {
                control_id: control,
                focus: true,
            },
            "focus",
        );
        assert_eq!(event.source, ui);
        assert_eq!(event.meta["origin"], json!("keyboard"));
        assert!(event.no_observe);
        assert!(event.debug_path.ends_with("::focus"));
        assert_eq!(event.kind.target(), Some(control));

        assert_eq!(opts.contributor(), Contributor::Source(ui));
        assert_eq!(EventOptions::new().contributor(), Contributor::Own);
    }

    #[test]
    fn child_options_are_stamped_and_never_silent() {
        let parent = ControlId::new();
        let opts = EventOptions::new().silent().for_child(parent);
        assert!(opts.provenance.is_from(parent));
        assert!(!opts.no_event);
    }
}
