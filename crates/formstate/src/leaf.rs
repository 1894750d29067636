//! Leaf controls: a single value with no children.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::aggregate::Aggregates;
use crate::config::ControlConfig;
use crate::control::{AbstractControl, ControlKind, Node, ReplayOptions, StateSnapshot};
use crate::core::ControlCore;
use crate::error::{ControlError, Result};
use crate::event::{ControlEvent, EventKind, EventOptions, StateChange};
use crate::prop::{ChangeSet, ChangedProps, Prop, PropValue};

/// A control holding one JSON value.
///
/// Cloning the handle shares the control.
#[derive(Clone)]
pub struct LeafControl {
    node: Rc<Node>,
}

impl LeafControl {
    pub fn new(value: Value) -> Self {
        Self::with_config(value, ControlConfig::new())
    }

    pub fn with_config(value: Value, config: ControlConfig) -> Self {
        let core = ControlCore::new(config, value.clone(), value, Aggregates::default());
        Self {
            node: Rc::new(Node::new(core)),
        }
    }

    pub fn set_value(&self, value: Value, opts: &EventOptions) -> ChangedProps {
        let changed = self.node.core.borrow_mut().set_raw_value(value);
        self.node.commit(changed, opts, "set_value")
    }

    /// Same as [`set_value`](Self::set_value) for a leaf.
    pub fn patch_value(&self, value: Value, opts: &EventOptions) -> ChangedProps {
        let changed = self.node.core.borrow_mut().set_raw_value(value);
        self.node.commit(changed, opts, "patch_value")
    }

    pub(crate) fn check_event(&self, event: &ControlEvent) -> Result<()> {
        match &event.kind {
            EventKind::StateChange(change) => {
                if !change.child_events.is_empty() {
                    return Err(ControlError::IncompatibleEvent {
                        kind: ControlKind::Leaf,
                        reason: "child events",
                    });
                }
                check_payload(&change.changes, ControlKind::Leaf)
            }
            EventKind::ChildEvent { .. } => Err(ControlError::IncompatibleEvent {
                kind: ControlKind::Leaf,
                reason: "child event envelope",
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn apply_event(&self, event: &ControlEvent) -> Option<ControlEvent> {
        let EventKind::StateChange(change) = &event.kind else {
            return self.node.echo(event);
        };

        let mut changed = ChangedProps::new();
        {
            let mut core = self.node.core.borrow_mut();
            for (prop, value) in change.changes.iter() {
                match (prop, value) {
                    (Prop::RawValue, PropValue::Json(raw)) => changed.extend(core.set_raw_value(raw.clone())),
                    _ => {
                        if let Some(props) = core.apply(prop, value) {
                            changed.extend(props);
                        }
                    }
                }
            }
        }

        if changed.is_empty() {
            tracing::debug!(control = %self.id(), path = %event.debug_path, "event changed nothing");
            return None;
        }
        let changes = self.node.core.borrow().change_set(&changed);
        self.node
            .emit_state(changes, Default::default(), &EventOptions::from_event(event), "process_event")
    }
}

/// Reject payloads whose settable properties carry the wrong kind of value,
/// or that a `kind` control cannot hold at all.
pub(crate) fn check_payload(changes: &ChangeSet, kind: ControlKind) -> Result<()> {
    for (prop, value) in changes.iter() {
        if !prop.is_settable() {
            continue;
        }
        let fits = match (prop, value) {
            (Prop::Controls, PropValue::Controls(_)) => kind != ControlKind::Leaf,
            (Prop::RawValue | Prop::Data, PropValue::Json(_)) => true,
            (Prop::ValidatorStore, PropValue::Validators(_)) => true,
            (Prop::ErrorsStore, PropValue::ErrorsStore(_)) => true,
            (Prop::PendingStore, PropValue::Pending(_)) => true,
            (
                Prop::SelfDisabled | Prop::SelfTouched | Prop::SelfDirty | Prop::SelfReadonly | Prop::SelfSubmitted,
                PropValue::Flag(_),
            ) => true,
            _ => false,
        };
        if !fits {
            return Err(ControlError::IncompatibleEvent {
                kind,
                reason: prop.name(),
            });
        }
    }
    Ok(())
}

impl AbstractControl for LeafControl {
    fn node(&self) -> &Node {
        &self.node
    }

    fn kind(&self) -> ControlKind {
        ControlKind::Leaf
    }

    fn process_event(&self, event: &ControlEvent) -> Result<Option<ControlEvent>> {
        self.check_event(event)?;
        Ok(self.apply_event(event))
    }

    fn replay_state(&self, _opts: ReplayOptions) -> ControlEvent {
        let changes = self.core().change_set(Prop::LEAF);
        EventOptions::new().build_event(
            self.id(),
            EventKind::StateChange(StateChange {
                changes,
                child_events: Default::default(),
            }),
            "replay_state",
        )
    }

    fn clone_control(&self) -> Self {
        let clone = Self::with_config(Value::Null, self.core().sibling_config());
        clone.apply_event(&self.replay_state(ReplayOptions::default()));
        clone
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::of(&self.core(), ControlKind::Leaf, Vec::new())
    }
}

impl PartialEq for LeafControl {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for LeafControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafControl")
            .field("id", &self.id())
            .field("raw_value", self.core().raw_value())
            .field("status", &self.status())
            .finish()
    }
}
