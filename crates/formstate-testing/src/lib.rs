//! Testing utilities for formstate control trees.
//!
//! - [`EventRecorder`] captures everything a control emits
//! - [`ensure_same_state`] compares two trees structurally, ignoring ids
//! - [`leaf`], [`group`], [`array`] build small trees from JSON
//!
//! ```ignore
//! use formstate_testing::{group, EventRecorder};
//! use serde_json::json;
//!
//! let form = group(json!({ "name": "Ada", "age": 36 }))?;
//! let recorder = EventRecorder::new(&form);
//! form.set_value(json!({ "name": "Grace", "age": 85 }), &EventOptions::new())?;
//! assert_eq!(recorder.state_changes().len(), 1);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, ensure, Context, Result};
use serde_json::Value;

use formstate_core::{
    AbstractControl, ArrayControl, ChildKey, Control, ControlConfig, ControlEvent, EventKind, GroupControl,
    LeafControl, Prop, SequentialIds, StateChange, StateSnapshot, Subscription,
};

// ============================================================================
// Event recording
// ============================================================================

/// Subscribes to a control and keeps every event it emits, in order.
///
/// Recording stops when the recorder is dropped.
pub struct EventRecorder {
    events: Rc<RefCell<Vec<ControlEvent>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    pub fn new<C: AbstractControl>(control: &C) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let subscription = control.events().subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Payloads of the recorded state-change events.
    pub fn state_changes(&self) -> Vec<StateChange> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| event.state_change().cloned())
            .collect()
    }

    pub fn last_state_change(&self) -> Option<StateChange> {
        self.events
            .borrow()
            .iter()
            .rev()
            .find_map(|event| event.state_change().cloned())
    }

    /// Recorded events matching `predicate`.
    pub fn matching(&self, predicate: impl Fn(&EventKind) -> bool) -> Vec<ControlEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| predicate(&event.kind))
            .cloned()
            .collect()
    }

    /// Fail unless exactly one state change was recorded and it changed
    /// `prop`.
    pub fn ensure_single_change(&self, prop: Prop) -> Result<StateChange> {
        let changes = self.state_changes();
        ensure!(changes.len() == 1, "expected one state change, recorded {}", changes.len());
        let change = changes.into_iter().next().context("no state change recorded")?;
        ensure!(
            change.changes.contains(prop),
            "state change does not touch {prop:?}: {:?}",
            change.changes.props()
        );
        Ok(change)
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder").field("events", &self.len()).finish()
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Fail unless `a` and `b` hold the same state, child by child. Identity is
/// ignored.
pub fn ensure_same_state<A: AbstractControl, B: AbstractControl>(a: &A, b: &B) -> Result<()> {
    ensure_same_snapshot(&a.snapshot(), &b.snapshot())
}

pub fn ensure_same_snapshot(a: &StateSnapshot, b: &StateSnapshot) -> Result<()> {
    if a == b {
        return Ok(());
    }
    let left = serde_json::to_string_pretty(a).context("serializing left snapshot")?;
    let right = serde_json::to_string_pretty(b).context("serializing right snapshot")?;
    bail!("control states differ\n--- left\n{left}\n--- right\n{right}")
}

/// Fail unless `change` carries an event for each of `keys` and nothing else.
pub fn ensure_child_events(change: &StateChange, keys: &[ChildKey]) -> Result<()> {
    let recorded: Vec<&ChildKey> = change.child_events.keys().collect();
    let mut expected: Vec<&ChildKey> = keys.iter().collect();
    expected.sort();
    ensure!(recorded == expected, "child events for {recorded:?}, expected {expected:?}");
    Ok(())
}

// ============================================================================
// Builders
// ============================================================================

/// Config drawing ids from a fresh sequential generator.
pub fn sequential() -> ControlConfig {
    ControlConfig::new().ids(SequentialIds::shared())
}

pub fn leaf(value: Value) -> LeafControl {
    LeafControl::new(value)
}

/// A group mirroring a JSON object: nested objects become groups, arrays
/// become arrays, anything else a leaf.
pub fn group(value: Value) -> Result<GroupControl> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => bail!("group builder needs an object, got {other}"),
    };
    let children = entries
        .into_iter()
        .map(|(name, value)| -> Result<(String, Control)> { Ok((name, control(value)?)) })
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupControl::new(children)?)
}

/// An array mirroring a JSON array, built like [`group`].
pub fn array(value: Value) -> Result<ArrayControl> {
    let items = match value {
        Value::Array(items) => items,
        other => bail!("array builder needs an array, got {other}"),
    };
    let children = items.into_iter().map(control).collect::<Result<Vec<_>>>()?;
    Ok(ArrayControl::new(children))
}

/// Any control from JSON.
pub fn control(value: Value) -> Result<Control> {
    Ok(match value {
        Value::Object(_) => group(value)?.into(),
        Value::Array(_) => array(value)?.into(),
        other => leaf(other).into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use formstate_core::EventOptions;
    use serde_json::json;

    #[test]
    fn builders_mirror_json() -> Result<()> {
        let form = group(json!({ "name": "Ada", "tags": ["x", "y"], "address": { "city": "London" } }))?;
        assert_eq!(
            form.value(),
            json!({ "name": "Ada", "tags": ["x", "y"], "address": { "city": "London" } })
        );
        assert!(form.control("tags").is_some_and(|c| c.as_array().is_some()));
        assert!(group(json!([1])).is_err());
        Ok(())
    }

    #[test]
    fn recorder_sees_events_until_dropped() -> Result<()> {
        let control = leaf(json!(1));
        let recorder = EventRecorder::new(&control);
        control.set_value(json!(2), &EventOptions::new());
        recorder.ensure_single_change(Prop::RawValue)?;
        assert_eq!(recorder.len(), 3);

        recorder.clear();
        assert!(recorder.is_empty());
        drop(recorder);
        assert_eq!(control.events().subscriber_count(), 0);
        Ok(())
    }

    #[test]
    fn same_state_ignores_identity() -> Result<()> {
        let a = group(json!({ "n": 1 }))?;
        let b = group(json!({ "n": 1 }))?;
        ensure_same_state(&a, &b)?;

        b.control("n").context("missing child")?.mark_touched(true, &EventOptions::new());
        assert!(ensure_same_state(&a, &b).is_err());
        Ok(())
    }
}
