//! Integer-indexed, order-preserving containers.

use std::rc::Rc;

use serde_json::Value;

use super::{ContainerControl, ContainerInner, ContainerKind};
use crate::config::ControlConfig;
use crate::control::{AbstractControl, Control, ControlKind, ParentRef};
use crate::error::{ControlError, Result};
use crate::event::EventOptions;
use crate::id::ControlId;
use crate::key::ChildKey;
use crate::prop::ChangedProps;

/// Marker for array-shaped containers.
#[derive(Debug, Clone, Copy)]
pub struct Indexed;

/// Array-like container. Children are keyed by position and renumbered on
/// every splice.
pub type ArrayControl = ContainerControl<Indexed>;

impl ContainerKind for Indexed {
    const KIND: ControlKind = ControlKind::Array;
    const SHAPE: &'static str = "array";
    const MATCH_BY_KEY: bool = false;

    fn normalize(key: &ChildKey) -> Option<ChildKey> {
        key.as_index().map(ChildKey::Index)
    }

    fn slot_key(position: usize, _key: &ChildKey) -> ChildKey {
        ChildKey::Index(position)
    }

    fn entries(value: &Value) -> Option<Vec<(ChildKey, &Value)>> {
        let items = value.as_array()?;
        Some(items.iter().enumerate().map(|(i, v)| (ChildKey::Index(i), v)).collect())
    }

    fn assemble(entries: Vec<(ChildKey, Value)>) -> Value {
        Value::Array(entries.into_iter().map(|(_, v)| v).collect())
    }

    fn unknown_key(key: &ChildKey, len: usize) -> ControlError {
        match key.as_index() {
            Some(index) => ControlError::InvalidIndex { index, len },
            None => ControlError::UnknownChildKey(key.clone()),
        }
    }

    fn parent_ref(inner: &Rc<ContainerInner<Self>>) -> ParentRef {
        ParentRef::Array {
            id: inner.node.id,
            inner: Rc::downgrade(inner),
        }
    }
}

fn indexed(controls: impl IntoIterator<Item = Control>) -> Vec<(ChildKey, Control)> {
    controls
        .into_iter()
        .enumerate()
        .map(|(i, control)| (ChildKey::Index(i), control))
        .collect()
}

impl ContainerControl<Indexed> {
    pub fn new<C: Into<Control>>(controls: impl IntoIterator<Item = C>) -> Self {
        Self::with_config(controls, ControlConfig::new())
    }

    pub fn with_config<C: Into<Control>>(controls: impl IntoIterator<Item = C>, config: ControlConfig) -> Self {
        Self::build(indexed(controls.into_iter().map(Into::into)), config)
    }

    pub fn at(&self, index: usize) -> Option<Control> {
        self.child(&ChildKey::Index(index))
    }

    /// Current index of the child with `id`.
    pub fn position_of(&self, id: ControlId) -> Option<usize> {
        self.controls().iter().position(|(_, control)| control.id() == id)
    }

    fn children(&self) -> Vec<Control> {
        self.controls().into_iter().map(|(_, control)| control).collect()
    }

    fn splice(&self, children: Vec<Control>, opts: &EventOptions, operation: &str) -> ChangedProps {
        self.restructure(indexed(children), opts, operation)
    }

    pub fn set_controls<C: Into<Control>>(&self, controls: impl IntoIterator<Item = C>, opts: &EventOptions) -> ChangedProps {
        let children = controls.into_iter().map(Into::into).collect();
        self.splice(children, opts, "set_controls")
    }

    /// Replace the child at `index`.
    pub fn set_control(&self, index: usize, control: impl Into<Control>, opts: &EventOptions) -> Result<ChangedProps> {
        let mut children = self.children();
        let len = children.len();
        let slot = children.get_mut(index).ok_or(ControlError::InvalidIndex { index, len })?;
        *slot = control.into();
        Ok(self.splice(children, opts, "set_control"))
    }

    pub fn push(&self, control: impl Into<Control>, opts: &EventOptions) -> ChangedProps {
        let mut children = self.children();
        children.push(control.into());
        self.splice(children, opts, "push")
    }

    pub fn unshift(&self, control: impl Into<Control>, opts: &EventOptions) -> ChangedProps {
        let mut children = self.children();
        children.insert(0, control.into());
        self.splice(children, opts, "unshift")
    }

    /// Insert at `index` (`0..=len`), shifting later children up.
    pub fn insert(&self, index: usize, control: impl Into<Control>, opts: &EventOptions) -> Result<ChangedProps> {
        let mut children = self.children();
        let len = children.len();
        if index > len {
            return Err(ControlError::InvalidIndex { index, len });
        }
        children.insert(index, control.into());
        Ok(self.splice(children, opts, "insert"))
    }

    /// Remove the child at `index`, shifting later children down.
    pub fn remove_control(&self, index: usize, opts: &EventOptions) -> Result<ChangedProps> {
        let mut children = self.children();
        let len = children.len();
        if index >= len {
            return Err(ControlError::InvalidIndex { index, len });
        }
        children.remove(index);
        Ok(self.splice(children, opts, "remove_control"))
    }
}
