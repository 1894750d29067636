//! String-keyed containers.

use std::collections::BTreeSet;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::{ContainerControl, ContainerInner, ContainerKind};
use crate::config::ControlConfig;
use crate::control::{Control, ControlKind, ParentRef};
use crate::error::{ControlError, Result};
use crate::event::EventOptions;
use crate::key::ChildKey;
use crate::prop::ChangedProps;

/// Marker for object-shaped containers.
#[derive(Debug, Clone, Copy)]
pub struct Keyed;

/// Object-like container; children keep insertion order.
pub type GroupControl = ContainerControl<Keyed>;

impl ContainerKind for Keyed {
    const KIND: ControlKind = ControlKind::Group;
    const SHAPE: &'static str = "object";
    const MATCH_BY_KEY: bool = true;

    fn normalize(key: &ChildKey) -> Option<ChildKey> {
        Some(match key {
            ChildKey::Name(name) => ChildKey::Name(name.clone()),
            ChildKey::Index(index) => ChildKey::Name(index.to_string()),
        })
    }

    fn slot_key(_position: usize, key: &ChildKey) -> ChildKey {
        ChildKey::Name(key.to_string())
    }

    fn entries(value: &Value) -> Option<Vec<(ChildKey, &Value)>> {
        let object = value.as_object()?;
        Some(object.iter().map(|(k, v)| (ChildKey::Name(k.clone()), v)).collect())
    }

    fn assemble(entries: Vec<(ChildKey, Value)>) -> Value {
        let object: Map<String, Value> = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Value::Object(object)
    }

    fn unknown_key(key: &ChildKey, _len: usize) -> ControlError {
        ControlError::UnknownChildKey(key.clone())
    }

    fn parent_ref(inner: &Rc<ContainerInner<Self>>) -> ParentRef {
        ParentRef::Group {
            id: inner.node.id,
            inner: Rc::downgrade(inner),
        }
    }
}

fn keyed<S, C>(controls: impl IntoIterator<Item = (S, C)>) -> Result<Vec<(ChildKey, Control)>>
where
    S: Into<String>,
    C: Into<Control>,
{
    let mut seen = BTreeSet::new();
    controls
        .into_iter()
        .map(|(name, control)| {
            let key = ChildKey::Name(name.into());
            if !seen.insert(key.clone()) {
                return Err(ControlError::DuplicateChildKey(key));
            }
            Ok((key, control.into()))
        })
        .collect()
}

impl ContainerControl<Keyed> {
    /// ```ignore
    /// let form = GroupControl::new([
    ///     ("name", Control::from(LeafControl::new(json!("")))),
    ///     ("tags", ArrayControl::new(Vec::<Control>::new()).into()),
    /// ])?;
    /// ```
    pub fn new<S, C>(controls: impl IntoIterator<Item = (S, C)>) -> Result<Self>
    where
        S: Into<String>,
        C: Into<Control>,
    {
        Self::with_config(controls, ControlConfig::new())
    }

    pub fn with_config<S, C>(controls: impl IntoIterator<Item = (S, C)>, config: ControlConfig) -> Result<Self>
    where
        S: Into<String>,
        C: Into<Control>,
    {
        Ok(Self::build(keyed(controls)?, config))
    }

    pub fn control(&self, name: &str) -> Option<Control> {
        self.child(&ChildKey::from(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.control(name).is_some()
    }

    /// Replace every child.
    pub fn set_controls<S, C>(&self, controls: impl IntoIterator<Item = (S, C)>, opts: &EventOptions) -> Result<ChangedProps>
    where
        S: Into<String>,
        C: Into<Control>,
    {
        let desired = keyed(controls)?;
        Ok(self.restructure(desired, opts, "set_controls"))
    }

    /// Put `control` under `name`, replacing any child already there.
    pub fn set_control(&self, name: impl Into<String>, control: impl Into<Control>, opts: &EventOptions) -> ChangedProps {
        let key = ChildKey::Name(name.into());
        let control = control.into();
        let mut desired = self.controls();
        match desired.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = control,
            None => desired.push((key, control)),
        }
        self.restructure(desired, opts, "set_control")
    }

    /// Add `control` under `name` unless that key is taken.
    pub fn add_control(&self, name: impl Into<String>, control: impl Into<Control>, opts: &EventOptions) -> ChangedProps {
        let name = name.into();
        if self.contains(&name) {
            return ChangedProps::new();
        }
        self.set_control(name, control, opts)
    }

    pub fn remove_control(&self, name: &str, opts: &EventOptions) -> Result<ChangedProps> {
        let key = ChildKey::from(name);
        let mut desired = self.controls();
        let before = desired.len();
        desired.retain(|(k, _)| *k != key);
        if desired.len() == before {
            return Err(ControlError::UnknownChildKey(key));
        }
        Ok(self.restructure(desired, opts, "remove_control"))
    }
}
