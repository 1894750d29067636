//! Construction-time configuration.

use std::fmt;

use serde_json::Value;

use crate::facet::{Facet, FacetFlags};
use crate::id::{default_ids, SharedIds};
use crate::validation::{ValidationErrors, Validator, ValidatorSet};

/// Initial state and collaborators for a new control.
///
/// ```ignore
/// let email = LeafControl::with_config(
///     json!(""),
///     ControlConfig::new()
///         .validator(validators::required())
///         .touched(true)
///         .ids(SequentialIds::shared()),
/// );
/// ```
#[derive(Clone, Default)]
pub struct ControlConfig {
    pub(crate) ids: Option<SharedIds>,
    pub(crate) flags: FacetFlags,
    pub(crate) validators: ValidatorSet,
    pub(crate) errors: Option<ValidationErrors>,
    pub(crate) data: Value,
}

impl ControlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id generator for this control. Clones and containers built from this
    /// control reuse it.
    pub fn ids(mut self, ids: SharedIds) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn flag(mut self, facet: Facet, value: bool) -> Self {
        self.flags.set(facet, value);
        self
    }

    pub fn disabled(self, value: bool) -> Self {
        self.flag(Facet::Disabled, value)
    }

    pub fn touched(self, value: bool) -> Self {
        self.flag(Facet::Touched, value)
    }

    pub fn dirty(self, value: bool) -> Self {
        self.flag(Facet::Dirty, value)
    }

    pub fn readonly(self, value: bool) -> Self {
        self.flag(Facet::Readonly, value)
    }

    pub fn submitted(self, value: bool) -> Self {
        self.flag(Facet::Submitted, value)
    }

    /// Start pending under the control's own contributor.
    pub fn pending(self, value: bool) -> Self {
        self.flag(Facet::Pending, value)
    }

    /// Add one validator to the control's own validator.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators = match std::mem::take(&mut self.validators) {
            ValidatorSet::None => ValidatorSet::One(validator),
            ValidatorSet::One(existing) => ValidatorSet::Many(vec![existing, validator]),
            ValidatorSet::Many(mut list) => {
                list.push(validator);
                ValidatorSet::Many(list)
            }
            ValidatorSet::Store(mut store) => {
                store.insert(crate::id::Contributor::Own, validator);
                ValidatorSet::Store(store)
            }
        };
        self
    }

    /// Replace the validator set.
    pub fn validators(mut self, validators: impl Into<ValidatorSet>) -> Self {
        self.validators = validators.into();
        self
    }

    /// Initial errors, filed under the control's own contributor. A control
    /// with validators recomputes them immediately.
    pub fn errors(mut self, errors: ValidationErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn id_generator(&self) -> SharedIds {
        self.ids.clone().unwrap_or_else(default_ids)
    }
}

impl fmt::Debug for ControlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlConfig")
            .field("custom_ids", &self.ids.is_some())
            .field("flags", &self.flags)
            .field("validators", &self.validators)
            .field("errors", &self.errors)
            .field("data", &self.data)
            .finish()
    }
}
