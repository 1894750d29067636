//! State shared by every control kind.
//!
//! [`ControlCore`] owns the per-node state and implements the mutators common
//! to leaves and containers. Mutators never emit: they return the
//! [`ChangedProps`] they caused after recomputing every dependent property,
//! and the owning control packages those into an event once its borrow is
//! released.
//!
//! Recomputation order after any input changes (`settle`):
//!
//! 1. self pending from the pending store
//! 2. the control's own validator result, when the raw value, the validators
//!    or a pending -> not pending transition call for it
//! 3. self errors from the errors store
//! 4. merged errors, combined facets, status

use serde_json::Value;

use crate::aggregate::Aggregates;
use crate::config::ControlConfig;
use crate::control::ParentRef;
use crate::facet::{ControlStatus, Facet, FacetFlags};
use crate::id::{ControlId, Contributor, SharedIds};
use crate::prop::{ChangeSet, ChangedProps, Prop, PropValue};
use crate::validation::{
    combine_errors, merge_errors, patch_contribution, run_validators, with_contribution, ErrorMap, ErrorsStore,
    PendingStore, ValidationErrors, ValidatorSet, ValidatorStore,
};

/// Read-only view of a control's state.
pub struct ControlCore {
    id: ControlId,
    ids: SharedIds,
    raw_value: Value,
    value: Value,
    self_flags: FacetFlags,
    flags: FacetFlags,
    validators: ValidatorStore,
    errors_store: ErrorsStore,
    self_errors: Option<ValidationErrors>,
    errors: ErrorMap,
    pending_store: PendingStore,
    aggregates: Aggregates,
    data: Value,
    status: ControlStatus,
    parent: Option<ParentRef>,
}

impl ControlCore {
    pub(crate) fn new(config: ControlConfig, raw_value: Value, value: Value, aggregates: Aggregates) -> Self {
        let ids = config.id_generator();
        let id = ids.next_id();
        let mut pending_store = PendingStore::new();
        if config.flags.pending {
            pending_store.insert(Contributor::Own);
        }
        let has_validators = !config.validators.is_none();
        let validators = config.validators.into_store(&ValidatorStore::new(), Contributor::Own);
        let errors_store = with_contribution(&ErrorsStore::new(), Contributor::Own, config.errors);

        let mut core = Self {
            id,
            ids,
            raw_value,
            value,
            self_flags: config.flags.with(Facet::Pending, false),
            flags: FacetFlags::default(),
            validators,
            errors_store,
            self_errors: None,
            errors: ErrorMap::new(),
            pending_store,
            aggregates,
            data: config.data,
            status: ControlStatus::Valid,
            parent: None,
        };
        let mut ignored = ChangedProps::new();
        core.settle(&mut ignored, has_validators);
        core
    }

    /// Config that reproduces this control's id generator, for building a
    /// fresh control of the same family.
    pub(crate) fn sibling_config(&self) -> ControlConfig {
        ControlConfig::new().ids(self.ids.clone())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn raw_value(&self) -> &Value {
        &self.raw_value
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn self_flags(&self) -> FacetFlags {
        self.self_flags
    }

    pub fn flags(&self) -> FacetFlags {
        self.flags
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    pub fn validators(&self) -> &ValidatorStore {
        &self.validators
    }

    pub fn errors_store(&self) -> &ErrorsStore {
        &self.errors_store
    }

    pub fn self_errors(&self) -> Option<&ValidationErrors> {
        self.self_errors.as_ref()
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn pending_store(&self) -> &PendingStore {
        &self.pending_store
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn status(&self) -> ControlStatus {
        self.status
    }

    pub fn parent_id(&self) -> Option<ControlId> {
        self.parent.as_ref().map(ParentRef::id)
    }

    pub(crate) fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
    }

    /// Current value of `prop`. `None` for [`Prop::Controls`], which only
    /// the owning container can answer.
    pub(crate) fn read(&self, prop: Prop) -> Option<PropValue> {
        let value = match prop {
            Prop::Controls => return None,
            Prop::RawValue => PropValue::Json(self.raw_value.clone()),
            Prop::Value => PropValue::Json(self.value.clone()),
            Prop::ValidatorStore => PropValue::Validators(self.validators.clone()),
            Prop::ErrorsStore => PropValue::ErrorsStore(self.errors_store.clone()),
            Prop::SelfErrors => PropValue::SelfErrors(self.self_errors.clone()),
            Prop::ChildErrors => PropValue::Errors(self.aggregates.child_errors.clone()),
            Prop::Errors => PropValue::Errors(self.errors.clone()),
            Prop::PendingStore => PropValue::Pending(self.pending_store.clone()),
            Prop::ChildInvalid => PropValue::Flag(self.aggregates.child_invalid),
            Prop::ChildrenInvalid => PropValue::Flag(self.aggregates.children_invalid),
            Prop::Data => PropValue::Json(self.data.clone()),
            Prop::Status => PropValue::Status(self.status),
            flag => PropValue::Flag(self.read_flag(flag)?),
        };
        Some(value)
    }

    fn read_flag(&self, prop: Prop) -> Option<bool> {
        Facet::ALL.into_iter().find_map(|facet| {
            if prop == facet.self_prop() {
                Some(self.self_flags.get(facet))
            } else if prop == facet.child_prop() {
                Some(self.aggregates.any.get(facet))
            } else if prop == facet.children_prop() {
                Some(self.aggregates.all.get(facet))
            } else if prop == facet.prop() {
                Some(self.flags.get(facet))
            } else {
                None
            }
        })
    }

    /// Change set holding the current value of each of `props`.
    pub(crate) fn change_set(&self, props: impl IntoIterator<Item = Prop>) -> ChangeSet {
        props
            .into_iter()
            .filter_map(|prop| self.read(prop).map(|value| (prop, value)))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------------

    /// Leaf raw value. The value a leaf exposes is its raw value.
    pub(crate) fn set_raw_value(&mut self, raw_value: Value) -> ChangedProps {
        let mut changed = ChangedProps::new();
        if raw_value == self.raw_value {
            return changed;
        }
        self.value = raw_value.clone();
        self.raw_value = raw_value;
        changed.insert(Prop::RawValue);
        changed.insert(Prop::Value);
        self.settle(&mut changed, false);
        changed
    }

    /// Container raw value, value and child aggregates, recomputed from the
    /// children.
    pub(crate) fn set_derived(&mut self, raw_value: Value, value: Value, aggregates: Aggregates) -> ChangedProps {
        let mut changed = ChangedProps::new();
        if raw_value != self.raw_value {
            self.raw_value = raw_value;
            changed.insert(Prop::RawValue);
        }
        if value != self.value {
            self.value = value;
            changed.insert(Prop::Value);
        }
        if aggregates != self.aggregates {
            let old = &self.aggregates;
            for facet in Facet::ALL {
                if old.any.get(facet) != aggregates.any.get(facet) {
                    changed.insert(facet.child_prop());
                }
                if old.all.get(facet) != aggregates.all.get(facet) {
                    changed.insert(facet.children_prop());
                }
            }
            if old.child_invalid != aggregates.child_invalid {
                changed.insert(Prop::ChildInvalid);
            }
            if old.children_invalid != aggregates.children_invalid {
                changed.insert(Prop::ChildrenInvalid);
            }
            if old.child_errors != aggregates.child_errors {
                changed.insert(Prop::ChildErrors);
            }
            self.aggregates = aggregates;
        }
        if !changed.is_empty() {
            self.settle(&mut changed, false);
        }
        changed
    }

    pub(crate) fn set_validators(&mut self, validators: ValidatorSet, contributor: Contributor) -> ChangedProps {
        let store = validators.into_store(&self.validators, contributor);
        self.set_validator_store(store)
    }

    pub(crate) fn set_validator_store(&mut self, store: ValidatorStore) -> ChangedProps {
        let mut changed = ChangedProps::new();
        if store == self.validators {
            return changed;
        }
        self.validators = store;
        changed.insert(Prop::ValidatorStore);
        self.settle(&mut changed, false);
        changed
    }

    pub(crate) fn set_errors(&mut self, contributor: Contributor, errors: Option<ValidationErrors>) -> ChangedProps {
        let store = with_contribution(&self.errors_store, contributor, errors);
        self.set_errors_store(store)
    }

    pub(crate) fn patch_errors(&mut self, contributor: Contributor, partial: ValidationErrors) -> ChangedProps {
        let store = patch_contribution(&self.errors_store, contributor, partial);
        self.set_errors_store(store)
    }

    pub(crate) fn set_errors_store(&mut self, store: ErrorsStore) -> ChangedProps {
        let mut changed = ChangedProps::new();
        let store: ErrorsStore = store.into_iter().filter(|(_, e)| !e.is_empty()).collect();
        if store == self.errors_store {
            return changed;
        }
        self.errors_store = store;
        changed.insert(Prop::ErrorsStore);
        self.settle(&mut changed, false);
        changed
    }

    /// Set the control's own flag for `facet`. Pending is a reason set: the
    /// flag adds or removes `contributor`.
    pub(crate) fn mark(&mut self, facet: Facet, value: bool, contributor: Contributor) -> ChangedProps {
        if facet == Facet::Pending {
            let mut store = self.pending_store.clone();
            if value {
                store.insert(contributor);
            } else {
                store.remove(&contributor);
            }
            return self.set_pending_store(store);
        }

        let mut changed = ChangedProps::new();
        if self.self_flags.get(facet) == value {
            return changed;
        }
        self.self_flags.set(facet, value);
        changed.insert(facet.self_prop());
        self.settle(&mut changed, false);
        changed
    }

    pub(crate) fn set_pending_store(&mut self, store: PendingStore) -> ChangedProps {
        let mut changed = ChangedProps::new();
        if store == self.pending_store {
            return changed;
        }
        self.pending_store = store;
        changed.insert(Prop::PendingStore);
        self.settle(&mut changed, false);
        changed
    }

    pub(crate) fn set_data(&mut self, data: Value) -> ChangedProps {
        let mut changed = ChangedProps::new();
        if data == self.data {
            return changed;
        }
        self.data = data;
        changed.insert(Prop::Data);
        changed
    }

    /// Apply one settable, non-structural property from an incoming event.
    /// Returns `None` for properties the owning control handles itself
    /// (controls, raw value) and for derived properties.
    pub(crate) fn apply(&mut self, prop: Prop, value: &PropValue) -> Option<ChangedProps> {
        let changed = match (prop, value) {
            (Prop::ValidatorStore, PropValue::Validators(store)) => self.set_validator_store(store.clone()),
            (Prop::ErrorsStore, PropValue::ErrorsStore(store)) => self.set_errors_store(store.clone()),
            (Prop::PendingStore, PropValue::Pending(store)) => self.set_pending_store(store.clone()),
            (Prop::Data, PropValue::Json(data)) => self.set_data(data.clone()),
            (prop, PropValue::Flag(flag)) => {
                let facet = Facet::ALL.into_iter().find(|f| f.self_prop() == prop && *f != Facet::Pending)?;
                self.mark(facet, *flag, Contributor::Own)
            }
            _ => return None,
        };
        Some(changed)
    }

    // ------------------------------------------------------------------------
    // Recomputation
    // ------------------------------------------------------------------------

    fn settle(&mut self, changed: &mut ChangedProps, force_validation: bool) {
        let was_pending = self.self_flags.pending;
        let now_pending = !self.pending_store.is_empty();
        if was_pending != now_pending {
            self.self_flags.pending = now_pending;
            changed.insert(Prop::SelfPending);
        }

        let revalidate = force_validation
            || changed.contains(Prop::RawValue)
            || changed.contains(Prop::ValidatorStore)
            || (was_pending && !now_pending);
        if revalidate {
            let own = run_validators(&self.validators, &self.raw_value);
            let store = with_contribution(&self.errors_store, Contributor::Own, own);
            if store != self.errors_store {
                self.errors_store = store;
                changed.insert(Prop::ErrorsStore);
            }
        }

        let self_errors = merge_errors(&self.errors_store);
        if self_errors != self.self_errors {
            self.self_errors = self_errors;
            changed.insert(Prop::SelfErrors);
        }

        let errors = combine_errors(self.self_errors.as_ref(), &self.aggregates.child_errors);
        if errors != self.errors {
            self.errors = errors;
            changed.insert(Prop::Errors);
        }

        for facet in Facet::ALL {
            let combined = self.self_flags.get(facet) || self.aggregates.combining(facet);
            if combined != self.flags.get(facet) {
                self.flags.set(facet, combined);
                changed.insert(facet.prop());
            }
        }

        let status = ControlStatus::derive(self.flags.disabled, self.flags.pending, !self.errors.is_empty());
        if status != self.status {
            self.status = status;
            changed.insert(Prop::Status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validators;
    use serde_json::json;

    fn leaf_core(value: Value, config: ControlConfig) -> ControlCore {
        ControlCore::new(config, value.clone(), value, Aggregates::default())
    }

    #[test]
    fn construction_runs_validators() {
        let core = leaf_core(json!(""), ControlConfig::new().validator(validators::required()));
        assert_eq!(core.status(), ControlStatus::Invalid);
        assert!(core.errors().contains_key("self"));
        assert!(core.errors_store().contains_key(&Contributor::Own));
    }

    #[test]
    fn initial_pending_is_own_reason() {
        let core = leaf_core(json!(1), ControlConfig::new().pending(true));
        assert!(core.self_flags().pending);
        assert!(core.pending_store().contains(&Contributor::Own));
        assert_eq!(core.status(), ControlStatus::Pending);
    }

    #[test]
    fn raw_value_change_revalidates() {
        let mut core = leaf_core(json!("x"), ControlConfig::new().validator(validators::required()));
        assert_eq!(core.status(), ControlStatus::Valid);

        let changed = core.set_raw_value(json!(""));
        assert_eq!(
            changed.as_slice(),
            &[
                Prop::RawValue,
                Prop::Value,
                Prop::ErrorsStore,
                Prop::SelfErrors,
                Prop::Errors,
                Prop::Status
            ]
        );
        assert!(core.set_raw_value(json!("")).is_empty());
    }

    #[test]
    fn mark_is_noop_when_equal() {
        let mut core = leaf_core(json!(null), ControlConfig::new());
        let changed = core.mark(Facet::Touched, true, Contributor::Own);
        assert_eq!(changed.as_slice(), &[Prop::SelfTouched, Prop::Touched]);
        assert!(core.mark(Facet::Touched, true, Contributor::Own).is_empty());
    }

    #[test]
    fn disabled_wins_status() {
        let mut core = leaf_core(json!(""), ControlConfig::new().validator(validators::required()));
        let changed = core.mark(Facet::Disabled, true, Contributor::Own);
        assert!(changed.contains(Prop::Status));
        assert_eq!(core.status(), ControlStatus::Disabled);
    }

    #[test]
    fn pending_reasons_are_independent() {
        let mut core = leaf_core(json!(1), ControlConfig::new());
        let a = Contributor::Source(ControlId::new());
        let b = Contributor::Source(ControlId::new());

        core.mark(Facet::Pending, true, a);
        core.mark(Facet::Pending, true, b);
        core.mark(Facet::Pending, false, a);
        assert!(core.flags().pending);

        let changed = core.mark(Facet::Pending, false, b);
        assert!(changed.contains(Prop::SelfPending));
        assert!(changed.contains(Prop::Pending));
        assert!(!core.flags().pending);
    }

    #[test]
    fn pending_release_revalidates() {
        let mut core = leaf_core(json!(""), ControlConfig::new().validator(validators::required()));
        let ui = Contributor::Source(ControlId::new());
        // a bare payload under Own is overwritten by the next validation pass
        core.set_errors(Contributor::Own, None);
        assert!(core.errors().is_empty());

        core.mark(Facet::Pending, true, ui);
        let changed = core.mark(Facet::Pending, false, ui);
        assert!(changed.contains(Prop::ErrorsStore));
        assert!(core.errors().contains_key("self"));
    }

    #[test]
    fn external_errors_do_not_collide_with_own() {
        let mut core = leaf_core(json!(""), ControlConfig::new().validator(validators::required()));
        let server = Contributor::Source(ControlId::new());
        core.set_errors(
            server,
            Some(ValidationErrors::from([("taken".to_owned(), json!(true))])),
        );
        assert_eq!(core.errors_store().len(), 2);

        core.set_raw_value(json!("bob"));
        assert_eq!(core.errors_store().len(), 1);
        assert!(core.errors_store().contains_key(&server));
        assert_eq!(core.status(), ControlStatus::Invalid);
    }

    #[test]
    fn apply_ignores_derived_props() {
        let mut core = leaf_core(json!(1), ControlConfig::new());
        assert!(core.apply(Prop::Touched, &PropValue::Flag(true)).is_none());
        assert!(core.apply(Prop::Status, &PropValue::Status(ControlStatus::Invalid)).is_none());
        assert!(core.apply(Prop::SelfPending, &PropValue::Flag(true)).is_none());
        let changed = core.apply(Prop::SelfDirty, &PropValue::Flag(true)).unwrap();
        assert!(changed.contains(Prop::Dirty));
    }

    #[test]
    fn read_covers_every_leaf_prop() {
        let core = leaf_core(json!(1), ControlConfig::new());
        for prop in Prop::LEAF {
            assert!(core.read(prop).is_some(), "{prop:?}");
        }
        assert!(core.read(Prop::Controls).is_none());
    }
}
