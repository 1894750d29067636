//! Validation data: error payloads, contributor stores, validators.
//!
//! Errors are plain data. A control keeps an [`ErrorsStore`] mapping each
//! [`Contributor`] to the payload it supplied; the flat merge of all payloads
//! is the control's *self errors*. A container additionally folds its
//! children's error maps into its own [`ErrorMap`], re-keyed per child so no
//! contributor ever overwrites another.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::id::{Contributor, SELF_MARKER};
use crate::key::ChildKey;

/// One contributor's error payload: error name to detail, e.g.
/// `{"required": true}`.
pub type ValidationErrors = BTreeMap<String, Value>;

/// Contributor to payload. Entries are never empty.
pub type ErrorsStore = BTreeMap<Contributor, ValidationErrors>;

/// Merged error view of a control: `"self"` holds the control's own errors,
/// `"self__<key>..."` entries hold descendants' errors.
pub type ErrorMap = BTreeMap<String, ValidationErrors>;

/// Set of contributors currently holding the control pending.
pub type PendingStore = BTreeSet<Contributor>;

/// Contributor to validator.
pub type ValidatorStore = BTreeMap<Contributor, Validator>;

// ============================================================================
// Validator
// ============================================================================

/// A synchronous validator over a control's raw value.
///
/// Validators compare by identity: two handles are equal only if they share
/// the same function, which is what makes `set_validators` with the same
/// store a no-op.
#[derive(Clone)]
pub struct Validator(Rc<dyn Fn(&Value) -> Option<ValidationErrors>>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Option<ValidationErrors> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn validate(&self, value: &Value) -> Option<ValidationErrors> {
        (self.0)(value).filter(|errors| !errors.is_empty())
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({:p})", Rc::as_ptr(&self.0))
    }
}

/// What `set_validators` accepts: one validator, several, or a full store.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidatorSet {
    #[default]
    None,
    One(Validator),
    Many(Vec<Validator>),
    Store(ValidatorStore),
}

impl ValidatorSet {
    pub fn is_none(&self) -> bool {
        matches!(self, ValidatorSet::None)
    }
}

impl From<Validator> for ValidatorSet {
    fn from(v: Validator) -> Self {
        ValidatorSet::One(v)
    }
}

impl From<Vec<Validator>> for ValidatorSet {
    fn from(v: Vec<Validator>) -> Self {
        ValidatorSet::Many(v)
    }
}

impl From<ValidatorStore> for ValidatorSet {
    fn from(store: ValidatorStore) -> Self {
        ValidatorSet::Store(store)
    }
}

impl From<Option<Validator>> for ValidatorSet {
    fn from(v: Option<Validator>) -> Self {
        v.map_or(ValidatorSet::None, ValidatorSet::One)
    }
}

impl ValidatorSet {
    /// Resolve against `current`, filing single/multiple validators under
    /// `contributor`.
    pub(crate) fn into_store(self, current: &ValidatorStore, contributor: Contributor) -> ValidatorStore {
        let mut store = current.clone();
        match self {
            ValidatorSet::Store(replacement) => return replacement,
            ValidatorSet::None => {
                store.remove(&contributor);
            }
            ValidatorSet::One(v) => {
                store.insert(contributor, v);
            }
            ValidatorSet::Many(mut list) => match list.len() {
                0 => {
                    store.remove(&contributor);
                }
                1 => {
                    store.insert(contributor, list.remove(0));
                }
                _ => {
                    store.insert(contributor, compose(list));
                }
            },
        }
        store
    }
}

/// Combine validators into one; later validators win on error-name
/// collisions.
pub fn compose(validators: Vec<Validator>) -> Validator {
    Validator::new(move |value| {
        let mut merged = ValidationErrors::new();
        for validator in &validators {
            if let Some(errors) = validator.validate(value) {
                merged.extend(errors);
            }
        }
        (!merged.is_empty()).then_some(merged)
    })
}

/// Run every validator in the store, merged in contributor order.
pub fn run_validators(store: &ValidatorStore, value: &Value) -> Option<ValidationErrors> {
    let mut merged = ValidationErrors::new();
    for validator in store.values() {
        if let Some(errors) = validator.validate(value) {
            merged.extend(errors);
        }
    }
    (!merged.is_empty()).then_some(merged)
}

// ============================================================================
// Error store algebra
// ============================================================================

/// Flat merge of every contributor's payload.
pub fn merge_errors(store: &ErrorsStore) -> Option<ValidationErrors> {
    let mut merged = ValidationErrors::new();
    for payload in store.values() {
        merged.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    (!merged.is_empty()).then_some(merged)
}

/// Replace (or with `None`/empty, delete) one contributor's payload.
pub(crate) fn with_contribution(
    store: &ErrorsStore,
    contributor: Contributor,
    errors: Option<ValidationErrors>,
) -> ErrorsStore {
    let mut next = store.clone();
    match errors.filter(|e| !e.is_empty()) {
        Some(errors) => {
            next.insert(contributor, errors);
        }
        None => {
            next.remove(&contributor);
        }
    }
    next
}

/// Merge `partial` into one contributor's payload. A `null` detail removes
/// that error name; an emptied payload removes the contributor.
pub(crate) fn patch_contribution(
    store: &ErrorsStore,
    contributor: Contributor,
    partial: ValidationErrors,
) -> ErrorsStore {
    let mut payload = store.get(&contributor).cloned().unwrap_or_default();
    for (name, detail) in partial {
        if detail.is_null() {
            payload.remove(&name);
        } else {
            payload.insert(name, detail);
        }
    }
    with_contribution(store, contributor, Some(payload))
}

/// Copy a child's error map into `into`, re-keyed under the child's key:
/// `self` becomes `self__<key>`, `self__x` becomes `self__<key>__x`.
pub fn rekey_child_errors(key: &ChildKey, child_errors: &ErrorMap, into: &mut ErrorMap) {
    for (entry, errors) in child_errors {
        let rest = entry.strip_prefix(SELF_MARKER).unwrap_or(entry);
        into.insert(format!("{SELF_MARKER}__{key}{rest}"), errors.clone());
    }
}

/// A control's merged error map: child entries first, then its own `self`
/// entry, which wins on collision.
pub(crate) fn combine_errors(self_errors: Option<&ValidationErrors>, child_errors: &ErrorMap) -> ErrorMap {
    let mut errors = child_errors.clone();
    if let Some(own) = self_errors {
        errors.insert(SELF_MARKER.to_owned(), own.clone());
    }
    errors
}

// ============================================================================
// Built-in validators
// ============================================================================

/// Common validators. Each reports under a fixed error name.
pub mod validators {
    use serde_json::{json, Value};

    use super::{ValidationErrors, Validator};

    fn single(name: &str, detail: Value) -> Option<ValidationErrors> {
        Some(ValidationErrors::from([(name.to_owned(), detail)]))
    }

    fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    fn length(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(a) => Some(a.len()),
            _ => None,
        }
    }

    /// `{"required": true}` when the value is null, or an empty
    /// string/array/object.
    pub fn required() -> Validator {
        Validator::new(|value| if is_empty(value) { single("required", Value::Bool(true)) } else { None })
    }

    /// `{"minLength": {...}}` for strings/arrays shorter than `min`. Empty
    /// values pass; pair with [`required`].
    pub fn min_length(min: usize) -> Validator {
        Validator::new(move |value| match length(value) {
            Some(actual) if actual > 0 && actual < min => {
                single("minLength", json!({ "requiredLength": min, "actualLength": actual }))
            }
            _ => None,
        })
    }

    /// `{"maxLength": {...}}` for strings/arrays longer than `max`.
    pub fn max_length(max: usize) -> Validator {
        Validator::new(move |value| match length(value) {
            Some(actual) if actual > max => {
                single("maxLength", json!({ "requiredLength": max, "actualLength": actual }))
            }
            _ => None,
        })
    }

    /// `{"min": {...}}` for numbers below `min`.
    pub fn min(min: f64) -> Validator {
        Validator::new(move |value| match value.as_f64() {
            Some(actual) if actual < min => single("min", json!({ "min": min, "actual": actual })),
            _ => None,
        })
    }

    /// `{"max": {...}}` for numbers above `max`.
    pub fn max(max: f64) -> Validator {
        Validator::new(move |value| match value.as_f64() {
            Some(actual) if actual > max => single("max", json!({ "max": max, "actual": actual })),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;
    use super::*;
    use crate::id::ControlId;
    use serde_json::json;

    fn errs(pairs: &[(&str, Value)]) -> ValidationErrors {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn required_rejects_empty_values() {
        let v = required();
        assert!(v.validate(&json!(null)).is_some());
        assert!(v.validate(&json!("")).is_some());
        assert!(v.validate(&json!([])).is_some());
        assert!(v.validate(&json!("x")).is_none());
        assert!(v.validate(&json!(0)).is_none());
    }

    #[test]
    fn length_and_range_validators() {
        assert!(min_length(3).validate(&json!("ab")).is_some());
        assert!(min_length(3).validate(&json!("")).is_none());
        assert!(max_length(2).validate(&json!([1, 2, 3])).is_some());
        assert!(min(1.0).validate(&json!(0)).is_some());
        assert!(max(1.0).validate(&json!(1)).is_none());
    }

    #[test]
    fn compose_merges_results() {
        let v = compose(vec![required(), min_length(5)]);
        assert_eq!(v.validate(&json!("")).unwrap().keys().collect::<Vec<_>>(), vec!["required"]);
        assert!(v.validate(&json!("abc")).unwrap().contains_key("minLength"));
        assert!(v.validate(&json!("abcdef")).is_none());
    }

    #[test]
    fn validators_compare_by_identity() {
        let a = required();
        let b = required();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn null_payload_deletes_contribution() {
        let store = with_contribution(&ErrorsStore::new(), Contributor::Own, Some(errs(&[("required", json!(true))])));
        assert_eq!(store.len(), 1);
        let store = with_contribution(&store, Contributor::Own, None);
        assert!(store.is_empty());
        let store = with_contribution(&store, Contributor::Own, Some(ValidationErrors::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn patch_merges_and_null_removes() {
        let ui = Contributor::Source(ControlId::new());
        let store = patch_contribution(&ErrorsStore::new(), ui, errs(&[("a", json!(1)), ("b", json!(2))]));
        let store = patch_contribution(&store, ui, errs(&[("a", Value::Null), ("c", json!(3))]));
        assert_eq!(store[&ui], errs(&[("b", json!(2)), ("c", json!(3))]));

        let store = patch_contribution(&store, ui, errs(&[("b", Value::Null), ("c", Value::Null)]));
        assert!(store.is_empty());
    }

    #[test]
    fn merge_flattens_contributors() {
        let ui = Contributor::Source(ControlId::new());
        let mut store = ErrorsStore::new();
        store.insert(Contributor::Own, errs(&[("required", json!(true))]));
        store.insert(ui, errs(&[("server", json!("taken"))]));
        let merged = merge_errors(&store).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merge_errors(&ErrorsStore::new()).is_none());
    }

    #[test]
    fn rekey_prefixes_child_key() {
        let mut child = ErrorMap::new();
        child.insert("self".into(), errs(&[("required", json!(true))]));
        child.insert("self__street".into(), errs(&[("minLength", json!(3))]));

        let mut into = ErrorMap::new();
        rekey_child_errors(&ChildKey::from("address"), &child, &mut into);
        assert!(into.contains_key("self__address"));
        assert!(into.contains_key("self__address__street"));

        let combined = combine_errors(Some(&errs(&[("required", json!(true))])), &into);
        assert_eq!(combined.len(), 3);
        assert!(combined.contains_key("self"));
    }

    #[test]
    fn validator_set_files_under_contributor() {
        let v = required();
        let store = ValidatorSet::from(v.clone()).into_store(&ValidatorStore::new(), Contributor::Own);
        assert_eq!(store.get(&Contributor::Own), Some(&v));

        let store = ValidatorSet::None.into_store(&store, Contributor::Own);
        assert!(store.is_empty());
    }
}
