//! Change-aggregation utilities: how children's facets and errors fold into a
//! container.

use crate::facet::{Facet, FacetFlags};
use crate::key::ChildKey;
use crate::validation::{rekey_child_errors, ErrorMap};

/// True as soon as one item is true. Stops consuming at the first `true`.
pub fn any_true(items: impl IntoIterator<Item = bool>) -> bool {
    items.into_iter().any(|b| b)
}

/// True if there is at least one item and every item is true. Stops
/// consuming at the first `false`.
pub fn all_true(items: impl IntoIterator<Item = bool>) -> bool {
    let mut seen = false;
    for item in items {
        if !item {
            return false;
        }
        seen = true;
    }
    seen
}

/// What a container reads from one child when aggregating.
#[derive(Debug, Clone)]
pub struct ChildView {
    pub key: ChildKey,
    pub flags: FacetFlags,
    pub errors: ErrorMap,
}

impl ChildView {
    fn enabled(&self) -> bool {
        !self.flags.disabled
    }

    fn invalid(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Children's contribution to a container's derived state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    /// "Any contributing child" per facet.
    pub any: FacetFlags,
    /// "All contributing children" per facet.
    pub all: FacetFlags,
    pub child_invalid: bool,
    pub children_invalid: bool,
    /// Enabled children's errors, re-keyed per child.
    pub child_errors: ErrorMap,
}

/// Per-facet running any/all state that stops updating once decided.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    any: bool,
    all: bool,
    seen: bool,
}

impl Accumulator {
    const fn new() -> Self {
        Self {
            any: false,
            all: true,
            seen: false,
        }
    }

    fn decided(&self) -> bool {
        self.any && !self.all
    }

    fn push(&mut self, value: bool) {
        self.seen = true;
        if self.decided() {
            return;
        }
        self.any |= value;
        self.all &= value;
    }

    fn finish(self) -> (bool, bool) {
        (self.any, self.seen && self.all)
    }
}

/// Fold children into [`Aggregates`].
///
/// Disabled children only count toward the disabled facet; every other facet,
/// validity and the error map consider enabled children alone.
pub fn aggregate<'a>(children: impl IntoIterator<Item = &'a ChildView>) -> Aggregates {
    let mut facets = [Accumulator::new(); 6];
    let mut invalid = Accumulator::new();
    let mut child_errors = ErrorMap::new();

    for child in children {
        for (slot, facet) in facets.iter_mut().zip(Facet::ALL) {
            if facet.counts_disabled_children() || child.enabled() {
                slot.push(child.flags.get(facet));
            }
        }
        if child.enabled() {
            invalid.push(child.invalid());
            rekey_child_errors(&child.key, &child.errors, &mut child_errors);
        }
    }

    let mut aggregates = Aggregates {
        child_errors,
        ..Aggregates::default()
    };
    for (slot, facet) in facets.into_iter().zip(Facet::ALL) {
        let (any, all) = slot.finish();
        aggregates.any.set(facet, any);
        aggregates.all.set(facet, all);
    }
    (aggregates.child_invalid, aggregates.children_invalid) = invalid.finish();
    aggregates
}

impl Aggregates {
    /// The aggregated input a facet's combined flag is OR-ed with.
    pub fn combining(&self, facet: Facet) -> bool {
        if facet.combines_all() {
            self.all.get(facet)
        } else {
            self.any.get(facet)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrors;
    use serde_json::json;

    fn view(key: &str, flags: FacetFlags) -> ChildView {
        ChildView {
            key: ChildKey::from(key),
            flags,
            errors: ErrorMap::new(),
        }
    }

    #[test]
    fn reducers_handle_empty_input() {
        assert!(!any_true([]));
        assert!(!all_true([]));
        assert!(all_true([true, true]));
        assert!(!all_true([true, false]));
        assert!(any_true([false, true]));
    }

    #[test]
    fn all_true_short_circuits() {
        let mut consumed = 0;
        let result = all_true([false, true, true].into_iter().inspect(|_| consumed += 1));
        assert!(!result);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn disabled_children_only_count_for_disabled() {
        let a = view("a", FacetFlags::default().with(Facet::Touched, true));
        let b = view(
            "b",
            FacetFlags::default().with(Facet::Disabled, true).with(Facet::Dirty, true),
        );
        let agg = aggregate([&a, &b]);

        assert!(agg.any.disabled);
        assert!(!agg.all.disabled);
        assert!(agg.any.touched);
        assert!(agg.all.touched, "only enabled child a counts");
        assert!(!agg.any.dirty, "disabled child b is excluded");
    }

    #[test]
    fn all_disabled_means_children_disabled() {
        let off = FacetFlags::default().with(Facet::Disabled, true);
        let agg = aggregate([&view("a", off), &view("b", off)]);
        assert!(agg.all.disabled);
        assert!(agg.combining(Facet::Disabled));
        // nothing enabled left to be touched
        assert!(!agg.any.touched && !agg.all.touched);
    }

    #[test]
    fn errors_rekeyed_and_disabled_children_dropped() {
        let mut errors = ErrorMap::new();
        errors.insert("self".into(), ValidationErrors::from([("required".to_owned(), json!(true))]));

        let mut a = view("a", FacetFlags::default());
        a.errors = errors.clone();
        let mut b = view("b", FacetFlags::default().with(Facet::Disabled, true));
        b.errors = errors;

        let agg = aggregate([&a, &b]);
        assert!(agg.child_invalid);
        assert!(agg.children_invalid);
        assert_eq!(agg.child_errors.keys().collect::<Vec<_>>(), vec!["self__a"]);
    }

    #[test]
    fn combining_picks_any_or_all() {
        let agg = aggregate([
            &view("a", FacetFlags::default().with(Facet::Touched, true).with(Facet::Readonly, true)),
            &view("b", FacetFlags::default()),
        ]);
        assert!(agg.combining(Facet::Touched));
        assert!(!agg.combining(Facet::Readonly));
    }
}
