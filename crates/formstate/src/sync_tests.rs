//! Linking tests.
//!
//! Two controls linked both ways must converge after a single exchange:
//! each side applies the other's event once, and the echo changes nothing.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::{
    link, link_two_way, validators, AbstractControl, ArrayControl, ChildKey, ControlConfig, ControlError,
    ControlEvent, ControlKind, EventKind, EventOptions, GroupControl, LeafControl, Prop, PropValue, ReplayOptions,
    StateChange, Subscription,
};

fn opts() -> EventOptions {
    EventOptions::new()
}

fn leaf(value: Value) -> LeafControl {
    LeafControl::new(value)
}

fn record<C: AbstractControl>(control: &C) -> (Rc<RefCell<Vec<ControlEvent>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = control.events().subscribe(move |event| sink.borrow_mut().push(event.clone()));
    (seen, sub)
}

fn state_changes(events: &RefCell<Vec<ControlEvent>>) -> usize {
    events.borrow().iter().filter(|e| e.is_state_change()).count()
}

fn person() -> GroupControl {
    GroupControl::new([("first", leaf(json!("Ada"))), ("last", leaf(json!("Lovelace")))]).unwrap()
}

#[test]
fn link_replays_source_into_target_first() {
    let source = leaf(json!("a"));
    source.mark_touched(true, &opts());
    let target = leaf(json!("b"));

    let _sub = link(&source, &target).unwrap();
    assert_eq!(target.raw_value(), json!("a"));
    assert!(target.touched());
}

#[test]
fn one_way_link_does_not_flow_back() {
    let source = leaf(json!(1));
    let target = leaf(json!(1));
    let _sub = link(&source, &target).unwrap();

    source.set_value(json!(2), &opts());
    assert_eq!(target.value(), json!(2));

    target.set_value(json!(3), &opts());
    assert_eq!(source.value(), json!(2));
}

#[test]
fn dropping_the_subscription_unlinks() {
    let source = leaf(json!(1));
    let target = leaf(json!(1));
    let sub = link(&source, &target).unwrap();
    drop(sub);

    source.set_value(json!(2), &opts());
    assert_eq!(target.value(), json!(1));
}

#[test]
fn two_way_leaf_link_terminates() {
    let a = leaf(json!("x"));
    let b = leaf(json!("x"));
    let _link = link_two_way(&a, &b).unwrap();
    let (seen_a, _sa) = record(&a);
    let (seen_b, _sb) = record(&b);

    a.set_value(json!("y"), &opts());

    assert_eq!(b.raw_value(), json!("y"));
    assert_eq!(state_changes(&seen_a), 1);
    assert_eq!(state_changes(&seen_b), 1);

    b.mark_dirty(true, &opts());
    assert!(a.dirty());
    assert_eq!(state_changes(&seen_a), 2);
    assert_eq!(state_changes(&seen_b), 2);
}

#[test]
fn two_way_group_link_converges_on_child_changes() {
    let a = person();
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();
    let (seen_a, _sa) = record(&a);
    let (seen_b, _sb) = record(&b);

    a.control("first").unwrap().set_value(json!("Grace"), &opts()).unwrap();

    assert_eq!(b.value(), json!({ "first": "Grace", "last": "Lovelace" }));
    assert_eq!(state_changes(&seen_a), 1);
    assert_eq!(state_changes(&seen_b), 1);

    let change = seen_b.borrow()[0].state_change().cloned().unwrap();
    assert_eq!(change.child_events.len(), 1);
    assert!(change.changes.contains(Prop::RawValue));

    b.control("last").unwrap().set_value(json!("Hopper"), &opts()).unwrap();
    assert_eq!(a.value(), json!({ "first": "Grace", "last": "Hopper" }));
}

#[test]
fn two_way_link_carries_batches() {
    let a = person();
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();
    let (seen_b, _sb) = record(&b);

    a.set_value(json!({ "first": "Alan", "last": "Turing" }), &opts()).unwrap();
    a.mark_children_touched(true, false, &opts());

    assert_eq!(b.value(), json!({ "first": "Alan", "last": "Turing" }));
    assert!(b.control("first").unwrap().touched());
    assert!(b.touched());
    assert_eq!(state_changes(&seen_b), 2);
}

#[test]
fn structural_changes_cross_the_link() {
    let a = person();
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();

    a.add_control("middle", leaf(json!("King")), &opts());
    let mirrored = b.control("middle").expect("child added on the peer");
    assert_ne!(mirrored.id(), a.control("middle").unwrap().id());
    assert_eq!(mirrored.parent_id(), Some(b.id()));
    assert_eq!(b.value()["middle"], json!("King"));

    a.control("middle").unwrap().set_value(json!("Byron"), &opts()).unwrap();
    assert_eq!(mirrored.value(), json!("Byron"));

    b.remove_control("first", &opts()).unwrap();
    assert!(!a.contains("first"));
}

#[test]
fn array_push_and_removal_cross_the_link() {
    let a = ArrayControl::new([leaf(json!(1)), leaf(json!(2))]);
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();

    a.push(leaf(json!(3)), &opts());
    assert_eq!(b.value(), json!([1, 2, 3]));

    b.remove_control(0, &opts()).unwrap();
    assert_eq!(a.value(), json!([2, 3]));
    assert_eq!(a.len(), 2);

    a.at(1).unwrap().set_value(json!(30), &opts()).unwrap();
    assert_eq!(b.value(), json!([2, 30]));
}

#[test]
fn replacing_a_child_with_another_kind_crosses_the_link() {
    let a = GroupControl::new([("n", GroupControl::new([("x", leaf(json!(0)))]).unwrap())]).unwrap();
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();

    a.set_control("n", leaf(json!(5)), &opts());
    assert_eq!(b.value(), json!({ "n": 5 }));
    assert_eq!(b.control("n").unwrap().kind(), ControlKind::Leaf);
    assert_eq!(b.control("n").unwrap().parent_id(), Some(b.id()));

    let nested = GroupControl::new([("y", leaf(json!(1)))]).unwrap();
    b.set_control("n", nested, &opts());
    assert_eq!(a.value(), json!({ "n": { "y": 1 } }));
    assert_eq!(a.control("n").unwrap().kind(), ControlKind::Group);
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn replay_checks_against_the_incoming_children() {
    let source = GroupControl::new([("n", leaf(json!(5)))]).unwrap();
    let target = GroupControl::new([("n", GroupControl::new([("x", leaf(json!(0)))]).unwrap())]).unwrap();

    target.process_event(&source.replay_state(ReplayOptions::default())).unwrap();
    assert_eq!(target.value(), json!({ "n": 5 }));
    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn linked_arrays_keep_their_children_across_splices() {
    let a = ArrayControl::new([leaf(json!(1)), leaf(json!(2))]);
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();
    let b0 = b.at(0).unwrap();
    let b1 = b.at(1).unwrap();

    a.push(leaf(json!(3)), &opts());
    assert_eq!(b.at(0).unwrap().id(), b0.id());
    assert_eq!(b0.parent_id(), Some(b.id()));

    a.at(0).unwrap().set_value(json!(10), &opts()).unwrap();
    assert_eq!(b0.value(), json!(10));

    a.unshift(leaf(json!(0)), &opts());
    assert_eq!(b.value(), json!([0, 10, 2, 3]));
    assert_eq!(b.position_of(b0.id()), Some(1));
    assert_eq!(b.position_of(b1.id()), Some(2));

    a.remove_control(1, &opts()).unwrap();
    assert_eq!(b.value(), json!([0, 2, 3]));
    assert!(b0.parent_id().is_none());
    assert_eq!(b.position_of(b1.id()), Some(1));
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn events_for_removed_children_are_ignored() {
    let a = person();
    let b = person();
    b.remove_control("last", &opts()).unwrap();
    let (seen_a, _sa) = record(&a);

    a.control("last").unwrap().set_value(json!("Hopper"), &opts()).unwrap();
    a.control("last").unwrap().focus(true, &opts());
    let events = seen_a.borrow().clone();
    let change = events.iter().find(|e| e.is_state_change()).unwrap();
    let focus = events
        .iter()
        .find(|e| matches!(&e.kind, EventKind::ChildEvent { event, .. } if matches!(event.kind, EventKind::Focus { .. })))
        .unwrap();

    assert_eq!(b.process_event(change).unwrap(), None);
    assert_eq!(b.process_event(focus).unwrap(), None);
    assert_eq!(b.value(), json!({ "first": "Ada" }));

    let stale = change.state_change().unwrap().child_events[&ChildKey::from("last")].clone();
    let mixed = EventOptions::new().build_event(
        a.id(),
        EventKind::StateChange(StateChange {
            changes: [(Prop::SelfTouched, PropValue::Flag(true))].into_iter().collect(),
            child_events: [(ChildKey::from("last"), stale)].into_iter().collect(),
        }),
        "test",
    );
    assert!(b.process_event(&mixed).unwrap().is_some());
    assert!(b.touched());
    assert_eq!(b.value(), json!({ "first": "Ada" }));
}

#[test]
fn link_into_empty_group_clones_children() {
    let a = person();
    let b = GroupControl::new(Vec::<(&str, LeafControl)>::new()).unwrap();
    let _sub = link(&a, &b).unwrap();

    assert_eq!(b.value(), a.value());
    let first = b.control("first").unwrap();
    assert_ne!(first.id(), a.control("first").unwrap().id());
    assert_eq!(a.control("first").unwrap().parent_id(), Some(a.id()));
}

#[test]
fn validation_state_agrees_across_link() {
    let build = || {
        let name = LeafControl::with_config(json!("Ada"), ControlConfig::new().validator(validators::required()));
        GroupControl::new([("name", name)]).unwrap()
    };
    let a = build();
    let b = build();
    let _link = link_two_way(&a, &b).unwrap();

    a.control("name").unwrap().set_value(json!(""), &opts()).unwrap();
    assert!(a.invalid());
    assert!(b.invalid());
    assert_eq!(a.errors(), b.errors());

    b.control("name").unwrap().set_value(json!("Grace"), &opts()).unwrap();
    assert!(a.valid());
    assert!(b.valid());
}

#[test]
fn targeted_events_are_not_echoed_by_peers() {
    let a = leaf(json!(0));
    let b = leaf(json!(0));
    let _link = link_two_way(&a, &b).unwrap();
    let (seen_b, _sb) = record(&b);

    a.focus(true, &opts());
    assert!(seen_b.borrow().is_empty());
}

#[test]
fn child_focus_is_not_echoed_by_the_peer() {
    let a = person();
    let b = a.clone_control();
    let _link = link_two_way(&a, &b).unwrap();
    let (seen_b, _sb) = record(&b);

    a.control("first").unwrap().focus(true, &opts());
    // addressed to a different control on the peer side
    assert!(seen_b.borrow().is_empty());
}

#[test]
fn incompatible_peers_fail_to_link() {
    let source = leaf(json!("scalar"));
    let target = person();
    assert!(matches!(
        link(&source, &target),
        Err(ControlError::ValueShapeMismatch { .. })
    ));
    assert_eq!(target.value(), json!({ "first": "Ada", "last": "Lovelace" }));
}

#[test]
fn dropping_the_link_releases_both_directions() {
    let a = leaf(json!(0));
    let b = leaf(json!(0));
    let handle = link_two_way(&a, &b).unwrap();
    assert_eq!(a.events().subscriber_count(), 1);
    drop(handle);
    assert_eq!(a.events().subscriber_count(), 0);
    assert_eq!(b.events().subscriber_count(), 0);

    a.set_value(json!(1), &opts());
    assert_eq!(b.value(), json!(0));
}
