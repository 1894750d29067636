//! Randomized stress tests.
//!
//! Drives a small form tree through long seeded sequences of mutations and
//! checks after every step that derived state still matches the children,
//! that a two-way linked mirror agrees, and that replay stays idempotent.

use anyhow::{ensure, Context, Result};
use fastrand::Rng;
use serde_json::{json, Map, Value};

use crate::{
    link_two_way, AbstractControl, ArrayControl, Control, ControlId, ControlStatus, EventOptions, Facet,
    GroupControl, LeafControl, ReplayOptions,
};

const SEEDS: [u64; 4] = [7, 42, 1234, 987_654];
const STEPS: usize = 300;
const NAMES: [&str; 3] = ["alpha", "beta", "gamma"];

fn form() -> Result<GroupControl> {
    let address = GroupControl::new([
        ("street", LeafControl::new(json!("1 Main St"))),
        ("city", LeafControl::new(json!("Springfield"))),
    ])?;
    let tags = ArrayControl::new([LeafControl::new(json!("a")), LeafControl::new(json!("b"))]);
    Ok(GroupControl::new([
        ("name", Control::from(LeafControl::new(json!("Ada")))),
        ("age", LeafControl::new(json!(36)).into()),
        ("tags", tags.into()),
        ("address", address.into()),
    ])?)
}

fn every_control(root: &Control) -> Vec<Control> {
    let mut all = vec![root.clone()];
    let mut i = 0;
    while i < all.len() {
        let children: Vec<Control> = all[i].controls().into_iter().map(|(_, c)| c).collect();
        all.extend(children);
        i += 1;
    }
    all
}

fn random_facet(rng: &mut Rng) -> Facet {
    Facet::ALL[rng.usize(..Facet::ALL.len())]
}

fn step(rng: &mut Rng, root: &Control, sources: &[ControlId]) -> Result<()> {
    let nodes = every_control(root);
    let target = &nodes[rng.usize(..nodes.len())];
    let opts = EventOptions::new();

    match rng.u8(..8) {
        0 => {
            if let Control::Leaf(leaf) = target {
                leaf.set_value(json!(rng.u8(..5)), &opts);
            }
        }
        1 => {
            target.mark(random_facet(rng), rng.bool(), &opts);
        }
        2 => {
            let errors = rng.bool().then(|| [("custom".to_owned(), json!(rng.u8(..3)))].into_iter().collect());
            target.set_errors(errors, &opts);
        }
        3 => {
            let source = sources[rng.usize(..sources.len())];
            target.mark_pending(rng.bool(), &EventOptions::new().source(source));
        }
        4 => {
            target.mark_children(random_facet(rng), rng.bool(), rng.bool(), &opts);
        }
        5 => match target {
            Control::Array(array) if rng.bool() && !array.is_empty() => {
                array.remove_control(rng.usize(..array.len()), &opts)?;
            }
            Control::Array(array) => {
                array.push(LeafControl::new(json!(rng.u8(..5))), &opts);
            }
            Control::Group(group) => {
                let name = NAMES[rng.usize(..NAMES.len())];
                if group.contains(name) {
                    group.remove_control(name, &opts)?;
                } else {
                    group.add_control(name, LeafControl::new(json!(name)), &opts);
                }
            }
            Control::Leaf(_) => {}
        },
        6 => {
            let changed = target.set_value(target.raw_value(), &opts)?;
            ensure!(changed.is_empty(), "writing the current raw value changed {changed:?}");
        }
        _ => {
            let replayed = target.process_event(&target.replay_state(ReplayOptions::default()))?;
            ensure!(replayed.is_none(), "replay into self emitted {replayed:?}");
        }
    }
    Ok(())
}

/// Recompute what a container's derived state must be from its children and
/// compare.
fn check_tree(control: &Control) -> Result<()> {
    let flags = control.flags();
    let self_flags = control.self_flags();
    let expected_status = ControlStatus::derive(flags.disabled, flags.pending, control.invalid());
    ensure!(control.status() == expected_status, "{control:?} status {:?}", control.status());

    let children = control.controls();
    if children.is_empty() && !control.is_container() {
        ensure!(control.value() == control.raw_value(), "leaf {control:?} value differs from raw value");
        ensure!(flags == self_flags, "leaf {control:?} flags {flags:?} differ from own {self_flags:?}");
        return Ok(());
    }

    for (key, child) in &children {
        ensure!(child.parent_id() == Some(control.id()), "{child:?} at {key} is not parented");
    }

    let enabled: Vec<&Control> = children.iter().map(|(_, c)| c).filter(|c| c.enabled()).collect();
    let (raw, value) = match control {
        Control::Array(_) => (
            Value::Array(children.iter().map(|(_, c)| c.raw_value()).collect()),
            Value::Array(enabled.iter().map(|c| c.value()).collect()),
        ),
        _ => {
            let raw: Map<String, Value> = children.iter().map(|(k, c)| (k.to_string(), c.raw_value())).collect();
            let value: Map<String, Value> = children
                .iter()
                .filter(|(_, c)| c.enabled())
                .map(|(k, c)| (k.to_string(), c.value()))
                .collect();
            (Value::Object(raw), Value::Object(value))
        }
    };
    ensure!(control.raw_value() == raw, "{control:?} raw value out of date");
    ensure!(control.value() == value, "{control:?} value out of date");

    for facet in Facet::ALL {
        let contributing: Vec<bool> = if facet == Facet::Disabled {
            children.iter().map(|(_, c)| c.flags().get(facet)).collect()
        } else {
            enabled.iter().map(|c| c.flags().get(facet)).collect()
        };
        let from_children = if facet.combines_all() {
            !contributing.is_empty() && contributing.iter().all(|b| *b)
        } else {
            contributing.iter().any(|b| *b)
        };
        let expected = self_flags.get(facet) || from_children;
        ensure!(flags.get(facet) == expected, "{control:?} {facet:?} is {}", flags.get(facet));
    }

    let child_invalid = enabled.iter().any(|c| c.invalid());
    let expected_invalid = control.self_errors().is_some() || child_invalid;
    ensure!(control.invalid() == expected_invalid, "{control:?} validity out of date");

    for (_, child) in &children {
        check_tree(child)?;
    }
    Ok(())
}

#[test]
fn random_mutations_keep_derived_state_consistent() -> Result<()> {
    for seed in SEEDS {
        let mut rng = Rng::with_seed(seed);
        let root = form()?;
        let mirror = root.clone_control();
        let _link = link_two_way(&root, &mirror)?;
        let sources = [ControlId::new(), ControlId::new()];
        let root = Control::from(root);
        let mirror = Control::from(mirror);

        for n in 0..STEPS {
            step(&mut rng, &root, &sources).with_context(|| format!("seed {seed}, step {n}"))?;
            check_tree(&root).with_context(|| format!("seed {seed}, step {n}: source tree"))?;
            check_tree(&mirror).with_context(|| format!("seed {seed}, step {n}: mirror tree"))?;
            ensure!(
                root.snapshot() == mirror.snapshot(),
                "seed {seed}, step {n}: mirror diverged"
            );
        }

        let clone = root.clone_control();
        ensure!(clone.snapshot() == root.snapshot(), "seed {seed}: clone differs");
        ensure!(clone.parent_id().is_none(), "seed {seed}: clone has a parent");
    }
    Ok(())
}

#[test]
fn random_mutations_on_the_mirror_flow_back() -> Result<()> {
    let mut rng = Rng::with_seed(99);
    let root = form()?;
    let mirror = root.clone_control();
    let _link = link_two_way(&root, &mirror)?;
    let sources = [ControlId::new()];
    let root = Control::from(root);
    let mirror = Control::from(mirror);

    for n in 0..STEPS {
        let target = if n % 2 == 0 { &root } else { &mirror };
        step(&mut rng, target, &sources).with_context(|| format!("step {n}"))?;
        ensure!(root.snapshot() == mirror.snapshot(), "step {n}: trees diverged");
    }
    Ok(())
}
