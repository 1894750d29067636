//! # formstate
//!
//! A synchronous state-synchronization engine for trees of controls: leaves
//! hold values, containers fold their children's state into their own, and
//! every change is an event that can be replayed into any other control.
//!
//! ## Core Concepts
//!
//! formstate separates **self** state from **derived** state:
//! - [`LeafControl`] = one JSON value plus its own flags and errors
//! - [`GroupControl`] / [`ArrayControl`] = keyed / indexed children whose
//!   values, facets and errors aggregate upward
//! - [`ControlEvent`] = the only way state leaves a control; a state change
//!   carries exactly the properties that changed
//!
//! The key principle: **applying an event twice changes nothing the second
//! time**. Replays, clones and two-way links are all built on it.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► set_value / mark / set_errors
//!               │
//!               ▼
//!          ControlCore ── settle: validate, merge errors, combine facets
//!               │
//!               ▼ emit (after borrows are released)
//!          EventStream ───────────────┬───────────────────┐
//!               │                     │                   │
//!               ▼                     ▼                   ▼
//!          parent container      subscribers        link(peer)
//!          refresh + bubble       observe()        process_event
//!               │                                         │
//!               └─► one StateChange { child_events } ◄────┘
//! ```
//!
//! ## Key Invariants
//!
//! 1. **No-op is silent** - A mutation that changes nothing emits nothing
//! 2. **Derived state is never written** - `value`, `errors`, `status` and the
//!    combined facets are recomputed, never applied from events
//! 3. **Disabled children drop out** - of the value, errors and every facet
//!    except disabled itself
//! 4. **One event per batch** - A container operation touching many children
//!    emits one consolidated state change
//! 5. **Contributors never collide** - Errors and pending reasons are stored
//!    per contributor
//!
//! ## Guarantees
//!
//! - **Synchronous**: every mutator has settled and emitted before it returns
//! - **Single-threaded**: handles are `Rc`-based and not `Send`
//! - **Check before apply**: a rejected value or event leaves the tree untouched
//!
//! ## Example
//!
//! ```ignore
//! use formstate_core::{
//!     validators, AbstractControl, ControlConfig, EventOptions, GroupControl, LeafControl,
//! };
//! use serde_json::json;
//!
//! let name = LeafControl::with_config(json!(""), ControlConfig::new().validator(validators::required()));
//! let form = GroupControl::new([("name", name.clone())])?;
//! assert!(form.invalid());
//!
//! let _sub = form.subscribe(|event| println!("{}", event.debug_path));
//! form.set_value(json!({ "name": "Ada" }), &EventOptions::new())?;
//! assert!(form.valid());
//!
//! // Mirror the form into a second tree.
//! let mirror = form.clone_control();
//! let _link = formstate_core::link_two_way(&form, &mirror)?;
//! ```
//!
//! ## What This Is Not
//!
//! formstate is **not**:
//! - A UI toolkit
//! - An async validation runner (pending is a reason set the caller manages)
//! - Thread-safe
//!
//! formstate **is**:
//! > A tree of controls whose state aggregates upward and whose events replay
//! > anywhere.

// Core modules
mod aggregate;
mod config;
mod container;
mod control;
mod core;
mod error;
mod event;
mod facet;
mod id;
mod key;
mod leaf;
mod prop;
mod sync;
mod validation;

// Testing utilities are in the separate formstate-testing crate

// Linking tests (test-only)
#[cfg(test)]
mod sync_tests;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export controls
pub use crate::container::{ArrayControl, ContainerControl, ContainerKind, GroupControl, Indexed, Keyed};
pub use crate::control::{AbstractControl, ChildSnapshot, Control, ControlKind, ReplayOptions, StateSnapshot};
pub use crate::leaf::LeafControl;

// Re-export state
pub use crate::config::ControlConfig;
pub use crate::core::ControlCore;
pub use crate::facet::{ControlStatus, Facet, FacetFlags};
pub use crate::prop::{ChangeSet, ChangedProps, Prop, PropValue};

// Re-export events
pub use crate::event::{ControlEvent, EventKind, EventOptions, EventStream, Meta, Provenance, StateChange, Subscription};

// Re-export identity
pub use crate::id::{Contributor, ControlId, IdGenerator, RandomIds, SequentialIds, SharedIds, SELF_MARKER};
pub use crate::key::ChildKey;

// Re-export validation
pub use crate::validation::{
    compose, merge_errors, rekey_child_errors, run_validators, validators, ErrorMap, ErrorsStore, PendingStore,
    ValidationErrors, Validator, ValidatorSet, ValidatorStore,
};

// Re-export aggregation
pub use crate::aggregate::{aggregate, all_true, any_true, Aggregates, ChildView};

// Re-export errors
pub use crate::error::{ControlError, Result};

// Re-export linking
pub use crate::sync::{link, link_two_way, Link};
