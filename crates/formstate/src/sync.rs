//! Wiring controls to each other's event streams.
//!
//! A link forwards every event one control emits into another control's
//! [`process_event`](AbstractControl::process_event). Two links pointing in
//! opposite directions converge: once the peers agree, applying an event a
//! second time changes nothing and emits nothing, which ends the exchange.

use std::fmt;

use crate::control::{AbstractControl, ReplayOptions};
use crate::error::Result;
use crate::event::Subscription;

/// Replay `source` into `target`, then forward every later `source` event to
/// `target` until the returned subscription is dropped.
pub fn link<S, T>(source: &S, target: &T) -> Result<Subscription>
where
    S: AbstractControl,
    T: AbstractControl + Clone + 'static,
{
    target.process_event(&source.replay_state(ReplayOptions::default()))?;
    let peer = target.clone();
    let source_id = source.id();
    Ok(source.events().subscribe(move |event| {
        if let Err(error) = peer.process_event(event) {
            tracing::warn!(
                source = %source_id,
                target = %peer.id(),
                path = %event.debug_path,
                %error,
                "linked control rejected event"
            );
        }
    }))
}

/// Two-way link between `a` and `b`. `b` takes `a`'s state first.
///
/// The peers hold each other through their streams while linked; dropping
/// the [`Link`] releases both directions.
pub fn link_two_way<A, B>(a: &A, b: &B) -> Result<Link>
where
    A: AbstractControl + Clone + 'static,
    B: AbstractControl + Clone + 'static,
{
    let forward = link(a, b)?;
    let backward = link(b, a)?;
    Ok(Link {
        _forward: forward,
        _backward: backward,
    })
}

/// RAII handle for a two-way link.
#[must_use = "dropping a Link unlinks immediately"]
pub struct Link {
    _forward: Subscription,
    _backward: Subscription,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}
