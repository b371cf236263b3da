//! Reconciling many events at once.
//!
//! Events for different objects may run concurrently; events for the same
//! object never do. Every event carries up to two identities, its
//! `PhysicalResourceId` and its natural key. Events sharing either identity,
//! directly or through a chain of other events, form one group, and each
//! group runs sequentially in arrival order. An event with neither identity
//! falls back to its logical id.

use super::event::ReconciliationEvent;
use super::result::ReconciliationResult;
use super::sync::ExternalSyncHandler;
use crate::error::SyncError;
use crate::provider::GroupDirectory;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[cfg(feature = "parallel-reconcile")]
use rayon::prelude::*;

type Outcome = Result<ReconciliationResult, SyncError>;

/// Reconcile `events` and return one outcome per event, in input order.
pub fn reconcile_batch<D: GroupDirectory>(
    handler: &ExternalSyncHandler<D>,
    events: &[ReconciliationEvent],
) -> Vec<Outcome> {
    let groups = group_by_identity(handler, events);
    debug!(events = events.len(), groups = groups.len(), "reconciling batch");

    let run_group = |indices: &Vec<usize>| -> Vec<(usize, Outcome)> {
        indices
            .iter()
            .map(|&i| (i, handler.reconcile(&events[i])))
            .collect()
    };

    #[cfg(feature = "parallel-reconcile")]
    let finished: Vec<(usize, Outcome)> = groups.par_iter().flat_map_iter(run_group).collect();
    #[cfg(not(feature = "parallel-reconcile"))]
    let finished: Vec<(usize, Outcome)> = groups.iter().flat_map(run_group).collect();

    let mut slots: Vec<Option<Outcome>> = (0..events.len()).map(|_| None).collect();
    for (i, outcome) in finished {
        slots[i] = Some(outcome);
    }
    // every index belongs to exactly one group
    slots.into_iter().flatten().collect()
}

/// Partition event indices so that events sharing a physical id or natural
/// key land in the same group. Indices inside a group stay ascending.
fn group_by_identity<D: GroupDirectory>(
    handler: &ExternalSyncHandler<D>,
    events: &[ReconciliationEvent],
) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..events.len()).collect();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (i, event) in events.iter().enumerate() {
        let mut keys: Vec<&str> = event
            .physical_resource_id
            .as_deref()
            .into_iter()
            .chain(handler.natural_key(event))
            .collect();
        if keys.is_empty() {
            keys.push(&event.logical_resource_id);
        }
        for key in keys {
            match first_seen.entry(key) {
                Entry::Occupied(seen) => union(&mut parent, *seen.get(), i),
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..events.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}
