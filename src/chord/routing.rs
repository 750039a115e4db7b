use log::{debug, warn};

use crate::chord::types::{ChordState, NodeId};
use crate::error::ChordError;
use crate::network::client::PeerClient;

/// Local routing step for `id`.
///
/// Returns `(true, owner)` when the answer is final, or `(false, next_hop)`
/// when the caller must continue the lookup at `next_hop`.
pub fn find_successor(state: &ChordState, id: &NodeId) -> (bool, String) {
    if let Some(successor) = state.successor() {
        let successor_id = state.id_of(successor);
        if id.is_between(&state.node_id, &successor_id, true) {
            return (true, successor.clone());
        }
    }

    let closest = closest_preceding_node(state, id);
    if closest == state.address {
        // Nobody closer is known, so we are the best answer.
        (true, closest)
    } else {
        (false, closest)
    }
}

/// Best known node preceding `id`, chosen between the finger table and the
/// successor list.
pub fn closest_preceding_node(state: &ChordState, id: &NodeId) -> String {
    let finger_choice = state
        .finger_table
        .iter()
        .rev()
        .flatten()
        .map(|address| (address, state.id_of(address)))
        .find(|(_, finger_id)| finger_id.is_between(&state.node_id, id, false));

    // Inclusive bound: a successor sitting exactly on `id` is a final answer
    // one hop away.
    let successor_choice = state
        .successors
        .iter()
        .rev()
        .flatten()
        .map(|address| (address, state.id_of(address)))
        .find(|(_, successor_id)| successor_id.is_between(&state.node_id, id, true));

    match (finger_choice, successor_choice) {
        (None, None) => state.address.clone(),
        (Some((finger, _)), None) => finger.clone(),
        (None, Some((successor, _))) => successor.clone(),
        (Some((finger, finger_id)), Some((successor, successor_id))) => {
            let finger_distance = state.space.distance(&finger_id, id);
            let successor_distance = state.space.distance(&successor_id, id);
            if finger_distance == NodeId::ZERO {
                finger.clone()
            } else if successor_distance == NodeId::ZERO {
                successor.clone()
            } else if finger_distance <= successor_distance {
                finger.clone()
            } else {
                successor.clone()
            }
        }
    }
}

/// Iterative lookup of the node owning `id`, starting at `start`.
///
/// Gives up after `max_steps` hops so stale or inconsistent routing state
/// cannot loop forever; a failed hop aborts the lookup.
pub async fn find(
    client: &PeerClient,
    id: NodeId,
    start: &str,
    max_steps: usize,
) -> Result<String, ChordError> {
    let mut next = start.to_string();
    for step in 0..max_steps {
        let (is_final, address) = client.find_successor(&next, id).await.map_err(|e| {
            warn!("Lookup for {} failed at {}: {}", id, next, e);
            e
        })?;
        if is_final {
            debug!("Lookup for {} resolved to {} after {} hops", id, address, step + 1);
            return Ok(address);
        }
        next = address;
    }
    warn!("Lookup for {} exhausted {} steps", id, max_steps);
    Err(ChordError::RoutingExhausted {
        id,
        steps: max_steps,
    })
}
