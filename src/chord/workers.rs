use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::chord::node::ChordNode;
use crate::chord::routing;
use crate::chord::types::NodeStatus;
use crate::error::ChordError;

/// One stabilize round: adopt a closer successor if our successor knows one,
/// refresh the successor list, fail over to a live backup when the successor
/// is unreachable, then notify whoever is our successor afterwards.
pub async fn stabilize(node: &ChordNode) -> Result<(), ChordError> {
    let handle = node.handle();
    let client = node.client();
    let Some(successor) = handle.successor().await? else {
        return Ok(());
    };

    match client.get_predecessor(&successor).await {
        Ok(predecessor) => {
            let mut current = successor.clone();
            if let Some(x) = predecessor {
                let space = node.space();
                let x_id = space.id_of(&x);
                if x != current && x_id.is_between(&node.node_id(), &space.id_of(&current), false) {
                    if handle.replace_successor(current.clone(), x.clone()).await? {
                        debug!("Node {} moved successor to {}", node.node_id(), x);
                        current = x;
                    }
                }
            }

            match client.successor_list(&current).await {
                Ok(list) => {
                    handle.reconcile_successors(current, list).await?;
                }
                Err(e) => warn!("Could not fetch successor list from {}: {}", current, e),
            }
        }
        Err(e) => {
            warn!("Successor {} did not answer: {}", successor, e);
            fail_over(node, &successor).await?;
        }
    }

    if let Some(successor) = handle.successor().await? {
        if let Err(e) = client.notify(&successor, node.address()).await {
            warn!("Notify to {} failed: {}", successor, e);
        }
    }
    Ok(())
}

async fn fail_over(node: &ChordNode, failed: &str) -> Result<(), ChordError> {
    let successors = node.handle().successors().await?;
    for (index, candidate) in successors.iter().enumerate().skip(1) {
        let Some(candidate) = candidate else {
            continue;
        };
        if candidate == failed || !node.client().is_alive(candidate).await {
            continue;
        }
        node.handle().promote_successor(failed.to_string(), index).await?;
        return Ok(());
    }
    error!("Node {} has no live backup for failed successor {}", node.node_id(), failed);
    Ok(())
}

/// Refresh finger `next - 1` and return the next index to refresh.
/// `next` rotates over [1, M].
pub async fn fix_finger(node: &ChordNode, next: u32) -> Result<u32, ChordError> {
    let bits = node.space().bits();
    let next = if next >= bits { 1 } else { next + 1 };
    let index = next - 1;
    let target = node.space().finger_start(&node.node_id(), index);

    match routing::find(node.client(), target, node.address(), node.settings().max_steps).await {
        Ok(address) => node.handle().set_finger(index as usize, address).await?,
        Err(e) => debug!("Finger {} of {} left unchanged: {}", index, node.node_id(), e),
    }
    Ok(next)
}

/// Clear the predecessor if it no longer answers.
pub async fn check_predecessor(node: &ChordNode) -> Result<(), ChordError> {
    let Some(predecessor) = node.handle().predecessor().await? else {
        return Ok(());
    };
    if !node.client().is_alive(&predecessor).await {
        node.handle().clear_predecessor(predecessor).await?;
    }
    Ok(())
}

async fn is_active(node: &ChordNode) -> bool {
    matches!(node.status().await, Ok(NodeStatus::Active))
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

pub async fn run_stabilize_worker(node: ChordNode, mut shutdown: watch::Receiver<bool>) {
    info!("Starting stabilize worker");
    let mut ticker = ticker(node.settings().stabilize_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !is_active(&node).await {
                    continue;
                }
                if let Err(e) = stabilize(&node).await {
                    error!("Stabilize failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                info!("Stopping stabilize worker");
                return;
            }
        }
    }
}

pub async fn run_finger_maintainer(node: ChordNode, mut shutdown: watch::Receiver<bool>) {
    info!("Starting finger maintenance worker");
    let mut ticker = ticker(node.settings().fix_fingers_interval);
    let mut next = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !is_active(&node).await {
                    continue;
                }
                match fix_finger(&node, next).await {
                    Ok(n) => next = n,
                    Err(e) => error!("Finger maintenance failed: {}", e),
                }
            }
            _ = shutdown.changed() => {
                info!("Stopping finger maintenance worker");
                return;
            }
        }
    }
}

/// Worker that periodically probes the predecessor
pub async fn run_predecessor_checker(node: ChordNode, mut shutdown: watch::Receiver<bool>) {
    info!("Starting predecessor health checker");
    let mut ticker = ticker(node.settings().check_predecessor_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !is_active(&node).await {
                    continue;
                }
                if let Err(e) = check_predecessor(&node).await {
                    error!("Predecessor check failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                info!("Stopping predecessor health checker");
                return;
            }
        }
    }
}
