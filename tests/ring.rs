//! Multi-node ring behaviour over an in-process network.
//!
//! Maintenance rounds are driven by hand so every test is deterministic:
//! nodes never run their background workers here.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chordfs::chord::node::{ChordNode, NodeSettings};
use chordfs::chord::routing;
use chordfs::chord::types::{File, IdSpace, NodeId, NodeStatus};
use chordfs::chord::workers::{check_predecessor, fix_finger, stabilize};
use chordfs::error::ChordError;
use chordfs::storage::{ContentStore, MemoryContentStore};
use chordfs::testing::{address_with_id, LocalNetwork};

struct TestNode {
    node: ChordNode,
    store: Arc<MemoryContentStore>,
}

async fn spawn_node(network: &LocalNetwork, space: IdSpace, id: u64, successors: usize) -> TestNode {
    let store = Arc::new(MemoryContentStore::new());
    let settings = NodeSettings {
        label: format!("n{}", id),
        successor_list_size: successors,
        ..NodeSettings::default()
    };
    let node = ChordNode::new(
        address_with_id(space, id),
        space,
        settings,
        Arc::new(network.clone()),
        store.clone(),
    );
    network.register(node.address(), node.dispatcher()).await;
    TestNode { node, store }
}

async fn maintain(nodes: &[&TestNode], rounds: usize) {
    for _ in 0..rounds {
        for n in nodes {
            check_predecessor(&n.node).await.unwrap();
            stabilize(&n.node).await.unwrap();
        }
    }
    for n in nodes {
        let mut next = 0;
        for _ in 0..n.node.space().bits() {
            next = fix_finger(&n.node, next).await.unwrap();
        }
    }
}

/// Create a ring from `ids`, joining each node through the first one and
/// letting the ring settle after every join.
async fn build_ring(network: &LocalNetwork, space: IdSpace, ids: &[u64], successors: usize) -> Vec<TestNode> {
    let mut nodes: Vec<TestNode> = Vec::new();
    for &id in ids {
        let n = spawn_node(network, space, id, successors).await;
        match nodes.first() {
            None => n.node.create().await.unwrap(),
            Some(first) => n.node.join(first.node.address()).await.unwrap(),
        }
        nodes.push(n);
        let refs: Vec<&TestNode> = nodes.iter().collect();
        maintain(&refs, 4).await;
    }
    nodes
}

async fn total_files(nodes: &[&TestNode]) -> usize {
    let mut total = 0;
    for n in nodes {
        let snapshot = n.node.snapshot().await.unwrap();
        total += snapshot.bucket.values().map(Vec::len).sum::<usize>();
    }
    total
}

/// Every key a node holds must lie in (predecessor, self].
async fn assert_ownership(nodes: &[&TestNode]) {
    for n in nodes {
        let snapshot = n.node.snapshot().await.unwrap();
        let predecessor = snapshot.predecessor.clone().expect("settled ring has predecessors");
        let pred_id = n.node.space().id_of(&predecessor);
        for key in snapshot.bucket.keys() {
            assert!(
                key.is_between(&pred_id, &n.node.node_id(), true),
                "{} holds key {} outside ({}, {}]",
                n.node.address(),
                key,
                pred_id,
                n.node.node_id()
            );
        }
    }
}

fn names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("file-{}.txt", i)).collect()
}

#[tokio::test]
async fn single_node_owns_every_key() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[4], 3).await;
    let me = ring[0].node.address().to_string();

    for key in 0..8 {
        let owner = routing::find(ring[0].node.client(), NodeId::from_u64(key), &me, 32)
            .await
            .unwrap();
        assert_eq!(owner, me);
    }
    let (_, owner) = ring[0].node.lookup("anything.txt").await.unwrap();
    assert_eq!(owner, me);
}

#[tokio::test]
async fn three_node_ring_resolves_wraparound_keys() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[1, 3, 6], 3).await;
    let (n1, n3, n6) = (&ring[0].node, &ring[1].node, &ring[2].node);

    for start in [n1, n3, n6] {
        let owner_of_7 = routing::find(start.client(), NodeId::from_u64(7), start.address(), 32)
            .await
            .unwrap();
        assert_eq!(owner_of_7, n1.address());
        let owner_of_2 = routing::find(start.client(), NodeId::from_u64(2), start.address(), 32)
            .await
            .unwrap();
        assert_eq!(owner_of_2, n3.address());
    }

    let s1 = n1.snapshot().await.unwrap();
    assert_eq!(s1.predecessor.as_deref(), Some(n6.address()));
    assert_eq!(s1.successors[0].as_deref(), Some(n3.address()));
    assert_eq!(s1.successors[1].as_deref(), Some(n6.address()));
    assert_eq!(s1.fingers[2].as_deref(), Some(n6.address()));
}

#[tokio::test]
async fn find_is_bounded_by_max_steps() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[1, 3, 6], 3).await;
    let n6 = &ring[2].node;

    // From node 6, key 2 needs a hop through node 1.
    let result = routing::find(n6.client(), NodeId::from_u64(2), n6.address(), 1).await;
    assert!(matches!(
        result,
        Err(ChordError::RoutingExhausted { steps: 1, .. })
    ));
    assert!(routing::find(n6.client(), NodeId::from_u64(2), n6.address(), 3).await.is_ok());

    let unreachable = routing::find(n6.client(), NodeId::from_u64(2), "10.255.255.255:1", 32).await;
    assert!(matches!(unreachable, Err(ChordError::Network(_))));
}

#[tokio::test]
async fn joins_and_leaves_preserve_every_file() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let mut ring = build_ring(&network, space, &[1], 3).await;

    let files = names(24);
    for name in &files {
        ring[0]
            .node
            .store(name, Bytes::from(format!("contents of {}", name)))
            .await
            .unwrap();
    }
    assert_eq!(total_files(&[&ring[0]]).await, files.len());

    for id in [3, 6] {
        let n = spawn_node(&network, space, id, 3).await;
        n.node.join(ring[0].node.address()).await.unwrap();
        ring.push(n);
        let refs: Vec<&TestNode> = ring.iter().collect();
        maintain(&refs, 4).await;
        assert_eq!(total_files(&refs).await, files.len());
    }
    let refs: Vec<&TestNode> = ring.iter().collect();
    assert_ownership(&refs).await;

    // Every file is stored where a lookup says it lives, with its content.
    for name in &files {
        let (id, owner) = ring[1].node.lookup(name).await.unwrap();
        let holder = ring.iter().find(|n| n.node.address() == owner).unwrap();
        let content = holder
            .store
            .get(holder.node.node_id(), id, name)
            .await
            .unwrap()
            .expect("owner holds the file");
        assert_eq!(content, Bytes::from(format!("contents of {}", name)));
    }

    // Node 3 leaves gracefully.
    let leaver = ring.remove(1);
    leaver.node.leave().await.unwrap();
    assert_eq!(leaver.node.status().await.unwrap(), NodeStatus::Stopped);
    assert_eq!(leaver.store.count(leaver.node.node_id()).await, 0);

    let refs: Vec<&TestNode> = ring.iter().collect();
    assert_eq!(total_files(&refs).await, files.len());
    maintain(&refs, 4).await;
    assert_ownership(&refs).await;

    let owner_of_2 = routing::find(ring[0].node.client(), NodeId::from_u64(2), ring[0].node.address(), 32)
        .await
        .unwrap();
    assert_eq!(owner_of_2, ring[1].node.address());
}

#[tokio::test]
async fn report_names_every_referenced_peer() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[1, 3, 6], 3).await;

    let report = ring[0].node.report().await.unwrap();
    assert_eq!(report.snapshot.address, ring[0].node.address());
    for (n, label) in ring.iter().zip(["n1", "n3", "n6"]) {
        assert_eq!(report.labels.get(n.node.address()).map(String::as_str), Some(label));
    }

    // A dead peer keeps its place in the snapshot but loses its label.
    network.kill(ring[2].node.address()).await;
    let report = ring[0].node.report().await.unwrap();
    assert_eq!(report.snapshot.predecessor.as_deref(), Some(ring[2].node.address()));
    assert!(!report.labels.contains_key(ring[2].node.address()));
}

#[tokio::test]
async fn store_refused_during_a_join_succeeds_after_stabilize() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let mut ring = build_ring(&network, space, &[1, 6], 3).await;
    let name = (0..)
        .map(|i| format!("pending-{}.txt", i))
        .find(|n| space.id_of(n) == NodeId::from_u64(2))
        .unwrap();

    let n3 = spawn_node(&network, space, 3, 3).await;
    n3.node.join(ring[0].node.address()).await.unwrap();
    // Node 6 learns about node 3 before node 1 does.
    stabilize(&n3.node).await.unwrap();
    ring.push(n3);
    let (n1, n3) = (&ring[0], &ring[2]);

    assert!(matches!(
        n1.node.store(&name, Bytes::from_static(b"early")).await,
        Err(ChordError::Network(_))
    ));

    stabilize(&n1.node).await.unwrap();
    let owner = n1.node.store(&name, Bytes::from_static(b"retried")).await.unwrap();
    assert_eq!(owner, n3.node.address());
    assert_eq!(
        n3.store.get(n3.node.node_id(), NodeId::from_u64(2), &name).await.unwrap(),
        Some(Bytes::from_static(b"retried"))
    );
}

#[tokio::test]
async fn crashed_successor_is_routed_around() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[1, 3, 6], 3).await;
    let (n1, n3, n6) = (&ring[0], &ring[1], &ring[2]);

    network.kill(n3.node.address()).await;

    // One failed probe is enough to promote the backup successor.
    stabilize(&n1.node).await.unwrap();
    let s1 = n1.node.snapshot().await.unwrap();
    assert_eq!(s1.successors[0].as_deref(), Some(n6.node.address()));

    maintain(&[n1, n6], 4).await;
    assert_eq!(
        n6.node.snapshot().await.unwrap().predecessor.as_deref(),
        Some(n1.node.address())
    );

    let mut owners = BTreeMap::new();
    for key in 0..8u64 {
        for start in [&n1.node, &n6.node] {
            let owner = routing::find(start.client(), NodeId::from_u64(key), start.address(), 32)
                .await
                .unwrap();
            owners.insert((key, start.address().to_string()), owner);
        }
    }
    for ((key, _), owner) in owners {
        let expected = if (2..=6).contains(&key) { n6.node.address() } else { n1.node.address() };
        assert_eq!(owner, expected, "key {}", key);
    }
}

#[tokio::test]
async fn exit_hands_every_file_to_the_remaining_peer() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[2, 5], 2).await;
    let (stayer, leaver) = (&ring[0], &ring[1]);

    let files = names(24);
    for name in &files {
        stayer.node.store(name, Bytes::from(name.clone().into_bytes())).await.unwrap();
    }
    let before = leaver.node.snapshot().await.unwrap().bucket;
    assert!(!before.is_empty(), "the leaving node should own some keys");

    leaver.node.leave().await.unwrap();
    assert_eq!(leaver.store.count(leaver.node.node_id()).await, 0);
    assert!(leaver.node.snapshot().await.unwrap().bucket.is_empty());
    assert!(*leaver.node.shutdown_signal().borrow());

    let after = stayer.node.snapshot().await.unwrap().bucket;
    for (key, held) in before {
        for name in held {
            assert!(after[&key].contains(&name));
            let content = stayer
                .store
                .get(stayer.node.node_id(), key, &name)
                .await
                .unwrap()
                .expect("handed-off file present");
            assert_eq!(content, Bytes::from(name.clone().into_bytes()));
        }
    }
    assert_eq!(total_files(&[stayer]).await, files.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stores_racing_a_leave_are_never_lost() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[1, 5], 2).await;
    let (stayer, leaver) = (&ring[0], &ring[1]);
    let key = NodeId::from_u64(4);

    let client = stayer.node.client().clone();
    let target = leaver.node.address().to_string();
    let writer = tokio::spawn(async move {
        let mut acked = Vec::new();
        for i in 0..500 {
            let file = File {
                id: key,
                name: format!("racing-{}", i),
                content: Bytes::from_static(b"r"),
            };
            let name = file.name.clone();
            if client.store_file(&target, file).await.is_ok() {
                acked.push(name);
            }
            tokio::task::yield_now().await;
        }
        acked
    });

    tokio::task::yield_now().await;
    leaver.node.leave().await.unwrap();
    let acked = writer.await.unwrap();

    let held = stayer.node.snapshot().await.unwrap().bucket;
    let names = held.get(&key).cloned().unwrap_or_default();
    for name in &acked {
        assert!(names.contains(name), "{} was acknowledged but lost", name);
    }
    assert_eq!(leaver.store.count(leaver.node.node_id()).await, 0);
}

#[tokio::test]
async fn failed_handoff_keeps_data_and_membership() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let ring = build_ring(&network, space, &[2, 5], 2).await;
    let (other, leaver) = (&ring[0], &ring[1]);

    for name in names(24) {
        other.node.store(&name, Bytes::from_static(b"x")).await.unwrap();
    }
    let held = leaver.store.count(leaver.node.node_id()).await;

    network.kill(other.node.address()).await;
    assert!(matches!(
        leaver.node.leave().await,
        Err(ChordError::HandoffFailed(_))
    ));
    assert_eq!(leaver.node.status().await.unwrap(), NodeStatus::Active);
    assert_eq!(leaver.store.count(leaver.node.node_id()).await, held);
}

#[tokio::test]
async fn last_node_exit_discards_its_data() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(4).unwrap();
    let ring = build_ring(&network, space, &[9], 3).await;
    let only = &ring[0];

    for name in names(5) {
        only.node.store(&name, Bytes::from_static(b"data")).await.unwrap();
    }
    assert_eq!(only.store.count(only.node.node_id()).await, 5);

    only.node.leave().await.unwrap();
    assert_eq!(only.node.status().await.unwrap(), NodeStatus::Stopped);
    assert_eq!(only.store.count(only.node.node_id()).await, 0);
    assert!(only.node.lookup("file-0.txt").await.is_err());
}

#[tokio::test]
async fn joining_through_an_unreachable_bootstrap_fails() {
    let network = LocalNetwork::new();
    let space = IdSpace::new(3).unwrap();
    let n = spawn_node(&network, space, 4, 3).await;

    assert!(matches!(
        n.node.join("10.255.255.255:1").await,
        Err(ChordError::JoinFailed(_))
    ));
    assert!(matches!(
        ChordNode::fetch_ring_space(Arc::new(network.clone()), "10.255.255.255:1").await,
        Err(ChordError::JoinFailed(_))
    ));
}
