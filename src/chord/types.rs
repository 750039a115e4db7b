use bytes::Bytes;
use num_bigint::BigUint;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigError, MessageError};

/// Width of a raw digest and of the identifier backing store.
pub const ID_BYTES: usize = 32;

/// Largest supported ring exponent (the full SHA-256 output).
pub const MAX_RING_BITS: u32 = (ID_BYTES * 8) as u32;

/// NodeId is a position in the Chord ring, shared by nodes and file keys.
///
/// Stored big-endian so the derived ordering is numeric ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId([u8; ID_BYTES]);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.0);
        let trimmed = hex.trim_start_matches('0');
        write!(f, "NodeId(0x{})", if trimmed.is_empty() { "0" } else { trimmed })
    }
}

/// Decimal, as used for on-disk directory names.
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl NodeId {
    pub const ZERO: NodeId = NodeId([0u8; ID_BYTES]);

    pub fn from_u64(value: u64) -> Self {
        let mut id = [0u8; ID_BYTES];
        id[ID_BYTES - 8..].copy_from_slice(&value.to_be_bytes());
        NodeId(id)
    }

    /// Return the byte array corresponding to the NodeId
    pub fn to_bytes(&self) -> [u8; ID_BYTES] {
        self.0
    }

    /// Parse a NodeId from its wire form (exactly `ID_BYTES` big-endian bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let id: [u8; ID_BYTES] = bytes.try_into().map_err(|_| {
            MessageError::InvalidFormat(format!(
                "node id must be {} bytes, got {}",
                ID_BYTES,
                bytes.len()
            ))
        })?;
        Ok(NodeId(id))
    }

    /// True iff `self` lies strictly inside the clockwise interval
    /// (`start`, `end`), or equals `end` when `inclusive` is set.
    ///
    /// When `end <= start` the interval wraps past the top of the ring, so
    /// `start == end` covers every identifier except `start` itself.
    pub fn is_between(&self, start: &NodeId, end: &NodeId, inclusive: bool) -> bool {
        if inclusive && self == end {
            return true;
        }
        if end > start {
            start < self && self < end
        } else {
            start < self || self < end
        }
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Values of 2^256 and above keep only their low 256 bits.
    fn from_biguint(value: &BigUint) -> Self {
        let bytes = value.to_bytes_be();
        let bytes = &bytes[bytes.len().saturating_sub(ID_BYTES)..];
        let mut id = [0u8; ID_BYTES];
        id[ID_BYTES - bytes.len()..].copy_from_slice(bytes);
        NodeId(id)
    }
}

/// The identifier space of one ring: 2^bits positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    pub fn new(bits: u32) -> Result<Self, ConfigError> {
        if bits == 0 || bits > MAX_RING_BITS {
            return Err(ConfigError::Invalid(format!(
                "ring bits must be in [1, {}], got {}",
                MAX_RING_BITS, bits
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of ring positions, 2^bits.
    fn modulus(&self) -> BigUint {
        BigUint::from(1u8) << self.bits
    }

    /// Raw SHA-256 digest of `data`.
    pub fn hash(data: &[u8]) -> [u8; ID_BYTES] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut digest = [0u8; ID_BYTES];
        digest.copy_from_slice(&result);
        digest
    }

    /// Reduce a digest modulo the ring size.
    pub fn reduce(&self, digest: [u8; ID_BYTES]) -> NodeId {
        NodeId::from_biguint(&(BigUint::from_bytes_be(&digest) % self.modulus()))
    }

    /// Ring position of a node address or a file name.
    pub fn id_of(&self, name: &str) -> NodeId {
        self.reduce(Self::hash(name.as_bytes()))
    }

    /// Clockwise distance from `from` to `to`.
    pub fn distance(&self, from: &NodeId, to: &NodeId) -> NodeId {
        let modulus = self.modulus();
        let from = from.to_biguint() % &modulus;
        let to = to.to_biguint() % &modulus;
        NodeId::from_biguint(&((to + &modulus - from) % &modulus))
    }

    /// Start of finger `index` (0-based): (id + 2^index) mod 2^bits.
    pub fn finger_start(&self, id: &NodeId, index: u32) -> NodeId {
        let step = BigUint::from(1u8) << (index % self.bits);
        NodeId::from_biguint(&((id.to_biguint() + step) % self.modulus()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    pub id: NodeId,
    pub name: String,
    pub content: Bytes,
}

/// Bulk-transfer payload: file key to every file stored under it.
pub type FileBatch = BTreeMap<NodeId, Vec<File>>;

pub fn batch_file_count(batch: &FileBatch) -> usize {
    batch.values().map(Vec::len).sum()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeStatus {
    Uninitialized,
    Joining,
    Active,
    Leaving,
    Stopped,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Uninitialized => "uninitialized",
            NodeStatus::Joining => "joining",
            NodeStatus::Active => "active",
            NodeStatus::Leaving => "leaving",
            NodeStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A node's local view of the ring. Owned exclusively by the ring actor.
#[derive(Debug, Clone)]
pub struct ChordState {
    pub space: IdSpace,
    pub node_id: NodeId,
    pub address: String, // Format: "ip:port"
    pub label: String,
    pub status: NodeStatus,
    pub predecessor: Option<String>,
    pub successors: Vec<Option<String>>,
    pub finger_table: Vec<Option<String>>,
}

impl ChordState {
    pub fn new(space: IdSpace, address: String, label: String, successor_list_size: usize) -> Self {
        Self {
            space,
            node_id: space.id_of(&address),
            address,
            label,
            status: NodeStatus::Uninitialized,
            predecessor: None,
            successors: vec![None; successor_list_size.max(1)],
            finger_table: vec![None; space.bits() as usize],
        }
    }

    pub fn successor(&self) -> Option<&String> {
        self.successors.first().and_then(Option::as_ref)
    }

    pub fn id_of(&self, address: &str) -> NodeId {
        self.space.id_of(address)
    }

    /// True when this node is its own immediate successor.
    pub fn is_alone(&self) -> bool {
        self.successor().map_or(true, |s| *s == self.address)
    }

    pub fn set_successor(&mut self, address: String) {
        self.successors[0] = Some(address.clone());
        self.finger_table[0] = Some(address);
    }

    /// Successor list entries in order, skipping cleared slots.
    pub fn successor_list(&self) -> Vec<String> {
        self.successors.iter().flatten().cloned().collect()
    }

    /// Rebuild the list as `[successor] + theirs`, truncated to our length.
    pub fn reconcile_successors(&mut self, successor: String, theirs: Vec<String>) {
        let len = self.successors.len();
        let mut list = vec![None; len];
        list[0] = Some(successor);
        for (slot, address) in list.iter_mut().skip(1).zip(theirs) {
            *slot = Some(address);
        }
        self.successors = list;
    }

    /// Make backup `index` the immediate successor, shifting later entries
    /// down and clearing the freed slots.
    pub fn promote_successor(&mut self, index: usize) -> Option<String> {
        let promoted = self.successors.get(index).cloned().flatten()?;
        let len = self.successors.len();
        let mut list = vec![None; len];
        list[0] = Some(promoted.clone());
        for (slot, entry) in list.iter_mut().skip(1).zip(self.successors[index + 1..].iter()) {
            *slot = entry.clone();
        }
        self.successors = list;
        Some(promoted)
    }

    /// Notify handler: adopt `candidate` as predecessor if it is closer.
    /// Returns true when the predecessor changed.
    pub fn notify(&mut self, candidate: String) -> bool {
        if self.predecessor.as_ref() == Some(&candidate) {
            return false;
        }
        let adopt = match &self.predecessor {
            None => true,
            Some(current) => {
                let candidate_id = self.id_of(&candidate);
                candidate_id.is_between(&self.id_of(current), &self.node_id, false)
            }
        };
        if adopt {
            self.predecessor = Some(candidate);
        }
        adopt
    }

    /// True when `id` falls in (predecessor, self]. Unknown predecessor
    /// means ownership cannot be ruled out.
    pub fn owns(&self, id: &NodeId) -> bool {
        match &self.predecessor {
            None => true,
            Some(pred) => id.is_between(&self.id_of(pred), &self.node_id, true),
        }
    }
}

/// Serializable view of a node for operators.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub address: String,
    pub label: String,
    pub ring_bits: u32,
    pub status: NodeStatus,
    pub predecessor: Option<String>,
    pub successors: Vec<Option<String>>,
    pub fingers: Vec<Option<String>>,
    pub bucket: BTreeMap<NodeId, Vec<String>>,
}

/// A snapshot annotated with the operator labels of the peers it names.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    #[serde(flatten)]
    pub snapshot: NodeSnapshot,
    pub labels: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> NodeId {
        NodeId::from_u64(v)
    }

    #[test]
    fn between_handles_wraparound() {
        assert!(id(1).is_between(&id(6), &id(2), false));
        assert!(!id(6).is_between(&id(1), &id(2), false));
        assert!(id(7).is_between(&id(6), &id(2), false));
        assert!(id(0).is_between(&id(6), &id(2), false));
        assert!(!id(2).is_between(&id(6), &id(2), false));
        assert!(id(2).is_between(&id(6), &id(2), true));
        assert!(!id(6).is_between(&id(6), &id(2), true));
    }

    #[test]
    fn between_with_equal_bounds_covers_ring() {
        for x in 0..8 {
            assert_eq!(id(x).is_between(&id(3), &id(3), false), x != 3);
            assert!(id(x).is_between(&id(3), &id(3), true));
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        let space = IdSpace::new(160).unwrap();
        let a = space.id_of("127.0.0.1:4000");
        assert_eq!(a, space.id_of("127.0.0.1:4000"));
        assert_ne!(a, space.id_of("127.0.0.1:4001"));
    }

    #[test]
    fn reduce_stays_inside_ring() {
        let space = IdSpace::new(3).unwrap();
        for port in 0..64 {
            let id = space.id_of(&format!("10.0.0.1:{}", port));
            assert!(id < NodeId::from_u64(8), "{} escaped the ring", id);
        }
        let full = IdSpace::new(MAX_RING_BITS).unwrap();
        let digest = IdSpace::hash(b"x");
        assert_eq!(full.reduce(digest).to_bytes(), digest);
    }

    #[test]
    fn distance_wraps() {
        let space = IdSpace::new(3).unwrap();
        assert_eq!(space.distance(&id(2), &id(5)), id(3));
        assert_eq!(space.distance(&id(6), &id(1)), id(3));
        assert_eq!(space.distance(&id(4), &id(4)), id(0));
        let full = IdSpace::new(MAX_RING_BITS).unwrap();
        let top = full.reduce([0xff; ID_BYTES]);
        assert_eq!(full.distance(&top, &id(1)), id(2));
        assert_eq!(full.finger_start(&top, 0), id(0));
    }

    #[test]
    fn finger_start_wraps() {
        let space = IdSpace::new(3).unwrap();
        assert_eq!(space.finger_start(&id(6), 0), id(7));
        assert_eq!(space.finger_start(&id(6), 1), id(0));
        assert_eq!(space.finger_start(&id(6), 2), id(2));
        let wide = IdSpace::new(200).unwrap();
        assert_eq!(wide.finger_start(&id(1), 70).to_bytes()[ID_BYTES - 9], 0x40);
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(id(0).to_string(), "0");
        assert_eq!(id(7).to_string(), "7");
        assert_eq!(id(1234567890123).to_string(), "1234567890123");
        let top = IdSpace::new(MAX_RING_BITS).unwrap().reduce([0xff; ID_BYTES]);
        assert_eq!(
            top.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(format!("{:?}", id(255)), "NodeId(0xff)");
    }

    #[test]
    fn rejects_bad_ring_sizes() {
        assert!(IdSpace::new(0).is_err());
        assert!(IdSpace::new(MAX_RING_BITS + 1).is_err());
    }

    #[test]
    fn promote_compacts_list() {
        let space = IdSpace::new(8).unwrap();
        let mut state = ChordState::new(space, "a".into(), String::new(), 4);
        state.successors = vec![
            Some("b".into()),
            Some("c".into()),
            Some("d".into()),
            Some("e".into()),
        ];
        assert_eq!(state.promote_successor(2), Some("d".to_string()));
        assert_eq!(
            state.successors,
            vec![Some("d".into()), Some("e".into()), None, None]
        );
    }

    #[test]
    fn reconcile_keeps_list_length() {
        let space = IdSpace::new(8).unwrap();
        let mut state = ChordState::new(space, "a".into(), String::new(), 3);
        state.reconcile_successors("b".into(), vec!["c".into(), "d".into(), "e".into()]);
        assert_eq!(
            state.successors,
            vec![Some("b".into()), Some("c".into()), Some("d".into())]
        );
        state.reconcile_successors("b".into(), vec![]);
        assert_eq!(state.successors, vec![Some("b".into()), None, None]);
    }
}
