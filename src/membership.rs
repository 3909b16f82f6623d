//! The membership data model, its merge semantics, and the coordinator-side
//! `Membership` service built on top of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::logged_err;
use crate::utils::RingVoteError;

/// A participant's node id, `1..=population`. `0` is never a valid node id
/// and is reserved as the "no node" / "no leader" sentinel elsewhere.
pub type NodeId = u8;

/// One node's liveness record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Monotonically non-decreasing heartbeat counter.
    pub hb: u64,
    /// Sender-stamped freshness mark: seconds since the *sender's* local
    /// process epoch, not a global clock.
    pub ts: f64,
    pub alive: bool,
}

impl Node {
    pub fn new(id: NodeId, ts: f64) -> Self {
        Node {
            id,
            hb: 0,
            ts,
            alive: true,
        }
    }

    /// Merges `other` into `self` in place under the higher-`hb`-wins
    /// rule; on equal `hb` the incumbent (`self`) is kept.
    fn merge_from(&mut self, other: &Node) {
        debug_assert_eq!(self.id, other.id);
        if other.hb > self.hb {
            *self = *other;
        }
    }
}

/// Mapping from node id to its most recently merged record. `BTreeMap` is
/// used (rather than a hash map) purely so iteration for display purposes
/// comes out in ascending id order for free; no ordering is required for
/// correctness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    members: BTreeMap<NodeId, Node>,
}

impl Membership {
    pub fn new() -> Self {
        Membership::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.members.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    /// Inserts or overwrites a record unconditionally (no merge). Used by
    /// a node for its own self-record and by the coordinator's
    /// unconditional `Update`.
    pub fn put(&mut self, node: Node) {
        self.members.insert(node.id, node);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn count_alive(&self) -> usize {
        self.members.values().filter(|n| n.alive).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.members.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut Node)> {
        self.members.iter_mut()
    }

    /// Merges `other` into `self` per-id under the higher-`hb`-wins rule.
    /// Idempotent, commutative, and associative: this is a CRDT merge.
    pub fn merge(&mut self, other: &Membership) {
        for (id, node) in other.members.iter() {
            self.members
                .entry(*id)
                .and_modify(|incumbent| incumbent.merge_from(node))
                .or_insert(*node);
        }
    }

    /// Returns a new table that is the merge of `a` and `b`, without
    /// mutating either.
    pub fn merged(a: &Membership, b: &Membership) -> Membership {
        let mut out = a.clone();
        out.merge(b);
        out
    }
}

/// Coordinator-side authoritative-ish member table. "Authoritative-ish"
/// because real authority over a node's `hb`/`ts`/`alive` rests with the
/// node itself and any peer that gossips about it; the coordinator only
/// mirrors what it's told. Owned by exactly one service instance, guarded
/// by the coordinator's per-service mutex.
#[derive(Debug, Default)]
pub struct MembershipService {
    table: Membership,
}

impl MembershipService {
    pub fn new() -> Self {
        MembershipService::default()
    }

    /// Inserts a fresh record; rejects a duplicate id.
    pub fn add(&mut self, node: Node) -> Result<Node, RingVoteError> {
        if self.table.contains(node.id) {
            return logged_err!("ID already exists");
        }
        self.table.put(node);
        Ok(node)
    }

    /// Overwrites an existing record unconditionally; rejects a missing
    /// id.
    pub fn update(&mut self, node: Node) -> Result<Node, RingVoteError> {
        if !self.table.contains(node.id) {
            return logged_err!("ID does not exist");
        }
        self.table.put(node);
        Ok(node)
    }

    /// Number of records currently marked alive; a diagnostic, not the
    /// basis for quorum sizing (quorum uses the static configured `N`).
    pub fn num_alive(&self) -> usize {
        self.table.count_alive()
    }

    /// Number of registered records.
    pub fn num_nodes(&self) -> usize {
        self.table.len()
    }
}
