//! The node's bundled local state: `curr_term`, `voted_for`, `candidate`,
//! the local membership view, and the most recently observed leader. All
//! three timer chains (heartbeat, gossip, candidacy) share one instance
//! behind a single mutex, since their callbacks run as independently
//! spawned tasks.

use crate::election::Election;
use crate::leader::Leader;
use crate::membership::{Membership, Node, NodeId};
use crate::utils::Clock;

#[derive(Debug)]
pub struct NodeState {
    pub id: NodeId,
    pub curr_term: u64,
    /// `0` means "hasn't voted this term".
    pub voted_for: NodeId,
    pub candidate: bool,
    pub membership: Membership,
    pub leader: Leader,
    pub clock: Clock,
}

impl NodeState {
    pub fn new(id: NodeId) -> Self {
        let clock = Clock::start();
        let mut membership = Membership::new();
        membership.put(Node::new(id, clock.now()));
        NodeState {
            id,
            curr_term: 0,
            voted_for: 0,
            candidate: false,
            membership,
            leader: Leader::NONE,
            clock,
        }
    }

    /// The voter-side term bookkeeping shared by the heartbeat task's
    /// voter half and the candidacy chain: if `tally_term` is newer than
    /// what we've seen, adopt it and reset our vote.
    pub fn observe_term(&mut self, tally_term: u64) {
        if tally_term > self.curr_term {
            self.curr_term = tally_term;
            self.voted_for = 0;
        }
    }

    /// Whether we believe the currently known leader is both present and
    /// alive in our local membership view.
    pub fn leader_is_live(&self) -> bool {
        self.leader.is_known()
            && self
                .membership
                .get(self.leader.node_id)
                .is_some_and(|n| n.alive)
    }

    /// Whether this node should kick off candidacy on this gossip tick:
    /// not already a candidate, and no live leader is known.
    pub fn should_seek_candidacy(&self) -> bool {
        !self.candidate && !self.leader_is_live()
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.membership.get(id).is_some_and(|n| n.alive)
    }

    /// Picks the voter's choice among an election's candidates and casts
    /// the vote locally (the caller still has to send it over RPC and
    /// only commit `voted_for` on success).
    pub fn pick_candidate(&self, election: &Election) -> Option<NodeId> {
        crate::election::pick_candidate(election, |id| self.is_alive(id))
    }
}
