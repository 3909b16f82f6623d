//! The election tally and the coordinator-side `Election` service, plus
//! the node-local candidate/voter state machine built on top of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::leader::Leader;
use crate::logged_err;
use crate::membership::NodeId;
use crate::utils::RingVoteError;

/// A snapshot of the current (or most recently completed) election round.
/// All entries in `results` share `term`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub term: u64,
    pub results: BTreeMap<NodeId, u32>,
}

/// Coordinator-side election tally. Owned by exactly one service
/// instance, guarded by the coordinator's per-service mutex.
#[derive(Debug, Default)]
pub struct ElectionService {
    term: u64,
    results: BTreeMap<NodeId, u32>,
}

impl ElectionService {
    pub fn new() -> Self {
        ElectionService::default()
    }

    /// A candidate proposes itself for `proposal.term`. Rejects a stale
    /// proposal (`proposal.term < self.term`); otherwise records a
    /// self-vote and adopts `proposal.term` as the coordinator's current
    /// term, even if that means overwriting an in-flight tally for the
    /// same term from a second candidate. Returns the candidate's vote
    /// count after the self-vote (always 1).
    pub fn request_vote(&mut self, proposal: Leader) -> Result<u32, RingVoteError> {
        if proposal.term < self.term {
            return logged_err!("Invalid term");
        }
        self.term = proposal.term;
        self.results.clear();
        self.results.insert(proposal.node_id, 1);
        Ok(1)
    }

    /// A voter casts `vote.node_id` as its pick for `vote.term`. Requires
    /// an exact term match. The vote is counted only if `vote.node_id` is
    /// the abstain sentinel (`0`, always countable) or already present in
    /// `results` (i.e. a known candidate); votes for unknown candidates
    /// are silently dropped (no error, `false` reply).
    pub fn send_vote(&mut self, vote: Leader) -> Result<bool, RingVoteError> {
        if vote.term != self.term {
            return logged_err!("Invalid term for client vote");
        }
        if vote.node_id == 0 || self.results.contains_key(&vote.node_id) {
            *self.results.entry(vote.node_id).or_insert(0) += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns the current tally, but only if it is newer than
    /// `current_leader`'s term: this is both the "is an election
    /// running?" probe and the source of candidate lists for voters.
    pub fn get(&self, current_leader: Leader) -> Result<Election, RingVoteError> {
        if self.term > current_leader.term {
            Ok(Election {
                term: self.term,
                results: self.results.clone(),
            })
        } else {
            logged_err!("No new election found")
        }
    }

    /// Ends the round: empties `results` and advances the coordinator
    /// term past `curr_term`, called by the winner.
    pub fn clear(&mut self, curr_term: u64) -> bool {
        self.results.clear();
        self.term = curr_term + 1;
        true
    }

    /// Withdraws a losing candidate's entry.
    pub fn drop_candidate(&mut self, node: NodeId) -> bool {
        self.results.remove(&node);
        true
    }
}

/// Picks the voter's choice among the candidates in `election.results`:
/// the lowest-id candidate that the voter's local membership view
/// believes is alive. A deterministic tie-break.
pub fn pick_candidate(
    election: &Election,
    is_alive: impl Fn(NodeId) -> bool,
) -> Option<NodeId> {
    election
        .results
        .keys()
        .copied()
        .filter(|&id| is_alive(id))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_vote_rejects_stale_term() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 5 }).unwrap();
        let err = svc
            .request_vote(Leader { node_id: 2, term: 4 })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid term");
    }

    #[test]
    fn request_vote_overwrites_same_term_tally() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 5 }).unwrap();
        svc.send_vote(Leader { node_id: 1, term: 5 }).unwrap();
        // a second candidate proposes in the same term: tally is reset
        svc.request_vote(Leader { node_id: 2, term: 5 }).unwrap();
        let election = svc.get(Leader::NONE).unwrap();
        assert_eq!(election.results.get(&1), None);
        assert_eq!(election.results.get(&2), Some(&1));
    }

    #[test]
    fn send_vote_requires_exact_term() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 3 }).unwrap();
        let err = svc
            .send_vote(Leader { node_id: 1, term: 4 })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid term for client vote");
    }

    #[test]
    fn send_vote_for_known_candidate_counts() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 1 }).unwrap();
        assert!(svc.send_vote(Leader { node_id: 1, term: 1 }).unwrap());
        let election = svc.get(Leader::NONE).unwrap();
        assert_eq!(election.results[&1], 2);
    }

    #[test]
    fn send_vote_for_unknown_candidate_is_silently_dropped() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 1 }).unwrap();
        assert!(!svc.send_vote(Leader { node_id: 9, term: 1 }).unwrap());
        let election = svc.get(Leader::NONE).unwrap();
        assert!(!election.results.contains_key(&9));
    }

    #[test]
    fn send_vote_abstain_sentinel_always_counts() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 1 }).unwrap();
        assert!(svc.send_vote(Leader { node_id: 0, term: 1 }).unwrap());
        let election = svc.get(Leader::NONE).unwrap();
        assert_eq!(election.results[&0], 1);
    }

    #[test]
    fn get_requires_strictly_newer_term_than_hint() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 2 }).unwrap();
        assert!(svc.get(Leader { node_id: 0, term: 2 }).is_err());
        assert!(svc.get(Leader { node_id: 0, term: 1 }).is_ok());
    }

    #[test]
    fn clear_empties_and_advances_term() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 2 }).unwrap();
        assert!(svc.clear(2));
        assert!(svc.get(Leader { node_id: 0, term: 2 }).is_err());
        // a new proposal at term 3 should now succeed (2 + 1)
        assert!(svc.request_vote(Leader { node_id: 1, term: 3 }).is_ok());
    }

    #[test]
    fn drop_candidate_removes_entry() {
        let mut svc = ElectionService::new();
        svc.request_vote(Leader { node_id: 1, term: 1 }).unwrap();
        assert!(svc.drop_candidate(1));
        let election = svc.get(Leader::NONE).unwrap();
        assert!(!election.results.contains_key(&1));
    }

    #[test]
    fn pick_candidate_picks_lowest_alive_id() {
        let mut results = BTreeMap::new();
        results.insert(5_u8, 1_u32);
        results.insert(2_u8, 1_u32);
        results.insert(3_u8, 1_u32);
        let election = Election { term: 1, results };
        let picked = pick_candidate(&election, |id| id != 2);
        assert_eq!(picked, Some(3));
    }

    #[test]
    fn pick_candidate_none_when_no_alive_candidates() {
        let mut results = BTreeMap::new();
        results.insert(5_u8, 1_u32);
        let election = Election { term: 1, results };
        assert_eq!(pick_candidate(&election, |_| false), None);
    }
}
