//! The leader record and the coordinator-side `Leader` service.

use serde::{Deserialize, Serialize};

use crate::logged_err;
use crate::membership::NodeId;
use crate::utils::RingVoteError;

/// `node_id == 0` is the "no leader known" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    pub node_id: NodeId,
    pub term: u64,
}

impl Leader {
    pub const NONE: Leader = Leader {
        node_id: 0,
        term: 0,
    };

    pub fn is_known(&self) -> bool {
        self.node_id != 0
    }
}

impl Default for Leader {
    fn default() -> Self {
        Leader::NONE
    }
}

/// Coordinator-side authoritative leader record. Owned by exactly one
/// service instance, guarded by the coordinator's per-service mutex.
#[derive(Debug, Default)]
pub struct LeaderService {
    current: Leader,
}

impl LeaderService {
    pub fn new() -> Self {
        LeaderService::default()
    }

    /// Returns the stored record, or an error if no leader is known yet.
    /// `hint` is accepted but unused: unlike `Election.Get`, staleness
    /// here is about "no leader at all", not "no *newer* leader than what
    /// the caller already knows".
    pub fn get(&self, _hint: Leader) -> Result<Leader, RingVoteError> {
        if self.current.is_known() {
            Ok(self.current)
        } else {
            logged_err!("No Leader was found")
        }
    }

    /// Installs `new_leader`, except a stale winner from an older term
    /// cannot clobber a newer one already installed
    /// (`new_leader.term >= current.term`).
    pub fn update(&mut self, new_leader: Leader) -> bool {
        if new_leader.term < self.current.term {
            return false;
        }
        self.current = new_leader;
        true
    }
}
