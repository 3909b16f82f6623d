//! The per-destination mailbox service used for neighbor gossip exchange.

use std::collections::BTreeMap;

use crate::logged_err;
use crate::membership::{Membership, NodeId};
use crate::utils::RingVoteError;

/// Coordinator-side mailbox table. Owned by exactly one service instance,
/// guarded by the coordinator's per-service mutex.
#[derive(Debug, Default)]
pub struct MailboxService {
    pending: BTreeMap<NodeId, Membership>,
}

impl MailboxService {
    pub fn new() -> Self {
        MailboxService::default()
    }

    /// Deposits `snapshot` for `destination`. If a snapshot already
    /// waits there, the new one is merged in under the membership merge
    /// rule rather than replacing it, so no data is lost while a
    /// destination is slow to drain.
    pub fn add(&mut self, destination: NodeId, snapshot: Membership) {
        self.pending
            .entry(destination)
            .and_modify(|existing| existing.merge(&snapshot))
            .or_insert(snapshot);
    }

    /// Non-blocking read-and-remove. Absence is an error, not an empty
    /// value, so the caller can tell "nothing arrived" apart from "an
    /// empty snapshot arrived".
    pub fn listen(&mut self, destination: NodeId) -> Result<Membership, RingVoteError> {
        match self.pending.remove(&destination) {
            Some(snapshot) => Ok(snapshot),
            None => logged_err!("Nothing to listen to"),
        }
    }
}
