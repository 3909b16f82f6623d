//! The candidate path: `tryCandidate` then `countVotes`, kicked off by the
//! gossip task when no live leader is known.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use crate::election::Election;
use crate::leader::Leader;
use crate::node::state::NodeState;
use crate::rpc::{expect_reply, Reply, Request, RpcClient};
use crate::utils::NodeConfig;
use crate::{pf_debug, pf_info};

/// Schedules the full candidacy chain after a randomized delay uniform in
/// `[candidate_time_ms, 2*candidate_time_ms)`, so that nodes noticing the
/// same leaderless gap don't all announce in the same instant. Runs on
/// its own spawned task with its own RPC connection, independent of the
/// gossip chain that triggered it.
pub fn spawn_candidacy(
    state: Arc<Mutex<NodeState>>,
    config: NodeConfig,
    coordinator_addr: String,
) {
    tokio::spawn(async move {
        let delay_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(config.candidate_time_ms..2 * config.candidate_time_ms)
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let mut client = RpcClient::new(
            coordinator_addr,
            Duration::from_millis(config.rpc_timeout_ms),
        );
        try_candidate(&state, &mut client, &config).await;
    });
}

/// Step 1-2 of the candidate path: re-check for a live leader, then (if
/// none) propose self as a candidate for the next term and schedule
/// `countVotes`.
async fn try_candidate(state: &Mutex<NodeState>, client: &mut RpcClient, config: &NodeConfig) {
    let leader_hint = {
        let s = state.lock().await;
        s.leader
    };
    let fresh_leader = match client.call(Request::LeaderGet(leader_hint)).await {
        Ok(reply) => expect_reply(reply, |r| match r {
            Reply::Leader(l) => Some(l),
            _ => None,
        })
        .ok(),
        Err(_) => None,
    };

    let mut s = state.lock().await;
    if let Some(l) = fresh_leader {
        s.leader = l;
    }
    if s.leader_is_live() {
        s.candidate = false;
        return;
    }

    let id = s.id;
    let proposal_term = s.leader.term + 1;
    s.candidate = true;
    s.curr_term = proposal_term;
    s.voted_for = id;
    drop(s);

    pf_info!("starting candidacy for term {}", proposal_term);
    let proposal = Leader {
        node_id: id,
        term: proposal_term,
    };
    if client
        .call(Request::ElectionRequestVote(proposal))
        .await
        .is_err()
    {
        // couldn't even announce candidacy; back off and let the next
        // gossip tick retry from scratch
        let mut s = state.lock().await;
        s.candidate = false;
        return;
    }

    let delay_ms = {
        let mut rng = rand::thread_rng();
        if config.election_time_ms == 0 {
            0
        } else {
            rng.gen_range(0..config.election_time_ms)
        }
    };
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    count_votes(state, client, proposal_term, config).await;
}

/// Step 3 of the candidate path: read the tally, and either win (install
/// self as leader and clear the round) or withdraw.
async fn count_votes(
    state: &Mutex<NodeState>,
    client: &mut RpcClient,
    proposal_term: u64,
    config: &NodeConfig,
) {
    let id = state.lock().await.id;
    // hint with term - 1 so Get sees our own in-flight tally as "newer"
    let hint = Leader {
        node_id: 0,
        term: proposal_term.saturating_sub(1),
    };
    let election: Option<Election> = match client.call(Request::ElectionGet(hint)).await {
        Ok(reply) => expect_reply(reply, |r| match r {
            Reply::Election(e) => Some(e),
            _ => None,
        })
        .ok(),
        Err(_) => None,
    };

    let won = election
        .as_ref()
        .and_then(|e| e.results.get(&id))
        .is_some_and(|&votes| votes >= config.quorum());

    if won {
        let election = election.expect("won implies a tally was read");
        let winner = Leader {
            node_id: id,
            term: election.term,
        };
        pf_info!("won election for term {}", election.term);
        let _ = client.call(Request::LeaderUpdate(winner)).await;
        let _ = client.call(Request::ElectionClear(election.term)).await;
        let mut s = state.lock().await;
        s.leader = winner;
        s.candidate = false;
    } else {
        pf_debug!("lost election for term {}, withdrawing", proposal_term);
        let _ = client.call(Request::ElectionDrop(id)).await;
        let mut s = state.lock().await;
        s.candidate = false;
        s.voted_for = 0;
    }
}
