//! The heartbeat task: increments the self heartbeat counter, mirrors it
//! to the coordinator, and runs the voter half of the election state
//! machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::election::Election;
use crate::membership::Node;
use crate::node::state::NodeState;
use crate::rpc::{expect_reply, Reply, Request, RpcClient};
use crate::utils::NodeConfig;
use crate::{pf_debug, pf_trace};

/// One heartbeat tick: increment + restamp the self record, mirror it to
/// the coordinator (best-effort), then run the voter-half of the
/// election protocol.
async fn tick(state: &Mutex<NodeState>, client: &mut RpcClient) {
    let (self_node, leader_hint) = {
        let mut s = state.lock().await;
        let now = s.clock.now();
        let id = s.id;
        let self_node = {
            let rec = s.membership.get(id).copied().unwrap_or(Node::new(id, now));
            Node {
                id,
                hb: rec.hb + 1,
                ts: now,
                alive: true,
            }
        };
        s.membership.put(self_node);
        (self_node, s.leader)
    };

    pf_trace!("hb tick: self hb now {}", self_node.hb);

    // best-effort mirror: failure just means the next tick retries
    if let Err(e) = client.call(Request::MembershipUpdate(self_node)).await {
        pf_debug!("membership mirror failed: {}", e);
    }

    run_voter_half(state, client, leader_hint).await;
}

/// The voter-half of the election protocol: observe the tally, advance
/// `curr_term` if it's newer, and cast a vote if eligible.
async fn run_voter_half(
    state: &Mutex<NodeState>,
    client: &mut RpcClient,
    leader_hint: crate::leader::Leader,
) {
    let reply = match client.call(Request::ElectionGet(leader_hint)).await {
        Ok(r) => r,
        Err(_) => return, // coordinator unreachable this tick; try again next time
    };
    let election: Election = match expect_reply(reply, |r| match r {
        Reply::Election(e) => Some(e),
        _ => None,
    }) {
        Ok(e) => e,
        Err(_) => return, // "no new election found", or an unrelated reply shape
    };

    let mut s = state.lock().await;
    s.observe_term(election.term);

    let eligible = !election.results.is_empty()
        && s.curr_term == election.term
        && !s.candidate
        && s.voted_for == 0;
    if !eligible {
        return;
    }
    let Some(picked) = s.pick_candidate(&election) else {
        return;
    };
    drop(s);

    let vote = crate::leader::Leader {
        node_id: picked,
        term: election.term,
    };
    let reply = match client.call(Request::ElectionSendVote(vote)).await {
        Ok(r) => r,
        Err(_) => return,
    };
    if let Ok(true) = expect_reply(reply, |r| match r {
        Reply::Bool(b) => Some(b),
        _ => None,
    }) {
        let mut s = state.lock().await;
        s.voted_for = picked;
        pf_debug!("voted for {} in term {}", picked, election.term);
    }
}

/// Runs the heartbeat loop until `shutdown` fires. Ticks continue
/// regardless of RPC outcomes; a dropped connection just means this
/// tick's mirror and vote attempt are skipped.
pub async fn run(
    state: Arc<Mutex<NodeState>>,
    config: NodeConfig,
    coordinator_addr: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut client = RpcClient::new(
        coordinator_addr,
        Duration::from_millis(config.rpc_timeout_ms),
    );
    let mut interval = tokio::time::interval(Duration::from_millis(config.hb_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => tick(&state, &mut client).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
