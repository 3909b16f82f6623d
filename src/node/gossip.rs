//! The gossip / failure-detection task: exchanges membership snapshots
//! with ring neighbors, applies the suspicion rule, refreshes the known
//! leader, and kicks off candidacy when no live leader exists.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::membership::NodeId;
use crate::node::candidacy::spawn_candidacy;
use crate::node::ring::neighbors;
use crate::node::state::NodeState;
use crate::rpc::{expect_reply, Reply, Request, RpcClient};
use crate::utils::NodeConfig;
use crate::{pf_debug, pf_trace};

/// One gossip tick: push our snapshot to both ring neighbors, drain our
/// own mailbox and merge what's there, then apply suspicion and refresh
/// the known leader.
async fn tick(
    state: &Arc<Mutex<NodeState>>,
    client: &mut RpcClient,
    config: &NodeConfig,
    coordinator_addr: &str,
) {
    let (id, my_snapshot, pre_merge_hbs, now) = {
        let s = state.lock().await;
        let pre_merge_hbs: BTreeMap<NodeId, u64> =
            s.membership.iter().map(|(id, n)| (*id, n.hb)).collect();
        (s.id, s.membership.clone(), pre_merge_hbs, s.clock.now())
    };

    let (predecessor, successor) = neighbors(id, config.population);
    for neighbor in [predecessor, successor] {
        let result = client
            .call(Request::RequestsAdd {
                destination: neighbor,
                snapshot: my_snapshot.clone(),
            })
            .await;
        if let Err(e) = result {
            pf_debug!("snapshot push to {} failed: {}", neighbor, e);
        }
    }

    if let Ok(reply) = client.call(Request::RequestsListen { destination: id }).await {
        if let Ok(incoming) = expect_reply(reply, |r| match r {
            Reply::Membership(m) => Some(m),
            _ => None,
        }) {
            let mut s = state.lock().await;
            s.membership.merge(&incoming);
        }
    }

    apply_suspicion_rule(state, client, &pre_merge_hbs, now, config.dead_timeout_s).await;
    refresh_leader(state, client).await;

    let should_candidate = state.lock().await.should_seek_candidacy();
    if should_candidate {
        pf_debug!("no live leader known, scheduling candidacy");
        spawn_candidacy(Arc::clone(state), config.clone(), coordinator_addr.to_string());
    }
}

/// Marks any entry whose `hb` didn't advance across this tick's merge as
/// dead once its `ts` is older than `DEAD_TIMEOUT`; refreshes `ts` on any
/// entry whose `hb` did advance (a local re-stamp, not authoritative).
async fn apply_suspicion_rule(
    state: &Mutex<NodeState>,
    client: &mut RpcClient,
    pre_merge_hbs: &BTreeMap<NodeId, u64>,
    now: f64,
    dead_timeout_s: f64,
) {
    let mut newly_dead = Vec::new();
    {
        let mut s = state.lock().await;
        for (id, node) in s.membership.iter_mut() {
            let advanced = pre_merge_hbs.get(id).is_none_or(|&hb| node.hb != hb);
            if advanced {
                node.ts = now;
            } else if node.alive && node.ts < now - dead_timeout_s {
                node.alive = false;
                newly_dead.push(*node);
            }
        }
    }
    for node in newly_dead {
        pf_trace!("suspecting node {} dead (stale since {:.3})", node.id, node.ts);
        if let Err(e) = client.call(Request::MembershipUpdate(node)).await {
            pf_debug!("dead-peer mirror failed: {}", e);
        }
    }
}

async fn refresh_leader(state: &Mutex<NodeState>, client: &mut RpcClient) {
    let hint = state.lock().await.leader;
    if let Ok(reply) = client.call(Request::LeaderGet(hint)).await {
        if let Ok(leader) = expect_reply(reply, |r| match r {
            Reply::Leader(l) => Some(l),
            _ => None,
        }) {
            state.lock().await.leader = leader;
        }
    }
}

/// Runs the gossip loop until `shutdown` fires.
pub async fn run(
    state: Arc<Mutex<NodeState>>,
    config: NodeConfig,
    coordinator_addr: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut client = RpcClient::new(
        coordinator_addr.clone(),
        Duration::from_millis(config.rpc_timeout_ms),
    );
    let mut interval = tokio::time::interval(Duration::from_millis(config.gossip_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => tick(&state, &mut client, &config, &coordinator_addr).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorServer;
    use crate::leader::Leader;
    use crate::membership::Node;
    use tokio::net::TcpListener;

    async fn spawn_coordinator() -> String {
        let coord = CoordinatorServer::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (_tx, rx) = watch::channel(false);
        tokio::spawn(coord.serve(listener, rx));
        addr
    }

    fn fast_config() -> NodeConfig {
        let mut cfg = NodeConfig::default();
        cfg.population = 8;
        cfg.dead_timeout_s = 0.01;
        cfg
    }

    #[tokio::test]
    async fn suspicion_marks_stale_unchanged_entry_dead() {
        let addr = spawn_coordinator().await;
        let mut client = RpcClient::new(addr, Duration::from_millis(500));
        let cfg = fast_config();

        let state = Arc::new(Mutex::new(NodeState::new(1)));
        state.lock().await.membership.put(Node {
            id: 2,
            hb: 1,
            ts: -10.0, // far in the past relative to `now`
            alive: true,
        });
        let pre_merge: BTreeMap<NodeId, u64> = [(1u8, 0u64), (2u8, 1u64)].into_iter().collect();

        apply_suspicion_rule(&state, &mut client, &pre_merge, 0.0, cfg.dead_timeout_s).await;

        assert!(!state.lock().await.membership.get(2).unwrap().alive);
    }

    #[tokio::test]
    async fn suspicion_spares_entries_whose_hb_advanced() {
        let addr = spawn_coordinator().await;
        let mut client = RpcClient::new(addr, Duration::from_millis(500));
        let cfg = fast_config();

        let state = Arc::new(Mutex::new(NodeState::new(1)));
        state.lock().await.membership.put(Node {
            id: 2,
            hb: 5,
            ts: -10.0,
            alive: true,
        });
        // pre-merge view had hb=1, post-merge has hb=5: advanced
        let pre_merge: BTreeMap<NodeId, u64> = [(1u8, 0u64), (2u8, 1u64)].into_iter().collect();

        apply_suspicion_rule(&state, &mut client, &pre_merge, 0.0, cfg.dead_timeout_s).await;

        let s = state.lock().await;
        assert!(s.membership.get(2).unwrap().alive);
        assert_eq!(s.membership.get(2).unwrap().ts, 0.0, "ts re-stamped to now");
    }

    #[tokio::test]
    async fn two_node_handshake_converges_membership() {
        let addr = spawn_coordinator().await;
        let cfg = {
            let mut c = NodeConfig::default();
            c.population = 8;
            c
        };

        let state1 = Arc::new(Mutex::new(NodeState::new(1)));
        let state2 = Arc::new(Mutex::new(NodeState::new(2)));
        state1.lock().await.membership.put(Node {
            id: 1,
            hb: 1,
            ts: 0.0,
            alive: true,
        });
        state2.lock().await.membership.put(Node {
            id: 2,
            hb: 1,
            ts: 0.0,
            alive: true,
        });

        let mut client1 = RpcClient::new(addr.clone(), Duration::from_millis(500));
        let mut client2 = RpcClient::new(addr.clone(), Duration::from_millis(500));

        // one exchange round: 1 -> neighbors (incl. 2), 2 -> neighbors (incl. 1)
        tick(&state1, &mut client1, &cfg, &addr).await;
        tick(&state2, &mut client2, &cfg, &addr).await;
        // a second round lets each side drain what the other just sent
        tick(&state1, &mut client1, &cfg, &addr).await;
        tick(&state2, &mut client2, &cfg, &addr).await;

        assert!(state1.lock().await.membership.contains(2));
        assert!(state2.lock().await.membership.contains(1));
    }

    #[tokio::test]
    async fn refresh_leader_adopts_coordinator_value() {
        let addr = spawn_coordinator().await;
        let mut setup = RpcClient::new(addr.clone(), Duration::from_millis(500));
        setup
            .call(Request::LeaderUpdate(Leader { node_id: 4, term: 2 }))
            .await
            .unwrap();

        let state = Mutex::new(NodeState::new(1));
        let mut client = RpcClient::new(addr, Duration::from_millis(500));
        refresh_leader(&state, &mut client).await;

        assert_eq!(state.lock().await.leader, Leader { node_id: 4, term: 2 });
    }
}
