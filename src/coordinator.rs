//! The coordinator: the rendezvous process hosting the four stateful
//! services over the wire transport in [`crate::rpc`].

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use crate::election::ElectionService;
use crate::leader::LeaderService;
use crate::mailbox::MailboxService;
use crate::membership::MembershipService;
use crate::rpc::{read_frame, reply_of, write_frame, Reply, Request};
use crate::utils::RingVoteError;
use crate::{pf_debug, pf_error, pf_info, pf_trace};

/// Owns the four coordinator-side services, each behind its own mutex so
/// that unrelated services never contend with one another, and every
/// held lock spans exactly one operation (no blocking inside a critical
/// section).
#[derive(Default)]
pub struct CoordinatorServer {
    membership: Mutex<MembershipService>,
    mailbox: Mutex<MailboxService>,
    leader: Mutex<LeaderService>,
    election: Mutex<ElectionService>,
}

impl CoordinatorServer {
    pub fn new() -> Arc<Self> {
        Arc::new(CoordinatorServer::default())
    }

    /// Dispatches one decoded request to the service it names, returning
    /// the matching reply. This is a plain enum match rather than a
    /// trait-object service registry: no polymorphism is needed since the
    /// set of operations is fixed.
    pub async fn dispatch(&self, req: Request) -> Reply {
        match req {
            Request::MembershipAdd(node) => {
                let mut svc = self.membership.lock().await;
                reply_of(svc.add(node), Reply::Node)
            }
            Request::MembershipUpdate(node) => {
                let mut svc = self.membership.lock().await;
                reply_of(svc.update(node), Reply::Node)
            }
            Request::MembershipGetNumNodes => {
                let svc = self.membership.lock().await;
                Reply::Count(svc.num_nodes())
            }
            Request::MembershipGetNumAlive => {
                let svc = self.membership.lock().await;
                Reply::Count(svc.num_alive())
            }
            Request::RequestsAdd {
                destination,
                snapshot,
            } => {
                let mut svc = self.mailbox.lock().await;
                svc.add(destination, snapshot);
                Reply::Bool(true)
            }
            Request::RequestsListen { destination } => {
                let mut svc = self.mailbox.lock().await;
                reply_of(svc.listen(destination), Reply::Membership)
            }
            Request::LeaderGet(hint) => {
                let svc = self.leader.lock().await;
                reply_of(svc.get(hint), Reply::Leader)
            }
            Request::LeaderUpdate(new_leader) => {
                let mut svc = self.leader.lock().await;
                Reply::Bool(svc.update(new_leader))
            }
            Request::ElectionRequestVote(proposal) => {
                let mut svc = self.election.lock().await;
                reply_of(svc.request_vote(proposal), Reply::VoteCount)
            }
            Request::ElectionSendVote(vote) => {
                let mut svc = self.election.lock().await;
                reply_of(svc.send_vote(vote), Reply::Bool)
            }
            Request::ElectionGet(hint) => {
                let svc = self.election.lock().await;
                reply_of(svc.get(hint), Reply::Election)
            }
            Request::ElectionClear(curr_term) => {
                let mut svc = self.election.lock().await;
                Reply::Bool(svc.clear(curr_term))
            }
            Request::ElectionDrop(node) => {
                let mut svc = self.election.lock().await;
                Reply::Bool(svc.drop_candidate(node))
            }
        }
    }

    /// Handles one client connection: reads frames and replies to each in
    /// turn until the peer disconnects or a frame fails to decode.
    async fn serve_conn(self: Arc<Self>, mut sock: TcpStream) {
        loop {
            let req = match read_frame::<Request>(&mut sock).await {
                Ok(req) => req,
                Err(_) => break, // peer closed, or a bad frame: drop the connection
            };
            pf_trace!("dispatching {:?}", req);
            let reply = self.dispatch(req).await;
            if write_frame(&mut sock, &reply).await.is_err() {
                break;
            }
        }
    }

    /// Accepts connections on `listener` until `shutdown` fires. Each
    /// connection is served on its own spawned task so concurrent peers
    /// never block one another; contention is confined to the per-service
    /// mutexes above.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RingVoteError> {
        pf_info!("listening on {}", listener.local_addr()?);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (sock, peer) = accepted?;
                    pf_debug!("accepted connection from {}", peer);
                    let this = Arc::clone(&self);
                    tokio::spawn(this.serve_conn(sock));
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        pf_info!("shutting down");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
