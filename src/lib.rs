//! Public interface to the ringvote core library, linked by the
//! coordinator and node binaries alike.

mod coordinator;
mod election;
mod leader;
mod mailbox;
mod membership;
mod node;
mod rpc;
mod utils;

pub use coordinator::CoordinatorServer;
pub use election::{Election, ElectionService};
pub use leader::{Leader, LeaderService};
pub use mailbox::MailboxService;
pub use membership::{Membership, MembershipService, Node, NodeId};
pub use node::{gossip, heartbeat, neighbors, spawn_candidacy, NodeState};
pub use rpc::{Reply, Request, RpcClient};
pub use utils::{logger_init, me, set_me, Clock, CoordinatorConfig, NodeConfig, RingVoteError};
