//! The node process: local state plus its three independently-timed task
//! chains (heartbeat, gossip, candidacy).

pub mod candidacy;
pub mod gossip;
pub mod heartbeat;
pub mod ring;
pub mod state;

pub use candidacy::spawn_candidacy;
pub use ring::neighbors;
pub use state::NodeState;
