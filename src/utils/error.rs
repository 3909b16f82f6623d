//! Typed error value shared by every service and task in the crate.

use std::fmt;
use std::io;

/// Unified error type returned by coordinator services, node tasks, and the
/// RPC transport. Three failure classes: pre-condition rejections,
/// transport failures, and configuration failures.
#[derive(Debug)]
pub enum RingVoteError {
    /// A service rejected a call because a stated pre-condition did not
    /// hold (duplicate id, missing id, empty mailbox, stale term, ...).
    /// Carries the same message text the wire contract promises.
    Rejected(String),

    /// The RPC transport failed to complete a call: connect failure, I/O
    /// error, malformed frame, or timeout.
    Transport(String),

    /// A CLI argument or config file could not be parsed or was out of
    /// range.
    Config(String),
}

impl RingVoteError {
    pub fn rejected<S: Into<String>>(msg: S) -> Self {
        RingVoteError::Rejected(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        RingVoteError::Transport(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        RingVoteError::Config(msg.into())
    }

    /// True for the class of errors a periodic task should swallow and
    /// retry on the next tick rather than treat as fatal.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RingVoteError::Config(_))
    }
}

impl fmt::Display for RingVoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingVoteError::Rejected(msg) => write!(f, "{}", msg),
            RingVoteError::Transport(msg) => write!(f, "transport error: {}", msg),
            RingVoteError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for RingVoteError {}

impl From<io::Error> for RingVoteError {
    fn from(err: io::Error) -> Self {
        RingVoteError::Transport(err.to_string())
    }
}

impl From<bincode::Error> for RingVoteError {
    fn from(err: bincode::Error) -> Self {
        RingVoteError::Transport(format!("frame codec error: {}", err))
    }
}

impl From<toml::de::Error> for RingVoteError {
    fn from(err: toml::de::Error) -> Self {
        RingVoteError::Config(err.to_string())
    }
}
