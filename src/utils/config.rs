//! Layered configuration: every tunable has a hardcoded default and may be
//! overridden by an optional TOML string (typically the contents of a
//! `--config` file). CLI flags that have their own dedicated flag
//! (`--coordinator`, `--kill-hook`) are threaded through separately and
//! take precedence over whatever the config file says for those fields.

use serde::Deserialize;

use crate::utils::RingVoteError;

/// Parses `config_str` (if given) as TOML into `T`, falling back to
/// `T::default()` for any field the TOML omits. `T` must derive both
/// `Default` and `Deserialize` with `#[serde(default)]` on the struct so
/// partial TOML documents are accepted.
#[macro_export]
macro_rules! parsed_config {
    ($config_str:expr, $ty:ty) => {{
        match $config_str {
            None => Ok(<$ty>::default()),
            Some(s) => toml::from_str::<$ty>(s).map_err($crate::utils::RingVoteError::from),
        }
    }};
}

/// Tunables for the coordinator binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address the coordinator listens on.
    pub listen_addr: String,
    /// Static ring size used for quorum sizing diagnostics.
    pub population: u8,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            listen_addr: "127.0.0.1:9005".to_string(),
            population: 8,
        }
    }
}

impl CoordinatorConfig {
    /// Parses an optional TOML document over the defaults.
    pub fn load(config_str: Option<&str>) -> Result<Self, RingVoteError> {
        parsed_config!(config_str, CoordinatorConfig)
    }
}

/// Tunables for the node binary's three timer chains.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Static ring size; must match the coordinator's.
    pub population: u8,
    /// Heartbeat tick period, in milliseconds.
    pub hb_interval_ms: u64,
    /// Gossip tick period, in milliseconds.
    pub gossip_interval_ms: u64,
    /// Suspicion window: mark a peer dead if its record hasn't advanced
    /// within this many seconds.
    pub dead_timeout_s: f64,
    /// Lower bound of the randomized pre-candidacy delay, in
    /// milliseconds; the upper bound is twice this value.
    pub candidate_time_ms: u64,
    /// Upper bound (exclusive) of the randomized pre-countVotes delay,
    /// in milliseconds.
    pub election_time_ms: u64,
    /// Per-call RPC timeout, in milliseconds.
    pub rpc_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            population: 8,
            hb_interval_ms: 50,
            gossip_interval_ms: 2000,
            dead_timeout_s: 6.0,
            candidate_time_ms: 150,
            election_time_ms: 50,
            rpc_timeout_ms: 500,
        }
    }
}

impl NodeConfig {
    /// Quorum size for the configured ring: `floor(N/2) + 1`.
    pub fn quorum(&self) -> u32 {
        (self.population as u32) / 2 + 1
    }

    /// Validates that `id` is a legal node id for this ring
    /// (`1..=population`).
    pub fn validate_id(&self, id: u8) -> Result<(), RingVoteError> {
        if id < 1 || id > self.population {
            let msg = format!("invalid node id {}: must be in 1..={}", id, self.population);
            log::error!("<{}> {}", crate::utils::me(), msg);
            return Err(RingVoteError::config(msg));
        }
        Ok(())
    }

    /// Parses an optional TOML document over the defaults.
    pub fn load(config_str: Option<&str>) -> Result<Self, RingVoteError> {
        parsed_config!(config_str, NodeConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hardcoded_constants() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.population, 8);
        assert_eq!(cfg.hb_interval_ms, 50);
        assert_eq!(cfg.gossip_interval_ms, 2000);
        assert_eq!(cfg.dead_timeout_s, 6.0);
        assert_eq!(cfg.candidate_time_ms, 150);
        assert_eq!(cfg.election_time_ms, 50);
        assert_eq!(cfg.quorum(), 5);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: NodeConfig = parsed_config!(
            Some("gossip_interval_ms = 10\ndead_timeout_s = 0.5"),
            NodeConfig
        )
        .unwrap();
        assert_eq!(cfg.gossip_interval_ms, 10);
        assert_eq!(cfg.dead_timeout_s, 0.5);
        // untouched fields keep their defaults
        assert_eq!(cfg.hb_interval_ms, 50);
        assert_eq!(cfg.population, 8);
    }

    #[test]
    fn none_yields_defaults() {
        let cfg: CoordinatorConfig = parsed_config!(None, CoordinatorConfig).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9005");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let res: Result<NodeConfig, _> = parsed_config!(Some("not valid toml {{"), NodeConfig);
        assert!(matches!(res, Err(RingVoteError::Config(_))));
    }

    #[test]
    fn validate_id_bounds() {
        let cfg = NodeConfig::default();
        assert!(cfg.validate_id(1).is_ok());
        assert!(cfg.validate_id(8).is_ok());
        assert!(cfg.validate_id(0).is_err());
        assert!(cfg.validate_id(9).is_err());
    }
}
