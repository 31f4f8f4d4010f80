//! Shared type aliases and the node's configuration value.

use serde::{Deserialize, Serialize};

/// A monetary amount, in whole units of the ledger's native currency.
pub type Amount = u64;

/// Nanoseconds since the Unix epoch — the timestamp resolution used
/// throughout the ledger (blocks and transaction inputs alike).
pub type Timestamp = i64;

/// Configuration for a single node, constructed once at process start and
/// passed by reference into the runtime, gossip, and CLI layers. Never read
/// from process-global state after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// TCP port the gossip transport listens on.
    pub gossip_port: u16,
    /// Multiaddresses of peers to dial at startup.
    pub bootstrap_peers: Vec<String>,
    /// When true, preload synthetic blocks and mempool entries for local
    /// development instead of starting from a bare genesis chain.
    pub seed: bool,
    /// Logging verbosity, as accepted by `tracing_subscriber`'s env filter
    /// syntax (e.g. `"info"`, `"debug"`).
    pub log_level: String,
    /// Starting balance assigned to any address with no transaction
    /// history yet.
    pub starting_balance: Amount,
    /// Target inter-block time, in nanoseconds, that drives difficulty
    /// adjustment.
    pub mine_rate_ns: i64,
    /// Reward paid to the miner of each block.
    pub mining_reward: Amount,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gossip_port: 0,
            bootstrap_peers: Vec::new(),
            seed: false,
            log_level: "info".to_string(),
            starting_balance: 1_000,
            mine_rate_ns: 4_000_000_000,
            mining_reward: 50,
        }
    }
}

/// Information about a known gossip peer, used for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// The peer's transport-level identifier.
    pub peer_id: String,
    /// The peer's dialable address, if known.
    pub address: Option<String>,
    /// Whether the peer is currently connected.
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_config_defaults_match_documented_constants() {
        let config = NodeConfig::default();
        assert_eq!(config.starting_balance, 1_000);
        assert_eq!(config.mine_rate_ns, 4_000_000_000);
        assert_eq!(config.mining_reward, 50);
        assert!(!config.seed);
        assert!(config.bootstrap_peers.is_empty());
    }
}
