//! Tunable constants for the ledger core.
//!
//! These are the defaults a fresh [`shared::NodeConfig`] carries; a running
//! node may override the numeric ones from its configuration, but the
//! mining-reward sentinel address is a protocol constant, not a tunable.

/// Conversion factor between seconds and nanoseconds.
pub const SECONDS: i64 = 1_000_000_000;

/// Default starting balance for any address with no transaction history.
pub const STARTING_BALANCE: u64 = 1_000;

/// Default target inter-block time, in nanoseconds.
pub const MINE_RATE: i64 = 4 * SECONDS;

/// Default reward paid to the miner of each block.
pub const MINING_REWARD: u64 = 50;

/// The fixed address the mining reward sentinel input carries. No real
/// wallet is ever assigned this address, so it never collides with an
/// ordinary sender in balance calculations.
pub const MINING_REWARD_ADDRESS: &str = "*--official-mining-reward--*";
