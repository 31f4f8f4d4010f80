pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{KeyPair, PrivateKey, PublicKey, Signature};
pub use error::BlockchainError;
pub use types::{Amount, NodeConfig, PeerInfo, Timestamp};

pub type Result<T> = std::result::Result<T, BlockchainError>;
