use thiserror::Error;

/// Errors raised by the ledger core and its supporting layers.
///
/// Validation and replacement failures carry the short categorical reason
/// string a caller is expected to match on or log; lower-level failures
/// (malformed hex, malformed PEM, JSON errors) are wrapped rather than
/// flattened so the original cause survives in the error chain.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("cannot replace chain: {0}")]
    ReplacementRejected(String),

    #[error("invalid hash")]
    InvalidHash,

    #[error("insufficient difficulty")]
    InsufficientDifficulty,

    #[error("amount exceeds balance")]
    InsufficientFunds,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid key size: expected {expected}, received {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("cryptographic error: {0}")]
    CryptographicError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("network error: {0}")]
    NetworkError(String),
}
