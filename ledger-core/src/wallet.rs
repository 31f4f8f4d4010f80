//! Address identity and chain-derived balance accounting.
//!
//! A wallet's balance is never stored; [`calculate_balance`] recomputes it by
//! scanning the chain from genesis on every call, matching the reference
//! system's replay-as-derived-state design (see `original_source/backend/
//! wallet/wallet.py::calculate_balance`).

use crate::block::Block;
use rand::Rng;
use shared::crypto::{KeyPair, PrivateKey, PublicKey};

/// A long-lived local identity: a short random address plus the SECP256k1
/// keypair that signs transactions on its behalf. The address is an
/// independent random handle, not derived from the key material.
#[derive(Debug)]
pub struct Wallet {
    pub address: String,
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl Wallet {
    /// Generates a fresh wallet: a new 8-character address and a new
    /// SECP256k1 keypair.
    #[must_use]
    pub fn new() -> Self {
        let keypair = KeyPair::generate().expect("key generation does not fail");
        Self {
            address: random_address(),
            private_key: keypair.private_key,
            public_key: keypair.public_key,
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

fn random_address() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Recomputes `address`'s balance by scanning `chain` from genesis.
///
/// For each transaction whose `input.address == address`, the balance is
/// *reset* to that transaction's change entry (`output[address]`) rather
/// than adjusted — the sender's most recent outbound transaction is the
/// authoritative snapshot of their balance, and only receipts after that
/// point accumulate on top of it. An address with no history at all keeps
/// `starting_balance`.
///
/// Note: this reset rule is applied verbatim for *any* input address match,
/// including the mining-reward sentinel's fixed address — which never
/// collides with a real wallet address, so the case is benign but
/// intentionally not special-cased away.
#[must_use]
pub fn calculate_balance(chain: &[Block], address: &str, starting_balance: u64) -> u64 {
    let mut balance = starting_balance;
    for block in chain {
        for tx in &block.data {
            if tx.input.address() == address {
                balance = *tx.output.get(address).unwrap_or(&0);
            } else if let Some(received) = tx.output.get(address) {
                balance += received;
            }
        }
    }
    balance
}
