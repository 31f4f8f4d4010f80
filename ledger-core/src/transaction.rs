//! Account-based, multi-output value transfer with per-transaction
//! signatures.
//!
//! A transaction carries its own change entry in `output` rather than
//! relying on a UTXO set: constructing one records `{recipient: amount,
//! sender: sender.balance - amount}` and signs that output map. A pending
//! transaction can be amended in place via [`Transaction::update`] before it
//! is mined, which is how a sender corrects or extends an outstanding
//! transfer instead of issuing a second one.

use crate::constants::{MINING_REWARD, MINING_REWARD_ADDRESS};
use rand::Rng;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use shared::crypto::{PrivateKey, PublicKey, Signature};
use shared::error::BlockchainError;
use shared::Result;
use std::collections::BTreeMap;
use std::fmt;

/// The sender-supplied side of a transaction: either a normal signed input,
/// or the fixed mining-reward sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A real transfer, authorized by `signature` over the transaction's
    /// `output` map.
    Normal {
        timestamp: i64,
        amount: u64,
        address: String,
        public_key: String,
        signature: Signature,
    },
    /// The distinguished sentinel marking a mining-reward transaction. Not
    /// signed — a reward transaction is authorized by chain-validation
    /// rules (at most one per block), not by a signature.
    Reward,
}

impl Input {
    /// The address this input is attributed to: the sender's address for a
    /// normal input, or the fixed reward sentinel address.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Input::Normal { address, .. } => address,
            Input::Reward => MINING_REWARD_ADDRESS,
        }
    }

    /// The declared amount, for a normal input. `None` for a reward input,
    /// which carries no declared amount.
    #[must_use]
    pub fn amount(&self) -> Option<u64> {
        match self {
            Input::Normal { amount, .. } => Some(*amount),
            Input::Reward => None,
        }
    }

    #[must_use]
    pub fn is_reward(&self) -> bool {
        matches!(self, Input::Reward)
    }
}

/// Wire shape: a reward input serializes as `{"address":
/// "*--official-mining-reward--*"}`; a normal input serializes with all
/// five fields present. Deserialization discriminates on which fields are
/// present rather than an explicit tag, matching the reference wire format
/// exactly (no `type` discriminant field).
impl Serialize for Input {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Input::Reward => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("address", MINING_REWARD_ADDRESS)?;
                map.end()
            }
            Input::Normal {
                timestamp,
                amount,
                address,
                public_key,
                signature,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("timestamp", timestamp)?;
                map.serialize_entry("amount", amount)?;
                map.serialize_entry("address", address)?;
                map.serialize_entry("public_key", public_key)?;
                map.serialize_entry("signature", signature)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Input {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawInput {
            address: String,
            timestamp: Option<i64>,
            amount: Option<u64>,
            public_key: Option<String>,
            signature: Option<Signature>,
        }

        struct InputVisitor;
        impl<'de> Visitor<'de> for InputVisitor {
            type Value = Input;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a transaction input record")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Input, A::Error> {
                let raw: RawInput =
                    Deserialize::deserialize(de::value::MapAccessDeserializer::new(map))?;
                match (raw.timestamp, raw.amount, raw.public_key, raw.signature) {
                    (Some(timestamp), Some(amount), Some(public_key), Some(signature)) => {
                        Ok(Input::Normal {
                            timestamp,
                            amount,
                            address: raw.address,
                            public_key,
                            signature,
                        })
                    }
                    (None, None, None, None) if raw.address == MINING_REWARD_ADDRESS => {
                        Ok(Input::Reward)
                    }
                    _ => Err(de::Error::custom(
                        "input must be either a complete normal input or the reward sentinel",
                    )),
                }
            }
        }

        deserializer.deserialize_map(InputVisitor)
    }
}

/// A signed, multi-output value transfer, or a mining reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub output: BTreeMap<String, u64>,
    pub input: Input,
}

fn random_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

impl Transaction {
    /// Builds a fresh transaction from `sender_address` (with current
    /// balance `sender_balance`) to `recipient` for `amount`.
    pub fn construct(
        sender_address: &str,
        sender_private_key: &PrivateKey,
        sender_public_key: &PublicKey,
        sender_balance: u64,
        recipient: &str,
        amount: u64,
    ) -> Result<Self> {
        if amount > sender_balance {
            return Err(BlockchainError::InsufficientFunds);
        }
        let mut output = BTreeMap::new();
        output.insert(recipient.to_string(), amount);
        output.insert(sender_address.to_string(), sender_balance - amount);

        let input = Self::build_input(
            sender_address,
            sender_private_key,
            sender_public_key,
            sender_balance,
            &output,
        );

        Ok(Self {
            id: random_id(),
            output,
            input,
        })
    }

    /// Amends a pending transaction: require `amount` against the
    /// *remaining* change (`output[sender]`), not the wallet's original
    /// balance, then rebuild `output` and re-sign `input`. `id` is
    /// preserved.
    pub fn update(
        &mut self,
        sender_address: &str,
        sender_private_key: &PrivateKey,
        sender_public_key: &PublicKey,
        sender_balance: u64,
        recipient: &str,
        amount: u64,
    ) -> Result<()> {
        let remaining = *self.output.get(sender_address).unwrap_or(&0);
        if amount > remaining {
            return Err(BlockchainError::InsufficientFunds);
        }

        *self.output.entry(recipient.to_string()).or_insert(0) += amount;
        *self
            .output
            .get_mut(sender_address)
            .expect("sender has a change entry") -= amount;

        self.input = Self::build_input(
            sender_address,
            sender_private_key,
            sender_public_key,
            sender_balance,
            &self.output,
        );
        Ok(())
    }

    /// Builds the reward transaction credited to `miner_address`.
    #[must_use]
    pub fn reward_for(miner_address: &str) -> Self {
        let mut output = BTreeMap::new();
        output.insert(miner_address.to_string(), MINING_REWARD);
        Self {
            id: random_id(),
            output,
            input: Input::Reward,
        }
    }

    /// Validates this transaction in isolation (not against chain history):
    /// a reward transaction must have exactly one output equal to
    /// `MINING_REWARD`; a normal transaction's declared amount must match
    /// the sum of its outputs, and its signature must verify.
    pub fn is_valid(&self) -> Result<()> {
        match &self.input {
            Input::Reward => {
                let values: Vec<u64> = self.output.values().copied().collect();
                if values == [MINING_REWARD] {
                    Ok(())
                } else {
                    Err(BlockchainError::InvalidTransaction(
                        "mining reward invalid".to_string(),
                    ))
                }
            }
            Input::Normal {
                amount,
                public_key,
                signature,
                ..
            } => {
                let total: u64 = self.output.values().sum();
                if total != *amount {
                    return Err(BlockchainError::InvalidTransaction(
                        "output values invalid".to_string(),
                    ));
                }
                let key = PublicKey::from_pem(public_key)?;
                if key.verify(&self.output, signature)? {
                    Ok(())
                } else {
                    Err(BlockchainError::InvalidTransaction(
                        "signature invalid".to_string(),
                    ))
                }
            }
        }
    }

    fn build_input(
        sender_address: &str,
        sender_private_key: &PrivateKey,
        sender_public_key: &PublicKey,
        sender_balance: u64,
        output: &BTreeMap<String, u64>,
    ) -> Input {
        Input::Normal {
            timestamp: now_ns(),
            amount: sender_balance,
            address: sender_address.to_string(),
            public_key: sender_public_key.as_pem().to_string(),
            signature: sender_private_key.sign(output),
        }
    }
}

fn now_ns() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::crypto::KeyPair;

    fn keypair() -> KeyPair {
        KeyPair::generate().unwrap()
    }

    #[test]
    fn construct_fails_when_amount_exceeds_balance() {
        let kp = keypair();
        let err =
            Transaction::construct("alice", &kp.private_key, &kp.public_key, 100, "bob", 101)
                .unwrap_err();
        assert!(matches!(err, BlockchainError::InsufficientFunds));
    }

    #[test]
    fn construct_produces_a_valid_transaction() {
        let kp = keypair();
        let tx = Transaction::construct("alice", &kp.private_key, &kp.public_key, 1000, "bob", 73)
            .unwrap();
        assert_eq!(tx.output.get("bob"), Some(&73));
        assert_eq!(tx.output.get("alice"), Some(&927));
        tx.is_valid().unwrap();
    }

    #[test]
    fn update_preserves_id_and_checks_remaining_change() {
        let kp = keypair();
        let mut tx =
            Transaction::construct("alice", &kp.private_key, &kp.public_key, 1000, "bob", 50)
                .unwrap();
        let id = tx.id.clone();

        tx.update("alice", &kp.private_key, &kp.public_key, 1000, "bob", 20)
            .unwrap();

        assert_eq!(tx.id, id);
        assert_eq!(tx.output.get("bob"), Some(&70));
        assert_eq!(tx.output.get("alice"), Some(&930));
        let total: u64 = tx.output.values().sum();
        assert_eq!(total, tx.input.amount().unwrap());
        tx.is_valid().unwrap();
    }

    #[test]
    fn update_rejects_amount_over_remaining_change() {
        let kp = keypair();
        let mut tx =
            Transaction::construct("alice", &kp.private_key, &kp.public_key, 1000, "bob", 900)
                .unwrap();
        let err = tx
            .update("alice", &kp.private_key, &kp.public_key, 1000, "bob", 200)
            .unwrap_err();
        assert!(matches!(err, BlockchainError::InsufficientFunds));
    }

    #[test]
    fn reward_transaction_is_valid() {
        let tx = Transaction::reward_for("miner");
        assert!(tx.input.is_reward());
        tx.is_valid().unwrap();
    }

    #[test]
    fn tampered_output_fails_signature_check() {
        let kp = keypair();
        let mut tx =
            Transaction::construct("alice", &kp.private_key, &kp.public_key, 1000, "bob", 50)
                .unwrap();
        tx.output.insert("bob".to_string(), 999);
        let err = tx.is_valid().unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidTransaction(_)));
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let kp = keypair();
        let tx = Transaction::construct("alice", &kp.private_key, &kp.public_key, 1000, "bob", 42)
            .unwrap();
        let encoded = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn reward_input_round_trips_through_json() {
        let tx = Transaction::reward_for("miner");
        let encoded = serde_json::to_string(&tx).unwrap();
        assert!(encoded.contains(MINING_REWARD_ADDRESS));
        let decoded: Transaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(tx, decoded);
    }
}
