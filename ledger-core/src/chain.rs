//! Ordered sequence of blocks: chain-level validation and the
//! longest-valid-chain replacement rule.

use crate::block::Block;
use crate::transaction::Transaction;
use crate::wallet::calculate_balance;
use shared::error::BlockchainError;
use shared::Result;
use std::collections::HashSet;

/// A node's local chain, plus the parameters its mining loop and
/// balance/validation logic need. Always non-empty: the first element is
/// genesis.
#[derive(Debug, Clone)]
pub struct Chain {
    pub blocks: Vec<Block>,
    pub starting_balance: u64,
    pub mine_rate_ns: i64,
}

impl Chain {
    #[must_use]
    pub fn new(starting_balance: u64, mine_rate_ns: i64) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            starting_balance,
            mine_rate_ns,
        }
    }

    #[must_use]
    pub fn tail(&self) -> &Block {
        self.blocks.last().expect("chain is never empty")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Mines a block over `data` extending the current tail and appends it.
    pub fn add_block(&mut self, data: Vec<Transaction>) -> Block {
        let mined = Block::mine(self.tail(), data, self.mine_rate_ns);
        self.blocks.push(mined.clone());
        mined
    }

    /// Adopts `incoming` iff it is strictly longer than the local chain and
    /// passes [`Chain::is_valid_chain`]. Otherwise the local chain is left
    /// untouched and the rejection reason is returned.
    pub fn replace(&mut self, incoming: Vec<Block>) -> Result<()> {
        if incoming.len() <= self.blocks.len() {
            return Err(BlockchainError::ReplacementRejected(
                "incoming chain must be longer".to_string(),
            ));
        }
        if let Err(reason) = Self::is_valid_chain(&incoming, self.starting_balance) {
            return Err(BlockchainError::ReplacementRejected(format!(
                "incoming invalid: {reason}"
            )));
        }
        self.blocks = incoming;
        Ok(())
    }

    /// Validates a standalone chain: genesis equality, then per-adjacent-
    /// pair block validation, then transaction-chain validation.
    pub fn is_valid_chain(
        chain: &[Block],
        starting_balance: u64,
    ) -> std::result::Result<(), String> {
        match chain.first() {
            Some(first) if first.is_genesis() => {}
            _ => return Err("chain does not start with genesis".to_string()),
        }
        for i in 1..chain.len() {
            Block::is_valid_block(&chain[i - 1], &chain[i]).map_err(|e| e.to_string())?;
        }
        Self::is_valid_transaction_chain(chain, starting_balance)
    }

    /// Walks every transaction in the chain, in order, checking: id
    /// uniqueness, at most one reward per block, and — for normal
    /// transactions — that the declared input amount matches the sender's
    /// historic balance computed over the strict chain prefix before the
    /// containing block.
    fn is_valid_transaction_chain(
        chain: &[Block],
        starting_balance: u64,
    ) -> std::result::Result<(), String> {
        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, block) in chain.iter().enumerate() {
            let mut has_reward = false;
            for tx in &block.data {
                if !seen_ids.insert(tx.id.as_str()) {
                    return Err(format!("transaction {} is not unique", tx.id));
                }
                if tx.input.is_reward() {
                    if has_reward {
                        return Err(format!(
                            "block {} has more than one mining reward",
                            block.hash
                        ));
                    }
                    has_reward = true;
                } else {
                    let historic_balance =
                        calculate_balance(&chain[..i], tx.input.address(), starting_balance);
                    let declared = tx
                        .input
                        .amount()
                        .expect("normal input always carries a declared amount");
                    if historic_balance != declared {
                        return Err(format!("transaction {} has invalid input amount", tx.id));
                    }
                }
                tx.is_valid().map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    #[test]
    fn fresh_chain_is_genesis_only_and_valid() {
        let chain = Chain::new(1_000, 4_000_000_000);
        assert_eq!(chain.len(), 1);
        Chain::is_valid_chain(&chain.blocks, chain.starting_balance).unwrap();
    }

    #[test]
    fn mining_an_empty_block_extends_the_chain() {
        let mut chain = Chain::new(1_000, 4_000_000_000);
        chain.add_block(vec![]);
        assert_eq!(chain.len(), 2);
        Chain::is_valid_chain(&chain.blocks, chain.starting_balance).unwrap();
    }

    #[test]
    fn replace_rejects_a_shorter_incoming_chain() {
        let mut x = Chain::new(1_000, 4_000_000_000);
        x.add_block(vec![]);
        x.add_block(vec![]);
        let mut y = Chain::new(1_000, 4_000_000_000);
        y.add_block(vec![]);

        let before = x.blocks.clone();
        let err = x.replace(y.blocks.clone()).unwrap_err();
        assert!(matches!(err, BlockchainError::ReplacementRejected(_)));
        assert_eq!(x.blocks, before);
    }

    #[test]
    fn replace_is_idempotent_against_an_equal_chain() {
        let mut chain = Chain::new(1_000, 4_000_000_000);
        chain.add_block(vec![]);
        let copy = chain.blocks.clone();
        let err = chain.replace(copy).unwrap_err();
        assert!(matches!(err, BlockchainError::ReplacementRejected(_)));
    }

    #[test]
    fn replace_adopts_a_longer_valid_chain() {
        let mut local = Chain::new(1_000, 4_000_000_000);
        let mut longer = Chain::new(1_000, 4_000_000_000);
        longer.add_block(vec![]);
        longer.add_block(vec![]);

        local.replace(longer.blocks.clone()).unwrap();
        assert_eq!(local.blocks, longer.blocks);
    }

    #[test]
    fn multi_block_chain_round_trips_through_json() {
        let mut chain = Chain::new(1_000, 4_000_000_000);
        let alice = Wallet::new();
        let tx = crate::transaction::Transaction::construct(
            &alice.address,
            &alice.private_key,
            &alice.public_key,
            1_000,
            "bob",
            73,
        )
        .unwrap();
        chain.add_block(vec![tx]);
        chain.add_block(vec![]);

        let encoded = serde_json::to_string(&chain.blocks).unwrap();
        let decoded: Vec<Block> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(chain.blocks, decoded);
        Chain::is_valid_chain(&decoded, chain.starting_balance).unwrap();
    }

    #[test]
    fn rejects_a_transaction_whose_declared_amount_exceeds_historic_balance() {
        let mut chain = Chain::new(1_000, 4_000_000_000);
        let alice = Wallet::new();
        let tx = crate::transaction::Transaction::construct(
            &alice.address,
            &alice.private_key,
            &alice.public_key,
            1_001, // one more than the historic STARTING_BALANCE
            "bob",
            500,
        )
        .unwrap();
        chain.add_block(vec![tx]);
        let err =
            Chain::is_valid_transaction_chain(&chain.blocks, chain.starting_balance).unwrap_err();
        assert!(err.contains("invalid input amount"));
    }
}
