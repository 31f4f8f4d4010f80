//! Pending transactions, keyed by id, pending confirmation on-chain.

use crate::block::Block;
use crate::transaction::Transaction;
use std::collections::BTreeMap;

/// A node's set of not-yet-confirmed transactions. Keyed by transaction id
/// so a re-broadcast of the same id overwrites rather than duplicates.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    pending: BTreeMap<String, Transaction>,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `transaction`, overwriting any existing entry with the same
    /// id. This is how an amended pending transaction (see
    /// [`Transaction::update`]) replaces the stale copy in every node's
    /// pool, including the originating node's own.
    pub fn set(&mut self, transaction: Transaction) {
        self.pending.insert(transaction.id.clone(), transaction);
    }

    /// The pool's pending transaction whose input is attributed to
    /// `address`, if one exists. Lets a sender amend an outstanding
    /// transaction via [`Transaction::update`] instead of issuing a second
    /// one.
    #[must_use]
    pub fn get_by_address(&self, address: &str) -> Option<&Transaction> {
        self.pending
            .values()
            .find(|tx| tx.input.address() == address)
    }

    #[must_use]
    pub fn get_by_address_mut(&mut self, address: &str) -> Option<&mut Transaction> {
        self.pending
            .values_mut()
            .find(|tx| tx.input.address() == address)
    }

    /// All pending transactions, in id order.
    #[must_use]
    pub fn all(&self) -> Vec<Transaction> {
        self.pending.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes every pool entry whose id appears anywhere in `chain` — the
    /// transactions a just-adopted chain has now confirmed.
    pub fn clear_confirmed(&mut self, chain: &[Block]) {
        let confirmed: std::collections::HashSet<&str> = chain
            .iter()
            .flat_map(|block| block.data.iter().map(|tx| tx.id.as_str()))
            .collect();
        self.pending.retain(|id, _| !confirmed.contains(id.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::wallet::Wallet;

    fn sample_transaction() -> Transaction {
        let wallet = Wallet::new();
        Transaction::construct(
            &wallet.address,
            &wallet.private_key,
            &wallet.public_key,
            1_000,
            "bob",
            50,
        )
        .unwrap()
    }

    #[test]
    fn set_overwrites_same_id() {
        let mut pool = Mempool::new();
        let mut tx = sample_transaction();
        pool.set(tx.clone());
        assert_eq!(pool.len(), 1);

        tx.output.insert("carol".to_string(), 1);
        pool.set(tx.clone());
        assert_eq!(pool.len(), 1);
        assert!(pool.all()[0].output.contains_key("carol"));
    }

    #[test]
    fn get_by_address_finds_the_senders_pending_transaction() {
        let mut pool = Mempool::new();
        let tx = sample_transaction();
        let sender = tx.input.address().to_string();
        pool.set(tx);
        assert!(pool.get_by_address(&sender).is_some());
        assert!(pool.get_by_address("someone-else").is_none());
    }

    #[test]
    fn clear_confirmed_drops_only_mined_ids() {
        let mut pool = Mempool::new();
        let tx_a = sample_transaction();
        let tx_b = sample_transaction();
        pool.set(tx_a.clone());
        pool.set(tx_b.clone());

        let mut chain = Chain::new(1_000, 4_000_000_000);
        chain.add_block(vec![tx_a]);

        pool.clear_confirmed(&chain.blocks);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.all()[0].id, tx_b.id);
    }
}
