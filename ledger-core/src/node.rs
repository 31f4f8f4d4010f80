//! The in-process bundle a running node holds: one chain, one mempool, and
//! one local wallet, guarded by a single coarse lock per §5 of the
//! contract this crate implements.
//!
//! Mining is the one operation that must not hold the lock for its whole
//! duration (proof-of-work is unbounded). [`NodeContext::mine`] locks only
//! to snapshot the tail and drain the mempool, mines against that
//! snapshot with the lock released, then re-locks to check the tail is
//! still what was snapshotted before appending — if a peer's block won the
//! race, the freshly-mined block is discarded rather than applied on top
//! of a stale parent.

use crate::block::Block;
use crate::chain::Chain;
use crate::gossip::{GossipMessage, PeerGossip};
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use crate::wallet::{calculate_balance, Wallet};
use shared::error::BlockchainError;
use shared::Result;
use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

struct State {
    chain: Chain,
    mempool: Mempool,
}

/// A running node: its chain and mempool (guarded together), and its local
/// wallet identity (immutable for the process lifetime, so unguarded).
///
/// `gossip` is set at most once, after construction — a node context is
/// created before its gossip transport exists (the transport needs a
/// reference to the context to dispatch inbound messages into), so
/// attachment is a separate step via [`NodeContext::attach_gossip`] rather
/// than a constructor argument. Until attached, mining and transacting
/// still work; they simply have nothing to broadcast to.
pub struct NodeContext {
    state: Mutex<State>,
    pub wallet: Wallet,
    pub starting_balance: u64,
    gossip: OnceLock<Box<dyn PeerGossip + Send + Sync>>,
}

impl NodeContext {
    #[must_use]
    pub fn new(starting_balance: u64, mine_rate_ns: i64) -> Self {
        Self {
            state: Mutex::new(State {
                chain: Chain::new(starting_balance, mine_rate_ns),
                mempool: Mempool::new(),
            }),
            wallet: Wallet::new(),
            starting_balance,
            gossip: OnceLock::new(),
        }
    }

    /// Attaches the outbound gossip transport. A no-op if one is already
    /// attached — a node has exactly one gossip handle for its lifetime.
    pub fn attach_gossip(&self, gossip: Box<dyn PeerGossip + Send + Sync>) {
        let _ = self.gossip.set(gossip);
    }

    /// Replaces the local chain wholesale — used to seed synthetic
    /// development state or to adopt a bootstrap peer's chain at startup.
    /// Returns the rejection reason on failure; the caller decides whether
    /// that's fatal (it never is, per the bootstrap contract in §4.8).
    pub fn bootstrap(&self, incoming: Vec<Block>) -> Result<()> {
        let mut state = self.state.lock().expect("node lock poisoned");
        state.chain.replace(incoming)
    }

    #[must_use]
    pub fn chain_length(&self) -> usize {
        self.state.lock().expect("node lock poisoned").chain.len()
    }

    #[must_use]
    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.state
            .lock()
            .expect("node lock poisoned")
            .chain
            .blocks
            .clone()
    }

    /// Reversed chain slice `[start:end]`, matching the `/blockchain/range`
    /// contract.
    #[must_use]
    pub fn chain_range(&self, start: usize, end: usize) -> Vec<Block> {
        let blocks = self.chain_snapshot();
        let mut reversed: Vec<Block> = blocks.into_iter().rev().collect();
        let end = end.min(reversed.len());
        if start >= end {
            return Vec::new();
        }
        reversed.drain(start..end).collect()
    }

    #[must_use]
    pub fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.state.lock().expect("node lock poisoned").mempool.all()
    }

    /// The union of every recipient address named in any transaction's
    /// output, across the whole chain.
    #[must_use]
    pub fn known_addresses(&self) -> BTreeSet<String> {
        let state = self.state.lock().expect("node lock poisoned");
        state
            .chain
            .blocks
            .iter()
            .flat_map(|b| b.data.iter())
            .flat_map(|tx| tx.output.keys().cloned())
            .collect()
    }

    #[must_use]
    pub fn wallet_balance(&self) -> u64 {
        let state = self.state.lock().expect("node lock poisoned");
        calculate_balance(&state.chain.blocks, &self.wallet.address, self.starting_balance)
    }

    /// Drains the mempool, appends the mining reward, and mines a block
    /// extending the current tail. Returns the mined block, or `None` if a
    /// peer's block advanced the tail while mining was underway (the
    /// mined block is discarded rather than applied on a stale parent).
    pub fn mine(&self) -> Option<Block> {
        let (tail, mut data, mine_rate_ns) = {
            let state = self.state.lock().expect("node lock poisoned");
            (
                state.chain.tail().clone(),
                state.mempool.all(),
                state.chain.mine_rate_ns,
            )
        };
        data.push(Transaction::reward_for(&self.wallet.address));

        let mined = Block::mine(&tail, data, mine_rate_ns);

        let mut state = self.state.lock().expect("node lock poisoned");
        if state.chain.tail().hash != tail.hash {
            warn!(
                mined_on_top_of = %tail.hash,
                current_tail = %state.chain.tail().hash,
                "discarding mined block: tail advanced during mining"
            );
            return None;
        }
        state.chain.blocks.push(mined.clone());
        state.mempool.clear_confirmed(&state.chain.blocks);
        info!(
            height = state.chain.len(),
            difficulty = mined.difficulty,
            nonce = ?mined.nonce,
            "mined a new block"
        );
        drop(state);

        if let Some(gossip) = self.gossip.get() {
            if let Err(e) = gossip.publish_block(&mined) {
                warn!(error = %e, "failed to publish mined block to gossip");
            }
        }
        Some(mined)
    }

    /// Creates or amends the local wallet's pending transaction to
    /// `recipient` for `amount`. If a pending transaction from this wallet
    /// already exists, it is updated in place (preserving its id);
    /// otherwise a new one is constructed.
    pub fn submit_transaction(&self, recipient: &str, amount: u64) -> Result<Transaction> {
        let mut state = self.state.lock().expect("node lock poisoned");
        let balance = calculate_balance(&state.chain.blocks, &self.wallet.address, self.starting_balance);

        let tx = if let Some(existing) = state.mempool.get_by_address_mut(&self.wallet.address) {
            existing.update(
                &self.wallet.address,
                &self.wallet.private_key,
                &self.wallet.public_key,
                balance,
                recipient,
                amount,
            )?;
            let updated = existing.clone();
            state.mempool.set(updated.clone());
            updated
        } else {
            let tx = Transaction::construct(
                &self.wallet.address,
                &self.wallet.private_key,
                &self.wallet.public_key,
                balance,
                recipient,
                amount,
            )?;
            state.mempool.set(tx.clone());
            tx
        };
        drop(state);

        if let Some(gossip) = self.gossip.get() {
            if let Err(e) = gossip.publish_transaction(&tx) {
                warn!(error = %e, "failed to publish transaction to gossip");
            }
        }
        Ok(tx)
    }

    /// Applies an inbound gossip message, regardless of which transport
    /// delivered it. Block intake builds a candidate chain and attempts
    /// [`Chain::replace`]; failures are logged and swallowed per the
    /// gossip contract. Transaction intake is unconditional — validity is
    /// only checked later, at chain-validation time.
    pub fn handle_gossip_message(&self, message: GossipMessage) {
        match message {
            GossipMessage::Block(block) => self.handle_inbound_block(block),
            GossipMessage::Transaction(tx) => self.handle_inbound_transaction(tx),
        }
    }

    fn handle_inbound_block(&self, block: Block) {
        let mut state = self.state.lock().expect("node lock poisoned");
        let mut candidate = state.chain.blocks.clone();
        candidate.push(block);
        let incoming_len = candidate.len();
        let local_len = state.chain.len();
        match state.chain.replace(candidate) {
            Ok(()) => {
                state.mempool.clear_confirmed(&state.chain.blocks);
                info!(old_length = local_len, new_length = incoming_len, "replaced local chain");
            }
            Err(BlockchainError::ReplacementRejected(reason)) => {
                debug!(reason = %reason, "discarding inbound block");
            }
            Err(other) => {
                warn!(error = %other, "discarding inbound block");
            }
        }
    }

    fn handle_inbound_transaction(&self, tx: Transaction) {
        let mut state = self.state.lock().expect("node lock poisoned");
        state.mempool.set(tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_is_genesis_only() {
        let node = NodeContext::new(1_000, 4_000_000_000);
        assert_eq!(node.chain_length(), 1);
        Chain::is_valid_chain(&node.chain_snapshot(), node.starting_balance).unwrap();
    }

    #[test]
    fn mining_with_an_empty_mempool_produces_only_the_reward() {
        let node = NodeContext::new(1_000, 4_000_000_000);
        let mined = node.mine().expect("mining never loses the race with itself");
        assert_eq!(mined.data.len(), 1);
        assert!(mined.data[0].input.is_reward());
        assert_eq!(node.chain_length(), 2);
    }

    #[test]
    fn transact_then_mine_confirms_and_empties_the_mempool() {
        let node = NodeContext::new(1_000, 4_000_000_000);
        node.submit_transaction("bob", 73).unwrap();
        assert_eq!(node.mempool_snapshot().len(), 1);

        let mined = node.mine().unwrap();
        assert_eq!(mined.data.len(), 2);
        assert!(node.mempool_snapshot().is_empty());

        let chain = node.chain_snapshot();
        assert_eq!(
            calculate_balance(&chain, &node.wallet.address, node.starting_balance),
            927
        );
        assert_eq!(calculate_balance(&chain, "bob", node.starting_balance), 73);
    }

    #[test]
    fn resubmitting_to_the_same_recipient_updates_the_pending_transaction() {
        let node = NodeContext::new(1_000, 4_000_000_000);
        node.submit_transaction("bob", 50).unwrap();
        node.submit_transaction("bob", 20).unwrap();

        let pending = node.mempool_snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].output.get("bob"), Some(&70));
        assert_eq!(
            pending[0].output.get(&node.wallet.address),
            Some(&(node.starting_balance - 70))
        );
    }

    #[test]
    fn inbound_block_is_discarded_when_it_does_not_extend_the_tail() {
        let node = NodeContext::new(1_000, 4_000_000_000);
        node.mine().unwrap();
        let stale_tail = Block::genesis();
        let orphan = Block::mine(&stale_tail, vec![], 4_000_000_000);
        node.handle_gossip_message(GossipMessage::Block(orphan));
        assert_eq!(node.chain_length(), 2);
    }
}
