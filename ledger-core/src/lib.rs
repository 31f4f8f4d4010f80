//! Ledger core: blocks, the chain, transactions, the mempool, the local
//! wallet's balance accounting, and the peer-gossip contract that ties a
//! running node's state together.

pub mod block;
pub mod chain;
pub mod constants;
pub mod gossip;
pub mod mempool;
pub mod node;
pub mod transaction;
pub mod wallet;

pub use block::{Block, Nonce};
pub use chain::Chain;
pub use constants::{MINE_RATE, MINING_REWARD, MINING_REWARD_ADDRESS, SECONDS, STARTING_BALANCE};
pub use gossip::{ChannelGossip, GossipMessage, PeerGossip, Topic};
pub use mempool::Mempool;
pub use node::NodeContext;
pub use transaction::{Input, Transaction};
pub use wallet::{calculate_balance, Wallet};

pub use shared::{BlockchainError, Result};

#[cfg(test)]
mod scenario_tests {
    //! End-to-end scenarios from the ledger contract's testable-properties
    //! section, exercised against [`NodeContext`] as a whole rather than
    //! any single module.

    use super::*;

    #[test]
    fn scenario_genesis_only() {
        let node = NodeContext::new(STARTING_BALANCE, MINE_RATE);
        assert_eq!(node.chain_length(), 1);
        Chain::is_valid_chain(&node.chain_snapshot(), node.starting_balance).unwrap();
    }

    #[test]
    fn scenario_mine_once() {
        let node = NodeContext::new(STARTING_BALANCE, MINE_RATE);
        let mined = node.mine().unwrap();
        assert_eq!(mined.data.len(), 1);
        assert!(mined.data[0].input.is_reward());
        assert_eq!(mined.data[0].output.get(&node.wallet.address), Some(&MINING_REWARD));
        assert_eq!(node.chain_length(), 2);
    }

    #[test]
    fn scenario_transact_then_mine() {
        let node = NodeContext::new(STARTING_BALANCE, MINE_RATE);
        node.submit_transaction("B", 73).unwrap();
        assert_eq!(node.mempool_snapshot().len(), 1);

        let mined = node.mine().unwrap();
        assert_eq!(mined.data.len(), 2);
        assert!(node.mempool_snapshot().is_empty());

        let chain = node.chain_snapshot();
        assert_eq!(
            calculate_balance(&chain, &node.wallet.address, STARTING_BALANCE),
            STARTING_BALANCE - 73
        );
        assert_eq!(calculate_balance(&chain, "B", STARTING_BALANCE), 73);
    }

    #[test]
    fn scenario_update_pending() {
        let node = NodeContext::new(STARTING_BALANCE, MINE_RATE);
        node.submit_transaction("B", 50).unwrap();
        node.submit_transaction("B", 20).unwrap();

        let pending = node.mempool_snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].output.get("B"), Some(&70));
        assert_eq!(
            pending[0].output.get(&node.wallet.address),
            Some(&(STARTING_BALANCE - 70))
        );
    }

    #[test]
    fn scenario_reject_shorter_replacement() {
        let mut x = Chain::new(STARTING_BALANCE, MINE_RATE);
        x.add_block(vec![]);
        x.add_block(vec![]);
        let mut y = Chain::new(STARTING_BALANCE, MINE_RATE);
        y.add_block(vec![]);

        let before = x.blocks.clone();
        let err = x.replace(y.blocks.clone()).unwrap_err();
        assert!(matches!(err, BlockchainError::ReplacementRejected(_)));
        assert_eq!(x.blocks, before);
    }

    #[test]
    fn scenario_reject_invalid_historic_balance() {
        let mut chain = Chain::new(STARTING_BALANCE, MINE_RATE);
        let alice = Wallet::new();
        let tx = Transaction::construct(
            &alice.address,
            &alice.private_key,
            &alice.public_key,
            STARTING_BALANCE + 1,
            "bob",
            500,
        )
        .unwrap();
        chain.add_block(vec![tx]);
        let err = Chain::is_valid_chain(&chain.blocks, chain.starting_balance).unwrap_err();
        assert!(err.contains("invalid input amount"));
    }

    #[test]
    fn scenario_gossip_round_trip_between_two_nodes() {
        let miner = NodeContext::new(STARTING_BALANCE, MINE_RATE);
        let peer = NodeContext::new(STARTING_BALANCE, MINE_RATE);

        let (gossip, receiver) = ChannelGossip::new();
        miner.attach_gossip(Box::new(gossip));
        miner.mine().unwrap();

        let message = receiver.recv().unwrap();
        peer.handle_gossip_message(message);

        assert_eq!(peer.chain_length(), 2);
    }
}
