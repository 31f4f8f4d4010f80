//! Peer-gossip contract: broadcast on two topics, `BLOCK` and
//! `TRANSACTION`. The ledger core depends only on this trait, never on a
//! concrete transport — a libp2p-gossipsub binding (in the node binary) and
//! an in-process channel (for deterministic tests) both implement it.

use crate::block::Block;
use crate::transaction::Transaction;
use shared::Result;

/// The two broadcast topics the reference system gossips over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Block,
    Transaction,
}

impl Topic {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Block => "BLOCK",
            Topic::Transaction => "TRANSACTION",
        }
    }
}

/// An inbound gossip message, dispatched by [`crate::node::NodeContext`]
/// regardless of which transport produced it.
#[derive(Debug, Clone)]
pub enum GossipMessage {
    Block(Block),
    Transaction(Transaction),
}

/// Outbound half of the gossip contract. Publishing is synchronous and
/// best-effort: a failure is logged by the caller, never retried.
pub trait PeerGossip {
    /// Broadcasts a newly mined block on the `BLOCK` topic.
    fn publish_block(&self, block: &Block) -> Result<()>;

    /// Broadcasts a new or updated pending transaction on the
    /// `TRANSACTION` topic.
    fn publish_transaction(&self, transaction: &Transaction) -> Result<()>;
}

/// An in-process [`PeerGossip`] over a channel, for exercising the gossip
/// contract in tests without any real network sockets. Every published
/// message is handed to the paired [`std::sync::mpsc::Receiver`], which a
/// test drains and feeds into another node's
/// [`crate::node::NodeContext::handle_gossip_message`].
pub struct ChannelGossip {
    sender: std::sync::mpsc::Sender<GossipMessage>,
}

impl ChannelGossip {
    #[must_use]
    pub fn new() -> (Self, std::sync::mpsc::Receiver<GossipMessage>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl PeerGossip for ChannelGossip {
    fn publish_block(&self, block: &Block) -> Result<()> {
        let _ = self.sender.send(GossipMessage::Block(block.clone()));
        Ok(())
    }

    fn publish_transaction(&self, transaction: &Transaction) -> Result<()> {
        let _ = self
            .sender
            .send(GossipMessage::Transaction(transaction.clone()));
        Ok(())
    }
}
