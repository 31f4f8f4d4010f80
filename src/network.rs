//! Concrete [`PeerGossip`] binding over libp2p gossipsub, with mDNS for
//! local peer discovery. Two topics only — `BLOCK` and `TRANSACTION` — per
//! the ledger core's gossip contract; this module's wire format and peer
//! discovery mechanics are not part of that contract and may evolve
//! independently of it.

use futures::StreamExt;
use ledger_core::{Block, GossipMessage, NodeContext, PeerGossip, Topic, Transaction};
use libp2p::{
    gossipsub, mdns, noise,
    swarm::{NetworkBehaviour, SwarmEvent},
    tcp, yamux, Swarm, SwarmBuilder,
};
use shared::error::BlockchainError;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(NetworkBehaviour)]
struct GossipBehaviour {
    gossipsub: gossipsub::Behaviour,
    mdns: mdns::tokio::Behaviour,
}

enum Outbound {
    Block(Block),
    Transaction(Transaction),
}

/// The handle a node context publishes through. Enqueues onto an unbounded
/// channel the swarm-owning task drains; publishing never blocks the
/// caller (in particular, never blocks the mining loop).
pub struct GossipHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl PeerGossip for GossipHandle {
    fn publish_block(&self, block: &Block) -> Result<()> {
        self.outbound
            .send(Outbound::Block(block.clone()))
            .map_err(|_| BlockchainError::NetworkError("gossip task has stopped".to_string()))
    }

    fn publish_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.outbound
            .send(Outbound::Transaction(transaction.clone()))
            .map_err(|_| BlockchainError::NetworkError("gossip task has stopped".to_string()))
    }
}

fn build_swarm(gossip_port: u16) -> Result<Swarm<GossipBehaviour>> {
    let mut swarm = SwarmBuilder::with_new_identity()
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )
        .map_err(|e| BlockchainError::NetworkError(e.to_string()))?
        .with_behaviour(|key| {
            let gossipsub_config = gossipsub::ConfigBuilder::default()
                .heartbeat_interval(Duration::from_secs(10))
                .validation_mode(gossipsub::ValidationMode::Strict)
                .build()
                .map_err(|e| e.to_string())?;
            let gossipsub = gossipsub::Behaviour::new(
                gossipsub::MessageAuthenticity::Signed(key.clone()),
                gossipsub_config,
            )?;
            let mdns =
                mdns::tokio::Behaviour::new(mdns::Config::default(), key.public().to_peer_id())?;
            Ok(GossipBehaviour { gossipsub, mdns })
        })
        .map_err(|e| BlockchainError::NetworkError(e.to_string()))?
        .build();

    for topic in [Topic::Block, Topic::Transaction] {
        swarm
            .behaviour_mut()
            .gossipsub
            .subscribe(&gossipsub::IdentTopic::new(topic.as_str()))
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
    }

    let listen_addr = format!("/ip4/0.0.0.0/tcp/{gossip_port}")
        .parse()
        .expect("well-formed multiaddr");
    swarm
        .listen_on(listen_addr)
        .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;

    Ok(swarm)
}

/// Spawns the gossip task: owns the libp2p swarm, dispatches inbound
/// `BLOCK`/`TRANSACTION` messages into `node`, and publishes whatever
/// `GossipHandle::publish_*` enqueues. Returns the handle immediately; the
/// task runs for the process lifetime.
pub fn spawn(node: Arc<NodeContext>, gossip_port: u16) -> Result<GossipHandle> {
    let mut swarm = build_swarm(gossip_port)?;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let block_topic = gossipsub::IdentTopic::new(Topic::Block.as_str());
        let tx_topic = gossipsub::IdentTopic::new(Topic::Transaction.as_str());

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    let Some(outbound) = outbound else { break };
                    let (topic, bytes) = match &outbound {
                        Outbound::Block(block) => (
                            block_topic.clone(),
                            serde_json::to_vec(block).expect("block serializes"),
                        ),
                        Outbound::Transaction(tx) => (
                            tx_topic.clone(),
                            serde_json::to_vec(tx).expect("transaction serializes"),
                        ),
                    };
                    if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, bytes) {
                        warn!(error = %e, "gossip publish failed");
                    }
                }
                event = swarm.select_next_some() => {
                    handle_swarm_event(&mut swarm, &node, event);
                }
            }
        }
    });

    Ok(GossipHandle { outbound: outbound_tx })
}

fn handle_swarm_event(
    swarm: &mut Swarm<GossipBehaviour>,
    node: &Arc<NodeContext>,
    event: SwarmEvent<GossipBehaviourEvent>,
) {
    match event {
        SwarmEvent::NewListenAddr { address, .. } => {
            info!(%address, "gossip transport listening");
        }
        SwarmEvent::Behaviour(GossipBehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
            for (peer_id, addr) in peers {
                debug!(%peer_id, %addr, "mdns discovered peer");
                swarm
                    .behaviour_mut()
                    .gossipsub
                    .add_explicit_peer(&peer_id);
            }
        }
        SwarmEvent::Behaviour(GossipBehaviourEvent::Mdns(mdns::Event::Expired(peers))) => {
            for (peer_id, _addr) in peers {
                swarm
                    .behaviour_mut()
                    .gossipsub
                    .remove_explicit_peer(&peer_id);
            }
        }
        SwarmEvent::Behaviour(GossipBehaviourEvent::Gossipsub(gossipsub::Event::Message {
            message,
            ..
        })) => {
            dispatch_inbound(node, &message.topic.to_string(), &message.data);
        }
        _ => {}
    }
}

fn dispatch_inbound(node: &Arc<NodeContext>, topic: &str, data: &[u8]) {
    if topic == Topic::Block.as_str() {
        match serde_json::from_slice::<Block>(data) {
            Ok(block) => {
                debug!("received block over gossip");
                node.handle_gossip_message(GossipMessage::Block(block));
            }
            Err(e) => warn!(error = %e, "failed to decode inbound block"),
        }
    } else if topic == Topic::Transaction.as_str() {
        match serde_json::from_slice::<Transaction>(data) {
            Ok(tx) => {
                debug!("received transaction over gossip");
                node.handle_gossip_message(GossipMessage::Transaction(tx));
            }
            Err(e) => warn!(error = %e, "failed to decode inbound transaction"),
        }
    } else {
        debug!(%topic, "ignoring message on unrecognized topic");
    }
}
