use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::{LavaError, Result};
use crate::event::{EventReceiver, EventSink};
use crate::node::{Extension, Node};

/// Registry of playback nodes and the strategies for picking one
///
/// A pool is an ordinary value: create as many as you like. Every node it
/// registers reports events to the pool's sink.
pub struct NodePool {
    nodes: Mutex<Vec<Node>>,
    sink: Arc<dyn EventSink>,
}

impl NodePool {
    /// Create a pool whose events are delivered on the returned receiver
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lavapool::{NodeConfig, NodePool};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let (pool, mut events) = NodePool::new();
    ///     pool.create_node(NodeConfig::new("127.0.0.1", 2333, "youshallnotpass")).await?;
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         println!("{} from {}", event.name(), event.node());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sink(Arc::new(tx)), EventReceiver::new(rx))
    }

    /// Create a pool that hands events to a custom sink
    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// Register a node, start its event socket and warm up its extensions
    ///
    /// A missing identifier is replaced by a random one. If extension setup
    /// fails the node is unregistered again and the error returned.
    pub async fn create_node(&self, config: NodeConfig) -> Result<Node> {
        let identifier = config
            .identifier
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let node = {
            let mut nodes = self.nodes.lock().unwrap();
            if nodes.iter().any(|n| n.identifier() == identifier) {
                return Err(LavaError::NodeOccupied(identifier));
            }
            let node = Node::new(config, identifier, Arc::clone(&self.sink));
            nodes.push(node.clone());
            node
        };

        node.connect().await?;
        if let Err(e) = node.initialise_extensions().await {
            warn!(node = %node.identifier(), error = %e, "Extension setup failed, dropping node");
            self.detach(node.identifier());
            node.disconnect().await;
            return Err(e);
        }

        info!(node = %node.identifier(), uri = %node.ws_uri(), "Node registered");
        Ok(node)
    }

    /// Unregister a node and disconnect it
    pub async fn remove_node(&self, identifier: &str) -> Result<()> {
        let node = self
            .detach(identifier)
            .ok_or_else(|| LavaError::InvalidNodeSearch(format!("no node with identifier {identifier}")))?;
        node.disconnect().await;
        info!(node = %identifier, "Node removed");
        Ok(())
    }

    fn detach(&self, identifier: &str) -> Option<Node> {
        let mut nodes = self.nodes.lock().unwrap();
        let index = nodes.iter().position(|n| n.identifier() == identifier)?;
        Some(nodes.remove(index))
    }

    /// Registered nodes in registration order
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().unwrap().is_empty()
    }

    fn registered(&self) -> Result<Vec<Node>> {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return Err(LavaError::NoNodesConnected);
        }
        Ok(nodes)
    }

    /// Node by identifier
    pub fn get(&self, identifier: &str) -> Result<Node> {
        self.registered()?
            .into_iter()
            .find(|n| n.identifier() == identifier)
            .ok_or_else(|| LavaError::InvalidNodeSearch(format!("no node with identifier {identifier}")))
    }

    /// Node with the fewest sessions. Ties go to the earliest registered.
    pub fn min_players(&self) -> Result<Node> {
        let nodes = self.registered()?;
        let mut best = &nodes[0];
        for node in &nodes[1..] {
            if node.player_count() < best.player_count() {
                best = node;
            }
        }
        Ok(best.clone())
    }

    /// Node with the lowest penalty. Ties go to the earliest registered.
    pub fn balanced(&self) -> Result<Node> {
        let nodes = self.registered()?;
        let mut best = &nodes[0];
        let mut best_penalty = best.penalty();
        for node in &nodes[1..] {
            let penalty = node.penalty();
            if penalty.total_cmp(&best_penalty).is_lt() {
                best = node;
                best_penalty = penalty;
            }
        }
        Ok(best.clone())
    }

    /// First node registered in `region`
    pub fn closest(&self, region: &str) -> Result<Node> {
        self.registered()?
            .into_iter()
            .find(|n| n.region() == Some(region))
            .ok_or_else(|| LavaError::InvalidNodeSearch(format!("no node in region {region}")))
    }

    /// First node with an extension enabled
    pub fn with_extension(&self, extension: Extension) -> Result<Node> {
        self.registered()?
            .into_iter()
            .find(|n| n.supports(extension))
            .ok_or_else(|| {
                LavaError::InvalidNodeSearch(format!("no node with the {extension:?} extension"))
            })
    }
}
