//! In-process stand-in for a monitored node.
//!
//! Answers every ping with a pong while running. Pausing it makes the node
//! look crashed to the detector without tearing down its channel.

use crate::runner::{DetectorHandle, RunnerError};
use chainwatch_core::{Event, OutboundMessage};
use chainwatch_types::NodeId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Default)]
struct Shared {
    paused: AtomicBool,
    pings: AtomicU64,
}

/// A spawned ping responder.
///
/// The task stops when the runner drops the node's outlet or the responder
/// is dropped. It does not keep the runner alive.
#[derive(Debug)]
pub struct NodeResponder {
    node: NodeId,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl NodeResponder {
    /// Spawn a responder for `node` and attach it to the runner.
    pub fn spawn(node: NodeId, handle: &DetectorHandle) -> Result<Self, RunnerError> {
        let (outlet, mut inbox) = mpsc::unbounded_channel();
        handle.attach_node(node, outlet)?;

        let shared = Arc::new(Shared::default());
        let task_shared = shared.clone();
        let network_tx = handle.network_sender();

        let task = tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let OutboundMessage::Ping { from } = message;
                task_shared.pings.fetch_add(1, Ordering::Relaxed);
                if task_shared.paused.load(Ordering::Acquire) {
                    trace!(%node, %from, "Paused, ignoring ping");
                    continue;
                }
                if network_tx.send(Event::Pong { node }).is_err() {
                    break;
                }
            }
        });

        Ok(Self { node, shared, task })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Stop answering pings.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Pings received so far, answered or not.
    pub fn pings_received(&self) -> u64 {
        self.shared.pings.load(Ordering::Relaxed)
    }
}

impl Drop for NodeResponder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
