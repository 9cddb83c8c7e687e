//! Live-update broadcast registry
//!
//! Process-scoped set of connected dashboard clients. Each WebSocket
//! connection registers on upgrade and unregisters when its socket closes;
//! `broadcast` fans a JSON message out to every registered client. Slow
//! clients lose messages instead of blocking the publisher.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::entities::trade::Trade;

/// Messages queued per client before new ones are dropped.
const CLIENT_BUFFER: usize = 64;

/// Event pushed to live clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    TradeUpdate {
        outcome: String,
        trade: Option<Trade>,
    },
    TradeDeleted {
        #[serde(rename = "tradeId")]
        trade_id: i64,
    },
}

/// Receiving half handed to one connection.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<String>,
}

#[derive(Clone, Default)]
pub struct BroadcastRegistry {
    clients: Arc<Mutex<HashMap<u64, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicU64>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<String>>> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);
        let count = {
            let mut clients = self.clients();
            clients.insert(id, sender);
            clients.len()
        };
        debug!("Live client {} registered ({} connected)", id, count);
        Subscription { id, receiver }
    }

    pub fn unregister(&self, id: u64) {
        let count = {
            let mut clients = self.clients();
            clients.remove(&id);
            clients.len()
        };
        debug!("Live client {} unregistered ({} connected)", id, count);
    }

    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    /// Queue `event` for every client. Returns how many accepted it.
    pub fn broadcast(&self, event: &LiveEvent) -> usize {
        let message = match serde_json::to_string(event) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to encode live event: {}", e);
                return 0;
            }
        };

        let mut clients = self.clients();
        let mut delivered = 0;
        clients.retain(|id, sender| match sender.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Live client {} is lagging, dropping update", id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }
}
