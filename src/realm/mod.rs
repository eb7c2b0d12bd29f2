//! The realm: shared registry of connected clients and offline buffers.
//!
//! One realm instance is owned by the server and shared by every connection
//! task. Admission and routing mutations serialize on a single gate mutex so
//! the check-then-act sequences (capacity, identity collision, buffer drain)
//! are atomic; enumeration and stale scans read map snapshots without it.

pub mod client;
pub mod queue;

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::config::Config;
use crate::errors::AdmissionError;
use crate::message::Message;
use crate::ws::ConnectionSender;
use client::{now_millis, Client};
use queue::MessageQueue;

/// Outcome of a successful admission.
pub struct Admission {
    pub client: Arc<Client>,
    /// Prior holder of the id, evicted under the override policy. The caller
    /// closes it after the registry gate is released.
    pub evicted: Option<Arc<Client>>,
}

/// Outcome of a routing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the destination's live socket.
    Sent,
    /// Destination offline; held in its buffer.
    Queued,
    /// Destination offline and the message type is never buffered.
    Dropped,
}

pub struct Realm {
    clients: DashMap<String, Arc<Client>>,
    queues: DashMap<String, MessageQueue>,
    /// Serializes admission and routing mutations. Snapshot reads (counts,
    /// id enumeration, stale scans) do not take it.
    gate: Mutex<()>,
    concurrent_limit: usize,
    allow_override: bool,
    max_queued: usize,
}

impl Realm {
    pub fn from_config(config: &Config) -> Self {
        Self {
            clients: DashMap::new(),
            queues: DashMap::new(),
            gate: Mutex::new(()),
            concurrent_limit: config.concurrent_limit,
            allow_override: config.allow_override_connection,
            max_queued: config.cleanup_out_msgs,
        }
    }

    /// Admit a connection under `id`.
    ///
    /// Capacity check, collision/override resolution, insert, OPEN
    /// acknowledgment, and offline-buffer drain happen in one critical
    /// section: no concurrent admission or route can interleave, and the
    /// buffered backlog lands on the write path before the record becomes
    /// routable, so buffered delivery strictly precedes live traffic.
    ///
    /// The capacity check comes first: a full realm rejects even ids it
    /// would otherwise override.
    pub fn admit(
        &self,
        id: &str,
        token: &str,
        sender: ConnectionSender,
    ) -> Result<Admission, AdmissionError> {
        let _gate = self.gate.lock().expect("realm gate poisoned");

        if self.clients.len() >= self.concurrent_limit {
            return Err(AdmissionError::ConnectionLimitExceed);
        }

        let holder = self.clients.get(id).map(|entry| entry.value().clone());
        let evicted = match holder {
            Some(_) if !self.allow_override => return Err(AdmissionError::IdTaken),
            Some(_) => self.clients.remove(id).map(|(_, old)| old),
            None => None,
        };

        let client = Arc::new(Client::new(id, token, sender));
        client.send(&Message::open());
        if let Some((_, mut backlog)) = self.queues.remove(id) {
            for message in backlog.drain() {
                client.send(&message);
            }
        }
        self.clients.insert(id.to_string(), client.clone());

        tracing::debug!(client_id = %id, total = self.clients.len(), "client registered");
        Ok(Admission { client, evicted })
    }

    /// Route a message to `dst`'s live socket, or buffer it when absent.
    ///
    /// A dead write path (writer task gone without the close having been
    /// observed yet) tears the stale record down like a socket error and
    /// falls through to buffering.
    pub fn deliver_or_queue(&self, dst: &str, message: Message) -> Delivery {
        let buffer = message.kind.buffered_when_offline();
        let _gate = self.gate.lock().expect("realm gate poisoned");

        if let Some(target) = self.clients.get(dst).map(|entry| entry.value().clone()) {
            if target.send(&message) {
                return Delivery::Sent;
            }
            tracing::warn!(client_id = %dst, "write path gone, removing stale record");
            self.clients.remove(dst);
        }

        if !buffer {
            return Delivery::Dropped;
        }

        let now = now_millis();
        let mut queue = self.queues.entry(dst.to_string()).or_default();
        if queue.push(message, now, self.max_queued).is_some() {
            tracing::debug!(client_id = %dst, "offline buffer full, oldest message dropped");
        }
        Delivery::Queued
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.get(id).map(|entry| entry.value().clone())
    }

    /// Remove and return the record under `id`. Removing an absent id is a
    /// no-op.
    pub fn remove(&self, id: &str) -> Option<Arc<Client>> {
        let _gate = self.gate.lock().expect("realm gate poisoned");
        self.clients.remove(id).map(|(_, client)| client)
    }

    /// Remove `id` only while it still maps to `record`: an actor closing
    /// after an override eviction must not delete its replacement.
    pub fn remove_if_same(&self, id: &str, record: &Arc<Client>) -> bool {
        let _gate = self.gate.lock().expect("realm gate poisoned");
        self.clients
            .remove_if(id, |_, current| Arc::ptr_eq(current, record))
            .is_some()
    }

    /// Snapshot of currently registered ids.
    pub fn client_ids(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Snapshot of records whose last activity predates `cutoff` (Unix ms).
    pub fn stale_clients(&self, cutoff: i64) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .filter(|entry| entry.value().last_seen_millis() < cutoff)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Expire buffered messages enqueued at or before `retention_cutoff` and
    /// re-enforce the per-destination bound. Returns EXPIRE notices addressed
    /// to the senders of the dropped messages.
    pub fn sweep_queues(&self, retention_cutoff: i64) -> Vec<Message> {
        let mut notices = Vec::new();
        let mut emptied = Vec::new();
        let _gate = self.gate.lock().expect("realm gate poisoned");

        for mut entry in self.queues.iter_mut() {
            let dst = entry.key().clone();
            for dropped in entry.value_mut().expire(retention_cutoff) {
                if let Some(src) = dropped.src {
                    notices.push(Message::expire(&dst, &src));
                }
            }
            let trimmed = entry.value_mut().truncate_oldest(self.max_queued);
            if trimmed > 0 {
                tracing::debug!(client_id = %dst, dropped = trimmed, "trimmed oversized offline buffer");
            }
            if entry.value().is_empty() {
                emptied.push(dst);
            }
        }

        for dst in emptied {
            self.queues.remove_if(&dst, |_, queue| queue.is_empty());
        }
        notices
    }
}
