//! Debounced, per-key coalescing of persistence writes.
//!
//! Requests for the same key inside the quiet period collapse into a single
//! write of the latest value. Keys are independent: a failure serializing or
//! storing one key never affects another, and nothing is retried.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use storage::KeyValueStore;
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep_until, Instant},
};
use tracing::{debug, error, warn};

/// Value waiting for its quiet period. Serialized only when the write fires.
trait PendingValue: Send + Sync {
    fn to_json(&self) -> serde_json::Result<String>;
}

impl<T> PendingValue for T
where
    T: Serialize + Send + Sync,
{
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

enum QueueMessage {
    Write {
        key: String,
        value: Box<dyn PendingValue>,
        requested_at: Instant,
    },
    Cancel {
        key: String,
    },
    Flush(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<usize>),
}

/// Cloneable handle to the process-wide write queue.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
    namespace: Arc<str>,
}

impl WriteQueue {
    /// Spawns the queue task on the current tokio runtime.
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        quiet_period: Duration,
    ) -> Self {
        let namespace: Arc<str> = namespace.into().into();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = WriteQueueWorker {
            store,
            namespace: Arc::clone(&namespace),
            quiet_period,
            pending: HashMap::new(),
        };
        tokio::spawn(worker.run(rx));
        Self { tx, namespace }
    }

    /// Records `value` as the latest value for `key` and restarts the key's
    /// quiet period.
    pub fn request_write<T>(&self, key: impl Into<String>, value: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let key = key.into();
        let message = QueueMessage::Write {
            key,
            value: Box::new(value),
            requested_at: Instant::now(),
        };
        if let Err(mpsc::error::SendError(QueueMessage::Write { key, .. })) = self.tx.send(message)
        {
            warn!(key = %key, "write requested after queue shutdown; dropped");
        }
    }

    /// Drops the pending value and timer for `key`, if any.
    pub fn cancel(&self, key: impl Into<String>) {
        let _ = self.tx.send(QueueMessage::Cancel { key: key.into() });
    }

    /// Writes every pending value immediately. Returns how many keys were
    /// written successfully.
    pub async fn flush(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(QueueMessage::Flush(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Stops the queue. Pending writes are discarded, the same as if the
    /// process had exited before their quiet period elapsed. Returns the
    /// number of discarded keys.
    pub async fn shutdown(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(QueueMessage::Shutdown(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Storage key under which `key` is written.
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

struct PendingWrite {
    value: Box<dyn PendingValue>,
    due: Instant,
}

struct WriteQueueWorker {
    store: Arc<dyn KeyValueStore>,
    namespace: Arc<str>,
    quiet_period: Duration,
    pending: HashMap<String, PendingWrite>,
}

impl WriteQueueWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<QueueMessage>) {
        loop {
            let next_due = self.pending.values().map(|pending| pending.due).min();

            tokio::select! {
                biased;

                message = rx.recv() => match message {
                    Some(QueueMessage::Write { key, value, requested_at }) => {
                        let due = requested_at + self.quiet_period;
                        if self.pending.insert(key.clone(), PendingWrite { value, due }).is_some() {
                            debug!(key = %key, "superseded pending write");
                        }
                    }
                    Some(QueueMessage::Cancel { key }) => {
                        if self.pending.remove(&key).is_some() {
                            debug!(key = %key, "cancelled pending write");
                        }
                    }
                    Some(QueueMessage::Flush(reply)) => {
                        let keys: Vec<String> = self.pending.keys().cloned().collect();
                        let written = self.write_keys(keys).await;
                        let _ = reply.send(written);
                    }
                    Some(QueueMessage::Shutdown(reply)) => {
                        let discarded = self.discard_all();
                        let _ = reply.send(discarded);
                        break;
                    }
                    None => {
                        self.discard_all();
                        break;
                    }
                },
                () = wait_until(next_due) => {
                    let now = Instant::now();
                    let due: Vec<String> = self
                        .pending
                        .iter()
                        .filter(|(_, pending)| pending.due <= now)
                        .map(|(key, _)| key.clone())
                        .collect();
                    self.write_keys(due).await;
                }
            }
        }
    }

    async fn write_keys(&mut self, mut keys: Vec<String>) -> usize {
        keys.sort();
        let mut written = 0;
        for key in keys {
            let Some(pending) = self.pending.remove(&key) else {
                continue;
            };
            let json = match pending.value.to_json() {
                Ok(json) => json,
                Err(err) => {
                    error!(key = %key, "failed to serialize pending write: {err}");
                    continue;
                }
            };
            if write_json(&self.store, &self.namespace, &key, &json).await {
                written += 1;
            }
        }
        written
    }

    fn discard_all(&mut self) -> usize {
        let discarded = self.pending.len();
        if discarded > 0 {
            debug!(discarded, "write queue stopped with pending writes");
        }
        self.pending.clear();
        discarded
    }
}

async fn write_json(
    store: &Arc<dyn KeyValueStore>,
    namespace: &str,
    key: &str,
    json: &str,
) -> bool {
    let storage_key = format!("{namespace}{key}");
    match store.set(&storage_key, json).await {
        Ok(()) => {
            debug!(key = %storage_key, bytes = json.len(), "persisted debounced write");
            true
        }
        Err(err) => {
            warn!(key = %storage_key, "failed to persist debounced write: {err:#}");
            false
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/write_queue_tests.rs"]
mod tests;
