//! Lesson progress and user settings, read directly from the store and written
//! through the debounced queue.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::{
    domain::{CategoryId, LessonProgress, PersistedSettings},
    protocol::CommandLogEntry,
};
use storage::KeyValueStore;
use tracing::{debug, warn};

use crate::write_queue::WriteQueue;

pub const PROGRESS_KEY_PREFIX: &str = "progress:";
pub const SETTINGS_KEY: &str = "settings";
pub const COMMAND_LOG_KEY: &str = "telemetry:commands";

/// Logical (un-namespaced) key for a category's progress.
pub fn progress_key(category: &CategoryId) -> String {
    format!("{PROGRESS_KEY_PREFIX}{category}")
}

#[derive(Clone)]
pub struct LessonStore {
    store: Arc<dyn KeyValueStore>,
    queue: WriteQueue,
}

impl LessonStore {
    pub fn new(store: Arc<dyn KeyValueStore>, queue: WriteQueue) -> Self {
        Self { store, queue }
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    /// Saved progress for `category`. Unreadable or malformed entries count as
    /// absent; malformed ones are also removed.
    pub async fn load_progress(&self, category: &CategoryId) -> Option<LessonProgress> {
        self.load_json(&progress_key(category)).await
    }

    pub fn save_progress(&self, category: &CategoryId, progress: LessonProgress) {
        self.queue.request_write(progress_key(category), progress);
    }

    /// Saved settings, if present and within range. Out-of-range settings are
    /// discarded like malformed ones.
    pub async fn load_settings(&self) -> Option<PersistedSettings> {
        let settings: PersistedSettings = self.load_json(SETTINGS_KEY).await?;
        match settings.validate() {
            Ok(()) => Some(settings),
            Err(err) => {
                let storage_key = self.queue.namespaced(SETTINGS_KEY);
                warn!(key = %storage_key, "discarding persisted settings: {err}");
                self.discard(&storage_key).await;
                None
            }
        }
    }

    pub fn save_settings(&self, settings: PersistedSettings) {
        self.queue.request_write(SETTINGS_KEY, settings);
    }

    /// Persisted command transitions, oldest first.
    pub async fn load_command_log(&self) -> Vec<CommandLogEntry> {
        self.load_json(COMMAND_LOG_KEY).await.unwrap_or_default()
    }

    /// Cancels any pending write for `category` and removes its saved progress.
    pub async fn reset_progress(&self, category: &CategoryId) -> anyhow::Result<()> {
        let key = progress_key(category);
        self.queue.cancel(key.clone());
        self.store.remove(&self.queue.namespaced(&key)).await
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.queue.namespaced(key);
        let raw = match self.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %storage_key, "failed to read persisted value: {err:#}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %storage_key, "discarding malformed persisted value: {err}");
                self.discard(&storage_key).await;
                None
            }
        }
    }

    async fn discard(&self, storage_key: &str) {
        match self.store.remove(storage_key).await {
            Ok(()) => debug!(key = storage_key, "removed discarded value"),
            Err(err) => warn!(key = storage_key, "failed to remove discarded value: {err:#}"),
        }
    }
}
