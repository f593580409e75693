use std::collections::VecDeque;

use chrono::Utc;
use shared::protocol::{CommandLogEntry, SessionEvent};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::{wrappers::errors::BroadcastStreamRecvError, wrappers::BroadcastStream, StreamExt};
use tracing::{debug, warn};

use crate::{persistence::COMMAND_LOG_KEY, write_queue::WriteQueue};

pub const COMMAND_LOG_CAPACITY: usize = 50;

/// Most recent command transitions, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLog {
    entries: VecDeque<CommandLogEntry>,
}

impl CommandLog {
    /// Restores a previously persisted log, keeping the newest entries.
    pub fn restore(entries: Vec<CommandLogEntry>) -> Self {
        let mut log = Self::default();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&mut self, entry: CommandLogEntry) {
        if self.entries.len() == COMMAND_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<CommandLogEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Records command transitions from `events` until the session stops, writing
/// the log through `queue` after each change.
pub fn spawn_command_recorder(
    events: broadcast::Receiver<SessionEvent>,
    queue: WriteQueue,
    mut log: CommandLog,
) -> JoinHandle<CommandLog> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(SessionEvent::CommandChanged { from, to, source, .. }) => {
                    log.push(CommandLogEntry {
                        at: Utc::now(),
                        from,
                        to,
                        source,
                    });
                    queue.request_write(COMMAND_LOG_KEY, log.to_vec());
                }
                Ok(SessionEvent::Stopped { session_id }) => {
                    debug!(%session_id, entries = log.len(), "command recorder finished");
                    break;
                }
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "command recorder lagged behind session events");
                }
            }
        }
        log
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use shared::{domain::Gesture, protocol::CommandSource};
    use storage::{KeyValueStore, MemoryStore};
    use uuid::Uuid;

    use super::*;

    fn entry(to: Gesture) -> CommandLogEntry {
        CommandLogEntry {
            at: Utc::now(),
            from: Gesture::Rest,
            to,
            source: CommandSource::Gesture,
        }
    }

    #[test]
    fn log_keeps_only_newest_entries() {
        let mut log = CommandLog::default();
        for _ in 0..COMMAND_LOG_CAPACITY {
            log.push(entry(Gesture::Next));
        }
        log.push(entry(Gesture::Select));

        assert_eq!(log.len(), COMMAND_LOG_CAPACITY);
        assert_eq!(log.entries().last().map(|e| e.to), Some(Gesture::Select));
    }

    #[test]
    fn restore_truncates_oversized_history() {
        let entries = vec![entry(Gesture::Prev); COMMAND_LOG_CAPACITY + 5];
        assert_eq!(CommandLog::restore(entries).len(), COMMAND_LOG_CAPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn recorder_persists_transitions_until_stopped() {
        let memory = Arc::new(MemoryStore::new());
        let queue = WriteQueue::spawn(
            memory.clone() as Arc<dyn KeyValueStore>,
            "t:",
            Duration::from_millis(200),
        );
        let (events, rx) = broadcast::channel(16);
        let recorder = spawn_command_recorder(rx, queue.clone(), CommandLog::default());

        let session_id = Uuid::new_v4();
        for (from, to) in [(Gesture::Rest, Gesture::Next), (Gesture::Next, Gesture::Rest)] {
            events
                .send(SessionEvent::CommandChanged {
                    session_id,
                    from,
                    to,
                    source: CommandSource::Gesture,
                })
                .expect("send");
        }
        events.send(SessionEvent::Stopped { session_id }).expect("send");

        let log = recorder.await.expect("recorder");
        assert_eq!(log.len(), 2);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let raw = memory
            .get("t:telemetry:commands")
            .await
            .expect("get")
            .expect("persisted log");
        let stored: Vec<CommandLogEntry> = serde_json::from_str(&raw).expect("json");
        assert_eq!(stored, log.to_vec());
    }
}
