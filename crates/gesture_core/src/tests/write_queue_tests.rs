use super::*;

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serializer;
use shared::domain::LessonProgress;
use tokio::time::sleep;

const QUIET: Duration = Duration::from_millis(200);

/// Records every `set` and fails for keys containing `fail_marker`.
#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<(String, String)>>,
    fail_marker: Option<&'static str>,
}

impl RecordingStore {
    fn failing_on(marker: &'static str) -> Self {
        Self {
            writes: Mutex::default(),
            fail_marker: Some(marker),
        }
    }

    fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().expect("writes").clone()
    }

    fn writes_for(&self, key: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(marker) = self.fail_marker {
            if key.contains(marker) {
                return Err(anyhow!("disk full"));
            }
        }
        self.writes
            .lock()
            .expect("writes")
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

struct Unserializable;

impl Serialize for Unserializable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("refusing to serialize"))
    }
}

fn progress(index: usize) -> LessonProgress {
    LessonProgress {
        index,
        completed: false,
        show_translation: true,
    }
}

fn queue_over(store: &Arc<RecordingStore>) -> WriteQueue {
    WriteQueue::spawn(
        Arc::clone(store) as Arc<dyn KeyValueStore>,
        "app:",
        QUIET,
    )
}

fn assert_send<T: Send>(_: T) {}

#[test]
fn queue_worker_can_run_on_a_spawned_task() {
    let store: Arc<dyn KeyValueStore> = Arc::new(RecordingStore::default());
    let worker = WriteQueueWorker {
        store,
        namespace: "app:".into(),
        quiet_period: QUIET,
        pending: HashMap::new(),
    };
    let (_tx, rx) = mpsc::unbounded_channel();
    assert_send(worker.run(rx));
}

#[tokio::test(start_paused = true)]
async fn last_of_two_progress_writes_wins_after_quiet_period() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("progress:animals", progress(2));
    sleep(Duration::from_millis(50)).await;
    queue.request_write("progress:animals", progress(3));

    sleep(Duration::from_millis(190)).await;
    assert!(store.writes().is_empty());

    sleep(Duration::from_millis(20)).await;
    let writes = store.writes_for("app:progress:animals");
    assert_eq!(writes.len(), 1);
    let stored: LessonProgress = serde_json::from_str(&writes[0]).expect("json");
    assert_eq!(stored, progress(3));
}

#[tokio::test(start_paused = true)]
async fn rapid_requests_collapse_into_one_write() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    for value in 1..=10u32 {
        queue.request_write("settings", value);
        sleep(Duration::from_millis(15)).await;
    }
    sleep(Duration::from_millis(500)).await;

    assert_eq!(store.writes_for("app:settings"), vec!["10".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn separate_quiet_periods_produce_separate_writes() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("settings", 1u32);
    sleep(Duration::from_millis(250)).await;
    queue.request_write("settings", 2u32);
    sleep(Duration::from_millis(250)).await;

    assert_eq!(
        store.writes_for("app:settings"),
        vec!["1".to_string(), "2".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn keys_are_debounced_independently() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("progress:animals", progress(1));
    sleep(Duration::from_millis(150)).await;
    queue.request_write("progress:colors", progress(4));

    sleep(Duration::from_millis(60)).await;
    assert_eq!(store.writes_for("app:progress:animals").len(), 1);
    assert!(store.writes_for("app:progress:colors").is_empty());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(store.writes_for("app:progress:colors").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn storage_failure_does_not_affect_other_keys() {
    let store = Arc::new(RecordingStore::failing_on("broken"));
    let queue = queue_over(&store);

    queue.request_write("progress:broken", progress(1));
    queue.request_write("progress:fine", progress(2));
    sleep(Duration::from_millis(300)).await;

    assert!(store.writes_for("app:progress:broken").is_empty());
    assert_eq!(store.writes_for("app:progress:fine").len(), 1);

    // no retry for the failed key
    sleep(Duration::from_secs(5)).await;
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn serialization_failure_is_isolated_to_its_key() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("telemetry:commands", Unserializable);
    queue.request_write("settings", 7u32);
    sleep(Duration::from_millis(300)).await;

    assert_eq!(store.writes(), vec![("app:settings".to_string(), "7".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn flush_writes_pending_values_immediately() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("progress:animals", progress(5));
    queue.request_write("settings", 1u32);
    assert_eq!(queue.flush().await, 2);
    assert_eq!(store.writes().len(), 2);

    // nothing left to fire later
    sleep(Duration::from_millis(500)).await;
    assert_eq!(store.writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_pending_write() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("progress:animals", progress(5));
    queue.cancel("progress:animals");
    sleep(Duration::from_millis(500)).await;
    assert!(store.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_pending_writes_and_ignores_later_requests() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);

    queue.request_write("progress:animals", progress(5));
    assert_eq!(queue.shutdown().await, 1);

    queue.request_write("progress:animals", progress(6));
    sleep(Duration::from_millis(500)).await;
    assert!(store.writes().is_empty());
    assert_eq!(queue.flush().await, 0);
}

#[tokio::test]
async fn namespaced_keys_use_queue_prefix() {
    let store = Arc::new(RecordingStore::default());
    let queue = queue_over(&store);
    assert_eq!(queue.namespace(), "app:");
    assert_eq!(queue.namespaced("settings"), "app:settings");
}
