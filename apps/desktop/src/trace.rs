//! Recorded landmark traces, one JSON object per line:
//! `{"atMs": 120, "landmarks": [{"x": 0.4, "y": 0.3}, ...]}`. A `null` or
//! missing `landmarks` field is a frame with no detected pose.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use gesture_core::{CaptureSource, FrameSink};
use serde::Deserialize;
use shared::domain::{Landmark, LandmarkFrame};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub at_ms: u64,
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse_trace(&raw).with_context(|| format!("invalid trace {}", path.display()))
}

pub fn parse_trace(raw: &str) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(line)
            .with_context(|| format!("line {}", line_no + 1))?;
        records.push(record);
    }
    records.sort_by_key(|record| record.at_ms);
    Ok(records)
}

/// Replays a trace in real time as if it came from a camera.
pub struct ReplaySource {
    records: Vec<TraceRecord>,
    task: Option<JoinHandle<()>>,
    finished: Option<oneshot::Sender<usize>>,
}

impl ReplaySource {
    /// The receiver resolves with the number of delivered frames once the
    /// whole trace has been replayed.
    pub fn new(records: Vec<TraceRecord>) -> (Self, oneshot::Receiver<usize>) {
        let (finished, rx) = oneshot::channel();
        (
            Self {
                records,
                task: None,
                finished: Some(finished),
            },
            rx,
        )
    }
}

#[async_trait]
impl CaptureSource for ReplaySource {
    async fn start(&mut self, frames: FrameSink) -> Result<()> {
        if self.records.is_empty() {
            anyhow::bail!("trace contains no frames");
        }
        let records = std::mem::take(&mut self.records);
        let finished = self.finished.take();
        info!(frames = records.len(), "replaying landmark trace");

        self.task = Some(tokio::spawn(async move {
            let origin = Instant::now();
            let mut delivered = 0;
            for record in records {
                sleep_until(origin + Duration::from_millis(record.at_ms)).await;
                if !frames.deliver(LandmarkFrame::from_landmarks(record.landmarks)) {
                    break;
                }
                delivered += 1;
            }
            debug!(delivered, "trace replay finished");
            if let Some(finished) = finished {
                let _ = finished.send(delivered);
            }
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}
