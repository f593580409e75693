mod engine;
mod lesson;
mod trace;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use gesture_core::{
    load_settings_from, spawn_command_recorder, CommandLog, GestureSession, LabelClassifier,
    LessonStore, NullOverlay, SessionConfig, WriteQueue,
};
use shared::domain::CategoryId;
use storage::{KeyValueStore, Storage};
use tokio::sync::watch;
use tracing::info;

use crate::{lesson::LessonCursor, trace::ReplaySource};

/// Replays a recorded landmark trace through a gesture session and drives a
/// flashcard lesson from the resulting commands.
#[derive(Parser, Debug)]
struct Args {
    /// JSON-lines landmark trace.
    trace: PathBuf,
    #[arg(long, default_value = "animals")]
    category: String,
    #[arg(long, default_value_t = 10)]
    deck_size: usize,
    #[arg(long, default_value = "gesture.toml")]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    /// Overrides and persists the classifier sensitivity.
    #[arg(long)]
    sensitivity: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config, |name| std::env::var(name).ok())?;
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }

    let storage = Storage::new(&settings.database_url).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(storage);
    let queue = WriteQueue::spawn(
        Arc::clone(&store),
        settings.key_prefix.clone(),
        settings.write_debounce(),
    );
    let lessons = LessonStore::new(store, queue.clone());

    if let Some(persisted) = lessons.load_settings().await {
        settings.apply_persisted(&persisted);
    }
    if let Some(sensitivity) = args.sensitivity {
        settings.sensitivity = sensitivity;
        settings.validate()?;
        lessons.save_settings(settings.persisted());
    }

    let category = CategoryId::new(args.category);
    let mut cursor = LessonCursor::restore(args.deck_size, lessons.load_progress(&category).await);
    info!(%category, index = cursor.progress().index, "lesson loaded");

    let records = trace::load_trace(&args.trace)?;
    let (source, mut replay_done) = ReplaySource::new(records);

    let session = GestureSession::new(
        SessionConfig::from_settings(&settings),
        Arc::new(LabelClassifier::new(engine::classify_pose)),
        Box::new(NullOverlay),
    );
    let history = CommandLog::restore(lessons.load_command_log().await);
    let recorder = spawn_command_recorder(session.subscribe_events(), queue.clone(), history);
    let mut commands = session.commands();
    let handle = session
        .start(Box::new(source))
        .await
        .context("failed to start capture session")?;

    loop {
        tokio::select! {
            changed = commands.changed() => {
                if changed.is_err() {
                    break;
                }
                apply_command(&mut commands, &mut cursor, &lessons, &category);
            }
            delivered = &mut replay_done => {
                info!(delivered = delivered.unwrap_or(0), "trace exhausted");
                // Let a parked frame reach its render opportunity.
                tokio::time::sleep(settings.frame_budget() + settings.render_interval()).await;
                if commands.has_changed().unwrap_or(false) {
                    apply_command(&mut commands, &mut cursor, &lessons, &category);
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let stats = handle.stop().await?;
    let log = recorder.await.context("command recorder panicked")?;
    let written = queue.flush().await;
    queue.shutdown().await;

    let progress = cursor.progress();
    println!(
        "category={category} index={} completed={} show_translation={}",
        progress.index, progress.completed, progress.show_translation
    );
    println!(
        "frames={} immediate={} deferred={} superseded={} rejected={} commands={}",
        stats.frames_received,
        stats.processed_immediately,
        stats.processed_deferred,
        stats.superseded,
        stats.rejected_labels,
        stats.commands_committed
    );
    println!("logged_transitions={} flushed_writes={written}", log.len());
    Ok(())
}

fn apply_command(
    commands: &mut watch::Receiver<shared::domain::Gesture>,
    cursor: &mut LessonCursor,
    lessons: &LessonStore,
    category: &CategoryId,
) {
    let command = *commands.borrow_and_update();
    if cursor.apply(command) {
        let progress = cursor.progress();
        info!(
            %command,
            index = progress.index,
            show_translation = progress.show_translation,
            "lesson advanced"
        );
        lessons.save_progress(category, progress);
    }
}
