//! Background task that drives a [`LogTailer`] from file notifications and a
//! fallback poll interval.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{LogEventDispatcher, LogTailer};

pub const DEFAULT_TAIL_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct TailServiceConfig {
    pub poll_interval: Duration,
}

impl Default for TailServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_TAIL_POLL_INTERVAL_MS),
        }
    }
}

/// Handle to a running tail loop.
pub struct TailService {
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<LogTailer>,
}

impl TailService {
    pub fn spawn(
        tailer: LogTailer,
        dispatcher: Arc<LogEventDispatcher>,
        config: TailServiceConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(run_tail_loop(tailer, dispatcher, config, cancel_rx));
        Self { cancel_tx, join }
    }

    /// Signals the loop to stop and waits for it; returns the tailer so its
    /// final cursor can be inspected.
    pub async fn shutdown(self) -> Result<LogTailer> {
        let _ = self.cancel_tx.send(true);
        Ok(self.join.await?)
    }
}

async fn run_tail_loop(
    mut tailer: LogTailer,
    dispatcher: Arc<LogEventDispatcher>,
    config: TailServiceConfig,
    mut cancel_rx: watch::Receiver<bool>,
) -> LogTailer {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    // Dropped on return. notify signals its event thread to exit but does not join it.
    let _watcher = match start_watcher(tailer.path(), notify_tx) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            tracing::warn!(
                path = %tailer.path().display(),
                error = %error,
                "file watcher unavailable; relying on polling"
            );
            None
        }
    };
    let mut notifications_open = true;

    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        path = %tailer.path().display(),
        offset = tailer.cursor(),
        poll_ms = config.poll_interval.as_millis() as u64,
        "log tail started"
    );

    loop {
        tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
                continue;
            }
            notification = notify_rx.recv(), if notifications_open => {
                match notification {
                    Some(Ok(event)) if is_relevant_notification(&event, tailer.path()) => {}
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => {
                        tracing::warn!(error = %error, "log watcher error");
                        continue;
                    }
                    None => {
                        notifications_open = false;
                        continue;
                    }
                }
            }
            _ = poll.tick() => {}
        }
        drain_pending(&mut tailer, &dispatcher).await;
    }

    tracing::info!(offset = tailer.cursor(), "log tail stopped");
    tailer
}

/// Reads and dispatches every complete pending line, then advances the cursor.
///
/// On a read failure the cursor is left alone so the same bytes are retried.
pub async fn drain_pending(tailer: &mut LogTailer, dispatcher: &LogEventDispatcher) -> usize {
    let batch = match tailer.read_pending() {
        Ok(batch) => batch,
        Err(error) => {
            let missing = error
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
            if missing {
                tracing::debug!(path = %tailer.path().display(), "log file not present");
            } else {
                tracing::warn!(error = %format!("{error:#}"), "log tail read failed");
            }
            return 0;
        }
    };
    if batch.is_empty() {
        tailer.commit(&batch);
        return 0;
    }

    for line in &batch.lines {
        // Transliteration tasks are detached.
        drop(dispatcher.dispatch_line(line).await);
    }
    tailer.commit(&batch);
    batch.lines.len()
}

fn start_watcher(
    log_path: &Path,
    sender: mpsc::UnboundedSender<notify::Result<Event>>,
) -> notify::Result<notify::RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |result| {
        if sender.send(result).is_err() {
            tracing::debug!("log watcher notification receiver dropped");
        }
    })?;
    let directory = log_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn is_relevant_notification(event: &Event, log_path: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.is_empty()
        || event
            .paths
            .iter()
            .any(|path| path.file_name() == log_path.file_name())
}
