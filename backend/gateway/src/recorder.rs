//! Long-running background task that writes engine lifecycle events to the
//! database.
//!
//! The engine publishes synchronously into an unbounded channel through
//! [`ChannelSink`]; [`run`] drains it and mirrors each event into SQLite.

use relief_engine::{EventSink, LifecycleEvent};
use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db;

/// [`EventSink`] that forwards events to the recorder task.
pub struct ChannelSink {
    tx: UnboundedSender<LifecycleEvent>,
}

impl EventSink for ChannelSink {
    fn publish(&self, event: LifecycleEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(
                "Recorder stopped; dropping {} event for {}",
                e.0.kind.as_str(),
                e.0.incident.id
            );
        }
    }
}

pub fn channel() -> (ChannelSink, UnboundedReceiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}

/// Record events until the channel closes or `shutdown` fires. On shutdown
/// the events already queued are still written.
pub async fn run(
    pool: SqlitePool,
    mut rx: UnboundedReceiver<LifecycleEvent>,
    shutdown: CancellationToken,
) {
    info!("Recorder starting");
    let mut recorded = 0usize;

    loop {
        tokio::select! {
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => recorded += record(&pool, &event).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(event) = rx.recv().await {
                    recorded += record(&pool, &event).await;
                }
                break;
            }
        }
    }

    info!("Recorder stopped after {recorded} events");
}

/// Returns the number of events written (0 or 1).
async fn record(pool: &SqlitePool, event: &LifecycleEvent) -> usize {
    match db::record_event(pool, event).await {
        Ok(()) => 1,
        Err(e) => {
            error!(
                "Failed to record {} event for {}: {e}",
                event.kind.as_str(),
                event.incident.id
            );
            0
        }
    }
}
