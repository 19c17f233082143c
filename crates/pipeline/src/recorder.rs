//! Buffers affiliation signals and writes them through a single flusher.
//!
//! Checkers send `(group, user)` pairs over a bounded channel, so a slow
//! database applies backpressure instead of growing memory. The flusher
//! merges signals into a sorted map and writes them in one transaction when
//! the buffer fills, on a timer, on an explicit [`AffiliationRecorder::flush`],
//! and once more when every sender is gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use warden_core::types::EntityId;

use crate::error::PipelineError;
use crate::store::{ModerationStore, Signals};

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub channel_capacity: usize,
    /// Distinct pending pairs that force a flush.
    pub max_pending: usize,
    pub flush_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_pending: 500,
            flush_interval: Duration::from_secs(5),
        }
    }
}

enum Command {
    Signal { group_id: EntityId, user_id: EntityId },
    Flush(oneshot::Sender<Result<(), PipelineError>>),
}

/// Cheap to clone; the flusher stops after the last clone is dropped.
#[derive(Clone)]
pub struct AffiliationRecorder {
    tx: mpsc::Sender<Command>,
}

impl AffiliationRecorder {
    pub fn spawn(
        store: Arc<dyn ModerationStore>,
        config: RecorderConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let handle = tokio::spawn(run_flusher(store, rx, config));
        (Self { tx }, handle)
    }

    pub async fn record(&self, group_id: EntityId, user_id: EntityId) -> Result<(), PipelineError> {
        self.tx
            .send(Command::Signal { group_id, user_id })
            .await
            .map_err(|_| PipelineError::RecorderClosed)
    }

    /// Record that `user_id` belongs to each of `group_ids`.
    pub async fn record_memberships(
        &self,
        user_id: EntityId,
        group_ids: &[EntityId],
    ) -> Result<(), PipelineError> {
        for &group_id in group_ids {
            self.record(group_id, user_id).await?;
        }
        Ok(())
    }

    /// Write everything sent so far and wait for the result.
    pub async fn flush(&self) -> Result<(), PipelineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .await
            .map_err(|_| PipelineError::RecorderClosed)?;
        reply_rx.await.map_err(|_| PipelineError::RecorderClosed)?
    }
}

async fn run_flusher(
    store: Arc<dyn ModerationStore>,
    mut rx: mpsc::Receiver<Command>,
    config: RecorderConfig,
) {
    let mut pending = Signals::new();
    let mut pending_pairs = 0usize;
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Signal { group_id, user_id }) => {
                    if pending.entry(group_id).or_default().insert(user_id) {
                        pending_pairs += 1;
                    }
                    if pending_pairs >= config.max_pending {
                        let _ = flush_pending(store.as_ref(), &mut pending, &mut pending_pairs).await;
                    }
                }
                Some(Command::Flush(reply)) => {
                    let result = flush_pending(store.as_ref(), &mut pending, &mut pending_pairs).await;
                    let _ = reply.send(result);
                }
                None => {
                    let _ = flush_pending(store.as_ref(), &mut pending, &mut pending_pairs).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                let _ = flush_pending(store.as_ref(), &mut pending, &mut pending_pairs).await;
            }
        }
    }

    tracing::debug!("Affiliation recorder stopped");
}

/// Failed batches are merged back so the next flush retries them.
async fn flush_pending(
    store: &dyn ModerationStore,
    pending: &mut Signals,
    pending_pairs: &mut usize,
) -> Result<(), PipelineError> {
    if pending.is_empty() {
        return Ok(());
    }

    let batch = std::mem::take(pending);
    let pairs = std::mem::take(pending_pairs);
    match store.record_affiliations(&batch).await {
        Ok(()) => {
            tracing::debug!(groups = batch.len(), pairs, "Flushed affiliation signals");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(groups = batch.len(), error = %e, "Affiliation flush failed, keeping signals");
            for (group_id, users) in batch {
                let entry = pending.entry(group_id).or_default();
                for user_id in users {
                    if entry.insert(user_id) {
                        *pending_pairs += 1;
                    }
                }
            }
            Err(e)
        }
    }
}
