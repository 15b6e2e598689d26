//! Progress reporting for long-running analyses.
//!
//! The reporter holds a high-water mark and clamps every reported
//! percentage to it, so the stream stays non-decreasing even when a tier
//! fails partway and the next tier starts its own step sequence from the
//! beginning. The final event of a successful request is always 100.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Profile,
    Posts,
    Analysis,
    Trends,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub message: String,
    pub percentage: u8,
}

#[derive(Clone)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<ProgressEvent>>,
    high_water: Arc<AtomicU8>,
}

impl ProgressReporter {
    /// Reporter wired to a channel, for streaming responses.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                high_water: Arc::new(AtomicU8::new(0)),
            },
            rx,
        )
    }

    /// No-op reporter for non-streaming callers. Still tracks the
    /// high-water mark so behavior matches the streaming path.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            high_water: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Emit a progress event. The percentage is clamped to never move
    /// backwards; a disconnected receiver is ignored.
    pub fn report(&self, stage: ProgressStage, message: impl Into<String>, percentage: u8) {
        let percentage = percentage.min(100);
        let clamped = self.high_water.fetch_max(percentage, Ordering::SeqCst).max(percentage);

        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                stage,
                message: message.into(),
                percentage: clamped,
            });
        }
    }

    /// Terminal event: stage `complete`, percentage 100.
    pub fn complete(&self, message: impl Into<String>) {
        self.report(ProgressStage::Complete, message, 100);
    }

    pub fn last_percentage(&self) -> u8 {
        self.high_water.load(Ordering::SeqCst)
    }
}
