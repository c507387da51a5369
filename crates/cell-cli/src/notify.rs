//! Notification sink
//!
//! Forwards lifecycle events to the configured webhook as structured
//! JSON summaries. Events carry identifiers and key names only, never
//! secret values, so the payloads are safe to ship externally.

use cell_types::CellEventEnvelope;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct NotificationSink {
    client: reqwest::Client,
    webhook: String,
}

impl NotificationSink {
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook: webhook.into(),
        }
    }

    /// Consume the event stream in the background, posting each envelope.
    pub fn spawn(self, mut rx: broadcast::Receiver<CellEventEnvelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        let result = self
                            .client
                            .post(&self.webhook)
                            .json(&envelope)
                            .send()
                            .await;
                        if let Err(err) = result {
                            warn!(error = %err, "Failed to post notification");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Notification stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
