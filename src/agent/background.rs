//! Periodic feedback adaptation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::MathService;

/// Background loop running [`MathService::adapt`] on a fixed interval.
pub struct AdaptationLoop {
    service: Arc<dyn MathService>,
    interval: Duration,
}

impl std::fmt::Debug for AdaptationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptationLoop")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl AdaptationLoop {
    /// Create a loop.
    #[must_use]
    pub fn new(service: Arc<dyn MathService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run until the shutdown signal turns true.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Skip the first immediate tick
        interval.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Feedback adaptation loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.service.adapt().await {
                        Ok(report) if report.changed => tracing::info!(
                            revision = report.revision,
                            feedback_seen = report.feedback_seen,
                            adjustments = report.adjustments.len(),
                            "Routing weights recomputed"
                        ),
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Scheduled adaptation failed"),
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Feedback adaptation loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}
