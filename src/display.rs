use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::core::currency::RatePoint;
use crate::core::display::{DisplaySink, LabelFormat};
use crate::feed::shutdown_requested;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DisplaySummary {
    pub published: u64,
    pub failed: u64,
    /// Last label the sink accepted.
    pub last_label: Option<String>,
}

/// Consumer side of the feed: turns rate points into labels and publishes
/// them. The displayed label is owned here and nowhere else.
pub struct DisplayTask {
    sink: Arc<dyn DisplaySink>,
    format: LabelFormat,
    points: mpsc::Receiver<RatePoint>,
    shutdown: watch::Receiver<bool>,
    summary: DisplaySummary,
}

impl DisplayTask {
    pub fn new(
        sink: Arc<dyn DisplaySink>,
        format: LabelFormat,
        points: mpsc::Receiver<RatePoint>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        DisplayTask {
            sink,
            format,
            points,
            shutdown,
            summary: DisplaySummary::default(),
        }
    }

    /// Publishes the placeholder, then every received point in order until
    /// shutdown or until the feed closes the channel.
    #[instrument(name = "Display", skip(self))]
    pub async fn run(mut self) -> DisplaySummary {
        if !*self.shutdown.borrow() {
            let placeholder = self.format.placeholder();
            self.show(placeholder).await;
        }

        loop {
            let point = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => break,
                point = self.points.recv() => point,
            };
            match point {
                Some(point) => {
                    let label = self.format.label(point.rate);
                    debug!(rate = point.rate, observed_at = %point.observed_at, "Displaying rate");
                    self.show(label).await;
                }
                None => {
                    debug!("Feed closed");
                    break;
                }
            }
        }

        info!(
            published = self.summary.published,
            failed = self.summary.failed,
            "Display stopped"
        );
        self.summary
    }

    async fn show(&mut self, label: String) {
        let published = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => {
                debug!(%label, "Shutdown during publish, label dropped");
                return;
            }
            published = self.sink.publish(&label) => published,
        };
        match published {
            Ok(()) => {
                self.summary.published += 1;
                if self.summary.last_label.as_deref() != Some(label.as_str()) {
                    info!(%label, "Label updated");
                }
                self.summary.last_label = Some(label);
            }
            Err(e) => {
                // The schedule is unaffected; the next point is published as usual.
                self.summary.failed += 1;
                warn!(error = %e, %label, "Failed to publish label");
            }
        }
    }
}
