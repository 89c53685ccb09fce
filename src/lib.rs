pub mod core;
pub mod display;
pub mod feed;
pub mod providers;
pub mod sinks;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::core::config::Settings;
use crate::core::currency::RateFetcher;
use crate::core::display::{DisplaySink, LabelFormat};
use crate::display::{DisplaySummary, DisplayTask};
use crate::feed::{Coordinator, FeedSummary, Schedule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub feed: FeedSummary,
    pub display: DisplaySummary,
}

/// Runs the indicator until Ctrl-C or SIGTERM.
pub async fn run(settings: Settings) -> Result<RunSummary> {
    run_until(settings, shutdown_signal()).await
}

/// Runs the indicator with the configured provider and sink until `shutdown`
/// resolves.
pub async fn run_until<S>(settings: Settings, shutdown: S) -> Result<RunSummary>
where
    S: Future<Output = ()>,
{
    let fetcher = providers::CurrencyConverterProvider::new(&settings.provider)
        .context("Failed to create rate provider")?;
    let sink = sinks::from_settings(&settings).context("Failed to create display sink")?;
    run_with(&settings, fetcher, Arc::from(sink), shutdown).await
}

/// Wires a fetcher to a sink: the feed coordinator and the display run as two
/// tasks joined by a single-slot channel.
pub async fn run_with<F, S>(
    settings: &Settings,
    fetcher: F,
    sink: Arc<dyn DisplaySink>,
    shutdown: S,
) -> Result<RunSummary>
where
    F: RateFetcher + 'static,
    S: Future<Output = ()>,
{
    info!(pair = %settings.pair, sink = ?settings.sink.kind, "Currency indicator starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (points_tx, points_rx) = mpsc::channel(1);

    let display = DisplayTask::new(
        sink,
        LabelFormat::new(&settings.pair, settings.decimals),
        points_rx,
        shutdown_rx.clone(),
    );
    let coordinator = Coordinator::new(
        fetcher,
        settings.pair.clone(),
        Schedule::from(&settings.schedule),
        points_tx,
        shutdown_rx,
    );

    let display_task = tokio::spawn(display.run());
    let mut feed_task = tokio::spawn(coordinator.run());

    let stopped_early = tokio::select! {
        _ = shutdown => {
            info!("Shutdown requested");
            None
        }
        feed = &mut feed_task => {
            warn!("Feed stopped before shutdown was requested");
            Some(feed)
        }
    };
    shutdown_tx.send_replace(true);

    let feed = match stopped_early {
        Some(feed) => feed,
        None => feed_task.await,
    }
    .context("Feed task failed")?;
    let display = display_task.await.context("Display task failed")?;
    Ok(RunSummary { feed, display })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
