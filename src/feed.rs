//! Periodic rate feed.
//!
//! The coordinator polls a [`RateFetcher`] on a two-speed schedule and hands
//! each successful [`RatePoint`] to the display side over a channel:
//!
//! ```text
//! Starting ──> Steady <──> Retrying
//!                 │            │
//!                 └──> ShuttingDown ──> Stopped
//! ```
//!
//! `Steady` waits the steady interval between fetches, `Retrying` the shorter
//! retry interval. A failure in `Steady` moves to `Retrying`, and a success in
//! `Retrying` moves back. There is no retry limit; only shutdown ends the loop.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::core::config::ScheduleConfig;
use crate::core::currency::{CurrencyPair, RateFetcher, RatePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Starting,
    Steady,
    Retrying,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    FetchSucceeded,
    FetchFailed,
    Shutdown,
}

impl FeedState {
    pub fn next(self, event: FeedEvent) -> FeedState {
        use FeedEvent::*;
        use FeedState::*;

        match (self, event) {
            (ShuttingDown | Stopped, _) => Stopped,
            (_, Shutdown) => ShuttingDown,
            // The first fetch never blocks startup.
            (Starting, _) => Steady,
            (Steady | Retrying, FetchSucceeded) => Steady,
            (Steady | Retrying, FetchFailed) => Retrying,
        }
    }

    /// How long to wait before the next fetch, for the waiting states.
    pub fn interval(self, schedule: &Schedule) -> Option<Duration> {
        match self {
            FeedState::Steady => Some(schedule.steady),
            FeedState::Retrying => Some(schedule.retry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub steady: Duration,
    pub retry: Duration,
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Schedule {
            steady: config.steady_interval(),
            retry: config.retry_interval(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Resolves once shutdown is requested or the shutdown sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

pub struct Coordinator<F: RateFetcher> {
    fetcher: F,
    pair: CurrencyPair,
    schedule: Schedule,
    points: mpsc::Sender<RatePoint>,
    shutdown: watch::Receiver<bool>,
    summary: FeedSummary,
}

impl<F: RateFetcher> Coordinator<F> {
    pub fn new(
        fetcher: F,
        pair: CurrencyPair,
        schedule: Schedule,
        points: mpsc::Sender<RatePoint>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Coordinator {
            fetcher,
            pair,
            schedule,
            points,
            shutdown,
            summary: FeedSummary::default(),
        }
    }

    /// Runs until shutdown. Dropping the point sender on return closes the
    /// handoff channel.
    #[instrument(name = "Feed", skip(self), fields(pair = %self.pair))]
    pub async fn run(mut self) -> FeedSummary {
        info!(
            steady = ?self.schedule.steady,
            retry = ?self.schedule.retry,
            "Feed starting"
        );

        let mut state = FeedState::Starting;
        loop {
            let event = if let Some(period) = state.interval(&self.schedule) {
                if self.wait(period).await {
                    self.poll().await
                } else {
                    FeedEvent::Shutdown
                }
            } else {
                match state {
                    FeedState::Starting => self.poll().await,
                    FeedState::Stopped => break,
                    _ => FeedEvent::Shutdown,
                }
            };

            let next = state.next(event);
            if next != state {
                debug!(from = ?state, to = ?next, "Feed state changed");
            }
            state = next;
        }

        info!(
            attempts = self.summary.attempts,
            successes = self.summary.successes,
            failures = self.summary.failures,
            "Feed stopped"
        );
        self.summary
    }

    /// Waits for `period`. Returns false if shutdown came first.
    async fn wait(&mut self, period: Duration) -> bool {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => false,
            _ = tokio::time::sleep(period) => true,
        }
    }

    /// One fetch attempt, handing the result over on success.
    async fn poll(&mut self) -> FeedEvent {
        if *self.shutdown.borrow() {
            return FeedEvent::Shutdown;
        }
        self.summary.attempts += 1;

        // An in-flight fetch is abandoned on shutdown; its result is never used.
        let result = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => return FeedEvent::Shutdown,
            result = self.fetcher.fetch_rate(&self.pair) => result,
        };

        let rate = match result {
            Ok(rate) => rate,
            Err(e) => {
                self.summary.failures += 1;
                warn!(error = %e, attempt = self.summary.attempts, "Failed to fetch rate");
                return FeedEvent::FetchFailed;
            }
        };
        self.summary.successes += 1;
        info!(rate, "Fetched rate");

        let point = RatePoint::new(self.pair.clone(), rate);
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => FeedEvent::Shutdown,
            sent = self.points.send(point) => match sent {
                Ok(()) => FeedEvent::FetchSucceeded,
                Err(_) => {
                    warn!("Display is gone, stopping feed");
                    FeedEvent::Shutdown
                }
            },
        }
    }
}
