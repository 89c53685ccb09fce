//! Display sink abstractions and label formatting

use async_trait::async_trait;
use thiserror::Error;

use crate::core::currency::{CurrencyPair, symbol};

/// Shown in place of the rate until the first successful fetch.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Display sink unreachable: {0}")]
    Unreachable(String),
    #[error("Display sink rejected update: {0}")]
    Rejected(String),
    #[error("Failed to write label: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for the currently displayed label.
///
/// Publishing is idempotent: the only effect is replacing the displayed text.
/// Implementations bound their own latency (timeouts are set at construction).
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn publish(&self, label: &str) -> Result<(), PublishError>;
}

/// Builds indicator labels such as `€/USD: 1.08` for one pair.
#[derive(Debug, Clone)]
pub struct LabelFormat {
    prefix: String,
    decimals: usize,
}

impl LabelFormat {
    pub fn new(pair: &CurrencyPair, decimals: usize) -> Self {
        Self {
            prefix: format!("{}/{}", symbol(pair.from()), symbol(pair.to())),
            decimals,
        }
    }

    pub fn label(&self, rate: f64) -> String {
        format!("{}: {:.*}", self.prefix, self.decimals, rate)
    }

    pub fn placeholder(&self) -> String {
        format!("{}: {}", self.prefix, PLACEHOLDER)
    }

    /// Widest expected label, used by hosts to reserve space.
    pub fn guide(&self) -> String {
        let fraction = if self.decimals > 0 {
            format!(".{}", "0".repeat(self.decimals))
        } else {
            String::new()
        };
        format!("{}: 0000{}", self.prefix, fraction)
    }
}
