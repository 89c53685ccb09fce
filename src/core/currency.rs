//! Currency pair and rate lookup abstractions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Display symbols for currency codes. Codes not listed are shown as-is.
const SYMBOLS: &[(&str, &str)] = &[("EUR", "€"), ("JPY", "¥"), ("GBP", "£")];

/// Maps a currency code to its display symbol.
pub fn symbol(code: &str) -> &str {
    SYMBOLS
        .iter()
        .find(|&&(c, _)| c == code)
        .map_or(code, |&(_, s)| s)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("Missing {0} currency")]
    Missing(&'static str),
    #[error("Invalid currency code: {0}")]
    InvalidCode(String),
    #[error("Base and target currency are the same: {0}")]
    Identical(String),
    #[error("Invalid currency pair: {0}, expected FROM_TO or FROM/TO")]
    Malformed(String),
}

/// An ordered pair of currency codes identifying a conversion rate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    from: String,
    to: String,
}

impl CurrencyPair {
    pub fn new(from: &str, to: &str) -> Result<Self, PairError> {
        let from = normalize_code(from, "from")?;
        let to = normalize_code(to, "to")?;
        if from == to {
            return Err(PairError::Identical(from));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// Compact identifier used by the rate API, e.g. `EUR_USD`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }

    /// Stable identifier of the indicator displaying this pair.
    pub fn indicator_id(&self) -> String {
        format!("indicator-currency-converter-{}-{}", self.from, self.to)
    }
}

fn normalize_code(code: &str, side: &'static str) -> Result<String, PairError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(PairError::Missing(side));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PairError::InvalidCode(code.to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

impl FromStr for CurrencyPair {
    type Err = PairError;

    /// Parses `EUR_USD` or `EUR/USD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(['_', '/'])
            .ok_or_else(|| PairError::Malformed(s.to_string()))?;
        Self::new(from, to)
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A single fetched rate, consumed as soon as it is displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct RatePoint {
    pub rate: f64,
    pub pair: CurrencyPair,
    pub observed_at: DateTime<Utc>,
}

impl RatePoint {
    pub fn new(pair: CurrencyPair, rate: f64) -> Self {
        Self {
            rate,
            pair,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request error: {0}")]
    Request(String),
    #[error("HTTP error: {status} for currency pair: {pair}")]
    Status { status: String, pair: String },
    #[error("Failed to parse rate response for {pair}: {reason}")]
    Decode { pair: String, reason: String },
    #[error("No rate found for currency pair: {0}")]
    MissingPair(String),
    #[error("Invalid rate {rate} for currency pair: {pair}")]
    InvalidRate { rate: f64, pair: String },
}

/// One rate lookup per call. Retrying is left to the caller.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<f64, FetchError>;
}

#[async_trait]
impl<T: RateFetcher + ?Sized> RateFetcher for Arc<T> {
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<f64, FetchError> {
        (**self).fetch_rate(pair).await
    }
}
