use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::config::ProviderConfig;
use crate::core::currency::{CurrencyPair, FetchError, RateFetcher};

/// Fetches rates from a currencyconverterapi.com compatible endpoint.
///
/// The compact response is a flat object keyed by pair id:
/// `{"EUR_USD": 1.0821}`.
pub struct CurrencyConverterProvider {
    base_url: String,
    api_key: Option<String>,
    zero_on_missing_pair: bool,
    client: reqwest::Client,
}

impl CurrencyConverterProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("currency-indicator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(CurrencyConverterProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            zero_on_missing_pair: config.zero_on_missing_pair,
            client,
        })
    }

    fn query<'a>(&'a self, pair_id: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut query = vec![("q", pair_id), ("compact", "ultra")];
        if let Some(key) = &self.api_key {
            query.push(("apiKey", key.as_str()));
        }
        query
    }
}

#[async_trait]
impl RateFetcher for CurrencyConverterProvider {
    #[instrument(name = "RateFetch", skip(self), fields(pair = %pair))]
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<f64, FetchError> {
        let pair_id = pair.id();
        debug!("Requesting rate for {}", pair_id);

        let response = self
            .client
            .get(format!("{}/api/v3/convert", self.base_url))
            .query(&self.query(&pair_id))
            .send()
            .await
            .map_err(|e| request_error(e, &pair_id))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().to_string(),
                pair: pair_id,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| request_error(e, &pair_id))?;

        let body: HashMap<String, Value> =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode {
                pair: pair_id.clone(),
                reason: e.to_string(),
            })?;

        let rate = match body.get(&pair_id) {
            Some(value) => value.as_f64().ok_or_else(|| FetchError::Decode {
                pair: pair_id.clone(),
                reason: format!("rate is not a number: {value}"),
            })?,
            None if self.zero_on_missing_pair => {
                warn!("Response has no rate for {}, reporting zero", pair_id);
                0.0
            }
            None => {
                if let Some(api_error) = body.get("error") {
                    debug!(%api_error, "Rate API returned an error");
                }
                return Err(FetchError::MissingPair(pair_id));
            }
        };

        if !rate.is_finite() || rate < 0.0 {
            return Err(FetchError::InvalidRate {
                rate,
                pair: pair_id,
            });
        }

        debug!(rate, "Got rate");
        Ok(rate)
    }
}

/// The request URL carries the api key, so it is stripped from the error.
fn request_error(e: reqwest::Error, pair_id: &str) -> FetchError {
    FetchError::Request(format!("{} for currency pair: {pair_id}", e.without_url()))
}
