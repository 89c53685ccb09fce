//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod display;
pub mod log;

// Re-export main types for cleaner imports
pub use currency::{CurrencyPair, FetchError, RateFetcher, RatePoint};
pub use display::{DisplaySink, LabelFormat, PublishError};
