pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod provider;
pub mod types;

pub use client::{AnalyticsBundle, AnalyticsClient};
pub use provider::{AnalyticsErrorKind, AnalyticsProvider, HttpAnalyticsProvider, StubAnalyticsProvider};
pub use types::{AccountInfo, AnalyticsError, TokenBalance, TopicMessage, Transfer, TransferDirection};
