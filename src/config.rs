//! Environment-driven configuration shared by the four binaries (§6 "Environment
//! keys consumed"). Grounded on this codebase's `Config::from_env` idiom: every
//! key has a sane default except the per-process port, and the producer
//! account/key that sign and settle receipts, which must be set explicitly.

use anyhow::Context;
use serde::Deserialize;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set (no default — it signs/settles receipts)"))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: String,
    pub producer_port: u16,
    pub producer_account: String,
    pub producer_key: String,
    pub producer_endpoint: String,
    pub consumer_account: String,
    pub consumer_key: String,
    pub orchestrator_port: u16,
    pub orchestrator_endpoint: String,
    pub orchestrator_id: String,
    pub facilitator_port: u16,
    pub facilitator_endpoint: String,
    pub mesh_log_topic: String,
    pub analytics_base_url: String,
    pub analytics_api_key: Option<String>,
    pub asset: String,
    pub merchant_recipient: String,
    pub trustscore_default_price: String,
    pub rate_limit_calls: u32,
    pub rate_limit_period_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            network: env_or("TRUSTMESH_NETWORK", "hedera-testnet"),
            producer_port: env_parse("PRODUCER_PORT", 4021),
            producer_account: env_required("PRODUCER_ACCOUNT")?,
            producer_key: env_required("PRODUCER_KEY")?,
            producer_endpoint: env_or("PRODUCER_ENDPOINT", "http://127.0.0.1:4021"),
            consumer_account: env_or("CONSUMER_ACCOUNT", "0.0.7304746"),
            consumer_key: env_or("CONSUMER_KEY", "dev-consumer-key"),
            orchestrator_port: env_parse("ORCHESTRATOR_PORT", 4022),
            orchestrator_endpoint: env_or("ORCHESTRATOR_ENDPOINT", "http://127.0.0.1:4022"),
            orchestrator_id: env_or("ORCHESTRATOR_ID", "orchestrator-0"),
            facilitator_port: env_parse("FACILITATOR_PORT", 4023),
            facilitator_endpoint: env_or("FACILITATOR_ENDPOINT", "http://127.0.0.1:4023"),
            mesh_log_topic: env_or("MESH_LOG_TOPIC", "0.0.900000"),
            analytics_base_url: env_or("ANALYTICS_BASE_URL", "https://mainnet-public.mirrornode.hedera.com"),
            analytics_api_key: std::env::var("ANALYTICS_API_KEY").ok(),
            asset: env_or("STABLECOIN_ASSET", "USDC"),
            merchant_recipient: env_or("MERCHANT_RECIPIENT", "0.0.7304745"),
            trustscore_default_price: env_or("TRUSTSCORE_DEFAULT_PRICE", "30000"),
            rate_limit_calls: env_parse("RATE_LIMIT_CALLS", 100),
            rate_limit_period_seconds: env_parse("RATE_LIMIT_PERIOD_SECONDS", 86_400),
        })
    }
}

/// Initializes the `tracing` subscriber the same way across all four binaries.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
