//! Producer process entry point.

use std::sync::Arc;

use trustmesh::analytics::{AnalyticsClient, HttpAnalyticsProvider};
use trustmesh::config::{init_tracing, Config};
use trustmesh::mesh_client::OrchestratorClient;
use trustmesh::producer::handlers::ensure_default_product;
use trustmesh::producer::product::ProductRegistry;
use trustmesh::producer::rate_limit::RateLimiter;
use trustmesh::producer::{router, ProducerState};
use trustmesh::scoring::ScoringConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let http = reqwest::Client::new();
    let analytics = HttpAnalyticsProvider::new(http.clone(), config.analytics_base_url.clone(), config.analytics_api_key.clone().unwrap_or_default());
    let orchestrator = Arc::new(OrchestratorClient::new(http.clone(), config.orchestrator_endpoint.clone()));

    let state = ProducerState {
        products: Arc::new(ProductRegistry::new()),
        rate_limiter: Arc::new(RateLimiter::new()),
        analytics: Arc::new(AnalyticsClient::new(analytics)),
        scoring_config: Arc::new(ScoringConfig::default()),
        orchestrator,
        negotiated: Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new())),
        producer_agent_id: config.producer_account.clone(),
        producer_account: config.producer_account.clone(),
        network: config.network.clone(),
    };
    ensure_default_product(&state, &config.trustscore_default_price);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.producer_port)).await?;
    tracing::info!(port = config.producer_port, "producer listening");
    axum::serve(listener, app).await?;
    Ok(())
}
