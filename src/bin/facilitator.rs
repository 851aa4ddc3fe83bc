//! Facilitator process entry point.

use std::sync::Arc;

use trustmesh::config::{init_tracing, Config};
use trustmesh::facilitator::{router, FacilitatorState};
use trustmesh::wallet::HmacWallet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let wallet = Arc::new(HmacWallet::new(config.producer_key.clone(), config.network.clone()));
    let state = FacilitatorState { wallet, network: config.network.clone() };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.facilitator_port)).await?;
    tracing::info!(port = config.facilitator_port, "facilitator listening");
    axum::serve(listener, app).await?;
    Ok(())
}
