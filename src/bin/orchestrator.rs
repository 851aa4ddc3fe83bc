//! Orchestrator process entry point.

use std::sync::Arc;

use trustmesh::config::{init_tracing, Config};
use trustmesh::ledger::HttpLedgerGateway;
use trustmesh::orchestrator::{router, AgentRegistry, AuditLog, HttpAuditTransport, OrchestratorState, TaskTable};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let http = reqwest::Client::new();
    let audit = AuditLog::new(HttpAuditTransport::new(http.clone(), config.analytics_base_url.clone()), config.mesh_log_topic.clone());
    let ledger = HttpLedgerGateway::new(http.clone(), config.analytics_base_url.clone());

    let state = OrchestratorState {
        registry: Arc::new(AgentRegistry::new()),
        tasks: Arc::new(TaskTable::new()),
        audit: Arc::new(audit),
        ledger: Arc::new(ledger),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.orchestrator_port)).await?;
    tracing::info!(port = config.orchestrator_port, "orchestrator listening");
    axum::serve(listener, app).await?;
    Ok(())
}
