//! Mesh orchestrator (C5): agent registry, task table, audit log, and
//! on-chain receipt verification, exposed over HTTP so the producer and
//! consumer never hold a direct reference to this process (§9 design note).

pub mod audit;
pub mod receipt;
pub mod registry;
pub mod tasks;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::ledger::LedgerGateway;
use crate::models::{AccountId, AgentRegistration, AgentRole, AuditEvent, Task, TaskState};

pub use audit::{AuditLog, AuditTransport, HttpAuditTransport, RecordingAuditTransport};
pub use receipt::verify_payment_receipt;
pub use registry::AgentRegistry;
pub use tasks::TaskTable;

pub struct OrchestratorState<T: AuditTransport> {
    pub registry: Arc<AgentRegistry>,
    pub tasks: Arc<TaskTable>,
    pub audit: Arc<AuditLog<T>>,
    pub ledger: Arc<dyn LedgerGateway>,
}

impl<T: AuditTransport> Clone for OrchestratorState<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            tasks: self.tasks.clone(),
            audit: self.audit.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

pub fn router<T: AuditTransport + 'static>(state: OrchestratorState<T>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/registry/agents", post(register::<T>))
        .route("/audit/events", post(log_event::<T>))
        .route("/tasks", post(issue_task::<T>))
        .route("/tasks/:task_id", patch(update_task::<T>))
        .route("/receipts/verify", post(verify_receipt::<T>))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    agent_id: String,
    role: AgentRole,
    #[serde(default)]
    capabilities: Vec<String>,
}

async fn register<T: AuditTransport>(
    State(state): State<OrchestratorState<T>>,
    Json(req): Json<RegisterRequest>,
) -> Json<AgentRegistration> {
    let registration = state.registry.register(&req.agent_id, req.role, req.capabilities);
    // A2A handshake is attempted but never blocks registration on failure (§4.5).
    state.registry.set_a2a_channel(&req.agent_id, format!("a2a://{}", req.agent_id));
    Json(registration)
}

async fn log_event<T: AuditTransport>(State(state): State<OrchestratorState<T>>, Json(event): Json<AuditEvent>) -> &'static str {
    state.audit.log_event(event).await;
    "accepted"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueTaskRequest {
    #[serde(rename = "type")]
    kind: String,
    consumer_agent_id: String,
    account_id: String,
}

async fn issue_task<T: AuditTransport>(
    State(state): State<OrchestratorState<T>>,
    Json(req): Json<IssueTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let account_id = AccountId::parse(&req.account_id).map_err(|_| ApiError::invalid_account_id(&req.account_id))?;
    let task = state.tasks.issue_task(req.kind, req.consumer_agent_id, account_id);
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    state: TaskState,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

async fn update_task<T: AuditTransport>(
    State(state): State<OrchestratorState<T>>,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    state
        .tasks
        .update_status(&task_id, req.state, req.result, req.error)
        .map(Json)
        .map_err(|e| ApiError::new(axum::http::StatusCode::CONFLICT, "INVALID_TASK_TRANSITION", e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReceiptRequest {
    transaction_id: String,
    expected_amount: String,
    expected_recipient: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReceiptResponse {
    verified: bool,
}

async fn verify_receipt<T: AuditTransport>(
    State(state): State<OrchestratorState<T>>,
    Json(req): Json<VerifyReceiptRequest>,
) -> Json<VerifyReceiptResponse> {
    let verified = verify_payment_receipt(state.ledger.as_ref(), &req.transaction_id, &req.expected_amount, &req.expected_recipient).await;
    Json(VerifyReceiptResponse { verified })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedgerGateway;

    fn test_state() -> OrchestratorState<RecordingAuditTransport> {
        OrchestratorState {
            registry: Arc::new(AgentRegistry::new()),
            tasks: Arc::new(TaskTable::new()),
            audit: Arc::new(AuditLog::new(RecordingAuditTransport::new(), "0.0.900000")),
            ledger: Arc::new(InMemoryLedgerGateway::new()),
        }
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let state = test_state();
        let registration = register(State(state.clone()), Json(RegisterRequest {
            agent_id: "0.0.1".to_string(),
            role: AgentRole::Producer,
            capabilities: vec!["trustscore".to_string()],
        }))
        .await;
        assert_eq!(registration.0.agent_id, "0.0.1");
        assert!(state.registry.get("0.0.1").is_some());
    }

    #[tokio::test]
    async fn issuing_task_with_invalid_account_id_is_rejected() {
        let state = test_state();
        let result = issue_task(
            State(state),
            Json(IssueTaskRequest { kind: "trustscore".to_string(), consumer_agent_id: "0.0.5".to_string(), account_id: "not-valid".to_string() }),
        )
        .await;
        assert!(result.is_err());
    }
}
