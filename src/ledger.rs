//! Mirror-node gateway: the read-only ledger view the orchestrator uses to
//! verify payment receipts post-hoc (§4.5). This trait is the out-of-scope
//! "distributed-ledger SDK" boundary from §1 — only its interface is specified.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorTransactionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct MirrorTransfer {
    pub account: String,
    /// Integer smallest-unit amount, as a string — compared with exact string equality.
    pub amount: String,
}

#[derive(Debug, Clone)]
pub struct MirrorTransaction {
    pub status: MirrorTransactionStatus,
    pub transfers: Vec<MirrorTransfer>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn get_transaction(&self, transaction_id: &str) -> anyhow::Result<Option<MirrorTransaction>>;
}

/// In-memory mirror-node fake for tests and local runs. A production deployment
/// backs this trait with a `reqwest` client against a real mirror-node REST API.
#[derive(Default)]
pub struct InMemoryLedgerGateway {
    transactions: Mutex<HashMap<String, MirrorTransaction>>,
}

impl InMemoryLedgerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, transaction_id: impl Into<String>, transaction: MirrorTransaction) {
        self.transactions.lock().unwrap().insert(transaction_id.into(), transaction);
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedgerGateway {
    async fn get_transaction(&self, transaction_id: &str) -> anyhow::Result<Option<MirrorTransaction>> {
        Ok(self.transactions.lock().unwrap().get(transaction_id).cloned())
    }
}

/// `reqwest`-backed gateway against a configured mirror-node base URL.
pub struct HttpLedgerGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedgerGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[derive(serde::Deserialize)]
struct MirrorTransactionsResponse {
    transactions: Vec<MirrorTransactionWire>,
}

#[derive(serde::Deserialize)]
struct MirrorTransactionWire {
    result: String,
    transfers: Vec<MirrorTransferWire>,
}

#[derive(serde::Deserialize)]
struct MirrorTransferWire {
    account: String,
    amount: serde_json::Value,
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn get_transaction(&self, transaction_id: &str) -> anyhow::Result<Option<MirrorTransaction>> {
        let url = format!("{}/api/v1/transactions/{}", self.base_url, transaction_id);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(_) => return Ok(None),
        };
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Ok(None);
        }
        let body: MirrorTransactionsResponse = match response.json().await {
            Ok(b) => b,
            Err(_) => return Ok(None),
        };
        let Some(tx) = body.transactions.into_iter().next() else {
            return Ok(None);
        };
        let status = if tx.result == "SUCCESS" {
            MirrorTransactionStatus::Success
        } else {
            MirrorTransactionStatus::Failed
        };
        let transfers = tx
            .transfers
            .into_iter()
            .map(|t| MirrorTransfer {
                account: t.account,
                amount: t.amount.to_string().trim_matches('"').to_string(),
            })
            .collect();
        Ok(Some(MirrorTransaction { status, transfers }))
    }
}
