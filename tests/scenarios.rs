//! End-to-end mesh scenarios. Each test spins up the producer, orchestrator
//! and facilitator as real axum servers on ephemeral loopback ports and
//! drives them with `reqwest`, the way the mesh actually talks to itself.
//!
//! The on-chain mirror node is out of scope (see ledger.rs), so these tests
//! bridge it explicitly: after the facilitator "settles" a payment, the test
//! records that transaction into the orchestrator's in-memory ledger gateway
//! before the producer is asked to verify it, standing in for a real chain
//! indexer seeing the same transfer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use trustmesh::analytics::{AnalyticsClient, StubAnalyticsProvider};
use trustmesh::consumer::Consumer;
use trustmesh::facilitator::{self, FacilitatorState};
use trustmesh::ledger::{InMemoryLedgerGateway, LedgerGateway, MirrorTransaction, MirrorTransactionStatus, MirrorTransfer};
use trustmesh::mesh_client::OrchestratorClient;
use trustmesh::models::TrustScore;
use trustmesh::orchestrator::{self, AgentRegistry, AuditLog, OrchestratorState, RecordingAuditTransport, TaskTable};
use trustmesh::payment::{PaymentRequirements, ReceiptHeader};
use trustmesh::producer::handlers::{ensure_default_product, TRUSTSCORE_PRODUCT_ID};
use trustmesh::producer::product::ProductRegistry;
use trustmesh::producer::rate_limit::RateLimiter;
use trustmesh::producer::ProducerState;
use trustmesh::scoring::ScoringConfig;
use trustmesh::wallet::HmacWallet;

const NETWORK: &str = "hedera-testnet";
const PRODUCER_ACCOUNT: &str = "0.0.7304745";
const CONSUMER_AGENT: &str = "0.0.7304746";
const HMAC_KEY: &str = "dev-shared-key";

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

struct Mesh {
    producer_url: String,
    ledger: Arc<InMemoryLedgerGateway>,
    audit: Arc<AuditLog<RecordingAuditTransport>>,
    analytics: Arc<AnalyticsClient<StubAnalyticsProvider>>,
    consumer: Consumer,
}

async fn start_mesh() -> Mesh {
    let http = reqwest::Client::new();

    let ledger = Arc::new(InMemoryLedgerGateway::new());
    let ledger_dyn: Arc<dyn LedgerGateway> = ledger.clone();
    let audit = Arc::new(AuditLog::new(RecordingAuditTransport::new(), "0.0.900000"));
    let orchestrator_state = OrchestratorState {
        registry: Arc::new(AgentRegistry::new()),
        tasks: Arc::new(TaskTable::new()),
        audit: audit.clone(),
        ledger: ledger_dyn,
    };
    let orchestrator_url = spawn(orchestrator::router(orchestrator_state)).await;

    let wallet = Arc::new(HmacWallet::new(HMAC_KEY, NETWORK));
    let facilitator_state = FacilitatorState { wallet, network: NETWORK.to_string() };
    let facilitator_url = spawn(facilitator::router(facilitator_state)).await;

    let analytics_provider = StubAnalyticsProvider::new();
    let analytics = Arc::new(AnalyticsClient::new(analytics_provider));
    let orchestrator_client = Arc::new(OrchestratorClient::new(http.clone(), orchestrator_url.clone()));

    let producer_state = ProducerState {
        products: Arc::new(ProductRegistry::new()),
        rate_limiter: Arc::new(RateLimiter::new()),
        analytics: analytics.clone(),
        scoring_config: Arc::new(ScoringConfig::default()),
        orchestrator: orchestrator_client.clone(),
        negotiated: Arc::new(parking_lot::RwLock::new(HashMap::new())),
        producer_agent_id: PRODUCER_ACCOUNT.to_string(),
        producer_account: PRODUCER_ACCOUNT.to_string(),
        network: NETWORK.to_string(),
    };
    ensure_default_product(&producer_state, "30000");
    let producer_url = spawn(trustmesh::producer::router(producer_state)).await;

    let consumer = Consumer::new(http.clone(), facilitator_url.clone(), orchestrator_client, CONSUMER_AGENT);
    consumer.register().await;

    Mesh { producer_url, ledger, audit, analytics, consumer }
}

/// Settles a payment requirement through the facilitator and bridges the
/// resulting transaction into the orchestrator's ledger view, returning the
/// `X-PAYMENT` header the producer expects on retry.
async fn settle_and_bridge(mesh: &Mesh, requirements: &PaymentRequirements) -> String {
    let header = mesh.consumer.pay_for_access(requirements).await.unwrap();
    let receipt = ReceiptHeader::decode(&header).unwrap();
    mesh.ledger.record(
        receipt.transaction_id.clone(),
        MirrorTransaction {
            status: MirrorTransactionStatus::Success,
            transfers: vec![MirrorTransfer { account: PRODUCER_ACCOUNT.to_string(), amount: requirements.max_amount_required.clone() }],
        },
    );
    header
}

#[tokio::test]
async fn s1_happy_path_delivers_a_bounded_score_with_ordered_audit_events() {
    let mesh = start_mesh().await;
    mesh.analytics.provider().seed_account("0.0.2", trustmesh::models::now_ms() - 400 * 24 * 60 * 60 * 1000);
    mesh.analytics.provider().seed_transfers("0.0.2", vec![]);
    mesh.analytics.provider().seed_balances("0.0.2", vec![]);
    mesh.analytics.provider().seed_topics("0.0.2", vec![]);

    let http = reqwest::Client::new();
    mesh.consumer.negotiate(&mesh.producer_url, TRUSTSCORE_PRODUCT_ID, None).await.unwrap();

    let challenge = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .send()
        .await
        .unwrap();
    assert_eq!(challenge.status(), 402);
    let body: serde_json::Value = challenge.json().await.unwrap();
    let requirements: PaymentRequirements = serde_json::from_value(body["error"]["details"]["payment"].clone()).unwrap();
    assert_eq!(requirements.max_amount_required, "30000");
    assert_eq!(requirements.pay_to, PRODUCER_ACCOUNT);

    let payment_header = settle_and_bridge(&mesh, &requirements).await;

    let retried = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .header("X-PAYMENT", payment_header)
        .send()
        .await
        .unwrap();
    assert_eq!(retried.status(), 200);
    let score: TrustScore = retried.json().await.unwrap();
    assert!(score.score >= 0 && score.score <= 100);

    let events = mesh.audit.transport().events().await;
    let kinds: Vec<String> = events.iter().map(|e| format!("{:?}", e.kind)).collect();
    assert_eq!(kinds.first().map(String::as_str), Some("NegotiationStarted"));
    assert_eq!(kinds.last().map(String::as_str), Some("ScoreDelivered"));
    assert!(kinds.iter().any(|k| k == "PaymentVerified"));
}

#[tokio::test]
async fn s2_invalid_account_id_is_rejected_before_any_payment_challenge() {
    let mesh = start_mesh().await;
    let http = reqwest::Client::new();
    let response = http
        .get(format!("{}/trustscore/not-an-account", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_ACCOUNT_ID");
}

#[tokio::test]
async fn s4_sixth_call_in_a_window_is_rate_limited() {
    let mesh = start_mesh().await;
    mesh.analytics.provider().seed_account("0.0.2", trustmesh::models::now_ms());
    mesh.analytics.provider().seed_transfers("0.0.2", vec![]);
    mesh.analytics.provider().seed_balances("0.0.2", vec![]);
    mesh.analytics.provider().seed_topics("0.0.2", vec![]);

    let http = reqwest::Client::new();
    // A tight 5-calls-per-60s negotiation, distinct from the default unlimited test terms.
    let negotiate_body = serde_json::json!({
        "type": "NEGOTIATE",
        "productId": TRUSTSCORE_PRODUCT_ID,
        "maxPrice": "30000",
        "currency": "NATIVE",
        "rateLimit": { "calls": 5, "periodSeconds": 60 },
        "buyerAgentId": CONSUMER_AGENT,
        "timestamp": trustmesh::models::now_ms(),
    });
    let response = http
        .post(format!("{}/ap2/negotiate", mesh.producer_url))
        .json(&negotiate_body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    for _ in 0..5 {
        let challenge = http
            .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
            .header("X-Agent-Id", CONSUMER_AGENT)
            .send()
            .await
            .unwrap();
        assert_eq!(challenge.status(), 402);
        let body: serde_json::Value = challenge.json().await.unwrap();
        let requirements: PaymentRequirements = serde_json::from_value(body["error"]["details"]["payment"].clone()).unwrap();
        let header = settle_and_bridge(&mesh, &requirements).await;
        let retried = http
            .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
            .header("X-Agent-Id", CONSUMER_AGENT)
            .header("X-PAYMENT", header)
            .send()
            .await
            .unwrap();
        assert_eq!(retried.status(), 200);
    }

    let sixth = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .send()
        .await
        .unwrap();
    assert_eq!(sixth.status(), 429);
    let retry_after: u64 = sixth.headers().get("Retry-After").unwrap().to_str().unwrap().parse().unwrap();
    assert!(retry_after <= 60);
}

#[tokio::test]
async fn s5_upstream_outage_falls_back_to_a_stale_cached_score() {
    let mesh = start_mesh().await;
    mesh.analytics.provider().seed_account("0.0.2", trustmesh::models::now_ms() - 400 * 24 * 60 * 60 * 1000);
    mesh.analytics.provider().seed_transfers("0.0.2", vec![]);
    mesh.analytics.provider().seed_balances("0.0.2", vec![]);
    mesh.analytics.provider().seed_topics("0.0.2", vec![]);

    // Warm the cache with one successful bundle fetch.
    mesh.analytics.bundle("0.0.2").await;

    mesh.analytics.provider().set_failing("0.0.2", trustmesh::analytics::AnalyticsErrorKind::Unavailable);

    let http = reqwest::Client::new();
    mesh.consumer.negotiate(&mesh.producer_url, TRUSTSCORE_PRODUCT_ID, None).await.unwrap();

    let challenge = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = challenge.json().await.unwrap();
    let requirements: PaymentRequirements = serde_json::from_value(body["error"]["details"]["payment"].clone()).unwrap();
    let header = settle_and_bridge(&mesh, &requirements).await;

    let retried = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .header("X-PAYMENT", header)
        .send()
        .await
        .unwrap();
    assert_eq!(retried.status(), 200);
    let score: TrustScore = retried.json().await.unwrap();
    assert!(score.stale);
}

#[tokio::test]
async fn s6_amount_mismatch_fails_verification_without_computing_a_score() {
    let mesh = start_mesh().await;
    mesh.analytics.provider().seed_account("0.0.2", trustmesh::models::now_ms());
    mesh.analytics.provider().seed_transfers("0.0.2", vec![]);
    mesh.analytics.provider().seed_balances("0.0.2", vec![]);
    mesh.analytics.provider().seed_topics("0.0.2", vec![]);

    mesh.consumer.negotiate(&mesh.producer_url, TRUSTSCORE_PRODUCT_ID, None).await.unwrap();

    let http = reqwest::Client::new();
    let challenge = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = challenge.json().await.unwrap();
    let mut requirements: PaymentRequirements = serde_json::from_value(body["error"]["details"]["payment"].clone()).unwrap();

    // Settle for the correct amount, then understate it in the recorded mirror
    // transfer so the producer's receipt verification sees a mismatch.
    let header = mesh.consumer.pay_for_access(&requirements).await.unwrap();
    let receipt = ReceiptHeader::decode(&header).unwrap();
    mesh.ledger.record(
        receipt.transaction_id.clone(),
        MirrorTransaction {
            status: MirrorTransactionStatus::Success,
            transfers: vec![MirrorTransfer { account: PRODUCER_ACCOUNT.to_string(), amount: "29999".to_string() }],
        },
    );
    requirements.max_amount_required = "30000".to_string();

    let retried = http
        .get(format!("{}/trustscore/0.0.2", mesh.producer_url))
        .header("X-Agent-Id", CONSUMER_AGENT)
        .header("X-PAYMENT", header)
        .send()
        .await
        .unwrap();
    assert_eq!(retried.status(), 402);
    let body: serde_json::Value = retried.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PAYMENT_VERIFICATION_FAILED");

    let events = mesh.audit.transport().events().await;
    assert!(events.iter().all(|e| !matches!(e.kind, trustmesh::models::AuditEventType::ScoreDelivered)));
}
