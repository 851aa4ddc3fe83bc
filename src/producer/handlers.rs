//! Public producer surface (§4.3, §6): negotiation, the 402-gated trust score
//! endpoint, and a liveness check. One state machine per `GET` request:
//! validate -> rate limit -> challenge or verify -> compute -> respond.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::analytics::AnalyticsProvider;
use crate::ap2::{parse_smallest_unit, NegotiationRequest, Offer};
use crate::error::ApiError;
use crate::models::{now_ms, AccountId, AuditEvent, AuditEventType, Product};
use crate::payment::{amounts_equal, PaymentRequirements, ReceiptHeader};
use crate::scoring::compute;

use super::product::trustscore_product;
use super::rate_limit::RateLimitDecision;
use super::state::{NegotiatedTerms, ProducerState};

pub const TRUSTSCORE_PRODUCT_ID: &str = "trustscore.basic.v1";

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_products<P: AnalyticsProvider>(State(state): State<ProducerState<P>>) -> Json<Vec<Product>> {
    Json(state.products.list())
}

fn consumer_agent_id(headers: &HeaderMap) -> String {
    headers.get("X-Agent-Id").and_then(|v| v.to_str().ok()).unwrap_or("anonymous").to_string()
}

pub async fn negotiate<P: AnalyticsProvider>(
    State(state): State<ProducerState<P>>,
    Json(req): Json<NegotiationRequest>,
) -> Result<Json<Offer>, ApiError> {
    let product = state
        .products
        .get(&req.product_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "UNKNOWN_PRODUCT", format!("unknown product '{}'", req.product_id)))?;

    let max_price = parse_smallest_unit(&req.max_price);
    let default_price = parse_smallest_unit(&product.default_price);
    // §9 open question (a): reject below the producer's default price.
    if let (Some(max_price), Some(default_price)) = (max_price, default_price) {
        if max_price < default_price {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, "PRICE_TOO_LOW", "offered max price is below the product's default price"));
        }
    }

    let offer = Offer::new(&product.product_id, &product.default_price, product.currency, req.rate_limit.clone(), product.sla.clone(), &state.producer_agent_id);

    state.record_negotiated_terms(&req.buyer_agent_id, &product.product_id, NegotiatedTerms { price: offer.price.clone(), rate_limit: offer.rate_limit.clone() });

    state
        .orchestrator
        .log_event(&AuditEvent::new(
            AuditEventType::NegotiationStarted,
            serde_json::json!({ "buyerAgentId": req.buyer_agent_id, "productId": product.product_id, "offerPrice": offer.price }),
        ))
        .await;

    Ok(Json(offer))
}

pub async fn get_trustscore<P: AnalyticsProvider>(
    State(state): State<ProducerState<P>>,
    Path(account_id_raw): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let account_id = AccountId::parse(&account_id_raw).map_err(|_| ApiError::invalid_account_id(&account_id_raw))?;

    let product = state
        .products
        .get(TRUSTSCORE_PRODUCT_ID)
        .ok_or_else(|| ApiError::internal("trustscore product not registered"))?;

    let consumer_agent_id = consumer_agent_id(&headers);
    let terms = state.negotiated_terms_for(&consumer_agent_id, &product.product_id);
    let rate_limit = terms.as_ref().map(|t| t.rate_limit.clone()).unwrap_or_else(Default::default);
    let price = terms.as_ref().map(|t| t.price.clone()).unwrap_or_else(|| product.default_price.clone());

    let requirements = PaymentRequirements::exact(&state.network, product.currency, &state.producer_account, &price, &product.endpoint_path, 30);

    // The unpaid 402-challenge GET doesn't count against the limit — only a
    // request that actually carries a payment gets metered.
    let payment_header = headers.get("X-PAYMENT").and_then(|v| v.to_str().ok().map(|s| s.to_string()));
    let Some(payment_header) = payment_header else {
        return Err(payment_required(&requirements));
    };

    match state.rate_limiter.check_and_increment(&consumer_agent_id, &product.product_id, rate_limit.calls, rate_limit.period_seconds) {
        RateLimitDecision::Exceeded { retry_after_seconds, consecutive_violation } => {
            if consecutive_violation {
                state
                    .orchestrator
                    .log_event(&AuditEvent::new(
                        AuditEventType::RateLimitViolation,
                        serde_json::json!({ "consumerAgentId": consumer_agent_id, "productId": product.product_id }),
                    ))
                    .await;
            }
            return Err(ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", "too many requests")
                .with_header("Retry-After", retry_after_seconds.to_string()));
        }
        RateLimitDecision::Allowed => {}
    }

    let receipt = ReceiptHeader::decode(&payment_header).map_err(|_| payment_verification_failed("malformed X-PAYMENT header"))?;

    let authorization_ok = receipt.authorization.authorization.to == state.producer_account
        && amounts_equal(&receipt.authorization.authorization.value, &requirements.max_amount_required)
        && receipt.authorization.authorization.valid_before > now_ms();
    if !authorization_ok {
        return Err(payment_verification_failed("authorization does not match the requirements"));
    }

    let verified = state.orchestrator.verify_receipt(&receipt.transaction_id, &requirements.max_amount_required, &state.producer_account).await;
    if !verified {
        return Err(payment_verification_failed("on-chain receipt verification failed"));
    }

    state
        .orchestrator
        .log_event(&AuditEvent::new(
            AuditEventType::PaymentVerified,
            serde_json::json!({ "consumerAgentId": consumer_agent_id, "transactionId": receipt.transaction_id }),
        ))
        .await;

    let bundle = state.analytics.bundle(account_id.as_str()).await;
    let total_failure = bundle.account_info.is_none() && bundle.transfers.is_none() && bundle.balances.is_none() && bundle.topics.is_none();
    if total_failure {
        return Err(ApiError::service_unavailable("upstream analytics unavailable and no cached data to fall back to"));
    }

    let score = compute(account_id.clone(), &bundle, &state.scoring_config, None);

    state
        .orchestrator
        .log_event(&AuditEvent::new(
            AuditEventType::ScoreDelivered,
            serde_json::json!({
                "buyerAgentId": consumer_agent_id,
                "producerAgentId": state.producer_agent_id,
                "account": account_id.to_string(),
                "score": score.score,
                "transactionId": receipt.transaction_id,
                "amount": requirements.max_amount_required,
            }),
        ))
        .await;

    Ok(Json(score).into_response())
}

fn payment_required(requirements: &PaymentRequirements) -> ApiError {
    ApiError::new(StatusCode::PAYMENT_REQUIRED, "PAYMENT_REQUIRED", "payment is required to compute this trust score")
        .with_details(serde_json::json!({ "payment": requirements }))
        .with_header("Accepts-Payment", "x402".to_string())
}

fn payment_verification_failed(reason: &str) -> ApiError {
    ApiError::new(StatusCode::PAYMENT_REQUIRED, "PAYMENT_VERIFICATION_FAILED", reason.to_string())
}

/// Ensures the default product exists even if nothing else registered it.
pub fn ensure_default_product<P: AnalyticsProvider>(state: &ProducerState<P>, default_price: &str) {
    if state.products.get(TRUSTSCORE_PRODUCT_ID).is_none() {
        state.products.register(trustscore_product(&state.producer_agent_id, default_price, &state.network));
    }
}
