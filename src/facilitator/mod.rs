//! Facilitator (C6): stateless verification and settlement of a payment
//! authorization (§4.6). Holds nothing but a wallet and the network tag it serves.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::middleware::request_logging;
use crate::models::now_ms;
use crate::payment::{amounts_equal, AuthorizationPayload, PaymentReceipt, PaymentRequirements};
use crate::wallet::Wallet;

pub struct FacilitatorState<W: Wallet> {
    pub wallet: Arc<W>,
    pub network: String,
}

impl<W: Wallet> Clone for FacilitatorState<W> {
    fn clone(&self) -> Self {
        Self { wallet: self.wallet.clone(), network: self.network.clone() }
    }
}

pub fn router<W: Wallet + 'static>(state: FacilitatorState<W>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
        .route("/facilitator/verify", post(verify::<W>))
        .route("/facilitator/settle", post(settle::<W>))
        .with_state(state)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    pub authorization: AuthorizationPayload,
    pub requirements: PaymentRequirements,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// §4.6: scheme/network/recipient/amount/deadline checks, plus signature
/// verification when the caller already signed (the EVM-stablecoin path).
pub async fn verify<W: Wallet>(State(state): State<FacilitatorState<W>>, Json(req): Json<FacilitatorRequest>) -> Json<VerifyResponse> {
    Json(verify_authorization(&state, &req).await)
}

async fn verify_authorization<W: Wallet>(state: &FacilitatorState<W>, req: &FacilitatorRequest) -> VerifyResponse {
    if req.requirements.network != state.network {
        return invalid("network does not match the facilitator's configured network");
    }
    if req.authorization.to != req.requirements.pay_to {
        return invalid("authorization recipient does not match requirements.payTo");
    }
    if !amounts_equal(&req.authorization.value, &req.requirements.max_amount_required) {
        return invalid("authorization value does not match requirements.maxAmountRequired");
    }
    if req.authorization.valid_before <= now_ms() {
        return invalid("authorization is already expired");
    }
    if let Some(signature) = &req.signature {
        match state.wallet.sign(&req.authorization).await {
            Ok(expected) if &expected == signature => {}
            _ => return invalid("signature does not verify"),
        }
    }
    VerifyResponse { is_valid: true, reason: None }
}

fn invalid(reason: &str) -> VerifyResponse {
    VerifyResponse { is_valid: false, reason: Some(reason.to_string()) }
}

/// §4.6: submits the ledger-native transfer (or broadcasts the signed
/// authorization) and returns the resulting receipt.
pub async fn settle<W: Wallet>(State(state): State<FacilitatorState<W>>, Json(req): Json<FacilitatorRequest>) -> Json<PaymentReceipt> {
    let verdict = verify_authorization(&state, &req).await;
    if !verdict.is_valid {
        return Json(PaymentReceipt {
            success: false,
            transaction_id: None,
            network: state.network.clone(),
            error: verdict.reason,
        });
    }

    let signature = match &req.signature {
        Some(sig) => sig.clone(),
        None => match state.wallet.sign(&req.authorization).await {
            Ok(sig) => sig,
            Err(err) => {
                return Json(PaymentReceipt { success: false, transaction_id: None, network: state.network.clone(), error: Some(err.to_string()) });
            }
        },
    };

    match state.wallet.submit_transfer(&req.authorization, &signature).await {
        Ok(receipt) => Json(receipt),
        Err(err) => Json(PaymentReceipt { success: false, transaction_id: None, network: state.network.clone(), error: Some(err.to_string()) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use crate::wallet::HmacWallet;

    fn state() -> FacilitatorState<HmacWallet> {
        FacilitatorState { wallet: Arc::new(HmacWallet::new(b"secret", "hedera-testnet")), network: "hedera-testnet".to_string() }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements::exact("hedera-testnet", Currency::Native, "0.0.999", "30000", "/trustscore/0.0.2", 30)
    }

    #[tokio::test]
    async fn valid_unsigned_authorization_verifies() {
        let req = FacilitatorRequest {
            authorization: AuthorizationPayload { from: "0.0.1".to_string(), to: "0.0.999".to_string(), value: "30000".to_string(), valid_before: now_ms() + 60_000 },
            requirements: requirements(),
            signature: None,
        };
        let response = verify(State(state()), Json(req)).await;
        assert!(response.0.is_valid);
    }

    #[tokio::test]
    async fn expired_authorization_fails_verification() {
        let req = FacilitatorRequest {
            authorization: AuthorizationPayload { from: "0.0.1".to_string(), to: "0.0.999".to_string(), value: "30000".to_string(), valid_before: now_ms() - 1 },
            requirements: requirements(),
            signature: None,
        };
        let response = verify(State(state()), Json(req)).await;
        assert!(!response.0.is_valid);
    }

    #[tokio::test]
    async fn settle_produces_a_transaction_id() {
        let req = FacilitatorRequest {
            authorization: AuthorizationPayload { from: "0.0.1".to_string(), to: "0.0.999".to_string(), value: "30000".to_string(), valid_before: now_ms() + 60_000 },
            requirements: requirements(),
            signature: None,
        };
        let receipt = settle(State(state()), Json(req)).await;
        assert!(receipt.0.success);
        assert!(receipt.0.transaction_id.is_some());
    }

    #[tokio::test]
    async fn settle_rejects_amount_mismatch() {
        let req = FacilitatorRequest {
            authorization: AuthorizationPayload { from: "0.0.1".to_string(), to: "0.0.999".to_string(), value: "29999".to_string(), valid_before: now_ms() + 60_000 },
            requirements: requirements(),
            signature: None,
        };
        let receipt = settle(State(state()), Json(req)).await;
        assert!(!receipt.0.success);
    }
}
