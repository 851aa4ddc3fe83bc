//! Wallet abstraction behind exactly two operations — sign and submit — so the
//! native-ledger and EVM-stablecoin payment schemes can share one settlement
//! loop (§9 design note). Grounded on this codebase's `ExecutionAdapter` trait
//! shape for pluggable execution backends.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::payment::{AuthorizationPayload, PaymentReceipt};

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Produces the opaque signature bytes (hex-encoded) over an authorization payload.
    async fn sign(&self, payload: &AuthorizationPayload) -> anyhow::Result<String>;

    /// Submits the transfer described by a signed authorization to the ledger
    /// (or broadcasts it, for an EVM-style scheme) and returns the receipt.
    async fn submit_transfer(
        &self,
        payload: &AuthorizationPayload,
        signature: &str,
    ) -> anyhow::Result<PaymentReceipt>;
}

/// HMAC-SHA256 signer for the native-ledger scheme, and an in-memory ledger
/// simulator for `submit_transfer` — used by the facilitator and by tests.
/// A production deployment swaps this for a real ledger-SDK-backed wallet.
pub struct HmacWallet {
    secret: Vec<u8>,
    network: String,
}

impl HmacWallet {
    pub fn new(secret: impl AsRef<[u8]>, network: impl Into<String>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            network: network.into(),
        }
    }

    fn canonical_message(payload: &AuthorizationPayload) -> String {
        format!(
            "{}|{}|{}|{}",
            payload.from, payload.to, payload.value, payload.valid_before
        )
    }
}

#[async_trait]
impl Wallet for HmacWallet {
    async fn sign(&self, payload: &AuthorizationPayload) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("invalid hmac key: {e}"))?;
        mac.update(Self::canonical_message(payload).as_bytes());
        let tag = mac.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(tag))
    }

    async fn submit_transfer(
        &self,
        payload: &AuthorizationPayload,
        signature: &str,
    ) -> anyhow::Result<PaymentReceipt> {
        let expected = self.sign(payload).await?;
        if expected != signature {
            return Ok(PaymentReceipt {
                success: false,
                transaction_id: None,
                network: self.network.clone(),
                error: Some("signature mismatch on submission".to_string()),
            });
        }
        let transaction_id = format!("0.0.{}@{}", payload.to.trim_start_matches("0.0."), payload.valid_before);
        Ok(PaymentReceipt {
            success: true,
            transaction_id: Some(transaction_id),
            network: self.network.clone(),
            error: None,
        })
    }
}
