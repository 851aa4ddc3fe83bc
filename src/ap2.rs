//! AP2 negotiation protocol: NEGOTIATE -> OFFER -> ACCEPT.
//! Mission: bounded-lifetime offers with an enforcement predicate agents can check locally.

use serde::{Deserialize, Serialize};

use crate::models::{now_ms, Currency, RateLimitTerms, Sla};

pub const DEFAULT_OFFER_TTL_SECONDS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    #[serde(rename = "type")]
    pub kind: NegotiationMessageType,
    pub product_id: String,
    pub max_price: String,
    pub currency: Currency,
    pub rate_limit: RateLimitTerms,
    pub buyer_agent_id: String,
    pub timestamp: i64,
}

impl NegotiationRequest {
    pub fn new(
        product_id: impl Into<String>,
        max_price: impl Into<String>,
        currency: Currency,
        rate_limit: RateLimitTerms,
        buyer_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: NegotiationMessageType::Negotiate,
            product_id: product_id.into(),
            max_price: max_price.into(),
            currency,
            rate_limit,
            buyer_agent_id: buyer_agent_id.into(),
            timestamp: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(rename = "type")]
    pub kind: NegotiationMessageType,
    pub product_id: String,
    pub price: String,
    pub currency: Currency,
    /// Allowed fractional price drift the buyer may settle within, e.g. "0.0" for exact.
    pub slippage: String,
    pub rate_limit: RateLimitTerms,
    pub sla: Sla,
    /// Absolute epoch-ms deadline. Must be strictly after the offer's creation time.
    pub valid_until: i64,
    pub producer_agent_id: String,
    pub timestamp: i64,
}

impl Offer {
    pub fn new(
        product_id: impl Into<String>,
        price: impl Into<String>,
        currency: Currency,
        rate_limit: RateLimitTerms,
        sla: Sla,
        producer_agent_id: impl Into<String>,
    ) -> Self {
        let timestamp = now_ms();
        Self {
            kind: NegotiationMessageType::Offer,
            product_id: product_id.into(),
            price: price.into(),
            currency,
            slippage: "0".to_string(),
            rate_limit,
            sla,
            valid_until: timestamp + DEFAULT_OFFER_TTL_SECONDS * 1000,
            producer_agent_id: producer_agent_id.into(),
            timestamp,
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.valid_until <= now_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NegotiationMessageType {
    Negotiate,
    Offer,
    Accept,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acceptance {
    pub offer: Offer,
    pub buyer_agent_id: String,
    pub accepted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferExpired;

impl std::fmt::Display for OfferExpired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "offer is expired")
    }
}

impl std::error::Error for OfferExpired {}

impl Acceptance {
    /// Constructing an acceptance of an expired offer is an error (§3 invariant).
    pub fn accept(offer: Offer, buyer_agent_id: impl Into<String>) -> Result<Self, OfferExpired> {
        Self::accept_at(offer, buyer_agent_id, now_ms())
    }

    pub fn accept_at(
        offer: Offer,
        buyer_agent_id: impl Into<String>,
        now: i64,
    ) -> Result<Self, OfferExpired> {
        if offer.is_expired_at(now) {
            return Err(OfferExpired);
        }
        Ok(Self {
            offer,
            buyer_agent_id: buyer_agent_id.into(),
            accepted_at: now,
        })
    }
}

/// Candidate terms a buyer is about to act on, checked against an offer.
pub struct CandidateTerms<'a> {
    pub price: &'a str,
    pub calls: u32,
    pub uptime_percent: f64,
}

/// §8 property 9: false iff price exceeds the offer, calls exceed the offer,
/// or uptime falls below the offer's advertised uptime.
pub fn enforces_terms(offer: &Offer, candidate: &CandidateTerms<'_>) -> bool {
    let offer_price = parse_smallest_unit(&offer.price);
    let candidate_price = parse_smallest_unit(candidate.price);
    let price_ok = match (offer_price, candidate_price) {
        (Some(o), Some(c)) => c <= o,
        _ => false,
    };

    let calls_ok = candidate.calls <= offer.rate_limit.calls;

    let offer_uptime = parse_uptime_percent(&offer.sla.uptime);
    let uptime_ok = match offer_uptime {
        Some(o) => candidate.uptime_percent >= o,
        None => true,
    };

    price_ok && calls_ok && uptime_ok
}

pub(crate) fn parse_smallest_unit(s: &str) -> Option<u128> {
    s.trim().parse::<u128>().ok()
}

fn parse_uptime_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').parse::<f64>().ok()
}
