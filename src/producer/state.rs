//! Shared producer state (§3 ownership note): products, rate-limit buckets,
//! and negotiated per-consumer terms are exclusively owned by the producer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::analytics::{AnalyticsClient, AnalyticsProvider};
use crate::models::RateLimitTerms;
use crate::scoring::ScoringConfig;

use crate::mesh_client::OrchestratorClient;

use super::product::ProductRegistry;
use super::rate_limit::RateLimiter;

/// Terms a consumer negotiated for a product: the offer's price and rate
/// limit, recorded at negotiation time since the mesh has no separate
/// accept-acknowledgement channel back to the producer (§9, §4.4).
#[derive(Debug, Clone)]
pub struct NegotiatedTerms {
    pub price: String,
    pub rate_limit: RateLimitTerms,
}

pub struct ProducerState<P: AnalyticsProvider> {
    pub products: Arc<ProductRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub analytics: Arc<AnalyticsClient<P>>,
    pub scoring_config: Arc<ScoringConfig>,
    pub orchestrator: Arc<OrchestratorClient>,
    pub negotiated: Arc<RwLock<HashMap<(String, String), NegotiatedTerms>>>,
    pub producer_agent_id: String,
    pub producer_account: String,
    pub network: String,
}

impl<P: AnalyticsProvider> Clone for ProducerState<P> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
            rate_limiter: self.rate_limiter.clone(),
            analytics: self.analytics.clone(),
            scoring_config: self.scoring_config.clone(),
            orchestrator: self.orchestrator.clone(),
            negotiated: self.negotiated.clone(),
            producer_agent_id: self.producer_agent_id.clone(),
            producer_account: self.producer_account.clone(),
            network: self.network.clone(),
        }
    }
}

impl<P: AnalyticsProvider> ProducerState<P> {
    pub fn negotiated_terms_for(&self, consumer_agent_id: &str, product_id: &str) -> Option<NegotiatedTerms> {
        self.negotiated.read().get(&(consumer_agent_id.to_string(), product_id.to_string())).cloned()
    }

    pub fn record_negotiated_terms(&self, consumer_agent_id: &str, product_id: &str, terms: NegotiatedTerms) {
        self.negotiated.write().insert((consumer_agent_id.to_string(), product_id.to_string()), terms);
    }
}
