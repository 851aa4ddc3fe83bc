//! Product registry the producer exclusively owns (§3 ownership note). Read
//! on every request, mutated rarely — a `parking_lot::RwLock` avoids torn reads.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{now_ms, Currency, Product, RateLimitTerms, Sla};

#[derive(Default)]
pub struct ProductRegistry {
    products: RwLock<HashMap<String, Product>>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, product: Product) {
        self.products.write().insert(product.product_id.clone(), product);
    }

    pub fn get(&self, product_id: &str) -> Option<Product> {
        self.products.read().get(product_id).cloned()
    }

    pub fn list(&self) -> Vec<Product> {
        self.products.read().values().cloned().collect()
    }

    pub fn deprecate(&self, product_id: &str) {
        if let Some(product) = self.products.write().get_mut(product_id) {
            product.deprecated = true;
            product.touch();
        }
    }
}

/// Builds the canonical `trustscore.basic.v1` product this producer sells.
pub fn trustscore_product(producer_agent_id: impl Into<String>, default_price: impl Into<String>, network: impl Into<String>) -> Product {
    let now = now_ms();
    Product {
        product_id: "trustscore.basic.v1".to_string(),
        version: "1".to_string(),
        human_name: "Trust Score".to_string(),
        description: "On-ledger reputation score for an account, computed from transfer and token history.".to_string(),
        producer_agent_id: producer_agent_id.into(),
        endpoint_path: "/trustscore/{accountId}".to_string(),
        default_price: default_price.into(),
        currency: Currency::Native,
        network: network.into(),
        rate_limit: RateLimitTerms::default(),
        sla: Sla { uptime: "99.9%".to_string(), response_time: "500ms".to_string() },
        created_at: now,
        updated_at: now,
        deprecated: false,
    }
}
