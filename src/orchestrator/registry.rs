//! In-memory agent registry (§4.5). Grounded on this codebase's pattern of a
//! `parking_lot::RwLock`-guarded map read on every request and mutated rarely.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{now_ms, AgentRegistration, AgentRole};

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentRegistration>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new agent, or refreshes capabilities if `agent_id` is already known.
    /// A2A channel establishment is attempted by the caller (`mod.rs`'s handler) and
    /// never blocks registration on failure.
    pub fn register(&self, agent_id: impl Into<String>, role: AgentRole, capabilities: Vec<String>) -> AgentRegistration {
        let agent_id = agent_id.into();
        let mut agents = self.agents.write();
        let entry = agents.entry(agent_id.clone()).or_insert_with(|| AgentRegistration {
            agent_id: agent_id.clone(),
            role,
            capabilities: Vec::new(),
            registered_at: now_ms(),
            a2a_channel: None,
        });
        entry.capabilities = capabilities;
        entry.clone()
    }

    pub fn set_a2a_channel(&self, agent_id: &str, channel: String) {
        if let Some(agent) = self.agents.write().get_mut(agent_id) {
            agent.a2a_channel = Some(channel);
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentRegistration> {
        self.agents.read().get(agent_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_refreshes_capabilities() {
        let registry = AgentRegistry::new();
        registry.register("0.0.1", AgentRole::Producer, vec!["trustscore".to_string()]);
        registry.register("0.0.1", AgentRole::Producer, vec!["trustscore".to_string(), "extra".to_string()]);
        let agent = registry.get("0.0.1").unwrap();
        assert_eq!(agent.capabilities.len(), 2);
    }

    #[test]
    fn unknown_agent_lookup_returns_none() {
        let registry = AgentRegistry::new();
        assert!(registry.get("0.0.999").is_none());
    }
}
