//! The agent-to-agent reputation marketplace: four processes (producer,
//! consumer, orchestrator, facilitator) that negotiate terms over AP2,
//! gate access behind a 402 payment challenge, and settle through a
//! pluggable wallet/ledger boundary. See SPEC_FULL.md for the full contract.

pub mod analytics;
pub mod ap2;
pub mod config;
pub mod consumer;
pub mod error;
pub mod facilitator;
pub mod ledger;
pub mod mesh_client;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod payment;
pub mod producer;
pub mod scoring;
pub mod wallet;
