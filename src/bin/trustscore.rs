//! `trustscore` CLI: the consumer side of the mesh, packaged as a one-shot tool.
//! Resolves an account id (bare or embedded in natural language), negotiates
//! access to the producer's trustscore product, pays if challenged, and
//! prints the resulting score as JSON.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use trustmesh::config::{init_tracing, Config};
use trustmesh::consumer::{resolve_account_id, Consumer};
use trustmesh::mesh_client::OrchestratorClient;

#[derive(Parser, Debug)]
#[command(name = "trustscore", about = "Look up an agent's on-chain trust score")]
struct Args {
    /// Account id, or natural language containing one (e.g. "0.0.1234").
    query: Vec<String>,

    #[arg(long, env = "PRODUCER_ENDPOINT")]
    producer_endpoint: Option<String>,

    #[arg(long, default_value = "trustscore.basic.v1")]
    product_id: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let query = args.query.join(" ");
    let account_id = match resolve_account_id(&query) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let producer_endpoint = args.producer_endpoint.unwrap_or(config.producer_endpoint.clone());
    let http = reqwest::Client::new();
    let orchestrator = Arc::new(OrchestratorClient::new(http.clone(), config.orchestrator_endpoint.clone()));
    let consumer = Consumer::new(http, config.facilitator_endpoint.clone(), orchestrator, config.consumer_account.clone());
    consumer.register().await;

    match consumer.request_score(&account_id, &producer_endpoint, &args.product_id).await {
        Ok(score) => {
            println!("{}", serde_json::to_string_pretty(&score).unwrap());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
