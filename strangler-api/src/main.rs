//! Strangler Gateway
//!
//! Main entry point for the strangler migration gateway

use strangler_api::start_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    start_server().await
}
