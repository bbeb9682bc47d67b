//! Strangler Relay Library
//!
//! This library provides request relay functionality for the strangler gateway including:
//! - Proxy request/response value objects and header hygiene
//! - The upstream proxy client
//! - Retry policy and the gateway request orchestrator

pub mod relay;

// Re-export commonly used types
pub use relay::client::{ProxyClient, ProxyRequest, ProxyResponse, TransportFailure, Upstream};
pub use relay::handler::{Dispatcher, GatewayHandler, RetryPolicy};
