//! Strangler Core Library
//!
//! This library provides core functionality for the strangler gateway including:
//! - Configuration management (environment, optional TOML file, built-in topology)
//! - Endpoint and route model
//! - Route matching
//! - Shared error types

pub mod config;
pub mod endpoint;
pub mod error;
pub mod routing;

/// 网关标识，写入 `x-gateway` 和 `x-forwarded-by`
pub const GATEWAY_ID: &str = "strangler-gateway";
pub const X_GATEWAY: &str = "x-gateway";

// Re-export commonly used types
pub use config::model::{
    BalancerMode, Config, EndpointConfig, GatewaySettings, RouteMethods, MigrationSettings,
    Protocol, RouteConfig,
};
pub use endpoint::{Endpoint, EndpointId, EndpointSnapshot};
pub use error::{ConfigError, GatewayError};
pub use routing::{Route, RouteMatcher};
