//! Strangler Load Balance Library
//!
//! This library provides load balancing functionality for the strangler gateway including:
//! - Endpoint registry and service group resolution
//! - Endpoint selection strategies (weighted interleaving, counter-based migration)
//! - Health checking
//! - Load balance management

pub mod loadbalance;

// Re-export commonly used types
pub use loadbalance::{
    build_selection_sequence, CounterMigrationSelector, EndpointRegistry, EndpointSelector,
    EndpointSet, GroupMember, GroupStats, HealthMonitor, HealthSummary, LoadBalanceManager,
    LoadBalanceService, Selection, SelectionStrategy, SelectorSnapshot, ServiceGroupResolver,
    ServiceHealth, WeightedSelector,
};
