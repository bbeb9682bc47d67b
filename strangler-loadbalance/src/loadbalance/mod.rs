pub mod health_checker;
pub mod manager;
pub mod migration;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod service;
pub mod traits;


pub use health_checker::{HealthMonitor, HealthSummary, PROBE_TIMEOUT};
pub use manager::{GroupMember, GroupStats, LoadBalanceManager, Selection};
pub use migration::CounterMigrationSelector;
pub use registry::EndpointRegistry;
pub use resolver::{EndpointSet, ServiceGroupResolver};
pub use selector::{build_selection_sequence, WeightedSelector};
pub use service::{LoadBalanceService, ServiceHealth};
pub use traits::{EndpointSelector, SelectionStrategy, SelectorSnapshot};
