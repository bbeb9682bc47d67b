use super::migration::CounterMigrationSelector;
use super::registry::EndpointRegistry;
use super::resolver::ServiceGroupResolver;
use super::selector::WeightedSelector;
use super::traits::{EndpointSelector, SelectionStrategy};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strangler_core::{BalancerMode, Config, Endpoint, GatewayError};
use tracing::{debug, info};

/// 负载均衡管理器
///
/// 持有端点表、服务组解析器和每个服务组的选择器。
pub struct LoadBalanceManager {
    config: Arc<Config>,
    registry: Arc<EndpointRegistry>,
    resolver: ServiceGroupResolver,
    selectors: HashMap<String, Arc<dyn EndpointSelector>>,
}

/// 一次选择的结果
#[derive(Debug, Clone)]
pub struct Selection {
    pub endpoint: Arc<Endpoint>,
    pub strategy: SelectionStrategy,
    pub retries_enabled: bool,
}

/// 服务组统计
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub service: String,
    pub strategy: SelectionStrategy,
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub total_weight: u32,
    pub sequence_len: usize,
    pub cursor: u64,
    pub endpoints: Vec<GroupMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub service_name: String,
    pub address: String,
    pub weight: u32,
    pub is_healthy: bool,
}

impl LoadBalanceManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_registry(config.clone(), Arc::new(EndpointRegistry::from_config(&config)))
    }

    /// 使用外部构建的端点表
    pub fn with_registry(config: Arc<Config>, registry: Arc<EndpointRegistry>) -> Self {
        // 服务组、物理服务名和路由目标都预先建好选择器
        let names: BTreeSet<String> = config
            .service_groups
            .keys()
            .cloned()
            .chain(registry.endpoints().iter().map(|e| e.service_name().to_string()))
            .chain(config.routes.iter().map(|r| r.service_name.clone()))
            .collect();

        let resolver = ServiceGroupResolver::new(
            registry.clone(),
            config.service_groups.clone(),
            names.iter().cloned(),
        );

        let migration = &config.settings.migration;
        let mut selectors: HashMap<String, Arc<dyn EndpointSelector>> = HashMap::new();
        for name in names {
            let selector: Arc<dyn EndpointSelector> =
                if config.settings.balancer_mode == BalancerMode::Counter && name == migration.group {
                    info!(
                        "Using counter migration for '{}': {}% -> {} (enabled: {})",
                        name, migration.percent, migration.new_service, migration.enabled
                    );
                    Arc::new(CounterMigrationSelector::from_settings(migration))
                } else {
                    Arc::new(WeightedSelector::new(name.clone()))
                };
            selectors.insert(name, selector);
        }

        debug!("Created {} selectors for {} endpoints", selectors.len(), registry.len());

        Self {
            config,
            registry,
            resolver,
            selectors,
        }
    }

    /// 为逻辑服务选择端点
    ///
    /// 解析结果为空返回 `ServiceMisconfigured`，没有可选端点返回 `NoHealthyEndpoint`。
    pub fn select(&self, service_name: &str) -> Result<Selection, GatewayError> {
        let endpoints = self.resolver.resolve(service_name);
        if endpoints.is_empty() {
            return Err(GatewayError::ServiceMisconfigured {
                service: service_name.to_string(),
            });
        }

        let selector = self
            .selectors
            .get(service_name)
            .ok_or_else(|| GatewayError::ServiceMisconfigured {
                service: service_name.to_string(),
            })?;

        let endpoint = selector
            .next(&endpoints)
            .ok_or_else(|| GatewayError::NoHealthyEndpoint {
                service: service_name.to_string(),
            })?;

        Ok(Selection {
            endpoint,
            strategy: selector.strategy(),
            retries_enabled: selector.retries_enabled(),
        })
    }

    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn registry(&self) -> Arc<EndpointRegistry> {
        self.registry.clone()
    }

    pub fn resolver(&self) -> &ServiceGroupResolver {
        &self.resolver
    }

    /// 服务组统计，按服务名排序
    pub fn group_stats(&self) -> Vec<GroupStats> {
        let mut stats: Vec<GroupStats> = self
            .selectors
            .iter()
            .map(|(service, selector)| {
                let endpoints = self.resolver.resolve(service);
                let snapshot = selector.snapshot();
                GroupStats {
                    service: service.clone(),
                    strategy: snapshot.strategy,
                    total_endpoints: endpoints.len(),
                    healthy_endpoints: endpoints.iter().filter(|e| e.is_healthy()).count(),
                    total_weight: endpoints.iter().map(|e| e.weight()).sum(),
                    sequence_len: snapshot.sequence_len,
                    cursor: snapshot.cursor,
                    endpoints: endpoints
                        .iter()
                        .map(|e| GroupMember {
                            service_name: e.service_name().to_string(),
                            address: e.address(),
                            weight: e.weight(),
                            is_healthy: e.is_healthy(),
                        })
                        .collect(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.service.cmp(&b.service));
        stats
    }
}
