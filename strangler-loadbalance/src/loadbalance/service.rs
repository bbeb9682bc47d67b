use super::health_checker::HealthMonitor;
use super::manager::{GroupStats, LoadBalanceManager, Selection};
use super::registry::EndpointRegistry;
use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use strangler_core::{Config, EndpointSnapshot, GatewayError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 负载均衡服务
/// 整合负载均衡管理器和健康检查器，提供统一的服务接口
pub struct LoadBalanceService {
    manager: Arc<LoadBalanceManager>,
    health_monitor: Arc<HealthMonitor>,
    monitor_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// 服务健康状态
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub is_running: bool,
    pub health_checks_enabled: bool,
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
}

impl LoadBalanceService {
    /// 创建新的负载均衡服务
    pub fn new(config: Config) -> Result<Self> {
        // 验证配置
        config.validate()?;

        let config = Arc::new(config);
        let registry = Arc::new(EndpointRegistry::from_config(&config));
        let manager = Arc::new(LoadBalanceManager::with_registry(config.clone(), registry.clone()));
        let health_monitor = Arc::new(HealthMonitor::new(
            registry,
            config.settings.health_check_interval(),
        )?);

        Ok(Self {
            manager,
            health_monitor,
            monitor_task: Mutex::new(None),
        })
    }

    /// 启动负载均衡服务（后台健康检查循环）
    pub async fn start(&self) -> Result<()> {
        let mut task = self.monitor_task.lock();
        if task.is_some() {
            return Ok(());
        }

        info!("Starting load balance service");

        let cancel = CancellationToken::new();
        let monitor = self.health_monitor.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            monitor.run(token).await;
        });
        *task = Some((cancel, handle));

        info!("Load balance service started successfully");
        Ok(())
    }

    /// 停止负载均衡服务，等待健康检查循环退出
    pub async fn stop(&self) {
        let task = self.monitor_task.lock().take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!("Health monitor task ended abnormally: {}", e);
            }
        }
        info!("Load balance service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.monitor_task.lock().is_some()
    }

    pub fn select(&self, service_name: &str) -> Result<Selection, GatewayError> {
        self.manager.select(service_name)
    }

    pub fn get_manager(&self) -> Arc<LoadBalanceManager> {
        self.manager.clone()
    }

    pub fn get_config(&self) -> Arc<Config> {
        self.manager.get_config()
    }

    pub fn endpoint_snapshots(&self) -> Vec<EndpointSnapshot> {
        self.manager.registry().snapshot()
    }

    pub fn group_stats(&self) -> Vec<GroupStats> {
        self.manager.group_stats()
    }

    pub fn get_service_health(&self) -> ServiceHealth {
        let registry = self.manager.registry();
        ServiceHealth {
            is_running: self.is_running(),
            health_checks_enabled: self.health_monitor.check_interval().is_some(),
            total_endpoints: registry.len(),
            healthy_endpoints: registry.healthy_count(),
        }
    }
}
