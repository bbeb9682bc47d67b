use super::registry::EndpointRegistry;
use chrono::Utc;
use reqwest::{redirect, Client};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strangler_core::Endpoint;
use tokio::task::JoinSet;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 单次探测超时
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 健康检查器
///
/// 按固定间隔并发探测所有端点（`GET protocol://host:port + health_check_path`），
/// 2xx 视为健康，其余状态码或传输失败视为不健康，结果原地写回端点。
/// 只在健康状态发生变化时记录日志。
pub struct HealthMonitor {
    registry: Arc<EndpointRegistry>,
    client: Client,
    check_interval: Option<Duration>,
}

/// 一轮探测的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub unhealthy_endpoints: usize,
}

impl HealthMonitor {
    /// 创建新的健康检查器，`check_interval` 为 None 时后台循环不启动
    pub fn new(registry: Arc<EndpointRegistry>, check_interval: Option<Duration>) -> Result<Self, reqwest::Error> {
        let client = Self::probe_client()?;

        Ok(Self {
            registry,
            client,
            check_interval,
        })
    }

    /// 探测用客户端：5 秒超时，不跟随重定向
    pub fn probe_client() -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()
    }

    pub fn check_interval(&self) -> Option<Duration> {
        self.check_interval
    }

    /// 启动健康检查循环，直到 `cancel` 被触发
    pub async fn run(&self, cancel: CancellationToken) {
        let Some(period) = self.check_interval else {
            info!("Health checks disabled (interval <= 0)");
            return;
        };

        info!("Starting health monitor with interval: {:?}", period);

        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // 停止时放弃正在进行的探测
            tokio::select! {
                _ = cancel.cancelled() => break,
                summary = self.probe_all() => {
                    debug!(
                        "Health check round finished: {}/{} healthy",
                        summary.healthy_endpoints, summary.total_endpoints
                    );
                }
            }
        }

        info!("Health monitor stopped");
    }

    /// 并发探测所有端点，单个端点的失败不影响其他端点
    pub async fn probe_all(&self) -> HealthSummary {
        let mut tasks = JoinSet::new();

        for endpoint in self.registry.endpoints() {
            let endpoint = endpoint.clone();
            let client = self.client.clone();
            tasks.spawn(async move { Self::probe_endpoint(&client, &endpoint).await });
        }

        let mut summary = HealthSummary {
            total_endpoints: self.registry.len(),
            ..HealthSummary::default()
        };

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => summary.healthy_endpoints += 1,
                Ok(false) => summary.unhealthy_endpoints += 1,
                Err(e) => {
                    error!("Health probe task failed: {}", e);
                    summary.unhealthy_endpoints += 1;
                }
            }
        }

        summary
    }

    /// 探测单个端点并记录结果，返回本次是否健康
    pub async fn probe_endpoint(client: &Client, endpoint: &Endpoint) -> bool {
        let url = endpoint.health_check_url();
        let start_time = Instant::now();

        let healthy = match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(
                    "Health probe {} -> {} in {}ms",
                    url,
                    response.status(),
                    start_time.elapsed().as_millis()
                );
                ok
            }
            Err(e) => {
                debug!("Health probe {} failed: {}", url, e);
                false
            }
        };

        let was_healthy = endpoint.record_probe(healthy, Utc::now());
        if was_healthy != healthy {
            if healthy {
                info!("Endpoint {} is now healthy", endpoint);
            } else {
                warn!("Endpoint {} is now unhealthy", endpoint);
            }
        }

        healthy
    }
}
