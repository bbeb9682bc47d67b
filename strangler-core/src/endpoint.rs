use crate::config::model::{EndpointConfig, Protocol};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// 端点身份：(服务名, 主机, 端口)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointId {
    pub service_name: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.service_name, self.host, self.port)
    }
}

/// 物理后端
///
/// 权重启动后不变；健康状态和最后探测时间只由健康检查器写入，
/// 请求路径只读。
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    protocol: Protocol,
    health_check_path: String,
    weight: u32,
    healthy: AtomicBool,
    last_probe: RwLock<Option<DateTime<Utc>>>,
}

impl Endpoint {
    pub fn new(
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        protocol: Protocol,
        health_check_path: impl Into<String>,
        weight: u32,
    ) -> Self {
        Self {
            id: EndpointId {
                service_name: service_name.into(),
                host: host.into(),
                port,
            },
            protocol,
            health_check_path: health_check_path.into(),
            weight,
            healthy: AtomicBool::new(true),
            last_probe: RwLock::new(None),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(
            config.service_name.clone(),
            config.host.clone(),
            config.port,
            config.protocol,
            config.health_check_path.clone(),
            config.weight,
        )
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn service_name(&self) -> &str {
        &self.id.service_name
    }

    pub fn host(&self) -> &str {
        &self.id.host
    }

    pub fn port(&self) -> u16 {
        self.id.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn health_check_path(&self) -> &str {
        &self.health_check_path
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.id.host, self.id.port)
    }

    /// `protocol://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.id.host, self.id.port)
    }

    pub fn health_check_url(&self) -> String {
        format!("{}{}", self.base_url(), self.health_check_path)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn last_probe(&self) -> Option<DateTime<Utc>> {
        *self.last_probe.read()
    }

    /// 记录一次探测结果，返回探测前的健康状态
    ///
    /// 先写时间戳再发布健康位，读到新健康位的线程一定能看到对应的时间戳。
    pub fn record_probe(&self, healthy: bool, at: DateTime<Utc>) -> bool {
        *self.last_probe.write() = Some(at);
        self.healthy.swap(healthy, Ordering::AcqRel)
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            service_name: self.id.service_name.clone(),
            url: self.base_url(),
            address: self.address(),
            weight: self.weight,
            is_healthy: self.is_healthy(),
            last_probe: self.last_probe(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// 端点状态快照，用于统计接口和 CLI 输出
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub service_name: String,
    pub url: String,
    pub address: String,
    pub weight: u32,
    pub is_healthy: bool,
    pub last_probe: Option<DateTime<Utc>>,
}
