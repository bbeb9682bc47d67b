use super::resolver::EndpointSet;
use super::traits::{EndpointSelector, SelectionStrategy, SelectorSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strangler_core::{Endpoint, MigrationSettings};
use tracing::debug;

/// 计数器灰度选择器
///
/// 在两个具名服务之间切换：第 n 个请求（从 0 开始）取 `n % 100`，
/// 小于迁移百分比走新服务，否则走旧服务。迁移关闭时全部走新服务。
/// 不看健康状态，也不允许重试。
#[derive(Debug)]
pub struct CounterMigrationSelector {
    legacy_service: String,
    new_service: String,
    percent: u8,
    enabled: bool,
    counter: AtomicU64,
}

impl CounterMigrationSelector {
    pub fn new(legacy_service: impl Into<String>, new_service: impl Into<String>, percent: u8, enabled: bool) -> Self {
        Self {
            legacy_service: legacy_service.into(),
            new_service: new_service.into(),
            percent: percent.min(100),
            enabled,
            counter: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &MigrationSettings) -> Self {
        Self::new(
            settings.legacy_service.clone(),
            settings.new_service.clone(),
            settings.percent,
            settings.enabled,
        )
    }

    pub fn request_count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// 本次请求应走的服务名
    pub fn decide(&self) -> &str {
        if !self.enabled {
            return &self.new_service;
        }
        let position = self.counter.fetch_add(1, Ordering::Relaxed) % 100;
        if position < u64::from(self.percent) {
            &self.new_service
        } else {
            &self.legacy_service
        }
    }
}

impl EndpointSelector for CounterMigrationSelector {
    fn next(&self, endpoints: &EndpointSet) -> Option<Arc<Endpoint>> {
        let target = self.decide();
        let selected = endpoints
            .iter()
            .find(|endpoint| endpoint.service_name() == target)
            .cloned();
        if selected.is_none() {
            debug!("Migration target '{}' is not part of the resolved group", target);
        }
        selected
    }

    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Counter
    }

    fn retries_enabled(&self) -> bool {
        false
    }

    fn snapshot(&self) -> SelectorSnapshot {
        SelectorSnapshot {
            strategy: SelectionStrategy::Counter,
            cursor: self.request_count(),
            sequence_len: 100,
        }
    }
}
