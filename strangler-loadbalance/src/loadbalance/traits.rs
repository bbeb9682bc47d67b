use super::resolver::EndpointSet;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use strangler_core::Endpoint;

/// 端点选择器接口
///
/// 每个服务组持有一个选择器实例，状态（游标、缓存序列、计数器）只属于该组。
/// 不同策略实现同一个接口，编排层不关心具体实现。
pub trait EndpointSelector: Send + Sync + fmt::Debug {
    /// 从解析出的端点集合中选出一个，没有可用端点时返回 None
    fn next(&self, endpoints: &EndpointSet) -> Option<Arc<Endpoint>>;

    fn strategy(&self) -> SelectionStrategy;

    /// 该策略选出的端点失败后是否允许重试
    fn retries_enabled(&self) -> bool {
        true
    }

    fn snapshot(&self) -> SelectorSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    Weighted,
    Counter,
}

/// 选择器内部状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorSnapshot {
    pub strategy: SelectionStrategy,
    /// 加权策略为游标，计数策略为已处理请求数
    pub cursor: u64,
    /// 缓存的选择序列长度，计数策略固定为 100
    pub sequence_len: usize,
}
