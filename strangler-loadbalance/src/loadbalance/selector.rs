use super::resolver::EndpointSet;
use super::traits::{EndpointSelector, SelectionStrategy, SelectorSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use strangler_core::Endpoint;
use tracing::{debug, warn};

/// 选择序列的总槽位数
pub const SEQUENCE_SLOTS: u64 = 100;

/// 加权选择器
///
/// 按权重把 100 个槽位分给组内端点并交错排列，缓存为选择序列；
/// 每次选择时过滤掉不健康的端点，用单调递增的游标对过滤后的长度取模。
/// 序列、来源集合和游标放在同一把锁里，一起更新。
#[derive(Debug)]
pub struct WeightedSelector {
    group: String,
    state: Mutex<SelectionState>,
}

#[derive(Debug, Default)]
struct SelectionState {
    source: Option<EndpointSet>,
    sequence: Vec<Arc<Endpoint>>,
    cursor: u64,
}

impl WeightedSelector {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            state: Mutex::new(SelectionState::default()),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl EndpointSelector for WeightedSelector {
    fn next(&self, endpoints: &EndpointSet) -> Option<Arc<Endpoint>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let unchanged = state
            .source
            .as_ref()
            .is_some_and(|source| Arc::ptr_eq(source, endpoints));
        if !unchanged {
            state.sequence = build_selection_sequence(&self.group, endpoints);
            state.source = Some(endpoints.clone());
            debug!(
                "Rebuilt selection sequence for '{}' ({} endpoints, {} slots)",
                self.group,
                endpoints.len(),
                state.sequence.len()
            );
        }

        let healthy: Vec<&Arc<Endpoint>> = state
            .sequence
            .iter()
            .filter(|endpoint| endpoint.is_healthy())
            .collect();
        if healthy.is_empty() {
            return None;
        }

        let index = (state.cursor % healthy.len() as u64) as usize;
        let selected = healthy[index].clone();
        state.cursor = state.cursor.wrapping_add(1);

        Some(selected)
    }

    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Weighted
    }

    fn snapshot(&self) -> SelectorSnapshot {
        let state = self.state.lock();
        SelectorSnapshot {
            strategy: SelectionStrategy::Weighted,
            cursor: state.cursor,
            sequence_len: state.sequence.len(),
        }
    }
}

/// 构建选择序列
///
/// 每个端点分到 `round(w / Σw * 100)` 个槽位，非零权重至少 1 个，零权重不分配；
/// 权重全为 0 时视为配置错误，退化为每个端点 1 个槽位。
/// 槽位按轮次交错：每轮给每个还有剩余槽位的端点放一个。
pub fn build_selection_sequence(group: &str, endpoints: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>> {
    if endpoints.is_empty() {
        return Vec::new();
    }

    let total: u64 = endpoints.iter().map(|e| u64::from(e.weight())).sum();

    let mut remaining: Vec<u64> = if total == 0 {
        warn!(
            "Invalid configuration: all endpoints in '{}' have zero weight, falling back to uniform selection",
            group
        );
        vec![1; endpoints.len()]
    } else {
        endpoints
            .iter()
            .map(|endpoint| {
                let weight = u64::from(endpoint.weight());
                if weight == 0 {
                    0
                } else {
                    // 四舍五入：(w * 100 + Σw / 2) / Σw
                    ((weight * SEQUENCE_SLOTS + total / 2) / total).max(1)
                }
            })
            .collect()
    };

    let mut sequence = Vec::with_capacity(remaining.iter().sum::<u64>() as usize);
    loop {
        let mut placed = false;
        for (endpoint, slots) in endpoints.iter().zip(remaining.iter_mut()) {
            if *slots > 0 {
                sequence.push(endpoint.clone());
                *slots -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }

    sequence
}
