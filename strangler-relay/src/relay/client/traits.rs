use super::types::{ProxyRequest, ProxyResponse};
use async_trait::async_trait;
use std::time::Duration;
use strangler_core::Endpoint;

/// 上游调用接口
///
/// 实现方不得返回错误：传输失败要转换成合成的 [`ProxyResponse`]。
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, endpoint: &Endpoint, request: &ProxyRequest, timeout: Duration) -> ProxyResponse;
}
