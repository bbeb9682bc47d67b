use crate::relay::client::{ProxyRequest, ProxyResponse, Upstream};
use std::sync::Arc;
use std::time::Duration;
use strangler_core::{Endpoint, GatewayError};

/// 指数退避策略：第 n 次失败后等待 `min(base * 2^(n-1), max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次（从 1 开始）尝试失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// 一次分发的过程记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// 带重试的分发器
///
/// 对同一个端点最多尝试 `max_attempts` 次：状态码 < 500 立即返回（4xx 不重试），
/// 5xx 或传输失败在还有剩余次数时退避后重试，次数用尽返回 `RetriesExhausted`。
#[derive(Clone)]
pub struct Dispatcher {
    upstream: Arc<dyn Upstream>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(upstream: Arc<dyn Upstream>, policy: RetryPolicy) -> Self {
        Self { upstream, policy }
    }

    /// 只发一次，上游状态码和响应体原样返回，传输失败返回合成的 504/503/502
    pub async fn forward(
        &self,
        service: &str,
        endpoint: &Endpoint,
        request: &ProxyRequest,
        timeout: Duration,
    ) -> ProxyResponse {
        let mut guard = InFlight::new(service, endpoint);
        let response = self.upstream.send(endpoint, request, timeout).await;
        guard.finish();
        response
    }

    pub async fn dispatch(
        &self,
        service: &str,
        endpoint: &Endpoint,
        request: &ProxyRequest,
        timeout: Duration,
        max_attempts: u32,
    ) -> (Result<ProxyResponse, GatewayError>, DispatchReport) {
        let max_attempts = max_attempts.max(1);
        let mut report = DispatchReport::default();
        // 客户端断开时 future 被丢弃，守卫负责记录
        let mut guard = InFlight::new(service, endpoint);

        for attempt in 1..=max_attempts {
            report.attempts = attempt;
            let mut response = self.upstream.send(endpoint, request, timeout).await;
            response.attempts = attempt;

            if !response.is_retryable() {
                tracing::debug!(
                    "Request to {} succeeded with {} on attempt {}/{}",
                    endpoint,
                    response.status,
                    attempt,
                    max_attempts
                );
                guard.finish();
                return (Ok(response), report);
            }

            if attempt == max_attempts {
                tracing::warn!(
                    "Request to {} failed with {} on final attempt {}/{}",
                    endpoint,
                    response.status,
                    attempt,
                    max_attempts
                );
                break;
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                "Request to {} failed with {} on attempt {}/{}, retrying in {}ms",
                endpoint,
                response.status,
                attempt,
                max_attempts,
                delay.as_millis()
            );
            report.delays.push(delay);
            tokio::time::sleep(delay).await;
        }

        guard.finish();
        tracing::error!(
            "All {} attempts to {} failed for service '{}'",
            report.attempts,
            endpoint,
            service
        );
        (
            Err(GatewayError::RetriesExhausted {
                service: service.to_string(),
                attempts: report.attempts,
            }),
            report,
        )
    }
}

struct InFlight<'a> {
    service: &'a str,
    endpoint: &'a Endpoint,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(service: &'a str, endpoint: &'a Endpoint) -> Self {
        Self {
            service,
            endpoint,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::info!(
                "Client disconnected, abandoning dispatch to {} for service '{}'",
                self.endpoint,
                self.service
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, StatusCode};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use strangler_core::Protocol;

    /// 按脚本依次返回状态码的上游，超出脚本后重复最后一个
    struct ScriptedUpstream {
        statuses: Vec<StatusCode>,
        calls: AtomicU32,
    }

    impl ScriptedUpstream {
        fn new(statuses: &[StatusCode]) -> Arc<Self> {
            Arc::new(Self {
                statuses: statuses.to_vec(),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Upstream for ScriptedUpstream {
        async fn send(&self, endpoint: &Endpoint, _request: &ProxyRequest, _timeout: Duration) -> ProxyResponse {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let status = self.statuses[call.min(self.statuses.len() - 1)];
            ProxyResponse {
                status,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                elapsed: Duration::ZERO,
                service_name: endpoint.service_name().to_string(),
                service_endpoint: endpoint.address(),
                failure: None,
                attempts: 1,
            }
        }
    }

    fn create_test_endpoint() -> Endpoint {
        Endpoint::new("movies-service", "movies", 3281, Protocol::Http, "/api/movies", 50)
    }

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let upstream = ScriptedUpstream::new(&[StatusCode::INTERNAL_SERVER_ERROR]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/api/movies");

        let started = tokio::time::Instant::now();
        let (result, report) = dispatcher
            .dispatch("movies-load-balanced", &endpoint, &request, Duration::from_secs(30), 4)
            .await;

        assert_eq!(upstream.calls(), 4);
        assert_eq!(report.attempts, 4);
        assert_eq!(
            report.delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
        assert!(started.elapsed() >= Duration::from_millis(7000));

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Service unavailable after retries");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let upstream = ScriptedUpstream::new(&[StatusCode::NOT_FOUND]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/api/movies/404");

        let (result, report) = dispatcher
            .dispatch("movies-load-balanced", &endpoint, &request, Duration::from_secs(30), 4)
            .await;

        assert_eq!(upstream.calls(), 1);
        assert!(report.delays.is_empty());
        assert_eq!(result.unwrap().status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_server_errors() {
        let upstream = ScriptedUpstream::new(&[
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::OK,
        ]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/api/movies");

        let (result, report) = dispatcher
            .dispatch("movies-load-balanced", &endpoint, &request, Duration::from_secs(30), 4)
            .await;

        let response = result.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.attempts, 3);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.delays.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_has_no_backoff() {
        let upstream = ScriptedUpstream::new(&[StatusCode::INTERNAL_SERVER_ERROR]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/");

        let (result, report) = dispatcher
            .dispatch("monolith-service", &endpoint, &request, Duration::from_secs(5), 1)
            .await;

        assert_eq!(upstream.calls(), 1);
        assert!(report.delays.is_empty());
        assert!(matches!(result, Err(GatewayError::RetriesExhausted { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_returns_server_error_unchanged() {
        let upstream = ScriptedUpstream::new(&[StatusCode::INTERNAL_SERVER_ERROR, StatusCode::OK]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/api/movies");

        let response = dispatcher
            .forward("movies-load-balanced", &endpoint, &request, Duration::from_secs(30))
            .await;

        assert_eq!(upstream.calls(), 1);
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_dispatch_stops_retries() {
        let upstream = ScriptedUpstream::new(&[StatusCode::INTERNAL_SERVER_ERROR]);
        let dispatcher = Dispatcher::new(upstream.clone(), RetryPolicy::default());
        let endpoint = create_test_endpoint();
        let request = ProxyRequest::new(Method::GET, "/api/movies");

        // 第一次失败后进入 1000ms 退避，此时丢弃 future
        let outcome = tokio::time::timeout(
            Duration::from_millis(500),
            dispatcher.dispatch("movies-load-balanced", &endpoint, &request, Duration::from_secs(30), 4),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(upstream.calls(), 1);
    }
}
