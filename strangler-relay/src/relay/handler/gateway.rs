use super::retry::{Dispatcher, RetryPolicy};
use crate::relay::client::{ProxyClient, ProxyRequest, ProxyResponse, Upstream};
use std::sync::Arc;
use strangler_core::{ConfigError, GatewayError, RouteMatcher};
use strangler_loadbalance::LoadBalanceService;

/// 网关请求编排
///
/// MATCHING -> RESOLVING -> SELECTING -> DISPATCHING -> DONE，
/// 任一阶段失败都以对应的 [`GatewayError`] 结束。
pub struct GatewayHandler {
    matcher: RouteMatcher,
    load_balancer: Arc<LoadBalanceService>,
    dispatcher: Dispatcher,
}

impl GatewayHandler {
    pub fn new(load_balancer: Arc<LoadBalanceService>) -> anyhow::Result<Self> {
        let client = ProxyClient::new()?;
        Ok(Self::with_upstream(load_balancer, Arc::new(client), RetryPolicy::default())?)
    }

    pub fn with_upstream(
        load_balancer: Arc<LoadBalanceService>,
        upstream: Arc<dyn Upstream>,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let matcher = RouteMatcher::from_config(&load_balancer.get_config())?;
        Ok(Self {
            matcher,
            load_balancer,
            dispatcher: Dispatcher::new(upstream, policy),
        })
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn load_balancer(&self) -> &Arc<LoadBalanceService> {
        &self.load_balancer
    }

    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, GatewayError> {
        // MATCHING
        let route = self
            .matcher
            .match_route(&request.path, &request.method)
            .ok_or_else(|| {
                tracing::debug!("No route for {} {}", request.method, request.path);
                GatewayError::RouteNotFound {
                    method: request.method.to_string(),
                    path: request.path.clone(),
                }
            })?;

        // RESOLVING + SELECTING
        let selection = self.load_balancer.select(&route.service_name).map_err(|e| {
            tracing::warn!(
                "Endpoint selection for {} {} (service '{}') failed: {:?}",
                request.method,
                request.path,
                route.service_name,
                e
            );
            e
        })?;

        let max_attempts = if selection.retries_enabled {
            route.max_attempts()
        } else {
            1
        };

        tracing::debug!(
            "{} {} -> route '{}' -> {} ({:?}, up to {} attempts)",
            request.method,
            request.path,
            route.path,
            selection.endpoint,
            selection.strategy,
            max_attempts
        );

        // DISPATCHING
        let upstream_request = request.for_route(route);
        let result = if selection.retries_enabled {
            self.dispatcher
                .dispatch(
                    &route.service_name,
                    &selection.endpoint,
                    &upstream_request,
                    route.timeout,
                    max_attempts,
                )
                .await
                .0
        } else {
            // 计数模式不重试，上游响应原样透传
            Ok(self
                .dispatcher
                .forward(&route.service_name, &selection.endpoint, &upstream_request, route.timeout)
                .await)
        };

        if let Ok(response) = &result {
            tracing::info!(
                "{} {} -> {} {} in {}ms (attempts: {})",
                request.method,
                request.path,
                selection.endpoint,
                response.status,
                response.elapsed.as_millis(),
                response.attempts
            );
        }

        result
    }
}
