use super::headers::{prepare_downstream_headers, prepare_upstream_headers};
use super::traits::Upstream;
use super::types::{ProxyRequest, ProxyResponse, TransportFailure};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::{Duration, Instant};
use strangler_core::Endpoint;

/// 上游代理客户端
///
/// 不跟随重定向，任何状态码都原样返回；传输失败合成为 504/503/502 响应。
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
}

impl ProxyClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            // 上游都是内网服务，直连
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// `protocol://host:port` + 路径（保证以 `/` 开头）+ 查询串
    pub fn build_target_url(endpoint: &Endpoint, path: &str, query: Option<&str>) -> String {
        let mut url = endpoint.base_url();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    pub async fn send(&self, endpoint: &Endpoint, request: &ProxyRequest, timeout: Duration) -> ProxyResponse {
        let start_time = Instant::now();
        let target_url = Self::build_target_url(endpoint, &request.path, request.query.as_deref());

        tracing::debug!(
            "Proxying {} {} to {} (timeout {}ms)",
            request.method,
            request.path,
            target_url,
            timeout.as_millis()
        );

        let headers = prepare_upstream_headers(
            &request.headers,
            endpoint,
            request.client_ip,
            request.preserve_host,
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &target_url)
            .headers(headers)
            .timeout(timeout);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Self::failure(endpoint, &e, start_time),
        };

        let status = response.status();
        let upstream_headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Self::failure(endpoint, &e, start_time),
        };

        let elapsed = start_time.elapsed();
        tracing::debug!(
            "Received {} from {} in {}ms ({} bytes)",
            status,
            endpoint,
            elapsed.as_millis(),
            body.len()
        );

        ProxyResponse {
            status,
            headers: prepare_downstream_headers(&upstream_headers, endpoint),
            body,
            elapsed,
            service_name: endpoint.service_name().to_string(),
            service_endpoint: endpoint.address(),
            failure: None,
            attempts: 1,
        }
    }

    fn failure(endpoint: &Endpoint, error: &reqwest::Error, start_time: Instant) -> ProxyResponse {
        let failure = TransportFailure::classify(error);
        tracing::warn!(
            "Proxy request to {} failed ({}): {}",
            endpoint,
            failure,
            error
        );
        ProxyResponse::from_failure(endpoint, failure, start_time.elapsed())
    }
}

#[async_trait]
impl Upstream for ProxyClient {
    async fn send(&self, endpoint: &Endpoint, request: &ProxyRequest, timeout: Duration) -> ProxyResponse {
        ProxyClient::send(self, endpoint, request, timeout).await
    }
}
