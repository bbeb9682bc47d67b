use super::headers::{insert_header, X_ERROR, X_SERVICE_ENDPOINT, X_SERVICE_NAME};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::json;
use std::error::Error as StdError;
use std::net::IpAddr;
use std::time::Duration;
use strangler_core::{Endpoint, GatewayError, Route, GATEWAY_ID, X_GATEWAY};
use thiserror::Error;

/// 转发给上游的请求
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
    /// 是否把入站 Host 原样带给上游
    pub preserve_host: bool,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            client_ip: None,
            preserve_host: false,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<IpAddr>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// 按路由改写：`strip_path` 去前缀，`preserve_host` 透传 Host
    pub fn for_route(&self, route: &Route) -> Self {
        let mut request = self.clone();
        request.path = route.upstream_path(&self.path).into_owned();
        request.preserve_host = route.preserve_host;
        request
    }
}

/// 上游响应，或传输失败时合成的错误响应
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
    pub service_name: String,
    pub service_endpoint: String,
    /// 传输失败时的分类，正常收到上游响应时为 None
    pub failure: Option<TransportFailure>,
    /// 得到这个响应一共发起的尝试次数
    pub attempts: u32,
}

impl ProxyResponse {
    /// 传输失败时合成的响应，带 `x-error: proxy-error`
    pub fn from_failure(endpoint: &Endpoint, failure: TransportFailure, elapsed: Duration) -> Self {
        let error = failure.into_gateway_error(endpoint.service_name());
        let body = json!({
            "error": error.to_string(),
            "message": "The requested service is temporarily unavailable",
            "service": endpoint.service_name(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        insert_header(&mut headers, X_SERVICE_NAME, endpoint.service_name());
        insert_header(&mut headers, X_SERVICE_ENDPOINT, &endpoint.address());
        insert_header(&mut headers, X_GATEWAY, GATEWAY_ID);
        insert_header(&mut headers, X_ERROR, "proxy-error");

        Self {
            status: failure.status_code(),
            headers,
            body: Bytes::from(body.to_string()),
            elapsed,
            service_name: endpoint.service_name().to_string(),
            service_endpoint: endpoint.address(),
            failure: Some(failure),
            attempts: 1,
        }
    }

    /// 5xx 或传输失败都算可重试
    pub fn is_retryable(&self) -> bool {
        self.failure.is_some() || self.status.is_server_error()
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// 传输失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("upstream timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("name resolution failed")]
    NameResolution,
    #[error("transport error")]
    Other,
}

impl TransportFailure {
    /// 根据 reqwest 错误及其 source 链判断失败类型
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportFailure::Timeout;
        }

        let mut source: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionRefused => return TransportFailure::ConnectionRefused,
                    std::io::ErrorKind::TimedOut => return TransportFailure::Timeout,
                    _ => {}
                }
            }

            let text = cause.to_string().to_ascii_lowercase();
            if text.contains("dns error")
                || text.contains("failed to lookup address")
                || text.contains("name or service not known")
                || text.contains("no such host")
            {
                return TransportFailure::NameResolution;
            }

            source = cause.source();
        }

        TransportFailure::Other
    }

    pub fn status_code(&self) -> StatusCode {
        self.gateway_error_kind().status_code()
    }

    pub fn into_gateway_error(self, service: &str) -> GatewayError {
        let service = service.to_string();
        match self {
            TransportFailure::Timeout => GatewayError::UpstreamTimeout { service },
            TransportFailure::ConnectionRefused | TransportFailure::NameResolution => {
                GatewayError::UpstreamUnreachable { service }
            }
            TransportFailure::Other => GatewayError::UpstreamProtocolError { service },
        }
    }

    fn gateway_error_kind(&self) -> GatewayError {
        self.into_gateway_error("")
    }
}
