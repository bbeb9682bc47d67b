use crate::{GATEWAY_ID, X_GATEWAY};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// 网关请求处理中可能出现的错误
///
/// `Display` 的文本就是返回给客户端的 `error` 字段，
/// 其余字段只用于日志。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Route not found")]
    RouteNotFound { method: String, path: String },

    #[error("Service configuration error")]
    ServiceMisconfigured { service: String },

    #[error("Service temporarily unavailable")]
    NoHealthyEndpoint { service: String },

    #[error("Gateway Timeout")]
    UpstreamTimeout { service: String },

    #[error("Service Unavailable")]
    UpstreamUnreachable { service: String },

    #[error("Bad Gateway")]
    UpstreamProtocolError { service: String },

    #[error("Service unavailable after retries")]
    RetriesExhausted { service: String, attempts: u32 },
}

impl GatewayError {
    /// 获取对应的HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::ServiceMisconfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NoHealthyEndpoint { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamProtocolError { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// 错误涉及的逻辑服务名（路由未命中时没有）
    pub fn service(&self) -> Option<&str> {
        match self {
            GatewayError::RouteNotFound { .. } => None,
            GatewayError::ServiceMisconfigured { service }
            | GatewayError::NoHealthyEndpoint { service }
            | GatewayError::UpstreamTimeout { service }
            | GatewayError::UpstreamUnreachable { service }
            | GatewayError::UpstreamProtocolError { service }
            | GatewayError::RetriesExhausted { service, .. } => Some(service),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(X_GATEWAY, GATEWAY_ID)],
            Json(self.to_json()),
        )
            .into_response()
    }
}

/// 配置加载与校验错误，启动阶段遇到即退出
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
