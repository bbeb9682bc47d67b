pub mod matcher;

pub use matcher::RouteMatcher;

use crate::config::model::RouteConfig;
use crate::error::ConfigError;
use axum::http::Method;
use std::borrow::Cow;
use std::time::Duration;

/// 加载后的路由，方法集合已规范化为大写的 [`Method`] 列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub methods: Vec<Method>,
    pub service_name: String,
    pub strip_path: bool,
    pub preserve_host: bool,
    pub timeout: Duration,
    pub retries: u32,
}

impl Route {
    pub fn from_config(config: &RouteConfig, default_timeout: Duration) -> Result<Self, ConfigError> {
        let mut methods: Vec<Method> = Vec::new();
        for raw in config.method.as_slice() {
            let normalized = raw.trim().to_ascii_uppercase();
            let method = Method::from_bytes(normalized.as_bytes()).map_err(|_| {
                ConfigError::Invalid(format!(
                    "route '{}' has invalid method '{}'",
                    config.path, raw
                ))
            })?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        if methods.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "route '{}' has no methods",
                config.path
            )));
        }

        // 去掉尾部斜杠，根路径保持 "/"
        let path = if config.is_catch_all() {
            "/"
        } else {
            config.path.trim_end_matches('/')
        };

        Ok(Self {
            path: path.to_string(),
            methods,
            service_name: config.service_name.clone(),
            strip_path: config.strip_path,
            preserve_host: config.preserve_host,
            timeout: config
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(default_timeout),
            retries: config.retries,
        })
    }

    pub fn is_catch_all(&self) -> bool {
        self.path == "/"
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// 按路径段匹配：相等或以 `pattern + "/"` 开头，不做子串匹配
    pub fn matches_path(&self, path: &str) -> bool {
        if self.is_catch_all() {
            return true;
        }
        match path.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// 转发到上游的路径；`strip_path` 时去掉路由前缀，剩余为空则为 "/"
    pub fn upstream_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if !self.strip_path || self.is_catch_all() {
            return Cow::Borrowed(path);
        }
        match path.strip_prefix(self.path.as_str()) {
            Some("") => Cow::Borrowed("/"),
            Some(rest) => Cow::Borrowed(rest),
            None => Cow::Borrowed(path),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}
