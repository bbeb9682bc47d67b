use crate::config::model::{BalancerMode, Config, GatewaySettings};
use crate::error::ConfigError;
use std::str::FromStr;
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// 加载网关配置
///
/// 顺序：`.env` 文件 -> `CONFIG_PATH` 指向的 TOML 文件（可选）-> 环境变量覆盖 -> 内置拓扑 -> 校验
pub fn load_config() -> Result<Config, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let settings = match get_config_path() {
        Some(path) => load_settings_from_path(&path)?,
        None => GatewaySettings::default(),
    };
    let settings = apply_env_overrides(settings, |key| std::env::var(key).ok())?;

    let config = Config::from_settings(settings);
    config.validate()?;
    Ok(config)
}

pub fn get_config_path() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
}

pub fn load_settings_from_path(config_path: &str) -> Result<GatewaySettings, ConfigError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
        path: config_path.to_string(),
        source,
    })?;
    let settings: GatewaySettings = toml::from_str(&config_str)?;
    Ok(settings)
}

/// 用环境变量覆盖设置，`lookup` 便于测试时注入
pub fn apply_env_overrides<F>(mut settings: GatewaySettings, lookup: F) -> Result<GatewaySettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(host) = env.string("HOST") {
        settings.host = host;
    }
    if let Some(port) = env.parse("PORT")? {
        settings.port = port;
    }
    if let Some(enabled) = env.flag("CORS_ENABLED")? {
        settings.cors_enabled = enabled;
    }
    if let Some(timeout) = env.parse("REQUEST_TIMEOUT")? {
        settings.request_timeout_ms = timeout;
    }
    if let Some(interval) = env.parse("HEALTH_CHECK_INTERVAL")? {
        settings.health_check_interval_ms = interval;
    }
    if let Some(level) = env.string("LOG_LEVEL") {
        settings.log_level = level;
    }
    if let Some(mode) = env.parse::<BalancerMode>("BALANCER_MODE")? {
        settings.balancer_mode = mode;
    }
    if let Some(enabled) = env.flag("GRADUAL_MIGRATION")? {
        settings.migration.enabled = enabled;
    }
    if let Some(percent) = env.parse("MOVIES_MIGRATION_PERCENT")? {
        settings.migration.percent = percent;
    }

    let upstreams = &mut settings.upstreams;
    if let Some(host) = env.string("MONOLITH_HOST") {
        upstreams.monolith.host = host;
    }
    if let Some(port) = env.parse("MONOLITH_PORT")? {
        upstreams.monolith.port = port;
    }
    if let Some(host) = env.string("MOVIES_SERVICE_HOST") {
        upstreams.movies.host = host;
    }
    if let Some(port) = env.parse("MOVIES_SERVICE_PORT")? {
        upstreams.movies.port = port;
    }
    if let Some(host) = env.string("EVENTS_SERVICE_HOST") {
        upstreams.events.host = host;
    }
    if let Some(port) = env.parse("EVENTS_SERVICE_PORT")? {
        upstreams.events.port = port;
    }

    Ok(settings)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    // 空字符串视为未设置
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.string(key) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value,
                    reason: "expected a boolean".to_string(),
                }),
            },
            None => Ok(None),
        }
    }
}
