use super::Route;
use crate::config::model::Config;
use crate::error::ConfigError;
use axum::http::Method;

/// 按声明顺序匹配路由，第一个命中的获胜
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    routes: Vec<Route>,
}

impl RouteMatcher {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let default_timeout = config.settings.request_timeout();
        let routes = config
            .routes
            .iter()
            .map(|route| Route::from_config(route, default_timeout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn match_route(&self, path: &str, method: &Method) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.allows(method) && route.matches_path(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
