pub mod defaults;
pub mod loader;
pub mod model;


pub use loader::{apply_env_overrides, get_config_path, load_config, load_settings_from_path};
pub use model::{
    BalancerMode, Config, EndpointConfig, GatewaySettings, RouteMethods, MigrationSettings,
    Protocol, RouteConfig, UpstreamAddress, UpstreamSettings,
};
