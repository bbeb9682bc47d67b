//! Strangler CLI Tool
//!
//! Command line interface for inspecting the strangler gateway configuration
//! and a running gateway instance

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::sync::Arc;
use strangler_core::config::{apply_env_overrides, load_config, load_settings_from_path};
use strangler_core::{Config, GatewaySettings, RouteMatcher};
use strangler_loadbalance::{build_selection_sequence, HealthMonitor, LoadBalanceManager};

#[derive(Parser)]
#[command(name = "strangler-cli")]
#[command(about = "A CLI tool for inspecting the strangler gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the effective configuration (TOML file + environment)
    ValidateConfig {
        /// Path to a TOML settings file, defaults to CONFIG_PATH
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Print the route table in match order
    Routes {
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show which route and service a request would be sent to
    MatchRoute {
        #[arg(short, long)]
        config: Option<String>,
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Request path, e.g. /api/movies/1
        path: String,
    },
    /// Resolve a service name to its endpoints and weighted slot distribution
    Resolve {
        #[arg(short, long)]
        config: Option<String>,
        /// Service or group name
        service: String,
    },
    /// Probe every endpoint's health path once
    HealthCheck {
        #[arg(short, long)]
        config: Option<String>,
        /// Only probe endpoints of this service
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Fetch statistics from a running gateway
    Stats {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://127.0.0.1:3200")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration...");
            match load(config.as_deref()) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - listen address: {}", cfg.settings.listen_addr());
                    println!("  - {} endpoints configured", cfg.endpoints.len());
                    println!("  - {} routes configured", cfg.routes.len());
                    println!("  - {} service groups configured", cfg.service_groups.len());
                    println!(
                        "  - migration: enabled={}, {}% to {}",
                        cfg.settings.migration.enabled,
                        cfg.settings.migration.percent,
                        cfg.settings.migration.new_service
                    );
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Routes { config } => {
            let cfg = load(config.as_deref())?;
            let matcher = RouteMatcher::from_config(&cfg)?;
            println!("{:<16} {:<36} {:<24} {:>9} {:>7}", "PATH", "METHODS", "SERVICE", "TIMEOUT", "RETRIES");
            for route in matcher.routes() {
                let methods: Vec<&str> = route.methods.iter().map(|m| m.as_str()).collect();
                println!(
                    "{:<16} {:<36} {:<24} {:>7}ms {:>7}",
                    route.path,
                    methods.join(","),
                    route.service_name,
                    route.timeout.as_millis(),
                    route.retries
                );
            }
        }
        Commands::MatchRoute { config, method, path } => {
            let cfg = load(config.as_deref())?;
            let matcher = RouteMatcher::from_config(&cfg)?;
            let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method '{}'", method))?;
            match matcher.match_route(&path, &method) {
                Some(route) => {
                    println!("✅ {} {} -> route '{}'", method, path, route.path);
                    println!("  - service: {}", route.service_name);
                    println!("  - upstream path: {}", route.upstream_path(&path));
                    println!("  - timeout: {}ms, attempts: {}", route.timeout.as_millis(), route.max_attempts());
                }
                None => {
                    eprintln!("❌ {} {} -> no route (404 Route not found)", method, path);
                    std::process::exit(1);
                }
            }
        }
        Commands::Resolve { config, service } => {
            let cfg = load(config.as_deref())?;
            let manager = LoadBalanceManager::new(Arc::new(cfg));
            let endpoints = manager.resolver().resolve(&service);
            if endpoints.is_empty() {
                eprintln!("❌ '{}' resolves to no endpoints", service);
                std::process::exit(1);
            }

            println!("{} -> {} endpoint(s)", service, endpoints.len());
            let slots = slot_distribution(&service, &endpoints);
            for endpoint in endpoints.iter() {
                println!(
                    "  - {} (weight {}, {} of 100 slots)",
                    endpoint,
                    endpoint.weight(),
                    slots.get(&endpoint.id().to_string()).copied().unwrap_or(0)
                );
            }
        }
        Commands::HealthCheck { config, service } => {
            let cfg = load(config.as_deref())?;
            let manager = LoadBalanceManager::new(Arc::new(cfg));
            let client = HealthMonitor::probe_client()?;

            println!("Performing health check...");
            let mut failed = 0usize;
            for endpoint in manager.registry().endpoints() {
                if service.as_deref().is_some_and(|s| s != endpoint.service_name()) {
                    continue;
                }
                if HealthMonitor::probe_endpoint(&client, endpoint).await {
                    println!("✅ {} is healthy ({})", endpoint, endpoint.health_check_url());
                } else {
                    println!("❌ {} is unhealthy ({})", endpoint, endpoint.health_check_url());
                    failed += 1;
                }
            }

            if failed > 0 {
                eprintln!("{} endpoint(s) failed the health check", failed);
                std::process::exit(1);
            }
        }
        Commands::Stats { url } => {
            let stats_url = format!("{}/gateway/stats", url.trim_end_matches('/'));
            tracing::debug!("Fetching {}", stats_url);
            let response = reqwest::get(&stats_url)
                .await
                .with_context(|| format!("Failed to reach gateway at {}", url))?;
            if !response.status().is_success() {
                eprintln!("❌ Gateway returned {}", response.status());
                std::process::exit(1);
            }
            let stats: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// 未指定文件时走网关启动时同样的加载流程
fn load(config: Option<&str>) -> Result<Config> {
    let Some(path) = config else {
        return Ok(load_config()?);
    };

    let settings: GatewaySettings = load_settings_from_path(path)?;
    let settings = apply_env_overrides(settings, |key| std::env::var(key).ok())?;
    let cfg = Config::from_settings(settings);
    cfg.validate()?;
    Ok(cfg)
}

/// 每个端点在 100 槽位序列中占的槽数
fn slot_distribution(service: &str, endpoints: &[Arc<strangler_core::Endpoint>]) -> BTreeMap<String, usize> {
    let mut slots = BTreeMap::new();
    for endpoint in build_selection_sequence(service, endpoints) {
        *slots.entry(endpoint.id().to_string()).or_insert(0) += 1;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use strangler_core::config::model::UpstreamAddress;

    #[test]
    fn test_parse_match_route() {
        let cli = Cli::try_parse_from(["strangler-cli", "match-route", "--method", "POST", "/api/events"]).unwrap();
        match cli.command {
            Commands::MatchRoute { method, path, config } => {
                assert_eq!(method, "POST");
                assert_eq!(path, "/api/events");
                assert!(config.is_none());
            }
            _ => panic!("expected match-route"),
        }
    }

    #[test]
    fn test_parse_stats_default_url() {
        let cli = Cli::try_parse_from(["strangler-cli", "stats"]).unwrap();
        match cli.command {
            Commands::Stats { url } => assert_eq!(url, "http://127.0.0.1:3200"),
            _ => panic!("expected stats"),
        }
    }

    #[test]
    fn test_slot_distribution_follows_percent() {
        let mut settings = GatewaySettings::default();
        settings.migration.percent = 25;
        settings.upstreams.movies = UpstreamAddress::new("movies", 3281);
        let manager = LoadBalanceManager::new(Arc::new(Config::from_settings(settings)));

        let group = manager.resolver().resolve("movies-load-balanced");
        let slots = slot_distribution("movies-load-balanced", &group);

        assert_eq!(slots.values().sum::<usize>(), 100);
        assert_eq!(slots.get("movies-service@movies:3281"), Some(&25));
    }
}
