use crate::router::router::create_app_router;
use strangler_core::config::load_config;
use strangler_core::Config;
use strangler_loadbalance::LoadBalanceService;
use strangler_relay::GatewayHandler;

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 应用状态，包含负载均衡服务和请求编排器
#[derive(Clone)]
pub struct AppState {
    pub load_balancer: Arc<LoadBalanceService>,
    pub handler: Arc<GatewayHandler>,
    pub config: Arc<Config>,
    pub started_at: Instant,
    #[cfg(feature = "observability")]
    pub prometheus_metrics: Option<crate::observability::PrometheusMetrics>,
}

impl AppState {
    /// 从环境变量（以及可选的 TOML 文件）加载配置并创建应用状态
    pub async fn new() -> Result<Self> {
        let config = load_config()?;
        Self::from_config(config).await
    }

    /// 用给定配置创建应用状态并启动健康检查
    pub async fn from_config(config: Config) -> Result<Self> {
        let load_balancer = Arc::new(LoadBalanceService::new(config.clone())?);
        load_balancer.start().await?;
        info!("Load balance service started");

        let handler = Arc::new(GatewayHandler::new(load_balancer.clone())?);
        Ok(Self::with_parts(config, load_balancer, handler))
    }

    /// 用已经构建好的组件组装应用状态
    pub fn with_parts(config: Config, load_balancer: Arc<LoadBalanceService>, handler: Arc<GatewayHandler>) -> Self {
        #[cfg(feature = "observability")]
        let prometheus_metrics = match crate::observability::PrometheusMetrics::new() {
            Ok(metrics) => {
                info!("Prometheus metrics initialized");
                Some(metrics)
            }
            Err(e) => {
                error!("Failed to initialize Prometheus metrics: {}", e);
                None
            }
        };

        Self {
            load_balancer,
            handler,
            config: Arc::new(config),
            started_at: Instant::now(),
            #[cfg(feature = "observability")]
            prometheus_metrics,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 停止应用
    pub async fn shutdown(&self) {
        info!("Shutting down application...");
        self.load_balancer.stop().await;
        info!("Application shutdown complete");
    }
}

/// 创建应用路由
pub fn create_app(state: AppState) -> Router {
    let router = create_app_router(state.config.settings.cors_enabled);

    #[cfg(feature = "observability")]
    let router = router.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        crate::observability::metrics_middleware,
    ));

    router.with_state(state)
}

/// 初始化日志：`RUST_LOG` 优先，否则使用配置中的日志级别
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // 测试或嵌入场景下可能已经安装过 subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// 未捕获的 panic 记录后以退出码 1 结束进程
fn install_fatal_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Fatal error: {}", panic_info);
        default_hook(panic_info);
        std::process::exit(1);
    }));
}

/// 启动网关服务器，阻塞直到收到关闭信号
pub async fn start_server() -> Result<()> {
    let loaded = load_config();
    let log_level = loaded
        .as_ref()
        .map(|config| config.settings.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&log_level);
    install_fatal_panic_hook();

    info!("Starting strangler gateway...");
    info!("Build Time: {}", option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"));
    info!("Git Commit: {}", option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match strangler_core::config::get_config_path() {
        Some(path) => info!("Configuration file: {}", path),
        None => info!("CONFIG_PATH not set, using environment and built-in defaults"),
    }

    let settings = &config.settings;
    info!(
        "Migration: enabled={}, {}% of '{}' traffic to {} (mode: {:?})",
        settings.migration.enabled,
        settings.migration.percent,
        settings.migration.group,
        settings.migration.new_service,
        settings.balancer_mode
    );
    if !settings.migration.enabled && !settings.migration_toggle_effective() {
        warn!(
            "GRADUAL_MIGRATION=false has no effect in weighted mode, '{}' still splits by MOVIES_MIGRATION_PERCENT",
            settings.migration.group
        );
    }
    info!(
        "Upstreams: monolith={}:{}, movies={}:{}, events={}:{}",
        settings.upstreams.monolith.host,
        settings.upstreams.monolith.port,
        settings.upstreams.movies.host,
        settings.upstreams.movies.port,
        settings.upstreams.events.host,
        settings.upstreams.events.port
    );
    let bind_addr = settings.listen_addr();

    let app_state = match AppState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            return Err(e);
        }
    };

    let app = create_app(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("Gateway listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /gateway/health - Gateway liveness");
    info!("  GET  /gateway/stats  - Routing and endpoint statistics");
    #[cfg(feature = "observability")]
    info!("  GET  /gateway/metrics - Prometheus metrics");
    info!("  *    /*              - Proxied to the matching upstream service");

    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    app_state.shutdown().await;
    result?;
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
