use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use throttle_cache::{
    AppState,
    clock::SystemClock,
    config::Config,
    routes,
    store::{AtomicCounterStore, RedisStore},
};
use tokio::signal;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，非法配置直接终止启动
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置 Redis 存储，进程内只创建一次
    let store = RedisStore::open(&config.redis_url, config.cache_key_prefix.clone())
        .expect("Failed to create Redis client")
        .with_timeouts(config.redis_connect_timeout(), config.redis_operation_timeout());
    let store: Arc<dyn AtomicCounterStore> = Arc::new(store);

    // 连通性探测，失败不影响启动：限流放行、缓存旁路
    match store.ping().await {
        Ok(()) => tracing::info!("Redis store initialized successfully"),
        Err(e) => tracing::error!(error = %e, "Failed to reach Redis store, running degraded"),
    }

    tracing::info!(
        enabled = config.rate_limit_enabled,
        policy = ?config.rate_limit_failure_policy,
        "Rate limiting configured"
    );

    let state = AppState::build(config, store, Arc::new(SystemClock));
    let router = routes::create_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    tracing::info!("Server stopped");
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
