#![forbid(unsafe_code)]

use axum::extract::{ConnectInfo, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use turnstile::{InvalidPolicy, PeerAddr, Policy, RateLimitLayer, RequestLimiter};
use turnstile_redis::{RedisConfig, RedisCounterStore, RedisError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Identity-keyed rate limiting front door")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    redis_port: u16,

    /// Redis password (empty for none)
    #[arg(long, env = "REDIS_PASSWORD", default_value = "")]
    redis_password: String,

    /// Bound on each Redis round-trip, in milliseconds (0 disables)
    #[arg(long, env = "REDIS_RESPONSE_TIMEOUT_MS", default_value_t = 0)]
    redis_response_timeout_ms: u64,

    /// Requests allowed per window for IP-keyed clients
    #[arg(long, env = "IP_MAX_REQUESTS_PER_SECOND", default_value_t = 5)]
    ip_max_requests_per_second: u64,

    /// Window duration in seconds for IP-keyed clients
    #[arg(long, env = "IP_BLOCK_DURATION_SECONDS", default_value_t = 60)]
    ip_block_duration_seconds: u64,

    /// Requests allowed per window for token-keyed clients
    #[arg(long, env = "TOKEN_MAX_REQUESTS_PER_SECOND", default_value_t = 10)]
    token_max_requests_per_second: u64,

    /// Window duration in seconds for token-keyed clients
    #[arg(long, env = "TOKEN_BLOCK_DURATION_SECONDS", default_value_t = 60)]
    token_block_duration_seconds: u64,
}

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("invalid rate limit policy: {0}")]
    Policy(#[from] InvalidPolicy),

    #[error("redis connection failed: {0}")]
    Redis(#[from] RedisError),

    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(%err, "server exited with error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let ip_policy = Policy::new(
        cli.ip_max_requests_per_second,
        Duration::from_secs(cli.ip_block_duration_seconds),
    )?;
    let token_policy = Policy::new(
        cli.token_max_requests_per_second,
        Duration::from_secs(cli.token_block_duration_seconds),
    )?;

    let url = redis_url(&cli.redis_host, cli.redis_port, &cli.redis_password);
    let config = RedisConfig {
        response_timeout: (cli.redis_response_timeout_ms > 0)
            .then(|| Duration::from_millis(cli.redis_response_timeout_ms)),
    };
    let store = RedisCounterStore::connect_with_config(&url, config).await?;
    info!(host = %cli.redis_host, port = cli.redis_port, "connected to redis");

    let limiter = RequestLimiter::new(store.clone(), ip_policy, store, token_policy);

    let app = Router::new()
        .route("/", get(hello))
        .layer(RateLimitLayer::new(limiter))
        // Outermost: every request gets its peer address stamped before the
        // rate limit layer looks for it.
        .layer(middleware::from_fn(stamp_peer_addr));

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(addr = %cli.listen, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn hello() -> &'static str {
    "Hello, World!"
}

async fn stamp_peer_addr(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    req.extensions_mut().insert(PeerAddr(addr));
    next.run(req).await
}

fn redis_url(host: &str, port: u16, password: &str) -> String {
    if password.is_empty() {
        format!("redis://{host}:{port}/")
    } else {
        format!("redis://:{password}@{host}:{port}/")
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to install shutdown signal handler");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_without_password() {
        assert_eq!(redis_url("127.0.0.1", 6379, ""), "redis://127.0.0.1:6379/");
    }

    #[test]
    fn redis_url_with_password() {
        assert_eq!(redis_url("cache", 6380, "hunter2"), "redis://:hunter2@cache:6380/");
    }
}
