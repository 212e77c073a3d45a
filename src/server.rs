//! HTTP server for stakescope.
//!
//! Serves staking analytics as JSON for a presentation layer, with optional
//! API key authentication, per-IP rate limiting and Prometheus metrics.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use eyre::Result;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AnalyticsError;
use crate::staking::ProcessedStakingData;
use crate::StakingAnalyzer;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Rate limit in requests per minute per IP (0 = no limit)
    pub rate_limit_rpm: u32,
    /// Allowed CORS origins (None/empty = allow any)
    pub allowed_origins: Option<Vec<String>>,
    /// API keys for authentication (None/empty = no auth)
    pub api_keys: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            rate_limit_rpm: 60,
            allowed_origins: None,
            api_keys: None,
        }
    }
}

/// Request for a contract's staking analytics
#[derive(Debug, Deserialize)]
pub struct StakingRequest {
    /// Staking contract address
    #[serde(default)]
    pub contract_address: String,
}

/// Response carrying staking analytics
#[derive(Debug, Serialize)]
pub struct StakingResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProcessedStakingData>,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub event_source: String,
    pub uptime_seconds: u64,
    pub cache_entries: usize,
    pub cache_ttl_seconds: u64,
    pub cache_hit_rate: f64,
}

type IpRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Server state
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub rate_limiters: Mutex<HashMap<IpAddr, Arc<IpRateLimiter>>>,
    pub analyzer: StakingAnalyzer,
}

impl ServerState {
    pub fn new(config: ServerConfig, analyzer: StakingAnalyzer) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            rate_limiters: Mutex::new(HashMap::new()),
            analyzer,
        }
    }

    pub async fn get_rate_limiter(&self, ip: IpAddr) -> Option<Arc<IpRateLimiter>> {
        let rpm = NonZeroU32::new(self.config.rate_limit_rpm)?;
        let mut limiters = self.rate_limiters.lock().await;

        if let Some(limiter) = limiters.get(&ip) {
            return Some(Arc::clone(limiter));
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));
        if limiters.len() >= 10000 {
            tracing::warn!("rate limiter map exceeded 10000 entries, clearing");
            limiters.clear();
        }
        limiters.insert(ip, Arc::clone(&limiter));

        Some(limiter)
    }
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig, analyzer: StakingAnalyzer) -> Result<()> {
    use axum::{
        middleware,
        routing::{get, post},
        Router,
    };

    let prometheus_handle = crate::metrics::install_prometheus_recorder()?;
    let api_keys = crate::auth::key_set(config.api_keys.clone());
    let has_api_keys = !api_keys.is_empty();

    let state = Arc::new(ServerState::new(config.clone(), analyzer));

    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed: Vec<axum::http::HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                    axum::http::HeaderName::from_static("x-api-key"),
                ])
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers(Any),
    };

    let protected = Router::new()
        .route("/api/v1/staking", post(staking_handler))
        .route_layer(middleware::from_fn_with_state(
            api_keys,
            crate::auth::require_api_key,
        ))
        .with_state(state.clone());

    let open = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/metrics",
            get(move || {
                let handle = prometheus_handle.clone();
                async move { handle.render() }
            }),
        )
        .with_state(state.clone());

    let app = Router::new().merge(open).merge(protected).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("stakescope server listening on {}", config.bind_addr);
    tracing::info!("Endpoints: GET /health, GET /metrics, POST /api/v1/staking");
    if config.rate_limit_rpm > 0 {
        tracing::info!(rate_limit_rpm = config.rate_limit_rpm, "rate limiting enabled");
    }
    if has_api_keys {
        tracing::info!("API key authentication enabled");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let cache = state.analyzer.cache();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        event_source: state.analyzer.source_name().to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cache_entries: cache.len().await,
        cache_ttl_seconds: (cache.ttl_ms() / 1000) as u64,
        cache_hit_rate: cache.stats().hit_rate(),
    })
}

async fn staking_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<StakingRequest>,
) -> (StatusCode, Json<StakingResponse>) {
    let start = Instant::now();
    let client_ip = addr.ip();

    if let Some(limiter) = state.get_rate_limiter(client_ip).await {
        if limiter.check().is_err() {
            tracing::warn!(%client_ip, "rate limit exceeded");
            crate::metrics::record_rate_limit_hit();
            return failure(
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Rate limit exceeded. Maximum {} requests per minute.",
                    state.config.rate_limit_rpm
                ),
                start,
            );
        }
    }

    let contract = request.contract_address.trim();
    tracing::info!(%contract, "staking analytics requested");

    match state.analyzer.get_staking_data(contract).await {
        Ok(data) => (
            StatusCode::OK,
            Json(StakingResponse {
                success: true,
                error: None,
                data: Some(data),
                processing_time_ms: start.elapsed().as_millis() as u64,
            }),
        ),
        Err(e) => {
            let status = match e {
                AnalyticsError::InvalidInput => StatusCode::BAD_REQUEST,
                AnalyticsError::SourceFailure { .. } => StatusCode::BAD_GATEWAY,
            };
            tracing::warn!(%contract, kind = e.kind(), error = %e, "analysis failed");
            failure(status, e.to_string(), start)
        }
    }
}

fn failure(
    status: StatusCode,
    error: String,
    start: Instant,
) -> (StatusCode, Json<StakingResponse>) {
    (
        status,
        Json(StakingResponse {
            success: false,
            error: Some(error),
            data: None,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }),
    )
}
