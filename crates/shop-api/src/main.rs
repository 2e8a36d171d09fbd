//! 스토어프론트 세션 서비스 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 인증(세션 수명 주기), 헬스 체크, 메트릭 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use shop_api::middleware::{rate_limit_middleware, RateLimitConfig, RateLimitState};
use shop_api::openapi::swagger_ui_router;
use shop_api::repository::PostgresUserRepository;
use shop_api::routes::{auth_router, health_router};
use shop_api::state::AppState;
use shop_api::{metrics_layer, setup_metrics_recorder, JwtConfig};
use shop_core::{init_logging_from_env, AppConfig};
use shop_data::{RedisConfig as RegistryConfig, RedisSessionRegistry};

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// Rate Limit 비활성화 여부 확인.
fn is_rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Auth 라우터의 Rate Limit 설정 로드.
fn rate_limit_config() -> RateLimitConfig {
    let requests_per_minute = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60); // 기본: 분당 60회 (자격증명 추측 방지)

    info!(
        requests_per_minute = requests_per_minute,
        "Rate limiting configured for auth routes"
    );

    RateLimitConfig::new(requests_per_minute)
}

/// CORS 미들웨어 구성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
/// 쿠키 기반 인증이므로 자격 증명 포함은 origin이 고정된 경우에만
/// 허용됩니다 (브라우저가 wildcard + credentials 조합을 거부).
fn cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CORS_ORIGINS").ok().filter(|s| !s.is_empty());

    let allow_origin = match &origins_env {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        None => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(origins_env.is_some())
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    // Auth 라우터 (Rate Limit 조건부 적용)
    let auth_routes = if is_rate_limit_disabled() {
        info!("Rate limiting DISABLED (RATE_LIMIT_DISABLED=true)");
        auth_router()
    } else {
        let rate_limit_state = RateLimitState::new(rate_limit_config());
        auth_router().layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_middleware,
        ))
    };

    let api_router = Router::new()
        .nest("/health", health_router())
        .nest("/auth", auth_routes)
        .with_state(state);

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        // 기타 미들웨어
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // tracing 초기화
    init_logging_from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    info!("Starting storefront session service...");

    // 설정 로드 - 시크릿 누락은 여기서 치명적으로 실패한다.
    // 요청 처리 중에 토큰 서명이 실패하는 일은 없어야 한다.
    let config = AppConfig::load_default().context("설정 로드 실패")?;
    config.validate().context("설정 검증 실패")?;

    let jwt = JwtConfig::new(&config.auth).context("JWT 설정 실패")?;

    // Prometheus 메트릭 레코더 설정
    let metrics_handle = setup_metrics_recorder();
    info!("Prometheus metrics recorder initialized");

    // 데이터베이스 연결 (Credential Store)
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("데이터베이스 연결 실패")?;

    let users = PostgresUserRepository::new(pool.clone());
    users.ensure_schema().await.context("스키마 초기화 실패")?;
    info!("Connected to PostgreSQL");

    // Redis 세션 레지스트리 연결
    let registry = RedisSessionRegistry::connect(&RegistryConfig {
        url: config.redis.url.clone(),
        connection_timeout_secs: config.redis.connection_timeout_secs,
    })
    .await
    .context("Redis 세션 레지스트리 연결 실패")?;

    // AppState 빌드
    let state = Arc::new(
        AppState::new(Arc::new(users), Arc::new(registry.clone()), jwt)
            .with_db_pool(pool)
            .with_redis(registry)
            .with_secure_cookies(config.server.is_production()),
    );

    info!(
        version = %state.version,
        environment = %config.server.environment,
        secure_cookies = state.secure_cookies,
        "Application state initialized"
    );

    // 라우터 생성 및 서버 시작
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("소켓 주소 설정이 유효하지 않습니다. server.host, server.port를 확인하세요.")?;

    let app = create_router(state, metrics_handle);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료를 시작합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
