//! 스토어프론트 세션 서비스 REST API.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 인증 REST API (signup/login/logout/refresh/profile)
//! - 쿠키 기반 JWT 세션 미들웨어
//! - Redis 세션 레지스트리 연동
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰 발급/검증, 비밀번호 해싱, 세션 미들웨어
//! - [`repository`]: 사용자 저장소
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    hash_password, verify_password, AccessClaims, AdminUser, AuthError, CurrentUser, JwtConfig,
    RefreshClaims, TokenPair,
};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use repository::UserStore;
pub use routes::*;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
