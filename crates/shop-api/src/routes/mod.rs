//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/auth/signup` - 회원가입
//! - `/auth/login` - 로그인
//! - `/auth/logout` - 로그아웃
//! - `/auth/refresh-token` - Access Token 재발급
//! - `/auth/profile` - 인증된 사용자 프로필

pub mod auth;
pub mod health;

pub use auth::{auth_router, LoginRequest, MessageResponse, SignupRequest};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/auth", auth_router())
}
