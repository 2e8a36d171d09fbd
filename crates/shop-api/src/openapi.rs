//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use shop_core::{PublicUser, Role};

use crate::error::ApiErrorResponse;
use crate::routes::{
    ComponentHealth, ComponentStatus, HealthResponse, LoginRequest, MessageResponse,
    SignupRequest,
};

/// Storefront Session API 문서.
///
/// 모든 엔드포인트와 스키마를 포함하는 OpenAPI 3.0 스펙입니다.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Session API",
        version = "0.1.0",
        description = r#"
# 스토어프론트 세션 서비스 REST API

JWT 쿠키 기반 인증 및 세션 수명 주기 API입니다.

## 인증

`accessToken` 쿠키(15분)와 `refreshToken` 쿠키(7일)를 사용합니다.
두 쿠키 모두 HttpOnly + SameSite=Strict이며, access token이 만료되면
`POST /auth/refresh-token`으로 재발급받을 수 있습니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "Storefront Team", url = "https://github.com/user/shop")
    ),
    servers(
        (url = "http://localhost:5000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 세션 수명 주기 관리")
    ),
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            PublicUser,
            Role,
            SignupRequest,
            LoginRequest,
            MessageResponse,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::signup,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::refresh_token,
        crate::routes::auth::profile,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("Storefront Session API"));

        // 경로 확인
        assert!(json.contains("/health"));
        assert!(json.contains("/auth/signup"));
        assert!(json.contains("/auth/login"));
        assert!(json.contains("/auth/logout"));
        assert!(json.contains("/auth/refresh-token"));
        assert!(json.contains("/auth/profile"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();

        assert!(json.contains("PublicUser"));
        assert!(json.contains("SignupRequest"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("HealthResponse"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
