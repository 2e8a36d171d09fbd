//! 쿠키 기반 세션 미들웨어.
//!
//! Axum 핸들러에서 사용할 인증 추출기.
//! 요청당 상태 기계: 쿠키 없음 → 거부, 서명/형식 불량 → 거부(invalid),
//! 만료 → 거부(expired), 사용자 없음 → 거부, 그 외 → identity 첨부.
//!
//! 이 경로는 세션 상태에 대해 읽기 전용입니다. 레지스트리를 변경하거나
//! 새 토큰을 발급하지 않습니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use shop_core::{PublicUser, Role};

use super::jwt::{decode_access_token, JwtError};
use crate::error::ApiErrorResponse;
use crate::repository::UserStore;
use crate::state::AppState;

/// Access Token 쿠키 이름.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Refresh Token 쿠키 이름.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// 인증 에러.
///
/// `TokenExpired`와 `TokenInvalid`는 응답 코드로 구분됩니다.
/// 만료된 경우에만 클라이언트의 refresh 시도가 의미 있습니다.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized - No access token provided")]
    MissingToken,
    #[error("Unauthorized - Access token expired")]
    TokenExpired,
    #[error("Unauthorized - Invalid access token")]
    TokenInvalid,
    #[error("Unauthorized - User not found")]
    UserNotFound,
    #[error("Access denied - Admin only")]
    Forbidden,
    #[error("Service dependency unavailable")]
    Dependency(String),
}

impl AuthError {
    /// 에러 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "NO_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::Dependency(_) => "DEPENDENCY_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Dependency(ref detail) = self {
            tracing::error!(detail = %detail, "Auth dependency failure");
        }

        let body = Json(ApiErrorResponse::simple(self.code(), self.to_string()));
        (self.status(), body).into_response()
    }
}

/// 인증된 사용자 추출기.
///
/// Access Token 쿠키를 검증하고 사용자를 조회하여
/// 비밀번호 해시를 제외한 공개 투영을 핸들러에 전달합니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn profile(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
///     Json(user)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(AuthError::MissingToken)?;

        let claims =
            decode_access_token(&token, &state.jwt.access_secret).map_err(|e| match e {
                JwtError::Expired => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(|e| AuthError::Dependency(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        Ok(CurrentUser(user.public()))
    }
}

/// 관리자 권한을 요구하는 추출기.
///
/// 역할은 닫힌 열거형으로 완전 매칭됩니다.
#[derive(Debug, Clone)]
pub struct AdminUser(pub PublicUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        match user.role {
            Role::Admin => Ok(AdminUser(user)),
            Role::Customer => Err(AuthError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::jwt::{issue_access_token, AccessClaims};
    use crate::state::create_test_state;
    use shop_core::NewUser;

    async fn seed_user(state: &AppState, role: Role) -> Uuid {
        let user = state
            .users
            .create(NewUser {
                name: "Test".to_string(),
                email: format!("{}@test.com", Uuid::new_v4()),
                password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
                role,
            })
            .await
            .unwrap();
        user.id
    }

    fn protected_app(state: Arc<AppState>) -> Router {
        async fn handler(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
            Json(user)
        }
        async fn admin_handler(AdminUser(user): AdminUser) -> Json<PublicUser> {
            Json(user)
        }

        Router::new()
            .route("/profile", get(handler))
            .route("/admin", get(admin_handler))
            .with_state(state)
    }

    async fn get_with_cookie(app: Router, path: &str, cookie: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }

        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let state = Arc::new(create_test_state());
        let (status, body) = get_with_cookie(protected_app(state), "/profile", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("NO_TOKEN"));
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let state = Arc::new(create_test_state());
        let (status, body) = get_with_cookie(
            protected_app(state),
            "/profile",
            Some(format!("{}=garbage.token.here", ACCESS_TOKEN_COOKIE)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("TOKEN_INVALID"));
    }

    #[tokio::test]
    async fn test_expired_token_distinguished() {
        let state = Arc::new(create_test_state());
        let user_id = seed_user(&state, Role::Customer).await;

        // 과거에 만료된 토큰을 직접 서명
        let claims = AccessClaims::new(user_id, Role::Customer, -5);
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(state.jwt.access_secret.as_bytes()),
        )
        .unwrap();

        let (status, body) = get_with_cookie(
            protected_app(state),
            "/profile",
            Some(format!("{}={}", ACCESS_TOKEN_COOKIE, token)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("TOKEN_EXPIRED"));
    }

    #[tokio::test]
    async fn test_valid_token_unknown_user_rejected() {
        let state = Arc::new(create_test_state());
        let token =
            issue_access_token(Uuid::new_v4(), Role::Customer, &state.jwt).unwrap();

        let (status, body) = get_with_cookie(
            protected_app(state),
            "/profile",
            Some(format!("{}={}", ACCESS_TOKEN_COOKIE, token)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("USER_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let state = Arc::new(create_test_state());
        let user_id = seed_user(&state, Role::Customer).await;
        let token = issue_access_token(user_id, Role::Customer, &state.jwt).unwrap();

        let (status, body) = get_with_cookie(
            protected_app(state),
            "/profile",
            Some(format!("{}={}", ACCESS_TOKEN_COOKIE, token)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&user_id.to_string()));
        // 해시는 절대 응답에 나타나지 않음
        assert!(!body.contains("argon2"));
    }

    #[tokio::test]
    async fn test_admin_route_rejects_customer() {
        let state = Arc::new(create_test_state());
        let user_id = seed_user(&state, Role::Customer).await;
        let token = issue_access_token(user_id, Role::Customer, &state.jwt).unwrap();

        let (status, body) = get_with_cookie(
            protected_app(state),
            "/admin",
            Some(format!("{}={}", ACCESS_TOKEN_COOKIE, token)),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("FORBIDDEN"));
    }

    #[tokio::test]
    async fn test_admin_route_allows_admin() {
        let state = Arc::new(create_test_state());
        let user_id = seed_user(&state, Role::Admin).await;
        let token = issue_access_token(user_id, Role::Admin, &state.jwt).unwrap();

        let (status, _) = get_with_cookie(
            protected_app(state),
            "/admin",
            Some(format!("{}={}", ACCESS_TOKEN_COOKIE, token)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }
}
