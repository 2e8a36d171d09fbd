//! 인증 endpoint.
//!
//! 세션 수명 주기 전체를 담당합니다: signup/login은 토큰 페어를 발급하고
//! refresh token을 레지스트리에 저장하며, logout은 레지스트리 항목을
//! 폐기하고, refresh는 레지스트리와 바이트 일치하는 refresh token에
//! 한해 새 access token만 재발급합니다 (refresh token은 회전하지 않음).
//!
//! 클라이언트가 볼 수 있는 세션 상태 기계:
//! `LoggedOut → LoggedIn (signup/login) → LoggedOut (logout 또는
//! access 만료 후 refresh 실패)`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use shop_core::{normalize_email, NewUser, PublicUser, Role};
use shop_data::SessionStore;

use crate::auth::{
    decode_refresh_token, hash_password, issue_access_token, issue_token_pair, verify_password,
    CurrentUser, JwtError, TokenPair, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::error::{error_reply, ApiErrorResponse};
use crate::metrics::record_auth_event;
use crate::repository::{RepositoryError, UserStore};
use crate::state::AppState;

/// 회원가입 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    /// 이름
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    /// 이메일
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// 비밀번호 (최소 6자)
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

/// 로그인 요청.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// 이메일
    pub email: String,
    /// 비밀번호
    pub password: String,
}

/// 메시지 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// 처리 결과 메시지
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type ErrorReply = (StatusCode, Json<ApiErrorResponse>);

/// 세션 쿠키 생성.
///
/// HttpOnly + SameSite=Strict 고정, Secure는 운영 환경에서만.
fn auth_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(secure);
    cookie.set_max_age(time::Duration::seconds(max_age_secs));
    cookie
}

/// 제거용 쿠키 (경로 일치 필요).
fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookie
}

/// 두 토큰을 쿠키로 설정.
fn set_session_cookies(
    jar: CookieJar,
    pair: &TokenPair,
    state: &AppState,
) -> CookieJar {
    jar.add(auth_cookie(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        state.jwt.access_ttl_minutes * 60,
        state.secure_cookies,
    ))
    .add(auth_cookie(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        state.jwt.refresh_ttl_secs() as i64,
        state.secure_cookies,
    ))
}

/// 토큰 페어 발급 + 레지스트리 저장 + 쿠키 설정.
///
/// 레지스트리 저장 실패는 호출자에게 500으로 전파됩니다.
/// 저장에 실패한 세션은 이후 refresh가 반드시 실패하므로,
/// 성공한 것처럼 보이게 하는 것보다 안전합니다.
async fn establish_session(
    state: &AppState,
    jar: CookieJar,
    user_id: uuid::Uuid,
    role: Role,
) -> Result<CookieJar, ErrorReply> {
    let pair = issue_token_pair(user_id, role, &state.jwt).map_err(|e| {
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
    })?;

    state
        .sessions
        .store(user_id, &pair.refresh_token, state.jwt.refresh_ttl_secs())
        .await
        .map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Failed to store refresh token");
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DEPENDENCY_ERROR",
                "Session registry unavailable",
            )
        })?;

    Ok(set_session_cookies(jar, &pair, state))
}

/// 회원가입.
///
/// 이메일 형식을 검증하고, 동일 이메일이 있으면 거부하며,
/// 비밀번호를 해싱해 저장한 뒤 로그인과 동일하게 동작합니다.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "가입 완료, 세션 쿠키 설정", body = PublicUser),
        (status = 400, description = "잘못된 입력 또는 이메일 중복", body = ApiErrorResponse),
        (status = 500, description = "의존성 장애", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<PublicUser>), ErrorReply> {
    req.validate().map_err(|e| {
        error_reply(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
    })?;

    let email = normalize_email(&req.email);

    let exists = state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| error_reply(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", e.to_string()))?;

    if exists.is_some() {
        record_auth_event("signup", "exists");
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            "USER_EXISTS",
            "User already exists",
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
    })?;

    let user = state
        .users
        .create(NewUser {
            name: req.name,
            email,
            password_hash,
            role: Role::Customer,
        })
        .await
        .map_err(|e| match e {
            // 사전 조회와 insert 사이의 경합은 unique 제약이 잡는다
            RepositoryError::Duplicate => error_reply(
                StatusCode::BAD_REQUEST,
                "USER_EXISTS",
                "User already exists",
            ),
            RepositoryError::Database(msg) => {
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", msg)
            }
        })?;

    let jar = establish_session(&state, jar, user.id, user.role).await?;

    info!(user_id = %user.id, "User signed up");
    record_auth_event("signup", "success");

    Ok((StatusCode::CREATED, jar, Json(user.public())))
}

/// 로그인.
///
/// 알 수 없는 이메일과 잘못된 비밀번호는 같은 응답을 받습니다.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공, 세션 쿠키 설정", body = PublicUser),
        (status = 400, description = "잘못된 자격증명", body = ApiErrorResponse),
        (status = 500, description = "의존성 장애", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, CookieJar, Json<PublicUser>), ErrorReply> {
    let email = normalize_email(&req.email);

    let invalid_credentials = || {
        record_auth_event("login", "invalid_credentials");
        error_reply(
            StatusCode::BAD_REQUEST,
            "INVALID_CREDENTIALS",
            "Invalid email or password",
        )
    };

    let user = state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| error_reply(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", e.to_string()))?
        .ok_or_else(invalid_credentials)?;

    verify_password(&req.password, &user.password_hash).map_err(|_| invalid_credentials())?;

    // 새 로그인은 이전 세션의 refresh token을 덮어쓴다
    // (identity당 라이브 세션 하나)
    let jar = establish_session(&state, jar, user.id, user.role).await?;

    info!(user_id = %user.id, "User logged in");
    record_auth_event("login", "success");

    Ok((StatusCode::OK, jar, Json(user.public())))
}

/// 로그아웃.
///
/// refresh 쿠키가 있으면 레지스트리 항목을 폐기합니다.
/// 폐기 성공 여부와 무관하게 두 쿠키를 항상 제거하므로,
/// 레지스트리 호출이 실패해도 클라이언트는 로컬에서 로그아웃됩니다.
/// 두 번 호출해도 안전합니다.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "로그아웃 완료, 쿠키 제거", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        match decode_refresh_token(cookie.value(), &state.jwt.refresh_secret) {
            Ok(claims) => match state.sessions.revoke(claims.sub).await {
                Ok(revoked) => {
                    info!(user_id = %claims.sub, revoked, "User logged out");
                    record_auth_event("logout", "success");
                }
                Err(e) => {
                    // 쿠키는 그래도 제거한다
                    warn!(user_id = %claims.sub, error = %e, "Failed to revoke session");
                    record_auth_event("logout", "revoke_failed");
                }
            },
            Err(e) => {
                warn!(error = %e, "Logout with undecodable refresh token");
            }
        }
    }

    let jar = jar
        .remove(removal_cookie(ACCESS_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE));

    (jar, Json(MessageResponse::new("Logged out successfully")))
}

/// Access Token 재발급.
///
/// 레지스트리의 항목과 제시된 토큰이 정확히 일치해야 합니다.
/// 이것이 유일한 폐기/재사용 감지 지점입니다. 일치하면 새 access
/// token만 발급하며 refresh token은 회전하지 않습니다.
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    responses(
        (status = 200, description = "재발급 완료, access 쿠키 갱신", body = MessageResponse),
        (status = 401, description = "refresh token 없음/무효/폐기됨", body = ApiErrorResponse),
        (status = 500, description = "의존성 장애", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ErrorReply> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            error_reply(
                StatusCode::UNAUTHORIZED,
                "NO_REFRESH_TOKEN",
                "No refresh token provided",
            )
        })?;

    let claims =
        decode_refresh_token(&presented, &state.jwt.refresh_secret).map_err(|e| match e {
            JwtError::Expired => error_reply(
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Refresh token expired",
            ),
            _ => error_reply(
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid refresh token",
            ),
        })?;

    let stored = state.sessions.fetch(claims.sub).await.map_err(|e| {
        warn!(user_id = %claims.sub, error = %e, "Session registry fetch failed");
        error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DEPENDENCY_ERROR",
            "Session registry unavailable",
        )
    })?;

    // 항목이 없거나 바이트 불일치면 거부 - 서명이 유효해도 폐기된 토큰이다
    if stored.as_deref() != Some(presented.as_str()) {
        record_auth_event("refresh", "revoked");
        return Err(error_reply(
            StatusCode::UNAUTHORIZED,
            "TOKEN_REVOKED",
            "Invalid refresh token",
        ));
    }

    let access_token =
        issue_access_token(claims.sub, claims_role(&state, claims.sub).await?, &state.jwt)
            .map_err(|e| {
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
            })?;

    let jar = jar.add(auth_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token,
        state.jwt.access_ttl_minutes * 60,
        state.secure_cookies,
    ));

    record_auth_event("refresh", "success");

    Ok((jar, Json(MessageResponse::new("Token refreshed successfully"))))
}

/// refresh 시점의 실제 역할 조회.
///
/// refresh claims는 역할을 싣지 않으므로 access token에 넣을 역할은
/// 저장소에서 다시 읽는다 (역할 변경이 다음 refresh에 반영된다).
async fn claims_role(state: &AppState, user_id: uuid::Uuid) -> Result<Role, ErrorReply> {
    state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| error_reply(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", e.to_string()))?
        .map(|user| user.role)
        .ok_or_else(|| {
            error_reply(
                StatusCode::UNAUTHORIZED,
                "USER_NOT_FOUND",
                "Unauthorized - User not found",
            )
        })
}

/// 프로필 조회.
///
/// 유효한 access token이 필요하며, 세션 미들웨어에 의존합니다.
#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "인증된 사용자 프로필", body = PublicUser),
        (status = 401, description = "토큰 없음/만료/무효", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user)
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/profile", get(profile))
}
