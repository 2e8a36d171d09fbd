//! 세션 서비스 HTTP 클라이언트.
//!
//! 쿠키 저장소에 세션 자격증명을 보관하고, access token이 만료되면
//! 호출자 모르게 재발급 후 원래 요청을 한 번 재시도합니다.

use std::time::Duration;

use futures::FutureExt;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use shop_core::PublicUser;

use crate::error::ClientError;
use crate::refresh::RefreshCoordinator;

/// 서버 에러 본문.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// 메시지 응답.
#[derive(Debug, Deserialize)]
pub struct Message {
    /// 처리 결과 메시지
    pub message: String,
}

#[derive(Debug, Serialize)]
struct SignupPayload<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginPayload<'a> {
    email: &'a str,
    password: &'a str,
}

/// 세션 서비스 API 클라이언트.
///
/// 클라이언트가 보는 세션 상태 기계는
/// `LoggedOut → LoggedIn (signup/login) → LoggedOut (logout 또는
/// refresh 실패)`이며, [`ShopClient::current_user`]로 관찰할 수 있습니다.
pub struct ShopClient {
    http: reqwest::Client,
    base_url: String,
    refresh: RefreshCoordinator,
    user: RwLock<Option<PublicUser>>,
}

impl ShopClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ClientError::Network`를 반환합니다.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh: RefreshCoordinator::new(),
            user: RwLock::new(None),
        })
    }

    /// 현재 로그인된 사용자 (로그아웃 상태면 None).
    pub async fn current_user(&self) -> Option<PublicUser> {
        self.user.read().await.clone()
    }

    /// 회원가입. 성공 시 세션 쿠키가 설정되고 로그인 상태가 됩니다.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let payload = serde_json::to_value(SignupPayload {
            name,
            email,
            password,
        })
        .map_err(|e| ClientError::Parse(e.to_string()))?;

        let user: PublicUser = self
            .request(Method::POST, "/auth/signup", Some(payload))
            .await?;

        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    /// 로그인. 성공 시 세션 쿠키가 설정되고 로그인 상태가 됩니다.
    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let payload = serde_json::to_value(LoginPayload { email, password })
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let user: PublicUser = self
            .request(Method::POST, "/auth/login", Some(payload))
            .await?;

        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    /// 로그아웃. 서버가 레지스트리 항목을 폐기하고 쿠키를 제거합니다.
    pub async fn logout(&self) -> Result<Message, ClientError> {
        let message: Message = self.request(Method::POST, "/auth/logout", None).await?;
        *self.user.write().await = None;
        Ok(message)
    }

    /// 인증된 사용자 프로필 조회.
    pub async fn profile(&self) -> Result<PublicUser, ClientError> {
        self.request(Method::GET, "/auth/profile", None).await
    }

    /// 요청 실행 + 만료 시 단일 재시도.
    ///
    /// 만료로 인한 401이면서 이 호출이 아직 재시도하지 않은 경우에만
    /// refresh에 합류/시작 후 한 번 재시도합니다. 호출별 재시도
    /// 플래그가 무한 루프를 막습니다. 그 외의 모든 실패는 그대로
    /// 전파됩니다.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let mut retried = false;

        loop {
            let response = self.send_raw(method.clone(), path, body.as_ref()).await?;

            match Self::parse_response::<T>(response).await {
                Err(err) if err.is_expired_token() && !retried => {
                    retried = true;
                    debug!(path, "Access token expired, refreshing session");
                    // refresh 실패는 여기서 전파된다 - 재시도 없음
                    self.refresh_session().await?;
                }
                other => return other,
            }
        }
    }

    /// 전송 계층 요청.
    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(ClientError::from)
    }

    /// 프로세스 전역 단일 refresh에 합류하거나 새로 시작합니다.
    ///
    /// refresh가 실패하면 세션 상태를 로그아웃으로 전환하고 실패를
    /// 전파합니다. 자동 재시도는 하지 않습니다.
    async fn refresh_session(&self) -> Result<(), ClientError> {
        let http = self.http.clone();
        let url = format!("{}/auth/refresh-token", self.base_url);

        let result = self
            .refresh
            .run(move || {
                async move {
                    let response = http
                        .post(&url)
                        .send()
                        .await
                        .map_err(ClientError::from)?;

                    ShopClient::parse_response::<Message>(response)
                        .await
                        .map(|_| ())
                }
                .boxed()
            })
            .await;

        if let Err(ref err) = result {
            warn!(error = %err, "Session refresh failed, logging out");
            *self.user.write().await = None;
        }

        result
    }

    /// 응답을 성공 본문 또는 분류된 에러로 변환.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Parse(e.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let (code, message) = match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => (
                body.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                body.message.unwrap_or_default(),
            ),
            Err(_) => (
                "UNKNOWN".to_string(),
                String::from_utf8_lossy(&bytes).to_string(),
            ),
        };

        if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized { code, message })
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_sets_session_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"123e4567-e89b-12d3-a456-426614174000","name":"Jamie","email":"a@b.com","role":"customer"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = ShopClient::new(server.url()).unwrap();
        assert!(client.current_user().await.is_none());

        let user = client.login("a@b.com", "secret1").await.unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(client.current_user().await.unwrap().email, "a@b.com");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_credentials_map_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"INVALID_CREDENTIALS","message":"Invalid email or password"}"#)
            .create_async()
            .await;

        let client = ShopClient::new(server.url()).unwrap();
        let err = client.login("a@b.com", "wrong00").await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Api { status: 400, ref code, .. } if code == "INVALID_CREDENTIALS"
        ));
    }

    #[tokio::test]
    async fn test_non_expiry_401_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        // 무효 토큰 401은 refresh 없이 그대로 전파 - 정확히 1회 호출
        let profile_mock = server
            .mock("GET", "/auth/profile")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"TOKEN_INVALID","message":"Unauthorized - Invalid access token"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .expect(0)
            .create_async()
            .await;

        let client = ShopClient::new(server.url()).unwrap();
        let err = client.profile().await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Unauthorized { ref code, .. } if code == "TOKEN_INVALID"
        ));

        profile_mock.assert_async().await;
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_error_body_falls_back_to_unknown() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/profile")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ShopClient::new(server.url()).unwrap();
        let err = client.profile().await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Api { status: 500, ref code, .. } if code == "UNKNOWN"
        ));
    }
}
