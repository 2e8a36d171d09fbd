//! 클라이언트 에러 타입.
//!
//! refresh 코디네이터가 대기자 전원에게 같은 결과를 전파해야 하므로
//! 모든 변형이 `Clone` 가능해야 합니다.

use thiserror::Error;

/// API 클라이언트 에러.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// 네트워크/전송 계층 에러
    #[error("network error: {0}")]
    Network(String),

    /// 401 응답. `code`가 "TOKEN_EXPIRED"인 경우에만 refresh가 의미 있음
    #[error("unauthorized ({code}): {message}")]
    Unauthorized {
        /// 서버 에러 코드
        code: String,
        /// 서버 에러 메시지
        message: String,
    },

    /// 401 이외의 에러 응답
    #[error("api error ({status}) {code}: {message}")]
    Api {
        /// HTTP 상태 코드
        status: u16,
        /// 서버 에러 코드
        code: String,
        /// 서버 에러 메시지
        message: String,
    },

    /// 응답 본문 해석 실패
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ClientError {
    /// 만료된 access token으로 인한 401인지 확인.
    ///
    /// 이 경우에만 refresh 후 재시도가 의미 있습니다. 그 외의 모든
    /// 실패는 호출자에게 그대로 전파됩니다.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, ClientError::Unauthorized { code, .. } if code == "TOKEN_EXPIRED")
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}
