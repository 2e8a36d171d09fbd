//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 생성/검증 로직.
//! 두 토큰은 서로 다른 시크릿으로 서명되며, Session Middleware와
//! refresh 엔드포인트가 동일한 시크릿으로 독립 검증할 수 있습니다.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shop_core::{AuthConfig, Role};

/// JWT 서명 설정.
///
/// 시크릿 검증은 프로세스 시작 시 한 번만 수행됩니다.
/// 이후의 토큰 서명은 실패할 수 없습니다.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Access Token 서명 시크릿
    pub access_secret: String,
    /// Refresh Token 서명 시크릿
    pub refresh_secret: String,
    /// Access Token 만료 시간 (분)
    pub access_ttl_minutes: i64,
    /// Refresh Token 만료 시간 (일)
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    /// 인증 설정에서 JWT 설정을 생성합니다.
    ///
    /// # Errors
    /// 시크릿이 비어 있거나 서로 같으면 `JwtError::Misconfigured`를 반환합니다.
    pub fn new(config: &AuthConfig) -> Result<Self, JwtError> {
        if config.access_token_secret.is_empty() || config.refresh_token_secret.is_empty() {
            return Err(JwtError::Misconfigured(
                "토큰 시크릿이 설정되지 않았습니다".to_string(),
            ));
        }

        if config.access_token_secret == config.refresh_token_secret {
            return Err(JwtError::Misconfigured(
                "access와 refresh 시크릿은 서로 달라야 합니다".to_string(),
            ));
        }

        Ok(Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl_minutes: config.access_token_ttl_minutes,
            refresh_ttl_days: config.refresh_token_ttl_days,
        })
    }

    /// Refresh Token 만료 시간 (초).
    ///
    /// 세션 레지스트리 항목의 TTL로 사용됩니다.
    pub fn refresh_ttl_secs(&self) -> u64 {
        (self.refresh_ttl_days * 24 * 60 * 60).max(0) as u64
    }
}

/// Access Token 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - 사용자 ID
    pub sub: Uuid,
    /// 사용자 역할
    pub role: Role,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    /// 새로운 Access Claims 생성.
    pub fn new(user_id: Uuid, role: Role, expires_in_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expires_in_minutes)).timestamp(),
        }
    }
}

/// Refresh Token 페이로드.
///
/// Access Token 재발급에만 사용됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject - 사용자 ID
    pub sub: Uuid,
    /// Issued At
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
}

impl RefreshClaims {
    /// 새로운 Refresh Claims 생성.
    pub fn new(user_id: Uuid, expires_in_days: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::days(expires_in_days)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
}

/// JWT 토큰 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("유효하지 않은 토큰")]
    Invalid,
    #[error("JWT 설정 오류: {0}")]
    Misconfigured(String),
}

/// Access Token 생성.
pub fn issue_access_token(
    user_id: Uuid,
    role: Role,
    config: &JwtConfig,
) -> Result<String, JwtError> {
    let claims = AccessClaims::new(user_id, role, config.access_ttl_minutes);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(JwtError::from)
}

/// Access Token + Refresh Token 쌍 생성.
///
/// 현재 시각과 두 시크릿/만료 시간만의 순수 함수이며 부수 효과가 없습니다.
/// 레지스트리 저장과 쿠키 설정은 호출자의 몫입니다.
pub fn issue_token_pair(
    user_id: Uuid,
    role: Role,
    config: &JwtConfig,
) -> Result<TokenPair, JwtError> {
    let access_token = issue_access_token(user_id, role, config)?;

    let refresh_claims = RefreshClaims::new(user_id, config.refresh_ttl_days);
    let refresh_token = encode(
        &Header::default(),
        &refresh_claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

// 만료 판정에 여유 시간을 두지 않는다. 15분 윈도우는 정확해야 하고,
// 만료/무효 구분이 클라이언트의 refresh 결정을 좌우한다.
fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;
    validation
}

/// Access Token 디코딩 및 검증.
pub fn decode_access_token(token: &str, secret: &str) -> Result<AccessClaims, JwtError> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &strict_validation(),
    )
    .map(|data| data.claims)
    .map_err(classify_decode_error)
}

/// Refresh Token 디코딩 및 검증.
pub fn decode_refresh_token(token: &str, secret: &str) -> Result<RefreshClaims, JwtError> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &strict_validation(),
    )
    .map(|data| data.claims)
    .map_err(classify_decode_error)
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> JwtError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret-key-for-jwt-testing-32ch".to_string(),
            refresh_secret: "refresh-secret-key-for-jwt-testing-32".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn test_issue_and_decode_access_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_access_token(user_id, Role::Customer, &config).unwrap();
        let claims = decode_access_token(&token, &config.access_secret).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_issue_token_pair() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let pair = issue_token_pair(user_id, Role::Admin, &config).unwrap();

        let access = decode_access_token(&pair.access_token, &config.access_secret).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.role, Role::Admin);

        let refresh = decode_refresh_token(&pair.refresh_token, &config.refresh_secret).unwrap();
        assert_eq!(refresh.sub, user_id);
        assert!(!refresh.jti.is_empty());
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_tokens_use_independent_secrets() {
        let config = test_config();
        let pair = issue_token_pair(Uuid::new_v4(), Role::Customer, &config).unwrap();

        // access 시크릿으로 refresh token 검증 불가, 그 반대도 마찬가지
        assert!(decode_refresh_token(&pair.refresh_token, &config.access_secret).is_err());
        assert!(decode_access_token(&pair.access_token, &config.refresh_secret).is_err());
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let config = test_config();
        let claims = AccessClaims::new(Uuid::new_v4(), Role::Customer, -5);
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        let result = decode_access_token(&token, &config.access_secret);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let config = test_config();
        let result = decode_access_token("not.a.token", &config.access_secret);
        assert!(matches!(result, Err(JwtError::Invalid)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_not_expired() {
        let config = test_config();
        let token = issue_access_token(Uuid::new_v4(), Role::Customer, &config).unwrap();

        let result = decode_access_token(&token, "wrong-secret-key-for-testing-32chars");
        assert!(matches!(result, Err(JwtError::Invalid)));
    }

    #[test]
    fn test_config_rejects_missing_or_equal_secrets() {
        let mut auth = shop_core::AuthConfig {
            access_token_secret: "a".repeat(32),
            refresh_token_secret: "b".repeat(32),
            ..Default::default()
        };
        assert!(JwtConfig::new(&auth).is_ok());

        auth.refresh_token_secret = auth.access_token_secret.clone();
        assert!(matches!(
            JwtConfig::new(&auth),
            Err(JwtError::Misconfigured(_))
        ));

        auth.access_token_secret = String::new();
        assert!(matches!(
            JwtConfig::new(&auth),
            Err(JwtError::Misconfigured(_))
        ));
    }

    #[test]
    fn test_refresh_ttl_secs() {
        let config = test_config();
        assert_eq!(config.refresh_ttl_secs(), 7 * 24 * 60 * 60);
    }
}
