//! 사용자 도메인 모델.
//!
//! 사용자 identity와 역할 기반 접근 제어를 정의합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 사용자 역할.
///
/// 닫힌 열거형으로, 권한 계층에서 항상 완전 매칭으로 검사됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 일반 고객 - 가입 시 기본 역할
    Customer,
    /// 관리자 - 관리 엔드포인트 접근 가능
    Admin,
}

impl Role {
    /// 관리자 권한 여부.
    pub fn is_admin(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::Customer => false,
        }
    }

    /// 문자열에서 역할 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" => Some(Role::Customer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

/// 사용자 레코드.
///
/// `password_hash`는 저장소 계층 밖으로 절대 직렬화되지 않습니다.
/// API 응답에는 항상 [`PublicUser`] 투영을 사용하세요.
#[derive(Debug, Clone)]
pub struct User {
    /// 사용자 ID
    pub id: Uuid,
    /// 이름
    pub name: String,
    /// 이메일 (소문자, 공백 제거, 유일)
    pub email: String,
    /// Argon2id 해시 (PHC 형식, 솔트 포함)
    pub password_hash: String,
    /// 역할
    pub role: Role,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 수정 시각
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 비밀번호 해시를 제외한 공개 투영 반환.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// 사용자 공개 투영.
///
/// 인증 응답 및 프로필 조회에 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct PublicUser {
    /// 사용자 ID
    pub id: Uuid,
    /// 이름
    pub name: String,
    /// 이메일
    pub email: String,
    /// 역할
    pub role: Role,
}

/// 신규 사용자 생성 요청.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// 이름
    pub name: String,
    /// 이메일 (이미 정규화된 상태여야 함)
    pub email: String,
    /// Argon2id 해시
    pub password_hash: String,
    /// 역할
    pub role: Role,
}

/// 이메일 정규화.
///
/// 저장 및 조회 전에 항상 적용됩니다 (공백 제거 + 소문자).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Jamie".to_string(),
            email: "a@b.com".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), "\"customer\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");

        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("customer"), Some(Role::Customer));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("unknown"), None);
    }

    #[test]
    fn test_role_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }

    #[test]
    fn test_public_projection_strips_hash() {
        let user = sample_user();
        let public = user.public();

        assert_eq!(public.id, user.id);
        assert_eq!(public.email, user.email);

        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
        assert_eq!(normalize_email("a@b.com"), "a@b.com");
    }
}
