//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 모든 API 핸들러에서 공유되는 상태를 관리합니다.
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::sync::Arc;

use shop_data::{RedisSessionRegistry, SessionStore};

use crate::auth::JwtConfig;
use crate::repository::UserStore;

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
/// 저장소들은 trait object로 보관되어 테스트에서 인메모리 구현으로
/// 대체할 수 있습니다.
#[derive(Clone)]
pub struct AppState {
    /// 사용자 저장소 (Credential Store)
    pub users: Arc<dyn UserStore>,

    /// 세션 레지스트리 - identity당 유효한 refresh token 하나
    pub sessions: Arc<dyn SessionStore>,

    /// JWT 서명 설정 (두 시크릿 + 두 만료 시간)
    pub jwt: JwtConfig,

    /// 데이터베이스 연결 풀 (헬스 체크용, 테스트에서는 None)
    pub db_pool: Option<sqlx::PgPool>,

    /// Redis 레지스트리 핸들 (헬스 체크용, 테스트에서는 None)
    pub redis: Option<RedisSessionRegistry>,

    /// 쿠키에 Secure 플래그를 설정할지 여부 (운영 환경에서만)
    pub secure_cookies: bool,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        jwt: JwtConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt,
            db_pool: None,
            redis: None,
            secure_cookies: false,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 데이터베이스 연결 풀 설정 (readiness 체크에 사용).
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Redis 레지스트리 핸들 설정 (readiness 체크에 사용).
    pub fn with_redis(mut self, redis: RedisSessionRegistry) -> Self {
        self.redis = Some(redis);
        self
    }

    /// 운영 환경 여부에 따라 Secure 쿠키 플래그 설정.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }

    /// Redis 연결 상태 확인.
    pub async fn is_redis_healthy(&self) -> bool {
        if let Some(redis) = &self.redis {
            redis.health_check().await.unwrap_or(false)
        } else {
            false
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 실제 DB/Redis 연결 없이 인메모리 저장소로 동작하는 상태를 생성합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use crate::repository::MemoryUserStore;
    use shop_data::MemorySessionRegistry;

    let jwt = JwtConfig {
        access_secret: "test-access-secret-key-minimum-32-ch".to_string(),
        refresh_secret: "test-refresh-secret-key-minimum-32-c".to_string(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
    };

    AppState::new(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionRegistry::new()),
        jwt,
    )
}
