//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 캐시 연결 오류
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// 캐시 작업 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 데이터 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, DataError>;

impl From<DataError> for shop_core::ShopError {
    fn from(err: DataError) -> Self {
        shop_core::ShopError::Cache(err.to_string())
    }
}
