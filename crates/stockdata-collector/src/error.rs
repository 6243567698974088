//! 수집기 오류 타입.

use std::fmt;

use stockdata_data::DataError;

/// 수집/동기화 파이프라인 오류.
#[derive(Debug)]
pub enum CollectorError {
    /// 웨어하우스 쿼리/연결 오류
    Database(sqlx::Error),

    /// 설정 오류 (즉시 실패)
    Config(String),

    /// 데이터 계층 오류 (조회/저장)
    Data(DataError),

    /// 원격 테이블 스키마 불일치 (대상 테이블은 변경되지 않음)
    Schema { table: String, reason: String },

    /// 스테이징 검증 실패: 기록 요청한 행이 스테이징에 없음
    StagingVerification {
        table: String,
        expected: u64,
        actual: u64,
    },
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Database(e) => write!(f, "Database error: {}", e),
            CollectorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CollectorError::Data(e) => write!(f, "Data error: {}", e),
            CollectorError::Schema { table, reason } => {
                write!(f, "Schema error on {}: {}", table, reason)
            }
            CollectorError::StagingVerification {
                table,
                expected,
                actual,
            } => write!(
                f,
                "Staging verification failed for {}: expected {} rows, found {}",
                table, expected, actual
            ),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectorError::Database(e) => Some(e),
            CollectorError::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CollectorError {
    fn from(e: sqlx::Error) -> Self {
        CollectorError::Database(e)
    }
}

impl From<DataError> for CollectorError {
    fn from(e: DataError) -> Self {
        CollectorError::Data(e)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(e: std::env::VarError) -> Self {
        CollectorError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
