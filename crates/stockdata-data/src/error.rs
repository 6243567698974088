//! 데이터 계층 오류 타입.

use thiserror::Error;

/// 데이터 수집/저장 계층에서 발생하는 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 외부 데이터 소스 연결 실패
    #[error("연결 오류: {0}")]
    ConnectionError(String),

    /// 외부 데이터 소스 조회 실패 (일시적, 재시도 대상)
    #[error("데이터 조회 오류: {0}")]
    FetchError(String),

    /// 응답 파싱 실패
    #[error("파싱 오류: {0}")]
    ParseError(String),

    /// 로컬 저장소 읽기/쓰기 실패
    #[error("저장소 오류: {0}")]
    StorageError(String),
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::StorageError(e.to_string())
    }
}

impl From<polars::error::PolarsError> for DataError {
    fn from(e: polars::error::PolarsError) -> Self {
        DataError::StorageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
