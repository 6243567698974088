//! 외부 데이터 제공자 추상화.

mod yahoo;

pub use yahoo::YahooProvider;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::record::{NewsRecord, PriceRecord};

/// 가격 조회 날짜 범위 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 가격 조회 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceQuery {
    /// 전체 이력 조회. `period`는 제공자 기간 문자열 ("max", "5y", "6mo" 등)
    Full { period: String },
    /// 날짜 범위 조회
    Range(FetchRange),
}

/// 시장 데이터 제공자.
///
/// 일시적 실패는 `DataError::FetchError`로 반환하며, 재시도 여부는
/// 호출자의 재시도 정책이 결정합니다.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 일봉 가격 이력 조회.
    async fn fetch_prices(&self, ticker: &str, query: PriceQuery) -> Result<Vec<PriceRecord>>;

    /// 최신 뉴스 조회 (최대 `max_items`건).
    async fn fetch_news(&self, ticker: &str, max_items: usize) -> Result<Vec<NewsRecord>>;
}
