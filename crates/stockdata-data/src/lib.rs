//! 시장 데이터 수집 도메인 라이브러리.
//!
//! 티커별 가격/뉴스 레코드, 외부 제공자 추상화, 재시도 정책,
//! 병합/중복 제거 엔진, 로컬 parquet 저장소를 제공합니다.

pub mod error;
pub mod merge;
pub mod provider;
pub mod record;
pub mod retry;
pub mod storage;

pub use error::{DataError, Result};
pub use merge::{merge_records, MergeOutcome};
pub use provider::{FetchRange, MarketDataProvider, PriceQuery, YahooProvider};
pub use record::{DataKind, DatasetRecord, NewsRecord, PriceRecord};
pub use retry::{retry_fetch, Clock, RetryOutcome, RetryPolicy, TokioClock};
pub use storage::{DatasetSummary, LocalStore};
