//! 증분 시장 데이터 수집기.
//!
//! 티커별 가격/뉴스 데이터를 증분 수집해 로컬 parquet 데이터셋으로
//! 유지하고, 스테이징 검증 업서트로 원격 웨어하우스에 동기화합니다.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod stats;
pub mod warehouse;

pub use config::CollectorConfig;
pub use coordinator::run_collection;
pub use error::{CollectorError, Result};
pub use pipeline::{Pipeline, TickerOutcome, TickerReport, TickerStatus};
pub use planner::{local_price_state, plan_fetch, FetchPlan, LocalState};
pub use stats::CollectionStats;
