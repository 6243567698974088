//! 티커 단위 수집 파이프라인.
//!
//! 한 티커의 처리 흐름은 엄격히 순차적입니다:
//! 계획 → 조회(재시도) → 병합 → 로컬 저장(원자적) → 원격 동기화(선택).
//! 각 단계의 진행 상태를 리포트에 남기고, 실패는 해당 티커만 중단시킵니다.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use stockdata_data::{
    merge_records, retry_fetch, Clock, DataKind, FetchRange, LocalStore, MarketDataProvider,
    PriceQuery, RetryOutcome, RetryPolicy, TokioClock,
};

use crate::config::CollectorConfig;
use crate::planner::{local_price_state, plan_fetch, FetchPlan};
use crate::warehouse::{sync_dataset, SyncPhase, TableSchema, WarehouseSession};

/// 파이프라인 진행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickerStatus {
    Pending,
    Fetching,
    Merging,
    LocalSaved,
    Staging,
    Upserting,
    RemoteSynced,
    Failed,
}

/// 티커 처리 결과 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickerOutcome {
    /// 신규 데이터를 저장함
    Success,
    /// 신규 데이터 없음 (오류 아님)
    NoData,
    /// 처리 실패
    Failed,
}

/// 티커별 처리 리포트.
#[derive(Debug, Clone, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub kind: DataKind,
    /// 마지막으로 도달한 단계
    pub status: TickerStatus,
    pub outcome: TickerOutcome,
    /// 제공자에서 받은 레코드 수
    pub fetched: usize,
    /// 병합으로 새로 추가된 레코드 수
    pub records_added: usize,
    /// 병합에서 제거된 중복 수
    pub duplicates_removed: usize,
    /// 저장 후 로컬 데이터셋 크기
    pub local_total: usize,
    /// 원격 업서트로 추가된 행 수
    pub remote_rows_added: i64,
    pub error: Option<String>,
}

impl TickerReport {
    fn new(ticker: &str, kind: DataKind) -> Self {
        Self {
            ticker: ticker.to_string(),
            kind,
            status: TickerStatus::Pending,
            outcome: TickerOutcome::NoData,
            fetched: 0,
            records_added: 0,
            duplicates_removed: 0,
            local_total: 0,
            remote_rows_added: 0,
            error: None,
        }
    }

    fn fail(mut self, error: impl std::fmt::Display) -> Self {
        self.status = TickerStatus::Failed;
        self.outcome = TickerOutcome::Failed;
        self.error = Some(error.to_string());
        self
    }
}

/// 티커 파이프라인 실행기.
pub struct Pipeline {
    pub provider: Arc<dyn MarketDataProvider>,
    pub store: Arc<LocalStore>,
    /// None이면 로컬 저장까지만 수행
    pub session: Option<Arc<WarehouseSession>>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
    pub backfill_cutoff: NaiveDate,
    /// 전체 이력 수집 시 제공자에 전달할 기간 문자열
    pub fetch_period: String,
    pub news_max_items: usize,
    pub price_table: String,
    pub news_table: String,
}

impl Pipeline {
    pub fn from_config(
        config: &CollectorConfig,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<LocalStore>,
        session: Option<Arc<WarehouseSession>>,
    ) -> Self {
        Self {
            provider,
            store,
            session,
            clock: Arc::new(TokioClock),
            retry: config.retry_policy(),
            backfill_cutoff: config.backfill_cutoff,
            fetch_period: config.fetch_period.clone(),
            news_max_items: config.news_max_items,
            price_table: config.price_table.clone(),
            news_table: config.news_table.clone(),
        }
    }

    /// 한 티커의 한 데이터 종류 처리.
    pub async fn run_ticker(&self, ticker: &str, kind: DataKind, forced: bool) -> TickerReport {
        match kind {
            DataKind::PriceHistory => self.run_prices(ticker, forced).await,
            DataKind::News => self.run_news(ticker).await,
        }
    }

    async fn run_prices(&self, ticker: &str, forced: bool) -> TickerReport {
        let mut report = TickerReport::new(ticker, DataKind::PriceHistory);

        let existing = match self.store.load_prices(ticker) {
            Ok(records) => records,
            Err(e) => return report.fail(e),
        };

        let plan = plan_fetch(
            local_price_state(&existing),
            forced,
            self.backfill_cutoff,
            Utc::now().date_naive(),
        );

        let query = match plan {
            FetchPlan::Skip => {
                info!(ticker = ticker, "이미 최신 상태, 수집 생략");
                return report;
            }
            FetchPlan::Full => {
                info!(
                    ticker = ticker,
                    forced = forced,
                    period = %self.fetch_period,
                    "전체 이력 수집"
                );
                PriceQuery::Full {
                    period: self.fetch_period.clone(),
                }
            }
            FetchPlan::Range { start, end } => {
                info!(ticker = ticker, start = %start, end = %end, "증분 수집");
                PriceQuery::Range(FetchRange { start, end })
            }
        };

        report.status = TickerStatus::Fetching;
        let label = format!("{} 가격 수집", ticker);
        let fetched = match retry_fetch(&self.retry, self.clock.as_ref(), &label, || {
            self.provider.fetch_prices(ticker, query.clone())
        })
        .await
        {
            RetryOutcome::Ok(records) => records,
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                return report.fail(format!("재시도 {}회 소진: {}", attempts, last_error));
            }
        };

        report.fetched = fetched.len();
        if fetched.is_empty() {
            info!(ticker = ticker, "제공자가 반환한 신규 데이터 없음");
            return report;
        }

        report.status = TickerStatus::Merging;
        let (merged, outcome) = merge_records(existing, fetched);
        report.records_added = outcome.records_added;
        report.duplicates_removed = outcome.duplicates_removed;
        report.local_total = merged.len();

        if let Err(e) = self.store.save_prices(ticker, &merged) {
            return report.fail(e);
        }
        report.status = TickerStatus::LocalSaved;
        report.outcome = TickerOutcome::Success;
        info!(
            ticker = ticker,
            added = outcome.records_added,
            duplicates_removed = outcome.duplicates_removed,
            total = merged.len(),
            "가격 로컬 저장 완료"
        );

        if let Some(session) = &self.session {
            let schema = TableSchema::price_history(self.price_table.clone());
            let mut status = report.status;
            let sync_result = sync_dataset(session.as_ref(), &schema, &merged, &mut |phase| {
                status = match phase {
                    SyncPhase::Upsert => TickerStatus::Upserting,
                    SyncPhase::Cleanup => status,
                    _ => TickerStatus::Staging,
                };
            })
            .await;
            report.status = status;

            match sync_result {
                Ok(sync_report) => {
                    report.status = TickerStatus::RemoteSynced;
                    report.remote_rows_added = sync_report.rows_added;
                }
                Err(e) => {
                    warn!(ticker = ticker, error = %e, "가격 원격 동기화 실패");
                    return report.fail(e);
                }
            }
        }

        report
    }

    async fn run_news(&self, ticker: &str) -> TickerReport {
        let mut report = TickerReport::new(ticker, DataKind::News);

        let existing = match self.store.load_news(ticker) {
            Ok(records) => records,
            Err(e) => return report.fail(e),
        };

        report.status = TickerStatus::Fetching;
        let label = format!("{} 뉴스 수집", ticker);
        let fetched = match retry_fetch(&self.retry, self.clock.as_ref(), &label, || {
            self.provider.fetch_news(ticker, self.news_max_items)
        })
        .await
        {
            RetryOutcome::Ok(records) => records,
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                return report.fail(format!("재시도 {}회 소진: {}", attempts, last_error));
            }
        };

        report.fetched = fetched.len();
        if fetched.is_empty() {
            info!(ticker = ticker, "신규 뉴스 없음");
            return report;
        }

        report.status = TickerStatus::Merging;
        let (merged, outcome) = merge_records(existing, fetched);
        report.records_added = outcome.records_added;
        report.duplicates_removed = outcome.duplicates_removed;
        report.local_total = merged.len();

        if let Err(e) = self.store.save_news(ticker, &merged) {
            return report.fail(e);
        }
        report.status = TickerStatus::LocalSaved;
        report.outcome = TickerOutcome::Success;
        info!(
            ticker = ticker,
            added = outcome.records_added,
            total = merged.len(),
            "뉴스 로컬 저장 완료"
        );

        if let Some(session) = &self.session {
            let schema = TableSchema::news(self.news_table.clone());
            let mut status = report.status;
            let sync_result = sync_dataset(session.as_ref(), &schema, &merged, &mut |phase| {
                status = match phase {
                    SyncPhase::Upsert => TickerStatus::Upserting,
                    SyncPhase::Cleanup => status,
                    _ => TickerStatus::Staging,
                };
            })
            .await;
            report.status = status;

            match sync_result {
                Ok(sync_report) => {
                    report.status = TickerStatus::RemoteSynced;
                    report.remote_rows_added = sync_report.rows_added;
                }
                Err(e) => {
                    warn!(ticker = ticker, error = %e, "뉴스 원격 동기화 실패");
                    return report.fail(e);
                }
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use stockdata_data::{DataError, NewsRecord, PriceRecord};
    use uuid::Uuid;

    pub(crate) struct TempDir(pub PathBuf);

    impl TempDir {
        pub fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("stockdata-collector-test-{}", Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    /// 대기 없이 즉시 반환하는 테스트 시계.
    pub(crate) struct NoopClock;

    #[async_trait]
    impl Clock for NoopClock {
        async fn sleep(&self, _duration: Duration) {}
    }

    /// 티커별로 실패/성공을 구성할 수 있는 스텁 제공자.
    pub(crate) struct StubProvider {
        pub rows_per_ticker: usize,
        pub failing: HashSet<String>,
        pub seen_queries: Mutex<Vec<PriceQuery>>,
    }

    impl StubProvider {
        pub fn new(rows_per_ticker: usize, failing: &[&str]) -> Self {
            Self {
                rows_per_ticker,
                failing: failing.iter().map(|s| s.to_string()).collect(),
                seen_queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        async fn fetch_prices(
            &self,
            ticker: &str,
            query: PriceQuery,
        ) -> stockdata_data::Result<Vec<PriceRecord>> {
            self.seen_queries.lock().unwrap().push(query);
            if self.failing.contains(ticker) {
                return Err(DataError::FetchError(format!("{} 조회 실패", ticker)));
            }
            let base: NaiveDate = "2024-01-01".parse().unwrap();
            Ok((0..self.rows_per_ticker)
                .map(|i| PriceRecord {
                    ticker: ticker.to_string(),
                    date: base + chrono::Duration::days(i as i64),
                    open: Some(10.0 + i as f64),
                    high: Some(11.0 + i as f64),
                    low: Some(9.0 + i as f64),
                    close: Some(10.5 + i as f64),
                    adj_close: Some(10.5 + i as f64),
                    volume: Some(1_000),
                    download_timestamp: Utc::now(),
                })
                .collect())
        }

        async fn fetch_news(
            &self,
            ticker: &str,
            max_items: usize,
        ) -> stockdata_data::Result<Vec<NewsRecord>> {
            if self.failing.contains(ticker) {
                return Err(DataError::FetchError(format!("{} 뉴스 조회 실패", ticker)));
            }
            Ok((0..max_items.min(3))
                .map(|i| NewsRecord {
                    ticker: ticker.to_string(),
                    id: format!("{}-{}", ticker, i),
                    title: format!("기사 {}", i),
                    summary: None,
                    description: None,
                    publisher: Some("Stub".to_string()),
                    link: None,
                    publish_time: Utc::now(),
                    display_time: None,
                    content_type: Some("STORY".to_string()),
                    thumbnail_url: None,
                    is_premium: false,
                    is_hosted: false,
                    download_timestamp: Utc::now(),
                })
                .collect())
        }
    }

    pub(crate) fn test_pipeline(
        provider: Arc<dyn MarketDataProvider>,
        data_dir: &PathBuf,
    ) -> Pipeline {
        Pipeline {
            provider,
            store: Arc::new(LocalStore::new(data_dir)),
            session: None,
            clock: Arc::new(NoopClock),
            retry: RetryPolicy::default(),
            backfill_cutoff: "2000-01-01".parse().unwrap(),
            fetch_period: "max".to_string(),
            news_max_items: 3,
            price_table: "STOCK_PRICE_HISTORY".to_string(),
            news_table: "STOCK_NEWS".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_fetch_saves_all_rows_locally() {
        let dir = TempDir::new();
        let provider = Arc::new(StubProvider::new(10, &[]));
        let pipeline = test_pipeline(provider, &dir.0);

        let report = pipeline
            .run_ticker("AAPL", DataKind::PriceHistory, false)
            .await;

        assert_eq!(report.outcome, TickerOutcome::Success);
        assert_eq!(report.status, TickerStatus::LocalSaved);
        assert_eq!(report.fetched, 10);
        assert_eq!(report.records_added, 10);
        assert_eq!(report.local_total, 10);

        let saved = pipeline.store.load_prices("AAPL").unwrap();
        assert_eq!(saved.len(), 10);
    }

    #[tokio::test]
    async fn test_rerun_with_overlap_adds_nothing() {
        // 같은 데이터를 두 번 수집해도 로컬 데이터셋은 변하지 않는다
        let dir = TempDir::new();
        let provider = Arc::new(StubProvider::new(10, &[]));
        let mut pipeline = test_pipeline(provider, &dir.0);
        // 백필 자가 복구 조건을 피하기 위해 기준일을 과거 데이터 앞으로
        pipeline.backfill_cutoff = "2030-01-01".parse().unwrap();

        let first = pipeline
            .run_ticker("AAPL", DataKind::PriceHistory, true)
            .await;
        assert_eq!(first.records_added, 10);

        let second = pipeline
            .run_ticker("AAPL", DataKind::PriceHistory, true)
            .await;
        assert_eq!(second.outcome, TickerOutcome::Success);
        assert_eq!(second.records_added, 0);
        assert_eq!(second.duplicates_removed, 10);
        assert_eq!(second.local_total, 10);
    }

    #[tokio::test]
    async fn test_full_fetch_passes_configured_period() {
        let dir = TempDir::new();
        let provider = Arc::new(StubProvider::new(5, &[]));
        let mut pipeline = test_pipeline(provider.clone(), &dir.0);
        pipeline.fetch_period = "5y".to_string();

        let report = pipeline
            .run_ticker("AAPL", DataKind::PriceHistory, true)
            .await;
        assert_eq!(report.outcome, TickerOutcome::Success);

        let queries = provider.seen_queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0],
            PriceQuery::Full {
                period: "5y".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_ticker() {
        let dir = TempDir::new();
        let provider = Arc::new(StubProvider::new(10, &["BAD"]));
        let pipeline = test_pipeline(provider, &dir.0);

        let report = pipeline
            .run_ticker("BAD", DataKind::PriceHistory, false)
            .await;

        assert_eq!(report.outcome, TickerOutcome::Failed);
        assert_eq!(report.status, TickerStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("재시도 3회 소진"));
        // 실패한 티커는 로컬에 아무것도 남기지 않는다
        assert!(pipeline.store.load_prices("BAD").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_news_pipeline_merges_by_article_id() {
        let dir = TempDir::new();
        let provider = Arc::new(StubProvider::new(0, &[]));
        let pipeline = test_pipeline(provider, &dir.0);

        let first = pipeline.run_ticker("AAPL", DataKind::News, false).await;
        assert_eq!(first.outcome, TickerOutcome::Success);
        assert_eq!(first.records_added, 3);

        let second = pipeline.run_ticker("AAPL", DataKind::News, false).await;
        assert_eq!(second.records_added, 0);
        assert_eq!(second.duplicates_removed, 3);
        assert_eq!(second.local_total, 3);
    }
}
