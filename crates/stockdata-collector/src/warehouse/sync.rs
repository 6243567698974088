//! 스테이징 기반 검증 업서트.
//!
//! 동기화 한 번은 다음 단계를 순서대로 거칩니다:
//!
//! ```text
//! SchemaCheck → StageCreate → StageWrite → StageVerify → Upsert → Cleanup
//! ```
//!
//! 스테이징 테이블은 호출마다 고유 접미사를 붙여 새로 만들고, 성공이든
//! 실패든 마지막에 반드시 제거합니다. 비어 있지 않은 배치가 스테이징에
//! 한 행도 기록되지 않았으면 업서트 전에 실패시킵니다 (무증상 쓰기 유실
//! 방지). 원격 중복 제거는 키 기반 업서트가 유일한 수단입니다.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use stockdata_data::{NewsRecord, PriceRecord};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CollectorError, Result};
use crate::warehouse::schema::TableSchema;
use crate::warehouse::session::WarehouseSession;

/// 스테이징 배치 삽입 단위.
const BATCH_SIZE: usize = 500;

/// 동기화 진행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    SchemaCheck,
    StageCreate,
    StageWrite,
    StageVerify,
    Upsert,
    Cleanup,
}

/// 동기화 결과.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReport {
    /// 스테이징에 기록된 행 수
    pub staged: u64,
    /// 업서트 전 대상 테이블 행 수
    pub rows_before: i64,
    /// 업서트 후 대상 테이블 행 수
    pub rows_after: i64,
    /// 순수 추가 행 수 (after - before)
    pub rows_added: i64,
}

/// 스테이징 테이블에 바인딩 가능한 레코드.
pub trait StageRecord: Send + Sync {
    fn push_tuple(&self, b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>);
}

impl StageRecord for PriceRecord {
    fn push_tuple(&self, b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.ticker.clone())
            .push_bind(self.date)
            .push_bind(self.open)
            .push_bind(self.high)
            .push_bind(self.low)
            .push_bind(self.close)
            .push_bind(self.adj_close)
            .push_bind(self.volume)
            .push_bind(self.download_timestamp);
    }
}

impl StageRecord for NewsRecord {
    fn push_tuple(&self, b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.ticker.clone())
            .push_bind(self.id.clone())
            .push_bind(self.title.clone())
            .push_bind(self.summary.clone())
            .push_bind(self.description.clone())
            .push_bind(self.publisher.clone())
            .push_bind(self.link.clone())
            .push_bind(self.publish_time)
            .push_bind(self.display_time)
            .push_bind(self.content_type.clone())
            .push_bind(self.thumbnail_url.clone())
            .push_bind(self.is_premium)
            .push_bind(self.is_hosted)
            .push_bind(self.download_timestamp);
    }
}

/// 동기화가 웨어하우스에 요구하는 실행 표면.
///
/// 실제 구현은 `WarehouseSession`이며, 검증/정리 경로 테스트는
/// 호출을 기록하는 스텁으로 대체한다.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// 대상 테이블 존재/스키마 보장.
    async fn ensure_table(&self, schema: &TableSchema) -> Result<()>;

    /// 단일 SQL 문 실행 (스테이징 생성/제거, 업서트).
    async fn execute(&self, sql: &str) -> Result<()>;

    /// 레코드 청크를 스테이징 테이블에 삽입.
    async fn stage_batch(
        &self,
        staging: &str,
        schema: &TableSchema,
        chunk: &[&dyn StageRecord],
    ) -> Result<()>;

    /// 테이블 행 수 조회.
    async fn table_row_count(&self, table: &str) -> Result<i64>;
}

#[async_trait]
impl SyncExecutor for WarehouseSession {
    async fn ensure_table(&self, schema: &TableSchema) -> Result<()> {
        WarehouseSession::ensure_table(self, schema).await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(self.pool()).await?;
        Ok(())
    }

    async fn stage_batch(
        &self,
        staging: &str,
        schema: &TableSchema,
        chunk: &[&dyn StageRecord],
    ) -> Result<()> {
        let columns = schema.column_names().join(", ");
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", staging, columns));
        qb.push_values(chunk.iter(), |mut b, record| {
            record.push_tuple(&mut b);
        });
        qb.build().execute(self.pool()).await?;
        Ok(())
    }

    async fn table_row_count(&self, table: &str) -> Result<i64> {
        WarehouseSession::table_row_count(self, table).await
    }
}

/// 호출별 고유 스테이징 테이블 이름.
pub fn staging_table_name(table: &str) -> String {
    format!("{}_staging_{}", table, Uuid::new_v4().simple())
}

/// 키 기반 업서트 문. 키가 겹치면 비키 컬럼을 갱신한다.
///
/// 입력 레코드는 병합 엔진이 이미 키 기준으로 중복 제거한 상태여야 한다
/// (하나의 INSERT 안에서 같은 키를 두 번 갱신하면 Postgres가 거부).
pub fn upsert_sql(schema: &TableSchema, staging_table: &str) -> String {
    let columns = schema.column_names().join(", ");
    let updates: Vec<String> = schema
        .non_key_columns()
        .iter()
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} ON CONFLICT ({}) DO UPDATE SET {}",
        schema.table,
        columns,
        columns,
        staging_table,
        schema.key.join(", "),
        updates.join(", ")
    )
}

/// 레코드 배치를 스테이징 경유로 대상 테이블에 업서트.
///
/// 실패는 이 호출만 중단시키며 대상 테이블은 업서트 전까지 변경되지
/// 않는다. 진행 단계는 `on_phase` 콜백으로 통지한다.
pub async fn sync_dataset<R: StageRecord>(
    executor: &dyn SyncExecutor,
    schema: &TableSchema,
    records: &[R],
    on_phase: &mut (dyn FnMut(SyncPhase) + Send),
) -> Result<SyncReport> {
    on_phase(SyncPhase::SchemaCheck);
    executor.ensure_table(schema).await?;

    if records.is_empty() {
        let rows = executor.table_row_count(&schema.table).await?;
        return Ok(SyncReport {
            staged: 0,
            rows_before: rows,
            rows_after: rows,
            rows_added: 0,
        });
    }

    on_phase(SyncPhase::StageCreate);
    let staging = staging_table_name(&schema.table);
    executor.execute(&schema.create_staging_sql(&staging)).await?;

    let result = stage_and_upsert(executor, schema, &staging, records, on_phase).await;

    // 스테이징 테이블은 성공/실패와 무관하게 제거
    on_phase(SyncPhase::Cleanup);
    if let Err(e) = executor
        .execute(&format!("DROP TABLE IF EXISTS {}", staging))
        .await
    {
        warn!(staging = %staging, error = %e, "스테이징 테이블 제거 실패");
    }

    result
}

async fn stage_and_upsert<R: StageRecord>(
    executor: &dyn SyncExecutor,
    schema: &TableSchema,
    staging: &str,
    records: &[R],
    on_phase: &mut (dyn FnMut(SyncPhase) + Send),
) -> Result<SyncReport> {
    on_phase(SyncPhase::StageWrite);
    for chunk in records.chunks(BATCH_SIZE) {
        let refs: Vec<&dyn StageRecord> = chunk.iter().map(|r| r as &dyn StageRecord).collect();
        executor.stage_batch(staging, schema, &refs).await?;
    }

    on_phase(SyncPhase::StageVerify);
    let staged = executor.table_row_count(staging).await?;
    if staged == 0 {
        return Err(CollectorError::StagingVerification {
            table: schema.table.clone(),
            expected: records.len() as u64,
            actual: 0,
        });
    }
    if staged as usize != records.len() {
        warn!(
            table = %schema.table,
            expected = records.len(),
            staged = staged,
            "스테이징 행 수가 기대와 다름"
        );
    }

    let rows_before = executor.table_row_count(&schema.table).await?;

    on_phase(SyncPhase::Upsert);
    executor.execute(&upsert_sql(schema, staging)).await?;

    let rows_after = executor.table_row_count(&schema.table).await?;
    let rows_added = rows_after - rows_before;

    info!(
        table = %schema.table,
        staged = staged,
        rows_before = rows_before,
        rows_after = rows_after,
        rows_added = rows_added,
        "업서트 완료"
    );

    Ok(SyncReport {
        staged: staged as u64,
        rows_before,
        rows_after,
        rows_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::schema::valid_identifier;
    use chrono::{NaiveDate, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 호출을 기록하는 스텁 실행기.
    ///
    /// 스테이징 테이블 행 수는 `staged_rows`로 고정하고, 대상 테이블
    /// 행 수는 `table_counts`에서 순서대로 꺼내 반환한다.
    struct StubExecutor {
        staged_rows: i64,
        table_counts: Mutex<VecDeque<i64>>,
        executed: Mutex<Vec<String>>,
        staged_batches: Mutex<Vec<usize>>,
    }

    impl StubExecutor {
        fn new(staged_rows: i64, table_counts: &[i64]) -> Self {
            Self {
                staged_rows,
                table_counts: Mutex::new(table_counts.iter().copied().collect()),
                executed: Mutex::new(Vec::new()),
                staged_batches: Mutex::new(Vec::new()),
            }
        }

        fn executed_sql(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncExecutor for StubExecutor {
        async fn ensure_table(&self, _schema: &TableSchema) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, sql: &str) -> Result<()> {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn stage_batch(
            &self,
            _staging: &str,
            _schema: &TableSchema,
            chunk: &[&dyn StageRecord],
        ) -> Result<()> {
            self.staged_batches.lock().unwrap().push(chunk.len());
            Ok(())
        }

        async fn table_row_count(&self, table: &str) -> Result<i64> {
            if table.contains("_staging_") {
                return Ok(self.staged_rows);
            }
            Ok(self.table_counts.lock().unwrap().pop_front().unwrap_or(0))
        }
    }

    fn price_records(n: usize) -> Vec<stockdata_data::PriceRecord> {
        let base: NaiveDate = "2024-01-01".parse().unwrap();
        (0..n)
            .map(|i| stockdata_data::PriceRecord {
                ticker: "AAPL".to_string(),
                date: base + chrono::Duration::days(i as i64),
                open: Some(10.0),
                high: Some(11.0),
                low: Some(9.0),
                close: Some(10.5),
                adj_close: Some(10.5),
                volume: Some(1_000),
                download_timestamp: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_zero_staged_rows_fails_before_upsert_and_drops_staging() {
        // 비어 있지 않은 배치인데 스테이징에 0행 → 업서트 없이 실패
        let executor = StubExecutor::new(0, &[10]);
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let records = price_records(5);

        let result = sync_dataset(&executor, &schema, &records, &mut |_| {}).await;

        assert!(matches!(
            result,
            Err(CollectorError::StagingVerification {
                expected: 5,
                actual: 0,
                ..
            })
        ));

        let sql = executor.executed_sql();
        assert!(!sql.iter().any(|s| s.contains("ON CONFLICT")));
        // 실패해도 스테이징 테이블은 제거된다
        assert!(sql.iter().any(|s| s.starts_with("DROP TABLE IF EXISTS")));
    }

    #[tokio::test]
    async fn test_first_sync_counts_all_rows_as_added() {
        let executor = StubExecutor::new(10, &[0, 10]);
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let records = price_records(10);

        let report = sync_dataset(&executor, &schema, &records, &mut |_| {})
            .await
            .unwrap();

        assert_eq!(report.staged, 10);
        assert_eq!(report.rows_before, 0);
        assert_eq!(report.rows_after, 10);
        assert_eq!(report.rows_added, 10);
        assert!(executor
            .executed_sql()
            .iter()
            .any(|s| s.contains("ON CONFLICT")));
    }

    #[tokio::test]
    async fn test_overlapping_sync_adds_only_new_rows() {
        // 12행 중 10행이 이미 원격에 있으면 순수 추가는 2행
        let executor = StubExecutor::new(12, &[10, 12]);
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let records = price_records(12);

        let report = sync_dataset(&executor, &schema, &records, &mut |_| {})
            .await
            .unwrap();

        assert_eq!(report.staged, 12);
        assert_eq!(report.rows_added, 2);
    }

    #[tokio::test]
    async fn test_phase_sequence() {
        let executor = StubExecutor::new(3, &[0, 3]);
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let records = price_records(3);

        let mut phases = Vec::new();
        sync_dataset(&executor, &schema, &records, &mut |phase| {
            phases.push(phase);
        })
        .await
        .unwrap();

        assert_eq!(
            phases,
            vec![
                SyncPhase::SchemaCheck,
                SyncPhase::StageCreate,
                SyncPhase::StageWrite,
                SyncPhase::StageVerify,
                SyncPhase::Upsert,
                SyncPhase::Cleanup,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_skips_staging() {
        let executor = StubExecutor::new(0, &[7]);
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let records: Vec<stockdata_data::PriceRecord> = Vec::new();

        let report = sync_dataset(&executor, &schema, &records, &mut |_| {})
            .await
            .unwrap();

        assert_eq!(report.rows_added, 0);
        assert_eq!(report.rows_before, 7);
        assert!(executor.executed_sql().is_empty());
        assert!(executor.staged_batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_staging_name_is_unique_valid_identifier() {
        let a = staging_table_name("STOCK_NEWS");
        let b = staging_table_name("STOCK_NEWS");
        assert_ne!(a, b);
        assert!(a.starts_with("STOCK_NEWS_staging_"));
        assert!(valid_identifier(&a));
    }

    #[test]
    fn test_price_upsert_sql() {
        let schema = TableSchema::price_history("STOCK_PRICE_HISTORY");
        let sql = upsert_sql(&schema, "STOCK_PRICE_HISTORY_staging_x");

        assert!(sql.contains("INSERT INTO STOCK_PRICE_HISTORY"));
        assert!(sql.contains("FROM STOCK_PRICE_HISTORY_staging_x"));
        assert!(sql.contains("ON CONFLICT (TICKER, DATE) DO UPDATE SET"));
        assert!(sql.contains("CLOSE = EXCLUDED.CLOSE"));
        // 키 컬럼은 갱신 대상이 아니다
        assert!(!sql.contains("TICKER = EXCLUDED.TICKER"));
        assert!(!sql.contains("DATE = EXCLUDED.DATE,"));
    }

    #[test]
    fn test_news_upsert_sql_keys() {
        let schema = TableSchema::news("STOCK_NEWS");
        let sql = upsert_sql(&schema, "STOCK_NEWS_staging_x");
        assert!(sql.contains("ON CONFLICT (TICKER, ID) DO UPDATE SET"));
        assert!(sql.contains("TITLE = EXCLUDED.TITLE"));
    }
}
