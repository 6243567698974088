//! 동시 수집 코디네이터.
//!
//! 세마포어로 동시 처리 티커 수를 제한하고, 티커별 결과를 모읍니다.
//! 한 티커의 실패는 다른 티커를 중단시키지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{error, info};

use stockdata_data::DataKind;

use crate::pipeline::{Pipeline, TickerOutcome, TickerReport, TickerStatus};
use crate::stats::CollectionStats;

/// 티커 목록을 동시성 제한 하에 처리.
///
/// 각 티커는 자기 작업 안에서 요청된 데이터 종류를 순차 처리하며,
/// 결과는 티커를 키로 모은다.
pub async fn run_collection(
    pipeline: Arc<Pipeline>,
    tickers: &[String],
    kinds: &[DataKind],
    forced: bool,
    concurrent_limit: usize,
) -> (HashMap<String, Vec<TickerReport>>, CollectionStats) {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(concurrent_limit.max(1)));

    info!(
        tickers = tickers.len(),
        concurrent_limit = concurrent_limit,
        forced = forced,
        "수집 시작"
    );

    let mut handles = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let ticker = ticker.clone();
        let kinds = kinds.to_vec();
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);

        handles.push((
            ticker.clone(),
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Vec::new(),
                };
                let mut reports = Vec::with_capacity(kinds.len());
                for kind in kinds {
                    reports.push(pipeline.run_ticker(&ticker, kind, forced).await);
                }
                reports
            }),
        ));
    }

    let mut results: HashMap<String, Vec<TickerReport>> = HashMap::with_capacity(tickers.len());
    for (ticker, handle) in handles {
        match handle.await {
            Ok(reports) => {
                results.insert(ticker, reports);
            }
            Err(e) => {
                // 작업 패닉/취소도 해당 티커의 실패로만 기록
                error!(ticker = %ticker, error = %e, "수집 작업 실패");
                let report = TickerReport {
                    ticker: ticker.clone(),
                    kind: kinds.first().copied().unwrap_or(DataKind::PriceHistory),
                    status: TickerStatus::Failed,
                    outcome: TickerOutcome::Failed,
                    fetched: 0,
                    records_added: 0,
                    duplicates_removed: 0,
                    local_total: 0,
                    remote_rows_added: 0,
                    error: Some(format!("작업 실행 실패: {}", e)),
                };
                results.insert(ticker, vec![report]);
            }
        }
    }

    let mut stats = collect_stats(&results);
    stats.elapsed = started.elapsed();
    (results, stats)
}

/// 티커별 리포트에서 실행 통계 집계.
fn collect_stats(results: &HashMap<String, Vec<TickerReport>>) -> CollectionStats {
    let mut stats = CollectionStats::new();
    stats.total = results.len();

    for reports in results.values() {
        let any_failed = reports.iter().any(|r| r.outcome == TickerOutcome::Failed);
        let any_success = reports.iter().any(|r| r.outcome == TickerOutcome::Success);
        // 계획 단계에서 생략된 티커는 Pending에 머문다
        let attempted_fetch = reports.iter().any(|r| r.status != TickerStatus::Pending);

        if any_failed {
            stats.errors += 1;
        } else if any_success {
            stats.success += 1;
        } else if attempted_fetch {
            stats.empty += 1;
        } else {
            stats.skipped += 1;
        }

        stats.total_records += reports.iter().map(|r| r.records_added).sum::<usize>();
        stats.remote_rows_added += reports.iter().map(|r| r.remote_rows_added).sum::<i64>();
    }

    stats
}
