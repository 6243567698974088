//! 티커별 parquet 데이터셋 저장소.
//!
//! (티커, 종류)별로 parquet 파일 하나를 유지합니다.
//! 경로: `<base>/<kind>/<TICKER>/<kind>-<TICKER>.parquet`
//!
//! 저장은 항상 임시 파일에 쓴 뒤 rename으로 교체하므로 부분 쓰기 상태가
//! 노출되지 않습니다. 날짜는 ISO 문자열, 시각은 epoch 초로 저장하여
//! 스키마를 단순하게 유지합니다.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use polars::prelude::*;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::record::{DataKind, NewsRecord, PriceRecord};

/// 데이터셋 요약 (CLI summary용).
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub records: usize,
    /// 가격: 최소 날짜 / 뉴스: 가장 오래된 발행 시각
    pub first: String,
    /// 가격: 최대 날짜 / 뉴스: 가장 최근 발행 시각
    pub last: String,
}

/// 로컬 parquet 저장소.
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// (종류, 티커) 데이터셋의 파일 경로.
    pub fn dataset_path(&self, kind: DataKind, ticker: &str) -> PathBuf {
        let ticker = ticker.to_uppercase();
        self.base_dir
            .join(kind.dir_name())
            .join(&ticker)
            .join(format!("{}-{}.parquet", kind.dir_name(), ticker))
    }

    // =========================================================================
    // 가격 이력
    // =========================================================================

    pub fn load_prices(&self, ticker: &str) -> Result<Vec<PriceRecord>> {
        let path = self.dataset_path(DataKind::PriceHistory, ticker);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let df = read_parquet(&path)?;
        let tickers = str_col(&df, "TICKER")?;
        let dates = str_col(&df, "DATE")?;
        let opens = f64_col(&df, "OPEN")?;
        let highs = f64_col(&df, "HIGH")?;
        let lows = f64_col(&df, "LOW")?;
        let closes = f64_col(&df, "CLOSE")?;
        let adj_closes = f64_col(&df, "ADJ_CLOSE")?;
        let volumes = i64_col(&df, "VOLUME")?;
        let downloaded = i64_col(&df, "DOWNLOAD_TIMESTAMP")?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let date_str = dates
                .get(i)
                .ok_or_else(|| DataError::ParseError(format!("{}: DATE 누락 (행 {})", ticker, i)))?;
            let date: NaiveDate = date_str
                .parse()
                .map_err(|e| DataError::ParseError(format!("DATE 파싱 오류 ({}): {}", date_str, e)))?;
            records.push(PriceRecord {
                ticker: tickers.get(i).unwrap_or(ticker).to_string(),
                date,
                open: opens.get(i),
                high: highs.get(i),
                low: lows.get(i),
                close: closes.get(i),
                adj_close: adj_closes.get(i),
                volume: volumes.get(i),
                download_timestamp: epoch_to_datetime(downloaded.get(i)),
            });
        }
        Ok(records)
    }

    pub fn save_prices(&self, ticker: &str, records: &[PriceRecord]) -> Result<()> {
        let path = self.dataset_path(DataKind::PriceHistory, ticker);

        let mut df = df!(
            "TICKER" => records.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
            "DATE" => records.iter().map(|r| r.date.to_string()).collect::<Vec<_>>(),
            "OPEN" => records.iter().map(|r| r.open).collect::<Vec<_>>(),
            "HIGH" => records.iter().map(|r| r.high).collect::<Vec<_>>(),
            "LOW" => records.iter().map(|r| r.low).collect::<Vec<_>>(),
            "CLOSE" => records.iter().map(|r| r.close).collect::<Vec<_>>(),
            "ADJ_CLOSE" => records.iter().map(|r| r.adj_close).collect::<Vec<_>>(),
            "VOLUME" => records.iter().map(|r| r.volume).collect::<Vec<_>>(),
            "DOWNLOAD_TIMESTAMP" => records.iter().map(|r| r.download_timestamp.timestamp()).collect::<Vec<_>>(),
        )?;

        write_parquet_atomic(&path, &mut df)?;
        debug!(ticker = ticker, records = records.len(), path = %path.display(), "가격 데이터셋 저장 완료");
        Ok(())
    }

    // =========================================================================
    // 뉴스
    // =========================================================================

    pub fn load_news(&self, ticker: &str) -> Result<Vec<NewsRecord>> {
        let path = self.dataset_path(DataKind::News, ticker);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let df = read_parquet(&path)?;
        let tickers = str_col(&df, "TICKER")?;
        let ids = str_col(&df, "ID")?;
        let titles = str_col(&df, "TITLE")?;
        let summaries = str_col(&df, "SUMMARY")?;
        let descriptions = str_col(&df, "DESCRIPTION")?;
        let publishers = str_col(&df, "PUBLISHER")?;
        let links = str_col(&df, "LINK")?;
        let publish_times = i64_col(&df, "PUBLISH_TIME")?;
        let display_times = i64_col(&df, "DISPLAY_TIME")?;
        let content_types = str_col(&df, "CONTENT_TYPE")?;
        let thumbnails = str_col(&df, "THUMBNAIL_URL")?;
        let premiums = bool_col(&df, "IS_PREMIUM")?;
        let hosteds = bool_col(&df, "IS_HOSTED")?;
        let downloaded = i64_col(&df, "DOWNLOAD_TIMESTAMP")?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let id = ids
                .get(i)
                .ok_or_else(|| DataError::ParseError(format!("{}: ID 누락 (행 {})", ticker, i)))?;
            records.push(NewsRecord {
                ticker: tickers.get(i).unwrap_or(ticker).to_string(),
                id: id.to_string(),
                title: titles.get(i).unwrap_or_default().to_string(),
                summary: summaries.get(i).map(str::to_string),
                description: descriptions.get(i).map(str::to_string),
                publisher: publishers.get(i).map(str::to_string),
                link: links.get(i).map(str::to_string),
                publish_time: epoch_to_datetime(publish_times.get(i)),
                display_time: display_times.get(i).map(|s| epoch_to_datetime(Some(s))),
                content_type: content_types.get(i).map(str::to_string),
                thumbnail_url: thumbnails.get(i).map(str::to_string),
                is_premium: premiums.get(i).unwrap_or(false),
                is_hosted: hosteds.get(i).unwrap_or(false),
                download_timestamp: epoch_to_datetime(downloaded.get(i)),
            });
        }
        Ok(records)
    }

    pub fn save_news(&self, ticker: &str, records: &[NewsRecord]) -> Result<()> {
        let path = self.dataset_path(DataKind::News, ticker);

        let mut df = df!(
            "TICKER" => records.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
            "ID" => records.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
            "TITLE" => records.iter().map(|r| r.title.clone()).collect::<Vec<_>>(),
            "SUMMARY" => records.iter().map(|r| r.summary.clone()).collect::<Vec<_>>(),
            "DESCRIPTION" => records.iter().map(|r| r.description.clone()).collect::<Vec<_>>(),
            "PUBLISHER" => records.iter().map(|r| r.publisher.clone()).collect::<Vec<_>>(),
            "LINK" => records.iter().map(|r| r.link.clone()).collect::<Vec<_>>(),
            "PUBLISH_TIME" => records.iter().map(|r| r.publish_time.timestamp()).collect::<Vec<_>>(),
            "DISPLAY_TIME" => records.iter().map(|r| r.display_time.map(|t| t.timestamp())).collect::<Vec<_>>(),
            "CONTENT_TYPE" => records.iter().map(|r| r.content_type.clone()).collect::<Vec<_>>(),
            "THUMBNAIL_URL" => records.iter().map(|r| r.thumbnail_url.clone()).collect::<Vec<_>>(),
            "IS_PREMIUM" => records.iter().map(|r| r.is_premium).collect::<Vec<_>>(),
            "IS_HOSTED" => records.iter().map(|r| r.is_hosted).collect::<Vec<_>>(),
            "DOWNLOAD_TIMESTAMP" => records.iter().map(|r| r.download_timestamp.timestamp()).collect::<Vec<_>>(),
        )?;

        write_parquet_atomic(&path, &mut df)?;
        debug!(ticker = ticker, records = records.len(), path = %path.display(), "뉴스 데이터셋 저장 완료");
        Ok(())
    }

    // =========================================================================
    // 요약
    // =========================================================================

    /// 데이터셋 요약. 파일이 없으면 None.
    pub fn summary(&self, kind: DataKind, ticker: &str) -> Result<Option<DatasetSummary>> {
        match kind {
            DataKind::PriceHistory => {
                let records = self.load_prices(ticker)?;
                if records.is_empty() {
                    return Ok(None);
                }
                // 데이터셋은 날짜 오름차순 정렬 상태로 저장된다
                let first = records.iter().map(|r| r.date).min().unwrap_or_default();
                let last = records.iter().map(|r| r.date).max().unwrap_or_default();
                Ok(Some(DatasetSummary {
                    records: records.len(),
                    first: first.to_string(),
                    last: last.to_string(),
                }))
            }
            DataKind::News => {
                let records = self.load_news(ticker)?;
                if records.is_empty() {
                    return Ok(None);
                }
                let first = records.iter().map(|r| r.publish_time).min();
                let last = records.iter().map(|r| r.publish_time).max();
                Ok(Some(DatasetSummary {
                    records: records.len(),
                    first: first.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    last: last.map(|t| t.to_rfc3339()).unwrap_or_default(),
                }))
            }
        }
    }
}

// =============================================================================
// parquet IO 헬퍼
// =============================================================================

fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(df)
}

/// 임시 파일에 쓴 뒤 rename으로 원자적 교체.
fn write_parquet_atomic(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp)?;
    ParquetWriter::new(file).finish(df)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn str_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let ca = df.column(name)?.as_materialized_series().str()?;
    Ok(ca)
}

fn f64_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked> {
    let ca = df.column(name)?.as_materialized_series().f64()?;
    Ok(ca)
}

fn i64_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Int64Chunked> {
    let ca = df.column(name)?.as_materialized_series().i64()?;
    Ok(ca)
}

fn bool_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a BooleanChunked> {
    let ca = df.column(name)?.as_materialized_series().bool()?;
    Ok(ca)
}

fn epoch_to_datetime(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or_default()
}
