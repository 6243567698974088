//! Yahoo Finance 데이터 제공자.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::provider::{MarketDataProvider, PriceQuery};
use crate::record::{NewsRecord, PriceRecord};

/// Yahoo Finance 제공자.
pub struct YahooProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn fetch_prices(&self, ticker: &str, query: PriceQuery) -> Result<Vec<PriceRecord>> {
        let response = match &query {
            PriceQuery::Range(r) => {
                // chrono::NaiveDate → time::OffsetDateTime 변환
                let start = naive_date_to_offset_datetime(r.start);
                // 종료일 당일 포함을 위해 다음날 자정까지 요청
                let end = naive_date_to_offset_datetime(r.end + chrono::Duration::days(1));

                debug!(
                    ticker = ticker,
                    start = %r.start,
                    end = %r.end,
                    "Yahoo Finance 날짜 범위 호출"
                );

                self.connector
                    .get_quote_history_interval(ticker, start, end, "1d")
                    .await
            }
            PriceQuery::Full { period } => {
                debug!(ticker = ticker, period = %period, "Yahoo Finance 전체 이력 호출");
                self.connector.get_quote_range(ticker, "1d", period).await
            }
        }
        .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", ticker, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        if quotes.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut records: Vec<PriceRecord> = quotes
            .iter()
            .filter_map(|q| {
                let date = Utc
                    .timestamp_opt(q.timestamp, 0)
                    .single()
                    .map(|dt| dt.date_naive())?;
                Some(PriceRecord {
                    ticker: ticker.to_string(),
                    date,
                    open: Some(q.open),
                    high: Some(q.high),
                    low: Some(q.low),
                    close: Some(q.close),
                    adj_close: Some(q.adjclose),
                    volume: Some(q.volume as i64),
                    download_timestamp: now,
                })
            })
            .collect();

        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn fetch_news(&self, ticker: &str, max_items: usize) -> Result<Vec<NewsRecord>> {
        debug!(ticker = ticker, max_items = max_items, "Yahoo Finance 뉴스 검색");

        let result = self
            .connector
            .search_ticker(ticker)
            .await
            .map_err(|e| DataError::FetchError(format!("뉴스 검색 오류 ({}): {}", ticker, e)))?;

        let now = Utc::now();
        let records: Vec<NewsRecord> = result
            .news
            .into_iter()
            .take(max_items)
            .map(|item| {
                let publish_time = Utc
                    .timestamp_opt(item.provider_publish_time as i64, 0)
                    .single()
                    .unwrap_or(now);
                NewsRecord {
                    ticker: ticker.to_string(),
                    id: item.uuid,
                    title: item.title,
                    summary: None,
                    description: None,
                    publisher: Some(item.publisher),
                    link: Some(item.link),
                    publish_time,
                    display_time: None,
                    content_type: Some(item.newstype),
                    thumbnail_url: None,
                    is_premium: false,
                    is_hosted: false,
                    download_timestamp: now,
                }
            })
            .collect();

        Ok(records)
    }
}

/// NaiveDate를 OffsetDateTime으로 변환.
fn naive_date_to_offset_datetime(date: NaiveDate) -> OffsetDateTime {
    let (year, month, day) = (date.year(), date.month() as u8, date.day() as u8);
    time::Date::from_calendar_date(year, time::Month::try_from(month).unwrap(), day)
        .unwrap()
        .midnight()
        .assume_utc()
}
