//! 환경변수 기반 수집기 설정.
//!
//! `.env` 파일과 환경변수에서 설정을 읽습니다. 원격 동기화가 켜진 경우
//! `DATABASE_URL`이 없으면 티커 처리 전에 즉시 실패합니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use stockdata_data::RetryPolicy;

use crate::error::{CollectorError, Result};
use crate::warehouse::schema::valid_identifier;

/// 수집기 설정.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 웨어하우스 연결 문자열 (원격 동기화 사용 시 필수)
    pub database_url: Option<String>,
    /// 로컬 데이터셋 베이스 디렉토리
    pub data_dir: PathBuf,
    /// 가격 이력 테이블 이름
    pub price_table: String,
    /// 뉴스 테이블 이름
    pub news_table: String,
    /// 동시 처리 티커 수
    pub concurrent_limit: usize,
    /// 재시도 횟수 (첫 시도 포함)
    pub retry_attempts: u32,
    /// 첫 재시도 전 대기 시간 (초)
    pub retry_delay_secs: f64,
    /// 재시도 대기 배수
    pub retry_multiplier: f64,
    /// 백필 기준일: 로컬 최소 날짜가 이 날짜 이후면 전체 재수집
    pub backfill_cutoff: NaiveDate,
    /// 전체 이력 수집 시 제공자 기간 문자열 ("max", "5y", "6mo" 등)
    pub fetch_period: String,
    /// 뉴스 조회 최대 건수
    pub news_max_items: usize,
    /// 기본 원격 업로드 여부
    pub auto_upload: bool,
    /// CLI에서 티커를 지정하지 않았을 때 사용할 기본 목록
    pub default_tickers: Vec<String>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            ),
            price_table: std::env::var("PRICE_TABLE")
                .unwrap_or_else(|_| "STOCK_PRICE_HISTORY".to_string()),
            news_table: std::env::var("NEWS_TABLE").unwrap_or_else(|_| "STOCK_NEWS".to_string()),
            concurrent_limit: env_var_parse("CONCURRENT_LIMIT", 3),
            retry_attempts: env_var_parse("RETRY_ATTEMPTS", 3),
            retry_delay_secs: env_var_parse("RETRY_DELAY_SECS", 2.0),
            retry_multiplier: env_var_parse("RETRY_MULTIPLIER", 2.0),
            backfill_cutoff: env_var_parse(
                "BACKFILL_CUTOFF_DATE",
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            ),
            fetch_period: std::env::var("FETCH_PERIOD").unwrap_or_else(|_| "max".to_string()),
            news_max_items: env_var_parse("NEWS_MAX_ITEMS", 25),
            auto_upload: env_var_bool("AUTO_UPLOAD", true),
            default_tickers: env_var_list_or_default(
                "DEFAULT_TICKERS",
                &["AAPL", "MSFT", "GOOGL"],
            ),
        };

        if !valid_identifier(&config.price_table) {
            return Err(CollectorError::Config(format!(
                "PRICE_TABLE이 유효한 식별자가 아닙니다: {}",
                config.price_table
            )));
        }
        if !valid_identifier(&config.news_table) {
            return Err(CollectorError::Config(format!(
                "NEWS_TABLE이 유효한 식별자가 아닙니다: {}",
                config.news_table
            )));
        }
        if config.concurrent_limit == 0 {
            return Err(CollectorError::Config(
                "CONCURRENT_LIMIT은 1 이상이어야 합니다".to_string(),
            ));
        }

        Ok(config)
    }

    /// 원격 동기화용 연결 문자열. 없으면 설정 오류.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }

    /// 재시도 정책.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.retry_delay_secs.max(0.0)),
            multiplier: self.retry_multiplier,
        }
    }
}

// =============================================================================
// 환경변수 헬퍼
// =============================================================================

fn env_var_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_var_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_var_list_or_default(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parse_fallback() {
        assert_eq!(env_var_parse("STOCKDATA_TEST_MISSING_VAR", 7usize), 7);
    }

    #[test]
    fn test_env_var_list_default() {
        let list = env_var_list_or_default("STOCKDATA_TEST_MISSING_LIST", &["AAPL", "MSFT"]);
        assert_eq!(list, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_retry_policy_from_fields() {
        let config = CollectorConfig {
            database_url: None,
            data_dir: PathBuf::from("./data"),
            price_table: "STOCK_PRICE_HISTORY".to_string(),
            news_table: "STOCK_NEWS".to_string(),
            concurrent_limit: 3,
            retry_attempts: 4,
            retry_delay_secs: 1.5,
            retry_multiplier: 3.0,
            backfill_cutoff: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            fetch_period: "max".to_string(),
            news_max_items: 25,
            auto_upload: true,
            default_tickers: vec![],
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(1500));
        assert_eq!(policy.multiplier, 3.0);
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let config = CollectorConfig {
            database_url: None,
            data_dir: PathBuf::from("./data"),
            price_table: "STOCK_PRICE_HISTORY".to_string(),
            news_table: "STOCK_NEWS".to_string(),
            concurrent_limit: 3,
            retry_attempts: 3,
            retry_delay_secs: 2.0,
            retry_multiplier: 2.0,
            backfill_cutoff: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            fetch_period: "max".to_string(),
            news_max_items: 25,
            auto_upload: true,
            default_tickers: vec![],
        };
        assert!(matches!(
            config.require_database_url(),
            Err(crate::error::CollectorError::Config(_))
        ));
    }
}
