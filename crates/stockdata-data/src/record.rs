//! 도메인 레코드 정의.
//!
//! 티커별 데이터셋을 구성하는 레코드 타입과 종류별 정렬/중복 제거 규칙을
//! 정의합니다. 모든 데이터셋은 자연 키 기준으로 유일하며, 종류별 정렬
//! 순서를 유지합니다.

use std::cmp::Ordering;
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 데이터셋 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// 일봉 가격 이력
    PriceHistory,
    /// 뉴스 기사
    News,
}

impl DataKind {
    /// 로컬 저장소 디렉토리 이름 및 파일 접두사.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DataKind::PriceHistory => "price-history",
            DataKind::News => "news",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// 데이터셋 레코드 공통 동작.
///
/// 병합 엔진이 자연 키 기반 중복 제거와 종류별 정렬에 사용합니다.
pub trait DatasetRecord: Clone + Send + Sync {
    type Key: Eq + Hash + Clone;

    /// 자연 키 (티커 내에서 레코드를 유일하게 식별).
    fn merge_key(&self) -> Self::Key;

    /// 데이터셋 정렬 순서.
    fn compare(a: &Self, b: &Self) -> Ordering;
}

/// 일봉 가격 레코드. 자연 키: (ticker, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
    /// 수집 시각 (감사용 컬럼, 원본 대비 비교에는 사용하지 않음)
    pub download_timestamp: DateTime<Utc>,
}

impl DatasetRecord for PriceRecord {
    type Key = (String, NaiveDate);

    fn merge_key(&self) -> Self::Key {
        (self.ticker.clone(), self.date)
    }

    /// 가격 이력은 날짜 오름차순.
    fn compare(a: &Self, b: &Self) -> Ordering {
        a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker))
    }
}

/// 뉴스 레코드. 자연 키: (ticker, id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub ticker: String,
    /// 제공자가 부여한 기사 고유 ID
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub link: Option<String>,
    pub publish_time: DateTime<Utc>,
    pub display_time: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_premium: bool,
    pub is_hosted: bool,
    pub download_timestamp: DateTime<Utc>,
}

impl DatasetRecord for NewsRecord {
    type Key = (String, String);

    fn merge_key(&self) -> Self::Key {
        (self.ticker.clone(), self.id.clone())
    }

    /// 뉴스는 발행 시각 내림차순 (최신 기사 우선).
    fn compare(a: &Self, b: &Self) -> Ordering {
        b.publish_time
            .cmp(&a.publish_time)
            .then_with(|| a.id.cmp(&b.id))
    }
}
