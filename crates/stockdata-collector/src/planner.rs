//! 증분 수집 계획.
//!
//! 로컬 데이터셋 상태를 보고 전체 수집 / 증분 범위 수집 / 생략을
//! 결정합니다. 순수 함수로 구성되어 있어 시각을 주입해 테스트합니다.

use chrono::{Duration, NaiveDate};
use stockdata_data::PriceRecord;

/// 수집 계획.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// 로컬이 이미 최신 상태
    Skip,
    /// 전체 이력 수집
    Full,
    /// 증분 범위 수집 (양 끝 포함)
    Range { start: NaiveDate, end: NaiveDate },
}

/// 로컬 데이터셋의 날짜 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

/// 로컬 가격 레코드에서 날짜 범위 도출. 비어 있으면 None.
pub fn local_price_state(records: &[PriceRecord]) -> Option<LocalState> {
    let min_date = records.iter().map(|r| r.date).min()?;
    let max_date = records.iter().map(|r| r.date).max()?;
    Some(LocalState { min_date, max_date })
}

/// 수집 계획 결정. 규칙은 위에서부터 순서대로 적용된다:
///
/// 1. 강제 전체 수집 요청 → `Full`
/// 2. 로컬 데이터 없음 → `Full`
/// 3. 로컬 최소 날짜가 백필 기준일 이후 → `Full` (과거 이력이 잘린
///    데이터셋을 자가 복구)
/// 4. 다음 수집 시작일(최대 날짜 + 1일)이 오늘 이후 → `Skip`
/// 5. 그 외 → `Range(최대 날짜 + 1일, 오늘)`
pub fn plan_fetch(
    state: Option<LocalState>,
    forced: bool,
    backfill_cutoff: NaiveDate,
    today: NaiveDate,
) -> FetchPlan {
    if forced {
        return FetchPlan::Full;
    }

    let state = match state {
        Some(s) => s,
        None => return FetchPlan::Full,
    };

    if state.min_date >= backfill_cutoff {
        return FetchPlan::Full;
    }

    let start = state.max_date + Duration::days(1);
    if start >= today {
        return FetchPlan::Skip;
    }

    FetchPlan::Range { start, end: today }
}
