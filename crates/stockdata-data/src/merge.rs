//! 병합/중복 제거 엔진.
//!
//! 기존 데이터셋과 새로 수집한 레코드를 합쳐 자연 키 기준으로 중복을
//! 제거하고 종류별 정렬 순서를 복원합니다. 같은 키가 여러 번 나타나면
//! 마지막에 본 레코드가 남습니다 (새 데이터가 기존 데이터를 덮어씀).

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;

use crate::record::DatasetRecord;

/// 병합 결과 요약.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// 병합 전 기존 레코드 수
    pub records_before: usize,
    /// 새로 추가된 키 수
    pub records_added: usize,
    /// 제거된 중복 레코드 수
    pub duplicates_removed: usize,
}

/// 기존 + 신규 레코드를 병합.
///
/// - 자연 키가 겹치면 나중에 들어온 레코드가 남는다
/// - 결과는 레코드 종류의 정렬 순서를 따른다
pub fn merge_records<R: DatasetRecord>(existing: Vec<R>, incoming: Vec<R>) -> (Vec<R>, MergeOutcome) {
    let records_before = existing.len();
    let incoming_len = incoming.len();

    let mut index: HashMap<R::Key, usize> = HashMap::with_capacity(records_before + incoming_len);
    let mut merged: Vec<R> = Vec::with_capacity(records_before + incoming_len);

    for record in existing.into_iter().chain(incoming) {
        match index.entry(record.merge_key()) {
            Entry::Occupied(slot) => {
                // 마지막 레코드 우선
                merged[*slot.get()] = record;
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(record);
            }
        }
    }

    merged.sort_by(R::compare);

    let duplicates_removed = records_before + incoming_len - merged.len();
    let records_added = merged.len() - records_before.min(merged.len());

    (
        merged,
        MergeOutcome {
            records_before,
            records_added,
            duplicates_removed,
        },
    )
}
