//! 로컬 컬럼 저장소.

mod dataset;

pub use dataset::{DatasetSummary, LocalStore};
