//! 원격 웨어하우스 동기화.

pub mod schema;
pub mod session;
pub mod sync;

pub use schema::{diff_schema, ColumnDef, ColumnMismatch, SchemaDiff, TableSchema};
pub use session::{mask_database_url, WarehouseSession};
pub use sync::{staging_table_name, sync_dataset, StageRecord, SyncExecutor, SyncPhase, SyncReport};
