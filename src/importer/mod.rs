// ==========================================
// Max Import - 导入层
// ==========================================
// 职责: 电子表格 → 标准化记录 → 遗留库
// 支持: Excel (.xlsx/.xls/.ods), CSV
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod error;
pub mod field_normalizer;
pub mod file_parser;
pub mod identity_strategy;
pub mod pipeline;
pub mod record_builder;
pub mod reference_sync;

// 重导出核心类型
pub use column_mapper::{auto_map, FieldPlan, PlannedField};
pub use error::{ImportError, ImportResult};
pub use file_parser::{read_source, SourceFormat};
pub use identity_strategy::{parse_identifier, split_cohorts, CohortSplit, IdentityPolicy};
pub use pipeline::{ImportPipeline, PreparedBatches, PreparedImport};
pub use record_builder::{BuildOutcome, RecordBuilder};
pub use reference_sync::{ReferenceSyncOutcome, ReferenceSynchronizer};
