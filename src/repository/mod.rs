// ==========================================
// Max Import - 数据仓储层
// ==========================================
// 红线: Repository 不含业务规则，只做数据写入/查询
// 约束: 所有值使用参数化；表名/列名来自常量或目录并加引号
// ==========================================

pub mod bulk_loader;
pub mod cleanup_repo;
pub mod constraint_gate;
pub mod error;
pub mod reference_repo;

// 重导出
pub use bulk_loader::{BulkLoader, IdentityMode, LoadOutcome};
pub use cleanup_repo::{CleanupOutcome, CleanupRepository, CleanupScope};
pub use constraint_gate::{with_constraints_suspended, ConstraintGate, GateScope, StashedTrigger};
pub use error::{RepositoryError, RepositoryResult};
pub use reference_repo::{ReferenceRepository, SqliteReferenceRepository};
