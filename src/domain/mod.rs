// ==========================================
// Max Import - 领域层
// ==========================================

pub mod catalog;
pub mod record;
pub mod report;
pub mod types;

pub use catalog::{catalog_for, identifier_key, FieldCatalogEntry, NormalizeRule};
pub use record::{
    ColumnMapping, IdentityCohort, Identified, NormalizedRecord, ProductRow, ReferenceEntry,
    SourceRow, SourceSheet,
};
pub use report::{AbortedLoad, ImportReport, ReferenceFailure, SkipReason, SkippedRow, TableLoad};
pub use types::{CohortKind, DestTable, EntityFamily, FieldValue};
