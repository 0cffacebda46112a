// ==========================================
// Max Import - 导入流水线
// ==========================================
// 流程（单次线性执行，无持久状态）:
// 读取 → 映射 → 标准化/构建 → 标识分组 → [闸门] 清空(可选) → 编码同步(商品)
//      → 主表写入 → 关联表写入 → 单位同步(商品) → [闸门恢复] → 报告
// 分为两段:
// - prepare: 只读，产出可序列化的已标准化批次
// - load: 写入；任何写入之前的校验失败直接返回错误
// ==========================================

use crate::config::constants::tables;
use crate::config::ImportSettings;
use crate::db::{has_column, table_columns};
use crate::domain::catalog::identifier_key;
use crate::domain::record::{ColumnMapping, IdentityCohort, NormalizedRecord, ProductRow};
use crate::domain::report::{AbortedLoad, ImportReport, SkippedRow};
use crate::domain::types::{CohortKind, EntityFamily, FieldValue};
use crate::importer::column_mapper::{auto_map, FieldPlan};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::read_source;
use crate::importer::identity_strategy::{split_cohorts, IdentityPolicy};
use crate::importer::record_builder::RecordBuilder;
use crate::importer::reference_sync::ReferenceSynchronizer;
use crate::repository::bulk_loader::{BulkLoader, IdentityMode};
use crate::repository::cleanup_repo::{CleanupOutcome, CleanupRepository, CleanupScope};
use crate::repository::constraint_gate::{with_constraints_suspended, ConstraintGate};
use crate::repository::reference_repo::SqliteReferenceRepository;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// 已标准化、已分组的批次
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreparedBatches {
    Products {
        fixed: IdentityCohort<ProductRow>,
        auto: IdentityCohort<ProductRow>,
    },
    Parties {
        fixed: IdentityCohort<NormalizedRecord>,
        auto: IdentityCohort<NormalizedRecord>,
    },
    Ledger {
        entries: Vec<NormalizedRecord>,
    },
}

/// prepare 阶段产物
#[derive(Debug, Clone, Serialize)]
pub struct PreparedImport {
    pub run_id: String,
    pub family: EntityFamily,
    /// 实际生效的映射
    pub mapping: ColumnMapping,
    pub total_rows: usize,
    pub batches: PreparedBatches,
    pub skipped: Vec<SkippedRow>,
    pub warnings: Vec<String>,
}

impl PreparedImport {
    /// 待写入的源行数
    pub fn pending_rows(&self) -> usize {
        match &self.batches {
            PreparedBatches::Products { fixed, auto } => fixed.len() + auto.len(),
            PreparedBatches::Parties { fixed, auto } => fixed.len() + auto.len(),
            PreparedBatches::Ledger { entries } => entries.len(),
        }
    }
}

/// 导入流水线
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    settings: ImportSettings,
    loader: BulkLoader,
}

impl ImportPipeline {
    pub fn new(settings: ImportSettings) -> Self {
        let loader = BulkLoader::new(settings.chunk_size);
        Self { settings, loader }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 读取 + 映射 + 构建 + 分组（不访问目标库）
    ///
    /// # 参数
    /// - mapping: 人工复核后的映射；None 时使用自动映射
    #[instrument(skip(self, mapping), fields(family = %family, file = %file_path.display()))]
    pub fn prepare(
        &self,
        family: EntityFamily,
        file_path: &Path,
        mapping: Option<&ColumnMapping>,
    ) -> ImportResult<PreparedImport> {
        let sheet = read_source(file_path)?;

        let mapping = match mapping {
            Some(explicit) => explicit.clone(),
            None => auto_map(family, &sheet.headers),
        };
        let plan = FieldPlan::build(family, &mapping, &sheet.headers)?;
        let builder = RecordBuilder::new(&plan, &self.settings);

        let mut skipped = Vec::new();
        let mut warnings = Vec::new();
        let policy = IdentityPolicy::for_family(family);

        let batches = match family {
            EntityFamily::Product => {
                let built = builder.build_products(&sheet);
                skipped.extend(built.skipped);
                let id_column = identifier_key(family).unwrap_or("proId");
                let split = split_cohorts(built.records, id_column, policy);
                skipped.extend(split.skipped);
                warnings.extend(split.warnings);
                PreparedBatches::Products {
                    fixed: split.fixed,
                    auto: split.auto,
                }
            }
            EntityFamily::Customer | EntityFamily::Supplier => {
                let built = builder.build_parties(&sheet, family);
                skipped.extend(built.skipped);
                let id_column = identifier_key(family).unwrap_or("cliId");
                let split = split_cohorts(built.records, id_column, policy);
                skipped.extend(split.skipped);
                warnings.extend(split.warnings);
                PreparedBatches::Parties {
                    fixed: split.fixed,
                    auto: split.auto,
                }
            }
            EntityFamily::Financial => {
                let built = builder.build_ledger(&sheet);
                skipped.extend(built.skipped);
                PreparedBatches::Ledger {
                    entries: built.records,
                }
            }
        };
        skipped.sort_by_key(|s| s.row_number);

        let prepared = PreparedImport {
            run_id: uuid::Uuid::new_v4().to_string(),
            family,
            mapping,
            total_rows: sheet.rows.len(),
            batches,
            skipped,
            warnings,
        };

        info!(
            run_id = %prepared.run_id,
            total = prepared.total_rows,
            pending = prepared.pending_rows(),
            skipped = prepared.skipped.len(),
            "导入准备完成"
        );
        Ok(prepared)
    }

    /// 写入已准备的批次
    ///
    /// 写入前的校验失败返回 Err；写入阶段的 BulkInsertFailure 记入 `report.aborted`，
    /// 之前已提交的表保持不变。其他写入阶段错误返回 `LoadInterrupted`，携带部分报告
    #[instrument(skip(self, conn, prepared), fields(run_id = %prepared.run_id, family = %prepared.family))]
    pub fn load(
        &self,
        conn: &Connection,
        prepared: PreparedImport,
        clear_before: bool,
    ) -> ImportResult<ImportReport> {
        let started = Instant::now();
        self.preflight(conn, &prepared)?;

        let mut report = ImportReport::new(prepared.run_id.clone(), prepared.family);
        report.total_rows = prepared.total_rows;
        report.skipped = prepared.skipped;
        report.warnings = prepared.warnings;

        let gate = ConstraintGate::engage(conn)?;
        let result = self.load_within_gate(conn, prepared.family, prepared.batches, clear_before, &mut report);
        if let Err(e) = gate.release() {
            report.warnings.push(e.to_string());
        }

        match result {
            Ok(()) => {}
            Err(ImportError::BulkInsertFailure { table, rows, message }) => {
                error!(table = %table, rows, message = %message, "导入中止");
                report.aborted = Some(AbortedLoad {
                    table,
                    rows_attempted: rows,
                    message,
                });
            }
            Err(e) => {
                report.elapsed_ms = started.elapsed().as_millis();
                error!(error = %e, loads = report.loads.len(), "导入中途失败");
                return Err(ImportError::LoadInterrupted {
                    report: Box::new(report),
                    message: e.to_string(),
                });
            }
        }

        report.elapsed_ms = started.elapsed().as_millis();
        info!(
            loaded = report.loads.iter().map(|l| l.rows).sum::<usize>(),
            skipped = report.skipped_count(),
            aborted = report.is_aborted(),
            elapsed_ms = report.elapsed_ms as u64,
            "导入结束"
        );
        Ok(report)
    }

    /// prepare + load
    pub fn run(
        &self,
        conn: &Connection,
        family: EntityFamily,
        file_path: &Path,
        mapping: Option<&ColumnMapping>,
        clear_before: bool,
    ) -> ImportResult<ImportReport> {
        let prepared = self.prepare(family, file_path, mapping)?;
        self.load(conn, prepared, clear_before)
    }

    /// 单独的维护清空（约束闸门内执行）
    #[instrument(skip(self, conn))]
    pub fn cleanup(&self, conn: &Connection, scope: CleanupScope) -> ImportResult<CleanupOutcome> {
        with_constraints_suspended(conn, |c| -> ImportResult<CleanupOutcome> {
            Ok(CleanupRepository::new(c).clear(scope)?)
        })
    }

    // ==========================================
    // 写入前校验（不写入任何数据）
    // ==========================================
    fn preflight(&self, conn: &Connection, prepared: &PreparedImport) -> ImportResult<()> {
        if prepared.family == EntityFamily::Financial {
            let column = self.settings.due_date_column.as_str();
            if !has_column(conn, tables::LEDGER, column)? {
                return Err(ImportError::SchemaMismatch {
                    table: tables::LEDGER.to_string(),
                    column: column.to_string(),
                });
            }
        }

        let mut samples: Vec<(&str, &NormalizedRecord)> = Vec::new();
        match &prepared.batches {
            PreparedBatches::Products { fixed, auto } => {
                for row in fixed.records.first().into_iter().chain(auto.records.first()) {
                    samples.push((tables::PRODUCT, &row.master));
                    samples.push((tables::PRODUCT_BRANCH, &row.branch));
                }
            }
            PreparedBatches::Parties { fixed, auto } => {
                for record in fixed.records.first().into_iter().chain(auto.records.first()) {
                    samples.push((tables::CUSTOMER, record));
                }
            }
            PreparedBatches::Ledger { entries } => {
                if let Some(record) = entries.first() {
                    samples.push((tables::LEDGER, record));
                }
            }
        }

        for (table, record) in samples {
            let schema = table_columns(conn, table)?;
            for column in record.columns() {
                if !schema.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
                    return Err(ImportError::SchemaMismatch {
                        table: table.to_string(),
                        column: column.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    // ==========================================
    // 闸门内写入
    // ==========================================
    fn load_within_gate(
        &self,
        conn: &Connection,
        family: EntityFamily,
        batches: PreparedBatches,
        clear_before: bool,
        report: &mut ImportReport,
    ) -> ImportResult<()> {
        if clear_before {
            let outcome = CleanupRepository::new(conn).clear(CleanupScope::from(family))?;
            info!(rows = outcome.total(), "导入前清空完成");
            report.cleared = outcome.deleted;
        }

        match batches {
            PreparedBatches::Products { fixed, auto } => self.load_products(conn, fixed, auto, report),
            PreparedBatches::Parties { fixed, auto } => {
                let fixed_rows = self
                    .loader
                    .load(conn, tables::CUSTOMER, &fixed.records, IdentityMode::Explicit("cliId"))?
                    .rows;
                report.record_load(tables::CUSTOMER, Some(CohortKind::Fixed), fixed_rows);

                let auto_rows = self
                    .loader
                    .load(conn, tables::CUSTOMER, &auto.records, IdentityMode::Auto)?
                    .rows;
                report.record_load(tables::CUSTOMER, Some(CohortKind::Auto), auto_rows);
                Ok(())
            }
            PreparedBatches::Ledger { entries } => {
                let rows = self
                    .loader
                    .load(conn, tables::LEDGER, &entries, IdentityMode::Auto)?
                    .rows;
                report.record_load(tables::LEDGER, None, rows);
                Ok(())
            }
        }
    }

    fn load_products(
        &self,
        conn: &Connection,
        mut fixed: IdentityCohort<ProductRow>,
        mut auto: IdentityCohort<ProductRow>,
        report: &mut ImportReport,
    ) -> ImportResult<()> {
        let repo = SqliteReferenceRepository::new(conn);
        let sync = ReferenceSynchronizer::new(&repo).synchronize(
            fixed
                .records
                .iter_mut()
                .chain(auto.records.iter_mut())
                .map(|row| &mut row.master),
        )?;
        report.reference_failures = sync.failures;

        // 固定分组: 主表显式写入标识，关联表直接沿用
        let (masters, branches): (Vec<_>, Vec<_>) =
            fixed.records.into_iter().map(|r| (r.master, r.branch)).unzip();
        let rows = self
            .loader
            .load(conn, tables::PRODUCT, &masters, IdentityMode::Explicit("proId"))?
            .rows;
        report.record_load(tables::PRODUCT, Some(CohortKind::Fixed), rows);
        let rows = self
            .loader
            .load(conn, tables::PRODUCT_BRANCH, &branches, IdentityMode::Auto)?
            .rows;
        report.record_load(tables::PRODUCT_BRANCH, Some(CohortKind::Fixed), rows);

        // 自动分组: 主表由库分配标识，回填到关联表
        let (masters, mut branches): (Vec<_>, Vec<_>) =
            auto.records.into_iter().map(|r| (r.master, r.branch)).unzip();
        let outcome = self
            .loader
            .load(conn, tables::PRODUCT, &masters, IdentityMode::Auto)?;
        report.record_load(tables::PRODUCT, Some(CohortKind::Auto), outcome.rows);
        for (branch, id) in branches.iter_mut().zip(outcome.assigned_ids) {
            branch.set("proId", FieldValue::Integer(id));
        }
        let rows = self
            .loader
            .load(conn, tables::PRODUCT_BRANCH, &branches, IdentityMode::Auto)?
            .rows;
        report.record_load(tables::PRODUCT_BRANCH, Some(CohortKind::Auto), rows);

        match CleanupRepository::new(conn).sync_product_units() {
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "计量单位目录同步失败");
                report.warnings.push(e.to_string());
            }
        }
        Ok(())
    }
}
