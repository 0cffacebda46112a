// ==========================================
// Max Import - 批量写入
// ==========================================
// 职责: 单表批量插入（一个事务，分块执行，一次提交）
// 红线: 任一块失败 → 整个调用回滚，库中不可见任何一行
// 注: 原子性仅限单次调用，跨表一致性由调用方的步骤顺序保证
// ==========================================

use crate::config::constants::DEFAULT_CHUNK_SIZE;
use crate::db::{quote_ident, table_columns};
use crate::domain::record::NormalizedRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params_from_iter, Connection, Transaction};
use tracing::{debug, error, info};

/// 标识写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode<'a> {
    /// 显式写入标识列（固定分组）；列必须是 INTEGER PRIMARY KEY
    Explicit(&'a str),
    /// 不写入标识，由库分配（或目标表无标识列）
    Auto,
}

/// 写入结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOutcome {
    pub rows: usize,
    /// 每行的 rowid（与批次顺序一致）
    pub assigned_ids: Vec<i64>,
}

/// 批量写入器
#[derive(Debug, Clone, Copy)]
pub struct BulkLoader {
    chunk_size: usize,
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BulkLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 批量插入
    ///
    /// # 参数
    /// - table: 目标表
    /// - batch: 列集合一致的记录（以首行为准）
    /// - mode: 标识写入方式
    ///
    /// # 返回
    /// 空批次直接返回（不开启事务）；失败时返回 BulkInsertFailure，库保持调用前状态
    pub fn load(
        &self,
        conn: &Connection,
        table: &str,
        batch: &[NormalizedRecord],
        mode: IdentityMode<'_>,
    ) -> RepositoryResult<LoadOutcome> {
        let first = match batch.first() {
            Some(first) => first,
            None => {
                debug!(table, "空批次，跳过");
                return Ok(LoadOutcome::default());
            }
        };

        let columns: Vec<&str> = first.columns().collect();
        for record in batch {
            if !record.columns().eq(columns.iter().copied()) {
                return Err(RepositoryError::HeterogeneousBatch {
                    table: table.to_string(),
                    row: record.source_row,
                });
            }
        }

        let tx = conn.unchecked_transaction()?;
        verify_columns(&tx, table, &columns, mode)?;

        // 标识显式写入开关与写入处于同一事务
        if let IdentityMode::Explicit(id_column) = mode {
            debug!(table, id_column, "标识显式写入: 开启");
        }

        let assigned_ids = match self.insert_chunks(&tx, table, &columns, batch) {
            Ok(ids) => ids,
            Err(e) => {
                error!(table, rows = batch.len(), error = %e, "批量写入失败，事务回滚");
                return Err(RepositoryError::BulkInsertFailure {
                    table: table.to_string(),
                    rows: batch.len(),
                    message: e.to_string(),
                });
            }
        };

        if let IdentityMode::Explicit(id_column) = mode {
            debug!(table, id_column, "标识显式写入: 关闭");
        }

        tx.commit().map_err(|e| RepositoryError::BulkInsertFailure {
            table: table.to_string(),
            rows: batch.len(),
            message: e.to_string(),
        })?;

        info!(table, rows = batch.len(), "批量写入完成");
        Ok(LoadOutcome {
            rows: batch.len(),
            assigned_ids,
        })
    }

    fn insert_chunks(
        &self,
        tx: &Transaction,
        table: &str,
        columns: &[&str],
        batch: &[NormalizedRecord],
    ) -> rusqlite::Result<Vec<i64>> {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            column_list,
            placeholders
        );

        let mut stmt = tx.prepare(&sql)?;
        let mut ids = Vec::with_capacity(batch.len());
        let chunk_count = batch.len().div_ceil(self.chunk_size);

        for (index, chunk) in batch.chunks(self.chunk_size).enumerate() {
            for record in chunk {
                stmt.execute(params_from_iter(record.values()))?;
                ids.push(tx.last_insert_rowid());
            }
            debug!(table, chunk = index + 1, chunks = chunk_count, rows = chunk.len(), "分块写入");
        }

        Ok(ids)
    }
}

/// 写入前核对目标表结构
fn verify_columns(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    mode: IdentityMode<'_>,
) -> RepositoryResult<()> {
    let schema = table_columns(conn, table)?;

    for column in columns {
        if !schema.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
            return Err(RepositoryError::SchemaMismatch {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }

    if let IdentityMode::Explicit(id_column) = mode {
        let pk_columns: Vec<_> = schema.iter().filter(|c| c.pk > 0).collect();
        let is_rowid_alias = pk_columns.len() == 1
            && pk_columns[0].name.eq_ignore_ascii_case(id_column)
            && pk_columns[0].decl_type.eq_ignore_ascii_case("INTEGER");
        if !is_rowid_alias || !columns.iter().any(|c| c.eq_ignore_ascii_case(id_column)) {
            return Err(RepositoryError::SchemaMismatch {
                table: table.to_string(),
                column: id_column.to_string(),
            });
        }
    }

    Ok(())
}
