// ==========================================
// Max Import - 分类编码参考表 Repository
// ==========================================
// 表: ncm (ncmId INTEGER PRIMARY KEY AUTOINCREMENT, ncmCodigo TEXT UNIQUE)
// 红线: 只追加，不更新、不删除
// ==========================================

use crate::config::constants::tables;
use crate::db::quote_ident;
use crate::domain::record::ReferenceEntry;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};

/// 参考表数据访问
pub trait ReferenceRepository {
    /// 查询已存在的编码（只返回命中的部分）
    fn find_existing(&self, codes: &[String]) -> RepositoryResult<Vec<ReferenceEntry>>;

    /// 创建单个编码，返回代理键
    fn create(&self, code: &str) -> RepositoryResult<i64>;
}

/// SQLite 实现（借用调用方的连接）
pub struct SqliteReferenceRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteReferenceRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn find_existing(&self, codes: &[String]) -> RepositoryResult<Vec<ReferenceEntry>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT ncmCodigo, ncmId FROM {} WHERE ncmCodigo = ?1",
            quote_ident(tables::FISCAL_CODE)
        ))?;

        let mut found = Vec::new();
        for code in codes {
            let mut rows = stmt.query(params![code])?;
            if let Some(row) = rows.next()? {
                found.push(ReferenceEntry {
                    code: row.get(0)?,
                    key: row.get(1)?,
                });
            }
        }
        Ok(found)
    }

    fn create(&self, code: &str) -> RepositoryResult<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (ncmCodigo) VALUES (?1)",
                quote_ident(tables::FISCAL_CODE)
            ),
            params![code],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
