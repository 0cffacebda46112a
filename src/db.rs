// ==========================================
// Max Import - SQLite 连接初始化
// ==========================================
// 目标:
// - 所有连接只从 open_store 获得（唯一工厂）
// - 统一 foreign_keys / busy_timeout，导入之外库始终强制约束
// ==========================================

use crate::config::constants::tables;
use crate::config::ImportSettings;
use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 已知遗留表（约束闸门的逐表回退路径使用）
pub const LEGACY_TABLES: &[&str] = &[
    tables::PRODUCT,
    tables::PRODUCT_BRANCH,
    tables::PRODUCT_UNIT,
    tables::PRODUCT_LOT,
    tables::FISCAL_CODE,
    tables::CUSTOMER,
    tables::LEDGER,
];

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 都是“每个连接”单独生效
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 按配置打开目标库（唯一工厂；配置变化时重新调用以获得新句柄）
pub fn open_store(settings: &ImportSettings) -> rusqlite::Result<Connection> {
    tracing::debug!(db_path = %settings.db_path, "打开目标库");
    open_sqlite_connection(&settings.db_path)
}

/// 表是否存在
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1",
            [table],
            |_row| Ok(true),
        )
        .optional()?;
    Ok(found.unwrap_or(false))
}

/// 表的列信息
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    /// 主键序号（0 = 非主键）
    pub pk: i64,
}

/// 读取表结构（PRAGMA table_info）；表不存在时返回空
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(1)?,
            decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            pk: row.get(5)?,
        })
    })?;
    rows.collect()
}

/// 列是否存在（大小写不敏感，与 SQLite 标识符规则一致）
pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    Ok(table_columns(conn, table)?
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(column)))
}

/// 标识符加引号
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
