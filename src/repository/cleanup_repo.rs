// ==========================================
// Max Import - 维护操作 Repository
// ==========================================
// 职责:
// 1. 导入前清空（按实体族，保留系统记录）并重置自增序列
// 2. 商品导入后的计量单位目录同步
// 约束: 清空操作须由调用方置于约束闸门之内
// ==========================================

use crate::config::constants::{role_flag, tables, RESERVED_ADMIN_ID};
use crate::db::{quote_ident, table_exists};
use crate::domain::types::EntityFamily;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// 清空范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupScope {
    Products,
    Customers,
    Suppliers,
    Financial,
    /// 全部重置
    All,
}

impl CleanupScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupScope::Products => "products",
            CleanupScope::Customers => "customers",
            CleanupScope::Suppliers => "suppliers",
            CleanupScope::Financial => "financial",
            CleanupScope::All => "all",
        }
    }

    fn includes(&self, other: CleanupScope) -> bool {
        *self == CleanupScope::All || *self == other
    }
}

impl From<EntityFamily> for CleanupScope {
    fn from(family: EntityFamily) -> Self {
        match family {
            EntityFamily::Product => CleanupScope::Products,
            EntityFamily::Customer => CleanupScope::Customers,
            EntityFamily::Supplier => CleanupScope::Suppliers,
            EntityFamily::Financial => CleanupScope::Financial,
        }
    }
}

impl fmt::Display for CleanupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CleanupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "tudo" => Ok(CleanupScope::All),
            other => other
                .parse::<EntityFamily>()
                .map(CleanupScope::from)
                .map_err(|_| format!("未知清空范围: {}", other)),
        }
    }
}

/// 清空结果（表 → 删除行数）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupOutcome {
    pub deleted: Vec<(String, usize)>,
}

impl CleanupOutcome {
    pub fn total(&self) -> usize {
        self.deleted.iter().map(|(_, n)| n).sum()
    }

    pub fn deleted_from(&self, table: &str) -> usize {
        self.deleted
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, n)| n)
            .sum()
    }
}

/// 维护操作
pub struct CleanupRepository<'c> {
    conn: &'c Connection,
}

impl<'c> CleanupRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 清空指定范围（单事务）
    pub fn clear(&self, scope: CleanupScope) -> RepositoryResult<CleanupOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = CleanupOutcome::default();

        if scope.includes(CleanupScope::Products) {
            delete_where(&tx, &mut outcome, tables::PRODUCT_LOT, None, [])?;
            reseed(&tx, tables::PRODUCT_LOT, 0)?;
            delete_where(&tx, &mut outcome, tables::PRODUCT_BRANCH, None, [])?;
            delete_where(
                &tx,
                &mut outcome,
                tables::PRODUCT,
                Some("proId > ?1"),
                [RESERVED_ADMIN_ID],
            )?;
            reseed(&tx, tables::PRODUCT, RESERVED_ADMIN_ID)?;
            delete_where(&tx, &mut outcome, tables::PRODUCT_UNIT, None, [])?;
            reseed(&tx, tables::PRODUCT_UNIT, 0)?;
        }

        if scope.includes(CleanupScope::Customers) {
            let [kind_a, kind_b] = role_flag::PROTECTED_KINDS;
            delete_where(
                &tx,
                &mut outcome,
                tables::CUSTOMER,
                Some("cliId <> ?1 AND cliTipoCad NOT IN (?2, ?3)"),
                [RESERVED_ADMIN_ID, kind_a, kind_b],
            )?;
        }

        if scope.includes(CleanupScope::Suppliers) {
            delete_where(
                &tx,
                &mut outcome,
                tables::CUSTOMER,
                Some("cliId <> ?1 AND cliTipoCad = ?2"),
                [RESERVED_ADMIN_ID, role_flag::SUPPLIER],
            )?;
        }

        if scope.includes(CleanupScope::Financial) {
            delete_where(&tx, &mut outcome, tables::LEDGER, None, [])?;
            reseed(&tx, tables::LEDGER, 0)?;
        }

        tx.commit()?;
        info!(scope = %scope, rows = outcome.total(), "清空完成");
        Ok(outcome)
    }

    /// 计量单位目录同步：produto_empresa 中出现但 produtoUn 中没有的单位
    pub fn sync_product_units(&self) -> RepositoryResult<usize> {
        let sql = format!(
            "INSERT INTO {unit} (unpUn, unpDescricao)
             SELECT DISTINCT proUn, proUn FROM {branch}
             WHERE proUn IS NOT NULL AND proUn <> ''
               AND proUn NOT IN (SELECT unpUn FROM {unit} WHERE unpUn IS NOT NULL)",
            unit = quote_ident(tables::PRODUCT_UNIT),
            branch = quote_ident(tables::PRODUCT_BRANCH),
        );
        let inserted = self.conn.execute(&sql, [])?;
        info!(inserted, "计量单位目录已同步");
        Ok(inserted)
    }
}

fn delete_where<const N: usize>(
    tx: &Transaction,
    outcome: &mut CleanupOutcome,
    table: &str,
    condition: Option<&str>,
    args: [i64; N],
) -> RepositoryResult<()> {
    if !table_exists(tx, table)? {
        warn!(table, "表不存在，跳过清空");
        return Ok(());
    }

    let sql = match condition {
        Some(cond) => format!("DELETE FROM {} WHERE {}", quote_ident(table), cond),
        None => format!("DELETE FROM {}", quote_ident(table)),
    };
    let deleted = tx.execute(&sql, rusqlite::params_from_iter(args))?;
    outcome.deleted.push((table.to_string(), deleted));
    Ok(())
}

/// 重置自增序列（下一个分配值为 seq + 1）
fn reseed(tx: &Transaction, table: &str, seq: i64) -> RepositoryResult<()> {
    // 库中没有 AUTOINCREMENT 表时 sqlite_sequence 不存在
    if !table_exists(tx, "sqlite_sequence")? {
        return Ok(());
    }
    tx.execute(
        "UPDATE sqlite_sequence SET seq = ?1 WHERE name = ?2",
        params![seq, table],
    )?;
    Ok(())
}
