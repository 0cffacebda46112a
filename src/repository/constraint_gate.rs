// ==========================================
// Max Import - 约束闸门
// ==========================================
// 职责: 写入前挂起外键检查与触发器，任何退出路径上恢复
// 策略:
// - 全局: PRAGMA foreign_keys = OFF（回读确认）+ 一个事务内暂存并删除全部触发器
// - 回退: 全局触发器暂存失败时，按已知表逐表挂起，单表失败仅记录日志
// - 外键指令不生效（回读仍为 ON）时返回 ConstraintGateError，不进入写入
// 注: PRAGMA foreign_keys 在事务内无效，闸门必须在事务之外启用
// ==========================================

use crate::db::{quote_ident, LEGACY_TABLES};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

/// 被暂存的触发器定义
#[derive(Debug, Clone, PartialEq)]
pub struct StashedTrigger {
    pub name: String,
    pub table: String,
    pub sql: String,
}

/// 闸门启用方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateScope {
    /// 全局指令生效
    Broad,
    /// 触发器回退为逐表挂起（外键仍为全局关闭）
    PerTable,
}

/// 约束闸门（RAII）
///
/// `release` 显式恢复并返回结果；未调用时在 Drop 中恢复
pub struct ConstraintGate<'c> {
    conn: &'c Connection,
    previous_foreign_keys: bool,
    stashed: Vec<StashedTrigger>,
    scope: GateScope,
    released: bool,
}

impl<'c> ConstraintGate<'c> {
    /// 启用闸门
    pub fn engage(conn: &'c Connection) -> RepositoryResult<Self> {
        let previous_foreign_keys = read_foreign_keys(conn)?;

        // SQLite 无逐表外键开关：全局指令不生效时拒绝启用，任何写入都不会发生
        if let Err(e) = suspend_foreign_keys(conn) {
            error!(error = %e, "外键检查无法挂起，约束闸门未启用");
            return Err(RepositoryError::ConstraintGateError(e.to_string()));
        }

        let mut gate = Self {
            conn,
            previous_foreign_keys,
            stashed: Vec::new(),
            scope: GateScope::Broad,
            released: false,
        };

        match stash_all_triggers(conn) {
            Ok(stashed) => gate.stashed = stashed,
            Err(e) => {
                warn!(error = %e, "全局触发器挂起失败，回退为逐表挂起");
                gate.scope = GateScope::PerTable;
                gate.stashed = stash_per_table(conn, LEGACY_TABLES);
            }
        }

        info!(
            scope = ?gate.scope,
            triggers = gate.stashed.len(),
            "约束闸门已启用"
        );
        Ok(gate)
    }

    pub fn scope(&self) -> GateScope {
        self.scope
    }

    pub fn stashed_triggers(&self) -> &[StashedTrigger] {
        &self.stashed
    }

    /// 恢复约束
    pub fn release(mut self) -> RepositoryResult<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&mut self) -> RepositoryResult<()> {
        let mut failures = Vec::new();

        for trigger in self.stashed.drain(..) {
            if let Err(e) = self.conn.execute_batch(&trigger.sql) {
                error!(trigger = %trigger.name, table = %trigger.table, error = %e, "触发器恢复失败");
                failures.push(format!("{}: {}", trigger.name, e));
            } else {
                debug!(trigger = %trigger.name, "触发器已恢复");
            }
        }

        let pragma = if self.previous_foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        };
        if let Err(e) = self.conn.execute_batch(pragma) {
            error!(error = %e, "外键设置恢复失败");
            failures.push(format!("foreign_keys: {}", e));
        }

        if failures.is_empty() {
            info!("约束闸门已关闭");
            Ok(())
        } else {
            Err(RepositoryError::DatabaseTransactionError(format!(
                "约束恢复失败: {}",
                failures.join("; ")
            )))
        }
    }
}

impl Drop for ConstraintGate<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("约束闸门未显式关闭，在 Drop 中恢复");
            let _ = self.restore();
        }
    }
}

/// 在约束挂起期间执行 f；无论 f 成败都先恢复约束再返回
pub fn with_constraints_suspended<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<RepositoryError>,
{
    let gate = ConstraintGate::engage(conn)?;
    let result = f(conn);
    let restored = gate.release();

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            error!(error = %restore_err, "操作失败且约束恢复失败");
            Err(e)
        }
    }
}

fn read_foreign_keys(conn: &Connection) -> RepositoryResult<bool> {
    let value: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    Ok(value != 0)
}

fn suspend_foreign_keys(conn: &Connection) -> RepositoryResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    if read_foreign_keys(conn)? {
        return Err(RepositoryError::DatabaseTransactionError(
            "PRAGMA foreign_keys 回读仍为 ON（连接处于事务中？）".to_string(),
        ));
    }
    Ok(())
}

fn list_triggers(conn: &Connection, table: Option<&str>) -> rusqlite::Result<Vec<StashedTrigger>> {
    let mut stmt = conn.prepare(
        "SELECT name, tbl_name, sql FROM sqlite_master
         WHERE type = 'trigger' AND (?1 IS NULL OR tbl_name = ?1)
         ORDER BY name",
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut triggers = Vec::new();
    for row in rows {
        let (name, table, sql) = row?;
        if let Some(sql) = sql {
            triggers.push(StashedTrigger { name, table, sql });
        }
    }
    Ok(triggers)
}

/// 一个事务内暂存并删除全部触发器
fn stash_all_triggers(conn: &Connection) -> RepositoryResult<Vec<StashedTrigger>> {
    let tx = conn.unchecked_transaction()?;
    let triggers = list_triggers(&tx, None)?;
    for trigger in &triggers {
        tx.execute_batch(&format!("DROP TRIGGER IF EXISTS {};", quote_ident(&trigger.name)))?;
    }
    tx.commit()?;
    Ok(triggers)
}

/// 逐表暂存并删除触发器；单表失败仅记录
pub(crate) fn stash_per_table(conn: &Connection, tables: &[&str]) -> Vec<StashedTrigger> {
    let mut stashed = Vec::new();

    for &table in tables {
        let result = (|| -> RepositoryResult<Vec<StashedTrigger>> {
            let tx = conn.unchecked_transaction()?;
            let triggers = list_triggers(&tx, Some(table))?;
            for trigger in &triggers {
                tx.execute_batch(&format!("DROP TRIGGER IF EXISTS {};", quote_ident(&trigger.name)))?;
            }
            tx.commit()?;
            Ok(triggers)
        })();

        match result {
            Ok(triggers) => {
                debug!(table, triggers = triggers.len(), "表触发器已挂起");
                stashed.extend(triggers);
            }
            Err(e) => warn!(table, error = %e, "表触发器挂起失败，继续"),
        }
    }

    stashed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::configure_sqlite_connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        conn.execute_batch(
            "CREATE TABLE ncm (ncmId INTEGER PRIMARY KEY AUTOINCREMENT, ncmCodigo TEXT UNIQUE);
             CREATE TABLE produto (
                proId INTEGER PRIMARY KEY AUTOINCREMENT,
                proDescricao TEXT,
                ncmId INTEGER REFERENCES ncm(ncmId)
             );
             CREATE TRIGGER trg_produto_bloqueio BEFORE INSERT ON produto
             BEGIN SELECT RAISE(ABORT, 'bloqueado'); END;",
        )
        .unwrap();
        conn
    }

    fn trigger_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'trigger'",
            [],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_gate_suspends_and_restores() {
        let conn = setup();
        assert!(conn
            .execute("INSERT INTO produto (proDescricao) VALUES ('x')", [])
            .is_err());

        let gate = ConstraintGate::engage(&conn).unwrap();
        assert_eq!(gate.scope(), GateScope::Broad);
        assert_eq!(gate.stashed_triggers().len(), 1);

        // 触发器与外键均已挂起
        conn.execute(
            "INSERT INTO produto (proDescricao, ncmId) VALUES ('x', 999)",
            [],
        )
        .unwrap();

        gate.release().unwrap();

        assert_eq!(trigger_count(&conn), 1);
        assert!(read_foreign_keys(&conn).unwrap());
        assert!(conn
            .execute("INSERT INTO produto (proDescricao) VALUES ('y')", [])
            .is_err());
    }

    #[test]
    fn test_gate_restores_on_drop() {
        let conn = setup();
        {
            let _gate = ConstraintGate::engage(&conn).unwrap();
            assert_eq!(trigger_count(&conn), 0);
        }
        assert_eq!(trigger_count(&conn), 1);
        assert!(read_foreign_keys(&conn).unwrap());
    }

    #[test]
    fn test_with_constraints_suspended_restores_on_error() {
        let conn = setup();

        let result: Result<(), RepositoryError> = with_constraints_suspended(&conn, |c| {
            c.execute("INSERT INTO produto (proDescricao) VALUES ('x')", [])?;
            Err(RepositoryError::InternalError("falha simulada".into()))
        });

        assert!(matches!(result, Err(RepositoryError::InternalError(_))));
        assert_eq!(trigger_count(&conn), 1);
        assert!(read_foreign_keys(&conn).unwrap());
    }

    #[test]
    fn test_per_table_fallback_skips_unknown_tables() {
        let conn = setup();
        let stashed = stash_per_table(&conn, &["tabela_inexistente", "produto"]);

        assert_eq!(stashed.len(), 1);
        assert_eq!(stashed[0].table, "produto");
        assert_eq!(trigger_count(&conn), 0);

        for trigger in &stashed {
            conn.execute_batch(&trigger.sql).unwrap();
        }
        assert_eq!(trigger_count(&conn), 1);
    }

    #[test]
    fn test_previous_foreign_keys_off_is_kept() {
        let conn = setup();
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();

        let gate = ConstraintGate::engage(&conn).unwrap();
        gate.release().unwrap();

        assert!(!read_foreign_keys(&conn).unwrap());
    }

    #[test]
    fn test_gate_refuses_when_foreign_keys_stay_on() {
        let conn = setup();
        // 事务内 PRAGMA foreign_keys 不生效
        conn.execute_batch("BEGIN").unwrap();

        let result = ConstraintGate::engage(&conn);
        assert!(matches!(result, Err(RepositoryError::ConstraintGateError(_))));

        // 约束保持生效，触发器未被删除
        assert!(read_foreign_keys(&conn).unwrap());
        assert_eq!(trigger_count(&conn), 1);
        assert!(conn
            .execute("INSERT INTO produto (proDescricao) VALUES ('x')", [])
            .is_err());

        conn.execute_batch("ROLLBACK").unwrap();
    }
}
