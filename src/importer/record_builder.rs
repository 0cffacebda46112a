// ==========================================
// Max Import - 记录构建
// ==========================================
// 职责: 源行 + 字段计划 → 每个目标表一条 NormalizedRecord
// 红线: 行级问题只跳过并计数，绝不中止整批
// 约束: 同一批次内的记录列集合与顺序一致（批量写入要求）
// ==========================================

use crate::config::constants::{ledger, role_flag, DEFAULT_UNIT, NEUTRAL_REFERENCE_KEY};
use crate::config::ImportSettings;
use crate::domain::catalog::{FieldCatalogEntry, NormalizeRule};
use crate::domain::record::{NormalizedRecord, ProductRow, SourceRow, SourceSheet};
use crate::domain::report::{SkipReason, SkippedRow};
use crate::domain::types::{DestTable, EntityFamily, FieldValue};
use crate::importer::column_mapper::FieldPlan;
use crate::importer::field_normalizer::{apply_rule, parse_date};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

/// 构建结果
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRow>,
}

impl<T> BuildOutcome<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, row: &SourceRow, reason: SkipReason) {
        debug!(row = row.row_number, reason = ?reason, "跳过行");
        self.skipped.push(SkippedRow {
            row_number: row.row_number,
            reason,
        });
    }
}

/// 记录构建器
pub struct RecordBuilder<'a> {
    plan: &'a FieldPlan,
    settings: &'a ImportSettings,
    now: NaiveDateTime,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(plan: &'a FieldPlan, settings: &'a ImportSettings) -> Self {
        Self {
            plan,
            settings,
            now: chrono::Local::now().naive_local(),
        }
    }

    /// 固定“当前时间”（测试用）
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    fn raw<'r>(&self, row: &'r SourceRow, key: &str) -> Option<&'r str> {
        self.plan
            .field(key)
            .and_then(|f| f.column_index)
            .and_then(|i| row.cell(i))
    }

    fn value(&self, row: &SourceRow, entry: &FieldCatalogEntry) -> FieldValue {
        apply_rule(entry.rule, self.raw(row, entry.key), self.settings.day_first)
    }

    fn text(&self, row: &SourceRow, key: &str) -> String {
        self.plan
            .field(key)
            .map(|f| self.value(row, f.entry))
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default()
    }

    fn identifier(&self, row: &SourceRow, key: &str) -> Option<String> {
        self.raw(row, key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    // ==========================================
    // 商品: 主表 + 门店关联表
    // ==========================================
    pub fn build_products(&self, sheet: &SourceSheet) -> BuildOutcome<ProductRow> {
        let mut outcome = BuildOutcome::new();

        for row in &sheet.rows {
            let description = self.text(row, "proDescricao");
            if description.is_empty() {
                outcome.skip(row, SkipReason::MissingRequired("proDescricao".to_string()));
                continue;
            }

            let reference = self.text(row, "zzz_proCodigo");

            let mut master = NormalizedRecord::new(row.row_number);
            master.raw_identifier = self.identifier(row, "proId");
            master.set("proDescricao", FieldValue::Text(description));
            master.set("zzz_proCodigo", FieldValue::Text(reference.clone()));
            master.set("zzz_proCodigoNcm", FieldValue::Text(self.text(row, "zzz_proCodigoNcm")));
            // 由参考编码同步回填
            master.set("ncmId", FieldValue::Integer(NEUTRAL_REFERENCE_KEY));

            let mut branch = NormalizedRecord::new(row.row_number);
            branch.raw_identifier = master.raw_identifier.clone();
            // 由标识分组（固定）或主表写入结果（自动）回填
            branch.set("proId", FieldValue::Null);
            branch.set("empId", FieldValue::Integer(self.settings.branch_id));

            for field in self.plan.fields.iter().filter(|f| f.entry.table == DestTable::ProductBranch) {
                let mut value = self.value(row, field.entry);
                if field.entry.key == "proUn" && value.as_text().map_or(true, str::is_empty) {
                    value = FieldValue::Text(DEFAULT_UNIT.to_string());
                }
                branch.set(field.entry.column, value);
            }
            branch.set("proCodigo", FieldValue::Text(reference));

            outcome.records.push(ProductRow { master, branch });
        }

        outcome
    }

    // ==========================================
    // 客户 / 供应商
    // ==========================================
    pub fn build_parties(&self, sheet: &SourceSheet, family: EntityFamily) -> BuildOutcome<NormalizedRecord> {
        let role = match family {
            EntityFamily::Supplier => role_flag::SUPPLIER,
            _ => role_flag::CUSTOMER,
        };
        let mut outcome = BuildOutcome::new();

        for row in &sheet.rows {
            let name = self.text(row, "cliNome");
            if name.is_empty() {
                outcome.skip(row, SkipReason::MissingRequired("cliNome".to_string()));
                continue;
            }

            let mut record = NormalizedRecord::new(row.row_number);
            record.raw_identifier = self.identifier(row, "cliId");

            for field in &self.plan.fields {
                if field.entry.rule == NormalizeRule::Identifier {
                    continue;
                }
                record.set(field.entry.column, self.value(row, field.entry));
            }
            record.set("cliTipoCad", FieldValue::Integer(role));
            record.set("cliDatCad", FieldValue::DateTime(self.now));

            outcome.records.push(record);
        }

        outcome
    }

    // ==========================================
    // 财务
    // ==========================================
    pub fn build_ledger(&self, sheet: &SourceSheet) -> BuildOutcome<NormalizedRecord> {
        let mut outcome = BuildOutcome::new();
        let due_column = self.settings.due_date_column.as_str();
        let status_mapped = self.plan.is_mapped("pgtPago");
        let kind_mapped = self.plan.is_mapped("pgtTipoConta");

        for row in &sheet.rows {
            let customer_id = self
                .plan
                .field("pgtClienteId")
                .and_then(|f| self.value(row, f.entry).as_integer())
                .unwrap_or(0);
            if customer_id <= 0 {
                outcome.skip(row, SkipReason::InvalidLink);
                continue;
            }

            let due_date = match parse_date(self.raw(row, "pgtVencimento"), self.settings.day_first) {
                Some(d) => d,
                None => {
                    outcome.skip(row, SkipReason::InvalidDueDate);
                    continue;
                }
            };

            let mut record = NormalizedRecord::new(row.row_number);
            for field in &self.plan.fields {
                let key = field.entry.key;
                let value = match key {
                    "pgtClienteId" => FieldValue::Integer(customer_id),
                    "pgtVencimento" => FieldValue::DateTime(due_date),
                    "pgtData" => match self.value(row, field.entry) {
                        FieldValue::Null => FieldValue::DateTime(self.now),
                        other => other,
                    },
                    // 状态列由下方推断/默认规则处理
                    "pgtPago" | "pgtTipoConta" => continue,
                    _ => self.value(row, field.entry),
                };
                let column = if key == "pgtVencimento" { due_column } else { field.entry.column };
                record.set(column, value);
            }

            let settled = !record.get("pgtDataQuitou").map_or(true, FieldValue::is_null);
            let explicit_status = if status_mapped { self.text(row, "pgtPago") } else { String::new() };
            let status = if !explicit_status.is_empty() {
                explicit_status
            } else if settled {
                ledger::PAID.to_string()
            } else {
                ledger::UNPAID.to_string()
            };
            record.set("pgtPago", FieldValue::Text(status));

            let explicit_kind = if kind_mapped { self.text(row, "pgtTipoConta") } else { String::new() };
            let kind = if explicit_kind.is_empty() {
                ledger::ACCOUNT_RECEIVABLE.to_string()
            } else {
                explicit_kind
            };
            record.set("pgtTipoConta", FieldValue::Text(kind));

            record.set("empId", FieldValue::Integer(self.settings.branch_id));
            record.set("pgtTipoVista", FieldValue::Integer(ledger::DEFAULT_CASH_KIND));
            record.set("pgtTipoPrazo", FieldValue::Integer(ledger::DEFAULT_TERM_KIND));

            outcome.records.push(record);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::ColumnMapping;
    use chrono::NaiveDate;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> SourceSheet {
        SourceSheet {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, cells)| SourceRow {
                    row_number: i + 2,
                    cells: cells.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_products_split_master_and_branch() {
        let s = sheet(
            &["id", "ref", "descricao", "ncm", "custo", "venda", "un"],
            &[&["10", "A-1", "Parafuso", "7318.15.00", "1,50", "3,00", "cx"]],
        );
        let mapping: ColumnMapping = [
            ("proId", "id"),
            ("zzz_proCodigo", "ref"),
            ("proDescricao", "descricao"),
            ("zzz_proCodigoNcm", "ncm"),
            ("zzz_proCusto", "custo"),
            ("zzz_proVenda", "venda"),
            ("proUn", "un"),
        ]
        .into_iter()
        .collect();
        let plan = FieldPlan::build(EntityFamily::Product, &mapping, &s.headers).unwrap();
        let settings = ImportSettings::default();

        let outcome = RecordBuilder::new(&plan, &settings).build_products(&s);
        assert!(outcome.skipped.is_empty());

        let row = &outcome.records[0];
        assert_eq!(row.master.raw_identifier.as_deref(), Some("10"));
        assert_eq!(row.master.get("zzz_proCodigoNcm"), Some(&FieldValue::Text("73181500".into())));
        assert_eq!(row.master.get("ncmId"), Some(&FieldValue::Integer(0)));
        assert!(row.master.get("proId").is_none());

        assert_eq!(row.branch.get("proCusto"), Some(&FieldValue::Real(1.5)));
        assert_eq!(row.branch.get("proVenda"), Some(&FieldValue::Real(3.0)));
        assert_eq!(row.branch.get("proUn"), Some(&FieldValue::Text("CX".into())));
        assert_eq!(row.branch.get("proCodigo"), Some(&FieldValue::Text("A-1".into())));
        assert_eq!(row.branch.get("empId"), Some(&FieldValue::Integer(1)));
        assert_eq!(row.branch.get("proEstoqueAtual"), Some(&FieldValue::Real(0.0)));
    }

    #[test]
    fn test_product_default_unit() {
        let s = sheet(&["descricao"], &[&["Porca"]]);
        let mapping: ColumnMapping = [("proDescricao", "descricao")].into_iter().collect();
        let plan = FieldPlan::build(EntityFamily::Product, &mapping, &s.headers).unwrap();
        let settings = ImportSettings::default();

        let outcome = RecordBuilder::new(&plan, &settings).build_products(&s);
        assert_eq!(
            outcome.records[0].branch.get("proUn"),
            Some(&FieldValue::Text("UN".into()))
        );
    }

    #[test]
    fn test_parties_role_flag_and_empty_name() {
        let s = sheet(
            &["codigo", "nome", "cpf"],
            &[&["5", "Maria", "123.456.789-09"], &["6", "  ", "1"]],
        );
        let mapping: ColumnMapping = [("cliId", "codigo"), ("cliNome", "nome"), ("cliCpfCgc", "cpf")]
            .into_iter()
            .collect();
        let plan = FieldPlan::build(EntityFamily::Supplier, &mapping, &s.headers).unwrap();
        let settings = ImportSettings::default();

        let outcome = RecordBuilder::new(&plan, &settings)
            .with_now(fixed_now())
            .build_parties(&s, EntityFamily::Supplier);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.skipped,
            vec![SkippedRow {
                row_number: 3,
                reason: SkipReason::MissingRequired("cliNome".into())
            }]
        );

        let record = &outcome.records[0];
        assert_eq!(record.get("cliTipoCad"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("cliDatCad"), Some(&FieldValue::DateTime(fixed_now())));
        assert_eq!(record.get("cliCpfCgc"), Some(&FieldValue::Text("12345678909".into())));
        assert!(record.get("cliId").is_none());
        assert_eq!(record.raw_identifier.as_deref(), Some("5"));
    }

    #[test]
    fn test_ledger_rules() {
        let s = sheet(
            &["id_cliente", "valor_original", "data_emissao", "data_vencimento", "data_pagamento"],
            &[
                &["7", "1.500,50", "", "10/01/2025", "12/01/2025"],
                &["8", "100", "02/01/2025", "15/01/2025", ""],
                &["0", "100", "", "15/01/2025", ""],
                &["9", "100", "", "amanhã", ""],
            ],
        );
        let mapping = crate::importer::column_mapper::auto_map(EntityFamily::Financial, &s.headers);
        let plan = FieldPlan::build(EntityFamily::Financial, &mapping, &s.headers).unwrap();
        let settings = ImportSettings::default();

        let outcome = RecordBuilder::new(&plan, &settings)
            .with_now(fixed_now())
            .build_ledger(&s);

        assert_eq!(outcome.records.len(), 2);
        let reasons: Vec<_> = outcome.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(reasons, vec![SkipReason::InvalidLink, SkipReason::InvalidDueDate]);

        let settled = &outcome.records[0];
        assert_eq!(settled.get("pgtValor"), Some(&FieldValue::Real(1500.50)));
        assert_eq!(settled.get("pgtPago"), Some(&FieldValue::Text("S".into())));
        assert_eq!(settled.get("pgtData"), Some(&FieldValue::DateTime(fixed_now())));
        assert_eq!(settled.get("pgtTipoConta"), Some(&FieldValue::Text("R".into())));
        let due = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(settled.get("pgtVecmto"), Some(&FieldValue::DateTime(due)));
        assert!(settled.get("pgtVencimento").is_none());

        let open = &outcome.records[1];
        assert_eq!(open.get("pgtPago"), Some(&FieldValue::Text("N".into())));
        assert_eq!(open.get("pgtTipoPrazo"), Some(&FieldValue::Integer(3)));

        let columns_a: Vec<_> = settled.columns().collect();
        let columns_b: Vec<_> = open.columns().collect();
        assert_eq!(columns_a, columns_b);
    }

    #[test]
    fn test_ledger_due_date_column_setting() {
        let s = sheet(&["id_cliente", "vencimento"], &[&["7", "2025-01-10"]]);
        let mapping = crate::importer::column_mapper::auto_map(EntityFamily::Financial, &s.headers);
        let plan = FieldPlan::build(EntityFamily::Financial, &mapping, &s.headers).unwrap();
        let settings = ImportSettings {
            due_date_column: "pgtVencimento".to_string(),
            ..ImportSettings::default()
        };

        let outcome = RecordBuilder::new(&plan, &settings).build_ledger(&s);
        assert!(outcome.records[0].get("pgtVencimento").is_some());
        assert!(outcome.records[0].get("pgtVecmto").is_none());
    }
}
