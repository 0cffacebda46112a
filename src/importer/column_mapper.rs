// ==========================================
// Max Import - 列映射
// ==========================================
// 职责:
// 1. 自动映射: 目录字段 → 源表头（确定性，无 I/O）
// 2. 字段计划: 映射 + 表头 → 每个字段的列位置（每次导入构建一次）
// 匹配优先级: 大小写不敏感的完全相等 > 同义词规则；首个命中的表头胜出
// ==========================================

use crate::domain::catalog::{catalog_for, FieldCatalogEntry};
use crate::domain::record::ColumnMapping;
use crate::domain::types::EntityFamily;
use crate::importer::error::{ImportError, ImportResult};
use tracing::{debug, warn};

// ==========================================
// 同义词规则
// ==========================================
#[derive(Debug, Clone, Copy)]
enum SynonymRule {
    /// 字段键完全相等 且 表头属于列表
    HeaderIn {
        key: &'static str,
        headers: &'static [&'static str],
    },
    /// 字段键包含片段 且 表头包含任一片段
    KeyFragment {
        fragment: &'static str,
        header_fragments: &'static [&'static str],
    },
    /// 字段键完全相等 且 表头包含任一片段
    HeaderContains {
        key: &'static str,
        fragments: &'static [&'static str],
    },
}

impl SynonymRule {
    /// key / header 均已小写
    fn matches(&self, field_key: &str, key: &str, header: &str) -> bool {
        match self {
            SynonymRule::HeaderIn { key: k, headers } => {
                *k == field_key && headers.contains(&header)
            }
            SynonymRule::KeyFragment {
                fragment,
                header_fragments,
            } => key.contains(fragment) && header_fragments.iter().any(|f| header.contains(f)),
            SynonymRule::HeaderContains { key: k, fragments } => {
                *k == field_key && fragments.iter().any(|f| header.contains(f))
            }
        }
    }
}

use SynonymRule::{HeaderContains, HeaderIn, KeyFragment};

/// 商品 / 客户 / 供应商共用
static REGISTRY_RULES: &[SynonymRule] = &[
    // 商品
    HeaderIn { key: "zzz_proCodigo", headers: &["referencia", "ref", "codigo", "barras", "cod"] },
    HeaderIn { key: "proDescricao", headers: &["nome", "descricao", "descrição", "produto"] },
    KeyFragment { fragment: "custo", header_fragments: &["custo"] },
    KeyFragment { fragment: "venda", header_fragments: &["venda"] },
    KeyFragment { fragment: "un", header_fragments: &["unidade"] },
    // 客户
    HeaderIn { key: "cliId", headers: &["id", "codigo", "código"] },
    HeaderIn { key: "cliNome", headers: &["nome", "razao", "razão", "cliente"] },
    HeaderIn { key: "cliFantasia", headers: &["fantasia", "apelido"] },
    HeaderContains { key: "cliCpfCgc", fragments: &["cpf", "cnpj"] },
    HeaderContains { key: "cliTipo", fragments: &["tipo"] },
    // 地址
    KeyFragment { fragment: "cep", header_fragments: &["cep"] },
    KeyFragment { fragment: "bairro", header_fragments: &["bairro"] },
    KeyFragment { fragment: "cidade", header_fragments: &["cidade"] },
    KeyFragment { fragment: "uf", header_fragments: &["uf"] },
    HeaderContains { key: "cliFatEnd", fragments: &["rua", "endereco", "endereço"] },
    KeyFragment { fragment: "numero", header_fragments: &["num", "nº"] },
    // 联系方式
    KeyFragment { fragment: "email", header_fragments: &["email", "e-mail"] },
    KeyFragment { fragment: "fone", header_fragments: &["telefone"] },
    KeyFragment { fragment: "celular", header_fragments: &["celular"] },
    KeyFragment { fragment: "obs", header_fragments: &["obs"] },
];

/// 财务（固定启发式，无人工复核）
static FINANCIAL_RULES: &[SynonymRule] = &[
    HeaderIn { key: "pgtClienteId", headers: &["id_cliente", "cliente_id", "cod_cliente", "codigo_cliente", "cliente"] },
    HeaderIn { key: "pgtValor", headers: &["valor_original", "valor"] },
    HeaderIn { key: "pgtValorJuros", headers: &["juros", "valor_juros"] },
    HeaderIn { key: "pgtData", headers: &["data_emissao", "emissao", "emissão"] },
    HeaderIn { key: "pgtVencimento", headers: &["data_vencimento", "vencimento"] },
    HeaderIn { key: "pgtDataQuitou", headers: &["data_pagamento", "pagamento", "data_quitacao"] },
    HeaderIn { key: "pgtNumDoc", headers: &["numero_doc", "documento", "num_doc"] },
    HeaderIn { key: "pgtNossoNumero", headers: &["nosso_numero"] },
    HeaderIn { key: "pgtObs", headers: &["obs", "observacao", "observação"] },
    HeaderIn { key: "pgtTipoConta", headers: &["tipo_conta"] },
    HeaderIn { key: "pgtPago", headers: &["pago"] },
    HeaderIn { key: "pgtBanco", headers: &["banco"] },
    HeaderIn { key: "pgtAgencia", headers: &["agencia", "agência"] },
    HeaderIn { key: "pgtContaC", headers: &["conta", "conta_corrente"] },
];

fn rules_for(family: EntityFamily) -> &'static [SynonymRule] {
    match family {
        EntityFamily::Financial => FINANCIAL_RULES,
        _ => REGISTRY_RULES,
    }
}

/// 自动映射：每个目录字段取第一个命中的表头
pub fn auto_map(family: EntityFamily, headers: &[String]) -> ColumnMapping {
    let rules = rules_for(family);
    let mut mapping = ColumnMapping::new();

    for entry in catalog_for(family) {
        let key = entry.key.to_lowercase();
        let hit = headers.iter().find(|header| {
            let header = header.trim().to_lowercase();
            if header.is_empty() {
                return false;
            }
            header == key || rules.iter().any(|r| r.matches(entry.key, &key, &header))
        });

        if let Some(header) = hit {
            debug!(field = entry.key, column = %header, "自动映射");
            mapping.insert(entry.key, header.clone());
        }
    }

    mapping
}

// ==========================================
// FieldPlan - 字段计划
// ==========================================

/// 单个字段的计划项
#[derive(Debug, Clone, Copy)]
pub struct PlannedField {
    pub entry: &'static FieldCatalogEntry,
    /// 源表头中的列位置（None = 未映射）
    pub column_index: Option<usize>,
}

/// 字段计划（字段 → 标准化规则 / 目标列 / 源列位置）
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub family: EntityFamily,
    pub fields: Vec<PlannedField>,
}

impl FieldPlan {
    /// 构建字段计划
    ///
    /// 映射到不存在的表头按未映射处理；任一必填字段未映射 → MappingIncomplete
    pub fn build(
        family: EntityFamily,
        mapping: &ColumnMapping,
        headers: &[String],
    ) -> ImportResult<Self> {
        let mut fields = Vec::new();
        let mut missing = Vec::new();

        for entry in catalog_for(family) {
            let column_index = match mapping.column_for(entry.key) {
                Some(column) => {
                    let index = headers.iter().position(|h| h == column);
                    if index.is_none() {
                        warn!(field = entry.key, column = %column, "映射的列不在表头中，按未映射处理");
                    }
                    index
                }
                None => None,
            };

            if entry.required && column_index.is_none() {
                missing.push(entry.key.to_string());
            }

            fields.push(PlannedField {
                entry,
                column_index,
            });
        }

        if !missing.is_empty() {
            return Err(ImportError::MappingIncomplete {
                family: family.to_string(),
                fields: missing,
            });
        }

        Ok(Self { family, fields })
    }

    pub fn field(&self, key: &str) -> Option<&PlannedField> {
        self.fields.iter().find(|f| f.entry.key == key)
    }

    pub fn is_mapped(&self, key: &str) -> bool {
        self.field(key).map_or(false, |f| f.column_index.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_product_synonyms() {
        let h = headers(&["Codigo", "Descricao", "Preco Custo", "Preco Venda", "Unidade", "proId"]);
        let mapping = auto_map(EntityFamily::Product, &h);

        assert_eq!(mapping.column_for("zzz_proCodigo"), Some("Codigo"));
        assert_eq!(mapping.column_for("proDescricao"), Some("Descricao"));
        assert_eq!(mapping.column_for("zzz_proCusto"), Some("Preco Custo"));
        assert_eq!(mapping.column_for("zzz_proVenda"), Some("Preco Venda"));
        assert_eq!(mapping.column_for("proUn"), Some("Unidade"));
        assert_eq!(mapping.column_for("proId"), Some("proId"));
        assert_eq!(mapping.column_for("proCodCSOSN"), None);
    }

    #[test]
    fn test_first_matching_header_wins() {
        let h = headers(&["nome", "razao"]);
        let mapping = auto_map(EntityFamily::Customer, &h);
        assert_eq!(mapping.column_for("cliNome"), Some("nome"));
    }

    #[test]
    fn test_customer_contains_rules() {
        let h = headers(&["CPF/CNPJ", "Tipo Pessoa", "E-mail", "Telefone", "CEP"]);
        let mapping = auto_map(EntityFamily::Customer, &h);

        assert_eq!(mapping.column_for("cliCpfCgc"), Some("CPF/CNPJ"));
        assert_eq!(mapping.column_for("cliTipo"), Some("Tipo Pessoa"));
        assert_eq!(mapping.column_for("cliEmail"), Some("E-mail"));
        assert_eq!(mapping.column_for("CliFone"), Some("Telefone"));
        assert_eq!(mapping.column_for("cliFatCep"), Some("CEP"));
    }

    #[test]
    fn test_financial_fixed_heuristics() {
        let h = headers(&["id_cliente", "valor_original", "data_vencimento", "data_pagamento"]);
        let mapping = auto_map(EntityFamily::Financial, &h);

        assert_eq!(mapping.column_for("pgtClienteId"), Some("id_cliente"));
        assert_eq!(mapping.column_for("pgtValor"), Some("valor_original"));
        assert_eq!(mapping.column_for("pgtVencimento"), Some("data_vencimento"));
        assert_eq!(mapping.column_for("pgtDataQuitou"), Some("data_pagamento"));
        assert_eq!(mapping.column_for("pgtPago"), None);
    }

    #[test]
    fn test_plan_missing_header_is_unmapped() {
        let h = headers(&["nome"]);
        let mut mapping = ColumnMapping::new();
        mapping.insert("cliNome", "nome");
        mapping.insert("cliEmail", "coluna_removida");

        let plan = FieldPlan::build(EntityFamily::Customer, &mapping, &h).unwrap();
        assert!(plan.is_mapped("cliNome"));
        assert!(!plan.is_mapped("cliEmail"));
    }

    #[test]
    fn test_plan_required_unmapped() {
        let h = headers(&["valor"]);
        let mapping = auto_map(EntityFamily::Financial, &h);

        match FieldPlan::build(EntityFamily::Financial, &mapping, &h) {
            Err(ImportError::MappingIncomplete { fields, .. }) => {
                assert!(fields.contains(&"pgtClienteId".to_string()));
                assert!(fields.contains(&"pgtVencimento".to_string()));
            }
            other => panic!("expected MappingIncomplete, got {:?}", other),
        }
    }
}
