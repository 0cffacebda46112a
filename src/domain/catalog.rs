// ==========================================
// Max Import - 字段目录
// ==========================================
// 职责: 每个实体族的目标字段清单（静态）
// 内容: 字段键 / 显示名 / 目标表 / 目标列 / 必填 / 标准化规则
// ==========================================

use crate::domain::types::{DestTable, EntityFamily};
use serde::Serialize;

/// 标准化规则
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum NormalizeRule {
    /// 去空白 + 截断
    Text { max_len: usize },
    /// 去空白 + 截断 + 大写
    UpperText { max_len: usize },
    /// 仅保留数字 + 截断（证件/电话/邮编）
    Digits { max_len: usize },
    /// 金额/数量（永不失败）
    Currency,
    /// 整数（无法解析 → 0）
    Integer,
    /// 日期（无法解析 → 缺失）
    Date,
    /// 外部标识（不写入目标列，由 IdentityStrategy 处理）
    Identifier,
}

/// 字段目录项
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldCatalogEntry {
    /// 字段键（映射字典的 key）
    pub key: &'static str,
    /// 显示名
    pub label: &'static str,
    /// 目标表
    pub table: DestTable,
    /// 目标列
    pub column: &'static str,
    /// 必填（缺少映射 → MappingIncomplete）
    pub required: bool,
    /// 标准化规则
    pub rule: NormalizeRule,
}

const fn field(
    key: &'static str,
    label: &'static str,
    table: DestTable,
    column: &'static str,
    required: bool,
    rule: NormalizeRule,
) -> FieldCatalogEntry {
    FieldCatalogEntry {
        key,
        label,
        table,
        column,
        required,
        rule,
    }
}

use DestTable::{Customer as C, Ledger as L, Product as P, ProductBranch as PB};
use NormalizeRule::*;

// ==========================================
// 商品
// ==========================================
pub static PRODUCT_CATALOG: &[FieldCatalogEntry] = &[
    field("proId", "ID Produto (Fixo ou Automático)", P, "proId", false, Identifier),
    field("zzz_proCodigo", "Referência / Código de Barras", P, "zzz_proCodigo", false, Text { max_len: 20 }),
    field("proDescricao", "Descrição do Produto", P, "proDescricao", true, Text { max_len: 50 }),
    field("zzz_proCodigoNcm", "NCM (Código Fiscal)", P, "zzz_proCodigoNcm", false, Digits { max_len: 8 }),
    field("proUn", "Unidade (UN, KG, CX)", PB, "proUn", false, UpperText { max_len: 2 }),
    field("zzz_proCusto", "Preço de Custo (R$)", PB, "proCusto", false, Currency),
    field("zzz_proVenda", "Preço de Venda (R$)", PB, "proVenda", false, Currency),
    field("proEstoqueAtual", "Estoque Atual", PB, "proEstoqueAtual", false, Currency),
    field("zzz_proEstoqueMin", "Estoque Mínimo", PB, "proEstoqueMin", false, Currency),
    field("proCodcst2", "CST ICMS (Ex: 00, 60)", PB, "proCodcst2", false, Digits { max_len: 3 }),
    field("proCodCSOSN", "CSOSN (Simples Nacional)", PB, "proCodCSOSN", false, Digits { max_len: 4 }),
];

// ==========================================
// 客户 / 供应商（同一张 cliente 表）
// ==========================================
pub static CUSTOMER_CATALOG: &[FieldCatalogEntry] = &[
    field("cliId", "ID Cliente (Código)", C, "cliId", false, Identifier),
    field("cliNome", "Nome / Razão Social", C, "cliNome", true, Text { max_len: 50 }),
    field("cliFantasia", "Nome Fantasia / Apelido", C, "cliFantasia", false, Text { max_len: 50 }),
    field("cliTipo", "Tipo Pessoa (0=Física, 1=Jurídica)", C, "cliTipo", false, Integer),
    field("cliCpfCgc", "CPF / CNPJ", C, "cliCpfCgc", false, Digits { max_len: 20 }),
    field("cliRgInsc", "RG / Inscrição Estadual", C, "cliRgInsc", false, Text { max_len: 20 }),
    field("cliFatCep", "CEP (Faturamento)", C, "cliFatCep", false, Digits { max_len: 8 }),
    field("cliFatEnd", "Endereço (Faturamento)", C, "cliFatEnd", false, Text { max_len: 50 }),
    field("cliFatEndNumero", "Número (Faturamento)", C, "cliFatEndNumero", false, Text { max_len: 10 }),
    field("cliFatBairro", "Bairro (Faturamento)", C, "cliFatBairro", false, Text { max_len: 20 }),
    field("cliFatCidade", "Cidade (Faturamento)", C, "cliFatCidade", false, Text { max_len: 30 }),
    field("cliFatUf", "UF (Faturamento)", C, "cliFatUf", false, UpperText { max_len: 2 }),
    field("cliFatCidCodIBGE", "Código IBGE Cidade", C, "cliFatCidCodIBGE", false, Digits { max_len: 7 }),
    field("cliCobCep", "CEP (Cobrança)", C, "cliCobCep", false, Digits { max_len: 8 }),
    field("cliCobEnd", "Endereço (Cobrança)", C, "cliCobEnd", false, Text { max_len: 50 }),
    field("cliCobEndNumero", "Número (Cobrança)", C, "cliCobEndNumero", false, Text { max_len: 10 }),
    field("cliCobBairro", "Bairro (Cobrança)", C, "cliCobBairro", false, Text { max_len: 20 }),
    field("cliCobCidade", "Cidade (Cobrança)", C, "cliCobCidade", false, Text { max_len: 30 }),
    field("cliCobUf", "UF (Cobrança)", C, "cliCobUf", false, UpperText { max_len: 2 }),
    field("cliEmail", "Email", C, "cliEmail", false, Text { max_len: 50 }),
    field("CliFone", "Telefone Fixo", C, "cliFone", false, Digits { max_len: 15 }),
    field("cliCelular", "Celular / WhatsApp", C, "cliCelular", false, Digits { max_len: 15 }),
    field("CliFax", "Fax / Outro", C, "cliFax", false, Digits { max_len: 15 }),
    field("CliLimitCred", "Limite de Crédito (R$)", C, "cliLimitCred", false, Currency),
    field("zzz_CliObsVend", "Observações", C, "zzz_cliObsVend", false, Text { max_len: 100 }),
    field("CliContNome1", "Nome Contato", C, "cliContNome1", false, Text { max_len: 30 }),
    field("CliContDepto1", "Departamento", C, "cliContDepto1", false, Text { max_len: 20 }),
    field("CliContFone1", "Telefone Contato", C, "cliContFone1", false, Digits { max_len: 15 }),
    field("CliCadNomePai", "Nome do Pai", C, "cliCadNomePai", false, Text { max_len: 50 }),
    field("CliCadNomeMae", "Nome da Mãe", C, "cliCadNomeMae", false, Text { max_len: 50 }),
];

// ==========================================
// 财务（无人工映射，依赖固定启发式）
// ==========================================
// 注: 到期日目标列名由配置决定（见 ImportSettings::due_date_column）
pub static FINANCIAL_CATALOG: &[FieldCatalogEntry] = &[
    field("pgtClienteId", "Cliente / Fornecedor (ID)", L, "pgtClienteId", true, Integer),
    field("pgtValor", "Valor Original (R$)", L, "pgtValor", false, Currency),
    field("pgtValorJuros", "Juros (R$)", L, "pgtValorJuros", false, Currency),
    field("pgtData", "Data de Emissão", L, "pgtData", false, Date),
    field("pgtVencimento", "Data de Vencimento", L, "pgtVecmto", true, Date),
    field("pgtDataQuitou", "Data de Pagamento", L, "pgtDataQuitou", false, Date),
    field("pgtNumDoc", "Número do Documento", L, "pgtNumDoc", false, Text { max_len: 20 }),
    field("pgtNossoNumero", "Nosso Número", L, "pgtNossoNumero", false, Text { max_len: 20 }),
    field("pgtObs", "Observações", L, "pgtObs", false, Text { max_len: 100 }),
    field("pgtTipoConta", "Tipo Conta (R=Receber, P=Pagar)", L, "pgtTipoConta", false, UpperText { max_len: 1 }),
    field("pgtPago", "Pago (S/N)", L, "pgtPago", false, UpperText { max_len: 1 }),
    field("pgtBanco", "Banco", L, "pgtBanco", false, Text { max_len: 10 }),
    field("pgtAgencia", "Agência", L, "pgtAgencia", false, Text { max_len: 10 }),
    field("pgtContaC", "Conta Corrente", L, "pgtContaC", false, Text { max_len: 15 }),
];

/// 获取实体族的字段目录
pub fn catalog_for(family: EntityFamily) -> &'static [FieldCatalogEntry] {
    match family {
        EntityFamily::Product => PRODUCT_CATALOG,
        EntityFamily::Customer | EntityFamily::Supplier => CUSTOMER_CATALOG,
        EntityFamily::Financial => FINANCIAL_CATALOG,
    }
}

/// 实体族的标识字段键
pub fn identifier_key(family: EntityFamily) -> Option<&'static str> {
    catalog_for(family)
        .iter()
        .find(|entry| entry.rule == NormalizeRule::Identifier)
        .map(|entry| entry.key)
}
