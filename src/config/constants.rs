// ==========================================
// Max Import - 业务常量
// ==========================================
// 职责: 遗留系统中的"魔法值"集中定义
// 红线: 业务代码中禁止出现内联字面量
// ==========================================

/// 客户/供应商角色标志（cliTipoCad）
pub mod role_flag {
    /// 客户
    pub const CUSTOMER: i64 = 0;
    /// 供应商
    pub const SUPPLIER: i64 = 1;
    /// 系统保留类型（清理时必须保留）
    pub const PROTECTED_KINDS: [i64; 2] = [5, 6];
}

/// 系统/管理员保留标识（"消费者"记录），永不覆盖
pub const RESERVED_ADMIN_ID: i64 = 1;

/// 唯一支持的门店（empId）
pub const FIXED_BRANCH_ID: i64 = 1;

/// 参考表未解析时使用的中性键
pub const NEUTRAL_REFERENCE_KEY: i64 = 0;

/// 批量写入默认分块大小
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// 商品默认单位
pub const DEFAULT_UNIT: &str = "UN";

/// 财务相关默认值
pub mod ledger {
    /// 应收
    pub const ACCOUNT_RECEIVABLE: &str = "R";
    /// 已结清
    pub const PAID: &str = "S";
    /// 未结清
    pub const UNPAID: &str = "N";
    /// 现金付款方式
    pub const DEFAULT_CASH_KIND: i64 = 0;
    /// 分期付款方式（3 = 银行票据）
    pub const DEFAULT_TERM_KIND: i64 = 3;
    /// 到期日列名（遗留库中的拼写，需以实库校验）
    pub const DEFAULT_DUE_DATE_COLUMN: &str = "pgtVecmto";
}

/// 遗留库表名
pub mod tables {
    pub const PRODUCT: &str = "produto";
    pub const PRODUCT_BRANCH: &str = "produto_empresa";
    pub const PRODUCT_UNIT: &str = "produtoUn";
    pub const PRODUCT_LOT: &str = "prolote";
    pub const FISCAL_CODE: &str = "ncm";
    pub const CUSTOMER: &str = "cliente";
    pub const LEDGER: &str = "financeiro";
}
