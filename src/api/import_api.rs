// ==========================================
// Max Import - 导入API
// ==========================================
// 职责: 封装导入/映射预览/维护清空
// 并发: 同一库同一时刻只允许一个导入或清空，第二个请求直接拒绝
// 执行: 导入在 tokio blocking 线程池中运行，不阻塞调用方的异步运行时
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportSettings;
use crate::db::open_store;
use crate::domain::catalog::{catalog_for, FieldCatalogEntry};
use crate::domain::record::ColumnMapping;
use crate::domain::report::ImportReport;
use crate::domain::types::EntityFamily;
use crate::importer::column_mapper::auto_map;
use crate::importer::file_parser::read_source;
use crate::importer::pipeline::ImportPipeline;
use crate::i18n::t;
use crate::repository::cleanup_repo::{CleanupOutcome, CleanupScope};
use crate::repository::error::RepositoryError;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 导入请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub family: EntityFamily,
    pub file_path: String,
    /// 复核后的映射；None 时使用自动映射
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    /// 导入前清空该实体族
    #[serde(default)]
    pub clear_before: bool,
}

/// 映射预览（供外部复核界面使用）
#[derive(Debug, Clone, Serialize)]
pub struct MappingPreview {
    pub family: EntityFamily,
    pub headers: Vec<String>,
    pub fields: Vec<FieldCatalogEntry>,
    pub mapping: ColumnMapping,
    /// 非空数据行数
    pub row_count: usize,
}

/// 忙碌标记守卫（Drop 时释放）
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> ApiResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ApiError::ImportInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 导入API
#[derive(Clone)]
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    pipeline: Arc<ImportPipeline>,
    busy: Arc<AtomicBool>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(conn: Arc<Mutex<Connection>>, settings: ImportSettings) -> Self {
        Self {
            conn,
            pipeline: Arc::new(ImportPipeline::new(settings)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 按配置打开目标库并创建实例
    pub fn open(settings: ImportSettings) -> ApiResult<Self> {
        let conn = open_store(&settings).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), settings))
    }

    /// 共享的数据库连接
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 是否有导入/清空正在执行
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 执行导入
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入报告（可能包含中止信息）
    /// - Err(ApiError::ImportInProgress): 已有导入在执行
    /// - Err(ApiError::LoadInterrupted): 写入阶段中途失败，携带已提交部分的报告
    /// - Err(ApiError): 写入前失败（文件/映射/表结构）
    pub async fn run_import(&self, request: ImportRequest) -> ApiResult<ImportReport> {
        if request.file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("api.empty_file_path")));
        }

        let guard = BusyGuard::acquire(&self.busy)?;
        let conn = Arc::clone(&self.conn);
        let pipeline = Arc::clone(&self.pipeline);
        info!(family = %request.family, file = %request.file_path, "开始导入");

        tokio::task::spawn_blocking(move || -> ApiResult<ImportReport> {
            let _guard = guard;
            let conn = lock(&conn)?;
            let report = pipeline.run(
                &conn,
                request.family,
                Path::new(&request.file_path),
                request.mapping.as_ref(),
                request.clear_before,
            )?;
            if report.is_aborted() {
                warn!(run_id = %report.run_id, "导入中止");
            }
            Ok(report)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("导入任务异常终止: {}", e)))?
    }

    /// 读取文件表头并给出自动映射（不写入）
    pub fn preview_mapping(&self, file_path: &str, family: EntityFamily) -> ApiResult<MappingPreview> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("api.empty_file_path")));
        }

        let sheet = read_source(file_path)?;
        let mapping = auto_map(family, &sheet.headers);
        Ok(MappingPreview {
            family,
            fields: catalog_for(family).to_vec(),
            mapping,
            row_count: sheet.rows.len(),
            headers: sheet.headers,
        })
    }

    /// 维护清空
    pub fn cleanup(&self, scope: CleanupScope) -> ApiResult<CleanupOutcome> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let conn = lock(&self.conn)?;
        let outcome = self.pipeline.cleanup(&conn, scope)?;
        info!(scope = %scope, rows = outcome.total(), "维护清空完成");
        Ok(outcome)
    }
}

fn lock(conn: &Mutex<Connection>) -> ApiResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ApiError::from(RepositoryError::LockError(e.to_string())))
}
