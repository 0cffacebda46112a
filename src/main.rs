// ==========================================
// Max Import - 命令行入口
// ==========================================
// 用法:
//   max-import <db_path> <family> <file> [--clear] [--mapping mapping.json]
//   max-import <db_path> clean <scope>
// family: product | customer | supplier | financial（亦接受葡语名）
// scope:  products | customers | suppliers | financial | all
// ==========================================

use anyhow::{anyhow, bail, Context};
use max_import::api::{ApiError, ImportApi, ImportRequest};
use max_import::domain::{ColumnMapping, EntityFamily, ImportReport};
use max_import::repository::CleanupScope;
use max_import::{logging, ImportSettings};

const USAGE: &str = "用法:\n  max-import <db_path> <family> <file> [--clear] [--mapping mapping.json]\n  max-import <db_path> clean <scope>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let mut settings = ImportSettings::from_env();
    settings.db_path = db_path;

    tracing::info!("Max Import {}", max_import::VERSION);
    tracing::info!("使用数据库: {}", settings.db_path);

    let api = ImportApi::open(settings)?;

    if command.eq_ignore_ascii_case("clean") {
        let scope: CleanupScope = args
            .next()
            .ok_or_else(|| anyhow!(USAGE))?
            .parse()
            .map_err(|e: String| anyhow!(e))?;
        let outcome = api.cleanup(scope)?;
        for (table, rows) in &outcome.deleted {
            println!("{}: {}", table, rows);
        }
        return Ok(());
    }

    let family: EntityFamily = command.parse().map_err(|e: String| anyhow!(e))?;
    let file_path = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let mut clear_before = false;
    let mut mapping_file = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--clear" => clear_before = true,
            "--mapping" => {
                mapping_file = Some(args.next().ok_or_else(|| anyhow!("--mapping 缺少文件参数"))?)
            }
            other => bail!("未知参数: {}\n{}", other, USAGE),
        }
    }

    // 人工映射覆盖自动映射
    let mapping = match mapping_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("读取映射文件失败: {}", path))?;
            let custom: ColumnMapping = serde_json::from_str(&raw)
                .with_context(|| format!("映射文件格式错误: {}", path))?;
            let preview = api.preview_mapping(&file_path, family)?;
            Some(preview.mapping.overridden_by(&custom))
        }
        None => None,
    };

    let result = api
        .run_import(ImportRequest {
            family,
            file_path,
            mapping,
            clear_before,
        })
        .await;

    match result {
        Ok(report) => {
            print_report(&report);
            if report.is_aborted() {
                std::process::exit(2);
            }
            Ok(())
        }
        // 已提交的部分仍需告知用户
        Err(ApiError::LoadInterrupted { report, message }) => {
            print_report(&report);
            eprintln!("{}", message);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &ImportReport) {
    for line in report.summary_lines() {
        println!("{}", line);
    }
    for warning in &report.warnings {
        println!("! {}", warning);
    }
}
