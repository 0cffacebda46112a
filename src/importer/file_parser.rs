// ==========================================
// Max Import - 文件解析器
// ==========================================
// 支持: Excel (.xlsx/.xls/.xlsm/.ods) / CSV (.csv)
// 输出: 第一个工作表 → SourceSheet（单元格统一为文本）
// ==========================================

use crate::domain::record::{SourceRow, SourceSheet};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// 源文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Excel,
    Csv,
}

impl SourceFormat {
    /// 按扩展名判定格式
    pub fn detect(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(SourceFormat::Excel),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

/// 读取源文件（第一个工作表，首行为表头）
pub fn read_source<P: AsRef<Path>>(file_path: P) -> ImportResult<SourceSheet> {
    let path = file_path.as_ref();

    // 检查文件存在
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let format = SourceFormat::detect(path)?;
    let sheet = match format {
        SourceFormat::Excel => read_excel(path)?,
        SourceFormat::Csv => read_csv(path)?,
    };

    info!(
        file = %path.display(),
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "源文件读取完成"
    );
    Ok(sheet)
}

// ==========================================
// Excel
// ==========================================
fn read_excel(path: &Path) -> ImportResult<SourceSheet> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::ExcelParseError("工作簿无工作表".to_string()))?;
    debug!(sheet = %sheet_name, "读取第一个工作表");

    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| ImportError::ExcelParseError("工作表无表头行".to_string()))?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell_to_text(cell).trim().to_string())
        .collect();

    let mut data = Vec::new();
    for (offset, cells) in rows.enumerate() {
        let row = SourceRow {
            // 表头为第 1 行
            row_number: offset + 2,
            cells: cells
                .iter()
                .map(|cell| cell_to_text(cell).trim().to_string())
                .collect(),
        };
        if row.is_blank() {
            continue;
        }
        data.push(row);
    }

    Ok(SourceSheet {
        headers,
        rows: data,
    })
}

// 10000-01-01 的序列值
const EXCEL_SERIAL_LIMIT: f64 = 2_958_466.0;
// f64 可精确表示的整数上限 2^53
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// 单元格 → 文本；日期统一输出 ISO 格式
fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_iso(serial).unwrap_or_else(|| {
                warn!(serial, "日期序列值超出范围，按原值处理");
                serial.to_string()
            })
        }
        // 整数值的数字单元格（如编码 10.0）输出为 "10"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => {
            format!("{}", *f as i64)
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

/// Excel 序列日期（1900 体系，基准 1899-12-30）；超出 9999-12-31 → None
fn excel_serial_to_iso(serial: f64) -> Option<String> {
    if !serial.is_finite() || !(0.0..EXCEL_SERIAL_LIMIT).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    let dt = base
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

// ==========================================
// CSV
// ==========================================
fn read_csv(path: &Path) -> ImportResult<SourceSheet> {
    let delimiter = sniff_delimiter(path)?;
    debug!(delimiter = %(delimiter as char), "CSV 分隔符");

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| decode_field(h).trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut data = Vec::new();
    for (offset, result) in reader.byte_records().enumerate() {
        let record = result?;
        let row = SourceRow {
            row_number: offset + 2,
            cells: record
                .iter()
                .map(|v| decode_field(v).trim().to_string())
                .collect(),
        };
        if row.is_blank() {
            continue;
        }
        data.push(row);
    }

    Ok(SourceSheet {
        headers,
        rows: data,
    })
}

/// 表头行中 ';' 多于 ',' 时按 ';' 分隔
fn sniff_delimiter(path: &Path) -> ImportResult<u8> {
    let mut first_line = Vec::new();
    BufReader::new(File::open(path)?).read_until(b'\n', &mut first_line)?;

    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

/// UTF-8 优先，失败则按 Latin-1 解码
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_csv_comma_delimited() {
        let file = csv_file(b"codigo,nome,preco\n10,Parafuso,\"1,50\"\n,,\n11,Porca,2\n");

        let sheet = read_source(file.path()).unwrap();
        assert_eq!(sheet.headers, vec!["codigo", "nome", "preco"]);
        // 空行被跳过，行号保持源文件位置
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].row_number, 2);
        assert_eq!(sheet.rows[0].cell(2), Some("1,50"));
        assert_eq!(sheet.rows[1].row_number, 4);
    }

    #[test]
    fn test_csv_semicolon_and_latin1() {
        // "Descrição" 的 Latin-1 编码
        let mut content = b"codigo;Descri\xe7\xe3o\n".to_vec();
        content.extend_from_slice(b"1;Caf\xe9\n");
        let file = csv_file(&content);

        let sheet = read_source(file.path()).unwrap();
        assert_eq!(sheet.headers, vec!["codigo", "Descrição"]);
        assert_eq!(sheet.rows[0].cell(1), Some("Café"));
    }

    #[test]
    fn test_missing_file() {
        let result = read_source("/nonexistent/produtos.xlsx");
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        let result = read_source(file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(ext)) if ext == "txt"));
    }

    #[test]
    fn test_excel_serial_to_iso() {
        assert_eq!(
            excel_serial_to_iso(45677.0).as_deref(),
            Some("2025-01-20 00:00:00")
        );
        assert_eq!(
            excel_serial_to_iso(45677.5).as_deref(),
            Some("2025-01-20 12:00:00")
        );
        assert_eq!(excel_serial_to_iso(f64::NAN), None);
        assert_eq!(excel_serial_to_iso(2_958_465.0).as_deref(), Some("9999-12-31 00:00:00"));
    }

    #[test]
    fn test_excel_serial_out_of_range() {
        // 超大序列值不得溢出
        assert_eq!(excel_serial_to_iso(1.0e10), None);
        assert_eq!(excel_serial_to_iso(f64::MAX), None);
        assert_eq!(excel_serial_to_iso(-1.0), None);
        assert_eq!(excel_serial_to_iso(2_958_466.0), None);
    }

    #[test]
    fn test_cell_to_text_numbers() {
        assert_eq!(cell_to_text(&Data::Float(10.0)), "10");
        assert_eq!(cell_to_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_text(&Data::Int(7)), "7");
        assert_eq!(cell_to_text(&Data::Empty), "");
        assert_eq!(cell_to_text(&Data::String("Porca".into())), "Porca");
    }
}
