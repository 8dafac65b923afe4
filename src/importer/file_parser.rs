// ==========================================
// G-progress - 文件解析器实现
// ==========================================
// 支持: CSV (.csv, UTF-8 / Shift_JIS) / Excel (.xlsx)
// 输出: 按列位置保存的行（固定布局表格无法按列名取值）
// ==========================================

use crate::config::import_config_trait::SourceEncoding;
use crate::domain::import::{ParsedSheet, RawSheetRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::task_importer_trait::FileParser;
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// 按编码配置把字节解码为 UTF-8 文本
pub fn decode_bytes(bytes: &[u8], encoding: SourceEncoding) -> ImportResult<Cow<'_, str>> {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding {
        SourceEncoding::Utf8 => std::str::from_utf8(without_bom)
            .map(Cow::Borrowed)
            .map_err(|e| ImportError::EncodingError(format!("非 UTF-8 文件: {}", e))),
        SourceEncoding::ShiftJis => Ok(decode_shift_jis(bytes)),
        SourceEncoding::Auto => match std::str::from_utf8(without_bom) {
            Ok(text) => Ok(Cow::Borrowed(text)),
            Err(_) => {
                debug!("UTF-8 解码失败，按 Shift_JIS 解码");
                Ok(decode_shift_jis(bytes))
            }
        },
    }
}

fn decode_shift_jis(bytes: &[u8]) -> Cow<'_, str> {
    let (decoded, _, had_errors) = SHIFT_JIS.decode(bytes);
    if had_errors {
        // 个别字符无法解码时继续,替换为 U+FFFD
        warn!("部分字符无法按 Shift_JIS 解码");
    }
    decoded
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从已解码文本解析（测试与 Excel 以外的来源复用）
    pub fn parse_text(&self, text: &str, header_rows: usize) -> ImportResult<ParsedSheet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let mut header_width = 0;
        let mut headers_seen = 0;
        let mut rows = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            let record = result?;

            if headers_seen < header_rows {
                header_width = header_width.max(record.len());
                headers_seen += 1;
                continue;
            }

            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);
            let cells: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();

            // 跳过完全空白的行
            if cells.iter().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(RawSheetRow { row_number, cells });
        }

        if headers_seen < header_rows {
            return Err(ImportError::HeaderMissing {
                expected: header_rows,
                actual: headers_seen,
            });
        }

        Ok(ParsedSheet { header_width, rows })
    }
}

impl FileParser for CsvParser {
    fn parse_to_rows(
        &self,
        file_path: &Path,
        header_rows: usize,
        encoding: SourceEncoding,
    ) -> ImportResult<ParsedSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let bytes = std::fs::read(file_path)?;
        let text = decode_bytes(&bytes, encoding)?;
        self.parse_text(&text, header_rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_rows(
        &self,
        file_path: &Path,
        header_rows: usize,
        _encoding: SourceEncoding,
    ) -> ImportResult<ParsedSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook: Xlsx<_> = open_workbook(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // Range 从首个非空单元格开始: 补回前导空行/空列,保持工作表坐标
        let (first_row, first_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut header_width = 0;
        let mut headers_seen = first_row.min(header_rows);
        let mut rows = Vec::new();

        for (idx, data_row) in range.rows().enumerate() {
            if headers_seen < header_rows {
                header_width = header_width.max(first_col + data_row.len());
                headers_seen += 1;
                continue;
            }

            let cells: Vec<String> = std::iter::repeat(String::new())
                .take(first_col)
                .chain(
                    data_row
                        .iter()
                        .map(|cell| cell.to_string().trim().to_string()),
                )
                .collect();

            if cells.iter().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(RawSheetRow {
                row_number: first_row + idx + 1,
                cells,
            });
        }

        if headers_seen < header_rows {
            return Err(ImportError::HeaderMissing {
                expected: header_rows,
                actual: headers_seen,
            });
        }

        Ok(ParsedSheet { header_width, rows })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_to_rows(
        &self,
        file_path: &Path,
        header_rows: usize,
        encoding: SourceEncoding,
    ) -> ImportResult<ParsedSheet> {
        match extension_of(file_path).as_str() {
            "csv" => CsvParser.parse_to_rows(file_path, header_rows, encoding),
            "xlsx" => ExcelParser.parse_to_rows(file_path, header_rows, encoding),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
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
    fn test_csv_parser_skips_multi_row_header() {
        let file = csv_file("No,契約,,\nNo,契約番号,顧客名,契約日\n1,012345,山田太郎,2024/05/10\n".as_bytes());

        let sheet = CsvParser
            .parse_to_rows(file.path(), 2, SourceEncoding::Auto)
            .unwrap();

        assert_eq!(sheet.header_width, 4);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].row_number, 3);
        assert_eq!(sheet.rows[0].cell(1), "012345");
        assert_eq!(sheet.rows[0].cell(2), "山田太郎");
        assert_eq!(sheet.rows[0].cell(99), "");
    }

    #[test]
    fn test_csv_parser_shift_jis() {
        let (encoded, _, _) = SHIFT_JIS.encode("h1,h2\n012345,佐藤花子\n");
        let file = csv_file(&encoded);

        let sheet = CsvParser
            .parse_to_rows(file.path(), 1, SourceEncoding::Auto)
            .unwrap();

        assert_eq!(sheet.rows[0].cell(1), "佐藤花子");
    }

    #[test]
    fn test_csv_parser_utf8_bom_and_blank_rows() {
        let mut content = b"\xEF\xBB\xBF".to_vec();
        content.extend_from_slice("h\n1,a\n,,\n2,b\n".as_bytes());
        let file = csv_file(&content);

        let sheet = CsvParser
            .parse_to_rows(file.path(), 1, SourceEncoding::Utf8)
            .unwrap();

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].row_number, 4);
    }

    #[test]
    fn test_csv_parser_header_missing() {
        let file = csv_file(b"only-one-line\n");
        let result = CsvParser.parse_to_rows(file.path(), 2, SourceEncoding::Auto);
        assert!(matches!(
            result,
            Err(ImportError::HeaderMissing {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result =
            CsvParser.parse_to_rows(Path::new("non_existent.csv"), 2, SourceEncoding::Auto);
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        let result = UniversalFileParser.parse_to_rows(file.path(), 1, SourceEncoding::Auto);
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    // ==========================================
    // Excel
    // ==========================================

    /// A 列整列为空（导出时 No 列未填）的两行表头工作表
    fn xlsx_file(leading_blank_row: bool) -> tempfile::NamedTempFile {
        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let top = if leading_blank_row { 1 } else { 0 };

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(top, 1, "契約").unwrap();
        sheet.write_string(top + 1, 1, "契約番号").unwrap();
        sheet.write_string(top + 1, 2, "顧客名").unwrap();
        sheet.write_string(top + 1, 3, "契約日").unwrap();
        sheet.write_string(top + 2, 1, "012345").unwrap();
        sheet.write_string(top + 2, 2, "山田").unwrap();
        sheet.write_number(top + 2, 3, 45422.0).unwrap();
        workbook.save(file.path()).unwrap();
        file
    }

    #[test]
    fn test_excel_parser_keeps_sheet_columns_with_blank_leading_column() {
        use crate::config::column_layout::ColumnLayout;
        use crate::importer::date_normalizer::{DateNormalizer, ParsedDate};
        use crate::importer::field_mapper::FieldMapper;
        use crate::importer::task_importer_trait::FieldMapper as _;

        let file = xlsx_file(false);
        let sheet = ExcelParser
            .parse_to_rows(file.path(), 2, SourceEncoding::Auto)
            .unwrap();

        assert_eq!(sheet.header_width, 4);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].row_number, 3);
        assert_eq!(sheet.rows[0].cell(0), "");

        let mapped = FieldMapper.map_row(&sheet.rows[0], &ColumnLayout::default());
        assert_eq!(mapped.contract_no.as_deref(), Some("012345"));
        assert_eq!(mapped.customer_name.as_deref(), Some("山田"));

        // 日期单元格以 Excel 序列号读出
        let raw_date = mapped.contract_date.unwrap();
        assert_eq!(
            DateNormalizer.parse(&raw_date).unwrap(),
            ParsedDate::Full(chrono::NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
        );
    }

    #[test]
    fn test_excel_parser_counts_blank_top_rows() {
        // 首行空白也算作表头行
        let file = xlsx_file(true);
        let sheet = UniversalFileParser
            .parse_to_rows(file.path(), 3, SourceEncoding::Auto)
            .unwrap();

        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].row_number, 4);
        assert_eq!(sheet.rows[0].cell(1), "012345");
        assert_eq!(sheet.rows[0].cell(3), "45422");
    }

    #[test]
    fn test_strict_utf8_rejects_shift_jis() {
        let (encoded, _, _) = SHIFT_JIS.encode("顧客\n");
        assert!(decode_bytes(&encoded, SourceEncoding::Utf8).is_err());
    }
}
