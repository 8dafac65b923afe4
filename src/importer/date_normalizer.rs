// ==========================================
// G-progress - 日期标准化器
// ==========================================
// 职责: 单元格日期字符串 → NaiveDate
// 规则: 月/日 形式按合同日期推断年份
//   月份 < 合同月份 → 合同年份 + 1
//   否则           → 合同年份
// ==========================================

use crate::importer::data_cleaner::fold_width;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{Datelike, Duration, NaiveDate};

/// Excel 序列日期的合理范围（约 1954 ~ 2119 年）
const EXCEL_SERIAL_MIN: f64 = 20_000.0;
const EXCEL_SERIAL_MAX: f64 = 80_000.0;

/// 解析结果: 完整日期 or 缺年份的月/日
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Full(NaiveDate),
    MonthDay { month: u32, day: u32 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer;

impl DateNormalizer {
    /// 解析单元格（不做年份推断）
    pub fn parse(&self, raw: &str) -> ImportResult<ParsedDate> {
        let folded = fold_width(raw);
        let text = strip_weekday(strip_time(folded.trim()));

        if text.is_empty() {
            return Err(date_error(raw, "空值"));
        }

        if let Some(serial) = parse_serial(text) {
            return excel_serial_to_date(serial)
                .map(ParsedDate::Full)
                .ok_or_else(|| date_error(raw, "数值不在 Excel 日期范围内"));
        }

        if text.contains('月') {
            return parse_kanji(raw, text);
        }

        let normalized = text.replace(['-', '.'], "/");
        let parts: Vec<&str> = normalized.split('/').map(str::trim).collect();

        match parts.as_slice() {
            [y, m, d] => {
                let year = parse_year(raw, y)?;
                let month = parse_number(raw, m)?;
                let day = parse_number(raw, d)?;
                full_date(raw, year, month, day)
            }
            [m, d] => {
                let month = parse_number(raw, m)?;
                let day = parse_number(raw, d)?;
                month_day(raw, month, day)
            }
            _ => Err(date_error(raw, "无法识别的日期格式")),
        }
    }

    /// 解析并按合同日期补全年份
    pub fn resolve(&self, raw: &str, contract_date: Option<NaiveDate>) -> ImportResult<NaiveDate> {
        match self.parse(raw)? {
            ParsedDate::Full(date) => Ok(date),
            ParsedDate::MonthDay { month, day } => {
                let contract = contract_date
                    .ok_or_else(|| date_error(raw, "缺少年份且合同日期未知,无法推断"))?;
                let year = infer_year(month, contract);
                NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
                    date_error(raw, &format!("推断年份 {} 中不存在该日期", year))
                })
            }
        }
    }

    /// 必须含年份的日期（合同日期列）
    pub fn parse_absolute(&self, raw: &str) -> ImportResult<NaiveDate> {
        match self.parse(raw)? {
            ParsedDate::Full(date) => Ok(date),
            ParsedDate::MonthDay { .. } => Err(date_error(raw, "合同日期必须包含年份")),
        }
    }
}

/// 月份早于合同月份 → 次年
pub fn infer_year(month: u32, contract_date: NaiveDate) -> i32 {
    if month < contract_date.month() {
        contract_date.year() + 1
    } else {
        contract_date.year()
    }
}

fn date_error(raw: &str, reason: &str) -> ImportError {
    ImportError::DateFormatError {
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// "2024/05/10 0:00:00" → "2024/05/10"
fn strip_time(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

/// "5/20(月)" → "5/20"
fn strip_weekday(text: &str) -> &str {
    if text.ends_with(')') {
        if let Some(pos) = text.rfind('(') {
            return text[..pos].trim_end();
        }
    }
    text
}

fn parse_serial(text: &str) -> Option<f64> {
    if !text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    // "5" 或 "20" 这类短数字不是序列值,交给后续分支报错
    if text.split('.').next().map_or(0, str::len) < 5 {
        return None;
    }
    text.parse::<f64>().ok()
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(EXCEL_SERIAL_MIN..=EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    // 1900 闰年 bug: 以 1899-12-30 为基准
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn parse_kanji(raw: &str, text: &str) -> ImportResult<ParsedDate> {
    let (year, rest) = match text.split_once('年') {
        Some((y, rest)) => (Some(parse_year(raw, y)?), rest),
        None => (None, text),
    };
    let (m, rest) = rest
        .split_once('月')
        .ok_or_else(|| date_error(raw, "缺少 '月'"))?;
    let d = rest.trim_end_matches('日');

    let month = parse_number(raw, m)?;
    let day = parse_number(raw, d)?;

    match year {
        Some(year) => full_date(raw, year, month, day),
        None => month_day(raw, month, day),
    }
}

fn parse_number(raw: &str, part: &str) -> ImportResult<u32> {
    let part = part.trim();
    if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(date_error(raw, "月/日不是有效数字"));
    }
    part.parse::<u32>()
        .map_err(|_| date_error(raw, "月/日不是有效数字"))
}

fn parse_year(raw: &str, part: &str) -> ImportResult<i32> {
    let part = part.trim();
    if !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(date_error(raw, "年份不是有效数字"));
    }
    match part.len() {
        2 => part
            .parse::<i32>()
            .map(|y| 2000 + y)
            .map_err(|_| date_error(raw, "年份不是有效数字")),
        4 => part
            .parse::<i32>()
            .map_err(|_| date_error(raw, "年份不是有效数字")),
        _ => Err(date_error(raw, "年份必须为 2 位或 4 位")),
    }
}

fn full_date(raw: &str, year: i32, month: u32, day: u32) -> ImportResult<ParsedDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(ParsedDate::Full)
        .ok_or_else(|| date_error(raw, "不存在的日期"))
}

fn month_day(raw: &str, month: u32, day: u32) -> ImportResult<ParsedDate> {
    // 2/29 留到推断年份后再判定
    if !(1..=12).contains(&month) || day == 0 || day > 31 {
        return Err(date_error(raw, "不存在的日期"));
    }
    if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
        return Err(date_error(raw, "不存在的日期"));
    }
    Ok(ParsedDate::MonthDay { month, day })
}
