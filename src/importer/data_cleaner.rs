// ==========================================
// G-progress - 数据清洗器实现
// ==========================================
// 职责: 全角折叠 / NULL 标准化 / 合同号 / 金额 / 人名
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::task_importer_trait::DataCleaner as DataCleanerTrait;

/// 合同号位数
pub const CONTRACT_NO_DIGITS: usize = 6;

/// 客户名分隔符（全角已先折叠为半角）
const NAME_SEPARATORS: &[char] = &['・', '、', ',', '/', '&'];

/// 敬称
const HONORIFICS: &[&str] = &["様", "さま", "殿"];

/// 金额占位符（表示未定）
const AMOUNT_PLACEHOLDERS: &[&str] = &["-", "―", "ー", "—", "未定"];

/// 全角英数/记号 → 半角,全角空格 → 半角空格
pub fn fold_width(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn fold_width(&self, value: &str) -> String {
        fold_width(value)
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn normalize_contract_no(&self, value: &str) -> ImportResult<String> {
        let folded = self.fold_width(value);
        let mut s = folded.trim();

        // 前缀 "No." / "#"
        for prefix in ["No.", "NO.", "no.", "No", "NO", "#"] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest.trim_start();
                break;
            }
        }

        // xlsx 数值单元格: "12345.0"
        let s = match s.split_once('.') {
            Some((int_part, frac)) if !frac.is_empty() && frac.chars().all(|c| c == '0') => {
                int_part
            }
            _ => s,
        };

        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ImportError::ContractNoFormatError(value.to_string()));
        }
        if s.len() > CONTRACT_NO_DIGITS {
            return Err(ImportError::ContractNoFormatError(value.to_string()));
        }

        // 丢失前导零的数值单元格补零
        Ok(format!("{:0>width$}", s, width = CONTRACT_NO_DIGITS))
    }

    fn parse_amount(&self, value: &str) -> ImportResult<Option<i64>> {
        let folded = self.fold_width(value);
        let trimmed = folded.trim();
        if trimmed.is_empty() || AMOUNT_PLACEHOLDERS.contains(&trimmed) {
            return Ok(None);
        }

        if trimmed.starts_with('-') || trimmed.starts_with('△') || trimmed.starts_with('▲') {
            return Err(ImportError::AmountFormatError(format!("负数金额: {}", value)));
        }

        let cleaned: String = trimmed
            .chars()
            .filter(|c| !matches!(c, '¥' | '￥' | '\\' | '円' | ',' | ' '))
            .collect();

        let (number, multiplier) = match cleaned.strip_suffix('万') {
            Some(rest) => (rest, 10_000f64),
            None => (cleaned.as_str(), 1f64),
        };

        if number.is_empty() {
            return Err(ImportError::AmountFormatError(value.to_string()));
        }

        if multiplier == 1f64 {
            if let Ok(v) = number.parse::<i64>() {
                return Ok(Some(v));
            }
        }

        let parsed = number
            .parse::<f64>()
            .map_err(|_| ImportError::AmountFormatError(value.to_string()))?;
        let yen = parsed * multiplier;
        if !yen.is_finite() || yen < 0.0 || (yen - yen.round()).abs() > 1e-6 {
            return Err(ImportError::AmountFormatError(value.to_string()));
        }
        // i64::MAX as f64 == 2^63,超出即溢出
        if yen >= i64::MAX as f64 {
            return Err(ImportError::AmountFormatError(format!("金额超出范围: {}", value)));
        }

        Ok(Some(yen.round() as i64))
    }

    fn split_customer_names(&self, value: &str) -> Vec<String> {
        self.fold_width(value)
            .split(|c: char| NAME_SEPARATORS.contains(&c))
            .map(|part| strip_honorific(part.trim()).trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    }

    fn normalize_person_name(&self, value: &str) -> String {
        let folded = self.fold_width(value);
        let compact: String = folded.chars().filter(|c| !c.is_whitespace()).collect();
        strip_honorific(&compact).to_string()
    }
}

fn strip_honorific(name: &str) -> &str {
    for suffix in HONORIFICS {
        if let Some(rest) = name.strip_suffix(suffix) {
            return rest;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_width() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.fold_width("０１２３４５"), "012345");
        assert_eq!(cleaner.fold_width("山田\u{3000}太郎"), "山田 太郎");
        assert_eq!(cleaner.fold_width("ＡＢＣ"), "ABC");
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ".to_string())), None);
        assert_eq!(
            cleaner.normalize_null(Some("  value  ".to_string())),
            Some("value".to_string())
        );
        assert_eq!(cleaner.normalize_null(None), None);
    }

    #[test]
    fn test_normalize_contract_no() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_contract_no("012345").unwrap(), "012345");
        assert_eq!(cleaner.normalize_contract_no("12345").unwrap(), "012345");
        assert_eq!(cleaner.normalize_contract_no("12345.0").unwrap(), "012345");
        assert_eq!(cleaner.normalize_contract_no("０１２３４５").unwrap(), "012345");
        assert_eq!(cleaner.normalize_contract_no("No.230101").unwrap(), "230101");
        assert!(cleaner.normalize_contract_no("1234567").is_err());
        assert!(cleaner.normalize_contract_no("12A456").is_err());
        assert!(cleaner.normalize_contract_no("").is_err());
    }

    #[test]
    fn test_parse_amount() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.parse_amount("¥1,234,567").unwrap(), Some(1_234_567));
        assert_eq!(cleaner.parse_amount("1,000,000円").unwrap(), Some(1_000_000));
        assert_eq!(cleaner.parse_amount("￥５００，０００").unwrap(), Some(500_000));
        assert_eq!(cleaner.parse_amount("350万").unwrap(), Some(3_500_000));
        assert_eq!(cleaner.parse_amount("12.5万円").unwrap(), Some(125_000));
        assert_eq!(cleaner.parse_amount("100000.0").unwrap(), Some(100_000));
        assert_eq!(cleaner.parse_amount("-").unwrap(), None);
        assert_eq!(cleaner.parse_amount("").unwrap(), None);
        assert!(cleaner.parse_amount("△10,000").is_err());
        assert!(cleaner.parse_amount("約100万").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_overflow() {
        let cleaner = DataCleaner;
        assert!(cleaner.parse_amount("99999999999999999999万").is_err());
        assert!(cleaner.parse_amount("99999999999999999999").is_err());
        assert_eq!(
            cleaner.parse_amount("9223372036854775807").unwrap(),
            Some(i64::MAX)
        );
    }

    #[test]
    fn test_split_customer_names() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.split_customer_names("山田太郎・山田花子 様"),
            vec!["山田太郎", "山田花子"]
        );
        assert_eq!(
            cleaner.split_customer_names("佐藤 一郎、佐藤 二郎"),
            vec!["佐藤 一郎", "佐藤 二郎"]
        );
        assert_eq!(cleaner.split_customer_names("鈴木様／"), vec!["鈴木"]);
        assert!(cleaner.split_customer_names(" ・ ").is_empty());
    }

    #[test]
    fn test_normalize_person_name() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_person_name("山田\u{3000}太郎 様"), "山田太郎");
        assert_eq!(cleaner.normalize_person_name(" 佐藤 "), "佐藤");
    }
}
