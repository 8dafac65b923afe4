// ==========================================
// G-progress - 客户名匹配
// ==========================================
// 规则: 标准化后的名字互相包含即视为命中
//   "山田" ⊂ "山田太郎" → 命中
// 得分 = 命中的行内客户名数量
// ==========================================

use crate::importer::data_cleaner::DataCleaner;
use crate::importer::task_importer_trait::DataCleaner as _;

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerMatcher;

impl CustomerMatcher {
    /// 比较用标准化（去空白/敬称,折叠全角）
    pub fn normalize(&self, name: &str) -> String {
        DataCleaner.normalize_person_name(name)
    }

    /// 同一客户组判定键（顺序无关）
    pub fn customer_key(&self, names: &[String]) -> String {
        let mut normalized: Vec<String> = names
            .iter()
            .map(|n| self.normalize(n))
            .filter(|n| !n.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        normalized.join("|")
    }

    /// 行内客户名与候选客户名的包含得分
    pub fn score(&self, row_names: &[String], stored_names: &[String]) -> usize {
        let stored: Vec<String> = stored_names
            .iter()
            .map(|n| self.normalize(n))
            .filter(|n| !n.is_empty())
            .collect();

        row_names
            .iter()
            .map(|n| self.normalize(n))
            .filter(|n| !n.is_empty())
            .filter(|n| stored.iter().any(|s| s.contains(n.as_str()) || n.contains(s.as_str())))
            .count()
    }

    pub fn has_names(&self, names: &[String]) -> bool {
        names.iter().any(|n| !self.normalize(n).is_empty())
    }
}
