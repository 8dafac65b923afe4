// ==========================================
// G-progress - 行标准化器
// ==========================================
// 职责: MappedRow → ImportRow
//   合同号/客户名/担当 清洗
//   里程碑日期 → TaskDraft（有任一日期单元格才生成）
//   付款日期/金额 → PaymentDraft
// 单元格级错误 → Warning,该单元格忽略
// ==========================================

use crate::domain::import::{
    DqLevel, DqViolation, ImportRow, MappedMilestone, MappedPayment, MappedRow, PaymentDraft,
    TaskDraft,
};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::date_normalizer::DateNormalizer;
use crate::importer::task_importer_trait::DataCleaner as DataCleanerTrait;
use chrono::NaiveDate;

/// 标准化结果
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub row: ImportRow,
    pub violations: Vec<DqViolation>,
}

pub struct RowNormalizer {
    cleaner: Box<dyn DataCleanerTrait>,
    dates: DateNormalizer,
    enforce_contract_date_floor: bool,
}

impl RowNormalizer {
    pub fn new(enforce_contract_date_floor: bool) -> Self {
        Self {
            cleaner: Box::new(DataCleaner),
            dates: DateNormalizer,
            enforce_contract_date_floor,
        }
    }

    pub fn normalize(&self, mapped: &MappedRow) -> NormalizedRow {
        let mut violations = Vec::new();

        let contract_no_raw = mapped.contract_no.clone();
        let contract_no = contract_no_raw
            .as_deref()
            .and_then(|raw| self.cleaner.normalize_contract_no(raw).ok());

        let mut sink = ViolationSink {
            row_number: mapped.row_number,
            contract_no: contract_no.clone(),
            violations: &mut violations,
        };

        let contract_date = match mapped.contract_date.as_deref() {
            Some(raw) => match self.dates.parse_absolute(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    sink.warn("contract_date", e.to_string());
                    None
                }
            },
            None => None,
        };

        let customer_names = mapped
            .customer_name
            .as_deref()
            .map(|v| self.cleaner.split_customer_names(v))
            .unwrap_or_default();

        let tasks = mapped
            .milestones
            .iter()
            .filter(|m| m.has_any_date())
            .map(|m| self.build_task(m, contract_date, &mut sink))
            .collect();

        let payments = mapped
            .payments
            .iter()
            .filter(|p| p.date.is_some() || p.amount.is_some())
            .map(|p| self.build_payment(p, contract_date, &mut sink))
            .collect();

        let row = ImportRow {
            row_number: mapped.row_number,
            contract_no,
            contract_no_raw,
            customer_names,
            contract_date,
            address: self.cleaner.normalize_null(mapped.address.clone()),
            sales_staff: self.staff(mapped.sales_staff.as_deref()),
            design_staff: self.staff(mapped.design_staff.as_deref()),
            construction_staff: self.staff(mapped.construction_staff.as_deref()),
            tasks,
            payments,
        };

        NormalizedRow { row, violations }
    }

    fn staff(&self, value: Option<&str>) -> Option<String> {
        value
            .map(|v| self.cleaner.normalize_person_name(v))
            .filter(|v| !v.is_empty())
    }

    fn build_task(
        &self,
        milestone: &MappedMilestone,
        contract_date: Option<NaiveDate>,
        sink: &mut ViolationSink<'_>,
    ) -> TaskDraft {
        let field = |role: &str| format!("{}/{}", milestone.task_name, role);

        // 下限按日期角色逐一判断,再在保留下来的日期中取到期日
        let mut resolve = |raw: &Option<String>, role: &str| {
            let date = self.resolve_cell(raw.as_deref(), contract_date, &field(role), sink);
            self.apply_floor(date, contract_date, &field(role), sink)
        };
        let planned = resolve(&milestone.planned, "planned");
        let confirmed = resolve(&milestone.confirmed, "confirmed");
        let actual_completion_date = resolve(&milestone.actual, "actual");

        let due_date = confirmed.or(planned);

        TaskDraft {
            task_name: milestone.task_name.clone(),
            department: milestone.department,
            sort_order: milestone.sort_order,
            due_date,
            actual_completion_date,
        }
    }

    fn build_payment(
        &self,
        payment: &MappedPayment,
        contract_date: Option<NaiveDate>,
        sink: &mut ViolationSink<'_>,
    ) -> PaymentDraft {
        let field = |part: &str| format!("{}/{}", payment.kind.as_str(), part);

        let scheduled_date =
            self.resolve_cell(payment.date.as_deref(), contract_date, &field("date"), sink);

        let amount = match payment.amount.as_deref() {
            Some(raw) => match self.cleaner.parse_amount(raw) {
                Ok(v) => v,
                Err(e) => {
                    sink.warn(&field("amount"), e.to_string());
                    None
                }
            },
            None => None,
        };

        PaymentDraft {
            kind: payment.kind,
            scheduled_date,
            amount,
        }
    }

    fn resolve_cell(
        &self,
        raw: Option<&str>,
        contract_date: Option<NaiveDate>,
        field: &str,
        sink: &mut ViolationSink<'_>,
    ) -> Option<NaiveDate> {
        let raw = raw?;
        match self.dates.resolve(raw, contract_date) {
            Ok(date) => Some(date),
            Err(e) => {
                sink.warn(field, e.to_string());
                None
            }
        }
    }

    /// 早于合同日期的任务日期: 记录 Warning,开启下限时丢弃
    fn apply_floor(
        &self,
        date: Option<NaiveDate>,
        contract_date: Option<NaiveDate>,
        field: &str,
        sink: &mut ViolationSink<'_>,
    ) -> Option<NaiveDate> {
        match (date, contract_date) {
            (Some(d), Some(contract)) if d < contract => {
                if self.enforce_contract_date_floor {
                    sink.warn(field, format!("日期 {} 早于合同日期 {},已忽略", d, contract));
                    None
                } else {
                    sink.warn(field, format!("日期 {} 早于合同日期 {}", d, contract));
                    Some(d)
                }
            }
            _ => date,
        }
    }
}

struct ViolationSink<'a> {
    row_number: usize,
    contract_no: Option<String>,
    violations: &'a mut Vec<DqViolation>,
}

impl ViolationSink<'_> {
    fn warn(&mut self, field: &str, message: String) {
        self.violations.push(DqViolation {
            row_number: self.row_number,
            contract_no: self.contract_no.clone(),
            level: DqLevel::Warning,
            field: field.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::column_layout::ColumnLayout;
    use crate::domain::import::RawSheetRow;
    use crate::domain::types::{PaymentKind, TaskStatus};
    use crate::importer::field_mapper::FieldMapper;
    use crate::importer::task_importer_trait::FieldMapper as _;

    fn mapped(cells: &[(usize, &str)]) -> MappedRow {
        let mut values = vec![String::new(); 228];
        for (idx, v) in cells {
            values[*idx] = v.to_string();
        }
        let raw = RawSheetRow {
            row_number: 3,
            cells: values,
        };
        FieldMapper.map_row(&raw, &ColumnLayout::default())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_normalize_basic_row() {
        let normalizer = RowNormalizer::new(true);
        let m = mapped(&[
            (1, "12345"),
            (2, "山田太郎・山田花子様"),
            (3, "2024/10/15"),
            (5, "営業　一郎"),
            // 請負契約: 预定日 + 实绩日
            (20, "10/15"),
            (22, "10/15"),
            // 第 2 个里程碑仅预定日,月份早于合同月份 → 次年
            (23, "3/1"),
            (10, "10/20"),
            (11, "¥100,000"),
        ]);

        let result = normalizer.normalize(&m);
        let row = result.row;

        assert!(result.violations.is_empty());
        assert_eq!(row.contract_no.as_deref(), Some("012345"));
        assert_eq!(row.customer_names, vec!["山田太郎", "山田花子"]);
        assert_eq!(row.contract_date, Some(d(2024, 10, 15)));
        assert_eq!(row.sales_staff.as_deref(), Some("営業一郎"));
        assert_eq!(row.tasks.len(), 2);
        assert_eq!(row.tasks[0].status(), TaskStatus::Completed);
        assert_eq!(row.tasks[1].due_date, Some(d(2025, 3, 1)));
        assert_eq!(row.tasks[1].status(), TaskStatus::InProgress);
        assert_eq!(row.payments.len(), 1);
        assert_eq!(row.payments[0].kind, PaymentKind::ApplicationFee);
        assert_eq!(row.payments[0].amount, Some(100_000));
        assert_eq!(row.payments[0].scheduled_date, Some(d(2024, 10, 20)));
    }

    #[test]
    fn test_confirmed_date_wins_over_planned() {
        let normalizer = RowNormalizer::new(true);
        let m = mapped(&[(1, "000001"), (3, "2024/04/01"), (20, "5/1"), (21, "5/10")]);

        let row = normalizer.normalize(&m).row;

        assert_eq!(row.tasks[0].due_date, Some(d(2024, 5, 10)));
    }

    #[test]
    fn test_bad_cells_become_warnings() {
        let normalizer = RowNormalizer::new(true);
        let m = mapped(&[(1, "000001"), (3, "2024/04/01"), (20, "未定"), (11, "約100万")]);

        let result = normalizer.normalize(&m);

        assert_eq!(result.violations.len(), 2);
        assert!(result.violations.iter().all(|v| v.level == DqLevel::Warning));
        // 单元格非空 → 任务仍生成,但无日期
        assert_eq!(result.row.tasks.len(), 1);
        assert_eq!(result.row.tasks[0].status(), TaskStatus::NotStarted);
        assert_eq!(result.row.payments[0].amount, None);
    }

    #[test]
    fn test_contract_date_floor() {
        let m = mapped(&[(1, "000001"), (3, "2024/04/01"), (20, "2024/03/01")]);

        let enforced = RowNormalizer::new(true).normalize(&m);
        assert_eq!(enforced.row.tasks[0].due_date, None);
        assert_eq!(enforced.violations.len(), 1);

        let relaxed = RowNormalizer::new(false).normalize(&m);
        assert_eq!(relaxed.row.tasks[0].due_date, Some(d(2024, 3, 1)));
        assert_eq!(relaxed.violations.len(), 1);
    }

    #[test]
    fn test_early_confirmed_date_falls_back_to_planned() {
        let m = mapped(&[
            (1, "000001"),
            (3, "2024/04/01"),
            (20, "2024/05/01"),
            (21, "2024/03/01"),
        ]);

        let result = RowNormalizer::new(true).normalize(&m);

        assert_eq!(result.row.tasks[0].due_date, Some(d(2024, 5, 1)));
        assert_eq!(result.row.tasks[0].status(), TaskStatus::InProgress);
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].field.ends_with("/confirmed"));
    }

    #[test]
    fn test_invalid_contract_no_keeps_raw() {
        let normalizer = RowNormalizer::new(true);
        let m = mapped(&[(1, "ABC"), (3, "2024/04/01")]);

        let row = normalizer.normalize(&m).row;

        assert_eq!(row.contract_no, None);
        assert_eq!(row.contract_no_raw.as_deref(), Some("ABC"));
    }
}
