// ==========================================
// G-progress - 领域类型定义
// ==========================================
// 职责: 任务状态 / 项目状态 / 付款种类 / 部门 / 会计年度
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 任务状态 (Task Status)
// ==========================================
// 红线: 状态只由日期推导,不允许人工写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted, // 无预定日
    InProgress, // 有预定日,未完成
    Completed,  // 有实绩日
}

impl TaskStatus {
    /// 由预定日/实绩日推导任务状态
    pub fn derive(due_date: Option<NaiveDate>, actual_date: Option<NaiveDate>) -> Self {
        match (due_date, actual_date) {
            (_, Some(_)) => TaskStatus::Completed,
            (Some(_), None) => TaskStatus::InProgress,
            (None, None) => TaskStatus::NotStarted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NOT_STARTED" => Ok(TaskStatus::NotStarted),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            other => Err(format!("未知任务状态: {}", other)),
        }
    }
}

// ==========================================
// 项目状态 (Project Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Contracted, // 已签约,未开工
    InProgress, // 施工中
    Completed,  // 已交房
    Cancelled,  // 已解约
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Contracted => "CONTRACTED",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CONTRACTED" => Ok(ProjectStatus::Contracted),
            "IN_PROGRESS" => Ok(ProjectStatus::InProgress),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            "CANCELLED" => Ok(ProjectStatus::Cancelled),
            other => Err(format!("未知项目状态: {}", other)),
        }
    }
}

// ==========================================
// 付款种类 (Payment Kind)
// ==========================================
// 固定五期: 申込金 / 契約金 / 着工金 / 上棟金 / 最終金
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentKind {
    ApplicationFee,
    ContractFee,
    ConstructionStartFee,
    RidgeRaisingFee,
    FinalFee,
}

impl PaymentKind {
    pub const ALL: [PaymentKind; 5] = [
        PaymentKind::ApplicationFee,
        PaymentKind::ContractFee,
        PaymentKind::ConstructionStartFee,
        PaymentKind::RidgeRaisingFee,
        PaymentKind::FinalFee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::ApplicationFee => "APPLICATION_FEE",
            PaymentKind::ContractFee => "CONTRACT_FEE",
            PaymentKind::ConstructionStartFee => "CONSTRUCTION_START_FEE",
            PaymentKind::RidgeRaisingFee => "RIDGE_RAISING_FEE",
            PaymentKind::FinalFee => "FINAL_FEE",
        }
    }

    /// 表格中的列名
    pub fn label(&self) -> &'static str {
        match self {
            PaymentKind::ApplicationFee => "申込金",
            PaymentKind::ContractFee => "契約金",
            PaymentKind::ConstructionStartFee => "着工金",
            PaymentKind::RidgeRaisingFee => "上棟金",
            PaymentKind::FinalFee => "最終金",
        }
    }
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| format!("未知付款种类: {}", s))
    }
}

// ==========================================
// 部门 (Department)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    Sales,        // 営業
    Design,       // 設計
    Construction, // 工事
    Exterior,     // 外構
    Office,       // 業務
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sales => "SALES",
            Department::Design => "DESIGN",
            Department::Construction => "CONSTRUCTION",
            Department::Exterior => "EXTERIOR",
            Department::Office => "OFFICE",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SALES" => Ok(Department::Sales),
            "DESIGN" => Ok(Department::Design),
            "CONSTRUCTION" => Ok(Department::Construction),
            "EXTERIOR" => Ok(Department::Exterior),
            "OFFICE" => Ok(Department::Office),
            other => Err(format!("未知部门: {}", other)),
        }
    }
}

// ==========================================
// 任务来源 (Task Source)
// ==========================================
// IMPORT 任务在每次导入时整体替换; MANUAL 任务永不被导入触碰
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskSource {
    Import,
    Manual,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSource::Import => "IMPORT",
            TaskSource::Manual => "MANUAL",
        }
    }
}

impl FromStr for TaskSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "IMPORT" => Ok(TaskSource::Import),
            "MANUAL" => Ok(TaskSource::Manual),
            other => Err(format!("未知任务来源: {}", other)),
        }
    }
}

// ==========================================
// 会计年度 (Fiscal Year)
// ==========================================
// 默认 8/1 ~ 次年 7/31, 以起始年份命名 (FY2024 = 2024-08-01 ~ 2025-07-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiscalYear {
    pub start_year: i32,
    pub start_month: u32,
}

pub const DEFAULT_FISCAL_YEAR_START_MONTH: u32 = 8;

impl FiscalYear {
    pub fn new(start_year: i32, start_month: u32) -> Self {
        let start_month = if (1..=12).contains(&start_month) {
            start_month
        } else {
            DEFAULT_FISCAL_YEAR_START_MONTH
        };
        Self {
            start_year,
            start_month,
        }
    }

    /// 求某日期所属会计年度
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        let fy = Self::new(date.year(), start_month);
        if date.month() >= fy.start_month {
            fy
        } else {
            Self::new(date.year() - 1, fy.start_month)
        }
    }

    /// 首日（含）
    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, self.start_month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// 末日（含）
    pub fn end(&self) -> NaiveDate {
        let next = Self::new(self.start_year + 1, self.start_month).start();
        next.pred_opt().unwrap_or(next)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date <= self.end()
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{}", self.start_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_task_status_derive() {
        assert_eq!(TaskStatus::derive(None, None), TaskStatus::NotStarted);
        assert_eq!(
            TaskStatus::derive(Some(d(2024, 5, 1)), None),
            TaskStatus::InProgress
        );
        assert_eq!(
            TaskStatus::derive(None, Some(d(2024, 5, 1))),
            TaskStatus::Completed
        );
        assert_eq!(
            TaskStatus::derive(Some(d(2024, 5, 1)), Some(d(2024, 5, 3))),
            TaskStatus::Completed
        );
    }

    #[test]
    fn test_fiscal_year_boundaries() {
        let fy = FiscalYear::containing(d(2024, 8, 1), 8);
        assert_eq!(fy.start_year, 2024);
        assert_eq!(fy.start(), d(2024, 8, 1));
        assert_eq!(fy.end(), d(2025, 7, 31));

        let fy = FiscalYear::containing(d(2025, 7, 31), 8);
        assert_eq!(fy.start_year, 2024);

        let fy = FiscalYear::containing(d(2025, 1, 15), 8);
        assert_eq!(fy.to_string(), "FY2024");
        assert!(fy.contains(d(2024, 12, 31)));
        assert!(!fy.contains(d(2025, 8, 1)));
    }

    #[test]
    fn test_fiscal_year_january_start() {
        let fy = FiscalYear::containing(d(2024, 3, 3), 1);
        assert_eq!(fy.start(), d(2024, 1, 1));
        assert_eq!(fy.end(), d(2024, 12, 31));
    }

    #[test]
    fn test_enum_round_trip_through_str() {
        for kind in PaymentKind::ALL {
            assert_eq!(kind.as_str().parse::<PaymentKind>().unwrap(), kind);
        }
        assert_eq!(
            "CANCELLED".parse::<ProjectStatus>().unwrap(),
            ProjectStatus::Cancelled
        );
        assert!("UNKNOWN".parse::<Department>().is_err());
    }
}
