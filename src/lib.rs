// ==========================================
// G-progress - 核心库
// ==========================================
// 职责: 工程进度表（CSV/Excel）导入、落库与核对
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Department, FiscalYear, PaymentKind, ProjectStatus, TaskSource, TaskStatus};

// 领域实体
pub use domain::{Customer, Employee, Payment, Project, Task};

// 导入
pub use importer::{ImportOptions, ImportVerifier, TaskImporter, TaskImporterImpl};

// API
pub use api::{ImportApi, ProjectApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "G-progress";
