// ==========================================
// G-progress - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod customer_repo;
pub mod employee_repo;
pub mod error;
pub mod import_repo;
pub mod import_repo_impl;
pub mod payment_repo;
pub mod project_repo;
pub mod row_mapping;
pub mod task_repo;

// 重导出核心仓储
pub use customer_repo::CustomerRepository;
pub use employee_repo::EmployeeRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_repo::ImportRepository;
pub use import_repo_impl::ImportRepositoryImpl;
pub use payment_repo::PaymentRepository;
pub use project_repo::ProjectRepository;
pub use task_repo::TaskRepository;
