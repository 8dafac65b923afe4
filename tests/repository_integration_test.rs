// ==========================================
// G-progress - Repository 集成测试
// ==========================================
// 覆盖: 项目/客户/员工/任务/付款 CRUD,导入批次与冲突队列
// ==========================================

mod test_helpers;

use chrono::{Duration, NaiveDate, Utc};
use g_progress::domain::import::{ConflictStatus, ConflictType, ImportBatch, ImportConflict};
use g_progress::domain::payment::Payment;
use g_progress::domain::project::{Customer, Project};
use g_progress::domain::task::Task;
use g_progress::domain::types::{
    Department, FiscalYear, PaymentKind, ProjectStatus, TaskSource, TaskStatus,
};
use g_progress::repository::{
    CustomerRepository, EmployeeRepository, ImportRepository, ImportRepositoryImpl,
    PaymentRepository, ProjectRepository, RepositoryError, TaskRepository,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn batch(batch_id: &str, imported_at: chrono::DateTime<Utc>) -> ImportBatch {
    ImportBatch {
        batch_id: batch_id.to_string(),
        file_name: Some("progress.csv".to_string()),
        file_path: Some("/tmp/progress.csv".to_string()),
        total_rows: 2,
        success_rows: 1,
        blocked_rows: 0,
        warning_rows: 0,
        conflict_rows: 1,
        created_projects: 1,
        tasks_written: 3,
        payments_written: 1,
        dry_run: false,
        imported_at: Some(imported_at),
        elapsed_ms: Some(12),
        dq_report_json: None,
    }
}

fn conflict(batch_id: &str, row_number: usize) -> ImportConflict {
    ImportConflict {
        conflict_id: uuid::Uuid::new_v4().to_string(),
        batch_id: batch_id.to_string(),
        row_number,
        contract_no: Some("012345".to_string()),
        conflict_type: ConflictType::AmbiguousContract,
        raw_data: "{}".to_string(),
        reason: "候选项目无法区分".to_string(),
        status: ConflictStatus::Open,
        resolution_note: None,
        resolved_at: None,
        created_at: Utc::now(),
    }
}

// ==========================================
// 项目 / 客户
// ==========================================

#[test]
fn test_project_crud_and_fiscal_year_listing() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let customers = CustomerRepository::new(&db_path).unwrap();
    let projects = ProjectRepository::new(&db_path).unwrap();

    let customer = Customer::new(vec!["山田太郎".to_string()]);
    customers.insert(&customer).unwrap();

    let mut p1 = Project::new("012345", Some(d(2024, 8, 1)));
    p1.customer_id = Some(customer.customer_id.clone());
    let p2 = Project::new("012345", Some(d(2025, 7, 31)));
    let p3 = Project::new("099999", Some(d(2024, 7, 31)));
    for p in [&p1, &p2, &p3] {
        projects.insert(p).unwrap();
    }

    // 合同号不唯一
    assert_eq!(projects.find_by_contract_no("012345").unwrap().len(), 2);

    let candidates = projects.find_candidates("012345").unwrap();
    let with_names = candidates
        .iter()
        .find(|c| c.project.project_id == p1.project_id)
        .unwrap();
    assert_eq!(with_names.customer_names, vec!["山田太郎".to_string()]);

    // FY2024 = 2024-08-01 ~ 2025-07-31
    let fy2024 = projects.list_by_fiscal_year(FiscalYear::new(2024, 8)).unwrap();
    let ids: Vec<&str> = fy2024.iter().map(|p| p.project_id.as_str()).collect();
    assert_eq!(ids, vec![p1.project_id.as_str(), p2.project_id.as_str()]);

    let mut updated = projects.find_by_id(&p1.project_id).unwrap().unwrap();
    updated.status = ProjectStatus::Cancelled;
    updated.address = Some("横浜市".to_string());
    projects.update(&updated).unwrap();
    let reloaded = projects.find_by_id(&p1.project_id).unwrap().unwrap();
    assert_eq!(reloaded.status, ProjectStatus::Cancelled);
    assert_eq!(reloaded.address.as_deref(), Some("横浜市"));

    // 删除客户: 项目保留,customer_id 置空
    assert!(customers.delete(&customer.customer_id).unwrap());
    let orphan = projects.find_by_id(&p1.project_id).unwrap().unwrap();
    assert_eq!(orphan.customer_id, None);

    assert!(projects.delete(&p3.project_id).unwrap());
    assert!(!projects.delete(&p3.project_id).unwrap());
    assert_eq!(projects.list_all().unwrap().len(), 2);
}

#[test]
fn test_update_missing_project_returns_not_found() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let projects = ProjectRepository::new(&db_path).unwrap();

    let ghost = Project::new("000001", None);
    let err = projects.update(&ghost).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[test]
fn test_customer_update_names() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let customers = CustomerRepository::new(&db_path).unwrap();

    let customer = Customer::new(vec!["山田太郎".to_string()]);
    customers.insert(&customer).unwrap();
    customers
        .update_names(
            &customer.customer_id,
            &["山田太郎".to_string(), "山田花子".to_string()],
        )
        .unwrap();

    let reloaded = customers.find_by_id(&customer.customer_id).unwrap().unwrap();
    assert_eq!(reloaded.display_name(), "山田太郎・山田花子");
    assert_eq!(customers.list_all().unwrap().len(), 1);

    assert!(matches!(
        customers.update_names("missing", &[]),
        Err(RepositoryError::NotFound { .. })
    ));
}

// ==========================================
// 员工
// ==========================================

#[test]
fn test_employee_find_or_create_is_idempotent() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let employees = EmployeeRepository::new(&db_path).unwrap();

    let id1 = employees.find_or_create("佐藤一郎", Some(Department::Sales)).unwrap();
    let id2 = employees.find_or_create("佐藤一郎", None).unwrap();
    assert_eq!(id1, id2);
    assert_eq!(employees.list_all().unwrap().len(), 1);

    employees
        .update_department(&id1, Some(Department::Construction))
        .unwrap();
    let employee = employees.find_by_id(&id1).unwrap().unwrap();
    assert_eq!(employee.department, Some(Department::Construction));

    assert!(employees.delete(&id1).unwrap());
    assert!(employees.find_by_name("佐藤一郎").unwrap().is_none());
}

// ==========================================
// 任务 / 付款
// ==========================================

#[test]
fn test_task_crud_derives_status_and_cascades() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let projects = ProjectRepository::new(&db_path).unwrap();
    let tasks = TaskRepository::new(&db_path).unwrap();
    let payments = PaymentRepository::new(&db_path).unwrap();

    let project = Project::new("012345", Some(d(2024, 5, 10)));
    projects.insert(&project).unwrap();

    let mut task = Task::manual(&project.project_id, "施主打合せ", None, Some(d(2024, 6, 1)));
    tasks.insert(&task).unwrap();
    assert_eq!(
        tasks.find_by_id(&task.task_id).unwrap().unwrap().status,
        TaskStatus::InProgress
    );

    task.set_dates(task.due_date, Some(d(2024, 6, 2)));
    tasks.update(&task).unwrap();
    let reloaded = tasks.find_by_id(&task.task_id).unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Completed);
    assert_eq!(reloaded.source, TaskSource::Manual);
    assert_eq!(
        tasks.count_by_source(&project.project_id, TaskSource::Manual).unwrap(),
        1
    );

    payments
        .upsert(&Payment::new(
            &project.project_id,
            PaymentKind::FinalFee,
            None,
            Some(500_000),
        ))
        .unwrap();
    payments
        .upsert(&Payment::new(
            &project.project_id,
            PaymentKind::ApplicationFee,
            Some(d(2024, 5, 1)),
            Some(100_000),
        ))
        .unwrap();
    // 同种类再次写入: 覆盖
    payments
        .upsert(&Payment::new(
            &project.project_id,
            PaymentKind::FinalFee,
            Some(d(2025, 3, 31)),
            Some(600_000),
        ))
        .unwrap();

    let listed = payments.list_by_project(&project.project_id).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].kind, PaymentKind::ApplicationFee);
    assert_eq!(listed[1].amount, Some(600_000));

    assert!(payments
        .delete(&project.project_id, PaymentKind::ApplicationFee)
        .unwrap());
    assert!(payments
        .find(&project.project_id, PaymentKind::ApplicationFee)
        .unwrap()
        .is_none());

    // 删除项目: 任务/付款级联删除
    projects.delete(&project.project_id).unwrap();
    assert!(tasks.find_by_id(&task.task_id).unwrap().is_none());
    assert!(payments.list_by_project(&project.project_id).unwrap().is_empty());
}

// ==========================================
// 导入批次 / 冲突队列
// ==========================================

#[tokio::test]
async fn test_conflict_queue_filter_and_resolve() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let repo = ImportRepositoryImpl::new(&db_path).unwrap();

    repo.insert_batch(batch("b1", Utc::now())).await.unwrap();
    repo.insert_batch(batch("b2", Utc::now())).await.unwrap();

    let inserted = repo
        .batch_insert_conflicts(vec![conflict("b1", 3), conflict("b1", 4), conflict("b2", 3)])
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    assert_eq!(repo.count_conflicts(None, None).await.unwrap(), 3);
    assert_eq!(repo.count_conflicts(Some("b1"), None).await.unwrap(), 2);

    let page = repo
        .list_conflicts_with_filter(Some("b1"), Some(ConflictStatus::Open), 1, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    let target = page[0].conflict_id.clone();
    repo.resolve_conflict(&target, ConflictStatus::Ignored, Some("手工确认"))
        .await
        .unwrap();

    let resolved = repo.get_conflict_by_id(&target).await.unwrap().unwrap();
    assert_eq!(resolved.status, ConflictStatus::Ignored);
    assert_eq!(resolved.resolution_note.as_deref(), Some("手工确认"));
    assert!(resolved.resolved_at.is_some());

    assert_eq!(
        repo.count_conflicts(Some("b1"), Some(ConflictStatus::Open))
            .await
            .unwrap(),
        1
    );

    // 不允许重新打开
    let err = repo
        .resolve_conflict(&target, ConflictStatus::Open, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError(_)));

    let err = repo
        .resolve_conflict("missing", ConflictStatus::Resolved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_prune_batches_cascades_conflicts() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let repo = ImportRepositoryImpl::new(&db_path).unwrap();

    repo.insert_batch(batch("old", Utc::now() - Duration::days(120)))
        .await
        .unwrap();
    repo.insert_batch(batch("new", Utc::now())).await.unwrap();
    repo.batch_insert_conflicts(vec![conflict("old", 3), conflict("new", 3)])
        .await
        .unwrap();

    let deleted = repo
        .prune_batches_older_than(Utc::now() - Duration::days(90))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let recent = repo.get_recent_batches(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].batch_id, "new");
    assert_eq!(repo.count_conflicts(None, None).await.unwrap(), 1);
}
