// ==========================================
// G-progress - 导入核对集成测试
// ==========================================

mod test_helpers;

use g_progress::config::{config_keys, ConfigManager};
use g_progress::domain::types::{PaymentKind, TaskSource};
use g_progress::importer::{ImportOptions, ImportVerifier, TaskImporter, TaskImporterImpl};
use g_progress::repository::{ImportRepositoryImpl, ProjectRepository, TaskRepository};
use std::path::Path;
use tempfile::NamedTempFile;
use test_helpers::{RowBuilder, SheetBuilder};

fn setup() -> (NamedTempFile, String) {
    g_progress::logging::init_test();
    test_helpers::create_test_db().expect("创建测试数据库失败")
}

fn verifier(db_path: &str) -> ImportVerifier<ImportRepositoryImpl, ConfigManager> {
    ImportVerifier::new(
        ImportRepositoryImpl::new(db_path).unwrap(),
        ConfigManager::new(db_path).unwrap(),
    )
}

async fn import(db_path: &str, file: &Path) {
    let importer = TaskImporterImpl::with_defaults(
        ImportRepositoryImpl::new(db_path).unwrap(),
        ConfigManager::new(db_path).unwrap(),
    );
    importer
        .import_file(file, &ImportOptions::default())
        .await
        .unwrap();
}

fn sheet() -> SheetBuilder {
    SheetBuilder::new()
        .row(
            RowBuilder::new("012345", "山田太郎", "2024/05/10")
                .planned("着工", "6/1")
                .actual("着工", "6/3")
                .planned("上棟", "7/15")
                .payment(PaymentKind::ContractFee, "2024/05/10", "1000000")
                .payment(PaymentKind::FinalFee, "3/31", ""),
        )
        .row(
            RowBuilder::new("012346", "佐藤花子", "2024/06/01")
                .planned("着工", "8/1")
                .planned("引渡", "2/1"),
        )
}

#[tokio::test]
async fn test_verify_after_import_is_clean() {
    let (_db, db_path) = setup();
    let file = sheet().write();
    import(&db_path, file.path()).await;

    let report = verifier(&db_path).verify_file(file.path(), None).await.unwrap();

    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.checked_rows, 2);
    assert_eq!(report.matched_projects, 2);
    assert_eq!(report.blocked_rows, 0);
}

#[tokio::test]
async fn test_verify_detects_missing_task() {
    let (_db, db_path) = setup();
    let file = sheet().write();
    import(&db_path, file.path()).await;

    let project_id = ProjectRepository::new(&db_path)
        .unwrap()
        .find_by_contract_no("012345")
        .unwrap()[0]
        .project_id
        .clone();
    let task_repo = TaskRepository::new(&db_path).unwrap();
    let completed = task_repo
        .list_by_project(&project_id)
        .unwrap()
        .into_iter()
        .find(|t| t.task_name == "着工" && t.source == TaskSource::Import)
        .unwrap();
    task_repo.delete(&completed.task_id).unwrap();

    let report = verifier(&db_path).verify_file(file.path(), None).await.unwrap();

    assert!(!report.is_clean());
    let metrics: Vec<&str> = report.mismatches.iter().map(|m| m.metric.as_str()).collect();
    assert!(metrics.contains(&"imported_tasks"));
    assert!(metrics.contains(&"completed_tasks"));

    let tasks = report
        .mismatches
        .iter()
        .find(|m| m.metric == "imported_tasks")
        .unwrap();
    assert_eq!(tasks.expected, 2);
    assert_eq!(tasks.actual, 1);
    assert_eq!(tasks.contract_no, "012345");
}

#[tokio::test]
async fn test_verify_reports_unresolved_rows() {
    let (_db, db_path) = setup();
    let file = sheet().write();

    // 未导入直接核对
    let report = verifier(&db_path).verify_file(file.path(), None).await.unwrap();

    assert_eq!(report.unresolved.len(), 2);
    assert_eq!(report.matched_projects, 0);
    assert!(report.unresolved[0].reason.contains("无对应项目"));
}

#[tokio::test]
async fn test_verify_reports_dates_before_contract_date() {
    let (_db, db_path) = setup();
    ConfigManager::new(&db_path)
        .unwrap()
        .set_global_config_value(config_keys::ENFORCE_CONTRACT_DATE_FLOOR, "false")
        .unwrap();

    let file = SheetBuilder::new()
        .row(
            RowBuilder::new("300001", "伊藤", "2024/05/10")
                .planned("地盤調査", "2024/04/20")
                .planned("着工", "2024/06/01"),
        )
        .write();
    import(&db_path, file.path()).await;

    let report = verifier(&db_path).verify_file(file.path(), None).await.unwrap();

    assert!(report.mismatches.is_empty());
    assert_eq!(report.date_violations.len(), 1);
    assert_eq!(report.date_violations[0].task_name, "地盤調査");
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_verify_skips_blocked_rows() {
    let (_db, db_path) = setup();
    let file = sheet()
        .row(RowBuilder::new("", "名無し", "2024/05/10").planned("着工", "6/1"))
        .write();
    import(&db_path, file.path()).await;

    let report = verifier(&db_path).verify_file(file.path(), None).await.unwrap();

    assert_eq!(report.blocked_rows, 1);
    assert_eq!(report.checked_rows, 2);
    assert!(report.is_clean());
}
