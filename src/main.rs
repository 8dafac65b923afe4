// ==========================================
// G-progress - 命令行入口
// ==========================================
// 输出: stdout 为格式化 JSON; 日志写 stderr
// ==========================================

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use g_progress::app::{get_default_db_path, AppState, DB_PATH_ENV};
use g_progress::config::{config_keys, ColumnLayout};
use g_progress::importer::ImportOptions;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "g-progress")]
#[command(version, about = "工程进度表导入与核对")]
pub struct Cli {
    /// 数据库文件路径
    #[arg(long, global = true, env = DB_PATH_ENV)]
    pub db: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 日志以 JSON 行输出
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 创建数据库并建表
    InitDb,
    /// 导入进度表（每个文件一个批次）
    Import {
        /// CSV / Excel 文件
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// 只跑管道不落库
        #[arg(long)]
        dry_run: bool,

        /// 列布局 JSON 文件（覆盖配置）
        #[arg(long)]
        layout: Option<PathBuf>,
    },
    /// 核对文件与已落库数据
    Verify {
        file: PathBuf,

        #[arg(long)]
        layout: Option<PathBuf>,
    },
    /// 最近的导入批次
    Batches {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// 导入冲突队列
    Conflicts {
        #[arg(long)]
        batch: Option<String>,

        /// OPEN / RESOLVED / IGNORED
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value = "50")]
        limit: i32,

        #[arg(long, default_value = "0")]
        offset: i32,
    },
    /// 关闭冲突
    ResolveConflict {
        conflict_id: String,

        /// RESOLVED / IGNORED
        #[arg(long, default_value = "RESOLVED")]
        status: String,

        #[arg(long)]
        note: Option<String>,
    },
    /// 项目列表
    Projects {
        /// 会计年度起始年（FY2024 → 2024）
        #[arg(long)]
        fiscal_year: Option<i32>,

        #[arg(long)]
        contract_no: Option<String>,
    },
    /// 项目详情
    Project { project_id: String },
    /// 项目任务列表
    Tasks { project_id: String },
    /// 员工列表
    Employees,
    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// 删除超过保留期的批次
    Prune {
        /// 保留天数（默认读配置）
        #[arg(long)]
        days: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// 读取配置（省略 key 时输出全部）
    Get { key: Option<String> },
    /// 写入配置
    Set { key: String, value: String },
    /// 删除配置,恢复默认值
    Unset { key: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_layout(path: Option<&Path>) -> Result<Option<ColumnLayout>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取列布局文件: {}", path.display()))?;
    let layout = ColumnLayout::from_json(&raw)
        .map_err(|e| anyhow::anyhow!("列布局文件无效 {}: {}", path.display(), e))?;
    Ok(Some(layout))
}

fn check_config_key(key: &str) -> Result<()> {
    if !config_keys::ALL.contains(&key) {
        bail!("未知配置项: {} (可选: {})", key, config_keys::ALL.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    g_progress::logging::init(cli.verbose, cli.log_json);

    let db_path = match &cli.db {
        Some(path) => path.to_string_lossy().to_string(),
        None => get_default_db_path(),
    };
    tracing::debug!(db_path = %db_path, version = g_progress::VERSION, "启动");

    let state = AppState::new(db_path.clone())
        .with_context(|| format!("无法初始化数据库: {}", db_path))?;

    match cli.command {
        Commands::InitDb => {
            tracing::info!(db_path = %db_path, "数据库已就绪");
            print_json(&serde_json::json!({ "db_path": db_path }))?;
        }
        Commands::Import {
            files,
            dry_run,
            layout,
        } => {
            let options = ImportOptions {
                dry_run,
                layout_override: read_layout(layout.as_deref())?,
            };
            if files.len() == 1 {
                let report = state.import_api.import_file(&files[0], options).await?;
                print_json(&report)?;
            } else {
                let outcomes = state.import_api.import_files(files, options).await?;
                print_json(&outcomes)?;
            }
        }
        Commands::Verify { file, layout } => {
            let layout = read_layout(layout.as_deref())?;
            let report = state.import_api.verify_file(&file, layout).await?;
            let clean = report.is_clean();
            print_json(&report)?;
            if !clean {
                std::process::exit(2);
            }
        }
        Commands::Batches { limit } => {
            print_json(&state.import_api.list_batches(limit).await?)?;
        }
        Commands::Conflicts {
            batch,
            status,
            limit,
            offset,
        } => {
            let response = state
                .import_api
                .list_conflicts(batch.as_deref(), status.as_deref(), limit, offset)
                .await?;
            print_json(&response)?;
        }
        Commands::ResolveConflict {
            conflict_id,
            status,
            note,
        } => {
            let conflict = state
                .import_api
                .resolve_conflict(&conflict_id, &status, note.as_deref())
                .await?;
            print_json(&conflict)?;
        }
        Commands::Projects {
            fiscal_year,
            contract_no,
        } => {
            let projects = state
                .project_api
                .list_projects(fiscal_year, contract_no.as_deref())
                .await?;
            print_json(&projects)?;
        }
        Commands::Project { project_id } => {
            print_json(&state.project_api.get_project(&project_id)?)?;
        }
        Commands::Tasks { project_id } => {
            print_json(&state.project_api.list_tasks(&project_id)?)?;
        }
        Commands::Employees => {
            print_json(&state.employee_repo.list_all()?)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Get { key: Some(key) } => {
                check_config_key(&key)?;
                let value = state.config_manager.get_global_config_value(&key)?;
                print_json(&BTreeMap::from([(key, value)]))?;
            }
            ConfigCommands::Get { key: None } => {
                print_json(&state.config_manager.get_config_snapshot()?)?;
            }
            ConfigCommands::Set { key, value } => {
                check_config_key(&key)?;
                if key == config_keys::COLUMN_LAYOUT {
                    ColumnLayout::from_json(&value)
                        .map_err(|e| anyhow::anyhow!("列布局无效: {}", e))?;
                }
                state.config_manager.set_global_config_value(&key, &value)?;
                print_json(&BTreeMap::from([(key, value)]))?;
            }
            ConfigCommands::Unset { key } => {
                check_config_key(&key)?;
                let removed = state.config_manager.remove_global_config_value(&key)?;
                print_json(&serde_json::json!({ "key": key, "removed": removed }))?;
            }
        },
        Commands::Prune { days } => {
            print_json(&state.import_api.prune_batches(days).await?)?;
        }
    }

    Ok(())
}
