// ==========================================
// G-progress - 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 日志写 stderr,stdout 留给命令输出的 JSON
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 参数
/// - verbose: 无 RUST_LOG 时使用 debug 级别（默认 info）
/// - json: 以 JSON 行输出
///
/// # 返回
/// - true: 本次安装了全局 subscriber
/// - false: 已有 subscriber（例如库被嵌入时）,沿用已有配置
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器,例如 RUST_LOG=g_progress::importer=debug
pub fn init(verbose: bool, json: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("日志系统已初始化,沿用已有配置: {}", e);
            false
        }
    }
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
