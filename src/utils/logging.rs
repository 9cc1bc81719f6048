/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::workflow::pending_change::PendingChange;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则默认 `info`；`verbose` 为 true 时本 crate 提升到 `debug`。
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "info,lesson_copilot=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // 重复初始化（例如测试中）时忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(lesson_id: &str, model_name: &str, store: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 课程助手启动");
    info!("📘 课程: {}", lesson_id);
    info!("🤖 生成模型: {}", model_name);
    info!("💾 存储: {}", store);
    info!("{}", "=".repeat(60));
}

/// 打印待确认修改的摘要
pub fn log_pending_change(change: &PendingChange) {
    info!("\n{}", "─".repeat(60));
    info!("📝 {}", change.description);
    if change.is_noop() {
        info!("（文档没有变化）");
    } else {
        info!(
            "变更: +{} / -{} 行",
            change.lines_added(),
            change.lines_removed()
        );
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
