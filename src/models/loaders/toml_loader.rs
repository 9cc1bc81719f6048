use crate::models::lesson::LessonPlan;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载课程计划
pub async fn load_lesson_plan(toml_file_path: &Path) -> Result<LessonPlan> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let plan: LessonPlan = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    if plan.id.trim().is_empty() {
        anyhow::bail!("课程计划缺少 id: {}", toml_file_path.display());
    }

    Ok(plan)
}
