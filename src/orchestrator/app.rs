//! 命令行应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：选择持久化后端、创建生成服务、打开课程
//! 2. **单次请求**：提交一条更新请求，打印差异
//! 3. **确认**：按参数接受或撤销修改，退出前保存剩余编辑
//!
//! ## 用法
//!
//! ```text
//! lesson-copilot [--config config.toml] [--plan plan.toml] [--accept] <request...>
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::clients::{LlmClient, RestLessonStore};
use crate::config::Config;
use crate::infrastructure::store::{InMemoryLessonStore, LessonStore};
use crate::models::lesson::LessonPlan;
use crate::models::loaders::load_lesson_plan;
use crate::orchestrator::lesson_session::LessonSession;
use crate::utils::logging::{log_pending_change, log_startup};

/// 命令行参数
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(
    name = "lesson-copilot",
    version,
    about = "按自然语言请求修改课程文档并自动保存"
)]
pub struct CliArgs {
    /// TOML 配置文件
    #[arg(long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// 课程计划 TOML 文件（缺省时使用演示课程）
    #[arg(long = "plan", value_name = "FILE")]
    pub plan_path: Option<PathBuf>,

    /// 接受修改并立即保存（缺省时撤销）
    #[arg(long)]
    pub accept: bool,

    /// 修改请求，例如: add 5 practice problems
    #[arg(required = true, num_args = 1..)]
    pub request: Vec<String>,
}

impl CliArgs {
    /// 请求文本（各个单词以空格连接）
    pub fn request_text(&self) -> String {
        self.request.join(" ")
    }
}

/// 应用主结构
pub struct App {
    args: CliArgs,
    session: LessonSession,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, args: CliArgs) -> Result<Self> {
        let plan = match &args.plan_path {
            Some(path) => load_lesson_plan(path).await?,
            None => demo_plan(),
        };

        let (store, store_label): (Arc<dyn LessonStore>, String) =
            if config.store_base_url.trim().is_empty() {
                (Arc::new(InMemoryLessonStore::new()), "内存".to_string())
            } else {
                (
                    Arc::new(RestLessonStore::new(&config)?),
                    config.store_base_url.clone(),
                )
            };

        let generator = Arc::new(LlmClient::new(&config));
        log_startup(&plan.id, generator.model_name(), &store_label);

        let session =
            LessonSession::open(&plan, store, generator, config.scheduler_options())
                .await
                .with_context(|| format!("无法打开课程 {}", plan.id))?;

        Ok(Self { args, session })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        let request = self.args.request_text();
        let change = match self.session.submit_update_request(&request).await {
            Ok(change) => change,
            Err(e) => {
                error!("❌ {}", e);
                return Err(e.into());
            }
        };

        log_pending_change(change);
        if !change.is_noop() {
            println!("{}", change.diff());
        }

        if self.args.accept {
            if let Err(e) = self.session.accept().await {
                warn!("⚠️ 保存失败，尝试手动重试: {}", e);
                self.session
                    .retry()
                    .await
                    .context("保存失败，修改只保留在内存中")?;
            }
        } else {
            self.session.undo()?;
            info!("💡 未使用 --accept，修改已撤销");
        }

        self.session.flush().await?;
        let status = self.session.save_status();
        info!(
            "📊 保存状态: {:?}, 最近保存: {}",
            status.state,
            status
                .last_saved
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "无".to_string())
        );

        Ok(())
    }
}

/// 没有指定课程计划时使用的演示课程
fn demo_plan() -> LessonPlan {
    LessonPlan {
        id: "demo-lesson".to_string(),
        title: "Adding Fractions with Unlike Denominators".to_string(),
        student: "Demo Student".to_string(),
        date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        objectives: vec![
            "Understand why fractions need a common denominator".to_string(),
            "Add fractions with unlike denominators".to_string(),
        ],
        key_concepts: vec![
            "Least common denominator".to_string(),
            "Equivalent fractions".to_string(),
        ],
        time_breakdown: "10 min warm-up, 25 min guided practice, 10 min review".to_string(),
        lesson_steps: vec![
            "Review equivalent fractions".to_string(),
            "Model finding a common denominator".to_string(),
            "Guided practice".to_string(),
        ],
        notes: "Use fraction strips for visual support.".to_string(),
    }
}
