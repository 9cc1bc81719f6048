//! # Lesson Copilot
//!
//! 课程文档更新流水线：根据自由文本请求改写课程文档，
//! 只替换目标章节，把练习题整理成指定数量并补全解答，
//! 最后通过防抖、可重试的自动保存调度器持久化。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有唯一的持久化入口，只暴露能力
//! - `AutoSaveScheduler` - 每个课程一个，防抖 + 单飞 + 指数退避重试
//! - `LessonStore` - 持久化后端契约（内存实现 / REST 实现）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理文档快照
//! - `intent` - 请求意图与题目数量识别
//! - `merge_service` - 章节合并
//! - `normalizer` - 练习题章节规范化
//! - `augmenter` - 解答补全
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次更新请求"的完整处理流程
//! - `UpdateCtx` - 上下文封装（lesson_id + 请求序号）
//! - `UpdateFlow` - 流程编排（生成 → 合并 → 规范化 → 补全）
//! - `PendingChange` - 待确认的修改及其差异
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/lesson_session` - 单个课程的会话，接受/撤销/编辑/重试
//! - `orchestrator/app` - 命令行应用
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{ConfigError, GenerationError, SaveError, SessionError, StoreError};
pub use infrastructure::{AutoSaveOptions, AutoSaveScheduler, LessonStore, SaveState, SaveStatus};
pub use models::{Document, LessonPlan};
pub use orchestrator::{App, LessonSession};
pub use workflow::{PendingChange, UpdateCtx, UpdateFlow};
