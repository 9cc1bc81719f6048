//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 持有每个打开课程的会话，把用户操作（提交请求、接受、撤销、编辑、重试）
//! 转换为流程层和基础设施层的调用。
//!
//! ## 模块划分
//!
//! ### `lesson_session` - 课程会话
//! - 独占当前文档和至多一个待确认的修改
//! - 拥有该课程唯一的自动保存调度器
//! - 生成失败时记录行内错误，文档不变
//!
//! ### `app` - 命令行应用
//! - 选择持久化后端和生成服务
//! - 运行单次请求并输出差异
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行)
//!     ↓
//! lesson_session (单个课程)
//!     ↓
//! workflow::UpdateFlow (单次请求)        infrastructure::AutoSaveScheduler
//!     ↓                                        ↓
//! services (意图 / 合并 / 规范化 / 补全)    LessonStore
//! ```

pub mod app;
pub mod lesson_session;

// 重新导出主要类型
pub use app::{App, CliArgs};
pub use lesson_session::LessonSession;
