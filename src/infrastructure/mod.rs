//! 基础设施层
//!
//! 持有唯一的持久化入口（自动保存调度器），只暴露能力。

pub mod auto_save;
pub mod store;

pub use auto_save::{AutoSaveOptions, AutoSaveScheduler, SaveState, SaveStatus};
pub use store::{InMemoryLessonStore, LessonStore};
