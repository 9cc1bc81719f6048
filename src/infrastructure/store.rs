//! 持久化后端 - 基础设施层
//!
//! 只暴露 save / load 能力，不认识文档结构。

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::models::lesson::StoredLesson;

/// 持久化后端
///
/// - `save` 失败时必须返回错误（不能静默成功），供调度器做重试分类
/// - 同一内容重复保存是安全的
#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn save(&self, lesson_id: &str, content: &str) -> Result<(), StoreError>;

    async fn load(&self, lesson_id: &str) -> Result<Option<StoredLesson>, StoreError>;
}

/// 内存存储，用于开发和测试
#[derive(Default)]
pub struct InMemoryLessonStore {
    lessons: RwLock<HashMap<String, StoredLesson>>,
}

impl InMemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条课程内容
    pub fn with_lesson(self, lesson_id: &str, content: &str) -> Self {
        if let Ok(mut lessons) = self.lessons.write() {
            lessons.insert(
                lesson_id.to_string(),
                StoredLesson {
                    content: content.to_string(),
                    version: 1,
                    last_modified: Some(Utc::now()),
                },
            );
        }
        self
    }
}

#[async_trait]
impl LessonStore for InMemoryLessonStore {
    async fn save(&self, lesson_id: &str, content: &str) -> Result<(), StoreError> {
        let mut lessons = self
            .lessons
            .write()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let entry = lessons
            .entry(lesson_id.to_string())
            .or_insert_with(|| StoredLesson {
                content: String::new(),
                version: 0,
                last_modified: None,
            });
        entry.content = content.to_string();
        entry.version += 1;
        entry.last_modified = Some(Utc::now());
        Ok(())
    }

    async fn load(&self, lesson_id: &str) -> Result<Option<StoredLesson>, StoreError> {
        let lessons = self
            .lessons
            .read()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(lessons.get(lesson_id).cloned())
    }
}
