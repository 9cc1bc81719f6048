use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::document::{Document, Node, Tag};

/// 持久化的课程内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLesson {
    pub content: String,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// 课程计划元数据，存储中没有内容时据此生成默认文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonPlan {
    pub id: String,
    pub title: String,
    pub student: String,
    pub date: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub time_breakdown: String,
    #[serde(default)]
    pub lesson_steps: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl LessonPlan {
    /// 按模板生成课程文档
    pub fn to_document(&self) -> Document {
        let subtitle = Node::new(Tag::Paragraph).with_inline(format!(
            "<em>Lesson plan prepared {} for {}</em>",
            crate::models::document::escape_text(&self.date),
            crate::models::document::escape_text(&self.student)
        ));

        Document::new(vec![
            Node::heading(1, &self.title),
            subtitle,
            Node::heading(2, "Lesson Objectives"),
            list(Tag::UnorderedList, &self.objectives),
            Node::heading(2, "Key Concepts"),
            list(Tag::UnorderedList, &self.key_concepts),
            Node::heading(2, "Time Breakdown"),
            Node::paragraph(&self.time_breakdown),
            Node::heading(2, "Lesson Steps"),
            list(Tag::OrderedList, &self.lesson_steps),
            Node::heading(2, "Notes"),
            Node::paragraph(&self.notes),
        ])
    }
}

fn list(tag: Tag, items: &[String]) -> Node {
    items.iter().fold(Node::new(tag), |list, item| {
        list.with_child(Node::with_text(Tag::ListItem, item))
    })
}
