//! 待确认的修改
//!
//! 一次成功的流程运行产生一个 `PendingChange`，等待用户接受或撤销。

use similar::{ChangeTag, TextDiff};

use crate::models::document::Document;

/// 待确认的修改：修改前后的文档快照 + 描述 + 可读的差异
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub before: Document,
    pub after: Document,
    pub description: String,
    diff: String,
    added: usize,
    removed: usize,
}

impl PendingChange {
    pub fn new(before: Document, after: Document, description: impl Into<String>) -> Self {
        let old = before.to_markup();
        let new = after.to_markup();
        let text_diff = TextDiff::from_lines(&old, &new);

        let (mut added, mut removed) = (0, 0);
        for change in text_diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added += 1,
                ChangeTag::Delete => removed += 1,
                ChangeTag::Equal => {}
            }
        }
        let diff = text_diff.unified_diff().context_radius(3).to_string();

        Self {
            before,
            after,
            description: description.into(),
            diff,
            added,
            removed,
        }
    }

    /// 统一格式的行差异，没有变化时为空
    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    pub fn lines_added(&self) -> usize {
        self.added
    }

    pub fn lines_removed(&self) -> usize {
        self.removed
    }
}
