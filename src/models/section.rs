//! 章节查询
//!
//! 章节 = 一个匹配的标题节点，到下一个同级或更高级标题（或文档末尾）之间的兄弟节点。
//! 章节没有持久 ID，完全由位置和结构确定。

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::models::document::{Document, Node};

/// 标题文本匹配器（不区分大小写）
#[derive(Debug, Clone)]
pub struct SectionMatcher {
    pattern: Regex,
    /// 新建章节时使用的标题文本
    title: String,
}

impl SectionMatcher {
    pub fn new(pattern: &str, title: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            title: title.into(),
        })
    }

    /// 练习题章节
    pub fn practice_problems() -> Self {
        Self::builtin(r"practice\s*problems", "Practice Problems")
    }

    /// 备注章节（新章节的插入锚点）
    pub fn notes() -> Self {
        Self::builtin(r"\bnotes\b", "Notes")
    }

    fn builtin(pattern: &str, title: &str) -> Self {
        match Self::new(pattern, title) {
            Ok(matcher) => matcher,
            Err(e) => unreachable!("内置章节正则无效: {}", e),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn matches(&self, node: &Node) -> bool {
        node.is_heading() && self.matches_text(&node.text())
    }
}

/// 章节在文档顶层节点中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    /// 标题节点下标
    pub heading: usize,
    /// 标题级别
    pub level: u8,
    /// 正文范围（不含标题）
    pub body: Range<usize>,
}

impl Document {
    /// 查找第一个满足条件的顶层标题
    pub fn find_heading(&self, matcher: &SectionMatcher) -> Option<usize> {
        self.nodes.iter().position(|node| matcher.matches(node))
    }

    /// 第一个匹配章节的位置
    pub fn section(&self, matcher: &SectionMatcher) -> Option<SectionSpan> {
        let heading = self.find_heading(matcher)?;
        let level = self.nodes[heading].tag.heading_level()?;
        let end = self.nodes[heading + 1..]
            .iter()
            .position(|node| node.tag.heading_level().is_some_and(|l| l <= level))
            .map(|offset| heading + 1 + offset)
            .unwrap_or(self.nodes.len());
        Some(SectionSpan {
            heading,
            level,
            body: heading + 1..end,
        })
    }

    /// 章节正文节点
    pub fn section_body(&self, matcher: &SectionMatcher) -> Option<&[Node]> {
        self.section(matcher).map(|span| &self.nodes[span.body])
    }

    /// 用新的节点替换范围，范围外的节点保持不变
    pub fn splice_range(&self, range: Range<usize>, replacement: Vec<Node>) -> Document {
        let mut nodes = Vec::with_capacity(self.nodes.len() - range.len() + replacement.len());
        nodes.extend_from_slice(&self.nodes[..range.start]);
        nodes.extend(replacement);
        nodes.extend_from_slice(&self.nodes[range.end..]);
        Document::new(nodes)
    }
}
