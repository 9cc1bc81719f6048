//! 题目与解答块的规范形状

use serde::{Deserialize, Serialize};

use crate::models::document::{Node, Tag};

/// 规范题目容器标记
pub const ITEM_ATTR: &str = "data-problem-item";
/// 题目序号（从 1 开始）
pub const ITEM_INDEX_ATTR: &str = "data-problem-index";
/// 规范解答块标记
pub const SOLUTION_ATTR: &str = "data-solution";
/// 规范解答块样式签名
pub const SOLUTION_STYLE: &str = "background: #f5f5f5; padding: 12px; border-radius: 8px;";
pub const SOLUTION_HEADER: &str = "Solution:";
pub const ANSWER_PREFIX: &str = "Answer:";

/// 生成服务返回的解答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    #[serde(default)]
    pub steps: Vec<String>,
    pub answer: String,
}

impl Solution {
    pub fn new(steps: Vec<String>, answer: impl Into<String>) -> Self {
        Self {
            steps,
            answer: answer.into(),
        }
    }

    /// 构建规范解答块：标题行、有序步骤、答案行
    pub fn to_node(&self) -> Node {
        let header = Node::new(Tag::Paragraph)
            .with_inline(format!("<strong>{}</strong>", SOLUTION_HEADER));
        let steps = self
            .steps
            .iter()
            .map(|step| step.trim())
            .filter(|step| !step.is_empty())
            .fold(Node::new(Tag::OrderedList), |list, step| {
                list.with_child(Node::with_text(Tag::ListItem, step))
            });
        let answer = Node::new(Tag::Paragraph).with_inline(format!(
            "<strong>{}</strong> {}",
            ANSWER_PREFIX,
            crate::models::document::escape_text(self.answer.trim())
        ));

        Node::new(Tag::Div)
            .with_attr(SOLUTION_ATTR, "true")
            .with_attr("style", SOLUTION_STYLE)
            .with_child(header)
            .with_child(steps)
            .with_child(answer)
    }
}

/// 是否为规范题目容器
pub fn is_item_container(node: &Node) -> bool {
    node.tag == Tag::Div && node.has_flag(ITEM_ATTR)
}

/// 创建规范题目容器
pub fn item_container(index: usize, problem_text: &str) -> Node {
    Node::new(Tag::Div)
        .with_attr(ITEM_ATTR, "true")
        .with_attr(ITEM_INDEX_ATTR, index.to_string())
        .with_child(Node::paragraph(problem_text))
}

/// 题目容器中的题干文本（第一个段落，没有段落时取行内文本）
pub fn problem_text(item: &Node) -> String {
    item.children
        .iter()
        .find(|child| child.tag == Tag::Paragraph)
        .map(|p| p.text())
        .unwrap_or_else(|| item.text())
}

/// 是否与规范解答块形状完全一致（样式签名 + 标题文本 + 答案行）
pub fn is_canonical_solution(node: &Node) -> bool {
    if node.tag != Tag::Div
        || !node.has_flag(SOLUTION_ATTR)
        || node.attr("style") != Some(SOLUTION_STYLE)
        || !node.inline.is_empty()
    {
        return false;
    }
    match node.children.as_slice() {
        [header, steps, answer] => {
            header.tag == Tag::Paragraph
                && header.text() == SOLUTION_HEADER
                && header.children.is_empty()
                && steps.tag == Tag::OrderedList
                && steps.children.iter().all(|s| s.tag == Tag::ListItem)
                && answer.tag == Tag::Paragraph
                && answer.text().starts_with(ANSWER_PREFIX)
                && answer.children.is_empty()
        }
        _ => false,
    }
}

/// 看起来像解答/答案的残留内容（注入的或模型自带的）
pub fn looks_like_solution(node: &Node) -> bool {
    if node.attr(SOLUTION_ATTR).is_some() {
        return true;
    }
    if node
        .attr("style")
        .is_some_and(|style| style.replace(' ', "").contains("background:#f5f5f5"))
    {
        return true;
    }
    let text = node.deep_text().to_lowercase();
    text.starts_with("solution") || text.starts_with("answer") || text.contains("solution:")
        || text.contains("answer:")
}
