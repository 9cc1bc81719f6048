//! 章节规范化 - 业务能力层
//!
//! 把目标章节整理成扁平的规范题目容器序列：
//! 1. 收集候选题目（旧式列表项 + 已规范的题目容器）
//! 2. 过滤掉像学习目标的条目和占位条目
//! 3. 按要求数量截断或用模板补齐
//! 4. 重建章节正文

use std::sync::LazyLock;

use phf::phf_set;
use regex::Regex;
use tracing::{debug, info};

use crate::models::document::{Document, Node, Tag};
use crate::models::section::SectionMatcher;
use crate::models::solution::{
    is_canonical_solution, is_item_container, item_container, looks_like_solution, problem_text,
};

/// 学习目标常用的开头动词（题目一般不会这样开头）
static OBJECTIVE_VERBS: phf::Set<&'static str> = phf_set! {
    "understand",
    "learn",
    "demonstrate",
    "recognize",
    "develop",
    "master",
    "build",
    "strengthen",
    "apply",
    "describe",
    "explain",
    "identify",
    "review",
    "students",
};

static LIST_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]?\s*").expect("valid list number regex"));

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:item|problem)\s*\d+\s*:?\s*(?:\.\.\.|…|tbd|todo|placeholder)?\s*$")
        .expect("valid placeholder regex")
});

/// 题干最短长度
const MIN_PROBLEM_CHARS: usize = 8;

/// 候选题目
#[derive(Debug, Clone)]
struct Candidate {
    text: String,
    /// 已规范题目容器中原有的规范解答
    solution: Option<Node>,
}

/// 规范化目标章节
///
/// 目标章节不存在，或章节中没有任何列表/题目结构且未指定数量时，文档原样返回。
pub fn normalize(
    document: &Document,
    matcher: &SectionMatcher,
    required_count: Option<usize>,
) -> Document {
    let Some(span) = document.section(matcher) else {
        debug!("文档中没有 \"{}\" 章节，跳过规范化", matcher.title());
        return document.clone();
    };

    let mut candidates = Vec::new();
    for node in &document.nodes[span.body.clone()] {
        collect_candidates(node, &mut candidates);
    }

    if candidates.is_empty() && required_count.is_none() {
        debug!("\"{}\" 章节中没有题目结构，跳过规范化", matcher.title());
        return document.clone();
    }

    let collected = candidates.len();
    candidates.retain(|candidate| {
        let keep = !is_objective_like(&candidate.text) && !is_placeholder(&candidate.text);
        if !keep {
            debug!("过滤非题目条目: {}", candidate.text);
        }
        keep
    });

    if let Some(count) = required_count {
        if candidates.len() > count {
            debug!("截断多余题目: {} → {}", candidates.len(), count);
            candidates.truncate(count);
        }
        while candidates.len() < count {
            let index = candidates.len() + 1;
            candidates.push(Candidate {
                text: synthesize_problem(index),
                solution: None,
            });
        }
    }

    info!(
        "\"{}\" 章节规范化: 收集 {} 条，保留 {} 道题{}",
        matcher.title(),
        collected,
        candidates.len(),
        required_count
            .map(|count| format!(" (目标 {})", count))
            .unwrap_or_default()
    );

    let items = candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let item = item_container(i + 1, &candidate.text);
            match candidate.solution {
                Some(solution) => item.with_child(solution),
                None => item,
            }
        })
        .collect();

    document.splice_range(span.body, items)
}

/// 章节中的规范题目容器
pub fn section_items<'a>(document: &'a Document, matcher: &SectionMatcher) -> Vec<&'a Node> {
    document
        .section_body(matcher)
        .map(|body| body.iter().filter(|node| is_item_container(node)).collect())
        .unwrap_or_default()
}

fn collect_candidates(node: &Node, out: &mut Vec<Candidate>) {
    if is_item_container(node) {
        let text = problem_text(node);
        if !text.is_empty() {
            out.push(Candidate {
                text,
                solution: node
                    .children
                    .iter()
                    .find(|child| is_canonical_solution(child))
                    .cloned(),
            });
        }
        return;
    }

    if looks_like_solution(node) {
        return;
    }

    match node.tag {
        Tag::OrderedList | Tag::UnorderedList => {
            for item in node.children.iter().filter(|c| c.tag == Tag::ListItem) {
                if looks_like_solution(item) {
                    continue;
                }
                let text = list_item_text(item);
                if !text.is_empty() {
                    out.push(Candidate {
                        text,
                        solution: None,
                    });
                }
            }
        }
        Tag::Div | Tag::Section | Tag::Blockquote => {
            for child in &node.children {
                collect_candidates(child, out);
            }
        }
        _ => {}
    }
}

/// 列表项的题干：自身行内文本，为空时取子块（如 `<li><p>…</p></li>`）的文本，去掉开头序号
fn list_item_text(item: &Node) -> String {
    let own = item.text();
    let text = if own.is_empty() {
        item.children
            .iter()
            .filter(|child| !looks_like_solution(child))
            .map(Node::deep_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        own
    };
    LIST_NUMBER_RE.replace(&text, "").trim().to_string()
}

/// 像学习目标：以固定动词开头且不是问句
pub fn is_objective_like(text: &str) -> bool {
    let text = text.trim();
    if text.ends_with('?') {
        return false;
    }
    text.split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .is_some_and(|word| OBJECTIVE_VERBS.contains(word.as_str()))
}

/// 占位条目：太短，或 "Item N:" 一类的空壳
pub fn is_placeholder(text: &str) -> bool {
    let text = text.trim();
    text.chars().count() < MIN_PROBLEM_CHARS || PLACEHOLDER_RE.is_match(text)
}

/// 按序号生成补位题目（模板按序号轮换，数字随序号变化）
pub fn synthesize_problem(index: usize) -> String {
    let n = index.max(1);
    match (n - 1) % 4 {
        0 => format!("What is {} × {}? Show your work.", n + 2, n + 3),
        1 => format!("Solve for x: x + {} = {}.", n, n * 3 + 4),
        2 => {
            let groups = n + 1;
            format!(
                "A class of {} students is split evenly into {} groups. How many students are in each group?",
                groups * (n + 2),
                groups
            )
        }
        _ => format!("Write {}/{} in simplest form.", 2 * (n + 1), 2 * (n + 3)),
    }
}
