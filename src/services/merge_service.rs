//! 章节合并 - 业务能力层
//!
//! 只替换原文档中目标章节的正文，章节外的节点原样保留。

use tracing::{debug, warn};

use crate::models::document::{Document, Node};
use crate::models::section::SectionMatcher;
use crate::models::solution::is_item_container;

/// 把生成文档中的目标章节合并进原文档
///
/// - 生成文档没有目标章节，或章节中找不到列表/题目容器结构：原文档不变
/// - 原文档没有目标章节：在 Notes 章节前（没有则在末尾）新建标题和正文
/// - 否则只替换原章节的正文，保留原标题
pub fn merge(original: &Document, generated: &Document, matcher: &SectionMatcher) -> Document {
    let Some(generated_span) = generated.section(matcher) else {
        warn!("生成结果中没有找到 \"{}\" 章节，保留原文档", matcher.title());
        return original.clone();
    };

    let generated_body = &generated.nodes[generated_span.body.clone()];
    if !has_item_structure(generated_body) {
        warn!(
            "生成结果的 \"{}\" 章节中没有列表或题目结构，保留原文档",
            matcher.title()
        );
        return original.clone();
    }

    match original.section(matcher) {
        Some(span) => {
            debug!(
                "替换 \"{}\" 章节正文: 节点 {}..{} → {} 个节点",
                matcher.title(),
                span.body.start,
                span.body.end,
                generated_body.len()
            );
            original.splice_range(span.body, generated_body.to_vec())
        }
        None => {
            let notes = SectionMatcher::notes();
            let (anchor, level) = match original.find_heading(&notes) {
                Some(index) => (
                    index,
                    original.nodes[index]
                        .tag
                        .heading_level()
                        .unwrap_or(generated_span.level),
                ),
                None => (original.len(), generated_span.level),
            };
            debug!(
                "原文档没有 \"{}\" 章节，在位置 {} 新建",
                matcher.title(),
                anchor
            );

            let mut inserted = Vec::with_capacity(generated_body.len() + 1);
            inserted.push(Node::heading(level, matcher.title()));
            inserted.extend_from_slice(generated_body);
            original.splice_range(anchor..anchor, inserted)
        }
    }
}

/// 章节正文中是否存在列表项或规范题目容器
pub fn has_item_structure(body: &[Node]) -> bool {
    body.iter().any(|node| {
        node.contains(&|n: &Node| {
            is_item_container(n) || (n.tag.is_list() && !n.children.is_empty())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::Tag;
    use crate::models::markup;
    use proptest::prelude::*;

    const ORIGINAL: &str = "<h1>Fractions</h1>\
        <h2>Lesson Objectives</h2><ul><li>Understand fractions</li></ul>\
        <h2>Practice Problems</h2><ol><li>Old one</li></ol>\
        <h2>Notes</h2><p>Keep it visual.</p>";

    #[test]
    fn test_replaces_only_section_body() {
        let original = markup::parse(ORIGINAL);
        let generated = markup::parse(
            "<h1>Changed title</h1><h2>PRACTICE PROBLEMS (new)</h2>\
             <ol><li>New one</li><li>New two</li></ol><h2>Notes</h2><p>changed</p>",
        );

        let merged = merge(&original, &generated, &SectionMatcher::practice_problems());

        assert_eq!(merged.nodes[..4], original.nodes[..4]);
        assert_eq!(merged.nodes[4].children.len(), 2);
        assert_eq!(merged.nodes[5..], original.nodes[5..]);
        // 保留原标题
        assert_eq!(merged.nodes[3].text(), "Practice Problems");
    }

    #[test]
    fn test_inserts_before_notes_when_missing() {
        let original = markup::parse(
            "<h1>Fractions</h1><h2>Key Concepts</h2><p>x</p><h2>Notes</h2><p>n</p>",
        );
        let generated = markup::parse(
            "<h1>Fractions</h1><h3>Practice Problems</h3><ol><li>a</li></ol>",
        );

        let merged = merge(&original, &generated, &SectionMatcher::practice_problems());

        assert_eq!(merged.len(), 7);
        assert_eq!(merged.nodes[3], Node::heading(2, "Practice Problems"));
        assert_eq!(merged.nodes[4].tag, Tag::OrderedList);
        assert_eq!(merged.nodes[5].text(), "Notes");
    }

    #[test]
    fn test_appends_when_no_notes() {
        let original = markup::parse("<h1>Fractions</h1><p>intro</p>");
        let generated = markup::parse("<h2>Practice Problems</h2><ul><li>a</li></ul>");

        let merged = merge(&original, &generated, &SectionMatcher::practice_problems());

        assert_eq!(merged.nodes[..2], original.nodes[..]);
        assert_eq!(merged.nodes[2], Node::heading(2, "Practice Problems"));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_degrades_without_item_structure() {
        let original = markup::parse(ORIGINAL);
        let generated = markup::parse("<h2>Practice Problems</h2><p>Coming soon.</p>");
        assert_eq!(
            merge(&original, &generated, &SectionMatcher::practice_problems()),
            original
        );

        let empty_list = markup::parse("<h2>Practice Problems</h2><ol></ol>");
        assert_eq!(
            merge(&original, &empty_list, &SectionMatcher::practice_problems()),
            original
        );
    }

    #[test]
    fn test_degrades_without_target_section() {
        let original = markup::parse(ORIGINAL);
        let generated = markup::parse("<h1>Something else</h1><ol><li>a</li></ol>");
        assert_eq!(
            merge(&original, &generated, &SectionMatcher::practice_problems()),
            original
        );
    }

    #[test]
    fn test_accepts_canonical_item_containers() {
        let generated = markup::parse(
            r#"<h2>Practice Problems</h2><div data-problem-list="true"><div data-problem-item="true"><p>q</p></div></div>"#,
        );
        let span = generated
            .section(&SectionMatcher::practice_problems())
            .unwrap();
        assert!(has_item_structure(&generated.nodes[span.body]));
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        let titles = prop::sample::select(vec![
            "Overview",
            "Practice Problems",
            "Notes",
            "Key Concepts",
        ]);
        prop_oneof![
            (1u8..=3, titles).prop_map(|(level, title)| Node::heading(level, title)),
            "[a-z ]{1,12}".prop_map(|text| Node::paragraph(&text)),
            prop::collection::vec("[a-z]{1,8}", 1..4).prop_map(|items| {
                items.iter().fold(Node::new(Tag::OrderedList), |list, item| {
                    list.with_child(Node::with_text(Tag::ListItem, item))
                })
            }),
        ]
    }

    fn document_strategy() -> impl Strategy<Value = Document> {
        prop::collection::vec(node_strategy(), 0..12).prop_map(Document::new)
    }

    proptest! {
        #[test]
        fn prop_merge_is_local(original in document_strategy(), generated in document_strategy()) {
            let matcher = SectionMatcher::practice_problems();
            let merged = merge(&original, &generated, &matcher);

            match original.section(&matcher) {
                Some(span) => {
                    let tail = original.len() - span.body.end;
                    prop_assert_eq!(&merged.nodes[..span.body.start], &original.nodes[..span.body.start]);
                    prop_assert_eq!(&merged.nodes[merged.len() - tail..], &original.nodes[span.body.end..]);
                }
                None => {
                    // 只会插入新节点，原有节点顺序不变
                    let inserted = merged.len() - original.len();
                    let anchor = merged
                        .nodes
                        .iter()
                        .zip(original.nodes.iter())
                        .take_while(|(a, b)| a == b)
                        .count();
                    prop_assert_eq!(&merged.nodes[anchor + inserted..], &original.nodes[anchor..]);
                }
            }
        }
    }
}
