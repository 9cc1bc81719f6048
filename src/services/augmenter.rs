//! 解答补全 - 业务能力层
//!
//! 为目标章节的每道题附加一个规范解答块，可重复执行：
//! 已有规范解答的题目跳过，不规范的解答残留先被清理。

use tracing::{debug, info, warn};

use crate::models::document::{Document, Node, Tag};
use crate::models::section::SectionMatcher;
use crate::models::solution::{
    is_canonical_solution, is_item_container, looks_like_solution, problem_text,
};
use crate::services::generation::GenerationService;

/// 为章节中缺少解答的题目批量生成解答
///
/// 批量请求失败不会让整个流程失败：缺少解答的题目保持原样，下次运行时再补。
pub async fn augment(
    document: &Document,
    matcher: &SectionMatcher,
    generator: &dyn GenerationService,
) -> Document {
    let Some(span) = document.section(matcher) else {
        return document.clone();
    };

    let mut body: Vec<Node> = document.nodes[span.body.clone()]
        .iter()
        .map(|node| {
            if is_item_container(node) {
                strip_solution_artifacts(node)
            } else {
                node.clone()
            }
        })
        .collect();

    let pending: Vec<(usize, String)> = body
        .iter()
        .enumerate()
        .filter(|(_, node)| is_item_container(node) && !has_canonical_solution(node))
        .map(|(index, node)| (index, problem_text(node)))
        .collect();

    if pending.is_empty() {
        debug!("所有题目都已有规范解答，跳过解答生成");
        return document.splice_range(span.body, body);
    }

    let problems: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
    info!("🧮 为 {} 道题生成解答", problems.len());

    match generator.generate_solutions(&problems).await {
        Ok(solutions) => {
            let mut attached = 0;
            for ((index, _), solution) in pending.iter().zip(solutions) {
                if let Some(solution) = solution {
                    body[*index].children.push(solution.to_node());
                    attached += 1;
                }
            }
            info!("✓ 已附加 {}/{} 个解答", attached, problems.len());
        }
        Err(e) => {
            warn!("解答生成失败，题目暂不附加解答: {}", e);
        }
    }

    document.splice_range(span.body, body)
}

fn has_canonical_solution(item: &Node) -> bool {
    item.children.iter().any(is_canonical_solution)
}

/// 去掉题目容器中不规范的解答/答案残留，规范解答只保留第一个
fn strip_solution_artifacts(item: &Node) -> Node {
    let problem = item
        .children
        .iter()
        .position(|child| child.tag == Tag::Paragraph);

    let mut seen_canonical = false;
    let children = item
        .children
        .iter()
        .enumerate()
        .filter(|(index, child)| {
            if Some(*index) == problem {
                return true;
            }
            if is_canonical_solution(child) {
                let keep = !seen_canonical;
                seen_canonical = true;
                return keep;
            }
            !looks_like_solution(child)
        })
        .map(|(_, child)| child.clone())
        .collect();

    Node {
        children,
        ..item.clone()
    }
}
