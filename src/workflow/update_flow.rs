//! 文档更新流程 - 流程层
//!
//! 核心职责：定义"一次更新请求"的完整处理流程
//!
//! 流程顺序：
//! 1. 意图识别（是否只改练习题章节、要求几道题）
//! 2. 生成服务改写整篇文档
//! 3. 章节合并（仅限定范围的请求）
//! 4. 练习题章节规范化
//! 5. 解答补全
//!
//! 整个流程只读原文档，产出一个待确认的修改，不做任何持久化。

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::GenerationError;
use crate::models::document::Document;
use crate::models::markup;
use crate::models::section::SectionMatcher;
use crate::services::generation::{build_update_prompt, GenerationService};
use crate::services::intent::{classify, UpdateScope};
use crate::services::normalizer::section_items;
use crate::services::{augment, merge, normalize};
use crate::utils::logging::truncate_text;
use crate::workflow::pending_change::PendingChange;
use crate::workflow::update_ctx::UpdateCtx;

/// 文档更新流程
///
/// - 编排 生成 → 合并 → 规范化 → 补全
/// - 不持有文档，只处理传入的快照
/// - 只依赖业务能力（services）
pub struct UpdateFlow {
    generator: Arc<dyn GenerationService>,
    practice: SectionMatcher,
}

impl UpdateFlow {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self {
            generator,
            practice: SectionMatcher::practice_problems(),
        }
    }

    /// 运行一次更新流程
    ///
    /// 生成服务失败时返回错误，原文档不受影响。
    pub async fn run(
        &self,
        ctx: &UpdateCtx,
        document: &Document,
    ) -> Result<PendingChange, GenerationError> {
        let intent = classify(&ctx.request);
        info!(
            "{} 📨 收到请求: {} (范围: {}, 数量: {})",
            ctx,
            truncate_text(&ctx.request, 60),
            if intent.is_section_scoped() {
                "章节"
            } else {
                "整篇"
            },
            intent
                .required_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "未指定".to_string())
        );

        // ========== 1. 生成 ==========
        let prompt = build_update_prompt(&document.to_markup(), &ctx.request);
        let output = self.generator.generate(&prompt).await.map_err(|e| {
            warn!("{} ⚠️ 生成失败: {}", ctx, e);
            e
        })?;

        let generated = markup::parse(&output);
        if generated.is_empty() {
            warn!("{} ⚠️ 生成结果中没有可用的文档结构", ctx);
            return Err(GenerationError::Malformed(truncate_text(&output, 80)));
        }
        info!("{} ✓ 生成完成，{} 个顶层节点", ctx, generated.len());

        // ========== 2. 合并 ==========
        let (merged, required_count) = match &intent.scope {
            UpdateScope::Section(matcher) => (
                merge(document, &generated, matcher),
                intent.required_count,
            ),
            UpdateScope::WholeDocument => (generated, None),
        };

        // ========== 3. 规范化 + 补全 ==========
        let normalized = normalize(&merged, &self.practice, required_count);
        let augmented = augment(&normalized, &self.practice, self.generator.as_ref()).await;

        let description = match &intent.scope {
            UpdateScope::Section(matcher) => format!(
                "Updated {} ({} problems)",
                matcher.title(),
                section_items(&augmented, &self.practice).len()
            ),
            UpdateScope::WholeDocument => {
                format!("Applied request: {}", truncate_text(ctx.request.trim(), 80))
            }
        };

        let change = PendingChange::new(document.clone(), augmented, description);
        info!(
            "{} ✓ 流程完成: {} (+{} / -{} 行)",
            ctx,
            change.description,
            change.lines_added(),
            change.lines_removed()
        );
        Ok(change)
    }
}
