//! 生成服务契约 - 业务能力层
//!
//! 流程层只依赖这个 trait，具体实现见 `clients::llm_client`。

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::models::solution::Solution;

/// 内容生成服务
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// 根据提示词返回完整的结构化标记
    ///
    /// 返回内容为空或不可用时必须返回错误，不能返回空字符串。
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// 批量生成解答，结果与输入按位置一一对应
    ///
    /// 某一项为 `None` 表示该题无法生成，不是整批的错误。
    async fn generate_solutions(
        &self,
        problems: &[String],
    ) -> Result<Vec<Option<Solution>>, GenerationError>;
}

/// 文档改写的系统提示词
pub const LESSON_EDITOR_SYSTEM_PROMPT: &str = "You are an expert instructional designer and lesson plan editor. \
Apply the user request to the lesson plan. \
Return only the FULL UPDATED LESSON PLAN as clean HTML using headings, paragraphs, lists and divs. \
Keep every section the request does not mention unchanged. \
Do not include code fences, backticks, markdown, or commentary.";

/// 批量解答的系统提示词
pub const SOLUTION_SYSTEM_PROMPT: &str = "You are a patient math tutor. \
For each problem in the JSON array, write a short step-by-step solution and the final answer. \
Respond with only a JSON array of the same length and order, where each entry is \
{\"steps\": [\"...\"], \"answer\": \"...\"} or null when you cannot solve that problem.";

/// 构建文档改写请求：完整文档 + 用户请求
pub fn build_update_prompt(document_markup: &str, request: &str) -> String {
    format!(
        "Current lesson plan (HTML):\n\n{}\n\nUser request: {}\n\nPlease return only the full updated lesson plan in HTML.",
        document_markup,
        request.trim()
    )
}

/// 去掉模型偶尔附带的 Markdown 代码块包裹
pub fn strip_code_fences(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标记行，例如 ```html
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<h1>A</h1>\n```"), "<h1>A</h1>");
        assert_eq!(strip_code_fences("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("  <p>x</p> "), "<p>x</p>");
    }

    #[test]
    fn test_update_prompt_contains_document_and_request() {
        let prompt = build_update_prompt("<h1>T</h1>", "  add 5 practice problems ");
        assert!(prompt.contains("<h1>T</h1>"));
        assert!(prompt.contains("User request: add 5 practice problems\n"));
    }
}
