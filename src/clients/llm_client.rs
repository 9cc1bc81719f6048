//! LLM 客户端 - 生成服务实现
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::models::solution::Solution;
use crate::services::generation::{
    strip_code_fences, GenerationService, LESSON_EDITOR_SYSTEM_PROMPT, SOLUTION_SYSTEM_PROMPT,
};

/// LLM 客户端
///
/// 职责：
/// - 调用 LLM API 改写课程文档
/// - 批量生成题目解答
/// - 不关心文档结构，只处理字符串
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// 其他所有生成功能都基于此函数。整个调用受超时限制，
    /// 返回内容为空时报错。
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, GenerationError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| self.classify(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.classify(e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| self.classify(e))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!("LLM API 调用超时 ({} 秒)", self.timeout.as_secs());
                GenerationError::Timeout {
                    secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                self.classify(e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        let content = strip_code_fences(&content);
        if content.is_empty() {
            warn!("LLM 返回内容为空");
            return Err(GenerationError::EmptyOutput);
        }
        Ok(content.to_string())
    }

    fn classify(&self, error: OpenAIError) -> GenerationError {
        match error {
            OpenAIError::Reqwest(e) => GenerationError::Unreachable(e.to_string()),
            OpenAIError::ApiError(api) => GenerationError::Api {
                model: self.model_name.clone(),
                message: api.message,
            },
            other => GenerationError::Malformed(other.to_string()),
        }
    }
}

#[async_trait]
impl GenerationService for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.send_to_llm(prompt, Some(LESSON_EDITOR_SYSTEM_PROMPT))
            .await
    }

    async fn generate_solutions(
        &self,
        problems: &[String],
    ) -> Result<Vec<Option<Solution>>, GenerationError> {
        if problems.is_empty() {
            return Ok(Vec::new());
        }

        debug!("批量生成解答，题目数量: {}", problems.len());
        let user_message = serde_json::to_string_pretty(problems)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let response = self
            .send_to_llm(&user_message, Some(SOLUTION_SYSTEM_PROMPT))
            .await?;

        parse_solutions(&response, problems.len())
    }
}

/// 解析批量解答响应
///
/// 整体不是 JSON 数组时报错；单个元素无法解析时记为 `None`。
/// 长度不一致时按位置对齐，多余的丢弃，缺少的补 `None`。
pub fn parse_solutions(
    response: &str,
    expected: usize,
) -> Result<Vec<Option<Solution>>, GenerationError> {
    let body = strip_code_fences(response);
    let json = match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(GenerationError::Malformed(
                "解答响应中没有 JSON 数组".to_string(),
            ))
        }
    };

    let entries: Vec<Value> =
        serde_json::from_str(json).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if entries.len() != expected {
        warn!(
            "解答数量不一致: 期望 {}, 实际 {}，按位置对齐",
            expected,
            entries.len()
        );
    }

    let mut solutions: Vec<Option<Solution>> = entries
        .into_iter()
        .take(expected)
        .map(|entry| {
            serde_json::from_value::<Solution>(entry)
                .ok()
                .filter(|solution| !solution.answer.trim().is_empty())
        })
        .collect();
    solutions.resize(expected, None);

    Ok(solutions)
}
