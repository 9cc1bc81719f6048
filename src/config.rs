use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::infrastructure::auto_save::AutoSaveOptions;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 单次生成调用的超时（秒）
    pub llm_timeout_secs: u64,
    // --- 持久化配置 ---
    /// 为空时使用内存存储
    pub store_base_url: String,
    pub store_api_key: String,
    // --- 自动保存配置 ---
    pub save_delay_ms: u64,
    pub save_max_retries: u32,
    pub save_retry_delay_ms: u64,
    pub autosave_enabled: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-3.5-turbo".to_string(),
            llm_temperature: 0.5,
            llm_max_tokens: 1500,
            llm_timeout_secs: 60,
            store_base_url: String::new(),
            store_api_key: String::new(),
            save_delay_ms: 2000,
            save_max_retries: 3,
            save_retry_delay_ms: 1000,
            autosave_enabled: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 文件（如果存在）+ 环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(self.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(self.llm_max_tokens),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS").unwrap_or(self.llm_timeout_secs),
            store_base_url: std::env::var("STORE_BASE_URL").unwrap_or(self.store_base_url),
            store_api_key: std::env::var("STORE_API_KEY").unwrap_or(self.store_api_key),
            save_delay_ms: env_parse("SAVE_DELAY_MS").unwrap_or(self.save_delay_ms),
            save_max_retries: env_parse("SAVE_MAX_RETRIES").unwrap_or(self.save_max_retries),
            save_retry_delay_ms: env_parse("SAVE_RETRY_DELAY_MS")
                .unwrap_or(self.save_retry_delay_ms),
            autosave_enabled: env_parse("AUTOSAVE_ENABLED").unwrap_or(self.autosave_enabled),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    /// 自动保存调度器参数
    pub fn scheduler_options(&self) -> AutoSaveOptions {
        AutoSaveOptions {
            delay: Duration::from_millis(self.save_delay_ms),
            max_retries: self.save_max_retries,
            retry_delay: Duration::from_millis(self.save_retry_delay_ms),
            enabled: self.autosave_enabled,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
