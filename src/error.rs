//! 错误类型
//!
//! 只有生成服务调用和持久化调用的失败会传播到界面层，
//! 其余结构性问题（标记格式错误、缺少章节）都在本地降级处理。

use thiserror::Error;

/// 生成服务错误
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// 服务不可达
    #[error("生成服务不可达: {0}")]
    Unreachable(String),
    /// 调用超时
    #[error("生成服务调用超时 ({secs} 秒)")]
    Timeout { secs: u64 },
    /// 返回内容为空
    #[error("生成服务返回内容为空")]
    EmptyOutput,
    /// 返回内容无法使用
    #[error("生成服务返回内容无法解析: {0}")]
    Malformed(String),
    /// API 返回错误
    #[error("生成服务 API 错误 (模型: {model}): {message}")]
    Api { model: String, message: String },
}

/// 持久化后端错误
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 网络错误
    #[error("network error: {0}")]
    Network(String),
    /// 请求超时
    #[error("request timeout: {0}")]
    Timeout(String),
    /// 服务暂不可用（429 / 5xx）
    #[error("storage unavailable (HTTP {status})")]
    Unavailable { status: u16 },
    /// 后端拒绝请求
    #[error("storage rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// 序列化失败
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// 是否为可自动重试的瞬时错误（网络/超时形态）
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) | StoreError::Timeout(_) | StoreError::Unavailable { .. } => {
                true
            }
            StoreError::Rejected { .. } | StoreError::Serialization(_) => false,
            StoreError::Other(message) => {
                let message = message.to_lowercase();
                ["network", "fetch", "connection", "timeout", "offline"]
                    .iter()
                    .any(|keyword| message.contains(keyword))
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// 自动保存错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// 重试耗尽
    #[error("Save failed after {attempts} attempts. Please check your connection and try again.")]
    Failed { attempts: u32, message: String },
    /// 不可重试的失败
    #[error("{0}")]
    Permanent(String),
    /// 调度器已关闭
    #[error("自动保存调度器已关闭")]
    SchedulerClosed,
}

/// 课程会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 已有未处理的修改
    #[error("已有待确认的修改，请先接受或撤销")]
    PendingChangeOutstanding,
    /// 没有待确认的修改
    #[error("没有待确认的修改")]
    NoPendingChange,
    /// 生成失败
    #[error("could not process request: {0}")]
    Generation(#[from] GenerationError),
    /// 保存失败
    #[error(transparent)]
    Save(#[from] SaveError),
    /// 读取失败
    #[error("读取课程失败: {0}")]
    Store(#[from] StoreError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Network("reset".into()).is_transient());
        assert!(StoreError::Timeout("slow".into()).is_transient());
        assert!(StoreError::Unavailable { status: 503 }.is_transient());
        assert!(StoreError::Other("Failed to fetch".into()).is_transient());
        assert!(StoreError::Other("client is Offline".into()).is_transient());

        assert!(!StoreError::Rejected {
            status: 403,
            message: "denied".into()
        }
        .is_transient());
        assert!(!StoreError::Serialization("bad".into()).is_transient());
        assert!(!StoreError::Other("row level security".into()).is_transient());
    }

    #[test]
    fn test_failed_message_mentions_attempts() {
        let err = SaveError::Failed {
            attempts: 4,
            message: "network".into(),
        };
        assert_eq!(
            err.to_string(),
            "Save failed after 4 attempts. Please check your connection and try again."
        );
    }
}
