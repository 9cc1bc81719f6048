//! REST 持久化客户端
//!
//! 对接 PostgREST 风格的 `lesson_plans` 表：
//! - 读取: `GET {base}/rest/v1/lesson_plans?id=eq.{id}&select=content,version,last_modified`
//! - 保存: 先读取当前版本，再 `POST {base}/rest/v1/lesson_plans?on_conflict=id` 按主键 upsert，
//!   body 为 `{id, content, version, last_modified}`，版本号加一；课程不存在时插入版本 1

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::infrastructure::store::LessonStore;
use crate::models::lesson::StoredLesson;

const TABLE_PATH: &str = "rest/v1/lesson_plans";

/// REST 持久化客户端
pub struct RestLessonStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl RestLessonStore {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            http_client,
            base_url: config.store_base_url.trim_end_matches('/').to_string(),
            api_key: config.store_api_key.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, TABLE_PATH)
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http_client
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// 按课程 id 过滤的请求，id 经过 URL 编码
    fn lesson_request(&self, method: Method, lesson_id: &str) -> RequestBuilder {
        self.request(method)
            .query(&[("id", format!("eq.{}", lesson_id))])
    }
}

/// upsert 请求体：在已有版本上加一，新课程从版本 1 开始
fn upsert_body(lesson_id: &str, content: &str, previous_version: Option<u64>) -> Value {
    json!({
        "id": lesson_id,
        "content": content,
        "version": previous_version.map_or(1, |version| version.saturating_add(1)),
        "last_modified": Utc::now(),
    })
}

#[async_trait]
impl LessonStore for RestLessonStore {
    async fn save(&self, lesson_id: &str, content: &str) -> Result<(), StoreError> {
        let previous = self.load(lesson_id).await?;
        let body = upsert_body(lesson_id, content, previous.map(|lesson| lesson.version));

        let response = self
            .request(Method::POST)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let rows: Vec<Value> = serde_json::from_str(&text)?;
        if rows.is_empty() {
            return Err(StoreError::Other(format!(
                "upsert of lesson {} returned no rows",
                lesson_id
            )));
        }

        debug!(
            "课程 {} 已保存到远端 (版本 {}, {} 字符)",
            lesson_id,
            body["version"],
            content.len()
        );
        Ok(())
    }

    async fn load(&self, lesson_id: &str) -> Result<Option<StoredLesson>, StoreError> {
        let response = self
            .lesson_request(Method::GET, lesson_id)
            .query(&[("select", "content,version,last_modified")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let mut rows: Vec<StoredLesson> = serde_json::from_str(&text)?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }
}

/// 传输层错误（连接失败、超时）
fn transport_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() {
        StoreError::Network(error.to_string())
    } else if error.is_decode() || error.is_body() {
        StoreError::Serialization(error.to_string())
    } else {
        StoreError::Other(error.to_string())
    }
}

/// HTTP 状态码错误：429 和 5xx 视为暂时不可用，其余为拒绝
fn status_error(status: StatusCode, body: &str) -> StoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StoreError::Unavailable {
            status: status.as_u16(),
        }
    } else {
        StoreError::Rejected {
            status: status.as_u16(),
            message: body.trim().to_string(),
        }
    }
}
