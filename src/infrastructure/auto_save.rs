//! 自动保存调度器 - 基础设施层
//!
//! 整个文档唯一的持久化入口。普通编辑和 AI 修改都经过这里。
//!
//! ## 状态机
//!
//! ```text
//! Idle → Scheduled → Saving → Saved
//!                       ↓
//!                   Failing(n) → Saving   （瞬时错误，n ≤ max_retries）
//!                       ↓
//!                     Error               （等待手动 retry）
//! ```
//!
//! ## 保证
//! - 防抖：连续 `trigger_save` 不断推迟截止时间，只保存最后一次的内容
//! - 单飞：同一文档任何时刻最多一个保存请求在执行
//! - 保存开始时取最新的待保存内容；重试始终使用失败时的同一份内容

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{SaveError, StoreError};
use crate::infrastructure::store::LessonStore;
use crate::utils::logging::truncate_text;

/// 单次重试等待上限
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(300);

/// 调度参数
#[derive(Debug, Clone)]
pub struct AutoSaveOptions {
    /// 防抖延迟
    pub delay: Duration,
    /// 瞬时错误的最大自动重试次数
    pub max_retries: u32,
    /// 重试基础延迟，第 n 次重试等待 `retry_delay * 2^n`（最长 5 分钟）
    pub retry_delay: Duration,
    /// 关闭后 `trigger_save` 被忽略，`force_save` 仍然生效
    pub enabled: bool,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            enabled: true,
        }
    }
}

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Scheduled,
    Saving,
    Saved,
    /// 第 n 次失败后等待重试
    Failing(u32),
    Error,
}

/// 暴露给编辑界面的只读状态
#[derive(Debug, Clone, PartialEq)]
pub struct SaveStatus {
    pub state: SaveState,
    pub is_saving: bool,
    pub is_retrying: bool,
    pub retry_count: u32,
    pub last_saved: Option<DateTime<Local>>,
    pub has_error: bool,
    pub error: Option<String>,
    /// 是否有尚未落盘的内容
    pub has_pending: bool,
}

impl Default for SaveStatus {
    fn default() -> Self {
        Self {
            state: SaveState::Idle,
            is_saving: false,
            is_retrying: false,
            retry_count: 0,
            last_saved: None,
            has_error: false,
            error: None,
            has_pending: false,
        }
    }
}

type Waiter = oneshot::Sender<Result<(), SaveError>>;

enum Command {
    Trigger(String),
    Force(String, Waiter),
    Retry(Waiter),
    Flush(Waiter),
}

/// 自动保存调度器
///
/// 每个打开的课程一个实例。后台任务持有计时器和状态，
/// 句柄只通过 `trigger_save / force_save / retry` 修改状态。
/// 句柄被丢弃时，后台任务会先尝试保存剩余的待保存内容再退出。
pub struct AutoSaveScheduler {
    lesson_id: String,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
}

impl AutoSaveScheduler {
    /// 启动调度器（需要在 tokio 运行时中调用）
    pub fn spawn(
        lesson_id: impl Into<String>,
        store: Arc<dyn LessonStore>,
        options: AutoSaveOptions,
    ) -> Self {
        let lesson_id = lesson_id.into();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::default());

        let worker = SaveWorker::new(lesson_id.clone(), store, options, status_tx);
        tokio::spawn(worker.run(receiver));

        Self {
            lesson_id,
            commands,
            status,
        }
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    /// 记录待保存内容并（重新）开始防抖计时
    pub fn trigger_save(&self, content: impl Into<String>) {
        if self.commands.send(Command::Trigger(content.into())).is_err() {
            warn!("[课程 {}] 自动保存调度器已关闭，忽略保存请求", self.lesson_id);
        }
    }

    /// 跳过防抖立即保存，失败时同样走重试流程
    pub async fn force_save(&self, content: impl Into<String>) -> Result<(), SaveError> {
        self.request(|tx| Command::Force(content.into(), tx)).await
    }

    /// 用上次失败的内容手动重试；没有失败内容或正在保存时直接返回
    pub async fn retry(&self) -> Result<(), SaveError> {
        self.request(Command::Retry).await
    }

    /// 立即保存尚未落盘的内容（如果有）
    pub async fn flush(&self) -> Result<(), SaveError> {
        self.request(Command::Flush).await
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    async fn request(&self, command: impl FnOnce(Waiter) -> Command) -> Result<(), SaveError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| SaveError::SchedulerClosed)?;
        rx.await.map_err(|_| SaveError::SchedulerClosed)?
    }
}

// ---------------------------------------------------------------------------
// 后台任务
// ---------------------------------------------------------------------------

/// 调度器内部记录
#[derive(Debug, Default)]
struct SaveRecord {
    pending_content: Option<String>,
    is_saving: bool,
    is_retrying: bool,
    retry_count: u32,
    last_saved: Option<DateTime<Local>>,
    last_error: Option<String>,
    last_failed_content: Option<String>,
}

struct SaveWorker {
    lesson_id: String,
    store: Arc<dyn LessonStore>,
    options: AutoSaveOptions,
    record: SaveRecord,
    state: SaveState,
    /// 防抖截止时间
    deadline: Option<Instant>,
    /// 空闲后立即开始保存
    force: bool,
    /// 正在执行的保存请求
    attempt: Option<BoxFuture<'static, Result<(), StoreError>>>,
    /// 当前保存序列的内容（包括重试）
    sequence_content: Option<String>,
    /// 重试等待截止时间
    backoff: Option<Instant>,
    /// 等待当前保存序列结果的调用方
    current_waiters: Vec<Waiter>,
    /// 等待下一个保存序列结果的调用方
    next_waiters: Vec<Waiter>,
    closing: bool,
    flushed_on_close: bool,
    status: watch::Sender<SaveStatus>,
}

impl SaveWorker {
    fn new(
        lesson_id: String,
        store: Arc<dyn LessonStore>,
        options: AutoSaveOptions,
        status: watch::Sender<SaveStatus>,
    ) -> Self {
        Self {
            lesson_id,
            store,
            options,
            record: SaveRecord::default(),
            state: SaveState::Idle,
            deadline: None,
            force: false,
            attempt: None,
            sequence_content: None,
            backoff: None,
            current_waiters: Vec::new(),
            next_waiters: Vec::new(),
            closing: false,
            flushed_on_close: false,
            status,
        }
    }

    fn busy(&self) -> bool {
        self.attempt.is_some() || self.backoff.is_some()
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            if self.closing && !self.busy() {
                if self.record.pending_content.is_some() && !self.flushed_on_close {
                    self.flushed_on_close = true;
                    self.force = true;
                } else {
                    break;
                }
            }

            if self.force && !self.busy() {
                self.force = false;
                self.deadline = None;
                match self.record.pending_content.clone() {
                    Some(content) => self.start_sequence(content),
                    None => resolve(&mut self.next_waiters, Ok(())),
                }
                self.publish();
            }

            let deadline = self.deadline.filter(|_| !self.busy());
            let backoff = self.backoff;
            let has_attempt = self.attempt.is_some();
            let accepting = !self.closing;

            tokio::select! {
                command = commands.recv(), if accepting => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("[课程 {}] 调度器句柄已释放", self.lesson_id);
                        self.closing = true;
                        self.deadline = None;
                    }
                },
                _ = sleep_until_opt(deadline), if deadline.is_some() => {
                    self.deadline = None;
                    if let Some(content) = self.record.pending_content.clone() {
                        self.start_sequence(content);
                    }
                },
                _ = sleep_until_opt(backoff), if backoff.is_some() => {
                    self.backoff = None;
                    if let Some(content) = self.sequence_content.clone() {
                        self.launch_attempt(content);
                    }
                },
                result = poll_attempt(&mut self.attempt), if has_attempt => {
                    self.attempt = None;
                    self.on_attempt_finished(result);
                },
            }

            self.publish();
        }

        resolve(&mut self.current_waiters, Err(SaveError::SchedulerClosed));
        resolve(&mut self.next_waiters, Err(SaveError::SchedulerClosed));
        debug!("[课程 {}] 自动保存调度器退出", self.lesson_id);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Trigger(content) => {
                if !self.options.enabled {
                    debug!("[课程 {}] 自动保存已关闭，忽略", self.lesson_id);
                    return;
                }
                self.record.pending_content = Some(content);
                self.deadline = Some(Instant::now() + self.options.delay);
                if !self.busy() && self.state != SaveState::Error {
                    self.state = SaveState::Scheduled;
                }
                debug!(
                    "[课程 {}] 自动保存将在 {}ms 后执行",
                    self.lesson_id,
                    self.options.delay.as_millis()
                );
            }
            Command::Force(content, waiter) => {
                self.record.pending_content = Some(content);
                self.deadline = None;
                self.force = true;
                self.next_waiters.push(waiter);
            }
            Command::Flush(waiter) => {
                if self.record.pending_content.is_some() {
                    self.deadline = None;
                    self.force = true;
                    self.next_waiters.push(waiter);
                } else {
                    let _ = waiter.send(Ok(()));
                }
            }
            Command::Retry(waiter) => {
                // 保存序列进行中：等待它的结果
                if self.busy() {
                    self.current_waiters.push(waiter);
                    return;
                }
                let Some(content) = self.record.last_failed_content.clone() else {
                    let _ = waiter.send(Ok(()));
                    return;
                };
                info!("[课程 {}] 🔁 手动重试保存", self.lesson_id);
                self.record.is_retrying = true;
                self.record.last_error = None;
                self.current_waiters.push(waiter);
                self.start_sequence(content);
            }
        }
    }

    /// 开始一个保存序列（首次尝试 + 可能的自动重试）
    fn start_sequence(&mut self, content: String) {
        self.current_waiters.append(&mut self.next_waiters);
        self.record.retry_count = 0;
        self.record.is_saving = true;
        self.launch_attempt(content);
    }

    fn launch_attempt(&mut self, content: String) {
        self.state = SaveState::Saving;
        debug!(
            "[课程 {}] 💾 开始保存 (第 {} 次尝试, {} 字符)",
            self.lesson_id,
            self.record.retry_count.saturating_add(1),
            content.len()
        );

        let store = Arc::clone(&self.store);
        let lesson_id = self.lesson_id.clone();
        let payload = content.clone();
        self.attempt = Some(Box::pin(async move { store.save(&lesson_id, &payload).await }));
        self.sequence_content = Some(content);
    }

    fn on_attempt_finished(&mut self, result: Result<(), StoreError>) {
        let Some(content) = self.sequence_content.take() else {
            return;
        };

        match result {
            Ok(()) => {
                self.record.retry_count = 0;
                self.record.last_failed_content = None;
                self.record.last_error = None;
                self.record.last_saved = Some(Local::now());
                // 保存期间又有新编辑时保留新内容
                if self.record.pending_content.as_deref() == Some(content.as_str()) {
                    self.record.pending_content = None;
                }
                self.record.is_saving = false;
                self.record.is_retrying = false;
                self.state = if self.deadline.is_some() {
                    SaveState::Scheduled
                } else {
                    SaveState::Saved
                };
                info!("[课程 {}] ✓ 自动保存成功", self.lesson_id);
                resolve(&mut self.current_waiters, Ok(()));
            }
            Err(e) if e.is_transient() && self.record.retry_count < self.options.max_retries => {
                let wait = backoff_delay(self.options.retry_delay, self.record.retry_count);
                self.record.retry_count += 1;
                self.record.is_retrying = true;
                self.record.last_failed_content = Some(content.clone());
                self.state = SaveState::Failing(self.record.retry_count);
                self.sequence_content = Some(content);
                self.backoff = Some(Instant::now() + wait);
                warn!(
                    "[课程 {}] ⚠️ 保存失败 (第 {}/{} 次尝试)，{}ms 后重试: {}",
                    self.lesson_id,
                    self.record.retry_count,
                    self.options.max_retries.saturating_add(1),
                    wait.as_millis(),
                    e
                );
            }
            Err(e) => {
                let failure = if e.is_transient() {
                    SaveError::Failed {
                        attempts: self.record.retry_count.saturating_add(1),
                        message: e.to_string(),
                    }
                } else {
                    SaveError::Permanent(e.to_string())
                };
                error!(
                    "[课程 {}] ❌ 保存彻底失败: {} (内容: {})",
                    self.lesson_id,
                    e,
                    truncate_text(&content, 40)
                );
                self.record.last_failed_content = Some(content);
                self.record.last_error = Some(failure.to_string());
                self.record.is_saving = false;
                self.record.is_retrying = false;
                self.state = SaveState::Error;
                resolve(&mut self.current_waiters, Err(failure));
            }
        }
    }

    fn publish(&self) {
        self.status.send_replace(SaveStatus {
            state: self.state,
            is_saving: self.record.is_saving,
            is_retrying: self.record.is_retrying,
            retry_count: self.record.retry_count,
            last_saved: self.record.last_saved,
            has_error: self.record.last_error.is_some(),
            error: self.record.last_error.clone(),
            has_pending: self.record.pending_content.is_some(),
        });
    }
}

/// 第 n 次重试前的等待：`retry_delay * 2^n`，溢出或过长时取上限
fn backoff_delay(retry_delay: Duration, retry_count: u32) -> Duration {
    2u32.checked_pow(retry_count)
        .and_then(|factor| retry_delay.checked_mul(factor))
        .map_or(MAX_RETRY_BACKOFF, |wait| wait.min(MAX_RETRY_BACKOFF))
}

fn resolve(waiters: &mut Vec<Waiter>, result: Result<(), SaveError>) {
    for waiter in waiters.drain(..) {
        let _ = waiter.send(result.clone());
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn poll_attempt(
    attempt: &mut Option<BoxFuture<'static, Result<(), StoreError>>>,
) -> Result<(), StoreError> {
    match attempt {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}
