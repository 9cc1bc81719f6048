//! 课程会话 - 编排层
//!
//! 每个打开的课程一个会话，独占：
//! - 当前文档
//! - 至多一个待确认的修改
//! - 一个自动保存调度器（唯一的持久化入口）
//!
//! 普通编辑和 AI 修改都经过同一个调度器。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::infrastructure::auto_save::{AutoSaveOptions, AutoSaveScheduler, SaveStatus};
use crate::infrastructure::store::LessonStore;
use crate::models::document::Document;
use crate::models::lesson::LessonPlan;
use crate::models::markup;
use crate::services::generation::GenerationService;
use crate::workflow::{PendingChange, UpdateCtx, UpdateFlow};

/// 课程会话
pub struct LessonSession {
    lesson_id: String,
    document: Document,
    pending: Option<PendingChange>,
    flow: UpdateFlow,
    scheduler: AutoSaveScheduler,
    inline_error: Option<String>,
    requests: usize,
}

impl LessonSession {
    /// 打开课程：存储中有内容则加载，否则按课程计划模板生成
    pub async fn open(
        plan: &LessonPlan,
        store: Arc<dyn LessonStore>,
        generator: Arc<dyn GenerationService>,
        options: AutoSaveOptions,
    ) -> Result<Self, SessionError> {
        let document = match store.load(&plan.id).await? {
            Some(stored) => {
                info!(
                    "[课程 {}] 📂 从存储加载 (版本 {}, {} 字符)",
                    plan.id,
                    stored.version,
                    stored.content.len()
                );
                markup::parse(&stored.content)
            }
            None => {
                info!("[课程 {}] 📄 存储中没有内容，使用模板生成", plan.id);
                plan.to_document()
            }
        };

        Ok(Self::with_document(
            plan.id.clone(),
            document,
            store,
            generator,
            options,
        ))
    }

    /// 用已有文档创建会话
    pub fn with_document(
        lesson_id: impl Into<String>,
        document: Document,
        store: Arc<dyn LessonStore>,
        generator: Arc<dyn GenerationService>,
        options: AutoSaveOptions,
    ) -> Self {
        let lesson_id = lesson_id.into();
        Self {
            scheduler: AutoSaveScheduler::spawn(lesson_id.clone(), store, options),
            flow: UpdateFlow::new(generator),
            lesson_id,
            document,
            pending: None,
            inline_error: None,
            requests: 0,
        }
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    /// 当前（已接受的）文档
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn pending_change(&self) -> Option<&PendingChange> {
        self.pending.as_ref()
    }

    /// 上一次请求失败时的行内错误提示
    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    /// 提交更新请求，成功时产生一个待确认的修改
    ///
    /// 已有待确认的修改时拒绝；生成失败时文档不变，记录行内错误。
    pub async fn submit_update_request(
        &mut self,
        text: &str,
    ) -> Result<&PendingChange, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::PendingChangeOutstanding);
        }

        self.requests += 1;
        let ctx = UpdateCtx::new(self.lesson_id.clone(), self.requests, text);

        match self.flow.run(&ctx, &self.document).await {
            Ok(change) => {
                self.inline_error = None;
                Ok(self.pending.insert(change))
            }
            Err(e) => {
                let error = SessionError::Generation(e);
                warn!("{} ❌ {}", ctx, error);
                self.inline_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// 接受待确认的修改并立即保存
    ///
    /// 保存失败时文档仍然是接受后的内容，可以通过 `retry` 重试。
    pub async fn accept(&mut self) -> Result<(), SessionError> {
        let change = self.pending.take().ok_or(SessionError::NoPendingChange)?;
        info!("[课程 {}] ✅ 接受修改: {}", self.lesson_id, change.description);

        self.document = change.after;
        self.scheduler
            .force_save(self.document.to_markup())
            .await
            .map_err(SessionError::from)
    }

    /// 撤销待确认的修改，文档保持修改前的内容
    pub fn undo(&mut self) -> Result<PendingChange, SessionError> {
        let change = self.pending.take().ok_or(SessionError::NoPendingChange)?;
        info!("[课程 {}] ↩️ 撤销修改: {}", self.lesson_id, change.description);
        Ok(change)
    }

    /// 普通编辑：替换文档并触发防抖保存
    pub fn apply_edit(&mut self, document: Document) -> Result<(), SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::PendingChangeOutstanding);
        }
        self.document = document;
        self.scheduler.trigger_save(self.document.to_markup());
        Ok(())
    }

    /// 以标记文本形式的普通编辑
    pub fn apply_markup_edit(&mut self, content: &str) -> Result<(), SessionError> {
        self.apply_edit(markup::parse(content))
    }

    /// 手动重试上一次失败的保存
    pub async fn retry(&self) -> Result<(), SessionError> {
        self.scheduler.retry().await.map_err(SessionError::from)
    }

    /// 立即保存尚未落盘的编辑
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.scheduler.flush().await.map_err(SessionError::from)
    }

    pub fn save_status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    pub fn subscribe_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.scheduler.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::infrastructure::store::InMemoryLessonStore;
    use crate::models::solution::Solution;
    use async_trait::async_trait;

    struct EchoGenerator {
        output: Result<String, GenerationError>,
    }

    #[async_trait]
    impl GenerationService for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.output.clone()
        }

        async fn generate_solutions(
            &self,
            problems: &[String],
        ) -> Result<Vec<Option<Solution>>, GenerationError> {
            Ok(vec![None; problems.len()])
        }
    }

    fn plan() -> LessonPlan {
        LessonPlan {
            id: "lp-1".into(),
            title: "Fractions".into(),
            student: "Sam".into(),
            date: "2026-10-19".into(),
            notes: "Visual learner".into(),
            ..Default::default()
        }
    }

    async fn session(
        output: Result<String, GenerationError>,
        store: Arc<InMemoryLessonStore>,
    ) -> LessonSession {
        LessonSession::open(
            &plan(),
            store,
            Arc::new(EchoGenerator { output }),
            AutoSaveOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_uses_stored_content() {
        let store = Arc::new(InMemoryLessonStore::new().with_lesson("lp-1", "<h1>Stored</h1>"));
        let session = session(Ok(String::new()), store).await;
        assert_eq!(session.document().to_markup(), "<h1>Stored</h1>");
    }

    #[tokio::test]
    async fn test_open_falls_back_to_template() {
        let session = session(Ok(String::new()), Arc::new(InMemoryLessonStore::new())).await;
        assert_eq!(session.document(), &plan().to_document());
    }

    #[tokio::test]
    async fn test_generation_failure_sets_inline_error() {
        let store = Arc::new(InMemoryLessonStore::new());
        let mut session = session(Err(GenerationError::Timeout { secs: 60 }), store).await;
        let before = session.document().clone();

        let err = session.submit_update_request("shorter notes").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert!(session
            .inline_error()
            .unwrap()
            .starts_with("could not process request"));
        assert_eq!(session.document(), &before);
        assert!(session.pending_change().is_none());
    }

    #[tokio::test]
    async fn test_accept_force_saves_and_undo_reverts() {
        let store = Arc::new(InMemoryLessonStore::new());
        let mut session = session(
            Ok("<h1>Fractions</h1><h2>Notes</h2><p>Short.</p>".into()),
            store.clone(),
        )
        .await;
        let before = session.document().clone();

        session.submit_update_request("shorter notes").await.unwrap();
        assert!(matches!(
            session.submit_update_request("again").await,
            Err(SessionError::PendingChangeOutstanding)
        ));

        let discarded = session.undo().unwrap();
        assert!(!discarded.is_noop());
        assert_eq!(session.document(), &before);
        assert!(store.load("lp-1").await.unwrap().is_none());

        session.submit_update_request("shorter notes").await.unwrap();
        session.accept().await.unwrap();
        let stored = store.load("lp-1").await.unwrap().unwrap();
        assert_eq!(stored.content, "<h1>Fractions</h1>\n<h2>Notes</h2>\n<p>Short.</p>");
        assert!(matches!(session.accept().await, Err(SessionError::NoPendingChange)));
    }

    #[tokio::test]
    async fn test_edit_rejected_while_change_pending() {
        let store = Arc::new(InMemoryLessonStore::new());
        let mut session = session(Ok("<h1>New</h1>".into()), store).await;
        session.submit_update_request("rename").await.unwrap();
        assert!(matches!(
            session.apply_markup_edit("<h1>typed</h1>"),
            Err(SessionError::PendingChangeOutstanding)
        ));
    }
}
