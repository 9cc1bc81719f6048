use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use lesson_copilot::error::{GenerationError, SaveError, SessionError, StoreError};
use lesson_copilot::infrastructure::{
    AutoSaveOptions, InMemoryLessonStore, LessonStore, SaveState,
};
use lesson_copilot::models::markup;
use lesson_copilot::models::solution::{is_canonical_solution, is_item_container, problem_text};
use lesson_copilot::models::{Document, LessonPlan, SectionMatcher, Solution, StoredLesson};
use lesson_copilot::services::normalizer::{section_items, synthesize_problem};
use lesson_copilot::services::GenerationService;
use lesson_copilot::{LessonSession, UpdateCtx, UpdateFlow};

/// 生成服务替身：返回固定文档，为每道题生成解答（`unsolvable` 中的除外）
struct FakeGenerator {
    document: String,
    unsolvable: HashSet<String>,
    solution_calls: AtomicUsize,
}

impl FakeGenerator {
    fn new(document: &str) -> Self {
        Self {
            document: document.to_string(),
            unsolvable: HashSet::new(),
            solution_calls: AtomicUsize::new(0),
        }
    }

    fn unsolvable(mut self, problem: &str) -> Self {
        self.unsolvable.insert(problem.to_string());
        self
    }
}

#[async_trait]
impl GenerationService for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        assert!(prompt.contains("User request:"));
        Ok(self.document.clone())
    }

    async fn generate_solutions(
        &self,
        problems: &[String],
    ) -> Result<Vec<Option<Solution>>, GenerationError> {
        self.solution_calls.fetch_add(1, Ordering::SeqCst);
        Ok(problems
            .iter()
            .map(|problem| {
                (!self.unsolvable.contains(problem)).then(|| {
                    Solution::new(vec![format!("Work through: {}", problem)], "42")
                })
            })
            .collect())
    }
}

/// 前 `failures` 次保存返回网络错误的存储
struct FlakyStore {
    inner: InMemoryLessonStore,
    failures: Mutex<usize>,
    attempts: AtomicUsize,
}

impl FlakyStore {
    fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryLessonStore::new(),
            failures: Mutex::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    fn recover(&self) {
        *self.failures.lock().unwrap() = 0;
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LessonStore for FlakyStore {
    async fn save(&self, lesson_id: &str, content: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Network("fetch failed: connection reset".into()));
            }
        }
        self.inner.save(lesson_id, content).await
    }

    async fn load(&self, lesson_id: &str) -> Result<Option<StoredLesson>, StoreError> {
        self.inner.load(lesson_id).await
    }
}

const LESSON_WITH_PRACTICE: &str = "<h1>Adding Fractions</h1>\
<h2>Lesson Objectives</h2><ul><li>Understand common denominators</li></ul>\
<h2>Practice Problems</h2><ol><li>What is 1/4 + 2/4?</li><li>What is 1/3 + 1/6?</li><li>What is 2/5 + 1/10?</li></ol>\
<h2>Notes</h2><p>Use fraction strips.</p>";

const LESSON_WITHOUT_PRACTICE: &str = "<h1>Adding Fractions</h1>\
<h2>Key Concepts</h2><ul><li>Equivalent fractions</li></ul>\
<h2>Notes</h2><p>Use fraction strips.</p>";

fn practice() -> SectionMatcher {
    SectionMatcher::practice_problems()
}

fn item_texts(document: &Document) -> Vec<String> {
    section_items(document, &practice())
        .into_iter()
        .map(problem_text)
        .collect()
}

fn plan() -> LessonPlan {
    LessonPlan {
        id: "lp-1".into(),
        title: "Adding Fractions".into(),
        student: "Sam".into(),
        date: "2026-10-19".into(),
        ..Default::default()
    }
}

async fn open_session(
    content: &str,
    generator: FakeGenerator,
    store: Arc<dyn LessonStore>,
) -> LessonSession {
    store.save("lp-1", content).await.unwrap();
    LessonSession::open(&plan(), store, Arc::new(generator), AutoSaveOptions::default())
        .await
        .unwrap()
}

/// 场景 A：已有 3 道题，请求 5 道，补 2 道，其余章节不变
#[tokio::test]
async fn test_scenario_a_pads_existing_section() {
    // 生成结果改了标题和备注，练习题只给了原来的 3 道
    let generated = "<h1>Adding Fractions (revised)</h1>\
<h2>Lesson Objectives</h2><ul><li>Something new</li></ul>\
<h2>Practice Problems</h2><ol><li>What is 1/4 + 2/4?</li><li>What is 1/3 + 1/6?</li><li>What is 2/5 + 1/10?</li></ol>\
<h2>Notes</h2><p>Changed notes.</p>";
    let store = Arc::new(InMemoryLessonStore::new());
    let mut session =
        open_session(LESSON_WITH_PRACTICE, FakeGenerator::new(generated), store.clone()).await;
    let before = session.document().clone();

    let change = session
        .submit_update_request("Please add 5 practice problems")
        .await
        .unwrap();
    let after = change.after.clone();

    let texts = item_texts(&after);
    assert_eq!(texts.len(), 5);
    assert_eq!(
        &texts[..3],
        &[
            "What is 1/4 + 2/4?".to_string(),
            "What is 1/3 + 1/6?".to_string(),
            "What is 2/5 + 1/10?".to_string()
        ]
    );
    assert_eq!(texts[3], synthesize_problem(4));
    assert_eq!(texts[4], synthesize_problem(5));

    // 章节外逐字节一致
    let span_before = before.section(&practice()).unwrap();
    let span_after = after.section(&practice()).unwrap();
    assert_eq!(after.nodes[..span_after.body.start], before.nodes[..span_before.body.start]);
    assert_eq!(after.nodes[span_after.body.end..], before.nodes[span_before.body.end..]);

    // 每道题都有规范解答
    for item in section_items(&after, &practice()) {
        assert!(item.children.last().is_some_and(is_canonical_solution));
    }

    assert_ok!(session.accept().await);
    let stored = store.load("lp-1").await.unwrap().unwrap();
    assert_eq!(stored.content, after.to_markup());
    assert_eq!(stored.version, 2);
}

/// 场景 B：没有练习题章节，请求 8 道，插在 Notes 前
#[tokio::test]
async fn test_scenario_b_inserts_section_before_notes() {
    let problems: String = (1..=10)
        .map(|i| format!("<li>What is {}/12 + 1/12?</li>", i))
        .collect();
    let generated = format!(
        "<h1>Adding Fractions</h1><h2>Practice Problems</h2><ol>{}</ol><h2>Notes</h2><p>x</p>",
        problems
    );
    let store = Arc::new(InMemoryLessonStore::new());
    let mut session = open_session(
        LESSON_WITHOUT_PRACTICE,
        FakeGenerator::new(&generated),
        store,
    )
    .await;
    let before = session.document().clone();

    let change = session
        .submit_update_request("8 practice problems about fractions")
        .await
        .unwrap();
    let after = &change.after;

    let span = after.section(&practice()).unwrap();
    assert_eq!(span.heading, 3);
    assert_eq!(after.nodes[span.body.end].text(), "Notes");
    assert_eq!(item_texts(after).len(), 8);
    assert_eq!(item_texts(after)[7], "What is 8/12 + 1/12?");

    assert_eq!(after.nodes[..3], before.nodes[..3]);
    assert_eq!(after.nodes[span.body.end..], before.nodes[3..]);
}

/// 场景 B（无 Notes）：新章节追加在末尾
#[tokio::test]
async fn test_scenario_b_appends_without_notes() {
    let generated = "<h2>Practice Problems</h2><ul><li>What is 1/2 of 10?</li></ul>";
    let store = Arc::new(InMemoryLessonStore::new());
    let mut session = open_session(
        "<h1>Adding Fractions</h1><p>intro</p>",
        FakeGenerator::new(generated),
        store,
    )
    .await;

    let change = session
        .submit_update_request("add 3 practice problems")
        .await
        .unwrap();
    assert_eq!(change.after.nodes[2].text(), "Practice Problems");
    assert_eq!(item_texts(&change.after).len(), 3);
}

/// 场景 C：批量解答部分为空，不报错
#[tokio::test]
async fn test_scenario_c_partial_solutions() {
    let generated = "<h2>Practice Problems</h2><ol><li>What is 7 × 8?</li><li>What is 9 × 6?</li></ol>";
    let generator = Arc::new(FakeGenerator::new(generated).unsolvable("What is 7 × 8?"));
    let flow = UpdateFlow::new(generator.clone());
    let document = markup::parse("<h1>Times tables</h1>");

    let change = flow
        .run(&UpdateCtx::new("lp-1", 1, "2 practice problems"), &document)
        .await
        .unwrap();

    let items = section_items(&change.after, &practice());
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].children.len(), 1);
    assert_eq!(items[1].children.len(), 2);
    assert!(is_canonical_solution(&items[1].children[1]));
    assert_eq!(generator.solution_calls.load(Ordering::SeqCst), 1);
    // 原文档不被修改
    assert_eq!(document, markup::parse("<h1>Times tables</h1>"));
}

/// 场景 D：保存失败两次后成功
#[tokio::test(start_paused = true)]
async fn test_scenario_d_recovers_after_transient_failures() {
    let store = Arc::new(FlakyStore::failing(2));
    let mut session = LessonSession::with_document(
        "lp-1",
        markup::parse(LESSON_WITH_PRACTICE),
        store.clone(),
        Arc::new(FakeGenerator::new("")),
        AutoSaveOptions::default(),
    );

    assert_ok!(session.apply_markup_edit("<h1>Edited</h1>"));
    tokio::time::sleep(Duration::from_secs(30)).await;

    let status = session.save_status();
    assert_eq!(status.state, SaveState::Saved);
    assert_eq!(status.retry_count, 0);
    assert!(!status.has_error);
    assert!(status.error.is_none());
    assert!(status.last_saved.is_some());
    assert_eq!(store.attempts(), 3);
    assert_eq!(
        store.load("lp-1").await.unwrap().unwrap().content,
        "<h1>Edited</h1>"
    );
}

/// 重试耗尽后接受失败，文档保留在内存中，手动重试成功
#[tokio::test(start_paused = true)]
async fn test_accept_survives_exhausted_retries() {
    let generated = "<h1>New title</h1>";
    let store = Arc::new(FlakyStore::failing(usize::MAX));
    let mut session = LessonSession::with_document(
        "lp-1",
        markup::parse("<h1>Old title</h1>"),
        store.clone(),
        Arc::new(FakeGenerator::new(generated)),
        AutoSaveOptions::default(),
    );

    session.submit_update_request("rename the lesson").await.unwrap();
    let err = assert_err!(session.accept().await);
    assert!(matches!(
        err,
        SessionError::Save(SaveError::Failed { attempts: 4, .. })
    ));
    assert_eq!(store.attempts(), 4);
    assert_eq!(session.document().to_markup(), generated);
    assert_eq!(session.save_status().state, SaveState::Error);

    store.recover();
    assert_ok!(session.retry().await);
    assert_eq!(session.save_status().state, SaveState::Saved);
    assert_eq!(
        store.load("lp-1").await.unwrap().unwrap().content,
        generated
    );
}

/// 普通编辑和接受修改走同一个调度器，最新内容胜出
#[tokio::test(start_paused = true)]
async fn test_edits_coalesce_through_single_scheduler() {
    let store = Arc::new(FlakyStore::failing(0));
    let mut session = LessonSession::with_document(
        "lp-1",
        markup::parse("<h1>v0</h1>"),
        store.clone(),
        Arc::new(FakeGenerator::new("")),
        AutoSaveOptions::default(),
    );

    for i in 1..=5 {
        assert_ok!(session.apply_markup_edit(&format!("<h1>v{}</h1>", i)));
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(store.attempts(), 1);
    assert_eq!(store.load("lp-1").await.unwrap().unwrap().content, "<h1>v5</h1>");
}

/// 不限定章节的请求：整篇采用生成结果
#[tokio::test]
async fn test_unscoped_request_uses_generated_document() {
    let generated = "<h1>Adding Fractions</h1><h2>Notes</h2><p>Shorter.</p>";
    let flow = UpdateFlow::new(Arc::new(FakeGenerator::new(generated)));
    let change = flow
        .run(
            &UpdateCtx::new("lp-1", 1, "make the notes shorter"),
            &markup::parse(LESSON_WITH_PRACTICE),
        )
        .await
        .unwrap();

    assert_eq!(change.after, markup::parse(generated));
    assert!(change.diff().contains("+<p>Shorter.</p>"));
}

/// 生成结果没有列表结构时保留原文档
#[tokio::test]
async fn test_scoped_request_without_structure_keeps_original() {
    let generated = "<h2>Practice Problems</h2><p>I could not think of any.</p>";
    let flow = UpdateFlow::new(Arc::new(FakeGenerator::new(generated)));
    let original = markup::parse(LESSON_WITH_PRACTICE);

    let change = flow
        .run(&UpdateCtx::new("lp-1", 1, "harder practice problems"), &original)
        .await
        .unwrap();

    // 原有题目被规范化并补全解答，其余章节不变
    let items = section_items(&change.after, &practice());
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| is_item_container(item)));
    assert_eq!(item_texts(&change.after)[0], "What is 1/4 + 2/4?");
    assert_eq!(change.after.nodes[..4], original.nodes[..4]);
}
