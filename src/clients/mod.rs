pub mod llm_client;
pub mod rest_store;

pub use llm_client::LlmClient;
pub use rest_store::RestLessonStore;
