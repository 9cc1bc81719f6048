pub mod augmenter;
pub mod generation;
pub mod intent;
pub mod merge_service;
pub mod normalizer;

pub use augmenter::augment;
pub use generation::GenerationService;
pub use intent::{classify, UpdateIntent, UpdateScope};
pub use merge_service::merge;
pub use normalizer::normalize;
