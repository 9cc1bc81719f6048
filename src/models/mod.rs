pub mod document;
pub mod lesson;
pub mod loaders;
pub mod markup;
pub mod section;
pub mod solution;

pub use document::{Document, Node, Tag};
pub use lesson::{LessonPlan, StoredLesson};
pub use section::{SectionMatcher, SectionSpan};
pub use solution::Solution;
pub use loaders::load_lesson_plan;
