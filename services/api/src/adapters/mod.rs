pub mod db;
pub mod planner_llm;
pub mod quiz_llm;
pub mod research;
pub mod roadmap_llm;
pub mod tutor_llm;
pub mod writer_llm;

pub use db::DbAdapter;
pub use planner_llm::OpenAiPlannerAdapter;
pub use quiz_llm::OpenAiQuizAdapter;
pub use research::YouResearchAdapter;
pub use roadmap_llm::OpenAiRoadmapAdapter;
pub use tutor_llm::OpenAiTutorAdapter;
pub use writer_llm::OpenAiWriterAdapter;
