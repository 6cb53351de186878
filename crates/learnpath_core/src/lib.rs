pub mod domain;
pub mod gate;
pub mod ports;
pub mod progress;

pub use domain::{
    ChatTurn, Course, CourseStatus, LessonType, NewsHit, PipelineState, Preferences, Progress,
    ProjectScope, QuizQuestion, QuizStatus, ResearchQueries, Roadmap, SearchHit, ThreadKey, Topic,
    TurnRole, WeekGroup,
};
pub use gate::{grade_quiz, AccessDecision, CourseIndex, QuizReport, PASS_THRESHOLD};
pub use ports::{
    ConversationStore, CourseStore, LessonWriterService, PortError, PortResult,
    QuizGenerationService, ResearchPlannerService, ResearchService, RoadmapService, StoredLesson,
    TextChunkStream, TutorReply, TutorService,
};
