pub mod pipeline;
pub mod quiz_task;
pub mod rest;
pub mod state;
pub mod tutor_task;

// Re-export the handlers so the binary can build the router without
// reaching into submodules.
pub use rest::{
    chat_handler, create_course_handler, generate_lesson_handler, generate_quiz_handler,
    get_course_handler, list_courses_handler, submit_quiz_handler, ApiDoc,
};
pub use state::AppState;
