//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Handlers translate between the
//! wire DTOs and the core domain; in particular, quiz questions are sent to
//! clients without answers or explanations.

use crate::web::state::AppState;
use crate::web::{pipeline, quiz_task, tutor_task};
use crate::web::pipeline::GenerationOutcome;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use learnpath_core::domain::{Course, Preferences, Progress};
use learnpath_core::gate::QuizReport;
use learnpath_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_course_handler,
        list_courses_handler,
        get_course_handler,
        generate_lesson_handler,
        generate_quiz_handler,
        submit_quiz_handler,
        chat_handler,
    ),
    components(
        schemas(
            CreateCourseRequest,
            CourseResponse,
            WeekView,
            TopicView,
            GenerateLessonResponse,
            QuizView,
            QuizQuestionView,
            SubmitQuizRequest,
            SubmitQuizResponse,
            QuestionResultView,
            ChatRequest,
        )
    ),
    tags(
        (name = "LearnPath API", description = "API endpoints for AI-generated learning paths.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub topic: String,
    #[schema(value_type = Object)]
    pub preferences: Preferences,
}

/// A course as clients see it. Topic quiz questions are deliberately
/// absent; they are only served through the quiz endpoints.
#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub topic: String,
    pub status: String,
    #[schema(value_type = Object)]
    pub preferences: Preferences,
    #[schema(value_type = Object)]
    pub progress: Progress,
    pub total_weeks: u32,
    pub syllabus: Vec<WeekView>,
}

#[derive(Serialize, ToSchema)]
pub struct WeekView {
    pub week_number: u32,
    pub title: String,
    pub topics: Vec<TopicView>,
}

#[derive(Serialize, ToSchema)]
pub struct TopicView {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub lesson_type: String,
    pub estimated_minutes: u32,
    pub markdown_content: Option<String>,
    pub is_completed: bool,
    pub quiz_status: String,
    pub quiz_score: u8,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateLessonResponse {
    pub content: Option<String>,
    pub cached: bool,
    pub locked: bool,
    pub message: Option<String>,
}

/// The client-facing quiz: questions and options only.
#[derive(Serialize, ToSchema)]
pub struct QuizView {
    pub topic_id: String,
    pub questions: Vec<QuizQuestionView>,
}

#[derive(Serialize, ToSchema)]
pub struct QuizQuestionView {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    pub answers: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitQuizResponse {
    pub passed: bool,
    pub score: u8,
    pub results: Vec<QuestionResultView>,
}

/// Per-question grading detail. Correct answers and explanations are only
/// revealed here, after a submission.
#[derive(Serialize, ToSchema)]
pub struct QuestionResultView {
    pub question_index: usize,
    pub is_correct: bool,
    pub user_selected: Option<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

fn course_response(course: Course) -> CourseResponse {
    let syllabus = course
        .roadmap
        .syllabus
        .into_iter()
        .map(|week| WeekView {
            week_number: week.week_number,
            title: week.title,
            topics: week
                .topics
                .into_iter()
                .map(|t| TopicView {
                    id: t.id,
                    title: t.title,
                    lesson_type: label(&t.lesson_type),
                    estimated_minutes: t.estimated_minutes,
                    markdown_content: t.markdown_content,
                    is_completed: t.is_completed,
                    quiz_status: label(&t.quiz_status),
                    quiz_score: t.quiz_score,
                })
                .collect(),
        })
        .collect();

    CourseResponse {
        id: course.id,
        topic: course.topic,
        status: label(&course.status),
        preferences: course.preferences,
        progress: course.progress,
        total_weeks: course.roadmap.total_weeks,
        syllabus,
    }
}

/// Renders a lowercase-serialized domain enum as its wire string.
fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn submit_response(report: QuizReport) -> SubmitQuizResponse {
    SubmitQuizResponse {
        passed: report.passed,
        score: report.score,
        results: report
            .results
            .into_iter()
            .map(|r| QuestionResultView {
                question_index: r.question_index,
                is_correct: r.is_correct,
                user_selected: r.user_selected,
                correct_answer: r.correct_answer,
                explanation: r.explanation,
            })
            .collect(),
    }
}

//=========================================================================================
// Error Mapping and Identity
//=========================================================================================

fn extract_user_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::QuizNotReady(msg) => (StatusCode::CONFLICT, msg),
        PortError::MalformedPlan(msg) => {
            error!("lesson planning failed: {}", msg);
            (
                StatusCode::BAD_GATEWAY,
                "Lesson planning failed; please retry.".to_string(),
            )
        }
        PortError::Unexpected(msg) => {
            error!("request failed: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new course: generates a week-by-week roadmap for the topic.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created with a generated roadmap", body = CourseResponse),
        (status = 400, description = "Bad request (e.g., missing header)"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn create_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;

    let roadmap = app_state
        .roadmap
        .generate_roadmap(&payload.topic, &payload.preferences)
        .await
        .map_err(port_error_response)?;

    let course = app_state
        .courses
        .create_course(user_id, &payload.topic, payload.preferences, roadmap)
        .await
        .map_err(port_error_response)?;

    Ok((StatusCode::CREATED, Json(course_response(course))))
}

/// List the caller's courses.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "All courses owned by the caller", body = [CourseResponse]),
        (status = 400, description = "Bad request")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_courses_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let courses = app_state
        .courses
        .list_courses(user_id)
        .await
        .map_err(port_error_response)?;
    let views: Vec<CourseResponse> = courses.into_iter().map(course_response).collect();
    Ok(Json(views))
}

/// Fetch one course by id.
#[utoipa::path(
    get,
    path = "/courses/{course_id}",
    responses(
        (status = 200, description = "The course", body = CourseResponse),
        (status = 404, description = "Course not found")
    ),
    params(
        ("course_id" = Uuid, Path, description = "The course to fetch."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let course = app_state
        .courses
        .get_course(user_id, course_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(course_response(course)))
}

/// Generate (or return cached) lesson content for a topic.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/topics/{topic_id}/generate",
    responses(
        (status = 200, description = "Lesson content, a cached copy, or a locked notice", body = GenerateLessonResponse),
        (status = 404, description = "Course or topic not found"),
        (status = 502, description = "Upstream generation failure")
    ),
    params(
        ("course_id" = Uuid, Path, description = "The course."),
        ("topic_id" = String, Path, description = "The topic within the course."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((course_id, topic_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let outcome = pipeline::generate_lesson(app_state, user_id, course_id, &topic_id)
        .await
        .map_err(port_error_response)?;

    let response = match outcome {
        GenerationOutcome::Generated { content } => GenerateLessonResponse {
            content: Some(content),
            cached: false,
            locked: false,
            message: None,
        },
        GenerationOutcome::Cached { content } => GenerateLessonResponse {
            content: Some(content),
            cached: true,
            locked: false,
            message: None,
        },
        GenerationOutcome::Locked { blocking_title } => GenerateLessonResponse {
            content: None,
            cached: false,
            locked: true,
            message: Some(format!(
                "Complete \"{}\" before starting this topic.",
                blocking_title
            )),
        },
    };
    Ok(Json(response))
}

/// Fetch or create the topic's quiz. Questions are returned without the
/// correct answers or explanations.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/topics/{topic_id}/quiz/generate",
    responses(
        (status = 200, description = "The quiz for this topic", body = QuizView),
        (status = 404, description = "Course or topic not found"),
        (status = 409, description = "Lesson content not generated yet")
    ),
    params(
        ("course_id" = Uuid, Path, description = "The course."),
        ("topic_id" = String, Path, description = "The topic within the course."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((course_id, topic_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let outcome = quiz_task::ensure_quiz(app_state, user_id, course_id, &topic_id)
        .await
        .map_err(port_error_response)?;

    let questions = outcome
        .questions
        .into_iter()
        .map(|q| QuizQuestionView {
            question: q.question,
            options: q.options,
        })
        .collect();
    Ok(Json(QuizView {
        topic_id,
        questions,
    }))
}

/// Grade a quiz submission and update course progress.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/topics/{topic_id}/quiz/submit",
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "The graded result", body = SubmitQuizResponse),
        (status = 404, description = "Course or topic not found"),
        (status = 409, description = "No quiz generated for this topic yet")
    ),
    params(
        ("course_id" = Uuid, Path, description = "The course."),
        ("topic_id" = String, Path, description = "The topic within the course."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn submit_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((course_id, topic_id)): Path<(Uuid, String)>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let report = quiz_task::submit_quiz(app_state, user_id, course_id, &topic_id, &payload.answers)
        .await
        .map_err(port_error_response)?;
    Ok(Json(submit_response(report)))
}

/// Send one message to the topic's tutor and stream the reply.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/topics/{topic_id}/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The tutor's reply as a plain-text chunk stream"),
        (status = 404, description = "Course or topic not found")
    ),
    params(
        ("course_id" = Uuid, Path, description = "The course."),
        ("topic_id" = String, Path, description = "The topic within the course."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((course_id, topic_id)): Path<(Uuid, String)>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    let user_id = extract_user_id(&headers)?;
    let stream = tutor_task::tutor_chat(app_state, user_id, course_id, &topic_id, &payload.message)
        .await
        .map_err(port_error_response)?;

    let body = Body::from_stream(stream.map(|chunk| chunk.map(Bytes::from)));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to build streaming response: {}", e),
            )
        })
}
