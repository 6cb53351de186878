//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::DbAdapter, planner_llm::OpenAiPlannerAdapter, quiz_llm::OpenAiQuizAdapter,
        research::YouResearchAdapter, roadmap_llm::OpenAiRoadmapAdapter,
        tutor_llm::OpenAiTutorAdapter, writer_llm::OpenAiWriterAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        chat_handler, create_course_handler, generate_lesson_handler, generate_quiz_handler,
        get_course_handler, list_courses_handler, rest::ApiDoc, state::AppState,
        submit_quiz_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let you_api_key = config
        .you_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("YOU_API_KEY is required".to_string()))?;

    let planner = Arc::new(OpenAiPlannerAdapter::new(
        openai_client.clone(),
        config.planner_model.clone(),
    ));
    let research = Arc::new(YouResearchAdapter::new(you_api_key.clone())?);
    let writer = Arc::new(OpenAiWriterAdapter::new(
        openai_client.clone(),
        config.writer_model.clone(),
    ));
    let quiz = Arc::new(OpenAiQuizAdapter::new(
        openai_client.clone(),
        config.quiz_model.clone(),
    ));
    let tutor = Arc::new(OpenAiTutorAdapter::new(
        openai_client.clone(),
        config.tutor_model.clone(),
    ));
    let roadmap = Arc::new(OpenAiRoadmapAdapter::new(
        openai_client.clone(),
        config.roadmap_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        courses: db_adapter.clone(),
        conversations: db_adapter,
        planner,
        research,
        writer,
        quiz,
        tutor,
        roadmap,
        topic_locks: Arc::new(Mutex::new(HashMap::new())),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/courses", post(create_course_handler).get(list_courses_handler))
        .route("/courses/{course_id}", get(get_course_handler))
        .route(
            "/courses/{course_id}/topics/{topic_id}/generate",
            post(generate_lesson_handler),
        )
        .route(
            "/courses/{course_id}/topics/{topic_id}/quiz/generate",
            post(generate_quiz_handler),
        )
        .route(
            "/courses/{course_id}/topics/{topic_id}/quiz/submit",
            post(submit_quiz_handler),
        )
        .route(
            "/courses/{course_id}/topics/{topic_id}/chat",
            post(chat_handler),
        )
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
