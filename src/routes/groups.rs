use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::models::{
    AnswersResponse, ErrorResponse, HealthResponse, NextQuestionsRequest, QuestionSet,
    QuestionsResponse, RecommendRequest, RecommendationsResponse, SubmitAnswersRequest, TimeOfDay,
};
use crate::pipeline::Engine;
use crate::services::{PostgresStore, QuestionCacheKey, TtlCache};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub question_cache: Arc<TtlCache<QuestionCacheKey, QuestionSet>>,
    /// Present when running against PostgreSQL
    pub postgres: Option<Arc<PostgresStore>>,
}

/// Configure all group-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/groups/{group_id}/questions", web::post().to(next_questions))
        .route("/groups/{group_id}/answers", web::post().to(submit_answers))
        .route(
            "/groups/{group_id}/recommendations",
            web::post().to(create_recommendations),
        )
        .route(
            "/groups/{group_id}/recommendations",
            web::get().to(list_recommendations),
        );
}

fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = match &state.postgres {
        Some(pg) => pg.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_question_sets: state.question_cache.entry_count(),
        timestamp: chrono::Utc::now(),
    })
}

/// Next questions endpoint
///
/// POST /api/v1/groups/{group_id}/questions
///
/// Request body:
/// ```json
/// {
///   "sessionId": "string",
///   "timeOfDay": "morning|afternoon|evening|night",
///   "city": "string"
/// }
/// ```
async fn next_questions(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<NextQuestionsRequest>,
) -> Result<HttpResponse, EngineError> {
    if let Err(errors) = req.validate() {
        return Ok(validation_error(errors));
    }

    let group_id = path.into_inner();
    let time_of_day = req.time_of_day.as_deref().and_then(|label| {
        let parsed = TimeOfDay::parse(label);
        if parsed.is_none() {
            tracing::debug!("Unknown time of day '{}', using the clock", label);
        }
        parsed
    });

    let set = state
        .engine
        .next_questions(&group_id, &req.session_id, time_of_day, req.city.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(QuestionsResponse {
        questions: set.questions,
        follow_up: set.follow_up,
        source: set.source,
    }))
}

/// Submit answers endpoint
///
/// POST /api/v1/groups/{group_id}/answers
///
/// Request body:
/// ```json
/// {
///   "sessionId": "string",
///   "answers": { "energy_level": 4, "atmosphere": "outdoor" },
///   "activityLevel": 3
/// }
/// ```
async fn submit_answers(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<SubmitAnswersRequest>,
) -> Result<HttpResponse, EngineError> {
    if let Err(errors) = req.validate() {
        return Ok(validation_error(errors));
    }

    let group_id = path.into_inner();
    let answered = state
        .engine
        .submit_answers(&group_id, &req.session_id, &req.answers, req.activity_level)
        .await?;

    tracing::debug!(
        "Stored {} answers for {}/{}",
        req.answers.len(),
        group_id,
        req.session_id
    );

    Ok(HttpResponse::Ok().json(AnswersResponse {
        success: true,
        answered_signals: answered.iter().map(|k| k.as_str().to_string()).collect(),
    }))
}

/// Generate recommendations endpoint
///
/// POST /api/v1/groups/{group_id}/recommendations
///
/// The body is optional:
/// ```json
/// { "city": "string" }
/// ```
async fn create_recommendations(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: Option<web::Json<RecommendRequest>>,
) -> Result<HttpResponse, EngineError> {
    let group_id = path.into_inner();
    let city = req.and_then(|r| r.into_inner().city);

    let run = state.engine.recommend(&group_id, city.as_deref()).await?;

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        candidate_count: run.candidate_count,
        recommendations: run.recommendations,
    }))
}

/// Stored recommendations of a group, oldest first
///
/// GET /api/v1/groups/{group_id}/recommendations
async fn list_recommendations(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let group_id = path.into_inner();
    let recommendations = state.engine.history(&group_id).await?;

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        candidate_count: recommendations.len(),
        recommendations,
    }))
}
