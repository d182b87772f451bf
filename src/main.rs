use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use outing_engine::config::{LoggingSettings, Settings};
use outing_engine::pipeline::{Engine, QuestionSelector, RecommendationGenerator};
use outing_engine::routes::{self, AppState};
use outing_engine::services::{
    CacheService, LlmClient, MemoryStore, OpenAiClient, PostgresStore, Stores, TtlCache,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(settings: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };

    init_logging(&settings.logging);

    info!("Starting outing engine...");

    // LLM client; without a key every call fails fast and the fallbacks answer
    let llm: Arc<dyn LlmClient> = Arc::new(
        OpenAiClient::from_settings(&settings.llm)
            .map_err(|e| startup_error("Failed to build LLM client", e))?,
    );
    if settings.llm.api_key.trim().is_empty() {
        warn!("No LLM API key configured, questions and recommendations will use fallbacks");
    } else {
        info!(
            "LLM client initialized (model: {}, timeout: {}s)",
            settings.llm.model, settings.llm.timeout_secs
        );
    }

    // Question cache and its sweep task
    let cache_service = CacheService::new(
        TtlCache::new(settings.cache.max_entries, settings.cache.ttl()),
        settings.cache.sweep_interval(),
    );
    cache_service.start();

    info!(
        "Question cache initialized ({} entries, TTL: {}s)",
        settings.cache.max_entries, settings.cache.ttl_secs
    );

    // Stores: PostgreSQL when configured, in-memory otherwise
    let (stores, postgres) = match &settings.store.database_url {
        Some(url) => {
            let pg = Arc::new(
                PostgresStore::connect(url, settings.store.max_connections)
                    .await
                    .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
            );
            (Stores::shared(pg.clone()), Some(pg))
        }
        None => {
            let memory = match &settings.store.seed_file {
                Some(path) => MemoryStore::from_seed_file(path)
                    .await
                    .map_err(|e| startup_error("Failed to load seed file", e))?,
                None => MemoryStore::new(),
            };
            info!("Using in-memory store");
            (Stores::shared(Arc::new(memory)), None)
        }
    };

    let selector = QuestionSelector::new(
        llm.clone(),
        cache_service.cache(),
        &settings.questions,
        settings.llm.timeout(),
    );
    let generator = RecommendationGenerator::new(llm, settings.llm.timeout());
    let engine = Arc::new(Engine::new(stores, &settings.filter, selector, generator));

    info!(
        "Engine initialized (max distance: {}m, weights: {:?})",
        settings.filter.max_distance_m, settings.filter.weights
    );

    // Build application state
    let app_state = AppState {
        engine,
        question_cache: cache_service.cache(),
        postgres,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run();

    let result = server.await;

    cache_service.stop().await;
    info!("Outing engine stopped");

    result
}
