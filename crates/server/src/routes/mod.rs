pub mod index;
pub mod tasks;
pub mod users;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use configs::CorsConfig;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};

use crate::auth::require_bearer_token;
use crate::openapi::openapi_json;
use crate::state::ServerState;

/// CORS from configuration. Wildcards combined with credentials mirror the request instead.
pub fn build_cors(cfg: &CorsConfig) -> CorsLayer {
    let wildcard = |v: &[String]| v.iter().any(|s| s == "*");

    let origins = if cfg.allows_any_origin() {
        if cfg.allow_credentials { AllowOrigin::mirror_request() } else { AllowOrigin::any() }
    } else {
        let list: Vec<HeaderValue> = cfg
            .allow_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).map_err(|_| warn!(origin = %o, "ignoring invalid CORS origin")).ok())
            .collect();
        AllowOrigin::list(list)
    };

    let methods = if wildcard(&cfg.allow_methods) {
        if cfg.allow_credentials { AllowMethods::mirror_request() } else { AllowMethods::any() }
    } else {
        let list: Vec<Method> = cfg.allow_methods.iter().filter_map(|m| m.to_ascii_uppercase().parse().ok()).collect();
        AllowMethods::list(list)
    };

    let headers = if wildcard(&cfg.allow_headers) {
        if cfg.allow_credentials { AllowHeaders::mirror_request() } else { AllowHeaders::any() }
    } else {
        let list: Vec<HeaderName> = cfg.allow_headers.iter().filter_map(|h| h.parse().ok()).collect();
        AllowHeaders::list(list)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cfg.allow_credentials)
}

/// Build the full application router: public index/health/docs, users and tasks,
/// all behind the bearer-token middleware (which skips excluded paths).
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/", get(index::index))
        .route("/the-index", get(index::index))
        .route("/health", get(index::health))
        .route("/health/check", get(index::health_check))
        .route("/api-docs/openapi.json", get(openapi_json));

    let users = Router::new()
        .route("/", get(users::list))
        .route("/registration", post(users::register))
        .route("/login", post(users::login))
        .route("/token/refresh", post(users::refresh))
        .route("/:id", get(users::get))
        .route("/:id/update", put(users::update))
        .route("/:id/delete", delete(users::delete));

    let tasks = Router::new()
        .route("/process-user-registration", get(tasks::process_user_registration))
        .route("/add-schedule-task", get(tasks::add_schedule_task))
        .route("/schedules", post(tasks::create_schedule))
        .route("/schedule-list", get(tasks::schedule_list))
        .route("/schedule-get/:schedule_id", get(tasks::schedule_get))
        .route("/schedule-remove/:schedule_id", delete(tasks::schedule_remove))
        .route("/schedule-clear-all", delete(tasks::schedule_clear_all))
        .route("/schedule-count", get(tasks::schedule_count));

    public
        .nest("/api/v1/users", users)
        .nest("/api/v1/tasks", tasks)
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // one INFO span per request with method and path
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // status and latency
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
