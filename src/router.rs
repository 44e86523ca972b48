//! Route table and middleware stack.

use axum::{
    http::HeaderValue,
    routing::get,
    Router,
};
use tower::Layer;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::{config::ServerConfig, error::Error, handlers, state::AppState};

/// CORS policy from `allowed_origins`.
///
/// `*` allows any origin without credentials. An explicit list allows
/// credentials and mirrors the requested methods and headers.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = config.allowed_origins();
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn not_found() -> Error {
    Error::NotFound("Not found".to_string())
}

/// All routes with CORS, tracing and the JSON 404 fallback.
pub fn build_router(state: AppState) -> Router {
    let record_routes = Router::new()
        .route(
            "/{table}",
            get(handlers::list_records)
                .post(handlers::create_records)
                .delete(handlers::delete_records),
        )
        .route(
            "/{table}/{id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        );

    let api_routes = Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/records", record_routes);

    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/v1", api_routes)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The router behind trailing-slash normalization, ready to serve.
///
/// Normalization has to wrap the router from the outside so it runs before
/// route matching.
pub fn build_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}
