// HTTP API
// Exposes classification results and the chord rule table to the frontend

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chords::ClassificationService;
use crate::commands::{self, ChordResponse, ChordShape, ChordShapeMap, CommandError};

struct ServerError {
    status: StatusCode,
    error: CommandError,
}

impl ServerError {
    fn not_found(message: String) -> Self {
        ServerError {
            status: StatusCode::NOT_FOUND,
            error: CommandError::from(message),
        }
    }
}

impl From<CommandError> for ServerError {
    fn from(error: CommandError) -> Self {
        ServerError {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.error.message() });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ClassificationService>,
}

async fn processed_chord(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChordResponse>, ServerError> {
    let input = commands::parse_sensor_input(&body)?;
    Ok(Json(commands::process_sensor(&state.service, input)))
}

async fn list_chords(State(state): State<AppState>) -> Json<ChordShapeMap> {
    Json(commands::list_chord_rules(&state.service))
}

async fn get_chord(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ChordShape>, ServerError> {
    commands::get_chord_rule(&state.service, &name)?
        .map(Json)
        .ok_or_else(|| ServerError::not_found(format!("Unknown chord: {}", name)))
}

/// Build the API router
///
/// `allowed_origin` is the frontend dev server; an unparsable origin
/// disables CORS rather than failing startup.
pub fn router(state: AppState, allowed_origin: &str) -> Router {
    let mut router = Router::new()
        .route("/api/sensor/processed", post(processed_chord))
        .route("/api/chords", get(list_chords))
        .route("/api/chords/{name}", get(get_chord))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([axum::http::header::CONTENT_TYPE]),
            );
        }
        Err(e) => log::warn!("Ignoring invalid CORS origin '{}': {}", allowed_origin, e),
    }

    router
}

/// Serve the API until ctrl-c
pub async fn serve(state: AppState, bind: &str, allowed_origin: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state, allowed_origin))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
}
