use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::model::ProjectSnapshot;
use crate::registry::{catalog, Command};
use crate::session::SessionStore;
use crate::settings::ServerConfig;
use crate::store::ProjectFile;
use crate::translator::TranslateError;

/// Shared state behind every route.
pub struct ApiState {
    pub sessions: SessionStore,
}

impl ApiState {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

// ── Response types ───────────────────────────────────────────────

#[derive(Serialize)]
struct ApiOk<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Serialize)]
struct ApiErr {
    ok: bool,
    error: AppError,
    message: String,
}

fn ok_json<T: Serialize>(data: T) -> impl IntoResponse {
    Json(ApiOk { ok: true, data })
}

fn err_json(status: StatusCode, error: AppError) -> impl IntoResponse {
    let message = error.to_string();
    (
        status,
        Json(ApiErr {
            ok: false,
            error,
            message,
        }),
    )
}

fn session_not_found(id: &str) -> axum::response::Response {
    err_json(StatusCode::NOT_FOUND, AppError::not_found(format!("Session {id}"))).into_response()
}

/// HTTP status for a failed translation: backend trouble is a gateway
/// failure, a bad reply is unprocessable.
fn translate_status(e: &TranslateError) -> StatusCode {
    match e {
        TranslateError::EmptyUtterance => StatusCode::BAD_REQUEST,
        TranslateError::Backend(_) | TranslateError::Http { .. } => StatusCode::BAD_GATEWAY,
        TranslateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TranslateError::MalformedArguments { .. }
        | TranslateError::UnknownCommand(_)
        | TranslateError::InvalidArguments { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Deserialize)]
struct HelpQuery {
    topic: Option<String>,
}

/// One utterance. `snapshot` is the chart's serialized `{ data, links }`.
#[derive(Deserialize)]
struct TurnRequest {
    utterance: String,
    #[serde(default)]
    snapshot: Option<Value>,
}

/// A command sent directly, in the same `{ cmd, params }` shape turns return.
#[derive(Deserialize)]
struct CommandRequest {
    cmd: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct TranslateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Command>,
}

fn snapshot_from(payload: Option<&Value>, limit: usize) -> Result<Option<ProjectSnapshot>, AppError> {
    payload
        .filter(|v| !v.is_null())
        .map(|v| ProjectSnapshot::from_chart_payload(v, limit))
        .transpose()
}

// ── Handlers ─────────────────────────────────────────────────────

async fn get_tools() -> impl IntoResponse {
    ok_json(catalog::to_json_schema())
}

async fn get_help(Query(query): Query<HelpQuery>) -> impl IntoResponse {
    ok_json(catalog::help_text(query.topic.as_deref()))
}

/// Stateless translation: the client owns the chart and applies the command.
async fn post_translate(
    Extension(state): Extension<Arc<ApiState>>,
    Json(body): Json<TurnRequest>,
) -> axum::response::Response {
    let services = state.sessions.services();
    let Some(translator) = services.translator.as_ref() else {
        return err_json(
            StatusCode::SERVICE_UNAVAILABLE,
            AppError::TranslationError {
                message: "No model backend configured".into(),
            },
        )
        .into_response();
    };
    let snapshot = match snapshot_from(body.snapshot.as_ref(), services.snapshot_limit) {
        Ok(s) => s.unwrap_or_default(),
        Err(e) => return err_json(StatusCode::BAD_REQUEST, e).into_response(),
    };

    match translator.translate(&body.utterance, &snapshot).await {
        Ok(t) => ok_json(TranslateResponse {
            assistant_text: t.assistant_text,
            command: t.command,
        })
        .into_response(),
        Err(e) => err_json(translate_status(&e), e.into()).into_response(),
    }
}

async fn post_turn(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(body): Json<TurnRequest>,
) -> axum::response::Response {
    let session = state.sessions.get_or_create(&id);
    let snapshot = match snapshot_from(body.snapshot.as_ref(), state.sessions.services().snapshot_limit) {
        Ok(s) => s,
        Err(e) => return err_json(StatusCode::BAD_REQUEST, e).into_response(),
    };
    ok_json(session.submit(&body.utterance, snapshot).await).into_response()
}

async fn post_command(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(body): Json<CommandRequest>,
) -> axum::response::Response {
    let params = if body.params.is_null() {
        serde_json::json!({})
    } else {
        body.params
    };
    let command = match Command::from_tool_call(&body.cmd, &params) {
        Ok(c) => c,
        Err(e) => return err_json(StatusCode::BAD_REQUEST, AppError::invalid(e.to_string())).into_response(),
    };
    let session = state.sessions.get_or_create(&id);
    ok_json(session.run_command(command)).into_response()
}

async fn get_project(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.sessions.get(&id) {
        Some(session) => {
            let file = session.with_workspace(|ws| ProjectFile::new(ws.project.clone(), ws.view.clone()));
            ok_json(file).into_response()
        }
        None => session_not_found(&id),
    }
}

async fn get_snapshot(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.sessions.get(&id) {
        Some(session) => ok_json(session.snapshot()).into_response(),
        None => session_not_found(&id),
    }
}

async fn get_describe(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.sessions.get(&id) {
        Some(session) => {
            let text = session.with_workspace(|ws| crate::describe::describe_project(&ws.project, &ws.view));
            ok_json(text).into_response()
        }
        None => session_not_found(&id),
    }
}

async fn delete_session(
    Extension(state): Extension<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if state.sessions.remove(&id) {
        ok_json(Value::Null).into_response()
    } else {
        session_not_found(&id)
    }
}

// ── Server startup ───────────────────────────────────────────────

pub fn router(state: Arc<ApiState>, config: &ServerConfig) -> Result<Router, AppError> {
    let origin: HeaderValue = config
        .frontend_origin
        .parse()
        .map_err(|_| AppError::invalid(format!("Invalid frontend origin: {}", config.frontend_origin)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/tools", get(get_tools))
        .route("/api/help", get(get_help))
        .route("/api/translate", post(post_translate))
        .route("/api/sessions/{id}/turns", post(post_turn))
        .route("/api/sessions/{id}/commands", post(post_command))
        .route("/api/sessions/{id}/project", get(get_project))
        .route("/api/sessions/{id}/snapshot", get(get_snapshot))
        .route("/api/sessions/{id}/describe", get(get_describe))
        .route("/api/sessions/{id}", axum::routing::delete(delete_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state)))
}

/// Bind the configured address and serve until the process stops.
pub async fn serve(state: Arc<ApiState>, config: &ServerConfig) -> Result<(), AppError> {
    let app = router(state, config)?;
    let ip: std::net::IpAddr = config
        .bind
        .parse()
        .map_err(|_| AppError::invalid(format!("Invalid bind address: {}", config.bind)))?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, origin = %config.frontend_origin, "API server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dispatcher::CommandDispatcher;
    use crate::session::SessionServices;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn snapshot_payload_is_optional() {
        assert!(snapshot_from(None, 10).unwrap().is_none());
        assert!(snapshot_from(Some(&Value::Null), 10).unwrap().is_none());
        let snap = snapshot_from(Some(&json!({"data": [{"id": 1, "text": "A"}], "links": []})), 10)
            .unwrap()
            .unwrap();
        assert_eq!(snap.tasks.len(), 1);
        assert!(snapshot_from(Some(&json!([1, 2])), 10).is_err());
    }

    #[test]
    fn translate_errors_map_to_statuses() {
        assert_eq!(
            translate_status(&TranslateError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            translate_status(&TranslateError::UnknownCommand("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(translate_status(&TranslateError::Backend("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn router_rejects_bad_origin() {
        let state = Arc::new(ApiState::new(SessionStore::new(SessionServices::new(
            CommandDispatcher::default(),
            None,
            150,
        ))));
        let config = ServerConfig {
            frontend_origin: "bad\norigin".into(),
            ..ServerConfig::default()
        };
        assert!(router(state.clone(), &config).is_err());
        assert!(router(state, &ServerConfig::default()).is_ok());
    }
}
