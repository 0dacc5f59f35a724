//! Control-surface request handlers.
//!
//! Thin adapters over the engine's lifecycle operations. The engine is
//! blocking, so every call hops onto the blocking pool. Errors serialize
//! as `{"error": <message>}` with a conventional status code.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qube_common::error::QubeError;
use qube_runtime::{ContainerDetails, Engine};
use serde::{Deserialize, Serialize};

/// Engine errors mapped onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(QubeError);

impl From<QubeError> for ApiError {
    fn from(err: QubeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QubeError::NotFound { .. } => StatusCode::NOT_FOUND,
            QubeError::BadImageSpec { .. }
            | QubeError::NoCommand
            | QubeError::BadVolume { .. }
            | QubeError::Parse { .. } => StatusCode::BAD_REQUEST,
            QubeError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Body shape shared by the mutating routes.
#[derive(Debug, Deserialize)]
pub struct CommandParams {
    /// Container name or decimal pid.
    pub container_id: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub containers: Vec<ContainerDetails>,
}

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub name: String,
    pub size_mb: f64,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct VolumeInfo {
    pub name: String,
    pub host_path: String,
    pub container_path: String,
    pub container: String,
}

async fn run_blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, QubeError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            ApiError(QubeError::Launch {
                message: format!("worker task failed: {e}"),
            })
        })?
        .map_err(ApiError)
}

fn success() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "success" }))
}

/// `GET /list` — all records with live stats.
pub async fn list(State(engine): State<Arc<Engine>>) -> ApiResult<Json<ListResponse>> {
    let containers = run_blocking(move || engine.list()).await?;
    Ok(Json(ListResponse { containers }))
}

/// `POST /stop` — stop by name or pid in the body.
pub async fn stop_by_body(
    State(engine): State<Arc<Engine>>,
    Json(params): Json<CommandParams>,
) -> ApiResult<Json<serde_json::Value>> {
    run_blocking(move || engine.stop(&params.container_id)).await?;
    Ok(success())
}

/// `POST /stop/{name}`.
pub async fn stop_by_name(
    State(engine): State<Arc<Engine>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    run_blocking(move || engine.stop(&name)).await?;
    Ok(success())
}

/// `POST /start` — start by name or pid in the body.
pub async fn start_by_body(
    State(engine): State<Arc<Engine>>,
    Json(params): Json<CommandParams>,
) -> ApiResult<Json<serde_json::Value>> {
    run_blocking(move || engine.start(&params.container_id)).await?;
    Ok(success())
}

/// `POST /start/{name}`.
pub async fn start_by_name(
    State(engine): State<Arc<Engine>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    run_blocking(move || engine.start(&name)).await?;
    Ok(success())
}

/// `POST /delete`.
pub async fn delete(
    State(engine): State<Arc<Engine>>,
    Json(params): Json<CommandParams>,
) -> ApiResult<Json<serde_json::Value>> {
    run_blocking(move || engine.delete(&params.container_id)).await?;
    Ok(success())
}

/// `POST /info` — one record with live stats.
pub async fn info(
    State(engine): State<Arc<Engine>>,
    Json(params): Json<CommandParams>,
) -> ApiResult<Json<ListResponse>> {
    let details = run_blocking(move || engine.info(&params.container_id)).await?;
    Ok(Json(ListResponse {
        containers: vec![details],
    }))
}

/// `GET /images` — the local image cache.
pub async fn images(State(engine): State<Arc<Engine>>) -> ApiResult<Json<Vec<ImageInfo>>> {
    let images = run_blocking(move || {
        let specs = engine.images().list()?;
        let mut infos = Vec::with_capacity(specs.len());
        for spec in specs {
            let path = engine.images().archive_path(&spec);
            #[allow(clippy::cast_precision_loss)]
            let size_mb = std::fs::metadata(&path)
                .map(|m| m.len() as f64 / 1_048_576.0)
                .unwrap_or(0.0);
            infos.push(ImageInfo {
                name: spec.to_string(),
                size_mb,
                path: path.display().to_string(),
            });
        }
        Ok(infos)
    })
    .await?;
    Ok(Json(images))
}

/// `GET /volumes` — every bind mount of every tracked container.
pub async fn volumes(State(engine): State<Arc<Engine>>) -> ApiResult<Json<Vec<VolumeInfo>>> {
    let volumes = run_blocking(move || {
        let records = engine.ledger().list()?;
        let mut volumes = Vec::new();
        for record in records {
            for (idx, (host, guest)) in record.volumes.iter().enumerate() {
                volumes.push(VolumeInfo {
                    name: format!("vol-{idx}"),
                    host_path: host.clone(),
                    container_path: guest.clone(),
                    container: record.name.clone(),
                });
            }
        }
        Ok(volumes)
    })
    .await?;
    Ok(Json(volumes))
}

/// `GET /eval/{name}/{action}` — WebSocket shell into a running container.
///
/// Each inbound text frame is a shell command; its combined stdout/stderr
/// comes back one frame per line.
pub async fn eval_socket(
    State(engine): State<Arc<Engine>>,
    Path((name, _action)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    let probe = engine.clone();
    let probe_name = name.clone();
    let found = run_blocking(move || probe.find_record(&probe_name)).await;
    match found {
        Ok(_) => ws.on_upgrade(move |socket| eval_loop(socket, engine, name)),
        Err(e) => e.into_response(),
    }
}

async fn eval_loop(mut socket: WebSocket, engine: Arc<Engine>, name: String) {
    while let Some(Ok(message)) = socket.recv().await {
        let command = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        if command.is_empty() {
            continue;
        }

        let engine = engine.clone();
        let target = name.clone();
        let result =
            tokio::task::spawn_blocking(move || engine.eval(&target, &command)).await;

        match result {
            Ok(Ok(output)) => {
                if output.is_empty() {
                    if socket.send(Message::Text(String::new().into())).await.is_err() {
                        return;
                    }
                    continue;
                }
                for line in output.lines() {
                    if socket.send(Message::Text(line.to_owned().into())).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                if socket
                    .send(Message::Text(format!("Error: {e}").into()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "eval task failed");
                return;
            }
        }
    }
}
