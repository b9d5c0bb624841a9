// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::error::{EngineError, FlowError};
use crate::engine::executor::{FlowEngine, RunEvent};
use crate::engine::graph::ConnectorKind;
use crate::engine::scheduler;
use crate::engine::validator;
use crate::host::loader::{FlowDocument, FlowLoader, LoadedFlow};

/// Connector kinds with their credential fields and the actions they offer
static CATALOG: Lazy<Value> = Lazy::new(|| {
    let connectors: Vec<Value> = ConnectorKind::ALL
        .iter()
        .map(|kind| {
            let actions: Vec<Value> = kind
                .actions()
                .into_iter()
                .map(|action| json!({ "kind": action, "label": action.label() }))
                .collect();
            json!({
                "kind": kind,
                "required_fields": kind.required_fields(),
                "actions": actions,
            })
        })
        .collect();
    json!({ "connectors": connectors })
});

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    engine: Arc<FlowEngine>,
    flows_dir: PathBuf,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(engine: Arc<FlowEngine>, flows_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            flows_dir: flows_dir.into(),
            active: Arc::new(Mutex::new(None)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/catalog", get(catalog))
        .route("/api/schema", get(schema))
        .route("/api/flows", get(list_flows))
        .route("/api/flows/validate", post(validate_flow))
        .route("/api/flows/{id}", get(get_flow))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/runs/cancel", post(cancel_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(port: u16, state: AppState) -> Result<(), FlowError> {
    // Request spans from TraceLayer; ignore if a subscriber is already set
    let _ = tracing::subscriber::set_global_default(tracing_subscriber::fmt().finish());

    let app = router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Error response with a JSON body
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        let status = match err {
            FlowError::Document(_)
            | FlowError::Graph(_)
            | FlowError::Json(_)
            | FlowError::Yaml(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, err.to_string())
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn catalog() -> Json<Value> {
    Json(CATALOG.clone())
}

async fn schema() -> Json<Value> {
    Json(json!(FlowDocument::schema()))
}

/// Run flow-directory I/O on the blocking pool
async fn blocking<T, F>(task: F) -> Result<T, FlowError>
where
    F: FnOnce() -> Result<T, FlowError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(std::io::Error::from)?
}

/// Load a stored flow by id; `None` if no file matches
async fn load_stored(flows_dir: PathBuf, id: String) -> Result<Option<FlowDocument>, FlowError> {
    blocking(move || {
        let loader = FlowLoader::new();
        match loader.find(&flows_dir, &id)? {
            Some(path) => loader.load(path).map(Some),
            None => Ok(None),
        }
    })
    .await
}

async fn list_flows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let flows_dir = state.flows_dir.clone();
    let flows = blocking(move || FlowLoader::new().list(flows_dir)).await?;
    Ok(Json(json!(flows)))
}

async fn get_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowDocument>, ApiError> {
    let doc = load_stored(state.flows_dir.clone(), id)
        .await?
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "Flow not found".to_string()))?;
    Ok(Json(doc))
}

async fn validate_flow(Json(doc): Json<FlowDocument>) -> Result<Json<Value>, ApiError> {
    let flow = doc.into_graph()?;
    let result = validator::validate(&flow.graph);
    let order = scheduler::order(&flow.graph).ok();
    Ok(Json(json!({
        "result": result,
        "order": order,
        "keys": flow.keys,
    })))
}

#[derive(Deserialize)]
struct RunRequest {
    /// Stored flow under the flows directory
    #[serde(default)]
    flow_id: Option<String>,
    /// Inline flow document
    #[serde(default)]
    flow: Option<FlowDocument>,
}

enum StreamItem {
    Run(RunEvent),
    Error(String),
}

impl StreamItem {
    fn into_event(self) -> Event {
        match self {
            StreamItem::Run(event) => Event::default()
                .event("run")
                .json_data(event)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
            StreamItem::Error(message) => Event::default().event("error").data(message),
        }
    }
}

async fn resolve_flow(state: &AppState, request: RunRequest) -> Result<LoadedFlow, FlowError> {
    let doc = match (request.flow, request.flow_id) {
        (Some(doc), _) => doc,
        (None, Some(id)) => load_stored(state.flows_dir.clone(), id.clone())
            .await?
            .ok_or_else(|| FlowError::document(format!("flow '{}' not found", id)))?,
        (None, None) => return Err(FlowError::document("request needs 'flow' or 'flow_id'")),
    };
    doc.into_graph()
}

async fn stream_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let flow = match resolve_flow(&state, request).await {
            Ok(flow) => flow,
            Err(e) => {
                log::warn!("Cannot start run: {}", e);
                let _ = tx.send(StreamItem::Error(e.to_string())).await;
                return;
            }
        };

        let cancel = CancellationToken::new();
        {
            let mut active = state.active.lock().await;
            if active.is_some() {
                let _ = tx
                    .send(StreamItem::Error(EngineError::ConcurrentRunRejected.to_string()))
                    .await;
                return;
            }
            *active = Some(cancel.clone());
        }

        log::info!("Starting streaming run of flow '{}'", flow.name);
        let (events_tx, mut events_rx) = mpsc::channel(100);
        let forward = async {
            while let Some(event) = events_rx.recv().await {
                let _ = tx.send(StreamItem::Run(event)).await;
            }
        };
        let (result, _) = tokio::join!(
            state.engine.run_stream(&flow.graph, cancel, events_tx),
            forward
        );

        state.active.lock().await.take();

        match result {
            Ok(report) => log::info!("Run {} finished: {:?}", report.run_id, report.outcome),
            Err(e) => {
                log::warn!("Run rejected: {}", e);
                let _ = tx.send(StreamItem::Error(e.to_string())).await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|item| Ok(item.into_event()));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

async fn cancel_run(State(state): State<AppState>) -> Json<Value> {
    match state.active.lock().await.as_ref() {
        Some(token) => {
            token.cancel();
            log::info!("Cancellation requested");
            Json(json!({ "status": "cancelling" }))
        }
        None => Json(json!({ "status": "idle" })),
    }
}
