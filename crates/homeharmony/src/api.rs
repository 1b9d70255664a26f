use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::catalog::RoomFilter;
use crate::engine::ChangeSource;
use crate::engine::DeviceStateStore;
use crate::engine::PendingWrite;
use crate::engine::StoreError;
use crate::view;
use crate::view::Dashboard;
use crate::view::DeviceCard;
use crate::voice::TranscriptOutcome;
use crate::voice::VoiceError;
use crate::voice::VoiceHandle;
use crate::voice::VoiceStatus;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    devices: usize,
}

#[derive(Debug, Deserialize)]
struct RoomQuery {
    room: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetStateRequest {
    on: bool,
}

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    transcript: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("unknown room '{0}'")]
    UnknownRoom(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("voice input is disabled")]
    VoiceDisabled,

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownRoom(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::UnknownDevice(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::BAD_GATEWAY,
            ApiError::VoiceDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Voice(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    version: &'static str,
    store: Arc<DeviceStateStore>,
    voice: Option<VoiceHandle>,
}

impl AppState {
    pub fn new(store: Arc<DeviceStateStore>, voice: Option<VoiceHandle>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            store,
            voice,
        }
    }

    fn room_filter(&self, query: &RoomQuery) -> Result<RoomFilter, ApiError> {
        let filter = match query.room.as_deref() {
            None => RoomFilter::All,
            Some(room) => RoomFilter::from(room),
        };
        if self.store.catalog().has_room(&filter) {
            Ok(filter)
        } else {
            Err(ApiError::UnknownRoom(filter.to_string()))
        }
    }

    fn voice_status(&self) -> VoiceStatus {
        self.voice
            .as_ref()
            .map(VoiceHandle::status)
            .unwrap_or_default()
    }

    fn voice(&self) -> Result<&VoiceHandle, ApiError> {
        self.voice.as_ref().ok_or(ApiError::VoiceDisabled)
    }

    fn card(&self, write: &PendingWrite) -> Result<DeviceCard, ApiError> {
        let device = self
            .store
            .catalog()
            .get(write.device_id())
            .ok_or_else(|| StoreError::UnknownDevice(write.device_id().to_string()))?;
        Ok(DeviceCard::new(device, write.value()))
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            devices: state.store.catalog().len(),
        }),
    )
}

/// Handler for GET /v1/rooms
#[tracing::instrument(skip(state))]
async fn rooms(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(
        state
            .store
            .catalog()
            .room_filters()
            .iter()
            .map(RoomFilter::to_string)
            .collect(),
    )
}

/// Handler for GET /v1/dashboard
#[tracing::instrument(skip(state))]
async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Dashboard>, ApiError> {
    let filter = state.room_filter(&query)?;
    Ok(Json(view::dashboard(
        state.store.catalog(),
        &state.store.snapshot(),
        &filter,
        &state.voice_status(),
    )))
}

/// Handler for GET /v1/devices
#[tracing::instrument(skip(state))]
async fn devices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Vec<DeviceCard>>, ApiError> {
    let filter = state.room_filter(&query)?;
    Ok(Json(view::cards(
        state.store.catalog(),
        &state.store.snapshot(),
        &filter,
    )))
}

/// Handler for POST /v1/devices/:id/toggle
#[tracing::instrument(skip(state))]
async fn toggle_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceCard>, ApiError> {
    let write = state.store.toggle(&id, ChangeSource::Manual)?;
    Ok(Json(state.card(&write)?))
}

/// Handler for PUT /v1/devices/:id
#[tracing::instrument(skip(state))]
async fn set_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SetStateRequest>,
) -> Result<Json<DeviceCard>, ApiError> {
    let write = state
        .store
        .set_state(&id, request.on, ChangeSource::Manual)?;
    Ok(Json(state.card(&write)?))
}

/// Handler for POST /v1/voice/start
#[tracing::instrument(skip(state))]
async fn voice_start(State(state): State<Arc<AppState>>) -> Result<Json<VoiceStatus>, ApiError> {
    let voice = state.voice()?;
    voice.start().await?;
    Ok(Json(voice.status()))
}

/// Handler for POST /v1/voice/stop
#[tracing::instrument(skip(state))]
async fn voice_stop(State(state): State<Arc<AppState>>) -> Result<Json<VoiceStatus>, ApiError> {
    let voice = state.voice()?;
    voice.stop().await?;
    Ok(Json(voice.status()))
}

/// Handler for POST /v1/voice/transcript
#[tracing::instrument(skip(state))]
async fn voice_transcript(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<TranscriptOutcome>, ApiError> {
    let outcome = state.voice()?.submit(&request.transcript).await?;
    Ok(Json(outcome))
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/rooms", get(rooms))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/devices", get(devices))
        .route("/v1/devices/:id", axum::routing::put(set_device))
        .route("/v1/devices/:id/toggle", post(toggle_device))
        .route("/v1/voice/start", post(voice_start))
        .route("/v1/voice/stop", post(voice_stop))
        .route("/v1/voice/transcript", post(voice_transcript))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the dashboard API on `listen:port` until `shutdown_rx` fires.
pub async fn serve(
    listen: &str,
    port: u16,
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::Catalog;
    use crate::config::VoiceConfig;
    use crate::interpreter::CommandInterpreter;
    use crate::remote::MemoryStore;
    use crate::voice::tests_support::scripted;
    use crate::voice::tests_support::RecordingSynthesizer;
    use crate::voice::RecognitionOptions;
    use crate::voice::RecognizerFactory;
    use crate::voice::SpeechOutput;
    use crate::voice::SpeechRecognizer;
    use crate::voice::VoiceAdapter;

    fn store() -> Arc<DeviceStateStore> {
        Arc::new(DeviceStateStore::new(
            Arc::new(Catalog::default()),
            Arc::new(MemoryStore::new()),
        ))
    }

    fn app(store: Arc<DeviceStateStore>, voice: Option<VoiceHandle>) -> Router {
        create_router(Arc::new(AppState::new(store, voice)))
    }

    fn voice(store: Arc<DeviceStateStore>) -> VoiceHandle {
        let factory: RecognizerFactory = Box::new(|_options: &RecognitionOptions| {
            Ok(Box::new(scripted(vec![])) as Box<dyn SpeechRecognizer>)
        });
        let adapter = VoiceAdapter::new(
            factory,
            RecognitionOptions::default(),
            CommandInterpreter::new(store),
            SpeechOutput::new(
                Arc::new(RecordingSynthesizer::default()),
                &VoiceConfig::default(),
            ),
        );
        adapter.spawn().0
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (status, body) = send(app(store(), None), get("/v1/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_rooms() {
        let (status, body) = send(app(store(), None), get("/v1/rooms")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!(["All", "Living Room", "Kitchen", "Bedroom", "Home", "Laundry Room"])
        );
    }

    #[tokio::test]
    async fn test_devices_filtered_by_room() {
        let (status, body) = send(app(store(), None), get("/v1/devices?room=Laundry%20Room")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "washer_laundry");
        assert_eq!(body[0]["status"], "OFF");
    }

    #[tokio::test]
    async fn test_unknown_room_rejected() {
        let (status, body) = send(app(store(), None), get("/v1/devices?room=Garage")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown room 'Garage'");
    }

    #[tokio::test]
    async fn test_toggle_device() {
        let store = store();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/devices/fan_bedroom/toggle")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(store.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["on"], true);
        assert_eq!(body["affordance"], "rotate");
        assert_eq!(store.get("fan_bedroom"), Ok(true));
    }

    #[tokio::test]
    async fn test_set_unknown_device() {
        let request = post_json(
            "PUT",
            "/v1/devices/fan_garage",
            serde_json::json!({ "on": true }),
        );
        let (status, _) = send(app(store(), None), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_device() {
        let store = store();
        let request = post_json(
            "PUT",
            "/v1/devices/thermostat_home",
            serde_json::json!({ "on": true }),
        );

        let (status, body) = send(app(store.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ON");
        assert_eq!(body["affordance"], "warm_glow");

        let (_, dashboard) = send(app(store, None), get("/v1/dashboard?room=Home")).await;
        assert_eq!(dashboard["devices"][0]["on"], true);
        assert_eq!(dashboard["transcript"], "Say a command...");
        assert_eq!(dashboard["mic_label"], "Start Listening");
    }

    #[tokio::test]
    async fn test_voice_disabled() {
        let (status, _) = send(
            app(store(), None),
            post_json("POST", "/v1/voice/start", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_voice_transcript() {
        let store = store();
        let voice = voice(store.clone());
        let request = post_json(
            "POST",
            "/v1/voice/transcript",
            serde_json::json!({ "transcript": "Bedroom Light Chalu Karo" }),
        );

        let (status, body) = send(app(store.clone(), Some(voice)), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transcript"], "bedroom light chalu karo");
        assert_eq!(body["feedback"], "bedroom light चालू हो गया");
        assert_eq!(body["matches"][0]["device_id"], "light_bedroom");
        assert_eq!(body["matches"][0]["language"], "hindi");
        assert_eq!(store.get("light_bedroom"), Ok(true));
    }

    #[tokio::test]
    async fn test_voice_start_stop() {
        let store = store();
        let voice = voice(store.clone());

        let (status, body) = send(
            app(store.clone(), Some(voice.clone())),
            post_json("POST", "/v1/voice/start", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listening"], true);

        let (status, body) = send(
            app(store, Some(voice)),
            post_json("POST", "/v1/voice/stop", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listening"], false);
    }
}
