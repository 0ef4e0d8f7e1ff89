//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use feedback_core::{
    Config, FeedbackId, FeedbackService, FeedbackStore, HtmlSanitizer, Sanitize, SledFeedbackStore,
};

use crate::GatewayError;
use crate::admission::{AdmissionControl, AdmissionFilter};
use crate::error::ApiError;
use crate::middleware::{AdmitRead, AdmitWrite};

/// Message returned with a successful submission.
pub const SAVE_SUCCESS_MESSAGE: &str = "Feedback saved successfully";

/// How often expired rate-limit windows are dropped.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Feedback service.
    pub feedback: Arc<FeedbackService>,
    /// Per-client admission control.
    pub admission: Arc<dyn AdmissionControl>,
    /// Use `X-Forwarded-For` to identify clients.
    pub trust_forwarded_for: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("feedback", &self.feedback)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish_non_exhaustive()
    }
}

/// Build the HTTP router.
pub fn router(state: AppState, cors: bool) -> Router {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/feedback", get(list_feedback).post(submit_feedback))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Gateway server.
pub struct Gateway {
    config: Config,
    state: AppState,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    store: Option<Arc<dyn FeedbackStore>>,
    sanitizer: Option<Arc<dyn Sanitize>>,
    admission: Option<Arc<dyn AdmissionControl>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
            sanitizer: None,
            admission: None,
        }
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the feedback store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FeedbackStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the sanitizer. Defaults to [`HtmlSanitizer`].
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitize>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Set the admission control. Defaults to an [`AdmissionFilter`] built from config.
    #[must_use]
    pub fn with_admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if no store is configured or the config is invalid.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        self.config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let store = self
            .store
            .ok_or_else(|| GatewayError::Startup("Feedback store is required".to_string()))?;

        let sanitizer = self
            .sanitizer
            .unwrap_or_else(|| Arc::new(HtmlSanitizer::new()));

        let admission = self
            .admission
            .unwrap_or_else(|| Arc::new(AdmissionFilter::from_config(&self.config.limits)));

        let feedback = FeedbackService::new(store, sanitizer).with_recent_limit(self.config.recent_limit);

        let state = AppState {
            feedback: Arc::new(feedback),
            admission,
            trust_forwarded_for: self.config.server.trust_forwarded_for,
        };

        Ok(Gateway {
            config: self.config,
            state,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Create a gateway backed by the sled store named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Startup` if no store path is configured or the
    /// store cannot be opened.
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        let path = config
            .require_store_path()
            .map_err(|e| GatewayError::Startup(e.to_string()))?;

        let store = SledFeedbackStore::open(path).map_err(|e| GatewayError::Startup(e.to_string()))?;

        GatewayBuilder::new()
            .with_config(config)
            .with_store(Arc::new(store))
            .build()
    }

    /// Create a new builder.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// The HTTP router for this gateway.
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.server.cors)
    }

    /// Run the gateway server until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let app = self.router();

        let admission = self.state.admission.clone();
        let purge_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                let purged = admission.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Dropped expired rate-limit windows");
                }
            }
        });

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Feedback gateway listening on http://{}", addr);

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        purge_handle.abort();
        result.map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Feedback gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body of `POST /feedback`.
#[derive(Debug, Deserialize)]
pub struct SubmitFeedback {
    /// Classification tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Feedback text; may contain markup.
    pub feedback: String,
}

/// Response to a successful `POST /feedback`.
#[derive(Debug, Serialize)]
struct SubmitResponse {
    message: &'static str,
    id: FeedbackId,
}

async fn submit_feedback(
    State(state): State<AppState>,
    AdmitWrite(admitted): AdmitWrite,
    payload: Result<Json<SubmitFeedback>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;

    let id = state
        .feedback
        .submit(&payload.kind, &payload.feedback)
        .await
        .map_err(ApiError::saving)?;

    tracing::info!(%id, kind = %payload.kind, "Feedback saved");

    Ok((
        StatusCode::CREATED,
        admitted,
        Json(SubmitResponse {
            message: SAVE_SUCCESS_MESSAGE,
            id,
        }),
    ))
}

async fn list_feedback(
    State(state): State<AppState>,
    AdmitRead(admitted): AdmitRead,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .feedback
        .list_recent()
        .await
        .map_err(ApiError::retrieving)?;

    Ok((admitted, Json(records)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::WindowPolicy;
    use crate::error::{INVALID_PAYLOAD_MESSAGE, RETRIEVE_ERROR_MESSAGE, SAVE_ERROR_MESSAGE};
    use crate::middleware::{RATELIMIT_LIMIT, RATELIMIT_REMAINING};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, Response, header};
    use feedback_core::config::LimitsConfig;
    use feedback_core::{FeedbackRecord, MemoryFeedbackStore, NewFeedback, StoreError};
    use governor::clock::FakeRelativeClock;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const CLIENT: [u8; 4] = [198, 51, 100, 4];

    struct UnreachableStore;

    #[async_trait]
    impl FeedbackStore for UnreachableStore {
        async fn insert(&self, _entry: NewFeedback) -> Result<FeedbackId, StoreError> {
            Err(StoreError::Unavailable("server selection timed out".to_string()))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
            Err(StoreError::Unavailable("server selection timed out".to_string()))
        }
    }

    struct TestApp {
        router: Router,
        clock: FakeRelativeClock,
        store: Arc<MemoryFeedbackStore>,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_config(Config::default())
        }

        fn with_config(config: Config) -> Self {
            let store = Arc::new(MemoryFeedbackStore::new());
            let (router, clock) = build_router(config, store.clone());
            Self {
                router,
                clock,
                store,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    fn build_router(config: Config, store: Arc<dyn FeedbackStore>) -> (Router, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let limits = LimitsConfig::default();
        let admission = AdmissionFilter::with_clock(
            WindowPolicy::from(&limits.write),
            WindowPolicy::from(&limits.read),
            clock.clone(),
        );

        let gateway = Gateway::builder()
            .with_config(config)
            .with_store(store)
            .with_admission(Arc::new(admission))
            .build()
            .unwrap();

        (gateway.router(), clock)
    }

    fn post_feedback(ip: [u8; 4], body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/feedback")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(SocketAddr::from((ip, 40000))))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_feedback(ip: [u8; 4]) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri("/feedback")
            .extension(ConnectInfo(SocketAddr::from((ip, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_list_sanitized() {
        let app = TestApp::new();

        let response = app
            .send(post_feedback(
                CLIENT,
                &json!({"type": "bug", "feedback": "<script>alert(1)</script>hello"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[RATELIMIT_LIMIT], "5");
        assert_eq!(response.headers()[RATELIMIT_REMAINING], "4");

        let body = json_body(response).await;
        assert_eq!(body["message"], SAVE_SUCCESS_MESSAGE);
        let id = body["id"].as_str().unwrap().to_string();

        let response = app.send(get_feedback(CLIENT)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[RATELIMIT_REMAINING], "9");

        let records = json_body(response).await;
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], id.as_str());
        assert_eq!(records[0]["type"], "bug");
        assert_eq!(records[0]["feedback"], "hello");
        assert!(records[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_bounded() {
        let app = TestApp::new();
        for i in 0..25 {
            app.store
                .insert(NewFeedback::new("idea", format!("idea {i}")))
                .await
                .unwrap();
        }

        let records = json_body(app.send(get_feedback(CLIENT)).await).await;
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 20);
        assert_eq!(records[0]["feedback"], "idea 24");
    }

    #[tokio::test]
    async fn test_list_empty() {
        let app = TestApp::new();
        let response = app.send(get_feedback(CLIENT)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_sixth_post_throttled_until_window_elapses() {
        let app = TestApp::new();
        let body = json!({"type": "bug", "feedback": "again"});

        for _ in 0..5 {
            let response = app.send(post_feedback(CLIENT, &body)).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.send(post_feedback(CLIENT, &body)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "900");
        assert_eq!(
            json_body(response).await["message"],
            "Terlalu banyak permintaan POST dari IP ini, coba lagi nanti."
        );
        assert_eq!(app.store.len().await, 5);

        // Another address has its own budget
        let response = app.send(post_feedback([198, 51, 100, 5], &body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        app.clock.advance(Duration::from_secs(15 * 60));
        let response = app.send(post_feedback(CLIENT, &body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_eleventh_get_throttled() {
        let app = TestApp::new();

        for _ in 0..10 {
            assert_eq!(app.send(get_feedback(CLIENT)).await.status(), StatusCode::OK);
        }

        let response = app.send(get_feedback(CLIENT)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            json_body(response).await["message"],
            "Terlalu banyak permintaan GET dari IP ini, coba lagi nanti."
        );

        // Write budget is untouched
        let response = app
            .send(post_feedback(CLIENT, &json!({"type": "bug", "feedback": "hi"})))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        app.clock.advance(Duration::from_secs(5 * 60));
        assert_eq!(app.send(get_feedback(CLIENT)).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_throttled_before_body_is_read() {
        let app = TestApp::new();
        for _ in 0..5 {
            app.send(post_feedback(CLIENT, &json!({"type": "bug", "feedback": "x"})))
                .await;
        }

        let response = app.send(post_feedback(CLIENT, &json!("not an object"))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_invalid_payloads_rejected() {
        let app = TestApp::new();

        for body in [
            json!({"feedback": "missing type"}),
            json!({"type": "bug"}),
            json!({"type": 42, "feedback": "wrong type"}),
            json!({"type": "", "feedback": "empty type"}),
            json!({"type": "bug", "feedback": "   "}),
            json!({"type": "bug", "feedback": "<script>alert(1)</script>"}),
        ] {
            let response = app.send(post_feedback([203, 0, 113, 1], &body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");

            let json = json_body(response).await;
            assert_eq!(json["message"], INVALID_PAYLOAD_MESSAGE);
            assert!(json["error"].is_string());

            // Fresh budget for the next case
            app.clock.advance(Duration::from_secs(15 * 60));
        }

        assert!(app.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_json_body_rejected() {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/feedback")
            .header(header::CONTENT_TYPE, "text/plain")
            .extension(ConnectInfo(SocketAddr::from((CLIENT, 40000))))
            .body(Body::from("type=bug&feedback=hi"))
            .unwrap();

        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_unreachable() {
        let (router, _clock) = build_router(Config::default(), Arc::new(UnreachableStore));

        let response = router.clone().oneshot(get_feedback(CLIENT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["message"], RETRIEVE_ERROR_MESSAGE);
        assert!(body["error"].as_str().unwrap().contains("server selection timed out"));
        assert!(body.is_object());

        let response = router
            .oneshot(post_feedback(CLIENT, &json!({"type": "bug", "feedback": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["message"], SAVE_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_forwarded_for_trusted_from_config() {
        let mut config = Config::default();
        config.server.trust_forwarded_for = true;
        let app = TestApp::with_config(config);

        // Same proxy peer, different forwarded clients: separate budgets
        for client in ["203.0.113.10", "203.0.113.11"] {
            for _ in 0..10 {
                let mut request = get_feedback([10, 0, 0, 1]);
                request
                    .headers_mut()
                    .insert("x-forwarded-for", client.parse().unwrap());
                assert_eq!(app.send(request).await.status(), StatusCode::OK);
            }
        }
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let app = TestApp::new();
        let mut request = get_feedback(CLIENT);
        request
            .headers_mut()
            .insert(header::ORIGIN, "https://example.org".parse().unwrap());

        let response = app.send(request).await;
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[test]
    fn test_build_requires_store() {
        let result = Gateway::builder().build();
        assert!(matches!(result, Err(GatewayError::Startup(_))));
    }

    #[test]
    fn test_new_requires_store_path() {
        let result = Gateway::new(Config::default());
        assert!(matches!(result, Err(GatewayError::Startup(msg)) if msg.contains("store.path")));
    }
}
