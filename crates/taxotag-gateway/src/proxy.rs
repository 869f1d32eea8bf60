//! Request forwarding with merged default parameters.
//!
//! | Gateway route | Upstream path |
//! |---------------|---------------|
//! | `POST /v1/chat/completions` | `/chat-completion` |
//! | `POST /chat/completions` | `/chat-completion` |
//! | `GET /v1/models` | `/models` |
//! | `POST /v1/completions` | `/completion` |

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use taxotag_core::Result;

use crate::config::GatewayConfig;

pub const CHAT_COMPLETION_PATH: &str = "/chat-completion";
pub const MODELS_PATH: &str = "/models";
pub const COMPLETION_PATH: &str = "/completion";

/// Connection-scoped headers never relayed in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// State shared by every route.
#[derive(Clone)]
pub struct GatewayState {
    client: reqwest::Client,
    config: Arc<GatewayConfig>,
    defaults: Arc<Map<String, Value>>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            defaults: Arc::new(config.default_body()),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// The upstream could not be reached or its reply could not be read.
    Upstream(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            GatewayError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        let body = Json(serde_json::json!({
            "error": message,
        }));
        (status, body).into_response()
    }
}

/// Build the gateway router.
pub fn app_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completion))
        .route("/chat/completions", post(chat_completion))
        .route("/v1/models", get(models))
        .route("/v1/completions", post(completion))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Merge a caller body over `defaults`.
///
/// Top-level caller keys replace defaults wholesale (no deep merge). An empty
/// body, invalid JSON, or a JSON value that is not an object leaves the
/// defaults alone.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Map, Value};
/// use taxotag_gateway::proxy::merge_defaults;
///
/// let mut defaults = Map::new();
/// defaults.insert("temperature".into(), json!(0));
/// defaults.insert("max_tokens".into(), json!(300));
///
/// let merged = merge_defaults(&defaults, br#"{"temperature": 0.7, "model": "m"}"#);
/// assert_eq!(merged, json!({"temperature": 0.7, "max_tokens": 300, "model": "m"}));
///
/// assert_eq!(merge_defaults(&defaults, b"not json"), Value::Object(defaults.clone()));
/// ```
pub fn merge_defaults(defaults: &Map<String, Value>, body: &[u8]) -> Value {
    let mut merged = defaults.clone();
    if body.is_empty() {
        return Value::Object(merged);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(incoming)) => merged.extend(incoming),
        Ok(_) => warn!(
            subsystem = "gateway",
            component = "proxy",
            "Request body is not a JSON object, forwarding defaults only"
        ),
        Err(e) => warn!(
            subsystem = "gateway",
            component = "proxy",
            error = %e,
            "Request body is not valid JSON, forwarding defaults only"
        ),
    }
    Value::Object(merged)
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Caller headers minus `host`, `content-length`, and hop-by-hop headers,
/// with the content type forced to JSON.
fn upstream_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if name == header::HOST || name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

async fn chat_completion(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, GatewayError> {
    forward(&state, CHAT_COMPLETION_PATH, method, uri, headers, body).await
}

async fn models(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, GatewayError> {
    forward(&state, MODELS_PATH, method, uri, headers, body).await
}

async fn completion(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, GatewayError> {
    forward(&state, COMPLETION_PATH, method, uri, headers, body).await
}

async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "target": state.config.target,
    }))
}

#[instrument(
    skip(state, headers, body),
    fields(subsystem = "gateway", component = "proxy", op = "forward", method = %method, upstream = upstream_path)
)]
async fn forward(
    state: &GatewayState,
    upstream_path: &str,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, GatewayError> {
    let start = Instant::now();

    let mut url = format!("{}{}", state.config.target, upstream_path);
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let merged = merge_defaults(&state.defaults, &body);
    let payload = serde_json::to_vec(&merged)
        .map_err(|e| GatewayError::Upstream(format!("encoding request body: {}", e)))?;
    debug!(url = %url, body_len = payload.len(), "Forwarding request");

    let upstream = state
        .client
        .request(method, &url)
        .headers(upstream_headers(&headers))
        .body(payload)
        .send()
        .await
        .map_err(|e| {
            warn!(url = %url, error = %e, "Upstream request failed");
            GatewayError::Upstream(format!("upstream request failed: {}", e))
        })?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let bytes = upstream.bytes().await.map_err(|e| {
        warn!(url = %url, error = %e, "Reading upstream response failed");
        GatewayError::Upstream(format!("reading upstream response failed: {}", e))
    })?;

    let mut response = (status, Body::from(bytes)).into_response();
    let relayed = response.headers_mut();
    for (name, value) in &upstream_headers {
        if name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }

    info!(
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request forwarded"
    );
    Ok(response)
}
