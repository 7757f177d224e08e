use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::contract::ContractError;
use crate::state::AppState;

mod claims;
mod distributions;
mod resolve;

pub fn router(state: AppState) -> Router {
    // Browser front end is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let api_router = Router::new()
        .merge(resolve::router())
        .merge(distributions::router())
        .merge(claims::router())
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let response = HealthResponse {
        status: "live",
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    let latest_block = state
        .contract
        .block_number()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let confirmation_timeout_ms =
        u64::try_from(state.settings.confirmation.timeout.as_millis()).unwrap_or(u64::MAX);

    let response = ReadyResponse {
        status: "ready",
        latest_block,
        confirmation_timeout_ms,
        ownership_sessions: state.sessions.entry_count(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    latest_block: u64,
    confirmation_timeout_ms: u64,
    ownership_sessions: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<ContractError> for HttpError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::NoRecipients | ContractError::InvalidAmount(_) => {
                Self::bad_request(err.to_string())
            }
            ContractError::WriteFailed { .. } | ContractError::ReadFailed { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!(status = %self.status, "HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use alloy_primitives::U256;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::amount::parse_ether;
    use crate::config::SessionConfig;
    use crate::contract::ConfirmationPolicy;
    use crate::contract::testing::MockContract;
    use crate::flows::create::CreationLimits;
    use crate::resolver::NameResolver;
    use crate::state::{FlowSettings, OwnershipSessions};

    pub fn test_app(
        contract: Arc<MockContract>,
        resolver: impl NameResolver + 'static,
    ) -> Router {
        let settings = FlowSettings {
            limits: CreationLimits {
                max_total_wei: parse_ether("100").unwrap_or(U256::MAX),
                max_recipients: 50,
            },
            public_origin: "http://localhost:3000".to_string(),
            confirmation: ConfirmationPolicy {
                poll_interval: Duration::from_millis(5),
                timeout: Duration::from_millis(100),
            },
            explorer_tx_url: Some("https://base-sepolia.blockscout.com/tx/".to_string()),
        };
        let sessions = Arc::new(OwnershipSessions::new(&SessionConfig {
            max_capacity: 64,
            ttl_seconds: 60,
        }));
        router(AppState::new(contract, Arc::new(resolver), sessions, settings))
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
