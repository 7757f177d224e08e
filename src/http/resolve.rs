use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::models::distribution::ResolvedNameView;
use crate::ownership::lowercase_address;
use crate::resolver::ResolveError;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new().route("/resolve-base-name", get(resolve_base_name))
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    id: Option<String>,
}

async fn resolve_base_name(
    Query(query): Query<ResolveQuery>,
    State(state): State<AppState>,
) -> Result<Json<ResolvedNameView>, HttpError> {
    let name = query.id.unwrap_or_default();
    let address = state.resolver.resolve(&name).await.map_err(|err| match err {
        ResolveError::MissingName => HttpError::bad_request("Base name is required"),
        ResolveError::NotFound { .. } => HttpError::new(
            StatusCode::NOT_FOUND,
            "Base name resolution failed".to_string(),
        ),
        ResolveError::Upstream(reason) => {
            error!(name = name.trim(), "Error resolving base name: {reason}");
            HttpError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resolve base name".to_string(),
            )
        }
    })?;

    Ok(Json(ResolvedNameView {
        address: lowercase_address(&address),
    }))
}
