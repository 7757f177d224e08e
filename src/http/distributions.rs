use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::amount::format_ether;
use crate::contract::DistributionInfo;
use crate::flows::create::{CreationError, CreationFlow, CreationForm, claim_links};
use crate::models::distribution::{CreateDistributionRequest, CreationView, DistributionView};
use crate::ownership::{lowercase_address, parse_wallet_address};
use crate::state::{AppState, FlowSettings};

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/distributions", post(create_distribution))
        .route("/distributions/{distribution_id}", get(get_distribution))
}

async fn create_distribution(
    State(state): State<AppState>,
    Json(request): Json<CreateDistributionRequest>,
) -> Result<Json<CreationView>, HttpError> {
    let creator = parse_wallet_address(&request.creator)
        .map_err(|err| HttpError::bad_request(err.to_string()))?;
    let form = CreationForm {
        total_amount: request.total_amount,
        recipient_count: request.recipient_count,
        base_names: request.base_names,
        verify_base_name: request.verify_base_name,
    };

    let settings = &state.settings;
    let mut flow = CreationFlow::new(
        state.contract.as_ref(),
        settings.confirmation,
        settings.limits,
        &settings.public_origin,
    );
    let outcome = flow.submit(creator, &form).await.map_err(|err| match err {
        CreationError::Invalid(err) => HttpError::bad_request(err.to_string()),
        CreationError::Contract(err) => HttpError::from(err),
    })?;

    let distribution = outcome
        .info
        .as_ref()
        .map(|info| distribution_view(settings, &outcome.distribution_id, info));
    Ok(Json(CreationView {
        explorer_url: settings.explorer_link(&outcome.tx_hash),
        tx_hash: outcome.tx_hash.to_string(),
        distribution_id: outcome.distribution_id,
        stage: outcome.stage,
        claim_links: outcome.claim_links,
        unverified_reason: outcome.unverified_reason,
        distribution,
    }))
}

async fn get_distribution(
    Path(distribution_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DistributionView>, HttpError> {
    let info = state.contract.get_distribution_info(&distribution_id).await?;
    if !info.exists() {
        return Err(HttpError::new(
            StatusCode::NOT_FOUND,
            format!("Distribution {distribution_id} not found"),
        ));
    }
    Ok(Json(distribution_view(&state.settings, &distribution_id, &info)))
}

fn distribution_view(
    settings: &FlowSettings,
    distribution_id: &str,
    info: &DistributionInfo,
) -> DistributionView {
    DistributionView {
        distribution_id: distribution_id.to_string(),
        creator: lowercase_address(&info.creator),
        amount_per_recipient: info.amount_per_recipient.to_string(),
        amount_per_recipient_display: format_ether(info.amount_per_recipient),
        verify_base_name: info.verify_base_name,
        recipient_count: info.recipient_count,
        claim_links: claim_links(
            &settings.public_origin,
            distribution_id,
            info.recipient_count as usize,
        ),
    }
}
