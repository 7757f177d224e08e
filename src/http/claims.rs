use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::amount::format_ether;
use crate::flows::claim::{ClaimError, ClaimFlow};
use crate::models::distribution::{
    ChallengeView, ClaimOutcomeView, ClaimView, OwnershipView, VerifyOwnershipRequest,
    WalletRequest,
};
use crate::ownership::{OwnershipError, lowercase_address, parse_wallet_address};
use crate::resolver::ResolveError;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/claims/{distribution_id}/{index}",
            get(get_claim).post(claim_share),
        )
        .route(
            "/claims/{distribution_id}/{index}/challenge",
            post(request_challenge),
        )
        .route(
            "/claims/{distribution_id}/{index}/verify",
            post(verify_ownership),
        )
}

impl From<ClaimError> for HttpError {
    fn from(err: ClaimError) -> Self {
        let status = match err {
            ClaimError::Contract(inner) => return HttpError::from(inner),
            ClaimError::DistributionNotFound | ClaimError::IndexOutOfRange { .. } => {
                StatusCode::NOT_FOUND
            }
            ClaimError::NotLoaded => StatusCode::INTERNAL_SERVER_ERROR,
            ClaimError::AlreadyClaimed => StatusCode::CONFLICT,
            ClaimError::WalletNotAuthorized { .. } => StatusCode::FORBIDDEN,
            ClaimError::SignatureRequired
            | ClaimError::Ownership(OwnershipError::SignerMismatch { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            ClaimError::Ownership(_) => StatusCode::BAD_REQUEST,
            ClaimError::Resolution(ResolveError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ClaimError::Resolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        HttpError::new(status, err.to_string())
    }
}

async fn load_flow<'a>(
    state: &'a AppState,
    distribution_id: &str,
    index: u64,
) -> Result<ClaimFlow<'a>, HttpError> {
    let mut flow = ClaimFlow::new(
        state.contract.as_ref(),
        state.resolver.as_ref(),
        state.settings.confirmation,
        distribution_id,
        index,
    );
    flow.load().await?;
    Ok(flow)
}

async fn get_claim(
    Path((distribution_id, index)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<ClaimView>, HttpError> {
    let flow = load_flow(&state, &distribution_id, index).await?;
    let slot = flow.slot().ok_or(ClaimError::NotLoaded)?;
    Ok(Json(ClaimView {
        distribution_id: slot.distribution_id.clone(),
        recipient_index: slot.recipient_index,
        base_name: slot.base_name.clone(),
        claimed: slot.claimed,
        verify_base_name: slot.info.verify_base_name,
        expected_address: slot.expected_address.as_ref().map(lowercase_address),
        amount_per_recipient: slot.info.amount_per_recipient.to_string(),
        amount_per_recipient_display: format_ether(slot.info.amount_per_recipient),
        creator: lowercase_address(&slot.info.creator),
        stage: flow.stage(),
    }))
}

async fn request_challenge(
    Path((distribution_id, index)): Path<(String, u64)>,
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> Result<Json<ChallengeView>, HttpError> {
    let wallet = parse_wallet_address(&request.wallet_address).map_err(ClaimError::from)?;
    let mut flow = load_flow(&state, &distribution_id, index).await?;
    let message = flow.request_signature(&wallet)?;
    Ok(Json(ChallengeView {
        wallet_address: lowercase_address(&wallet),
        message,
    }))
}

async fn verify_ownership(
    Path((distribution_id, index)): Path<(String, u64)>,
    State(state): State<AppState>,
    Json(request): Json<VerifyOwnershipRequest>,
) -> Result<Json<OwnershipView>, HttpError> {
    let wallet = parse_wallet_address(&request.wallet_address).map_err(ClaimError::from)?;
    let mut flow = load_flow(&state, &distribution_id, index).await?;
    flow.verify_signature(&wallet, &request.signature)?;

    let session = state.sessions.record(&distribution_id, index, &wallet).await;
    info!(%distribution_id, index, %wallet, "Wallet ownership verified");
    Ok(Json(OwnershipView {
        wallet_address: lowercase_address(&wallet),
        verified: true,
        verified_at: session.verified_at,
        expires_at: session.expires_at,
    }))
}

async fn claim_share(
    Path((distribution_id, index)): Path<(String, u64)>,
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> Result<Json<ClaimOutcomeView>, HttpError> {
    let wallet = parse_wallet_address(&request.wallet_address).map_err(ClaimError::from)?;
    let mut flow = load_flow(&state, &distribution_id, index).await?;
    if state
        .sessions
        .is_verified(&distribution_id, index, &wallet)
        .await
    {
        flow.mark_signature_verified();
    }

    let outcome = flow.claim(&wallet).await?;
    state.sessions.invalidate(&distribution_id, index, &wallet).await;

    Ok(Json(ClaimOutcomeView {
        distribution_id,
        recipient_index: index,
        tx_hash: outcome.tx_hash.to_string(),
        explorer_url: state.settings.explorer_link(&outcome.tx_hash),
        stage: flow.stage(),
        status: outcome.status,
    }))
}
