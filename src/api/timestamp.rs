/// Timestamp authority endpoint
use crate::{
    context::AppContext,
    envelope::SignedTimestamp,
    error::{DropsError, DropsResult},
};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

/// Build timestamp routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/sign-timestamp", post(sign_timestamp))
}

#[derive(Debug, Deserialize)]
struct SignTimestampRequest {
    hash: String,
}

#[derive(Debug, Serialize)]
struct SignTimestampResponse {
    success: bool,
    timestamp: SignedTimestamp,
}

async fn sign_timestamp(
    State(ctx): State<AppContext>,
    Json(request): Json<SignTimestampRequest>,
) -> DropsResult<Json<SignTimestampResponse>> {
    let signer = ctx.timestamp_signer.as_ref().ok_or_else(|| {
        DropsError::Internal("Timestamp signing is not configured on this instance".to_string())
    })?;

    let timestamp = signer.sign(&request.hash)?;
    Ok(Json(SignTimestampResponse {
        success: true,
        timestamp,
    }))
}
