/// User lookup endpoints
use crate::{
    context::AppContext,
    db::models::UserRecord,
    error::{DropsError, DropsResult},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/get-user", get(get_user))
        .route("/api/get-last-message-hash", get(get_last_message_hash))
}

#[derive(Debug, Deserialize)]
struct AddressParams {
    address: String,
}

#[derive(Debug, Serialize)]
struct GetUserResponse {
    success: bool,
    user: UserRecord,
}

async fn get_user(
    State(ctx): State<AppContext>,
    Query(params): Query<AddressParams>,
) -> DropsResult<Json<GetUserResponse>> {
    let address = params.address.to_lowercase();
    let user = ctx
        .users
        .get_user(&address)
        .await?
        .ok_or_else(|| DropsError::NotFound(format!("User not found: {}", address)))?;

    Ok(Json(GetUserResponse {
        success: true,
        user,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LastHashResponse {
    success: bool,
    last_hash: String,
}

/// Unknown users get the genesis hash so clients can build their first
/// message without a special case
async fn get_last_message_hash(
    State(ctx): State<AppContext>,
    Query(params): Query<AddressParams>,
) -> DropsResult<Json<LastHashResponse>> {
    let last_hash = ctx
        .users
        .get_last_hash(&params.address.to_lowercase())
        .await?;

    Ok(Json(LastHashResponse {
        success: true,
        last_hash,
    }))
}
