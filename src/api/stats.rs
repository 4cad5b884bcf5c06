/// Batched stats endpoints: the caller's vote and follow state
use crate::{
    context::AppContext,
    error::{DropsError, DropsResult},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build stats routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/get-stats", get(get_stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    /// `likes` or `following`
    #[serde(rename = "type")]
    kind: String,
    address: String,
    /// Comma-separated message hashes (likes)
    hashes: Option<String>,
    /// Comma-separated addresses (following)
    users: Option<String>,
}

fn split_list(raw: Option<&str>, name: &str) -> DropsResult<Vec<String>> {
    let raw = raw.ok_or_else(|| {
        DropsError::Validation(format!("Missing required parameter: {}", name))
    })?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

async fn get_stats(
    State(ctx): State<AppContext>,
    Query(params): Query<StatsParams>,
) -> DropsResult<Json<serde_json::Value>> {
    let address = params.address.to_lowercase();

    match params.kind.as_str() {
        "likes" => {
            let hashes = split_list(params.hashes.as_deref(), "hashes")?;
            let likes = ctx.social.get_likes(&address, &hashes).await?;
            Ok(Json(json!({ "success": true, "likes": likes })))
        }
        "following" => {
            let users: Vec<String> = split_list(params.users.as_deref(), "users")?
                .into_iter()
                .map(|u| u.to_lowercase())
                .collect();
            let following = ctx.social.get_following(&address, &users).await?;
            Ok(Json(json!({ "success": true, "following": following })))
        }
        other => Err(DropsError::Validation(format!(
            "Unknown stats type: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        let list = split_list(Some("0xa, 0xb,,0xc"), "hashes").unwrap();
        assert_eq!(list, vec!["0xa", "0xb", "0xc"]);
        assert!(split_list(None, "hashes").is_err());
        assert!(split_list(Some(""), "hashes").unwrap().is_empty());
    }
}
