/// API routes and handlers
pub mod messages;
pub mod stats;
pub mod timestamp;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(messages::routes())
        .merge(users::routes())
        .merge(stats::routes())
        .merge(timestamp::routes())
}
