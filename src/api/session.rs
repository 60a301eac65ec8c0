/// Session identity endpoint
///
/// The gallery has no accounts; each browser mints one random id,
/// persists it locally and sends it as `sub_id` on every call.
use crate::context::AppContext;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/session", post(create_session))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
}

/// Mint a fresh user id
async fn create_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: Uuid::new_v4().to_string(),
    })
}
