/// API routes and handlers
pub mod gallery;
pub mod images;
pub mod session;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(gallery::routes())
        .merge(images::routes())
        .merge(session::routes())
}
