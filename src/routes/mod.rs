pub mod pricing;

use axum::Router;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new().merge(pricing::routes())
}
