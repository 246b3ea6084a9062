use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use crate::handlers::pricing::{
    delete_product_override, delete_type_override, get_settings, list_product_overrides,
    list_type_overrides, run_pricing_backfill, update_settings, upsert_product_override,
    upsert_type_override,
};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pricing/settings", get(get_settings).put(update_settings))
        .route("/pricing/overrides", get(list_product_overrides))
        .route(
            "/pricing/overrides/{product_id}",
            put(upsert_product_override).delete(delete_product_override),
        )
        .route("/pricing/type-overrides", get(list_type_overrides))
        .route(
            "/pricing/type-overrides/{type_id}",
            put(upsert_type_override).delete(delete_type_override),
        )
        .route("/pricing/backfill", post(run_pricing_backfill))
        .layer(middleware::from_fn(require_auth))
}
