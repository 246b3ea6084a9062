// src/handlers/pricing.rs
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::dtos::pricing::{
    percent_in_range, BackfillResponse, ProductOverrideResponse, SettingsResponse,
    TypeOverrideResponse, UpdateSettingsRequest, UpsertOverrideRequest,
};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::pricing::{PricingSettingsRow, ProductOverrideRow, TypeOverrideRow};
use crate::services::backfill::{run_backfill, BatchErrorPolicy};
use crate::services::repricing::{reprice_scope, RepricingScope};
use crate::state::AppState;

const ADMIN_ROLE: &str = "admin";

fn require_admin(auth: &AuthContext) -> Result<(), AppError> {
    if auth.role != ADMIN_ROLE {
        return Err(AppError::forbidden("Only administrators can manage pricing"));
    }
    Ok(())
}

fn validate_percent_value(value: f64) -> Result<(), AppError> {
    if !percent_in_range(value) {
        return Err(AppError::validation(
            "Markup percentages must be finite numbers between 0 and 1000",
        ));
    }
    Ok(())
}

fn validate_override_payload(req: &UpsertOverrideRequest) -> Result<(), AppError> {
    for value in [req.store_percent, req.route_percent].into_iter().flatten() {
        validate_percent_value(value)?;
    }
    Ok(())
}

const SETTINGS_SELECT: &str =
    "SELECT store_markup_percent::FLOAT8 AS store_markup_percent,
            route_markup_percent::FLOAT8 AS route_markup_percent,
            updated_at, updated_by
     FROM pricing_settings
     ORDER BY updated_at DESC, id DESC
     LIMIT 1";

const PRODUCT_OVERRIDE_SELECT: &str =
    "SELECT o.id, o.product_id, p.name AS product_name,
            o.store_markup_percent::FLOAT8 AS store_markup_percent,
            o.route_markup_percent::FLOAT8 AS route_markup_percent,
            o.updated_at, o.updated_by
     FROM product_pricing_overrides o
     JOIN products p ON p.id = o.product_id";

const TYPE_OVERRIDE_SELECT: &str =
    "SELECT t.id, t.product_type_id, tp.name AS product_type_name,
            t.store_markup_percent::FLOAT8 AS store_markup_percent,
            t.route_markup_percent::FLOAT8 AS route_markup_percent,
            t.updated_at, t.updated_by
     FROM product_type_pricing_overrides t
     JOIN product_types tp ON tp.id = t.product_type_id";

// ==================== Global settings ====================

// GET /pricing/settings - Current global percentages, zero defaults when unset
#[instrument(skip(state, auth))]
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SettingsResponse>, AppError> {
    require_admin(&auth)?;

    let settings = sqlx::query_as::<_, PricingSettingsRow>(SETTINGS_SELECT)
        .fetch_optional(&state.db_pool)
        .await?;

    Ok(Json(settings.map(SettingsResponse::from).unwrap_or_default()))
}

// PUT /pricing/settings - Upsert the singleton row and reprice the whole catalog
#[instrument(skip(state, auth, req))]
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    require_admin(&auth)?;
    validate_percent_value(req.store_percent)?;
    validate_percent_value(req.route_percent)?;

    let mut tx = state.db_pool.begin().await?;

    // Lock the settings row itself so two simultaneous edits cannot lose an update.
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM pricing_settings ORDER BY id ASC LIMIT 1 FOR UPDATE",
    )
    .fetch_optional(&mut *tx)
    .await?;

    match existing {
        Some(id) => {
            sqlx::query(
                "UPDATE pricing_settings
                 SET store_markup_percent = $1,
                     route_markup_percent = $2,
                     updated_at = NOW(),
                     updated_by = $3
                 WHERE id = $4",
            )
            .bind(req.store_percent)
            .bind(req.route_percent)
            .bind(auth.user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO pricing_settings (store_markup_percent, route_markup_percent, updated_by)
                 VALUES ($1, $2, $3)",
            )
            .bind(req.store_percent)
            .bind(req.route_percent)
            .bind(auth.user_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let repriced = reprice_scope(&mut *tx, RepricingScope::Catalog).await?;

    let settings = sqlx::query_as::<_, PricingSettingsRow>(SETTINGS_SELECT)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(repriced, "Global pricing settings updated");

    Ok(Json(SettingsResponse::from(settings)))
}

// ==================== Per-product overrides ====================

// GET /pricing/overrides - List product overrides, optional name search
#[instrument(skip(state, auth, params))]
pub async fn list_product_overrides(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ProductOverrideResponse>>, AppError> {
    require_admin(&auth)?;

    let search = params
        .get("search")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    let rows = match search {
        Some(term) => {
            sqlx::query_as::<_, ProductOverrideRow>(&format!(
                "{PRODUCT_OVERRIDE_SELECT} WHERE p.name ILIKE $1 ORDER BY p.name"
            ))
            .bind(format!("%{term}%"))
            .fetch_all(&state.db_pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ProductOverrideRow>(&format!(
                "{PRODUCT_OVERRIDE_SELECT} ORDER BY p.name"
            ))
            .fetch_all(&state.db_pool)
            .await?
        }
    };

    Ok(Json(rows.into_iter().map(ProductOverrideResponse::from).collect()))
}

// PUT /pricing/overrides/{product_id} - Upsert and reprice that product
#[instrument(skip(state, auth, req))]
pub async fn upsert_product_override(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<i64>,
    Json(req): Json<UpsertOverrideRequest>,
) -> Result<Json<ProductOverrideResponse>, AppError> {
    require_admin(&auth)?;
    validate_override_payload(&req)?;

    let mut tx = state.db_pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    sqlx::query(
        "INSERT INTO product_pricing_overrides (product_id, store_markup_percent, route_markup_percent, updated_by)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (product_id) DO UPDATE
         SET store_markup_percent = EXCLUDED.store_markup_percent,
             route_markup_percent = EXCLUDED.route_markup_percent,
             updated_by = EXCLUDED.updated_by,
             updated_at = NOW()",
    )
    .bind(product_id)
    .bind(req.store_percent)
    .bind(req.route_percent)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?;

    reprice_scope(&mut *tx, RepricingScope::Product(product_id)).await?;

    let row = sqlx::query_as::<_, ProductOverrideRow>(&format!(
        "{PRODUCT_OVERRIDE_SELECT} WHERE o.product_id = $1"
    ))
    .bind(product_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(ProductOverrideResponse::from(row)))
}

// DELETE /pricing/overrides/{product_id} - Remove the override and reprice
#[instrument(skip(state, auth))]
pub async fn delete_product_override(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_admin(&auth)?;

    let mut tx = state.db_pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    sqlx::query("DELETE FROM product_pricing_overrides WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

    reprice_scope(&mut *tx, RepricingScope::Product(product_id)).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==================== Per-type overrides ====================

// GET /pricing/type-overrides - List type overrides
#[instrument(skip(state, auth))]
pub async fn list_type_overrides(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<TypeOverrideResponse>>, AppError> {
    require_admin(&auth)?;

    let rows = sqlx::query_as::<_, TypeOverrideRow>(&format!(
        "{TYPE_OVERRIDE_SELECT} ORDER BY tp.name"
    ))
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(TypeOverrideResponse::from).collect()))
}

// PUT /pricing/type-overrides/{type_id} - Upsert and reprice the whole type
#[instrument(skip(state, auth, req))]
pub async fn upsert_type_override(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(type_id): Path<i64>,
    Json(req): Json<UpsertOverrideRequest>,
) -> Result<Json<TypeOverrideResponse>, AppError> {
    require_admin(&auth)?;
    validate_override_payload(&req)?;

    let mut tx = state.db_pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM product_types WHERE id = $1")
        .bind(type_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("Product type not found"));
    }

    sqlx::query(
        "INSERT INTO product_type_pricing_overrides (product_type_id, store_markup_percent, route_markup_percent, updated_by)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (product_type_id) DO UPDATE
         SET store_markup_percent = EXCLUDED.store_markup_percent,
             route_markup_percent = EXCLUDED.route_markup_percent,
             updated_by = EXCLUDED.updated_by,
             updated_at = NOW()",
    )
    .bind(type_id)
    .bind(req.store_percent)
    .bind(req.route_percent)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?;

    let repriced = reprice_scope(&mut *tx, RepricingScope::ProductType(type_id)).await?;

    let row = sqlx::query_as::<_, TypeOverrideRow>(&format!(
        "{TYPE_OVERRIDE_SELECT} WHERE t.product_type_id = $1"
    ))
    .bind(type_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(type_id, repriced, "Product type override updated");

    Ok(Json(TypeOverrideResponse::from(row)))
}

// DELETE /pricing/type-overrides/{type_id} - Remove the override and reprice the type
#[instrument(skip(state, auth))]
pub async fn delete_type_override(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(type_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_admin(&auth)?;

    let mut tx = state.db_pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM product_types WHERE id = $1")
        .bind(type_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("Product type not found"));
    }

    sqlx::query("DELETE FROM product_type_pricing_overrides WHERE product_type_id = $1")
        .bind(type_id)
        .execute(&mut *tx)
        .await?;

    reprice_scope(&mut *tx, RepricingScope::ProductType(type_id)).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==================== Backfill ====================

// POST /pricing/backfill?on_error=abort|skip - Seed missing costs and prices
#[instrument(skip(state, auth, params))]
pub async fn run_pricing_backfill(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<BackfillResponse>, AppError> {
    require_admin(&auth)?;

    let policy = match params.get("on_error").map(String::as_str) {
        None | Some("abort") => BatchErrorPolicy::Abort,
        Some("skip") => BatchErrorPolicy::SkipAndReport,
        Some(other) => {
            return Err(AppError::validation(format!("Unknown on_error policy: {other}")))
        }
    };

    let mut tx = state.db_pool.begin().await?;
    let report = run_backfill(&mut *tx, policy).await?;
    tx.commit().await?;

    info!(
        updated = report.updated,
        skipped = report.skipped.len(),
        "Pricing backfill finished"
    );

    Ok(Json(BackfillResponse::from(report)))
}
