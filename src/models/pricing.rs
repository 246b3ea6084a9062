use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Global markup percentages. Logical singleton; when the table is empty the
/// service falls back to 0/0 instead of materializing a row.
#[derive(Debug, FromRow)]
pub struct PricingSettingsRow {
    pub store_markup_percent: f64,
    pub route_markup_percent: f64,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
}

#[derive(Debug, FromRow)]
pub struct ProductOverrideRow {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub store_markup_percent: Option<f64>,
    pub route_markup_percent: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
}

#[derive(Debug, FromRow)]
pub struct TypeOverrideRow {
    pub id: i64,
    pub product_type_id: i64,
    pub product_type_name: String,
    pub store_markup_percent: Option<f64>,
    pub route_markup_percent: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
}

/// Projection of a product row as the backfill job sees it.
#[derive(Debug, FromRow)]
pub struct BackfillCandidate {
    pub id: i64,
    pub product_type_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub cost_of_goods: Option<f64>,
    pub store_price: f64,
    pub route_price: f64,
}
