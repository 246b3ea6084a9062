// src/dtos/pricing.rs
use serde::{Deserialize, Serialize};

use crate::models::pricing::{PricingSettingsRow, ProductOverrideRow, TypeOverrideRow};
use crate::services::backfill::BackfillReport;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub store_percent: f64,
    pub route_percent: f64,
}

/// Per-field optional: a null field keeps inheriting from the tier below.
#[derive(Debug, Deserialize)]
pub struct UpsertOverrideRequest {
    pub store_percent: Option<f64>,
    pub route_percent: Option<f64>,
}

// Boundary check applied before any transaction opens.
pub fn percent_in_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1000.0).contains(&value)
}

#[derive(Debug, Default, Serialize)]
pub struct SettingsResponse {
    pub store_markup_percent: f64,
    pub route_markup_percent: f64,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl From<PricingSettingsRow> for SettingsResponse {
    fn from(row: PricingSettingsRow) -> Self {
        Self {
            store_markup_percent: row.store_markup_percent,
            route_markup_percent: row.route_markup_percent,
            updated_at: row.updated_at.map(|dt| dt.to_rfc3339()),
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductOverrideResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub store_markup_percent: Option<f64>,
    pub route_markup_percent: Option<f64>,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl From<ProductOverrideRow> for ProductOverrideResponse {
    fn from(row: ProductOverrideRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            store_markup_percent: row.store_markup_percent,
            route_markup_percent: row.route_markup_percent,
            updated_at: row.updated_at.map(|dt| dt.to_rfc3339()),
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypeOverrideResponse {
    pub id: i64,
    pub product_type_id: i64,
    pub product_type_name: String,
    pub store_markup_percent: Option<f64>,
    pub route_markup_percent: Option<f64>,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl From<TypeOverrideRow> for TypeOverrideResponse {
    fn from(row: TypeOverrideRow) -> Self {
        Self {
            id: row.id,
            product_type_id: row.product_type_id,
            product_type_name: row.product_type_name,
            store_markup_percent: row.store_markup_percent,
            route_markup_percent: row.route_markup_percent,
            updated_at: row.updated_at.map(|dt| dt.to_rfc3339()),
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    pub updated: u64,
    pub skipped: Vec<SkippedProductResponse>,
}

#[derive(Debug, Serialize)]
pub struct SkippedProductResponse {
    pub product_id: i64,
    pub reason: String,
}

impl From<BackfillReport> for BackfillResponse {
    fn from(report: BackfillReport) -> Self {
        Self {
            updated: report.updated,
            skipped: report
                .skipped
                .into_iter()
                .map(|s| SkippedProductResponse {
                    product_id: s.product_id,
                    reason: s.reason,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::percent_in_range;

    #[test]
    fn percent_range_accepts_zero_through_one_thousand() {
        assert!(percent_in_range(0.0));
        assert!(percent_in_range(17.5));
        assert!(percent_in_range(1000.0));
    }

    #[test]
    fn percent_range_rejects_out_of_range_and_non_finite() {
        assert!(!percent_in_range(-0.1));
        assert!(!percent_in_range(1000.1));
        assert!(!percent_in_range(f64::NAN));
        assert!(!percent_in_range(f64::INFINITY));
    }
}
