// src/services/backfill.rs
//
// Administrative repair pass seeding cost/prices for products that never had
// a cost recorded. Cost sources, in order: the stored cost, supplier order
// history, then reverse-derivation from an existing positive sale price.

use sqlx::PgConnection;
use tracing::warn;

use crate::error::AppError;
use crate::models::pricing::BackfillCandidate;
use super::pricing::{
    apply_pricing, find_latest_order_cost, resolve_percentages, round_currency, Percentages,
};

/// How the batch reacts to an unexpected per-product failure. Expected
/// missing-cost cases are always recorded as skips regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchErrorPolicy {
    /// Fail the whole run; the enclosing transaction rolls everything back.
    Abort,
    /// Record the product as skipped and keep going.
    SkipAndReport,
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub updated: u64,
    pub skipped: Vec<SkippedProduct>,
}

#[derive(Debug)]
pub struct SkippedProduct {
    pub product_id: i64,
    pub reason: String,
}

pub(crate) const NO_COST_SOURCE: &str =
    "no stored cost, no supplier orders with a cost, and no positive price to derive from";
pub(crate) const NOT_POSITIVE: &str = "derived cost is not a positive amount";

enum Outcome {
    Updated,
    Skipped(&'static str),
}

fn reverse_derive(price: f64, percent: f64) -> Option<f64> {
    let divisor = 1.0 + percent / 100.0;
    if price > 0.0 && divisor > 0.0 {
        Some(round_currency(price / divisor))
    } else {
        None
    }
}

/// The ordered fallback chain. Pure so the chain is testable on its own;
/// `order_cost` is only consulted when no stored cost exists, mirroring the
/// lookup the caller performs.
pub(crate) fn derive_cost(
    stored: Option<f64>,
    order_cost: Option<f64>,
    store_price: f64,
    route_price: f64,
    percentages: Percentages,
) -> Result<f64, &'static str> {
    let mut cost = stored.filter(|c| c.is_finite());
    if cost.is_none() {
        cost = order_cost.filter(|c| c.is_finite());
    }
    if cost.is_none() {
        cost = reverse_derive(store_price, percentages.store);
    }
    if cost.is_none() {
        cost = reverse_derive(route_price, percentages.route);
    }

    match cost {
        None => Err(NO_COST_SOURCE),
        Some(c) if !c.is_finite() || c <= 0.0 => Err(NOT_POSITIVE),
        Some(c) => Ok(c),
    }
}

async fn backfill_product(
    conn: &mut PgConnection,
    candidate: &BackfillCandidate,
) -> Result<Outcome, AppError> {
    let percentages =
        resolve_percentages(&mut *conn, Some(candidate.id), candidate.product_type_id).await?;

    let order_cost = if candidate.cost_of_goods.is_none() {
        find_latest_order_cost(
            &mut *conn,
            candidate.id,
            candidate.product_type_id,
            candidate.brand_id,
            candidate.model_id,
        )
        .await?
    } else {
        None
    };

    match derive_cost(
        candidate.cost_of_goods,
        order_cost,
        candidate.store_price,
        candidate.route_price,
        percentages,
    ) {
        Ok(cost) => {
            apply_pricing(&mut *conn, candidate.id, Some(cost)).await?;
            Ok(Outcome::Updated)
        }
        Err(reason) => Ok(Outcome::Skipped(reason)),
    }
}

/// Walk every product and seed cost/prices where a cost can be established.
/// Idempotent: a second run over unchanged data recomputes the same values.
/// The report is returned to the operator, never discarded.
pub async fn run_backfill(
    conn: &mut PgConnection,
    policy: BatchErrorPolicy,
) -> Result<BackfillReport, AppError> {
    let candidates = sqlx::query_as::<_, BackfillCandidate>(
        "SELECT id, product_type_id, brand_id, model_id,
                cost_of_goods::FLOAT8 AS cost_of_goods,
                store_price::FLOAT8   AS store_price,
                route_price::FLOAT8   AS route_price
         FROM products
         ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut report = BackfillReport::default();

    for candidate in candidates {
        match backfill_product(&mut *conn, &candidate).await {
            Ok(Outcome::Updated) => report.updated += 1,
            Ok(Outcome::Skipped(reason)) => report.skipped.push(SkippedProduct {
                product_id: candidate.id,
                reason: reason.to_string(),
            }),
            Err(err) => match policy {
                BatchErrorPolicy::Abort => return Err(err),
                BatchErrorPolicy::SkipAndReport => {
                    warn!(product_id = candidate.id, error = ?err, "Backfill failed for product, continuing");
                    report.skipped.push(SkippedProduct {
                        product_id: candidate.id,
                        reason: format!("unexpected error: {err:?}"),
                    });
                }
            },
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(store: f64, route: f64) -> Percentages {
        Percentages { store, route }
    }

    #[test]
    fn stored_cost_wins_over_every_fallback() {
        let cost = derive_cost(Some(75.0), Some(50.0), 110.0, 55.0, pct(10.0, 10.0));
        assert_eq!(cost, Ok(75.0));
    }

    #[test]
    fn order_history_is_used_when_no_cost_is_stored() {
        let cost = derive_cost(None, Some(50.0), 110.0, 55.0, pct(10.0, 10.0));
        assert_eq!(cost, Ok(50.0));
    }

    #[test]
    fn reverse_derives_from_a_positive_store_price() {
        // storePrice 110 at 10% markup backs out to a cost of 100.00.
        let cost = derive_cost(None, None, 110.0, 0.0, pct(10.0, 5.0));
        assert_eq!(cost, Ok(100.0));
    }

    #[test]
    fn reverse_derives_from_route_price_when_store_price_is_not_positive() {
        let cost = derive_cost(None, None, 0.0, 52.5, pct(10.0, 5.0));
        assert_eq!(cost, Ok(50.0));
    }

    #[test]
    fn skips_when_no_source_yields_a_cost() {
        let cost = derive_cost(None, None, 0.0, 0.0, pct(10.0, 5.0));
        assert_eq!(cost, Err(NO_COST_SOURCE));
    }

    #[test]
    fn zero_stored_cost_is_skipped_rather_than_rederived() {
        // A recorded cost of zero blocks the fallback chain and fails the
        // positivity check instead of silently pulling in order history.
        let cost = derive_cost(Some(0.0), Some(50.0), 110.0, 55.0, pct(10.0, 10.0));
        assert_eq!(cost, Err(NOT_POSITIVE));
    }

    #[test]
    fn negative_stored_cost_is_rejected() {
        let cost = derive_cost(Some(-4.0), None, 0.0, 0.0, pct(10.0, 10.0));
        assert_eq!(cost, Err(NOT_POSITIVE));
    }
}
