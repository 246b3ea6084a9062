// src/services/pricing.rs
//
// Pricing core: markup resolution across the three tiers (global settings,
// product-type override, product override), cost lookup from supplier order
// history, and the single place allowed to write store/route prices.

use sqlx::PgConnection;

use crate::error::AppError;

/// Effective markup pair for the two sale channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentages {
    pub store: f64,
    pub route: f64,
}

impl Percentages {
    pub const ZERO: Percentages = Percentages { store: 0.0, route: 0.0 };
}

/// One tier's override row. Each field independently overrides the tier
/// below or, when `None`, lets the inherited value through.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupOverride {
    pub store: Option<f64>,
    pub route: Option<f64>,
}

/// Left-to-right fold over the tiers, lowest precedence first. A tier only
/// replaces the fields it explicitly sets.
pub fn cascade(base: Percentages, tiers: [Option<MarkupOverride>; 2]) -> Percentages {
    tiers.into_iter().flatten().fold(base, |acc, tier| Percentages {
        store: tier.store.unwrap_or(acc.store),
        route: tier.route.unwrap_or(acc.route),
    })
}

/// Round to the smallest currency unit, half away from zero.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compute_prices(cost: f64, percentages: Percentages) -> (f64, f64) {
    (
        round_currency(cost * (1.0 + percentages.store / 100.0)),
        round_currency(cost * (1.0 + percentages.route / 100.0)),
    )
}

// An explicit cost wins over the stored one; a non-finite explicit value is
// treated as absent rather than poisoning the prices.
pub(crate) fn effective_cost(explicit: Option<f64>, stored: Option<f64>) -> Option<f64> {
    explicit.filter(|c| c.is_finite()).or(stored)
}

async fn fetch_global_percentages(conn: &mut PgConnection) -> Result<Percentages, AppError> {
    let row = sqlx::query_as::<_, (f64, f64)>(
        "SELECT store_markup_percent::FLOAT8, route_markup_percent::FLOAT8
         FROM pricing_settings
         ORDER BY updated_at DESC, id DESC
         LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row
        .map(|(store, route)| Percentages { store, route })
        .unwrap_or(Percentages::ZERO))
}

async fn fetch_type_override(
    conn: &mut PgConnection,
    product_type_id: i64,
) -> Result<Option<MarkupOverride>, AppError> {
    let row = sqlx::query_as::<_, (Option<f64>, Option<f64>)>(
        "SELECT store_markup_percent::FLOAT8, route_markup_percent::FLOAT8
         FROM product_type_pricing_overrides
         WHERE product_type_id = $1
         LIMIT 1",
    )
    .bind(product_type_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(store, route)| MarkupOverride { store, route }))
}

async fn fetch_product_override(
    conn: &mut PgConnection,
    product_id: i64,
) -> Result<Option<MarkupOverride>, AppError> {
    let row = sqlx::query_as::<_, (Option<f64>, Option<f64>)>(
        "SELECT store_markup_percent::FLOAT8, route_markup_percent::FLOAT8
         FROM product_pricing_overrides
         WHERE product_id = $1
         LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(store, route)| MarkupOverride { store, route }))
}

/// Resolve the markup pair in effect for a product. Absent rows at any tier
/// are a normal case, not an error; with nothing configured this returns 0/0.
pub async fn resolve_percentages(
    conn: &mut PgConnection,
    product_id: Option<i64>,
    product_type_id: Option<i64>,
) -> Result<Percentages, AppError> {
    let base = fetch_global_percentages(&mut *conn).await?;

    let type_tier = match product_type_id {
        Some(type_id) => fetch_type_override(&mut *conn, type_id).await?,
        None => None,
    };

    let product_tier = match product_id {
        Some(id) => fetch_product_override(&mut *conn, id).await?,
        None => None,
    };

    Ok(cascade(base, [type_tier, product_tier]))
}

/// Latest cost of goods from supplier order history, or `None` when no order
/// carries one. An order matched by exact product id beats a generic order
/// (no product id, matched by type + brand + model with null-safe equality);
/// within each class the most recent order wins.
pub async fn find_latest_order_cost(
    conn: &mut PgConnection,
    product_id: i64,
    product_type_id: Option<i64>,
    brand_id: Option<i64>,
    model_id: Option<i64>,
) -> Result<Option<f64>, AppError> {
    let cost = sqlx::query_scalar::<_, f64>(
        "SELECT cost_of_goods::FLOAT8
         FROM supplier_orders
         WHERE cost_of_goods IS NOT NULL
           AND (
             product_id = $1
             OR (
               product_id IS NULL
               AND product_type_id = $2
               AND brand_id IS NOT DISTINCT FROM $3
               AND model_id IS NOT DISTINCT FROM $4
             )
           )
         ORDER BY product_id IS NOT NULL DESC, order_date DESC
         LIMIT 1",
    )
    .bind(product_id)
    .bind(product_type_id)
    .bind(brand_id)
    .bind(model_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(cost)
}

/// Recompute and persist a product's store/route prices. Must run inside the
/// caller's transaction; the product row is locked for the duration so
/// concurrent applies on the same product serialize.
///
/// With no explicit cost and no stored cost the existing prices are kept
/// as-is, so a percentage-only change cannot zero out a product whose cost
/// was never recorded.
pub async fn apply_pricing(
    conn: &mut PgConnection,
    product_id: i64,
    explicit_cost: Option<f64>,
) -> Result<(), AppError> {
    let row = sqlx::query_as::<_, (Option<f64>, f64, f64, Option<i64>)>(
        "SELECT cost_of_goods::FLOAT8, store_price::FLOAT8, route_price::FLOAT8, product_type_id
         FROM products
         WHERE id = $1
         FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Product not found for repricing"))?;

    let (stored_cost, mut store_price, mut route_price, product_type_id) = row;

    let cost = effective_cost(explicit_cost, stored_cost);
    let percentages = resolve_percentages(&mut *conn, Some(product_id), product_type_id).await?;

    if let Some(cost) = cost {
        (store_price, route_price) = compute_prices(cost, percentages);
    }

    sqlx::query(
        "UPDATE products
         SET store_price = $1,
             route_price = $2,
             cost_of_goods = $3
         WHERE id = $4",
    )
    .bind(store_price)
    .bind(route_price)
    .bind(cost)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(store: f64, route: f64) -> Percentages {
        Percentages { store, route }
    }

    #[test]
    fn cascade_without_tiers_keeps_the_base() {
        assert_eq!(cascade(pct(20.0, 10.0), [None, None]), pct(20.0, 10.0));
        assert_eq!(cascade(Percentages::ZERO, [None, None]), Percentages::ZERO);
    }

    #[test]
    fn product_tier_wins_over_type_tier_and_global() {
        let resolved = cascade(
            pct(20.0, 10.0),
            [
                Some(MarkupOverride { store: Some(30.0), route: Some(15.0) }),
                Some(MarkupOverride { store: Some(50.0), route: Some(25.0) }),
            ],
        );
        assert_eq!(resolved, pct(50.0, 25.0));
    }

    #[test]
    fn each_field_falls_through_independently() {
        let resolved = cascade(
            pct(20.0, 10.0),
            [
                Some(MarkupOverride { store: Some(30.0), route: None }),
                Some(MarkupOverride { store: None, route: Some(5.0) }),
            ],
        );
        // Store still governed by the type tier, route by the product tier.
        assert_eq!(resolved, pct(30.0, 5.0));
    }

    #[test]
    fn empty_override_rows_change_nothing() {
        let resolved = cascade(
            pct(20.0, 10.0),
            [Some(MarkupOverride::default()), Some(MarkupOverride::default())],
        );
        assert_eq!(resolved, pct(20.0, 10.0));
    }

    #[test]
    fn rounding_is_half_up_at_the_boundary() {
        assert_eq!(round_currency(0.005), 0.01);
        assert_eq!(round_currency(99.995 * 1.10), 109.99);
        assert_eq!(round_currency(1.004), 1.0);
        assert_eq!(round_currency(2.0), 2.0);
    }

    #[test]
    fn markup_scenario_across_all_three_tiers() {
        // Global {store: 20, route: 10}, cost 100, no overrides.
        let global = pct(20.0, 10.0);
        assert_eq!(compute_prices(100.0, global), (120.0, 110.0));

        // Type override sets store to 30, route keeps inheriting.
        let with_type = cascade(
            global,
            [Some(MarkupOverride { store: Some(30.0), route: None }), None],
        );
        assert_eq!(compute_prices(100.0, with_type), (130.0, 110.0));

        // Product override sets route to 5 on top; store stays with the type tier.
        let with_product = cascade(
            global,
            [
                Some(MarkupOverride { store: Some(30.0), route: None }),
                Some(MarkupOverride { store: None, route: Some(5.0) }),
            ],
        );
        assert_eq!(compute_prices(100.0, with_product), (130.0, 105.0));
    }

    #[test]
    fn recomputing_from_an_unchanged_cost_is_idempotent() {
        let percentages = pct(17.5, 8.25);
        let first = compute_prices(42.37, percentages);
        let second = compute_prices(42.37, percentages);
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_cost_wins_and_non_finite_values_fall_back() {
        assert_eq!(effective_cost(Some(9.0), Some(12.5)), Some(9.0));
        assert_eq!(effective_cost(None, Some(12.5)), Some(12.5));
        assert_eq!(effective_cost(Some(f64::NAN), Some(12.5)), Some(12.5));
        assert_eq!(effective_cost(None, None), None);
    }
}
