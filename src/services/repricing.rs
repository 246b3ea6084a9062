// src/services/repricing.rs
use sqlx::PgConnection;

use crate::error::AppError;
use super::pricing::apply_pricing;

/// Which products a settings or override change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepricingScope {
    /// A global settings write: every product.
    Catalog,
    /// A type override upsert/delete: every product of that type.
    ProductType(i64),
    /// A product override upsert/delete: just that product.
    Product(i64),
}

/// Re-run the application engine for every product in scope, reusing each
/// product's stored cost. Runs inside the caller's transaction, which also
/// carries the triggering settings/override write, so the whole fan-out
/// commits or rolls back as one unit. The ids are collected first and then
/// replayed sequentially; no ordering invariant exists across products.
pub async fn reprice_scope(conn: &mut PgConnection, scope: RepricingScope) -> Result<u64, AppError> {
    let product_ids: Vec<i64> = match scope {
        RepricingScope::Catalog => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM products")
                .fetch_all(&mut *conn)
                .await?
        }
        RepricingScope::ProductType(type_id) => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE product_type_id = $1")
                .bind(type_id)
                .fetch_all(&mut *conn)
                .await?
        }
        RepricingScope::Product(product_id) => vec![product_id],
    };

    for product_id in &product_ids {
        apply_pricing(&mut *conn, *product_id, None).await?;
    }

    Ok(product_ids.len() as u64)
}
