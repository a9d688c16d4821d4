//! Rebuild of the feature tables the catalog provider reads.

use serde::Serialize;
use tracing::{info, warn};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeatureRebuild {
    pub source_lines: u64,
    pub velocity_rows: u64,
    pub affinity_rows: u64,
}

/// Recomputes `feat_sku_velocity` and `feat_basket_affinity` from order lines.
///
/// Units are counted as order lines, orders as distinct orders, and the reorder
/// rate is the mean of the `reordered` flag. Affinity counts baskets holding
/// both products. With no order lines the existing feature rows are left alone,
/// so a seeded demo catalog survives a rebuild on an empty order history.
pub async fn rebuild(pool: &DbPool) -> Result<FeatureRebuild, RepositoryError> {
    let mut tx = pool.begin().await?;

    let source_lines: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM order_products").fetch_one(&mut *tx).await?;
    if source_lines == 0 {
        tx.rollback().await?;
        warn!(
            event_name = "features.rebuild.skipped",
            "no order lines found, feature tables left unchanged"
        );
        return Ok(FeatureRebuild::default());
    }

    sqlx::query("DELETE FROM feat_basket_affinity").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM feat_sku_velocity").execute(&mut *tx).await?;

    let velocity = sqlx::query(
        "INSERT INTO feat_sku_velocity (product_id, total_units, total_orders, reorder_rate)
         SELECT product_id,
                COUNT(*),
                COUNT(DISTINCT order_id),
                CAST(AVG(reordered) AS REAL)
         FROM order_products
         GROUP BY product_id",
    )
    .execute(&mut *tx)
    .await?;

    let affinity = sqlx::query(
        "INSERT INTO feat_basket_affinity (product_id_a, product_id_b, co_purchase_count)
         SELECT a.product_id, b.product_id, COUNT(*)
         FROM order_products a
         JOIN order_products b
           ON a.order_id = b.order_id AND a.product_id < b.product_id
         GROUP BY a.product_id, b.product_id",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let report = FeatureRebuild {
        source_lines: source_lines.unsigned_abs(),
        velocity_rows: velocity.rows_affected(),
        affinity_rows: affinity.rows_affected(),
    };
    info!(
        event_name = "features.rebuild.completed",
        source_lines = report.source_lines,
        velocity_rows = report.velocity_rows,
        affinity_rows = report.affinity_rows,
        "feature tables rebuilt"
    );
    Ok(report)
}
