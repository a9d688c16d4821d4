use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Highest applied migration version, if any.
pub async fn current_version(pool: &DbPool) -> Result<Option<i64>, sqlx::Error> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if exists == 0 {
        return Ok(None);
    }

    sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{current_version, run_pending};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const CATALOG_TABLES: &[&str] = &[
        "departments",
        "aisles",
        "products",
        "orders",
        "order_products",
        "feat_sku_velocity",
        "feat_basket_affinity",
    ];

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "departments",
        "aisles",
        "products",
        "orders",
        "order_products",
        "feat_sku_velocity",
        "feat_basket_affinity",
        "idx_products_department_id",
        "idx_order_products_product_id",
        "idx_feat_basket_affinity_product_id_b",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .expect("check table")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_catalog_and_feature_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert_eq!(current_version(&pool).await.expect("version before"), None);

        run_pending(&pool).await.expect("run migrations");

        for table in CATALOG_TABLES {
            assert_eq!(table_count(&pool, table).await, 1, "missing table {table}");
        }
        assert_eq!(current_version(&pool).await.expect("version after"), Some(1));
    }

    #[tokio::test]
    async fn affinity_rows_must_be_ordered() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        sqlx::query("INSERT INTO departments (department_id, department) VALUES (4, 'produce')")
            .execute(&pool)
            .await
            .expect("department");
        sqlx::query("INSERT INTO aisles (aisle_id, aisle) VALUES (24, 'fresh fruits')")
            .execute(&pool)
            .await
            .expect("aisle");
        sqlx::query(
            "INSERT INTO products (product_id, product_name, aisle_id, department_id)
             VALUES (1, 'Banana', 24, 4), (2, 'Limes', 24, 4)",
        )
        .execute(&pool)
        .await
        .expect("products");

        let reversed = sqlx::query(
            "INSERT INTO feat_basket_affinity (product_id_a, product_id_b, co_purchase_count) VALUES (2, 1, 10)",
        )
        .execute(&pool)
        .await;
        assert!(reversed.is_err());
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert_eq!(table_count(&pool, "products").await, 0);
        assert_eq!(table_count(&pool, "feat_basket_affinity").await, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
