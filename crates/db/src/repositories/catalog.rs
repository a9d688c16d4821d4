use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use promobundle_core::bundles::{CoPurchaseProvider, PromoDataProvider};
use promobundle_core::domain::product::{
    AnchorCandidate, AnchorProduct, CoPurchase, PopularProduct, ProductCandidate, ProductId,
    SemanticHit,
};
use promobundle_core::errors::ApplicationError;

use super::RepositoryError;
use crate::DbPool;

/// Upper bound on query tokens used by the lexical product search.
const MAX_SEARCH_TOKENS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CatalogStats {
    pub products: u64,
    pub affinity_pairs: u64,
}

/// Catalog provider over the SQLite feature tables. Products without a velocity
/// row read as never sold (zero units, zero reorder rate).
pub struct SqlPromoCatalog {
    pool: DbPool,
}

impl SqlPromoCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn stats(&self) -> Result<CatalogStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM products) AS products,
                    (SELECT COUNT(*) FROM feat_basket_affinity) AS affinity_pairs",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogStats {
            products: required_count(&row, "products")?,
            affinity_pairs: required_count(&row, "affinity_pairs")?,
        })
    }

    pub async fn find_anchor_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnchorCandidate>, RepositoryError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT p.product_id,
                    p.product_name,
                    COALESCE(f.total_units, 0) AS total_units,
                    CAST(COALESCE(f.reorder_rate, 0.0) AS REAL) AS reorder_rate
             FROM products p
             LEFT JOIN feat_sku_velocity f ON f.product_id = p.product_id
             WHERE p.product_name LIKE ? ESCAPE '\\'
             ORDER BY COALESCE(f.total_units, 0) DESC, COALESCE(f.reorder_rate, 0.0) DESC, p.product_id
             LIMIT ?",
        )
        .bind(format!("%{}%", escape_like(query)))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AnchorCandidate {
                    product_id: ProductId(required_i64(row, "product_id")?),
                    product_name: required_text(row, "product_name")?,
                    total_units: required_count(row, "total_units")?,
                    reorder_rate: required_f64(row, "reorder_rate")?,
                })
            })
            .collect()
    }

    /// Lexical stand-in for a vector index: products ranked by how many query
    /// tokens their name contains, then by unit volume.
    pub async fn search_products(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, RepositoryError> {
        let tokens = search_tokens(query);
        if tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        debug!(event_name = "catalog.search.tokens", tokens = ?tokens, "lexical product search");

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT product_id, product_name FROM (SELECT p.product_id, p.product_name, COALESCE(f.total_units, 0) AS total_units, (");
        for (index, token) in tokens.iter().enumerate() {
            if index > 0 {
                builder.push(" + ");
            }
            builder.push("(CASE WHEN lower(p.product_name) LIKE ");
            builder.push_bind(format!("%{}%", escape_like(token)));
            builder.push(" ESCAPE '\\' THEN 1 ELSE 0 END)");
        }
        builder.push(
            ") AS overlap
             FROM products p
             LEFT JOIN feat_sku_velocity f ON f.product_id = p.product_id)
             WHERE overlap > 0
             ORDER BY overlap DESC, total_units DESC, product_id
             LIMIT ",
        );
        builder.push_bind(limit_param(k));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(SemanticHit {
                    product_id: Some(ProductId(required_i64(row, "product_id")?)),
                    text: required_text(row, "product_name")?,
                })
            })
            .collect()
    }

    pub async fn find_product_card(
        &self,
        product_id: ProductId,
    ) -> Result<Option<AnchorProduct>, RepositoryError> {
        let row = sqlx::query(
            "SELECT p.product_id,
                    p.product_name,
                    p.aisle_id,
                    p.department_id,
                    COALESCE(f.total_units, 0) AS total_units,
                    COALESCE(f.total_orders, 0) AS total_orders,
                    CAST(COALESCE(f.reorder_rate, 0.0) AS REAL) AS reorder_rate
             FROM products p
             LEFT JOIN feat_sku_velocity f ON f.product_id = p.product_id
             WHERE p.product_id = ?",
        )
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(AnchorProduct {
                product_id: ProductId(required_i64(r, "product_id")?),
                product_name: required_text(r, "product_name")?,
                aisle_id: required_i64(r, "aisle_id")?,
                department_id: required_i64(r, "department_id")?,
                reorder_rate: required_f64(r, "reorder_rate")?,
                total_units: required_count(r, "total_units")?,
                total_orders: required_count(r, "total_orders")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn find_co_purchase_candidates(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<ProductCandidate>, RepositoryError> {
        let rows = sqlx::query(
            "WITH pairs AS (
                 SELECT product_id_b AS other_id, co_purchase_count
                 FROM feat_basket_affinity
                 WHERE product_id_a = ?1
                 UNION ALL
                 SELECT product_id_a AS other_id, co_purchase_count
                 FROM feat_basket_affinity
                 WHERE product_id_b = ?1
             )
             SELECT p.product_id,
                    p.product_name,
                    p.department_id,
                    pairs.co_purchase_count AS co_purchase_count,
                    COALESCE(f.total_units, 0) AS total_units,
                    CAST(COALESCE(f.reorder_rate, 0.0) AS REAL) AS reorder_rate
             FROM pairs
             JOIN products p ON p.product_id = pairs.other_id
             LEFT JOIN feat_sku_velocity f ON f.product_id = p.product_id
             ORDER BY pairs.co_purchase_count DESC, p.product_id
             LIMIT ?2",
        )
        .bind(product_id.0)
        .bind(limit_param(k))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProductCandidate {
                    product_id: ProductId(required_i64(row, "product_id")?),
                    product_name: required_text(row, "product_name")?,
                    department_id: required_i64(row, "department_id")?,
                    co_purchase_count: required_count(row, "co_purchase_count")?,
                    reorder_rate: required_f64(row, "reorder_rate")?,
                    total_units: required_count(row, "total_units")?,
                })
            })
            .collect()
    }

    pub async fn find_co_purchases(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<CoPurchase>, RepositoryError> {
        let rows = sqlx::query(
            "WITH pairs AS (
                 SELECT product_id_b AS other_id, co_purchase_count
                 FROM feat_basket_affinity
                 WHERE product_id_a = ?1
                 UNION ALL
                 SELECT product_id_a AS other_id, co_purchase_count
                 FROM feat_basket_affinity
                 WHERE product_id_b = ?1
             )
             SELECT p.product_id, p.product_name, pairs.co_purchase_count AS co_purchase_count
             FROM pairs
             JOIN products p ON p.product_id = pairs.other_id
             ORDER BY pairs.co_purchase_count DESC, p.product_id
             LIMIT ?2",
        )
        .bind(product_id.0)
        .bind(limit_param(k))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CoPurchase {
                    product_id: ProductId(required_i64(row, "product_id")?),
                    product_name: required_text(row, "product_name")?,
                    co_purchase_count: required_count(row, "co_purchase_count")?,
                })
            })
            .collect()
    }

    /// Only products with a velocity row are eligible.
    pub async fn find_popular_in_department(
        &self,
        department_id: i64,
        k: usize,
    ) -> Result<Vec<PopularProduct>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT p.product_id,
                    p.product_name,
                    f.total_units,
                    CAST(f.reorder_rate AS REAL) AS reorder_rate
             FROM feat_sku_velocity f
             JOIN products p ON p.product_id = f.product_id
             WHERE p.department_id = ?
             ORDER BY f.reorder_rate DESC, f.total_units DESC, p.product_id
             LIMIT ?",
        )
        .bind(department_id)
        .bind(limit_param(k))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PopularProduct {
                    product_id: ProductId(required_i64(row, "product_id")?),
                    product_name: required_text(row, "product_name")?,
                    total_units: required_count(row, "total_units")?,
                    reorder_rate: required_f64(row, "reorder_rate")?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl PromoDataProvider for SqlPromoCatalog {
    async fn resolve_anchor_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnchorCandidate>, ApplicationError> {
        Ok(self.find_anchor_candidates(query, limit).await?)
    }

    async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, ApplicationError> {
        Ok(self.search_products(query, k).await?)
    }

    async fn fetch_product_card(
        &self,
        product_id: ProductId,
    ) -> Result<Option<AnchorProduct>, ApplicationError> {
        Ok(self.find_product_card(product_id).await?)
    }

    async fn fetch_co_purchase_candidates(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<ProductCandidate>, ApplicationError> {
        Ok(self.find_co_purchase_candidates(product_id, k).await?)
    }
}

#[async_trait::async_trait]
impl CoPurchaseProvider for SqlPromoCatalog {
    async fn fetch_co_purchases(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<CoPurchase>, ApplicationError> {
        Ok(self.find_co_purchases(product_id, k).await?)
    }

    async fn fetch_popular_in_department(
        &self,
        department_id: i64,
        k: usize,
    ) -> Result<Vec<PopularProduct>, ApplicationError> {
        Ok(self.find_popular_in_department(department_id, k).await?)
    }
}

/// Lower-cased alphanumeric tokens of at least three characters, with a
/// trailing plural "s" dropped, deduplicated in query order.
pub(crate) fn search_tokens(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in query.to_lowercase().split(|ch: char| !ch.is_alphanumeric()) {
        if raw.chars().count() < 3 {
            continue;
        }
        let token = match raw.strip_suffix('s') {
            Some(stem) if stem.chars().count() >= 3 => stem.to_string(),
            _ => raw.to_string(),
        };
        if !tokens.contains(&token) {
            tokens.push(token);
        }
        if tokens.len() == MAX_SEARCH_TOKENS {
            break;
        }
    }
    tokens
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn decode_error(column: &str, error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(format!("column `{column}`: {error}"))
}

fn required_i64(row: &SqliteRow, column: &str) -> Result<i64, RepositoryError> {
    let value: Option<i64> = row.try_get(column).map_err(|e| decode_error(column, e))?;
    value.ok_or_else(|| RepositoryError::Contract {
        field: column.to_string(),
        reason: "required numeric column is NULL".to_string(),
    })
}

fn required_count(row: &SqliteRow, column: &str) -> Result<u64, RepositoryError> {
    let value = required_i64(row, column)?;
    u64::try_from(value).map_err(|_| RepositoryError::Contract {
        field: column.to_string(),
        reason: format!("count must not be negative, got {value}"),
    })
}

fn required_f64(row: &SqliteRow, column: &str) -> Result<f64, RepositoryError> {
    let value: Option<f64> = row.try_get(column).map_err(|e| decode_error(column, e))?;
    value.ok_or_else(|| RepositoryError::Contract {
        field: column.to_string(),
        reason: "required numeric column is NULL".to_string(),
    })
}

fn required_text(row: &SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(|e| decode_error(column, e))
}
