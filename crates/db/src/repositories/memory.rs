use std::collections::HashMap;

use tokio::sync::RwLock;

use promobundle_core::bundles::{CoPurchaseProvider, PromoDataProvider};
use promobundle_core::domain::product::{
    AnchorCandidate, AnchorProduct, CoPurchase, PopularProduct, ProductCandidate, ProductId,
    SemanticHit,
};
use promobundle_core::errors::ApplicationError;

use super::catalog::search_tokens;
use crate::fixtures::{ordered_pair, DEMO_AFFINITIES, DEMO_PRODUCTS};

/// Catalog row held by [`InMemoryPromoCatalog`].
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub aisle_id: i64,
    pub department_id: i64,
    pub total_units: u64,
    pub total_orders: u64,
    pub reorder_rate: f64,
}

/// Provider over in-process maps, with the same ordering rules as the SQL catalog.
#[derive(Default)]
pub struct InMemoryPromoCatalog {
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
    affinities: RwLock<HashMap<(ProductId, ProductId), u64>>,
}

impl InMemoryPromoCatalog {
    pub fn demo() -> Self {
        let products = DEMO_PRODUCTS
            .iter()
            .map(|row| {
                let product = CatalogProduct {
                    product_id: ProductId(row.product_id),
                    product_name: row.product_name.to_string(),
                    aisle_id: row.aisle_id,
                    department_id: row.department_id,
                    total_units: row.total_units.unsigned_abs(),
                    total_orders: row.total_orders.unsigned_abs(),
                    reorder_rate: row.reorder_rate,
                };
                (product.product_id, product)
            })
            .collect();
        let affinities = DEMO_AFFINITIES
            .iter()
            .map(|(left, right, count)| {
                let (a, b) = ordered_pair(*left, *right);
                ((ProductId(a), ProductId(b)), count.unsigned_abs())
            })
            .collect();

        Self { products: RwLock::new(products), affinities: RwLock::new(affinities) }
    }

    pub async fn insert_product(&self, product: CatalogProduct) {
        let mut products = self.products.write().await;
        products.insert(product.product_id, product);
    }

    /// Stores a co-purchase count under the ordered pair key, replacing any previous count.
    pub async fn insert_affinity(&self, left: ProductId, right: ProductId, co_purchase_count: u64) {
        let (a, b) = ordered_pair(left.0, right.0);
        let mut affinities = self.affinities.write().await;
        affinities.insert((ProductId(a), ProductId(b)), co_purchase_count);
    }
}

#[async_trait::async_trait]
impl PromoDataProvider for InMemoryPromoCatalog {
    async fn resolve_anchor_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnchorCandidate>, ApplicationError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.products.read().await;
        let mut matches: Vec<&CatalogProduct> = products
            .values()
            .filter(|product| product.product_name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|left, right| {
            right
                .total_units
                .cmp(&left.total_units)
                .then_with(|| right.reorder_rate.total_cmp(&left.reorder_rate))
                .then_with(|| left.product_id.cmp(&right.product_id))
        });

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|product| AnchorCandidate {
                product_id: product.product_id,
                product_name: product.product_name.clone(),
                total_units: product.total_units,
                reorder_rate: product.reorder_rate,
            })
            .collect())
    }

    async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, ApplicationError> {
        let tokens = search_tokens(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.products.read().await;
        let mut scored: Vec<(usize, &CatalogProduct)> = products
            .values()
            .filter_map(|product| {
                let name = product.product_name.to_lowercase();
                let overlap = tokens.iter().filter(|token| name.contains(token.as_str())).count();
                (overlap > 0).then_some((overlap, product))
            })
            .collect();
        scored.sort_by(|(left_overlap, left), (right_overlap, right)| {
            right_overlap
                .cmp(left_overlap)
                .then_with(|| right.total_units.cmp(&left.total_units))
                .then_with(|| left.product_id.cmp(&right.product_id))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, product)| SemanticHit {
                product_id: Some(product.product_id),
                text: product.product_name.clone(),
            })
            .collect())
    }

    async fn fetch_product_card(
        &self,
        product_id: ProductId,
    ) -> Result<Option<AnchorProduct>, ApplicationError> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).map(|product| AnchorProduct {
            product_id: product.product_id,
            product_name: product.product_name.clone(),
            aisle_id: product.aisle_id,
            department_id: product.department_id,
            reorder_rate: product.reorder_rate,
            total_units: product.total_units,
            total_orders: product.total_orders,
        }))
    }

    async fn fetch_co_purchase_candidates(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<ProductCandidate>, ApplicationError> {
        let products = self.products.read().await;
        let affinities = self.affinities.read().await;

        let mut candidates: Vec<ProductCandidate> = affinities
            .iter()
            .filter_map(|((a, b), count)| {
                let other = if *a == product_id {
                    *b
                } else if *b == product_id {
                    *a
                } else {
                    return None;
                };
                products.get(&other).map(|product| ProductCandidate {
                    product_id: product.product_id,
                    product_name: product.product_name.clone(),
                    department_id: product.department_id,
                    co_purchase_count: *count,
                    reorder_rate: product.reorder_rate,
                    total_units: product.total_units,
                })
            })
            .collect();
        candidates.sort_by(|left, right| {
            right
                .co_purchase_count
                .cmp(&left.co_purchase_count)
                .then_with(|| left.product_id.cmp(&right.product_id))
        });
        candidates.truncate(k);

        Ok(candidates)
    }
}

#[async_trait::async_trait]
impl CoPurchaseProvider for InMemoryPromoCatalog {
    async fn fetch_co_purchases(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<CoPurchase>, ApplicationError> {
        let candidates = self.fetch_co_purchase_candidates(product_id, k).await?;
        Ok(candidates
            .into_iter()
            .map(|candidate| CoPurchase {
                product_id: candidate.product_id,
                product_name: candidate.product_name,
                co_purchase_count: candidate.co_purchase_count,
            })
            .collect())
    }

    /// Every stored product carries velocity values, so the whole department is eligible.
    async fn fetch_popular_in_department(
        &self,
        department_id: i64,
        k: usize,
    ) -> Result<Vec<PopularProduct>, ApplicationError> {
        let products = self.products.read().await;
        let mut matches: Vec<&CatalogProduct> =
            products.values().filter(|product| product.department_id == department_id).collect();
        matches.sort_by(|left, right| {
            right
                .reorder_rate
                .total_cmp(&left.reorder_rate)
                .then_with(|| right.total_units.cmp(&left.total_units))
                .then_with(|| left.product_id.cmp(&right.product_id))
        });

        Ok(matches
            .into_iter()
            .take(k)
            .map(|product| PopularProduct {
                product_id: product.product_id,
                product_name: product.product_name.clone(),
                total_units: product.total_units,
                reorder_rate: product.reorder_rate,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use promobundle_core::bundles::{
        CoPurchaseProvider, CoPurchaseStatus, PromoDataProvider, PromoEngine, PromoRules, PromoStatus,
        RetrievalLimits,
    };
    use promobundle_core::domain::product::ProductId;

    use super::{CatalogProduct, InMemoryPromoCatalog};
    use crate::repositories::SqlPromoCatalog;
    use crate::{connect_with_settings, fixtures, migrations};

    #[tokio::test]
    async fn demo_catalog_mirrors_sql_ordering() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        fixtures::seed_demo_catalog(&pool).await.expect("seed");
        let sql = SqlPromoCatalog::new(pool);
        let memory = InMemoryPromoCatalog::demo();

        for query in ["banana", "organic", "milk", "avocado"] {
            assert_eq!(
                memory.resolve_anchor_candidates(query, 25).await.expect("memory anchors"),
                sql.resolve_anchor_candidates(query, 25).await.expect("sql anchors"),
                "anchor order for {query}",
            );
        }
        for anchor in [24852, 47209, 47626, 33000] {
            assert_eq!(
                memory.fetch_co_purchase_candidates(ProductId(anchor), 12).await.expect("memory"),
                sql.fetch_co_purchase_candidates(ProductId(anchor), 12).await.expect("sql"),
                "candidates for {anchor}",
            );
        }
        assert_eq!(
            memory.semantic_search("hass avocados", 5).await.expect("memory search"),
            sql.semantic_search("hass avocados", 5).await.expect("sql search"),
        );
        for anchor in [24852, 19660] {
            assert_eq!(
                memory.fetch_co_purchases(ProductId(anchor), 10).await.expect("memory"),
                sql.fetch_co_purchases(ProductId(anchor), 10).await.expect("sql"),
                "co-purchases for {anchor}",
            );
        }
        for department in [4, 16, 7] {
            assert_eq!(
                memory.fetch_popular_in_department(department, 10).await.expect("memory"),
                sql.fetch_popular_in_department(department, 10).await.expect("sql"),
                "popular items in department {department}",
            );
        }
    }

    #[tokio::test]
    async fn inserted_rows_become_visible() {
        let catalog = InMemoryPromoCatalog::default();
        catalog
            .insert_product(CatalogProduct {
                product_id: ProductId(7),
                product_name: "Honeycrisp Apple".to_string(),
                aisle_id: 24,
                department_id: 4,
                total_units: 10,
                total_orders: 9,
                reorder_rate: 0.5,
            })
            .await;
        catalog
            .insert_product(CatalogProduct {
                product_id: ProductId(3),
                product_name: "Peanut Butter".to_string(),
                aisle_id: 88,
                department_id: 13,
                total_units: 4,
                total_orders: 4,
                reorder_rate: 0.25,
            })
            .await;
        catalog.insert_affinity(ProductId(7), ProductId(3), 42).await;

        let card = catalog.fetch_product_card(ProductId(7)).await.expect("card").expect("present");
        assert_eq!(card.total_orders, 9);

        let candidates =
            catalog.fetch_co_purchase_candidates(ProductId(3), 5).await.expect("candidates");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id, ProductId(7));
        assert_eq!(candidates[0].co_purchase_count, 42);
    }

    #[tokio::test]
    async fn avocado_query_yields_cooking_bundles() {
        let engine =
            PromoEngine::new(InMemoryPromoCatalog::demo(), PromoRules::default(), RetrievalLimits::default());

        let recommendation = engine.recommend("  Organic Hass AVOCADO ").await.expect("recommend");
        assert_eq!(recommendation.status, PromoStatus::Bundles);
        assert_eq!(recommendation.anchor.map(|anchor| anchor.product_id), Some(ProductId(47209)));
        assert!(!recommendation.bundles.is_empty());
        assert!(recommendation.bundles.iter().all(|bundle| bundle.anchor.product_id == ProductId(47209)));
    }

    #[tokio::test]
    async fn banana_lookup_lists_co_purchases() {
        let engine =
            PromoEngine::new(InMemoryPromoCatalog::demo(), PromoRules::default(), RetrievalLimits::default());

        let report = engine.co_purchases("banana").await.expect("lookup");
        assert_eq!(report.status, CoPurchaseStatus::CoPurchases);
        assert_eq!(report.co_purchases.len(), 10);
        assert!(report.alternatives.is_empty());
        assert!(report
            .result_text
            .contains("- Bag of Organic Bananas (co_purchase_count=41000)"));
    }
}
