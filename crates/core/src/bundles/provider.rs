use async_trait::async_trait;

use crate::domain::product::{
    AnchorCandidate, AnchorProduct, CoPurchase, PopularProduct, ProductCandidate, ProductId,
    SemanticHit,
};
use crate::errors::ApplicationError;

/// Catalog reads needed to build a recommendation. Implementations return rows
/// as stored; validation happens in the pipeline.
#[async_trait]
pub trait PromoDataProvider: Send + Sync {
    /// Products whose name contains the normalized query.
    async fn resolve_anchor_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnchorCandidate>, ApplicationError>;

    /// Ranked hits from the product index, used only when name matching finds nothing.
    async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, ApplicationError>;

    async fn fetch_product_card(
        &self,
        product_id: ProductId,
    ) -> Result<Option<AnchorProduct>, ApplicationError>;

    /// Co-purchased products, strongest affinity first.
    async fn fetch_co_purchase_candidates(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<ProductCandidate>, ApplicationError>;
}

/// Reads behind the frequently-bought-together lookup.
#[async_trait]
pub trait CoPurchaseProvider: PromoDataProvider {
    /// Products sharing baskets with `product_id`, highest count first.
    async fn fetch_co_purchases(
        &self,
        product_id: ProductId,
        k: usize,
    ) -> Result<Vec<CoPurchase>, ApplicationError>;

    /// Department products with velocity features, by reorder rate then units.
    async fn fetch_popular_in_department(
        &self,
        department_id: i64,
        k: usize,
    ) -> Result<Vec<PopularProduct>, ApplicationError>;
}
