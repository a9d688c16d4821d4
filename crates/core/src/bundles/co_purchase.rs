//! Frequently-bought-together lookup for a single product, with a same-department
//! popularity fallback when the product has no affinity rows.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::product::{AnchorProduct, CoPurchase, PopularProduct};
use crate::errors::{ApplicationError, DomainError};

use super::anchor::normalize_query;
use super::engine::PromoEngine;
use super::provider::CoPurchaseProvider;
use super::render::anchor_card_text;

pub const CO_PURCHASE_LIMIT: usize = 10;

pub const NO_MATCH_TEXT: &str =
    "No matching products found. Try a different query (e.g., 'banana', 'yogurt', 'almond milk').";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoPurchaseStatus {
    CoPurchases,
    PopularAlternatives,
    NoAnchorFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoPurchaseReport {
    pub query: String,
    pub status: CoPurchaseStatus,
    pub anchor: Option<AnchorProduct>,
    pub co_purchases: Vec<CoPurchase>,
    pub alternatives: Vec<PopularProduct>,
    pub result_text: String,
}

/// `alternatives` is only consulted when `co_purchases` is empty.
pub fn compose_co_purchase_report(
    query: &str,
    anchor: Option<&AnchorProduct>,
    mut co_purchases: Vec<CoPurchase>,
    mut alternatives: Vec<PopularProduct>,
) -> Result<CoPurchaseReport, DomainError> {
    let Some(anchor) = anchor else {
        return Ok(CoPurchaseReport {
            query: query.to_owned(),
            status: CoPurchaseStatus::NoAnchorFound,
            anchor: None,
            co_purchases: Vec::new(),
            alternatives: Vec::new(),
            result_text: NO_MATCH_TEXT.to_owned(),
        });
    };
    anchor.validate()?;

    co_purchases.truncate(CO_PURCHASE_LIMIT);
    let status = if co_purchases.is_empty() {
        alternatives.truncate(CO_PURCHASE_LIMIT);
        for alternative in &alternatives {
            alternative.validate()?;
        }
        CoPurchaseStatus::PopularAlternatives
    } else {
        alternatives.clear();
        CoPurchaseStatus::CoPurchases
    };

    let result_text = render_co_purchases(anchor, &co_purchases, &alternatives);
    Ok(CoPurchaseReport {
        query: query.to_owned(),
        status,
        anchor: Some(anchor.clone()),
        co_purchases,
        alternatives,
        result_text,
    })
}

pub fn render_co_purchases(
    anchor: &AnchorProduct,
    co_purchases: &[CoPurchase],
    alternatives: &[PopularProduct],
) -> String {
    let mut lines = vec![
        "Chosen product (after intent + canonical matching):".to_owned(),
        anchor_card_text(anchor),
        String::new(),
        format!(
            "Frequently bought together (based on basket affinity) for product_id={}:",
            anchor.product_id
        ),
    ];

    if co_purchases.is_empty() {
        lines.push("- No strong co-purchase pairs found in affinity table.".to_owned());
        lines.push(String::new());
        lines.push(format!(
            "Popular alternatives in the same department (department_id={}):",
            anchor.department_id
        ));
        lines.extend(alternatives.iter().map(|item| {
            format!(
                "- {} (reorder_rate={:.3}, units={})",
                item.product_name, item.reorder_rate, item.total_units
            )
        }));
    } else {
        lines.extend(co_purchases.iter().map(|item| {
            format!("- {} (co_purchase_count={})", item.product_name, item.co_purchase_count)
        }));
    }

    lines.join("\n")
}

impl<P: CoPurchaseProvider> PromoEngine<P> {
    /// Resolves the product the same way `recommend` resolves its anchor, then
    /// lists what shares its baskets.
    pub async fn co_purchases(&self, query: &str) -> Result<CoPurchaseReport, ApplicationError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(DomainError::InvalidQuery("query must not be empty".to_owned()).into());
        }

        let resolved = self.resolve_anchor(query, &normalized).await?;
        let Some(anchor) = resolved.anchor else {
            return Ok(compose_co_purchase_report(query, None, Vec::new(), Vec::new())?);
        };

        let provider = self.provider();
        let co_purchases = provider.fetch_co_purchases(anchor.product_id, CO_PURCHASE_LIMIT).await?;
        let alternatives = if co_purchases.is_empty() {
            provider.fetch_popular_in_department(anchor.department_id, CO_PURCHASE_LIMIT).await?
        } else {
            Vec::new()
        };

        let report = compose_co_purchase_report(query, Some(&anchor), co_purchases, alternatives)?;
        info!(
            event_name = "promo.co_purchases.completed",
            product_id = anchor.product_id.0,
            status = ?report.status,
            co_purchase_count = report.co_purchases.len(),
            alternative_count = report.alternatives.len(),
            "co-purchase lookup composed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::bundles::provider::PromoDataProvider;
    use crate::bundles::{PromoRules, RetrievalLimits};
    use crate::domain::product::{AnchorCandidate, ProductCandidate, ProductId, SemanticHit};

    fn eggs() -> AnchorProduct {
        AnchorProduct {
            product_id: ProductId(19660),
            product_name: "Large Grade AA Eggs".to_owned(),
            aisle_id: 86,
            department_id: 16,
            reorder_rate: 0.74,
            total_units: 52_000,
            total_orders: 52_000,
        }
    }

    fn co_purchase(id: i64, name: &str, count: u64) -> CoPurchase {
        CoPurchase { product_id: ProductId(id), product_name: name.to_owned(), co_purchase_count: count }
    }

    fn popular(id: i64, name: &str, units: u64, rate: f64) -> PopularProduct {
        PopularProduct {
            product_id: ProductId(id),
            product_name: name.to_owned(),
            total_units: units,
            reorder_rate: rate,
        }
    }

    #[test]
    fn co_purchases_are_listed_after_the_product_card() {
        let report = compose_co_purchase_report(
            "eggs",
            Some(&eggs()),
            vec![co_purchase(24852, "Banana", 9_000), co_purchase(27845, "Organic Whole Milk", 4_100)],
            vec![popular(1940, "Organic 2% Reduced Fat Milk", 35_663, 0.79)],
        )
        .expect("compose");

        assert_eq!(report.status, CoPurchaseStatus::CoPurchases);
        assert!(report.alternatives.is_empty());
        let lines: Vec<&str> = report.result_text.lines().collect();
        assert_eq!(lines[0], "Chosen product (after intent + canonical matching):");
        assert_eq!(lines[1], "Product ID: 19660");
        assert_eq!(lines[7], "Frequently bought together (based on basket affinity) for product_id=19660:");
        assert_eq!(lines[8], "- Banana (co_purchase_count=9000)");
        assert_eq!(lines[9], "- Organic Whole Milk (co_purchase_count=4100)");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn empty_affinity_falls_back_to_department_favourites() {
        let report = compose_co_purchase_report(
            "eggs",
            Some(&eggs()),
            Vec::new(),
            vec![popular(27845, "Organic Whole Milk", 137_905, 0.83)],
        )
        .expect("compose");

        assert_eq!(report.status, CoPurchaseStatus::PopularAlternatives);
        let tail: Vec<&str> = report.result_text.lines().skip(8).collect();
        assert_eq!(
            tail,
            vec![
                "- No strong co-purchase pairs found in affinity table.",
                "",
                "Popular alternatives in the same department (department_id=16):",
                "- Organic Whole Milk (reorder_rate=0.830, units=137905)",
            ]
        );
    }

    #[test]
    fn missing_anchor_gives_no_match_text() {
        let report = compose_co_purchase_report("kale", None, Vec::new(), Vec::new()).expect("compose");
        assert_eq!(report.status, CoPurchaseStatus::NoAnchorFound);
        assert_eq!(report.result_text, NO_MATCH_TEXT);
    }

    #[test]
    fn bad_alternative_rate_breaks_the_contract() {
        let error = compose_co_purchase_report(
            "eggs",
            Some(&eggs()),
            Vec::new(),
            vec![popular(1, "Mystery Milk", 10, 2.0)],
        )
        .expect_err("rate above one");
        assert!(matches!(
            error,
            DomainError::DataContractViolation { ref field, .. } if field == "popular.reorder_rate"
        ));
    }

    struct DairyShelf {
        co_purchases: Vec<CoPurchase>,
        popular_calls: AtomicUsize,
    }

    #[async_trait]
    impl PromoDataProvider for DairyShelf {
        async fn resolve_anchor_candidates(
            &self,
            query: &str,
            _limit: usize,
        ) -> Result<Vec<AnchorCandidate>, ApplicationError> {
            let anchor = eggs();
            Ok(if anchor.product_name.to_lowercase().contains(query) {
                vec![AnchorCandidate {
                    product_id: anchor.product_id,
                    product_name: anchor.product_name,
                    total_units: anchor.total_units,
                    reorder_rate: anchor.reorder_rate,
                }]
            } else {
                Vec::new()
            })
        }

        async fn semantic_search(&self, _query: &str, _k: usize) -> Result<Vec<SemanticHit>, ApplicationError> {
            Ok(Vec::new())
        }

        async fn fetch_product_card(
            &self,
            product_id: ProductId,
        ) -> Result<Option<AnchorProduct>, ApplicationError> {
            Ok(Some(eggs()).filter(|anchor| anchor.product_id == product_id))
        }

        async fn fetch_co_purchase_candidates(
            &self,
            _product_id: ProductId,
            _k: usize,
        ) -> Result<Vec<ProductCandidate>, ApplicationError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl CoPurchaseProvider for DairyShelf {
        async fn fetch_co_purchases(
            &self,
            _product_id: ProductId,
            k: usize,
        ) -> Result<Vec<CoPurchase>, ApplicationError> {
            Ok(self.co_purchases.iter().take(k).cloned().collect())
        }

        async fn fetch_popular_in_department(
            &self,
            department_id: i64,
            _k: usize,
        ) -> Result<Vec<PopularProduct>, ApplicationError> {
            self.popular_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(department_id, 16);
            Ok(vec![popular(27845, "Organic Whole Milk", 137_905, 0.83)])
        }
    }

    fn engine(co_purchases: Vec<CoPurchase>) -> PromoEngine<DairyShelf> {
        PromoEngine::new(
            DairyShelf { co_purchases, popular_calls: AtomicUsize::new(0) },
            PromoRules::default(),
            RetrievalLimits::default(),
        )
    }

    #[tokio::test]
    async fn affinity_rows_skip_the_popularity_query() {
        let engine = engine(vec![co_purchase(24852, "Banana", 9_000)]);
        let report = engine.co_purchases(" EGGS ").await.expect("lookup");

        assert_eq!(report.status, CoPurchaseStatus::CoPurchases);
        assert_eq!(report.anchor.map(|anchor| anchor.product_id), Some(ProductId(19660)));
        assert_eq!(engine.provider().popular_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_affinity_rows_query_the_department() {
        let engine = engine(Vec::new());
        let report = engine.co_purchases("eggs").await.expect("lookup");

        assert_eq!(report.status, CoPurchaseStatus::PopularAlternatives);
        assert_eq!(report.alternatives.len(), 1);
        assert_eq!(engine.provider().popular_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_product_and_blank_query() {
        let engine = engine(Vec::new());
        let report = engine.co_purchases("xylophone").await.expect("lookup");
        assert_eq!(report.status, CoPurchaseStatus::NoAnchorFound);

        let error = engine.co_purchases("  ").await.expect_err("blank");
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidQuery(_))));
    }
}
