//! Recommendation pipeline.
//!
//! `compose_recommendation` is the pure part: validate provider rows, rank the
//! add-on pool, enumerate family-distinct pairs, pick disjoint bundles, annotate
//! and render. `PromoEngine` resolves the anchor and loads candidates through a
//! [`PromoDataProvider`] before handing off to it.

use std::collections::HashSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use crate::domain::product::{AnchorProduct, ProductCandidate, ProductId};
use crate::errors::{ApplicationError, DomainError};

use super::anchor::{normalize_query, AnchorSelector};
use super::annotate::PromoAnnotator;
use super::family::FamilyClassifier;
use super::provider::PromoDataProvider;
use super::render::{
    insufficient_candidates_text, no_candidates_text, render_recommendation, NO_ANCHOR_TEXT,
};
use super::rules::PromoRules;
use super::scoring::{BundleScorer, CandidateScorer};
use super::selection::select_diverse;
use super::types::{
    AnchorSource, BundleItem, CandidateTrace, PromoBundle, PromoRecommendation, PromoStatus,
    PromoTrace,
};

/// How many rows to request from the provider for anchor lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrievalLimits {
    pub anchor_search_limit: usize,
    pub semantic_fallback_k: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self { anchor_search_limit: 25, semantic_fallback_k: 15 }
    }
}

pub fn compose_recommendation(
    query: &str,
    anchor: Option<&AnchorProduct>,
    candidates: &[ProductCandidate],
    rules: &PromoRules,
) -> Result<PromoRecommendation, DomainError> {
    let normalized_query = normalize_query(query);
    let mut trace = PromoTrace {
        normalized_query: normalized_query.clone(),
        anchor_product_id: anchor.map(|anchor| anchor.product_id),
        candidate_count: candidates.len(),
        ..PromoTrace::default()
    };

    let Some(anchor) = anchor else {
        return Ok(fallback(query, None, PromoStatus::NoAnchorFound, NO_ANCHOR_TEXT.to_owned(), trace));
    };
    anchor.validate()?;
    validate_candidates(candidates)?;

    if candidates.is_empty() {
        let text = no_candidates_text(&anchor.product_name);
        return Ok(fallback(query, Some(anchor), PromoStatus::NoCandidatesFound, text, trace));
    }

    let selection = rules.selection;
    let families = FamilyClassifier::new(&rules.family);
    let ranked = CandidateScorer::new(&rules.candidate).rank(
        anchor,
        candidates,
        &normalized_query,
        families,
        selection.candidate_pool_limit,
        selection.top_candidates,
    );
    trace.top_candidates = ranked
        .iter()
        .map(|entry| CandidateTrace {
            product_id: entry.candidate.product_id,
            product_name: entry.candidate.product_name.clone(),
            score: entry.score,
            family: entry.family.clone(),
        })
        .collect();

    let pairs = BundleScorer::new(&rules.bundle).enumerate_pairs(anchor, &ranked);
    trace.pair_count = pairs.len();

    let selected = select_diverse(&pairs, selection.max_bundles);
    if selected.is_empty() {
        let text = insufficient_candidates_text(&anchor.product_name);
        return Ok(fallback(
            query,
            Some(anchor),
            PromoStatus::InsufficientDiverseCandidates,
            text,
            trace,
        ));
    }

    let annotator = PromoAnnotator::new(&rules.annotation);
    let bundles: Vec<PromoBundle> = selected
        .iter()
        .enumerate()
        .map(|(index, bundle)| {
            let annotation = annotator.annotate(anchor, bundle);
            PromoBundle {
                rank: index + 1,
                bundle_score: round_one_decimal(bundle.pair_score),
                theme: annotation.theme,
                offer: annotation.offer,
                confidence: annotation.confidence,
                expected_impact: annotation.expected_impact,
                placement: annotation.placement,
                anchor: anchor.clone(),
                add_ons: [BundleItem::from(&bundle.add_ons[0]), BundleItem::from(&bundle.add_ons[1])],
            }
        })
        .collect();

    let result_text = render_recommendation(anchor, &bundles);

    Ok(PromoRecommendation {
        query: query.to_owned(),
        status: PromoStatus::Bundles,
        anchor: Some(anchor.clone()),
        bundles,
        result_text,
        trace,
    })
}

fn fallback(
    query: &str,
    anchor: Option<&AnchorProduct>,
    status: PromoStatus,
    result_text: String,
    trace: PromoTrace,
) -> PromoRecommendation {
    PromoRecommendation {
        query: query.to_owned(),
        status,
        anchor: anchor.cloned(),
        bundles: Vec::new(),
        result_text,
        trace,
    }
}

fn validate_candidates(candidates: &[ProductCandidate]) -> Result<(), DomainError> {
    let mut seen: HashSet<ProductId> = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        candidate.validate()?;
        if !seen.insert(candidate.product_id) {
            return Err(DomainError::DataContractViolation {
                field: "candidate.product_id".to_owned(),
                reason: format!("product {} appears more than once", candidate.product_id),
            });
        }
    }
    Ok(())
}

/// Half-to-even on the exact binary value, so 6.25 becomes 6.2 and 20418.66 becomes 20418.7.
fn round_one_decimal(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|exact| exact.round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven))
        .and_then(|rounded| rounded.to_f64())
        .unwrap_or(value)
}

/// Resolves the anchor and candidate pool through a provider, then runs the pipeline.
pub struct PromoEngine<P> {
    provider: P,
    rules: PromoRules,
    limits: RetrievalLimits,
}

impl<P: PromoDataProvider> PromoEngine<P> {
    pub fn new(provider: P, rules: PromoRules, limits: RetrievalLimits) -> Self {
        Self { provider, rules, limits }
    }

    pub fn rules(&self) -> &PromoRules {
        &self.rules
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn recommend(&self, query: &str) -> Result<PromoRecommendation, ApplicationError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(DomainError::InvalidQuery("query must not be empty".to_owned()).into());
        }

        let resolved = self.resolve_anchor(query, &normalized).await?;
        let candidates = match &resolved.anchor {
            Some(anchor) => {
                self.provider
                    .fetch_co_purchase_candidates(
                        anchor.product_id,
                        self.rules.selection.candidate_pool_limit,
                    )
                    .await?
            }
            None => Vec::new(),
        };

        let mut recommendation =
            compose_recommendation(query, resolved.anchor.as_ref(), &candidates, &self.rules)?;
        recommendation.trace.anchor_candidate_count = resolved.candidate_count;
        recommendation.trace.anchor_source = resolved.source;

        debug!(
            event_name = "promo.engine.pairs_ranked",
            candidate_count = recommendation.trace.candidate_count,
            pair_count = recommendation.trace.pair_count,
            "bundle pairs ranked"
        );
        info!(
            event_name = "promo.engine.completed",
            status = ?recommendation.status,
            bundle_count = recommendation.bundles.len(),
            "promotion recommendation composed"
        );

        Ok(recommendation)
    }

    /// Name match first; the semantic index is consulted only when no name
    /// matches, and then only its top hit counts. A top hit without a product
    /// id, or a selected id without a product card, leaves the anchor unresolved.
    pub(crate) async fn resolve_anchor(
        &self,
        query: &str,
        normalized: &str,
    ) -> Result<ResolvedAnchor, ApplicationError> {
        let anchor_candidates = self
            .provider
            .resolve_anchor_candidates(normalized, self.limits.anchor_search_limit)
            .await?;
        for candidate in &anchor_candidates {
            candidate.validate()?;
        }

        let semantic_fallback = if anchor_candidates.is_empty() {
            let hits = self.provider.semantic_search(query, self.limits.semantic_fallback_k).await?;
            hits.first().and_then(|hit| hit.product_id)
        } else {
            None
        };

        let selected = AnchorSelector::new(&self.rules.anchor).select(
            normalized,
            &anchor_candidates,
            semantic_fallback,
        );
        let Some((product_id, source)) = selected else {
            return Ok(ResolvedAnchor::unresolved(anchor_candidates.len()));
        };

        let Some(card) = self.provider.fetch_product_card(product_id).await? else {
            warn!(
                event_name = "promo.engine.anchor_card_missing",
                product_id = product_id.0,
                "selected anchor has no product card"
            );
            return Ok(ResolvedAnchor::unresolved(anchor_candidates.len()));
        };

        info!(
            event_name = "promo.engine.anchor_resolved",
            product_id = card.product_id.0,
            product_name = %card.product_name,
            source = ?source,
            "anchor resolved"
        );
        Ok(ResolvedAnchor {
            anchor: Some(card),
            source: Some(source),
            candidate_count: anchor_candidates.len(),
        })
    }
}

pub(crate) struct ResolvedAnchor {
    pub(crate) anchor: Option<AnchorProduct>,
    pub(crate) source: Option<AnchorSource>,
    pub(crate) candidate_count: usize,
}

impl ResolvedAnchor {
    fn unresolved(candidate_count: usize) -> Self {
        Self { anchor: None, source: None, candidate_count }
    }
}
