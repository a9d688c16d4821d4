//! Scoring for add-on candidates and add-on pairs

use crate::domain::product::{AnchorProduct, ProductCandidate};

use super::family::FamilyClassifier;
use super::rules::{BundleRules, CandidateRules};
use super::types::{Bundle, ScoredCandidate};

/// Scores a single add-on against the anchor and the shopper's query.
#[derive(Debug, Clone, Copy)]
pub struct CandidateScorer<'a> {
    rules: &'a CandidateRules,
}

impl<'a> CandidateScorer<'a> {
    pub fn new(rules: &'a CandidateRules) -> Self {
        Self { rules }
    }

    pub fn score(&self, anchor: &AnchorProduct, candidate: &ProductCandidate, query: &str) -> f64 {
        let capped_units = candidate.total_units.min(self.rules.units_cap) as f64;
        let mut score = candidate.co_purchase_count as f64
            + candidate.reorder_rate * self.rules.reorder_weight
            + capped_units / self.rules.units_divisor;

        // Same-department add-ons (dairy with dairy) convert well.
        if candidate.department_id == anchor.department_id {
            score += self.rules.same_department_boost;
        }

        let query = query.to_lowercase();
        let name = candidate.product_name.to_lowercase();
        for penalty in &self.rules.intent_penalties {
            let asked_for = penalty.intent_keywords.iter().any(|keyword| query.contains(keyword.as_str()));
            if name.contains(penalty.product_keyword.as_str()) && !asked_for {
                score -= penalty.penalty;
            }
        }

        score
    }

    /// Scores the pool (capped at `pool_limit`), sorts best-first and keeps `keep`.
    /// The sort is stable, so equal scores keep provider order.
    pub fn rank(
        &self,
        anchor: &AnchorProduct,
        candidates: &[ProductCandidate],
        query: &str,
        families: FamilyClassifier<'_>,
        pool_limit: usize,
        keep: usize,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .take(pool_limit)
            .map(|candidate| ScoredCandidate {
                score: self.score(anchor, candidate, query),
                family: families.family_key(&candidate.product_name),
                candidate: candidate.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(keep);
        scored
    }
}

/// Combines two candidate scores with a synergy term.
#[derive(Debug, Clone, Copy)]
pub struct BundleScorer<'a> {
    rules: &'a BundleRules,
}

impl<'a> BundleScorer<'a> {
    pub fn new(rules: &'a BundleRules) -> Self {
        Self { rules }
    }

    pub fn pair_score(&self, first: &ScoredCandidate, second: &ScoredCandidate) -> f64 {
        // No add-on to add-on affinity is available, so the weaker anchor affinity stands in.
        let synergy = self.rules.synergy_weight
            * first.candidate.co_purchase_count.min(second.candidate.co_purchase_count) as f64;
        first.score + second.score + synergy
    }

    /// Every i<j pair with distinct families, best-first; ties keep enumeration order.
    pub fn enumerate_pairs(&self, anchor: &AnchorProduct, ranked: &[ScoredCandidate]) -> Vec<Bundle> {
        let mut pairs = Vec::new();

        for i in 0..ranked.len() {
            for j in (i + 1)..ranked.len() {
                let (first, second) = (&ranked[i], &ranked[j]);
                if first.family == second.family {
                    continue;
                }

                pairs.push(Bundle {
                    anchor_id: anchor.product_id,
                    add_ons: [first.candidate.clone(), second.candidate.clone()],
                    pair_score: self.pair_score(first, second),
                });
            }
        }

        pairs.sort_by(|a, b| b.pair_score.total_cmp(&a.pair_score));
        pairs
    }
}
