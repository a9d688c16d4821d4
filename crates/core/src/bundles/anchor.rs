//! Anchor selection from name-matched candidates with a semantic-search fallback.

use crate::domain::product::{AnchorCandidate, ProductId};

use super::rules::AnchorRules;
use super::types::AnchorSource;

/// Trimmed, lower-cased query used by every downstream keyword rule.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorSelector<'a> {
    rules: &'a AnchorRules,
}

impl<'a> AnchorSelector<'a> {
    pub fn new(rules: &'a AnchorRules) -> Self {
        Self { rules }
    }

    /// Popularity and repeat-rate signal, adjusted for how well the name fits the query.
    pub fn score(&self, normalized_query: &str, candidate: &AnchorCandidate) -> f64 {
        let name = candidate.product_name.to_lowercase();
        let mut score = candidate.total_units as f64
            + candidate.reorder_rate * self.rules.reorder_weight
            - name.chars().count() as f64 * self.rules.name_length_penalty;

        if let Some(token) = single_token(normalized_query) {
            if name == token {
                score += self.rules.exact_match_bonus;
            }
            if name == format!("{token}s") {
                score += self.rules.plural_match_bonus;
            }
            if name.starts_with(&format!("{token} ")) {
                score += self.rules.prefix_match_bonus;
            }
        }

        let blocked = self.rules.blocked_terms.iter().filter(|term| name.contains(term.as_str()));
        score - blocked.count() as f64 * self.rules.blocked_term_penalty
    }

    /// Highest-scoring name match (first one wins ties), else the semantic fallback.
    pub fn select(
        &self,
        normalized_query: &str,
        candidates: &[AnchorCandidate],
        semantic_fallback: Option<ProductId>,
    ) -> Option<(ProductId, AnchorSource)> {
        let mut best: Option<(f64, ProductId)> = None;
        for candidate in candidates {
            let score = self.score(normalized_query, candidate);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, candidate.product_id));
            }
        }

        match best {
            Some((_, product_id)) => Some((product_id, AnchorSource::NameMatch)),
            None => semantic_fallback.map(|product_id| (product_id, AnchorSource::SemanticFallback)),
        }
    }
}

fn single_token(normalized_query: &str) -> Option<&str> {
    let mut tokens = normalized_query.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => Some(token),
        _ => None,
    }
}
