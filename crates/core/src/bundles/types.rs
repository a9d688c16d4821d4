//! Types for the bundle pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::{AnchorProduct, ProductCandidate, ProductId};

/// Candidate with its relevance score and family bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: ProductCandidate,
    pub score: f64,
    pub family: String,
}

/// Anchor plus two family-distinct add-ons.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub anchor_id: ProductId,
    pub add_ons: [ProductCandidate; 2],
    pub pair_score: f64,
}

impl Bundle {
    /// Weaker of the two co-purchase counts; drives offer, confidence and impact.
    pub fn min_affinity(&self) -> u64 {
        self.add_ons[0].co_purchase_count.min(self.add_ons[1].co_purchase_count)
    }

    pub fn add_on_ids(&self) -> [ProductId; 2] {
        [self.add_ons[0].product_id, self.add_ons[1].product_id]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketing metadata attached to a selected bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoAnnotation {
    pub theme: String,
    pub offer: String,
    pub confidence: Confidence,
    pub expected_impact: String,
    pub placement: Vec<String>,
}

/// Add-on as exposed in the structured response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub co_purchase_count: u64,
    pub reorder_rate: f64,
    pub total_units: u64,
}

impl From<&ProductCandidate> for BundleItem {
    fn from(candidate: &ProductCandidate) -> Self {
        Self {
            product_id: candidate.product_id,
            product_name: candidate.product_name.clone(),
            co_purchase_count: candidate.co_purchase_count,
            reorder_rate: candidate.reorder_rate,
            total_units: candidate.total_units,
        }
    }
}

/// Ranked, annotated bundle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoBundle {
    pub rank: usize,
    /// Pair score rounded to one decimal.
    pub bundle_score: f64,
    pub theme: String,
    pub offer: String,
    pub confidence: Confidence,
    pub expected_impact: String,
    pub placement: Vec<String>,
    pub anchor: AnchorProduct,
    pub add_ons: [BundleItem; 2],
}

/// How a request ended. Everything other than `Bundles` is an expected "no data" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoStatus {
    Bundles,
    NoAnchorFound,
    NoCandidatesFound,
    InsufficientDiverseCandidates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSource {
    NameMatch,
    SemanticFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrace {
    pub product_id: ProductId,
    pub product_name: String,
    pub score: f64,
    pub family: String,
}

/// Intermediate pipeline state, returned to callers that ask for debug output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromoTrace {
    pub normalized_query: String,
    pub anchor_candidate_count: usize,
    pub anchor_source: Option<AnchorSource>,
    pub anchor_product_id: Option<ProductId>,
    pub candidate_count: usize,
    pub top_candidates: Vec<CandidateTrace>,
    pub pair_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoRecommendation {
    pub query: String,
    pub status: PromoStatus,
    pub anchor: Option<AnchorProduct>,
    pub bundles: Vec<PromoBundle>,
    pub result_text: String,
    pub trace: PromoTrace,
}
