pub mod anchor;
pub mod annotate;
pub mod co_purchase;
pub mod engine;
pub mod family;
pub mod provider;
pub mod render;
pub mod rules;
pub mod scoring;
pub mod selection;
pub mod types;

pub use anchor::{normalize_query, AnchorSelector};
pub use annotate::PromoAnnotator;
pub use co_purchase::{
    compose_co_purchase_report, CoPurchaseReport, CoPurchaseStatus, CO_PURCHASE_LIMIT,
};
pub use engine::{compose_recommendation, PromoEngine, RetrievalLimits};
pub use family::{family_key, FamilyClassifier};
pub use provider::{CoPurchaseProvider, PromoDataProvider};
pub use rules::PromoRules;
pub use scoring::{BundleScorer, CandidateScorer};
pub use selection::select_diverse;
pub use types::{
    AnchorSource, Bundle, BundleItem, Confidence, PromoAnnotation, PromoBundle,
    PromoRecommendation, PromoStatus, PromoTrace, ScoredCandidate,
};
