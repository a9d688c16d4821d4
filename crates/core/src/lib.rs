//! Promotion bundle recommendations: anchor resolution, add-on scoring, diverse
//! bundle selection and marketing annotation over a pluggable catalog provider.

pub mod bundles;
pub mod config;
pub mod domain;
pub mod errors;

pub use bundles::{
    compose_recommendation, family_key, PromoBundle, PromoDataProvider, PromoEngine,
    PromoRecommendation, PromoRules, PromoStatus, RetrievalLimits,
};
pub use domain::product::{
    AnchorCandidate, AnchorProduct, ProductCandidate, ProductId, SemanticHit,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
