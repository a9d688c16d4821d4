//! Immutable rule tables driving anchor choice, scoring, selection and annotation.
//!
//! `PromoRules::default()` carries the production constants. Every table is plain
//! data so a caller can inspect it or override individual entries before handing
//! it to the pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::Confidence;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromoRules {
    pub anchor: AnchorRules,
    pub family: FamilyRules,
    pub candidate: CandidateRules,
    pub bundle: BundleRules,
    pub selection: SelectionRules,
    pub annotation: AnnotationRules,
}

/// Weights used to rank name-matched anchor candidates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorRules {
    pub reorder_weight: f64,
    pub name_length_penalty: f64,
    /// Single-token query equals the product name.
    pub exact_match_bonus: f64,
    /// Single-token query plus "s" equals the product name.
    pub plural_match_bonus: f64,
    /// Product name starts with the single-token query followed by a space.
    pub prefix_match_bonus: f64,
    /// Flavor, brand and sub-category terms that make a product a poor anchor.
    pub blocked_terms: Vec<String>,
    pub blocked_term_penalty: f64,
}

impl Default for AnchorRules {
    fn default() -> Self {
        Self {
            reorder_weight: 10_000.0,
            name_length_penalty: 25.0,
            exact_match_bonus: 50_000.0,
            plural_match_bonus: 40_000.0,
            prefix_match_bonus: 15_000.0,
            blocked_terms: owned(&[
                "strawberry",
                "blueberry",
                "peach",
                "vanilla",
                "chocolate",
                "alfresco",
                "stage",
                "baby",
            ]),
            blocked_term_penalty: 12_000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyBucket {
    pub needle: String,
    pub family: String,
}

/// Interchangeability buckets and the normalization fallback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRules {
    /// Checked in order; the first needle contained in the name wins.
    pub buckets: Vec<FamilyBucket>,
    pub stop_words: Vec<String>,
    pub min_token_len: usize,
    pub max_key_len: usize,
    pub fallback_family: String,
}

impl Default for FamilyRules {
    fn default() -> Self {
        let buckets = [
            ("avocado", "avocado"),
            ("banana", "banana"),
            ("milk", "milk"),
            ("yogurt", "yogurt"),
            ("egg", "eggs"),
            ("spinach", "spinach"),
            ("strawberr", "strawberries"),
        ]
        .into_iter()
        .map(|(needle, family)| FamilyBucket { needle: needle.to_owned(), family: family.to_owned() })
        .collect();

        Self {
            buckets,
            stop_words: owned(&[
                "organic", "whole", "reduced", "fat", "free", "range", "large", "grade", "nonfat",
                "lowfat", "greek", "strained", "with", "and", "bag", "of",
            ]),
            min_token_len: 3,
            max_key_len: 30,
            fallback_family: "other".to_owned(),
        }
    }
}

/// Penalizes candidates whose name mentions `product_keyword` unless the query
/// signals interest through one of `intent_keywords`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentPenalty {
    pub product_keyword: String,
    pub intent_keywords: Vec<String>,
    pub penalty: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRules {
    pub reorder_weight: f64,
    pub units_cap: u64,
    pub units_divisor: f64,
    pub same_department_boost: f64,
    pub intent_penalties: Vec<IntentPenalty>,
}

impl Default for CandidateRules {
    fn default() -> Self {
        Self {
            reorder_weight: 200.0,
            units_cap: 5_000,
            units_divisor: 50.0,
            same_department_boost: 5_000.0,
            intent_penalties: vec![IntentPenalty {
                product_keyword: "banana".to_owned(),
                intent_keywords: owned(&["banana", "fruit", "smoothie"]),
                penalty: 4_000.0,
            }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleRules {
    /// Applied to the weaker of the two co-purchase counts.
    pub synergy_weight: f64,
}

impl Default for BundleRules {
    fn default() -> Self {
        Self { synergy_weight: 0.30 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRules {
    pub candidate_pool_limit: usize,
    pub top_candidates: usize,
    pub max_bundles: usize,
}

impl Default for SelectionRules {
    fn default() -> Self {
        Self { candidate_pool_limit: 12, top_candidates: 10, max_bundles: 3 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeScope {
    /// Matched against the anchor product name.
    Anchor,
    /// Matched against the add-on names joined by a space.
    AddOns,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRule {
    pub scope: ThemeScope,
    pub keywords: Vec<String>,
    pub theme: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub min_affinity: u64,
    pub save: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferRules {
    /// Anchors repurchased less often than this get the trial offer.
    pub trial_below_reorder_rate: f64,
    pub trial_offer: String,
    /// Anchors at or above this volume are offered with two add-ons instead of one.
    pub two_add_on_min_units: u64,
    /// Descending by `min_affinity`; stronger natural affinity earns a smaller incentive.
    pub discount_tiers: Vec<DiscountTier>,
    pub fallback_save: Decimal,
}

impl Default for OfferRules {
    fn default() -> Self {
        Self {
            trial_below_reorder_rate: 0.60,
            trial_offer: "BOGO: Buy 1 get 1 50% off (trial driver)".to_owned(),
            two_add_on_min_units: 50_000,
            discount_tiers: vec![
                DiscountTier { min_affinity: 30_000, save: Decimal::from(1) },
                DiscountTier { min_affinity: 10_000, save: Decimal::from(2) },
                DiscountTier { min_affinity: 4_000, save: Decimal::from(3) },
            ],
            fallback_save: Decimal::from(4),
        }
    }
}

impl OfferRules {
    pub fn discount_from_affinity(&self, min_affinity: u64) -> String {
        let save = self
            .discount_tiers
            .iter()
            .find(|tier| min_affinity >= tier.min_affinity)
            .map_or(self.fallback_save, |tier| tier.save);
        format!("Save ${save}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceTier {
    pub min_affinity: u64,
    pub confidence: Confidence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceRules {
    /// Descending by `min_affinity`.
    pub tiers: Vec<ConfidenceTier>,
    pub fallback: Confidence,
}

impl Default for ConfidenceRules {
    fn default() -> Self {
        Self {
            tiers: vec![
                ConfidenceTier { min_affinity: 20_000, confidence: Confidence::High },
                ConfidenceTier { min_affinity: 6_000, confidence: Confidence::Medium },
            ],
            fallback: Confidence::Low,
        }
    }
}

impl ConfidenceRules {
    pub fn promo_confidence(&self, min_affinity: u64) -> Confidence {
        self.tiers
            .iter()
            .find(|tier| min_affinity >= tier.min_affinity)
            .map_or(self.fallback, |tier| tier.confidence)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactCondition {
    LowRepeatAnchor { below_reorder_rate: f64 },
    AffinityAndVolume { min_affinity: u64, min_anchor_units: u64 },
    Affinity { min_affinity: u64 },
    Always,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactRule {
    pub condition: ImpactCondition,
    pub impact: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub theme_keywords: Vec<String>,
    pub surfaces: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRules {
    pub themes: Vec<ThemeRule>,
    pub default_theme: String,
    pub offer: OfferRules,
    pub confidence: ConfidenceRules,
    /// Evaluated in order; the first matching condition wins.
    pub impacts: Vec<ImpactRule>,
    pub placements: Vec<PlacementRule>,
    pub default_placement: Vec<String>,
}

pub const BREAKFAST_SMOOTHIE_THEME: &str = "Healthy Breakfast / Smoothie";
pub const BREAKFAST_ESSENTIALS_THEME: &str = "Breakfast Essentials";
pub const COOKING_THEME: &str = "Fresh Prep / Cooking (Guac & Sides)";
pub const SNACK_THEME: &str = "Snack & Beverage";
pub const DEFAULT_THEME: &str = "Everyday Staples";

impl Default for AnnotationRules {
    fn default() -> Self {
        let theme = |scope, keywords: &[&str], theme: &str| ThemeRule {
            scope,
            keywords: owned(keywords),
            theme: theme.to_owned(),
        };

        Self {
            themes: vec![
                theme(ThemeScope::Anchor, &["yogurt"], BREAKFAST_SMOOTHIE_THEME),
                theme(ThemeScope::Anchor, &["egg"], BREAKFAST_ESSENTIALS_THEME),
                theme(ThemeScope::Anchor, &["avocado"], COOKING_THEME),
                theme(
                    ThemeScope::AddOns,
                    &["avocado", "lime", "lemon", "cilantro", "onion"],
                    COOKING_THEME,
                ),
                theme(
                    ThemeScope::AddOns,
                    &["banana", "strawberr", "blueberr", "raspberr", "spinach", "almond milk"],
                    BREAKFAST_SMOOTHIE_THEME,
                ),
                theme(
                    ThemeScope::AddOns,
                    &["sparkling water", "chips", "cookies", "soda"],
                    SNACK_THEME,
                ),
            ],
            default_theme: DEFAULT_THEME.to_owned(),
            offer: OfferRules::default(),
            confidence: ConfidenceRules::default(),
            impacts: vec![
                ImpactRule {
                    condition: ImpactCondition::LowRepeatAnchor { below_reorder_rate: 0.60 },
                    impact: "Trial driver (increase conversion for low-repeat shoppers)".to_owned(),
                },
                ImpactRule {
                    condition: ImpactCondition::AffinityAndVolume {
                        min_affinity: 20_000,
                        min_anchor_units: 50_000,
                    },
                    impact: "Basket builder (high-likelihood attach; lift AOV)".to_owned(),
                },
                ImpactRule {
                    condition: ImpactCondition::Affinity { min_affinity: 6_000 },
                    impact: "Attach-rate lift (strong pairing; modest discount works)".to_owned(),
                },
                ImpactRule {
                    condition: ImpactCondition::Always,
                    impact: "Discovery assist (bundle helps shoppers find complementary items)"
                        .to_owned(),
                },
            ],
            placements: vec![
                PlacementRule {
                    theme_keywords: owned(&["smoothie", "breakfast"]),
                    surfaces: owned(&[
                        "Cart upsell",
                        "Product detail page (PDP)",
                        "Weekly deals email/app banner",
                    ]),
                },
                PlacementRule {
                    theme_keywords: owned(&["cooking", "prep", "guac"]),
                    surfaces: owned(&["Recipe/meal page", "Cart upsell", "Search results badges"]),
                },
            ],
            default_placement: owned(&["Cart upsell", "PDP", "Home page deal tile"]),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_tiers_shrink_as_affinity_grows() {
        let offer = OfferRules::default();
        assert_eq!(offer.discount_from_affinity(35_000), "Save $1");
        assert_eq!(offer.discount_from_affinity(15_000), "Save $2");
        assert_eq!(offer.discount_from_affinity(5_000), "Save $3");
        assert_eq!(offer.discount_from_affinity(1_000), "Save $4");
    }

    #[test]
    fn discount_tier_boundaries_are_inclusive() {
        let offer = OfferRules::default();
        assert_eq!(offer.discount_from_affinity(30_000), "Save $1");
        assert_eq!(offer.discount_from_affinity(9_999), "Save $3");
        assert_eq!(offer.discount_from_affinity(4_000), "Save $3");
        assert_eq!(offer.discount_from_affinity(0), "Save $4");
    }

    #[test]
    fn confidence_tiers_follow_affinity() {
        let confidence = ConfidenceRules::default();
        assert_eq!(confidence.promo_confidence(25_000), Confidence::High);
        assert_eq!(confidence.promo_confidence(10_000), Confidence::Medium);
        assert_eq!(confidence.promo_confidence(1_000), Confidence::Low);
        assert_eq!(confidence.promo_confidence(20_000), Confidence::High);
        assert_eq!(confidence.promo_confidence(6_000), Confidence::Medium);
    }

    #[test]
    fn fractional_discount_renders_with_cents() {
        let offer = OfferRules {
            discount_tiers: vec![DiscountTier { min_affinity: 0, save: Decimal::new(250, 2) }],
            ..OfferRules::default()
        };
        assert_eq!(offer.discount_from_affinity(10), "Save $2.50");
    }
}
