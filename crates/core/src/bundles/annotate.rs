//! Marketing metadata for selected bundles

use crate::domain::product::AnchorProduct;

use super::rules::{AnnotationRules, ImpactCondition, ThemeScope};
use super::types::{Bundle, Confidence, PromoAnnotation};

/// Derives theme, offer, confidence, impact and placement from ordered rule tables.
#[derive(Debug, Clone, Copy)]
pub struct PromoAnnotator<'a> {
    rules: &'a AnnotationRules,
}

impl<'a> PromoAnnotator<'a> {
    pub fn new(rules: &'a AnnotationRules) -> Self {
        Self { rules }
    }

    pub fn annotate(&self, anchor: &AnchorProduct, bundle: &Bundle) -> PromoAnnotation {
        let add_on_names =
            [bundle.add_ons[0].product_name.as_str(), bundle.add_ons[1].product_name.as_str()];
        let min_affinity = bundle.min_affinity();
        let theme = self.infer_theme(&anchor.product_name, &add_on_names);

        PromoAnnotation {
            offer: self.suggest_offer(anchor, min_affinity),
            confidence: self.promo_confidence(min_affinity),
            expected_impact: self.expected_impact(anchor, min_affinity),
            placement: self.suggest_placement(&theme),
            theme,
        }
    }

    /// Anchor rules are listed before add-on rules, so an anchor match always wins.
    pub fn infer_theme(&self, anchor_name: &str, add_on_names: &[&str]) -> String {
        let anchor = anchor_name.to_lowercase();
        let items = add_on_names
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| name.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        self.rules
            .themes
            .iter()
            .find(|rule| {
                let haystack = match rule.scope {
                    ThemeScope::Anchor => &anchor,
                    ThemeScope::AddOns => &items,
                };
                rule.keywords.iter().any(|keyword| haystack.contains(keyword.as_str()))
            })
            .map_or_else(|| self.rules.default_theme.clone(), |rule| rule.theme.clone())
    }

    pub fn suggest_offer(&self, anchor: &AnchorProduct, min_affinity: u64) -> String {
        let offer = &self.rules.offer;
        if anchor.reorder_rate < offer.trial_below_reorder_rate {
            return offer.trial_offer.clone();
        }

        let save = offer.discount_from_affinity(min_affinity);
        if anchor.total_units >= offer.two_add_on_min_units {
            format!("Bundle Discount: Buy anchor + 2 add-ons, {save}")
        } else {
            format!("Bundle Discount: Buy anchor + 1 add-on, {save}")
        }
    }

    pub fn promo_confidence(&self, min_affinity: u64) -> Confidence {
        self.rules.confidence.promo_confidence(min_affinity)
    }

    pub fn expected_impact(&self, anchor: &AnchorProduct, min_affinity: u64) -> String {
        self.rules
            .impacts
            .iter()
            .find(|rule| match rule.condition {
                ImpactCondition::LowRepeatAnchor { below_reorder_rate } => {
                    anchor.reorder_rate < below_reorder_rate
                }
                ImpactCondition::AffinityAndVolume { min_affinity: floor, min_anchor_units } => {
                    min_affinity >= floor && anchor.total_units >= min_anchor_units
                }
                ImpactCondition::Affinity { min_affinity: floor } => min_affinity >= floor,
                ImpactCondition::Always => true,
            })
            .map(|rule| rule.impact.clone())
            .unwrap_or_default()
    }

    pub fn suggest_placement(&self, theme: &str) -> Vec<String> {
        let theme = theme.to_lowercase();
        self.rules
            .placements
            .iter()
            .find(|rule| rule.theme_keywords.iter().any(|keyword| theme.contains(keyword.as_str())))
            .map_or_else(|| self.rules.default_placement.clone(), |rule| rule.surfaces.clone())
    }
}
