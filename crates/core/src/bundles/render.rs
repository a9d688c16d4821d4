//! Plain-text rendering of a recommendation.

use crate::domain::product::AnchorProduct;

use super::types::{BundleItem, PromoBundle};

pub const NO_ANCHOR_TEXT: &str =
    "Could not identify an anchor product for promotion. Try a different query.";

const RATIONALE: [&str; 4] = [
    "- High co-purchase counts indicate strong basket association (easy upsell).",
    "- High reorder rates imply repeat buying behavior (sticky categories).",
    "- Higher unit volume suggests better promo impact.",
    "- Bundles are diversified to avoid repeating similar add-on items.",
];

pub fn no_candidates_text(anchor_name: &str) -> String {
    format!("Anchor: {anchor_name}. No bundle candidates found in affinity table.")
}

pub fn insufficient_candidates_text(anchor_name: &str) -> String {
    format!("Anchor: {anchor_name}. Not enough unique candidates to form 3 bundles.")
}

/// Multi-line anchor summary used in the recommendation header.
pub fn anchor_card_text(anchor: &AnchorProduct) -> String {
    format!(
        "Product ID: {}\nName: {}\nAisle ID: {} | Department ID: {}\n\
         Demand: total_units={}, total_orders={}, reorder_rate={:.3}\n\
         Use: Retail catalog item (SKU) with demand signals for ranking and recommendations.",
        anchor.product_id,
        anchor.product_name,
        anchor.aisle_id,
        anchor.department_id,
        anchor.total_units,
        anchor.total_orders,
        anchor.reorder_rate,
    )
}

/// Score lines print `bundle_score` as stored, so text and structured output agree.
pub fn render_recommendation(anchor: &AnchorProduct, bundles: &[PromoBundle]) -> String {
    let mut lines: Vec<String> = vec![
        "Promotion Recommendation (Top 3 Bundles)".to_owned(),
        String::new(),
        "Anchor SKU:".to_owned(),
        anchor_card_text(anchor),
        String::new(),
        "Top 3 promo bundles (Anchor + 2 items):".to_owned(),
    ];

    for bundle in bundles {
        lines.push(format!("{}. Bundle Score={:.1}", bundle.rank, bundle.bundle_score));
        lines.push(format!("   Theme: {}", bundle.theme));
        lines.push(format!("   Offer: {}", bundle.offer));
        lines.push(format!("   Confidence: {}", bundle.confidence));
        lines.push(format!("   Expected impact: {}", bundle.expected_impact));
        lines.push(format!("   Placement: {}", bundle.placement.join(", ")));
        lines.push(format!("   - {} (Anchor)", anchor.product_name));
        for add_on in &bundle.add_ons {
            lines.push(add_on_line(add_on));
        }
        lines.push(String::new());
    }

    lines.push("Why these bundles work:".to_owned());
    lines.extend(RATIONALE.iter().map(|line| (*line).to_owned()));
    lines.join("\n")
}

fn add_on_line(item: &BundleItem) -> String {
    format!(
        "   - {} (affinity={}, rr={:.3}, units={})",
        item.product_name, item.co_purchase_count, item.reorder_rate, item.total_units
    )
}
