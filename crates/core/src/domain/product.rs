use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Name-matched product considered as the promotion anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorCandidate {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_units: u64,
    pub reorder_rate: f64,
}

/// Hit returned by the semantic product index. Only the id is used, as a fallback anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub product_id: Option<ProductId>,
    pub text: String,
}

/// Product card of the SKU being promoted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub aisle_id: i64,
    pub department_id: i64,
    pub reorder_rate: f64,
    pub total_units: u64,
    pub total_orders: u64,
}

/// Add-on candidate with its co-purchase affinity to the anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCandidate {
    pub product_id: ProductId,
    pub product_name: String,
    pub department_id: i64,
    pub co_purchase_count: u64,
    pub reorder_rate: f64,
    pub total_units: u64,
}

/// Product bought together with a looked-up product, with the pair's basket count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoPurchase {
    pub product_id: ProductId,
    pub product_name: String,
    pub co_purchase_count: u64,
}

/// Best-selling product of a department, offered when a product has no affinity rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopularProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_units: u64,
    pub reorder_rate: f64,
}

impl AnchorCandidate {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_reorder_rate("anchor_candidate.reorder_rate", self.product_id, self.reorder_rate)
    }
}

impl AnchorProduct {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_reorder_rate("anchor.reorder_rate", self.product_id, self.reorder_rate)
    }
}

impl ProductCandidate {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_reorder_rate("candidate.reorder_rate", self.product_id, self.reorder_rate)
    }
}

impl PopularProduct {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_reorder_rate("popular.reorder_rate", self.product_id, self.reorder_rate)
    }
}

fn validate_reorder_rate(field: &str, product_id: ProductId, value: f64) -> Result<(), DomainError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        return Ok(());
    }

    Err(DomainError::DataContractViolation {
        field: field.to_owned(),
        reason: format!("product {product_id} has reorder_rate {value}, expected 0.0..=1.0"),
    })
}
