pub mod product;

pub use product::{AnchorCandidate, AnchorProduct, ProductCandidate, ProductId, SemanticHit};
