//! Policy parsing and linear secret sharing over AND/OR trees.
pub mod sharing;
pub mod tree;

pub use sharing::{attribute_entries, coefficients, compute_shares, prune, AttributeEntry};
pub use tree::PolicyTree;
