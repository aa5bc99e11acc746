//! Collapsible hierarchical aggregation view.
//!
//! The tree is a flat, depth-tagged, pre-order node list; parent/child
//! relations are derived from contiguous depth runs rather than pointers.

pub mod export;
pub mod filter;
pub mod tree;

pub use filter::{parse_conditions, CompiledFilter, FilterCondition, FilterOp};
pub use tree::{ColumnHint, PivotNode, PivotTree};
