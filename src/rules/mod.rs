//! Line classification rules.
//!
//! Rules are matched in declaration order and the first hit decides the style
//! of a line. The set never reorders or deduplicates its entries beyond
//! collapsing identical rule configurations onto a single entry.

mod core;

pub use core::{RegexFlags, Rule, RuleError, RuleSet};
