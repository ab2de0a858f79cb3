//! Layout module orchestrator.
//!
//! The element tree and the solver live in `core`; box-drawing separators and
//! their merge rules live in `separator`.

mod core;
mod separator;

pub use core::{
    CommandNode, Decoration, Element, LayoutPlan, LayoutTree, LeafPlacement, PanelNode,
};
pub use separator::{Orientation, Separator};
