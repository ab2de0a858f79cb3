//! Character-grid surface shared by the controller and every runner.
//!
//! Drawing only touches the in-memory grid; [`Surface::flush`] turns the rows
//! that changed since the previous flush into crossterm commands.

mod core;

pub use core::{Cell, MemorySink, SharedSurface, Surface};
