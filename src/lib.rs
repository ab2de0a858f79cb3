//! minimux: a small terminal dashboard that runs several commands at once,
//! each in its own weighted panel, with rule-based colouring of their output.

pub mod buffer;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod rules;
pub mod runner;
pub mod runtime;
pub mod style;
pub mod width;

pub use buffer::{LineBuffer, StyledLine};
pub use config::{ConfigError, load_file, load_str};
pub use error::{MuxError, Result};
pub use geometry::{Region, Size};
pub use layout::{CommandNode, Element, LayoutPlan, LayoutTree, PanelNode, Separator};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, RuntimeMetrics};
pub use render::{SharedSurface, Surface};
pub use rules::{RegexFlags, Rule, RuleError, RuleSet};
pub use runner::{ExitWaiter, Runner, RunnerState};
pub use runtime::driver::cli::{CliDriver, CliDriverError, DriverResult};
pub use runtime::{Dashboard, DashboardEvent, EventSource, RuntimeConfig, ScriptedEvents, TerminalEvents};
pub use style::{CellStyle, StyleSpec};
pub use width::display_width;
