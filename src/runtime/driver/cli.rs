use std::io::{self, Write};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use thiserror::Error;

use crate::error::MuxError;
use crate::geometry::Size;
use crate::layout::LayoutTree;
use crate::render::{SharedSurface, Surface};
use crate::runtime::{Dashboard, RuntimeConfig, TerminalEvents};

pub type DriverResult<T> = std::result::Result<T, CliDriverError>;

#[derive(Debug, Error)]
pub enum CliDriverError {
    #[error("runtime error: {0}")]
    Runtime(#[from] MuxError),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Owns the terminal for the lifetime of a dashboard: raw mode, alternate
/// screen and a hidden cursor, restored on the way out whatever happened.
pub struct CliDriver {
    layout: LayoutTree,
    config: RuntimeConfig,
}

impl CliDriver {
    pub fn new(layout: LayoutTree, config: RuntimeConfig) -> Self {
        Self { layout, config }
    }

    pub fn run(self) -> DriverResult<()> {
        let mut stdout = io::stdout();
        Self::enter(&mut stdout)?;
        let result = self.run_inner();
        Self::exit(&mut stdout);
        result
    }

    fn run_inner(self) -> DriverResult<()> {
        let (cols, rows) = terminal::size()?;
        let surface = SharedSurface::new(Surface::new(
            Size::new(rows, cols),
            Box::new(io::stdout()),
        ));
        let mut dashboard = Dashboard::new(self.layout, surface, self.config);
        dashboard.run(&mut TerminalEvents::new())?;
        Ok(())
    }

    fn enter(stdout: &mut impl Write) -> DriverResult<()> {
        terminal::enable_raw_mode().map_err(|err| CliDriverError::Terminal(err.to_string()))?;
        execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(())
    }

    fn exit(stdout: &mut impl Write) {
        execute!(stdout, Show, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}
