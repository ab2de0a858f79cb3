use std::collections::VecDeque;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::Result;
use crate::geometry::Size;

/// What the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    Resize(Size),
    Quit,
    Other,
}

/// Blocking source of dashboard events. `None` means the source is exhausted
/// and is treated like a quit request.
pub trait EventSource {
    fn next_event(&mut self) -> Result<Option<DashboardEvent>>;
}

/// Events read from the controlling terminal through crossterm.
#[derive(Debug, Default)]
pub struct TerminalEvents;

impl TerminalEvents {
    pub fn new() -> Self {
        Self
    }

    fn translate(event: Event) -> DashboardEvent {
        match event {
            Event::Resize(cols, rows) => DashboardEvent::Resize(Size::new(rows, cols)),
            Event::Key(key) if is_quit(&key) => DashboardEvent::Quit,
            _ => DashboardEvent::Other,
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

impl EventSource for TerminalEvents {
    fn next_event(&mut self) -> Result<Option<DashboardEvent>> {
        Ok(Some(Self::translate(event::read()?)))
    }
}

/// Replays a fixed list of events.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    queue: VecDeque<DashboardEvent>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = DashboardEvent>) -> Self {
        Self {
            queue: events.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> Result<Option<DashboardEvent>> {
        Ok(self.queue.pop_front())
    }
}
