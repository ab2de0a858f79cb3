//! The dashboard controller: owns the surface, one runner per command leaf,
//! and the event loop that relayouts on resize and shuts down on quit.

pub mod driver;
mod events;

pub use events::{DashboardEvent, EventSource, ScriptedEvents, TerminalEvents};

use std::time::Instant;

use serde_json::json;

use crate::error::Result;
use crate::geometry::Size;
use crate::layout::LayoutTree;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::{RuntimeMetrics, SharedMetrics, record};
use crate::render::SharedSurface;
use crate::runner::{ExitWaiter, Runner, RunnerContext};
use crate::style::CellStyle;
use crate::width::center;

const LOG_TARGET: &str = "minimux::runtime";
const LAYOUT_TARGET: &str = "minimux::layout";
const TERMINATING: &str = "Terminating...";

/// Ambient services handed to the controller and its runners.
#[derive(Clone, Default)]
pub struct RuntimeConfig {
    /// Optional structured logger used by the controller and every runner.
    pub logger: Option<Logger>,
    /// Counters shared with the runner threads; a snapshot is logged on shutdown.
    pub metrics: Option<SharedMetrics>,
}

impl RuntimeConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(RuntimeMetrics::shared());
        }
    }

    pub fn metrics_handle(&self) -> Option<SharedMetrics> {
        self.metrics.clone()
    }
}

pub struct Dashboard {
    layout: LayoutTree,
    surface: SharedSurface,
    runners: Vec<Runner>,
    config: RuntimeConfig,
    started_at: Option<Instant>,
}

impl Dashboard {
    /// Build one idle runner per command leaf, in tree order.
    pub fn new(layout: LayoutTree, surface: SharedSurface, config: RuntimeConfig) -> Self {
        let ctx = RunnerContext {
            surface: surface.clone(),
            logger: config.logger.clone(),
            metrics: config.metrics.clone(),
        };
        let runners = layout
            .commands()
            .into_iter()
            .map(|command| Runner::new(command, &ctx))
            .collect();
        Self {
            layout,
            surface,
            runners,
            config,
            started_at: None,
        }
    }

    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    /// Lay out the current surface size, then spawn every command.
    pub fn start(&mut self) -> Result<()> {
        self.started_at = Some(Instant::now());
        let size = self.surface.lock()?.size();
        self.log(
            LogLevel::Info,
            "runtime_started",
            [
                json_kv("runners", json!(self.runners.len())),
                json_kv("rows", json!(size.rows)),
                json_kv("cols", json!(size.cols)),
            ],
        );
        self.relayout(size)?;
        for runner in &self.runners {
            runner.start()?;
        }
        Ok(())
    }

    /// Recompute regions for `size` and repaint everything in one surface
    /// critical section, so no runner draws against a stale region.
    pub fn relayout(&mut self, size: Size) -> Result<()> {
        let plan = self.layout.solve(size);
        let mut surface = self.surface.lock()?;
        for runner in &self.runners {
            runner.detach()?;
        }
        if surface.size() == size {
            surface.clear();
        } else {
            surface.resize(size);
        }
        plan.paint(&mut surface);
        for (index, runner) in self.runners.iter().enumerate() {
            if let Some(region) = plan.region_of(index) {
                runner.init_locked(&mut surface, region)?;
            }
        }
        surface.flush()?;
        drop(surface);

        record(self.config.metrics.as_ref(), RuntimeMetrics::record_layout);
        self.log_to(
            LAYOUT_TARGET,
            LogLevel::Debug,
            "layout_applied",
            [
                json_kv("rows", json!(size.rows)),
                json_kv("cols", json!(size.cols)),
                json_kv("leaves", json!(plan.leaves.len())),
                json_kv("decorations", json!(plan.decorations.len())),
            ],
        );
        Ok(())
    }

    /// React to one event. Returns `false` once the dashboard should stop.
    pub fn handle_event(&mut self, event: DashboardEvent) -> Result<bool> {
        match event {
            DashboardEvent::Resize(size) => {
                self.log(
                    LogLevel::Info,
                    "resized",
                    [
                        json_kv("rows", json!(size.rows)),
                        json_kv("cols", json!(size.cols)),
                    ],
                );
                self.relayout(size)?;
                Ok(true)
            }
            DashboardEvent::Quit => Ok(false),
            DashboardEvent::Other => Ok(true),
        }
    }

    /// Start, pump events until a quit, then shut down. Shutdown also runs
    /// when the loop fails so no child outlives the dashboard.
    pub fn run<E: EventSource>(&mut self, events: &mut E) -> Result<()> {
        let outcome = self.start().and_then(|_| self.event_loop(events));
        let stopped = self.shutdown();
        outcome.and(stopped)
    }

    fn event_loop<E: EventSource>(&mut self, events: &mut E) -> Result<()> {
        while let Some(event) = events.next_event()? {
            if !self.handle_event(event)? {
                self.log(LogLevel::Info, "exit_requested", std::iter::empty());
                break;
            }
        }
        Ok(())
    }

    /// Kill every runner, show the terminating banner, then reap every
    /// process. A failed reap is logged and does not stop the others.
    pub fn shutdown(&mut self) -> Result<()> {
        let waiters: Vec<(String, ExitWaiter)> = self
            .runners
            .iter()
            .map(|runner| (runner.label().to_string(), runner.terminate()))
            .collect();

        {
            let mut surface = self.surface.lock()?;
            let size = surface.size();
            surface.clear();
            let banner = center(TERMINATING, size.cols as usize);
            surface.put_str(size.rows / 2, 0, &banner, CellStyle::default());
            surface.flush()?;
        }

        for (label, waiter) in waiters {
            match waiter.wait() {
                Ok(status) => self.log(
                    LogLevel::Debug,
                    "runner_reaped",
                    [
                        json_kv("runner", json!(label)),
                        json_kv("code", json!(status.and_then(|s| s.code()))),
                    ],
                ),
                Err(err) => self.log(
                    LogLevel::Warn,
                    "reap_failed",
                    [
                        json_kv("runner", json!(label)),
                        json_kv("error", json!(err.to_string())),
                    ],
                ),
            }
        }

        self.finalize();
        Ok(())
    }

    fn finalize(&mut self) {
        let uptime = self
            .started_at
            .map(|start| start.elapsed())
            .unwrap_or_default();
        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let _ = logger.log_event(guard.snapshot(uptime).to_log_event(LOG_TARGET));
            }
        }
        self.log(
            LogLevel::Info,
            "runtime_stopped",
            [json_kv("uptime_ms", json!(uptime.as_millis() as u64))],
        );
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        self.log_to(LOG_TARGET, level, message, fields);
    }

    fn log_to<I>(&self, target: &str, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, target, message, fields));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CommandNode, PanelNode};
    use crate::logging::RecordingSink;
    use crate::render::{MemorySink, Surface};
    use crate::runner::RunnerState;
    use std::thread;
    use std::time::Duration;

    fn dashboard(layout: LayoutTree, size: Size) -> (Dashboard, RecordingSink) {
        let sink = RecordingSink::new();
        let mut config = RuntimeConfig::default().with_logger(Logger::new(sink.clone()));
        config.enable_metrics();
        let surface = SharedSurface::new(Surface::headless(size));
        (Dashboard::new(layout, surface, config), sink)
    }

    fn rows(dashboard: &Dashboard) -> Vec<String> {
        dashboard
            .surface()
            .with(|s| (0..s.size().rows).map(|r| s.row_text(r)).collect())
            .unwrap()
    }

    fn idle_pair() -> LayoutTree {
        LayoutTree::new(PanelNode::new(
            false,
            vec![
                CommandNode::new(["/no/such/left"]).into(),
                CommandNode::new(["/no/such/right"]).into(),
            ],
        ))
    }

    #[test]
    fn relayout_assigns_regions_in_tree_order() {
        let (mut dash, sink) = dashboard(idle_pair(), Size::new(4, 21));
        dash.relayout(Size::new(4, 21)).unwrap();

        let regions: Vec<_> = dash
            .runners()
            .iter()
            .map(|runner| runner.region().unwrap().unwrap())
            .collect();
        assert_eq!(regions[0].left, 0);
        assert_eq!(regions[0].cols, 10);
        assert_eq!(regions[1].left, 11);
        assert_eq!(rows(&dash)[0].chars().nth(10), Some('│'));
        assert!(sink.messages().contains(&"layout_applied".to_string()));
    }

    #[test]
    fn resize_event_relayouts_the_surface() {
        let (mut dash, _) = dashboard(idle_pair(), Size::new(4, 21));
        dash.relayout(Size::new(4, 21)).unwrap();
        assert!(dash.handle_event(DashboardEvent::Resize(Size::new(6, 41))).unwrap());

        assert_eq!(dash.surface().lock().unwrap().size(), Size::new(6, 41));
        let right = dash.runners()[1].region().unwrap().unwrap();
        assert_eq!(right.left, 21);
        assert_eq!(right.rows, 6);
        assert!(dash.handle_event(DashboardEvent::Other).unwrap());
        assert!(!dash.handle_event(DashboardEvent::Quit).unwrap());
    }

    #[test]
    fn scripted_run_shows_spawn_errors_then_terminates() {
        let (mut dash, sink) = dashboard(idle_pair(), Size::new(5, 81));
        let mut events = ScriptedEvents::new([DashboardEvent::Other, DashboardEvent::Quit]);
        dash.run(&mut events).unwrap();

        for runner in dash.runners() {
            assert_eq!(runner.state().unwrap(), RunnerState::Terminated);
            let lines = runner.lines().unwrap();
            assert!(lines[0].text.starts_with("error: failed to start process"));
        }
        let screen = rows(&dash);
        assert_eq!(screen[2].trim(), TERMINATING);
        assert!(screen[0].trim().is_empty());

        let messages = sink.messages();
        assert!(messages.contains(&"runtime_started".to_string()));
        assert!(messages.contains(&"runtime_metrics".to_string()));
        assert_eq!(messages.last().map(String::as_str), Some("runtime_stopped"));
        let metrics = dash.config.metrics_handle().unwrap();
        let snapshot = metrics.lock().unwrap().snapshot(Duration::ZERO);
        assert_eq!(snapshot.spawn_failures, 2);
        assert_eq!(snapshot.layout_passes, 1);
    }

    #[test]
    fn exhausted_event_source_behaves_like_quit() {
        let (mut dash, _) = dashboard(idle_pair(), Size::new(3, 20));
        dash.run(&mut ScriptedEvents::default()).unwrap();
        assert_eq!(rows(&dash)[1].trim(), TERMINATING);
    }

    #[test]
    fn titled_dashboard_flushes_title_row() {
        let output = MemorySink::new();
        let surface = SharedSurface::new(Surface::new(Size::new(5, 20), Box::new(output.clone())));
        let layout = LayoutTree::new(CommandNode::new(["/no/such/cmd"])).with_title("Demo");
        let mut dash = Dashboard::new(layout, surface, RuntimeConfig::default());
        dash.relayout(Size::new(5, 20)).unwrap();

        assert_eq!(rows(&dash)[0], "        Demo        ");
        assert_eq!(rows(&dash)[1], "─".repeat(20));
        assert!(output.contents().contains("Demo"));
    }

    #[cfg(unix)]
    #[test]
    fn running_commands_stream_into_their_panels() {
        let layout = LayoutTree::new(PanelNode::new(
            true,
            vec![
                CommandNode::new(["sh", "-c", "echo alpha; echo beta"]).into(),
                CommandNode::new(["sleep", "30"]).into(),
            ],
        ));
        let (mut dash, _) = dashboard(layout, Size::new(9, 40));
        dash.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while dash.runners()[0].state().unwrap() != RunnerState::Terminated {
            assert!(Instant::now() < deadline, "first runner never exited");
            thread::sleep(Duration::from_millis(10));
        }
        let screen = rows(&dash);
        assert!(screen[0].starts_with("alpha"));
        assert!(screen[1].starts_with("beta"));
        assert!(screen[2].starts_with("Process exited with status code 0"));
        assert_eq!(screen[4], "─".repeat(40));
        assert_eq!(dash.runners()[1].state().unwrap(), RunnerState::Running);

        dash.shutdown().unwrap();
        assert_eq!(dash.runners()[1].state().unwrap(), RunnerState::Terminated);
        assert_eq!(rows(&dash)[4].trim(), TERMINATING);
    }

    #[cfg(unix)]
    #[test]
    fn resizing_while_output_streams_keeps_the_frame_intact() {
        let layout = LayoutTree::new(PanelNode::new(
            false,
            vec![
                CommandNode::new(["sh", "-c", "while :; do echo x; done"])
                    .with_title("chatty")
                    .into(),
                PanelNode::new(
                    true,
                    vec![
                        CommandNode::new(["sleep", "30"]).into(),
                        CommandNode::new(["sh", "-c", "while :; do echo y; done"]).into(),
                    ],
                )
                .into(),
            ],
        ))
        .with_title("race");
        let (mut dash, _) = dashboard(layout, Size::new(12, 40));
        dash.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        let sizes = [
            Size::new(20, 60),
            Size::new(9, 25),
            Size::new(15, 80),
            Size::new(6, 17),
            Size::new(30, 50),
            Size::new(12, 40),
        ];
        for size in sizes {
            assert!(dash.handle_event(DashboardEvent::Resize(size)).unwrap());
            thread::sleep(Duration::from_millis(20));

            let plan = dash.layout.solve(size);
            let mut expected = Surface::headless(size);
            plan.paint(&mut expected);

            let surface = dash.surface().lock().unwrap();
            assert_eq!(surface.size(), size);
            for (index, runner) in dash.runners().iter().enumerate() {
                assert_eq!(runner.region().unwrap(), plan.region_of(index));
            }

            let in_leaf = |row: u16, col: u16| {
                plan.leaves.iter().any(|leaf| {
                    let r = leaf.region;
                    row >= r.top && row < r.bottom() && col >= r.left && col < r.right()
                })
            };
            for row in 0..size.rows {
                for col in 0..size.cols {
                    if !in_leaf(row, col) {
                        assert_eq!(
                            surface.glyph_at(row, col),
                            expected.glyph_at(row, col),
                            "{size:?}: cell ({row}, {col}) outside every panel"
                        );
                    }
                }
            }
            for leaf in &plan.leaves {
                let r = leaf.region;
                for row in r.top..r.bottom() {
                    let text: String = (r.left..r.right())
                        .filter_map(|col| surface.glyph_at(row, col))
                        .collect();
                    assert!(
                        matches!(text.trim_end(), "" | "x" | "y"),
                        "{size:?}: panel row {row} holds {text:?}"
                    );
                }
            }
        }

        dash.shutdown().unwrap();
        for runner in dash.runners() {
            assert_eq!(runner.state().unwrap(), RunnerState::Terminated);
        }
    }
}
