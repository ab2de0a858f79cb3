//! One runner per command leaf: owns the child process, a worker thread that
//! consumes its output, and the line buffer drawn into the runner's region.
//!
//! Lock order is always surface, then view. The child slot is only held for
//! non-blocking calls, except by [`ExitWaiter::wait`] after a kill.

mod process;

pub use process::ExitWaiter;

use std::io::{BufReader, PipeReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde_json::json;

use crate::buffer::{LineBuffer, StyledLine};
use crate::error::{MuxError, Result};
use crate::geometry::Region;
use crate::layout::CommandNode;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::{RuntimeMetrics, SharedMetrics, record};
use crate::render::{SharedSurface, Surface};
use crate::style::CellStyle;
use crate::width::sanitize_line;

use process::{ChildSlot, LineReader, exit_message, spawn_merged};

const LOG_TARGET: &str = "minimux::runner";
const EXIT_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Terminated,
}

/// Handles every runner needs from its controller.
#[derive(Clone)]
pub struct RunnerContext {
    pub surface: SharedSurface,
    pub logger: Option<Logger>,
    pub metrics: Option<SharedMetrics>,
}

impl RunnerContext {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface,
            logger: None,
            metrics: None,
        }
    }
}

struct RunnerView {
    region: Option<Region>,
    buffer: LineBuffer,
    state: RunnerState,
}

struct RunnerShared {
    label: String,
    argv: Vec<String>,
    style: CellStyle,
    surface: SharedSurface,
    view: Mutex<RunnerView>,
    child: ChildSlot,
    active: AtomicBool,
    logger: Option<Logger>,
    metrics: Option<SharedMetrics>,
}

impl RunnerShared {
    fn view(&self) -> Result<MutexGuard<'_, RunnerView>> {
        self.view.lock().map_err(|_| MuxError::LockPoisoned("runner view"))
    }

    fn set_state(&self, state: RunnerState) -> Result<()> {
        self.view()?.state = state;
        Ok(())
    }

    fn push(&self, text: &str) -> Result<()> {
        let appended = self.view()?.buffer.push(text);
        record(self.metrics.as_ref(), |m| m.record_lines(appended));
        Ok(())
    }

    fn redraw(&self) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut surface = self.surface.lock()?;
        if self.draw_into(&mut surface)? {
            surface.flush()?;
        }
        Ok(())
    }

    /// Paint the buffer into the current region. Returns `false` when there
    /// was nothing to paint onto.
    fn draw_into(&self, surface: &mut Surface) -> Result<bool> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let view = self.view()?;
        let Some(region) = view.region else {
            return Ok(false);
        };

        surface.fill(region, self.style);
        for (offset, line) in view.buffer.iter().take(region.rows as usize).enumerate() {
            surface.put_clipped(
                region.top + offset as u16,
                region.left,
                region.cols as usize,
                &line.text,
                line.style,
            );
        }
        surface.mark_dirty();
        record(self.metrics.as_ref(), RuntimeMetrics::record_redraw);
        Ok(true)
    }

    fn push_and_redraw(&self, text: &str) {
        let result = self.push(text).and_then(|_| self.redraw());
        if let Err(err) = result {
            self.log(
                LogLevel::Warn,
                "redraw_failed",
                [json_kv("error", json!(err.to_string()))],
            );
        }
    }

    /// Poll for the exit status without holding the child slot while asleep.
    fn collect_exit(&self) -> Option<std::process::ExitStatus> {
        loop {
            {
                let mut guard = self.child.lock().ok()?;
                let child = guard.as_mut()?;
                match child.try_wait() {
                    Ok(Some(status)) => return Some(status),
                    Ok(None) => {}
                    Err(err) => {
                        self.log(
                            LogLevel::Warn,
                            "wait_failed",
                            [json_kv("error", json!(err.to_string()))],
                        );
                        return None;
                    }
                }
            }
            thread::sleep(EXIT_POLL);
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let fields = std::iter::once(json_kv("runner", json!(self.label))).chain(fields);
            let _ = logger.log_event(event_with_fields(level, LOG_TARGET, message, fields));
        }
    }
}

/// Worker loop: one line in, one redraw out, until the stream ends.
fn pump(shared: Arc<RunnerShared>, reader: PipeReader) {
    let mut lines = LineReader::new(BufReader::new(reader));
    let mut raw = Vec::new();
    loop {
        match lines.next_line(&mut raw) {
            Ok(false) => break,
            Ok(true) => {
                let line = sanitize_line(&String::from_utf8_lossy(&raw));
                shared.push_and_redraw(&line);
            }
            Err(err) => {
                shared.log(
                    LogLevel::Warn,
                    "read_failed",
                    [json_kv("error", json!(err.to_string()))],
                );
                break;
            }
        }
    }

    let status = shared.collect_exit();
    shared.log(
        LogLevel::Info,
        "process_exited",
        [json_kv("code", json!(status.and_then(|s| s.code())))],
    );
    record(shared.metrics.as_ref(), RuntimeMetrics::record_exit);
    shared.push_and_redraw(&exit_message(status));
    let _ = shared.set_state(RunnerState::Terminated);
}

/// Drives one command leaf.
pub struct Runner {
    shared: Arc<RunnerShared>,
}

impl Runner {
    pub fn new(command: &CommandNode, ctx: &RunnerContext) -> Self {
        let rules = Arc::new(command.rule_set());
        let shared = RunnerShared {
            label: command.label(),
            argv: command.argv.clone(),
            style: command.style.resolve(),
            surface: ctx.surface.clone(),
            view: Mutex::new(RunnerView {
                region: None,
                buffer: LineBuffer::new(0, 0, rules),
                state: RunnerState::Idle,
            }),
            child: Arc::new(Mutex::new(None)),
            active: AtomicBool::new(true),
            logger: ctx.logger.clone(),
            metrics: ctx.metrics.clone(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn state(&self) -> Result<RunnerState> {
        Ok(self.shared.view()?.state)
    }

    pub fn region(&self) -> Result<Option<Region>> {
        Ok(self.shared.view()?.region)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn lines(&self) -> Result<Vec<StyledLine>> {
        Ok(self.shared.view()?.buffer.iter().cloned().collect())
    }

    /// Assign a new region and repaint against it.
    pub fn init(&self, region: Region) -> Result<()> {
        let mut surface = self.shared.surface.lock()?;
        if self.init_locked(&mut surface, region)? {
            surface.flush()?;
        }
        Ok(())
    }

    /// [`Runner::init`] for callers already holding the surface lock.
    pub fn init_locked(&self, surface: &mut Surface, region: Region) -> Result<bool> {
        {
            let mut view = self.shared.view()?;
            view.region = Some(region);
            view.buffer.resize(region.rows as usize, region.cols as usize);
        }
        self.shared.draw_into(surface)
    }

    /// Forget the region; redraws become no-ops until the next `init`.
    pub fn detach(&self) -> Result<()> {
        self.shared.view()?.region = None;
        Ok(())
    }

    pub fn redraw(&self) -> Result<()> {
        self.shared.redraw()
    }

    /// Spawn the process and its reader thread. A runner is started at most
    /// once; spawn failures are rendered in the panel instead of returned.
    pub fn start(&self) -> Result<()> {
        if self.state()? != RunnerState::Idle {
            return Ok(());
        }

        let (child, reader) = match spawn_merged(&self.shared.argv) {
            Ok(spawned) => spawned,
            Err(err) => {
                self.fail_start(&err.to_string());
                return Ok(());
            }
        };

        let pid = child.id();
        *self
            .shared
            .child
            .lock()
            .map_err(|_| MuxError::LockPoisoned("child"))? = Some(child);
        self.shared.set_state(RunnerState::Running)?;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("runner:{}", self.shared.label))
            .spawn(move || pump(shared, reader));
        if let Err(err) = spawned {
            self.kill_child();
            self.fail_start(&err.to_string());
            return Ok(());
        }

        self.shared.log(
            LogLevel::Info,
            "process_spawned",
            [
                json_kv("pid", json!(pid)),
                json_kv("argv", json!(self.shared.argv)),
            ],
        );
        Ok(())
    }

    /// Stop drawing, kill the process if there is one, and hand back the
    /// operation that reaps it. Calling this more than once is harmless.
    pub fn terminate(&self) -> ExitWaiter {
        self.shared.active.store(false, Ordering::SeqCst);
        let spawned = self.kill_child();
        let _ = self.shared.set_state(RunnerState::Terminated);
        self.shared.log(
            LogLevel::Debug,
            "terminate_requested",
            [json_kv("had_process", json!(spawned))],
        );

        if spawned {
            ExitWaiter::new(Some(Arc::clone(&self.shared.child)))
        } else {
            ExitWaiter::noop()
        }
    }

    fn kill_child(&self) -> bool {
        let Ok(mut guard) = self.shared.child.lock() else {
            return false;
        };
        match guard.as_mut() {
            Some(child) => {
                let _ = child.kill();
                true
            }
            None => false,
        }
    }

    fn fail_start(&self, detail: &str) {
        self.shared.log(
            LogLevel::Warn,
            "spawn_failed",
            [json_kv("error", json!(detail))],
        );
        record(
            self.shared.metrics.as_ref(),
            RuntimeMetrics::record_spawn_failure,
        );
        self.shared
            .push_and_redraw(&format!("error: failed to start process: {detail}"));
        let _ = self.shared.set_state(RunnerState::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::logging::RecordingSink;
    use crate::render::Surface;
    use std::time::Instant;

    fn context(size: Size) -> RunnerContext {
        RunnerContext::new(SharedSurface::new(Surface::headless(size)))
    }

    fn wait_for_state(runner: &Runner, state: RunnerState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while runner.state().unwrap() != state {
            assert!(Instant::now() < deadline, "runner never reached {state:?}");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn texts(runner: &Runner) -> Vec<String> {
        runner
            .lines()
            .unwrap()
            .into_iter()
            .map(|line| line.text)
            .collect()
    }

    #[test]
    fn spawn_failure_is_rendered_in_the_panel() {
        let ctx = context(Size::new(4, 120));
        let runner = Runner::new(&CommandNode::new(["/no/such/program"]), &ctx);
        runner.init(Region::new(4, 120, 0, 0)).unwrap();
        runner.start().unwrap();

        assert_eq!(runner.state().unwrap(), RunnerState::Terminated);
        let lines = texts(&runner);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("error: failed to start process:"));
        let row = ctx.surface.with(|s| s.row_text(0)).unwrap();
        assert!(row.starts_with("error: failed to start"));
    }

    #[test]
    fn empty_command_fails_without_panicking() {
        let ctx = context(Size::new(2, 80));
        let runner = Runner::new(&CommandNode::new(Vec::<String>::new()), &ctx);
        runner.init(Region::new(2, 80, 0, 0)).unwrap();
        runner.start().unwrap();
        assert_eq!(
            texts(&runner),
            vec!["error: failed to start process: empty command".to_string()]
        );
    }

    #[test]
    fn terminate_without_process_is_a_noop_wait() {
        let ctx = context(Size::new(2, 10));
        let runner = Runner::new(&CommandNode::new(["true"]), &ctx);
        let waiter = runner.terminate();
        assert!(waiter.is_noop());
        assert!(waiter.wait().unwrap().is_none());
        assert!(!runner.is_active());
        assert_eq!(runner.state().unwrap(), RunnerState::Terminated);

        runner.start().unwrap();
        assert_eq!(runner.state().unwrap(), RunnerState::Terminated);
    }

    #[test]
    fn redraw_without_region_does_nothing() {
        let ctx = context(Size::new(2, 10));
        let runner = Runner::new(&CommandNode::new(["true"]), &ctx);
        runner.shared.push("hello").unwrap();
        runner.redraw().unwrap();
        assert_eq!(ctx.surface.with(|s| s.row_text(0)).unwrap(), "          ");
    }

    #[test]
    fn init_resizes_buffer_and_repaints_region() {
        let ctx = context(Size::new(4, 12));
        let runner = Runner::new(&CommandNode::new(["true"]), &ctx);
        runner.init(Region::new(2, 5, 1, 3)).unwrap();
        runner.shared.push("abcdefghij").unwrap();
        runner.redraw().unwrap();

        let rows: Vec<String> = ctx
            .surface
            .with(|s| (0..4).map(|r| s.row_text(r)).collect())
            .unwrap();
        assert_eq!(rows[1], "   abcde    ");
        assert_eq!(rows[2], "   fghij    ");

        runner.detach().unwrap();
        assert_eq!(runner.region().unwrap(), None);
        runner.init(Region::new(1, 8, 0, 0)).unwrap();
        let row0 = ctx.surface.with(|s| s.row_text(0)).unwrap();
        assert_eq!(row0, "fghij       ");
    }

    #[cfg(unix)]
    #[test]
    fn streams_output_then_reports_exit_code() {
        let ctx = context(Size::new(10, 40));
        let command = CommandNode::new(["sh", "-c", "echo first; echo second 1>&2; exit 3"]);
        let runner = Runner::new(&command, &ctx);
        runner.init(Region::new(10, 40, 0, 0)).unwrap();
        runner.start().unwrap();
        wait_for_state(&runner, RunnerState::Terminated);

        let lines = texts(&runner);
        assert!(lines.contains(&"first".to_string()));
        assert!(lines.contains(&"second".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Process exited with status code 3")
        );
        let waiter = runner.terminate();
        assert_eq!(waiter.wait().unwrap().and_then(|s| s.code()), Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn carriage_returns_split_progress_output() {
        let ctx = context(Size::new(10, 40));
        let command = CommandNode::new(["sh", "-c", "printf '10%%\\r20%%\\r30%%\\n'"]);
        let runner = Runner::new(&command, &ctx);
        runner.init(Region::new(10, 40, 0, 0)).unwrap();
        runner.start().unwrap();
        wait_for_state(&runner, RunnerState::Terminated);

        assert_eq!(
            texts(&runner),
            vec![
                "10%".to_string(),
                "20%".to_string(),
                "30%".to_string(),
                "Process exited with status code 0".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn terminate_kills_a_long_running_process() {
        let sink = RecordingSink::new();
        let mut ctx = context(Size::new(5, 20));
        ctx.logger = Some(Logger::new(sink.clone()));
        let runner = Runner::new(&CommandNode::new(["sleep", "30"]), &ctx);
        runner.init(Region::new(5, 20, 0, 0)).unwrap();
        runner.start().unwrap();
        assert_eq!(runner.state().unwrap(), RunnerState::Running);

        let started = Instant::now();
        let status = runner.terminate().wait().unwrap();
        assert!(status.is_some_and(|s| !s.success()));
        assert!(started.elapsed() < Duration::from_secs(10));

        // A second terminate reaps the cached status without blocking.
        assert!(runner.terminate().wait().unwrap().is_some());
        assert!(sink.messages().contains(&"process_spawned".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn output_after_terminate_is_not_drawn() {
        let ctx = context(Size::new(3, 20));
        let runner = Runner::new(&CommandNode::new(["true"]), &ctx);
        runner.init(Region::new(3, 20, 0, 0)).unwrap();
        let _ = runner.terminate();
        runner.shared.push_and_redraw("late line");
        let row = ctx.surface.with(|s| s.row_text(0)).unwrap();
        assert_eq!(row.trim(), "");
    }
}
