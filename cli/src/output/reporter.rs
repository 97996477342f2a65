//! `TerminalReporter` and `StderrStream`: Presentation-layer implementations
//! of the `ProgressReporter` and `UserStream` ports.
//!
//! Both write to stderr so that stdout carries only the command's result
//! (for `create`, the codespace name).

use std::sync::Mutex;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::{ProgressReporter, UserStream};
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// On a terminal each `step()` becomes a spinner that the next event
/// finishes. Otherwise:
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    active: Mutex<Option<(ProgressBar, String)>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            active: Mutex::new(None),
        }
    }

    /// Finish the running spinner, if any, keeping its message.
    pub fn finish(&self) {
        if let Some((pb, msg)) = self.take_active() {
            progress::finish_ok(&pb, &msg);
        }
    }

    /// Mark the running spinner, if any, as failed.
    pub fn fail(&self) {
        if let Some((pb, msg)) = self.take_active() {
            progress::finish_error(&pb, &msg);
        }
    }

    fn take_active(&self) -> Option<(ProgressBar, String)> {
        match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn set_active(&self, pb: ProgressBar, msg: String) {
        match self.active.lock() {
            Ok(mut guard) => *guard = Some((pb, msg)),
            Err(poisoned) => *poisoned.into_inner() = Some((pb, msg)),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        if let Some((pb, _)) = self.take_active() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.finish();
        if self.ctx.show_progress() {
            self.set_active(progress::spinner(message), message.to_string());
        } else {
            eprintln!("  {} {message}", "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.finish();
        eprintln!("  {} {message}", "✓".style(self.ctx.styles.success));
    }

    fn warn(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        match self.active.lock().ok().as_deref().and_then(Option::as_ref) {
            Some((pb, _)) => pb.suspend(|| {
                eprintln!("  {} {message}", "!".style(self.ctx.styles.warning));
            }),
            None => eprintln!("  {} {message}", "!".style(self.ctx.styles.warning)),
        }
    }
}

/// The user-facing error stream.
///
/// Never suppressed by `--quiet`: it carries required actions and notices.
pub struct StderrStream {
    interactive: bool,
}

impl StderrStream {
    #[must_use]
    pub fn new(ctx: &OutputContext) -> Self {
        Self {
            interactive: ctx.is_stderr_tty,
        }
    }
}

impl UserStream for StderrStream {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn println(&self, message: &str) {
        eprintln!("{message}");
    }
}
