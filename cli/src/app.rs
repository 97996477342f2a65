//! Application context: unified state passed to every command handler.
//!
//! Adding a new cross-cutting concern requires only one field change here;
//! zero command signatures change.

use crate::infra::config::YamlConfigStore;
use crate::output::{HumanRenderer, OutputContext};

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Never prompt (also set by the `CI` / `CODESPACE_NO_PROMPT` env vars).
    pub no_prompt: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
///
/// Constructed once in `Cli::run()` and passed as `&AppContext` to all
/// command handlers.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Configuration file store.
    pub config_store: YamlConfigStore,
    /// When `true`, never prompt; selections fall back to their defaults.
    ///
    /// Set when `--no-prompt` is passed, or when the `CI` or
    /// `CODESPACE_NO_PROMPT` environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("CODESPACE_NO_PROMPT").is_ok();
        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            config_store: YamlConfigStore,
            non_interactive: flags.behaviour.no_prompt || ci_env,
        }
    }

    /// Returns the human renderer for the current output context.
    #[must_use]
    pub fn renderer(&self) -> HumanRenderer<'_> {
        HumanRenderer::new(&self.output)
    }
}
