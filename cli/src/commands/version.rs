//! Version command

use std::process::ExitCode;

use crate::app::AppContext;

/// Run the version command.
#[must_use]
pub fn run(app: &AppContext) -> ExitCode {
    app.renderer().render_version(env!("CARGO_PKG_VERSION"));
    ExitCode::SUCCESS
}
