//! codespace - create codespaces and open live sessions against them

use std::process::ExitCode;

use clap::Parser;
use codespace_cli::cli::Cli;
use codespace_cli::domain::error::CodespaceError;
use tokio_util::sync::CancellationToken;

/// Exit code for user-initiated cancellation.
const EXIT_CANCELED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.run(cancel).await {
        Ok(code) => code,
        Err(e) if CodespaceError::is_silent(&e) => ExitCode::FAILURE,
        Err(e) if CodespaceError::is_canceled(&e) => ExitCode::from(EXIT_CANCELED),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
