use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use flash_policyd::config::{Args, DaemonConfig};
use flash_policyd::lifecycle::{self, signals, Shutdown};
use flash_policyd::observability::init_logging;
use flash_policyd::DaemonError;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("flash-policyd: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Help output counts as usage, like a bad flag. Only `--version` succeeds.
fn usage_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run(args: Args) -> Result<(), DaemonError> {
    let config = args.into_config()?;
    let logger = init_logging(&config.logging)?;

    // One thread: every client is a task on the same scheduler.
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)
        .and_then(|runtime| runtime.block_on(serve(config)));

    if let Err(e) = &result {
        tracing::error!(error = %e, "Daemon stopped");
    }
    logger.close();
    result
}

async fn serve(config: DaemonConfig) -> Result<(), DaemonError> {
    let server = lifecycle::start(&config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_signal().await {
            Ok(name) => {
                tracing::info!(signal = name, "Shutdown signal received");
                trigger.trigger();
            }
            Err(e) => tracing::warn!(error = %e, "Cannot listen for termination signals"),
        }
    });

    server.run(server_shutdown).await?;
    drop(shutdown);

    tracing::info!("Shutdown complete");
    Ok(())
}
