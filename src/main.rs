mod command;
mod config;
mod error;
mod input;
mod lifecycle;
mod logging;
mod minidrone;
mod session;
mod transport;

#[cfg(test)]
mod testing;

use clap::Parser;
use config::Cli;
use input::TerminalInput;
use lifecycle::{ExitReason, LifecycleController, ShutdownSignals};
use std::process::ExitCode;
use std::sync::Arc;
use transport::BluezRadio;

use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and exit cleanly
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let (target, config) = match cli.into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    info!("Minidrone pilot starting ({} mode)", config.variant);
    info!("  Target: {}", target);

    let controller = Arc::new(LifecycleController::new(BluezRadio::new(), target, config));

    // Signals are routed to the same cleanup as a normal exit
    match ShutdownSignals::install() {
        Ok(mut signals) => {
            let controller = controller.clone();
            tokio::spawn(async move {
                let signal = signals.recv().await;
                info!("Received termination signal ({})", signal);
                controller.shutdown(ExitReason::Interrupt).await;
                std::process::exit(0);
            });
        }
        Err(e) => warn!("[LIFECYCLE] {:#}", e),
    }

    match controller.run(TerminalInput::open).await {
        Ok(reason) => {
            info!("Done ({})", reason);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
