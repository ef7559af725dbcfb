//! Binary entrypoint (§10.5, C11): load configuration, bind the
//! pipeline, install signal handlers, run until `SIGINT`/`SIGTERM`.

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (server, config) = match rokt::bootstrap() {
        Ok(bootstrapped) => bootstrapped,
        Err(err) => {
            tracing::error!(%err, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(port = config.network.port, "rokt listening");

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            tracing::error!(%err, signal, "failed to install signal handler");
            return ExitCode::FAILURE;
        }
    }

    match rokt::run(server, &shutdown) {
        Ok(()) => {
            tracing::info!("shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "server loop failed");
            ExitCode::FAILURE
        }
    }
}
