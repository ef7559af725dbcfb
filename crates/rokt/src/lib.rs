//! Top-level wiring: load configuration, construct the cipher and
//! catalog, and build the request pipeline on top of them.

mod error;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use error::RoktError;
pub use rokt_config::RoktConfig;
pub use rokt_server::{Server, ServerParams};
pub use rokt_storage::Catalog;

const CONFIG_FILE_NAME: &str = "config.json";

/// Loads configuration from `config.json` in the working directory,
/// builds the cipher and catalog, and binds the request pipeline.
/// Returns a ready-to-run [`Server`] plus the loaded config (callers
/// may want its `thread`/`network` values for logging).
pub fn bootstrap() -> Result<(Server, RoktConfig), RoktError> {
    let config = RoktConfig::load(CONFIG_FILE_NAME)?;
    tracing::info!(port = config.network.port, workers = config.thread.max_workers, "configuration loaded");

    let cipher = Arc::new(rokt_crypto::Cipher::new(&config.encryption.passphrase, &config.encryption.iv)?);
    let catalog = Arc::new(Catalog::open(".", cipher)?);

    let params = ServerParams {
        port: config.network.port,
        max_workers: config.thread.max_workers,
        max_task_queue_size: config.thread.max_task_queue_size,
    };
    let server = Server::new(params, catalog)?;
    Ok((server, config))
}

/// Runs `server` to completion, stopping when `shutdown` is set.
pub fn run(server: Server, shutdown: &AtomicBool) -> Result<(), RoktError> {
    server.run(shutdown)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_with_default_config_binds_an_ephemeral_port() {
        let tmp = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        // port 0 isn't representable via config defaults, so we write one
        // that binds an ephemeral port for the test instead of 8080.
        std::fs::write(
            CONFIG_FILE_NAME,
            r#"{"network": {"port": 0}}"#,
        )
        .unwrap();

        let result = bootstrap();
        std::env::set_current_dir(original).unwrap();

        let (server, config) = result.unwrap();
        assert_eq!(config.network.port, 0);
        assert!(server.local_addr().port() > 0);
    }
}
