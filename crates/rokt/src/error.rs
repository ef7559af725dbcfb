//! Top-level startup error, aggregating every per-crate failure that
//! can occur before the server starts accepting connections. Nothing
//! after startup ever produces a `RoktError` — per-request failures
//! become response envelopes instead (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoktError {
    #[error("configuration error: {0}")]
    Config(#[from] rokt_config::ConfigError),

    #[error("cryptography error: {0}")]
    Crypto(#[from] rokt_crypto::CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] rokt_storage::StorageError),

    #[error("server error: {0}")]
    Server(#[from] rokt_server::ServerError),
}
