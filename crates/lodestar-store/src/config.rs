//! Store configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the backing document store.
///
/// Defaults match a local, unsecured development instance; deployments
/// override from their configuration file or environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store host.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Username, when the store requires authentication.
    pub username: Option<String>,
    /// Password, when the store requires authentication.
    pub password: Option<String>,
    /// Whether to connect over TLS.
    pub secured: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5984,
            database: "lodestar".to_string(),
            username: None,
            password: None,
            secured: false,
        }
    }
}
