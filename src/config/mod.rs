// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{AuthConfig, Config, StorageConfig};

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// Environment variables prefixed with `KATA` override file values,
    /// e.g. `KATA_SERVER__PORT=4000`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("KATA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "kata-server/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("storage.data_dir", "data")?
            .set_default("storage.persist", true)?
            .set_default("auth.token_ttl_secs", 86_400)?
            .set_default("auth.protect_products", false)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
