use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed with: {0}")]
    Config(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Grpc {
    pub server_addr: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Greet {
    pub server_addr: SocketAddr,
    pub stream_interval_ms: u64,
}

impl Greet {
    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Blog {
    pub server_addr: SocketAddr,
    /// Directory holding the embedded database.
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Client {
    pub endpoint: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Client {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub greet: Greet,
    pub calculator: Grpc,
    pub blog: Blog,
    pub client: Client,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::load().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Defaults, then `~/.config/course/course.toml` if present, then
    /// `COURSE__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = dirs::home_dir().map(|home| home.join(".config/course/course.toml"));
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = defaults()?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(false));
        }

        Ok(builder
            .add_source(
                Environment::with_prefix("COURSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("greet.server_addr", "0.0.0.0:50051")?
        .set_default("greet.stream_interval_ms", 1000)?
        .set_default("calculator.server_addr", "0.0.0.0:50051")?
        .set_default("blog.server_addr", "0.0.0.0:50051")?
        .set_default("blog.db_path", "database")?
        .set_default("client.endpoint", "http://localhost:50051")
}

lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = AppConfig::load_from(None).unwrap();

        assert_eq!(config.blog.server_addr.port(), 50051);
        assert_eq!(config.blog.db_path, PathBuf::from("database"));
        assert_eq!(config.greet.stream_interval(), Duration::from_secs(1));
        assert_eq!(config.client.endpoint, "http://localhost:50051");
        assert_eq!(config.client.timeout(), None);
    }

    #[test]
    fn missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(Some(&dir.path().join("nope.toml"))).unwrap();

        assert_eq!(config.calculator.server_addr.port(), 50051);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[blog]
server_addr = "127.0.0.1:6000"
db_path = "/tmp/blogs"

[client]
endpoint = "http://127.0.0.1:6000"
timeout_ms = 1500
"#
        )
        .unwrap();

        let config = AppConfig::load_from(Some(file.path())).unwrap();

        assert_eq!(config.blog.server_addr, "127.0.0.1:6000".parse().unwrap());
        assert_eq!(config.blog.db_path, PathBuf::from("/tmp/blogs"));
        assert_eq!(config.client.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.greet.server_addr.port(), 50051);
    }
}
