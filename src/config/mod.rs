use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "REMOTE_IMAGE";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum number of decoded images kept in memory.
    pub cache_capacity: usize,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    /// Scale applied to decoded images (2.0 on a "retina" display).
    pub display_scale: f32,
    /// Optional http, https or socks5 proxy URL.
    pub proxy: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            timeout: 30,
            user_agent: format!("remote-image/{}", env!("CARGO_PKG_VERSION")),
            display_scale: 1.0,
            proxy: None,
        }
    }
}

impl FetcherConfig {
    // Defaults, then the TOML file if it exists, then REMOTE_IMAGE_* variables
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Toml).required(false));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<FetcherConfig>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = FetcherConfig::load(Some("/nonexistent/remote-image.toml")).unwrap();
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.display_scale, 1.0);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "cache_capacity = 8\ndisplay_scale = 2.0\nproxy = \"socks5://127.0.0.1:9050\""
        )
        .unwrap();

        let config = FetcherConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.display_scale, 2.0);
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        // untouched keys keep their defaults
        assert_eq!(config.timeout, 30);
    }
}
