//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are never stored in the TOML — they are imported from the
//! `YOUTUBE_API_KEYS` env var or managed through the admin API, and live in
//! the key store file.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Hard cap the search API puts on `maxResults`.
const MAX_PAGE_SIZE: u32 = 50;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub poller: PollerConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// Search polling settings
#[derive(Debug, Deserialize)]
pub struct PollerConfig {
    /// Free-text search query
    pub query: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Lower-bound window when the video store is empty
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_url")]
    pub search_url: String,
}

/// HTTP listener settings. The admin listener is separate from the public
/// one so key management is never reachable from the public address.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Paths for the JSON-backed stores
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub keys_path: PathBuf,
    pub videos_path: PathBuf,
}

fn default_interval() -> u64 {
    300
}

fn default_page_size() -> u32 {
    25
}

fn default_lookback_hours() -> u64 {
    24
}

fn default_timeout() -> u64 {
    30
}

fn default_search_url() -> String {
    "https://www.googleapis.com/youtube/v3/search".to_string()
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if config.poller.query.trim().is_empty() {
            return Err(common::Error::Config("query must not be empty".into()));
        }

        if config.poller.interval_secs == 0 {
            return Err(common::Error::Config(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if config.poller.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.poller.page_size == 0 || config.poller.page_size > MAX_PAGE_SIZE {
            return Err(common::Error::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got: {}",
                config.poller.page_size
            )));
        }

        if !config.poller.search_url.starts_with("http://")
            && !config.poller.search_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "search_url must start with http:// or https://, got: {}",
                config.poller.search_url
            )));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("video-poller.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[poller]
query = "rust programming"

[server]
listen_addr = "127.0.0.1:8080"
admin_addr = "127.0.0.1:9090"

[storage]
keys_path = "data/api_keys.json"
videos_path = "data/videos.json"
"#
    }

    fn write_config(dir_name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_valid_config_applies_defaults() {
        let path = write_config("video-poller-test-valid", valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poller.query, "rust programming");
        assert_eq!(config.poller.interval_secs, 300);
        assert_eq!(config.poller.page_size, 25);
        assert_eq!(config.poller.lookback_hours, 24);
        assert_eq!(config.poller.timeout_secs, 30);
        assert_eq!(
            config.poller.search_url,
            "https://www.googleapis.com/youtube/v3/search"
        );
        assert_eq!(config.server.max_connections, 1000);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_errors() {
        let path = write_config("video-poller-test-badtoml", "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn empty_query_rejected() {
        let toml = valid_toml().replace("rust programming", "   ");
        let path = write_config("video-poller-test-emptyquery", &toml);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("query"), "got: {err}");
    }

    #[test]
    fn zero_interval_rejected() {
        let toml = valid_toml().replace(
            "query = \"rust programming\"",
            "query = \"rust programming\"\ninterval_secs = 0",
        );
        let path = write_config("video-poller-test-zerointerval", &toml);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let toml = valid_toml().replace(
            "query = \"rust programming\"",
            "query = \"rust programming\"\ntimeout_secs = 0",
        );
        let path = write_config("video-poller-test-zerotimeout", &toml);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn oversized_page_size_rejected() {
        let toml = valid_toml().replace(
            "query = \"rust programming\"",
            "query = \"rust programming\"\npage_size = 51",
        );
        let path = write_config("video-poller-test-pagesize", &toml);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("page_size"), "got: {err}");
    }

    #[test]
    fn search_url_without_scheme_rejected() {
        let toml = valid_toml().replace(
            "query = \"rust programming\"",
            "query = \"rust programming\"\nsearch_url = \"www.googleapis.com/youtube/v3/search\"",
        );
        let path = write_config("video-poller-test-badurl", &toml);
        let err = Config::load(&path).unwrap_err();
        assert!(
            err.to_string().contains("search_url must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn zero_max_connections_rejected() {
        let toml = valid_toml().replace(
            "admin_addr = \"127.0.0.1:9090\"",
            "admin_addr = \"127.0.0.1:9090\"\nmax_connections = 0",
        );
        let path = write_config("video-poller-test-maxconn", &toml);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("video-poller.toml"));
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
