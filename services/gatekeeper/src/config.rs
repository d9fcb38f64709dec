use crate::middleware::ExtractionStrategy;
use anyhow::{Context, Result, bail};
use policy_opensearch::DecodeMode;
use policy_opensearch::LoadOptions;
use policy_opensearch::store::opensearch::OpenSearchConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_OPENSEARCH_ADDRESS: &str = "http://localhost:9200";
const DEFAULT_INDEX: &str = "casbin_policies";
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;
const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_SCROLL_KEEP_ALIVE_MS: u64 = 60_000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    OpenSearch,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "opensearch" | "open_search" => Ok(StoreBackend::OpenSearch),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown store backend: {other}"),
        }
    }
}

// Gatekeeper configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    // HTTP listener bind address.
    pub bind_addr: SocketAddr,
    // Metrics HTTP listener bind address.
    pub metrics_bind: SocketAddr,
    // Where policy documents live.
    pub store_backend: StoreBackend,
    // OpenSearch nodes, tried in order.
    pub opensearch_addresses: Vec<String>,
    pub opensearch_username: Option<String>,
    pub opensearch_password: Option<String>,
    // Per-request timeout for store calls.
    pub store_timeout_ms: u64,
    // Index holding the policy documents.
    pub index: String,
    // Casbin model file; the embedded model for the strategy is used when unset.
    pub model_path: Option<PathBuf>,
    // How the middleware builds the request tuple.
    pub strategy: ExtractionStrategy,
    // Interval between background reloads.
    pub refresh_interval_ms: u64,
    // Upper bound on a single policy load.
    pub load_timeout_ms: u64,
    // Documents per scroll page.
    pub page_size: usize,
    // How long the store keeps a scroll cursor between pages.
    pub scroll_keep_alive_ms: u64,
    // Stop reading a document's fields at the first gap instead of rejecting it.
    pub legacy_load: bool,
}

#[derive(Debug, Deserialize)]
struct GatekeeperConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    store_backend: Option<StoreBackend>,
    opensearch_addresses: Option<Vec<String>>,
    opensearch_username: Option<String>,
    opensearch_password: Option<String>,
    store_timeout_ms: Option<u64>,
    index: Option<String>,
    model_path: Option<PathBuf>,
    strategy: Option<ExtractionStrategy>,
    refresh_interval_ms: Option<u64>,
    load_timeout_ms: Option<u64>,
    page_size: Option<usize>,
    scroll_keep_alive_ms: Option<u64>,
    legacy_load: Option<bool>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

impl GatekeeperConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("GATEKEEPER_BIND")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .with_context(|| "parse GATEKEEPER_BIND")?;
        let metrics_bind = std::env::var("GATEKEEPER_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse GATEKEEPER_METRICS_BIND")?;
        let store_backend = match std::env::var("GATEKEEPER_STORE_BACKEND") {
            Ok(value) => value
                .parse()
                .with_context(|| "parse GATEKEEPER_STORE_BACKEND")?,
            Err(_) => StoreBackend::OpenSearch,
        };
        let opensearch_addresses = split_addresses(
            &std::env::var("OPENSEARCH_ADDRESSES")
                .unwrap_or_else(|_| DEFAULT_OPENSEARCH_ADDRESS.to_string()),
        );
        let index = std::env::var("OPENSEARCH_INDEX")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX.to_string());
        let model_path = std::env::var("MODEL_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut strategy = match std::env::var("GATEKEEPER_EXTRACTION_STRATEGY") {
            Ok(value) => ExtractionStrategy::from_str(&value)
                .map_err(anyhow::Error::msg)
                .with_context(|| "parse GATEKEEPER_EXTRACTION_STRATEGY")?,
            Err(_) => ExtractionStrategy::default(),
        };
        if let (ExtractionStrategy::QueryResource { param }, Ok(value)) =
            (&mut strategy, std::env::var("GATEKEEPER_RESOURCE_PARAM"))
            && !value.trim().is_empty()
        {
            *param = value.trim().to_string();
        }
        let page_size = std::env::var("GATEKEEPER_PAGE_SIZE")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(Self {
            bind_addr,
            metrics_bind,
            store_backend,
            opensearch_addresses,
            opensearch_username: std::env::var("OPENSEARCH_USERNAME").ok(),
            opensearch_password: std::env::var("OPENSEARCH_PASSWORD").ok(),
            store_timeout_ms: env_u64("GATEKEEPER_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS),
            index,
            model_path,
            strategy,
            refresh_interval_ms: env_u64(
                "GATEKEEPER_REFRESH_INTERVAL_MS",
                DEFAULT_REFRESH_INTERVAL_MS,
            ),
            load_timeout_ms: env_u64("GATEKEEPER_LOAD_TIMEOUT_MS", DEFAULT_LOAD_TIMEOUT_MS),
            page_size,
            scroll_keep_alive_ms: env_u64(
                "GATEKEEPER_SCROLL_KEEP_ALIVE_MS",
                DEFAULT_SCROLL_KEEP_ALIVE_MS,
            ),
            legacy_load: env_flag("GATEKEEPER_LEGACY_LOAD"),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("GATEKEEPER_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read GATEKEEPER_CONFIG: {path}"))?;
            let override_cfg: GatekeeperConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse gatekeeper config yaml")?;
            config.apply(override_cfg)?;
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: GatekeeperConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.store_backend {
            self.store_backend = value;
        }
        if let Some(value) = override_cfg.opensearch_addresses {
            self.opensearch_addresses = value;
        }
        if let Some(value) = override_cfg.opensearch_username {
            self.opensearch_username = Some(value);
        }
        if let Some(value) = override_cfg.opensearch_password {
            self.opensearch_password = Some(value);
        }
        if let Some(value) = override_cfg.store_timeout_ms
            && value > 0
        {
            self.store_timeout_ms = value;
        }
        if let Some(value) = override_cfg.index {
            self.index = value;
        }
        if let Some(value) = override_cfg.model_path {
            self.model_path = Some(value);
        }
        if let Some(value) = override_cfg.strategy {
            self.strategy = value;
        }
        if let Some(value) = override_cfg.refresh_interval_ms
            && value > 0
        {
            self.refresh_interval_ms = value;
        }
        if let Some(value) = override_cfg.load_timeout_ms
            && value > 0
        {
            self.load_timeout_ms = value;
        }
        if let Some(value) = override_cfg.page_size
            && value > 0
        {
            self.page_size = value;
        }
        if let Some(value) = override_cfg.scroll_keep_alive_ms
            && value > 0
        {
            self.scroll_keep_alive_ms = value;
        }
        if let Some(value) = override_cfg.legacy_load {
            self.legacy_load = value;
        }
        if self.index.trim().is_empty() {
            bail!("index must not be empty");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            page_size: self.page_size,
            scroll_keep_alive: Duration::from_millis(self.scroll_keep_alive_ms),
            decode_mode: if self.legacy_load {
                DecodeMode::Legacy
            } else {
                DecodeMode::Strict
            },
        }
    }

    pub fn opensearch_config(&self) -> OpenSearchConfig {
        OpenSearchConfig {
            addresses: self.opensearch_addresses.clone(),
            username: self.opensearch_username.clone(),
            password: self.opensearch_password.clone(),
            request_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    const KEYS: [&str; 14] = [
        "GATEKEEPER_BIND",
        "GATEKEEPER_METRICS_BIND",
        "GATEKEEPER_STORE_BACKEND",
        "OPENSEARCH_ADDRESSES",
        "OPENSEARCH_INDEX",
        "MODEL_PATH",
        "GATEKEEPER_EXTRACTION_STRATEGY",
        "GATEKEEPER_RESOURCE_PARAM",
        "GATEKEEPER_REFRESH_INTERVAL_MS",
        "GATEKEEPER_LOAD_TIMEOUT_MS",
        "GATEKEEPER_PAGE_SIZE",
        "GATEKEEPER_SCROLL_KEEP_ALIVE_MS",
        "GATEKEEPER_LEGACY_LOAD",
        "GATEKEEPER_CONFIG",
    ];

    fn clear_env() -> Vec<EnvGuard> {
        KEYS.iter().map(|key| EnvGuard::unset(key)).collect()
    }

    #[test]
    #[serial]
    fn defaults_match_local_deployment() {
        let _guards = clear_env();
        let config = GatekeeperConfig::from_env().expect("config");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.store_backend, StoreBackend::OpenSearch);
        assert_eq!(config.opensearch_addresses, vec!["http://localhost:9200"]);
        assert_eq!(config.index, "casbin_policies");
        assert!(config.model_path.is_none());
        assert_eq!(config.strategy, ExtractionStrategy::default());
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.load_options(), LoadOptions::default());
    }

    #[test]
    #[serial]
    fn env_overrides_are_applied() {
        let _guards = clear_env();
        let _g1 = EnvGuard::set("OPENSEARCH_ADDRESSES", "http://a:9200, http://b:9200,");
        let _g2 = EnvGuard::set("OPENSEARCH_INDEX", "acl");
        let _g3 = EnvGuard::set("GATEKEEPER_STORE_BACKEND", "memory");
        let _g4 = EnvGuard::set("GATEKEEPER_RESOURCE_PARAM", "doc");
        let _g5 = EnvGuard::set("GATEKEEPER_PAGE_SIZE", "50");
        let _g6 = EnvGuard::set("GATEKEEPER_LEGACY_LOAD", "true");
        let _g7 = EnvGuard::set("MODEL_PATH", "/etc/gatekeeper/model.conf");

        let config = GatekeeperConfig::from_env().expect("config");
        assert_eq!(
            config.opensearch_addresses,
            vec!["http://a:9200", "http://b:9200"]
        );
        assert_eq!(config.index, "acl");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.strategy,
            ExtractionStrategy::QueryResource {
                param: "doc".to_string()
            }
        );
        let options = config.load_options();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.decode_mode, DecodeMode::Legacy);
        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/etc/gatekeeper/model.conf"))
        );
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected_or_ignored() {
        let _guards = clear_env();
        let _g1 = EnvGuard::set("GATEKEEPER_PAGE_SIZE", "0");
        let _g2 = EnvGuard::set("GATEKEEPER_REFRESH_INTERVAL_MS", "soon");
        let config = GatekeeperConfig::from_env().expect("config");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.refresh_interval_ms, DEFAULT_REFRESH_INTERVAL_MS);

        let _g3 = EnvGuard::set("GATEKEEPER_EXTRACTION_STRATEGY", "header_magic");
        assert!(GatekeeperConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let _guards = clear_env();
        let path = std::env::temp_dir().join(format!(
            "gatekeeper-config-{}.yaml",
            std::process::id()
        ));
        fs::write(
            &path,
            "bind_addr: 127.0.0.1:4000\n\
             store_backend: memory\n\
             index: policies_v2\n\
             strategy:\n  kind: path_role\n\
             refresh_interval_ms: 500\n\
             scroll_keep_alive_ms: 2000\n",
        )
        .expect("write yaml");
        let _g1 = EnvGuard::set("GATEKEEPER_CONFIG", path.to_str().expect("utf8 path"));

        let config = GatekeeperConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.index, "policies_v2");
        assert_eq!(config.strategy, ExtractionStrategy::PathRole);
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
        assert_eq!(
            config.load_options().scroll_keep_alive,
            Duration::from_secs(2)
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn opensearch_config_carries_credentials() {
        let mut config = GatekeeperConfig {
            bind_addr: "127.0.0.1:0".parse().expect("bind"),
            metrics_bind: "127.0.0.1:0".parse().expect("metrics"),
            store_backend: StoreBackend::OpenSearch,
            opensearch_addresses: vec!["http://node:9200".to_string()],
            opensearch_username: None,
            opensearch_password: None,
            store_timeout_ms: 1500,
            index: "casbin_policies".to_string(),
            model_path: None,
            strategy: ExtractionStrategy::default(),
            refresh_interval_ms: 1000,
            load_timeout_ms: 1000,
            page_size: 10,
            scroll_keep_alive_ms: 1000,
            legacy_load: false,
        };
        config.opensearch_username = Some("admin".to_string());
        config.opensearch_password = Some("pw".to_string());
        let os = config.opensearch_config();
        assert_eq!(os.username.as_deref(), Some("admin"));
        assert_eq!(os.password.as_deref(), Some("pw"));
        assert_eq!(os.request_timeout, Duration::from_millis(1500));
    }
}
