use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use config as cfg;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::types::{GroupId, RelationKind, WatchList};

/// Remote API endpoints and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "ApiConfig::default_users_base_url")]
    pub users_base_url: String,
    #[serde(default = "ApiConfig::default_friends_base_url")]
    pub friends_base_url: String,
    #[serde(default = "ApiConfig::default_groups_base_url")]
    pub groups_base_url: String,
    #[serde(default = "ApiConfig::default_thumbnails_base_url")]
    pub thumbnails_base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "ApiConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "ApiConfig::default_user_agent")]
    pub user_agent: String,
    /// Optional `.ROBLOSECURITY` cookie value sent with every request.
    /// Never serialized; supply via config file or environment only.
    #[serde(default, skip_serializing)]
    pub session_cookie: Option<SecretString>,
}

impl ApiConfig {
    fn default_users_base_url() -> String {
        "https://users.roblox.com".to_string()
    }

    fn default_friends_base_url() -> String {
        "https://friends.roblox.com".to_string()
    }

    fn default_groups_base_url() -> String {
        "https://groups.roblox.com".to_string()
    }

    fn default_thumbnails_base_url() -> String {
        "https://thumbnails.roblox.com".to_string()
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_user_agent() -> String {
        format!("groupwatch/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Point every host at one base URL. Used for proxies and local mocks.
    pub fn with_single_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            users_base_url: base.clone(),
            friends_base_url: base.clone(),
            groups_base_url: base.clone(),
            thumbnails_base_url: base,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            users_base_url: Self::default_users_base_url(),
            friends_base_url: Self::default_friends_base_url(),
            groups_base_url: Self::default_groups_base_url(),
            thumbnails_base_url: Self::default_thumbnails_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            user_agent: Self::default_user_agent(),
            session_cookie: None,
        }
    }
}

/// Pagination and rate-limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Items requested per page (the API accepts at most 100)
    #[serde(default = "PagingConfig::default_page_size")]
    pub page_size: u32,
    /// Pause between successful page fetches
    #[serde(default = "PagingConfig::default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Pause before retrying a throttled request
    #[serde(default = "PagingConfig::default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    #[serde(default = "PagingConfig::default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    /// Hard stop for servers that never stop returning a cursor
    #[serde(default = "PagingConfig::default_max_pages")]
    pub max_pages: usize,
}

impl PagingConfig {
    fn default_page_size() -> u32 {
        100
    }

    fn default_page_delay_ms() -> u64 {
        500
    }

    fn default_rate_limit_backoff_ms() -> u64 {
        5_000
    }

    fn default_max_rate_limit_retries() -> u32 {
        5
    }

    fn default_max_pages() -> usize {
        1_000
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    /// No delays; handy for tests against local fakes.
    pub fn immediate() -> Self {
        Self {
            page_delay_ms: 0,
            rate_limit_backoff_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
            page_delay_ms: Self::default_page_delay_ms(),
            rate_limit_backoff_ms: Self::default_rate_limit_backoff_ms(),
            max_rate_limit_retries: Self::default_max_rate_limit_retries(),
            max_pages: Self::default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub watch_list: Vec<GroupId>,
    #[serde(default = "ScanConfig::default_relations")]
    pub relations: Vec<RelationKind>,
    /// Maximum identities fetched per relation list
    #[serde(default = "ScanConfig::default_relation_cap")]
    pub relation_cap: usize,
    /// Ignore `relation_cap` and walk every page
    #[serde(default)]
    pub no_cap: bool,
    /// Maximum members fetched per role in roster scans
    #[serde(default)]
    pub member_cap: Option<usize>,
    #[serde(default = "ScanConfig::default_include_target")]
    pub include_target: bool,
    /// Attach profile and avatar details to flagged users
    #[serde(default)]
    pub enrich_profiles: bool,
}

impl ScanConfig {
    fn default_relations() -> Vec<RelationKind> {
        RelationKind::ALL.to_vec()
    }

    fn default_relation_cap() -> usize {
        1_000
    }

    fn default_include_target() -> bool {
        true
    }

    pub fn watch_list(&self) -> WatchList {
        WatchList::new(self.watch_list.iter().copied())
    }

    pub fn effective_relation_cap(&self) -> Option<usize> {
        if self.no_cap {
            None
        } else {
            Some(self.relation_cap)
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            watch_list: Vec::new(),
            relations: Self::default_relations(),
            relation_cap: Self::default_relation_cap(),
            no_cap: false,
            member_cap: None,
            include_target: Self::default_include_target(),
            enrich_profiles: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before cached ally lists are refetched; 0 keeps them forever
    #[serde(default = "CacheConfig::default_ally_max_age_secs")]
    pub ally_max_age_secs: u64,
}

impl CacheConfig {
    fn default_ally_max_age_secs() -> u64 {
        3_600
    }

    pub fn ally_max_age(&self) -> Option<Duration> {
        match self.ally_max_age_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ally_max_age_secs: Self::default_ally_max_age_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            api: ApiConfig::default(),
            paging: PagingConfig::default(),
            scan: ScanConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("GROUPWATCH_ENV").unwrap_or_else(|_| "development".to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check().map_err(|e| ConfigError::Validation(e.to_string()))
    }

    fn check(&self) -> anyhow::Result<()> {
        for (key, url) in [
            ("api.users_base_url", &self.api.users_base_url),
            ("api.friends_base_url", &self.api.friends_base_url),
            ("api.groups_base_url", &self.api.groups_base_url),
            ("api.thumbnails_base_url", &self.api.thumbnails_base_url),
        ] {
            anyhow::ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "{} must be an http(s) URL, got {:?}",
                key,
                url
            );
        }
        anyhow::ensure!(self.api.timeout_secs > 0, "api.timeout_secs must be > 0");
        anyhow::ensure!(
            (1..=100).contains(&self.paging.page_size),
            "paging.page_size must be 1..=100"
        );
        anyhow::ensure!(self.paging.max_pages > 0, "paging.max_pages must be > 0");
        anyhow::ensure!(
            !self.scan.relations.is_empty() || self.scan.include_target,
            "scan.relations cannot be empty when scan.include_target is false"
        );
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Layered configuration loader.
///
/// Sources, lowest precedence first: `default.toml`, `{env}.toml`,
/// `local.toml` (all optional, read from the config directory), then
/// `GROUPWATCH__SECTION__KEY` environment variables.
#[derive(Debug)]
pub struct ConfigManager {
    settings: Settings,
    config_dir: PathBuf,
    env: String,
}

impl ConfigManager {
    pub fn load(config_dir: Option<PathBuf>, env_override: Option<String>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let config_dir = config_dir.unwrap_or_else(Self::default_config_dir);
        let settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.validate()?;

        debug!("Configuration loaded from {:?} (env: {})", config_dir, env_name);

        Ok(Self {
            settings,
            config_dir,
            env: env_name,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Get the default configuration directory.
    ///
    /// Priority order:
    /// 1. ~/.groupwatch/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".groupwatch");
            if user_dir.exists() {
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            return project_config;
        }

        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings, ConfigError> {
        Self::load_layers(config_dir, env_name, Self::environment())
    }

    /// `GROUPWATCH__SECTION__KEY` variables. Values stay strings so that a
    /// single watch-list id is still read as a one-element list.
    fn environment() -> cfg::Environment {
        cfg::Environment::with_prefix("GROUPWATCH")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("scan.watch_list")
            .with_list_parse_key("scan.relations")
    }

    fn load_layers(
        config_dir: &Path,
        env_name: &str,
        environment: cfg::Environment,
    ) -> Result<Settings, ConfigError> {
        debug!("Reading configuration sources from {:?}", config_dir);
        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }
}
