use crate::error::{ScrapeError, ScrapeResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const MOB_DB_QUERY: &str = "page=mob_db&f=1&mlvsn=0&mlv=&mlv2=&bxpsn=0&exp=&exp2=&jxpsn=0&jexp=&jexp2=&rgc=0&mob_name=&mvp=0&flee=&dr=95&hit=&hr=100&aggr=0&minib=0&assi=0&immu=0&loot=0&imkb=0&det=0&sense=0&immo=0&sench=0&natk=0&chcha=0&plt=0&chtar=0&nspawn=1&sort_r=0&sort_o=0&mob_search=Search";

const ITEM_DB_QUERY: &str = "page=item_db&itype=6&iclass=0&tabj=on&iju=-1&iname=&idesc=&iscript=&islot_sign=-1&islot=-1&icfix=&i_ele=-1&i_status=-1&i_race=-1&i_bonus=-1&hnd=1&hns=1&sort_r=0&sort_o=0&isearch=Search";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records processed at once within a single page
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default = "CatalogConfig::monsters")]
    pub monsters: CatalogConfig,

    #[serde(default = "CatalogConfig::items")]
    pub items: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Maximum number of retry attempts for failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression
    #[serde(default = "default_true")]
    pub enable_compression: bool,

    #[serde(default = "default_referer")]
    pub referer: String,
}

/// Settings for one listing on the site (monster database or item database)
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub output_dir: PathBuf,

    /// Pause between page fetches in milliseconds
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    /// Query string appended to `base_url`, without the leading `?`
    pub base_query: String,

    pub csv_file: PathBuf,
    pub json_file: PathBuf,

    /// Follow `page_num` until an empty page; when false only page 1 is read
    #[serde(default = "default_true")]
    pub paginate: bool,

    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Separator between multiple display names in one label
    #[serde(default = "default_name_delimiter")]
    pub name_delimiter: String,
}

fn default_true() -> bool { true }
fn default_base_url() -> String { "https://ratemyserver.net/index.php".to_string() }
fn default_concurrency() -> usize { 4 }
fn default_max_retries() -> usize { 2 }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 8000 }
fn default_timeout() -> u64 { 30 }
fn default_referer() -> String { "https://ratemyserver.net/".to_string() }
fn default_delay() -> u64 { 1000 }
fn default_name_delimiter() -> String { " / ".to_string() }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            timeout_secs: default_timeout(),
            enable_cookies: true,
            enable_compression: true,
            referer: default_referer(),
        }
    }
}

impl CatalogConfig {
    pub fn monsters() -> Self {
        Self {
            output_dir: PathBuf::from("monster_gifs"),
            delay_ms: default_delay(),
            base_query: MOB_DB_QUERY.to_string(),
            csv_file: PathBuf::from("monsters.csv"),
            json_file: PathBuf::from("monsters.json"),
            paginate: true,
            max_pages: None,
            name_delimiter: default_name_delimiter(),
        }
    }

    /// The item listing is served as a single page
    pub fn items() -> Self {
        Self {
            output_dir: PathBuf::from("monster_cards"),
            delay_ms: default_delay(),
            base_query: ITEM_DB_QUERY.to_string(),
            csv_file: PathBuf::from("cards.csv"),
            json_file: PathBuf::from("cards.json"),
            paginate: false,
            max_pages: None,
            name_delimiter: default_name_delimiter(),
        }
    }

    /// URL of a 1-indexed listing page. Page 1 carries no `page_num` parameter.
    pub fn page_url(&self, base_url: &str, page: u32) -> String {
        let query = self.base_query.trim_start_matches('?');
        let mut url = if query.is_empty() {
            base_url.to_string()
        } else {
            format!("{}?{}", base_url, query)
        };
        if page > 1 {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str(&format!("page_num={}", page));
        }
        url
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            concurrency: default_concurrency(),
            http: HttpConfig::default(),
            monsters: CatalogConfig::monsters(),
            items: CatalogConfig::items(),
        }
    }
}

impl Config {
    /// Load `path`, or defaults when it is absent or invalid.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> ScrapeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ScrapeResult<Self> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| ScrapeError::config(e.to_string()))?;
        if cfg.concurrency == 0 {
            return Err(ScrapeError::config("concurrency must be at least 1"));
        }
        Ok(cfg)
    }
}

impl HttpConfig {
    /// Create an enhanced HTTP client from this configuration
    pub fn create_http_client(&self) -> ScrapeResult<crate::http_client::EnhancedHttpClient> {
        use crate::http_client::{EnhancedHttpClient, HttpClientConfig};
        use std::time::Duration;

        let config = HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
            referer: Some(self.referer.clone()),
        };

        EnhancedHttpClient::with_config(config)
    }
}
