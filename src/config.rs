//! Configuration types for nsfc-report-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for [`ReportDownloader`](crate::ReportDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`transport`](TransportConfig): upstream origin, headers, timeouts, transient retry
/// - [`locator`](LocatorConfig): page-count discovery
/// - [`fetch`](FetchConfig): per-page retry ceilings, pacing, output encoding
/// - [`persistence`](PersistenceConfig): catalog database and upload directory
/// - [`api`](ApiConfig): REST API server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Upstream HTTP settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Page locator settings
    #[serde(default)]
    pub locator: LocatorConfig,

    /// Page fetching and assembly settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Catalog storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a TOML file, filling unspecified fields with defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| Error::Config {
            message: message.to_string(),
            key: Some(key.to_string()),
        };

        if url::Url::parse(&self.transport.origin).is_err() {
            return Err(invalid("transport.origin", "origin must be an absolute URL"));
        }
        if self.locator.ceiling == 0 {
            return Err(invalid("locator.ceiling", "ceiling must be at least 1"));
        }
        if self.locator.candidates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(
                "locator.candidates",
                "candidates must be strictly increasing",
            ));
        }
        if self.fetch.resolve_attempts == 0 || self.fetch.download_attempts == 0 {
            return Err(invalid("fetch", "attempt ceilings must be at least 1"));
        }
        if self.fetch.page_delay_min > self.fetch.page_delay_max {
            return Err(invalid(
                "fetch.page_delay_min",
                "page_delay_min must not exceed page_delay_max",
            ));
        }
        if self.fetch.max_consecutive_failures == 0 {
            return Err(invalid(
                "fetch.max_consecutive_failures",
                "threshold must be at least 1",
            ));
        }
        if !(self.fetch.resolution_dpi > 0.0) {
            return Err(invalid("fetch.resolution_dpi", "resolution must be positive"));
        }
        if !(1..=100).contains(&self.fetch.jpeg_quality) {
            return Err(invalid("fetch.jpeg_quality", "quality must be in 1..=100"));
        }
        Ok(())
    }
}

/// Upstream HTTP configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransportConfig {
    /// Portal origin; every request carries it as `Origin` and `{origin}/` as `Referer`
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Browser User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header value
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Timeout for the cookie handshake against the origin (default: 10s)
    #[serde(default = "default_handshake_timeout", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub handshake_timeout: Duration,

    /// Timeout for locating-API calls (default: 15s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub request_timeout: Duration,

    /// Timeout for page image downloads (default: 20s)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub download_timeout: Duration,

    /// Automatic retry for rate-limit and server-error responses
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            handshake_timeout: default_handshake_timeout(),
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry behavior for transient HTTP failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// HTTP statuses treated as transient (default: 429, 500, 502, 503, 504)
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

/// Statuses the portal uses for throttling and temporary outages
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

impl RetryConfig {
    /// Whether `status` is in [`retry_statuses`](Self::retry_statuses)
    pub fn is_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            retry_statuses: default_retry_statuses(),
        }
    }
}

/// Page-count discovery configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LocatorConfig {
    /// Run the locator before fetching (default: true)
    ///
    /// When disabled, progress falls back to the open-ended percentage curve.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Probe ladder for the upper-bound search; doubling continues past the last entry
    #[serde(default = "default_candidates")]
    pub candidates: Vec<u32>,

    /// Highest page index ever probed or fetched (default: 10000)
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,

    /// Wait before the single retry of a transient probe (default: 1s)
    #[serde(default = "default_probe_retry_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub probe_retry_delay: Duration,

    /// Confirm a Found probe by checking the resolved image URL (default: true)
    #[serde(default = "default_true")]
    pub verify_resources: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            candidates: default_candidates(),
            ceiling: default_ceiling(),
            probe_retry_delay: default_probe_retry_delay(),
            verify_resources: true,
        }
    }
}

/// Linear wait schedule: `base + step * attempt`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LinearBackoff {
    /// Constant part of every wait
    #[serde(with = "duration_serde")]
    #[schema(value_type = f64)]
    pub base: Duration,
    /// Growth per failed attempt
    #[serde(with = "duration_serde")]
    #[schema(value_type = f64)]
    pub step: Duration,
}

impl LinearBackoff {
    /// Wait after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base + self.step * attempt
    }

    /// No waiting at all (tests)
    pub const ZERO: LinearBackoff = LinearBackoff {
        base: Duration::ZERO,
        step: Duration::ZERO,
    };
}

/// Page fetching and report assembly configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Attempts at resolving one page before treating it as the end (default: 3)
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: u32,

    /// Wait between resolve attempts (default: 2s × attempt)
    #[serde(default = "default_resolve_backoff")]
    pub resolve_backoff: LinearBackoff,

    /// Attempts at downloading one page image (default: 5)
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Wait between download attempts (default: 2s + 1s × attempt)
    #[serde(default = "default_download_backoff")]
    pub download_backoff: LinearBackoff,

    /// Lower bound of the randomized pause between pages (default: 1.5s)
    #[serde(default = "default_page_delay_min", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub page_delay_min: Duration,

    /// Upper bound of the randomized pause between pages (default: 3.5s)
    #[serde(default = "default_page_delay_max", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub page_delay_max: Duration,

    /// Consecutive unrecoverable pages that abort the build (default: 3)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Output resolution in dots per inch (default: 100)
    #[serde(default = "default_resolution_dpi")]
    pub resolution_dpi: f32,

    /// JPEG quality for embedded pages (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            resolve_attempts: default_resolve_attempts(),
            resolve_backoff: default_resolve_backoff(),
            download_attempts: default_download_attempts(),
            download_backoff: default_download_backoff(),
            page_delay_min: default_page_delay_min(),
            page_delay_max: default_page_delay_max(),
            max_consecutive_failures: default_max_consecutive_failures(),
            resolution_dpi: default_resolution_dpi(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Catalog storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./nsfc.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,

    /// Directory for built and uploaded report files (default: "./uploads")
    #[serde(default = "default_upload_dir")]
    #[schema(value_type = String)]
    pub upload_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            upload_dir: default_upload_dir(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5002)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Maximum accepted upload size in bytes (default: 1000 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_origin() -> String {
    "https://kd.nsfc.cn".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9,en;q=0.8".to_string()
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

fn default_candidates() -> Vec<u32> {
    vec![50, 100, 200, 500, 1000]
}

fn default_ceiling() -> u32 {
    10_000
}

fn default_probe_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_resolve_attempts() -> u32 {
    3
}

fn default_resolve_backoff() -> LinearBackoff {
    LinearBackoff {
        base: Duration::ZERO,
        step: Duration::from_secs(2),
    }
}

fn default_download_attempts() -> u32 {
    5
}

fn default_download_backoff() -> LinearBackoff {
    LinearBackoff {
        base: Duration::from_secs(2),
        step: Duration::from_secs(1),
    }
}

fn default_page_delay_min() -> Duration {
    Duration::from_millis(1500)
}

fn default_page_delay_max() -> Duration {
    Duration::from_millis(3500)
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_resolution_dpi() -> f32 {
    100.0
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./nsfc.db")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5002))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    1000 * 1024 * 1024
}

// Durations are written as (fractional) seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
