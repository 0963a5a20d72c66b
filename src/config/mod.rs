//! Configuration handling for the application.
//!
//! Everything the core consumes is loaded here from environment variables
//! with sensible development defaults, so deployments can tune the pool and
//! the filter without code changes. `Config::from_env` performs that loading
//! and validates the numeric fields.

use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::pipeline::FilterConfig;
use crate::renderer::{AcquireMode, PoolConfig, ResourceKind};

/// Environment variable names. Keeping them public lets tests and deployment
/// tooling refer to them directly.
pub const ENV_POOL_CAPACITY: &str = "PAGEMILL_POOL_CAPACITY";
pub const ENV_NAV_TIMEOUT_MS: &str = "PAGEMILL_NAV_TIMEOUT_MS";
pub const ENV_ACQUIRE_WAIT_MS: &str = "PAGEMILL_ACQUIRE_WAIT_MS";
pub const ENV_CHROME_PATH: &str = "PAGEMILL_CHROME_PATH";
pub const ENV_DENYLIST_TAGS: &str = "PAGEMILL_DENYLIST_TAGS";
pub const ENV_MEANINGFUL_TAGS: &str = "PAGEMILL_MEANINGFUL_TAGS";
pub const ENV_BLOCKED_RESOURCES: &str = "PAGEMILL_BLOCKED_RESOURCES";
pub const ENV_STRIP_DATA_URIS: &str = "PAGEMILL_STRIP_DATA_URIS";

/// Default development values used when environment variables are absent.
const DEFAULT_POOL_CAPACITY: usize = 5;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_DENYLIST_TAGS: &str = "script,style,link,javascript";
const DEFAULT_MEANINGFUL_TAGS: &str = "pre,code,iframe,template,object,svg,form,canvas";
const DEFAULT_BLOCKED_RESOURCES: &str = "image,stylesheet,font";

/// Application runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pool_capacity: usize,
    nav_timeout: Duration,
    acquire_wait: Option<Duration>,
    chrome_path: Option<String>,
    denylist_tags: Vec<String>,
    meaningful_tags: Vec<String>,
    blocked_resources: HashSet<ResourceKind>,
    strip_data_uris: bool,
}

impl Config {
    /// Load from environment variables, falling back to development
    /// defaults. Fails only when a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pool_capacity = match env::var(ENV_POOL_CAPACITY) {
            Ok(raw) => parse_field(ENV_POOL_CAPACITY, &raw)?,
            Err(_) => DEFAULT_POOL_CAPACITY,
        };
        if pool_capacity < 1 {
            return Err(ConfigError::InvalidValue {
                field: ENV_POOL_CAPACITY,
                reason: "pool capacity must be at least 1".to_string(),
            });
        }

        let nav_timeout_ms: u64 = match env::var(ENV_NAV_TIMEOUT_MS) {
            Ok(raw) => parse_field(ENV_NAV_TIMEOUT_MS, &raw)?,
            Err(_) => DEFAULT_NAV_TIMEOUT_MS,
        };
        if nav_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_NAV_TIMEOUT_MS,
                reason: "navigation timeout must be positive".to_string(),
            });
        }

        // Zero or absent means immediate rejection when the pool is busy.
        let acquire_wait = match env::var(ENV_ACQUIRE_WAIT_MS) {
            Ok(raw) => {
                let ms: u64 = parse_field(ENV_ACQUIRE_WAIT_MS, &raw)?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
            Err(_) => None,
        };

        let chrome_path = env::var(ENV_CHROME_PATH).ok().filter(|p| !p.is_empty());

        let denylist_tags = tag_list(
            &env::var(ENV_DENYLIST_TAGS).unwrap_or_else(|_| DEFAULT_DENYLIST_TAGS.to_string()),
        );
        let meaningful_tags = tag_list(
            &env::var(ENV_MEANINGFUL_TAGS).unwrap_or_else(|_| DEFAULT_MEANINGFUL_TAGS.to_string()),
        );

        let blocked_raw = env::var(ENV_BLOCKED_RESOURCES)
            .unwrap_or_else(|_| DEFAULT_BLOCKED_RESOURCES.to_string());
        let mut blocked_resources = HashSet::new();
        for label in blocked_raw.split(',').filter(|l| !l.trim().is_empty()) {
            let kind = ResourceKind::parse(label).ok_or_else(|| ConfigError::InvalidValue {
                field: ENV_BLOCKED_RESOURCES,
                reason: format!("unknown resource kind '{}'", label.trim()),
            })?;
            blocked_resources.insert(kind);
        }

        let strip_data_uris = match env::var(ENV_STRIP_DATA_URIS) {
            Ok(raw) => match raw.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_STRIP_DATA_URIS,
                        reason: format!("expected a boolean, got '{other}'"),
                    });
                }
            },
            Err(_) => true,
        };

        Ok(Self {
            pool_capacity,
            nav_timeout: Duration::from_millis(nav_timeout_ms),
            acquire_wait,
            chrome_path,
            denylist_tags,
            meaningful_tags,
            blocked_resources,
            strip_data_uris,
        })
    }

    /// Number of render handles kept in the pool.
    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    /// Upper bound for a single page navigation.
    pub fn nav_timeout(&self) -> Duration {
        self.nav_timeout
    }

    /// Explicit Chromium executable path, if configured.
    pub fn chrome_path(&self) -> Option<&str> {
        self.chrome_path.as_deref()
    }

    /// Resource kinds the renderer aborts before they hit the network.
    pub fn blocked_resources(&self) -> &HashSet<ResourceKind> {
        &self.blocked_resources
    }

    /// Pool settings derived from this configuration.
    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            capacity: self.pool_capacity,
            acquire: match self.acquire_wait {
                Some(wait) => AcquireMode::Wait(wait),
                None => AcquireMode::Reject,
            },
        }
    }

    /// Content-filter settings derived from this configuration.
    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            denylist: self.denylist_tags.clone(),
            meaningful_containers: self.meaningful_tags.clone(),
            strip_data_uris: self.strip_data_uris,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            nav_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            acquire_wait: None,
            chrome_path: None,
            denylist_tags: tag_list(DEFAULT_DENYLIST_TAGS),
            meaningful_tags: tag_list(DEFAULT_MEANINGFUL_TAGS),
            blocked_resources: HashSet::from([
                ResourceKind::Image,
                ResourceKind::Stylesheet,
                ResourceKind::Font,
            ]),
            strip_data_uris: true,
        }
    }
}

fn tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("could not parse '{raw}'"),
    })
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Ensure environment-variable manipulating tests run serially.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            ENV_POOL_CAPACITY,
            ENV_NAV_TIMEOUT_MS,
            ENV_ACQUIRE_WAIT_MS,
            ENV_CHROME_PATH,
            ENV_DENYLIST_TAGS,
            ENV_MEANINGFUL_TAGS,
            ENV_BLOCKED_RESOURCES,
            ENV_STRIP_DATA_URIS,
        ] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_when_env_missing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.pool_capacity(), DEFAULT_POOL_CAPACITY);
        assert_eq!(cfg.nav_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.pool().acquire, AcquireMode::Reject);
        assert!(cfg.filter().denylist.contains(&"script".to_string()));
        assert!(!cfg.filter().denylist.contains(&"footer".to_string()));
        assert!(cfg.blocked_resources().contains(&ResourceKind::Image));
    }

    #[test]
    fn overrides_when_env_present() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_POOL_CAPACITY, "8");
            env::set_var(ENV_ACQUIRE_WAIT_MS, "1500");
            env::set_var(ENV_DENYLIST_TAGS, "script,style,link,javascript,footer");
            env::set_var(ENV_BLOCKED_RESOURCES, "image,media");
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.pool_capacity(), 8);
        assert_eq!(
            cfg.pool().acquire,
            AcquireMode::Wait(Duration::from_millis(1500))
        );
        assert!(cfg.filter().denylist.contains(&"footer".to_string()));
        assert!(cfg.blocked_resources().contains(&ResourceKind::Media));
        assert!(!cfg.blocked_resources().contains(&ResourceKind::Font));
        clear_env();
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_POOL_CAPACITY, "0");
        }
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn unknown_resource_kind_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_BLOCKED_RESOURCES, "image,carrier-pigeon");
        }
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
