//! Cache configuration

use crate::credentials::Credentials;
use crate::dispatch::{OverflowPolicy, DEFAULT_MAX_OUTSTANDING};
use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOCAL_CAPACITY: u64 = 1024 * 1024 * 1024; // 1GB
const DEFAULT_S3_MAX_RETRIES: u32 = 10;
const DEFAULT_S3_TIMEOUT_SECS: u64 = 30;

/// Transport settings for the remote tier
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Custom S3-compatible endpoint; AWS when `None`
    pub endpoint: Option<String>,
    /// Static key pair. When `None` the client looks for web identity,
    /// container or instance credentials.
    pub credentials: Option<Credentials>,
    /// Send unsigned requests (public buckets)
    pub anonymous: bool,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            credentials: None,
            anonymous: false,
            max_retries: DEFAULT_S3_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_S3_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory for the local tier; a fresh temporary directory when `None`
    pub local_dir: Option<PathBuf>,
    pub local_capacity_bytes: u64,
    /// e.g. `https://s3-us-west-2.amazonaws.com/my-bucket`
    pub bucket_url: String,
    pub s3: S3Settings,
    pub max_outstanding_tasks: usize,
    pub overflow: OverflowPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_dir: None,
            local_capacity_bytes: DEFAULT_LOCAL_CAPACITY,
            bucket_url: String::new(),
            s3: S3Settings::default(),
            max_outstanding_tasks: DEFAULT_MAX_OUTSTANDING,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl CacheConfig {
    pub fn new(
        local_dir: Option<PathBuf>,
        local_capacity_bytes: u64,
        bucket_url: impl Into<String>,
    ) -> Self {
        Self {
            local_dir,
            local_capacity_bytes,
            bucket_url: bucket_url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `DISKS3CACHE_*` and `AWS_*` environment
    /// variables and the shared AWS credentials file
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup. Unparseable numbers fall
    /// back to their defaults; an unknown overflow policy or a half-set AWS
    /// key pair is an error.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let local_dir = non_empty("DISKS3CACHE_DIR").map(PathBuf::from);

        let local_capacity_bytes = non_empty("DISKS3CACHE_MAX_BYTES")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.local_capacity_bytes);

        let bucket_url = non_empty("DISKS3CACHE_BUCKET_URL").unwrap_or_default();

        let max_outstanding_tasks = non_empty("DISKS3CACHE_MAX_OUTSTANDING")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_outstanding_tasks);

        let overflow = match non_empty("DISKS3CACHE_OVERFLOW") {
            Some(policy) => policy.parse()?,
            None => defaults.overflow,
        };

        let max_retries = non_empty("DISKS3CACHE_S3_MAX_RETRIES")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_S3_MAX_RETRIES);

        let timeout = non_empty("DISKS3CACHE_S3_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_S3_TIMEOUT_SECS));

        let anonymous = non_empty("DISKS3CACHE_S3_ANONYMOUS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let credentials = if anonymous {
            None
        } else {
            Credentials::resolve(&var)?
        };

        Ok(Self {
            local_dir,
            local_capacity_bytes,
            bucket_url,
            s3: S3Settings {
                endpoint: non_empty("DISKS3CACHE_S3_ENDPOINT"),
                credentials,
                anonymous,
                max_retries,
                timeout,
            },
            max_outstanding_tasks,
            overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.local_dir.is_none());
        assert_eq!(config.local_capacity_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.max_outstanding_tasks, 1024);
        assert_eq!(config.overflow, OverflowPolicy::Block);
        assert_eq!(config.s3.max_retries, 10);
        assert_eq!(config.s3.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_vars_empty_uses_defaults() {
        let config = CacheConfig::from_vars(lookup(&[])).unwrap();
        assert!(config.local_dir.is_none());
        assert!(config.bucket_url.is_empty());
        assert!(config.s3.credentials.is_none());
        assert!(!config.s3.anonymous);
        assert!(config.s3.endpoint.is_none());
    }

    #[test]
    fn test_from_vars_reads_everything() {
        let config = CacheConfig::from_vars(lookup(&[
            ("DISKS3CACHE_DIR", "/var/cache/http"),
            ("DISKS3CACHE_MAX_BYTES", "2048"),
            ("DISKS3CACHE_BUCKET_URL", "https://s3-us-west-2.amazonaws.com/b"),
            ("DISKS3CACHE_S3_ENDPOINT", "http://localhost:9000"),
            ("DISKS3CACHE_S3_MAX_RETRIES", "3"),
            ("DISKS3CACHE_S3_TIMEOUT_SECS", "5"),
            ("DISKS3CACHE_MAX_OUTSTANDING", "16"),
            ("DISKS3CACHE_OVERFLOW", "drop"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.local_dir, Some(PathBuf::from("/var/cache/http")));
        assert_eq!(config.local_capacity_bytes, 2048);
        assert_eq!(config.bucket_url, "https://s3-us-west-2.amazonaws.com/b");
        assert_eq!(config.s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.s3.max_retries, 3);
        assert_eq!(config.s3.timeout, Duration::from_secs(5));
        assert_eq!(config.max_outstanding_tasks, 16);
        assert_eq!(config.overflow, OverflowPolicy::Drop);
        let credentials = config.s3.credentials.unwrap();
        assert_eq!(credentials.access_key_id, "AKID");
        assert!(credentials.session_token.is_none());
    }

    #[test]
    fn test_empty_dir_means_temporary() {
        let config = CacheConfig::from_vars(lookup(&[("DISKS3CACHE_DIR", "")])).unwrap();
        assert!(config.local_dir.is_none());
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config =
            CacheConfig::from_vars(lookup(&[("DISKS3CACHE_MAX_BYTES", "lots")])).unwrap();
        assert_eq!(config.local_capacity_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_unknown_overflow_policy_is_error() {
        let result = CacheConfig::from_vars(lookup(&[("DISKS3CACHE_OVERFLOW", "maybe")]));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_half_credentials_is_error() {
        let result = CacheConfig::from_vars(lookup(&[("AWS_ACCESS_KEY_ID", "AKID")]));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_shared_credentials_file_is_used() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".aws")).unwrap();
        std::fs::write(
            home.path().join(".aws").join("credentials"),
            "[default]\naws_access_key_id = AKIDFILE\naws_secret_access_key = file-secret\n",
        )
        .unwrap();

        let config = CacheConfig::from_vars(lookup(&[
            ("HOME", home.path().to_str().unwrap()),
            ("DISKS3CACHE_BUCKET_URL", "https://s3-us-west-2.amazonaws.com/b"),
        ]))
        .unwrap();

        let credentials = config.s3.credentials.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDFILE");
        assert_eq!(credentials.secret_access_key, "file-secret");
    }

    #[test]
    fn test_anonymous_skips_credentials() {
        let config = CacheConfig::from_vars(lookup(&[
            ("DISKS3CACHE_S3_ANONYMOUS", "true"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();
        assert!(config.s3.anonymous);
        assert!(config.s3.credentials.is_none());
    }
}
