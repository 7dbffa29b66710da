//! Resolved, immutable run configuration.
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ValueError;
use crate::retry::RetryPolicy;
use crate::utils::{check_bucket_name, check_tenant_name, _VALID_ENDPOINT};

pub const DEFAULT_ENDPOINT: &str = "https://rgw.cscs.ch";
/// Not used for unsigned requests; kept for reference and diagnostics.
pub const DEFAULT_REGION: &str = "cscs-zonegroup";
pub const DEFAULT_BUCKET: &str = "sdc3-simdata";
pub const DEFAULT_TENANT: &str = "ska";
pub const DEFAULT_DEST: &str = "./download";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_KEYS_LIMIT: usize = 1000;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A `ConfigBuilder` can be used to create a [`Config`] with custom values.
///
/// Every field starts from the public SDC3 dataset defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    endpoint: String,
    region: String,
    bucket: String,
    tenant: String,
    dest: PathBuf,
    prefix: Option<String>,
    retry: RetryPolicy,
    concurrency: usize,
    max_keys: usize,
    idle_timeout: Duration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            dest: PathBuf::from(DEFAULT_DEST),
            prefix: None,
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            max_keys: MAX_KEYS_LIMIT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set endpoint URL of the S3 service, scheme included.
    ///
    /// Default: `https://rgw.cscs.ch`
    pub fn endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set region name. Informational only.
    pub fn region<T: Into<String>>(mut self, region: T) -> Self {
        self.region = region.into();
        self
    }

    /// Set bucket name, without tenant.
    pub fn bucket<T: Into<String>>(mut self, bucket: T) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set RGW tenant. An empty tenant addresses the bare bucket.
    pub fn tenant<T: Into<String>>(mut self, tenant: T) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Set local destination root for downloads.
    pub fn dest<P: Into<PathBuf>>(mut self, dest: P) -> Self {
        self.dest = dest.into();
        self
    }

    /// Scope every operation to a key prefix. Normalized on [`build`](Self::build).
    pub fn prefix<T: Into<String>>(mut self, prefix: Option<T>) -> Self {
        self.prefix = prefix.map(Into::into);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Maximum number of concurrent object transfers.
    ///
    /// Default: `4`.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Page size requested from the listing API, capped at 1000.
    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.min(MAX_KEYS_LIMIT);
        self
    }

    /// Longest silence tolerated from the server, before headers or between
    /// body chunks. A stalled request fails as transient and is retried.
    ///
    /// Default: 60 seconds.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn build(self) -> std::result::Result<Config, ValueError> {
        if !_VALID_ENDPOINT.is_match(&self.endpoint) {
            return Err(ValueError::new(format!(
                "Invalid endpoint `{}`, expected http(s)://host[:port]",
                self.endpoint
            )));
        }
        check_bucket_name(&self.bucket)?;
        check_tenant_name(&self.tenant)?;
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".into());
        }
        if self.max_keys == 0 {
            return Err("max-keys must be at least 1".into());
        }
        if self.idle_timeout.is_zero() {
            return Err("Idle timeout must be positive".into());
        }
        Ok(Config {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            region: self.region,
            bucket: self.bucket,
            tenant: self.tenant,
            dest: self.dest,
            prefix: normalize_prefix(self.prefix.as_deref()),
            retry: self.retry,
            concurrency: self.concurrency,
            max_keys: self.max_keys,
            idle_timeout: self.idle_timeout,
        })
    }
}

/// Everything a run needs, constructed once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    endpoint: String,
    region: String,
    bucket: String,
    tenant: String,
    dest: PathBuf,
    prefix: Option<String>,
    retry: RetryPolicy,
    concurrency: usize,
    max_keys: usize,
    idle_timeout: Duration,
}

impl Config {
    /// get a [`ConfigBuilder`] with the default values.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// The normalized prefix, `None` when the whole bucket is in scope.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The prefix as a listing scope, empty for the bucket root.
    pub fn scope(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Bucket as addressed in the request path: `tenant:bucket`, or the bare
    /// bucket when no tenant is set.
    pub fn bucket_path(&self) -> String {
        if self.tenant.is_empty() {
            self.bucket.clone()
        } else {
            format!("{}:{}", self.tenant, self.bucket)
        }
    }

    /// Human label for the scoped bucket, like `ska:sdc3-simdata/SDC3`.
    pub fn label(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", self.bucket_path(), prefix.trim_end_matches('/')),
            None => self.bucket_path(),
        }
    }
}

/// Strip leading slashes and force a trailing one; blank prefixes become `None`.
pub fn normalize_prefix(prefix: Option<&str>) -> Option<String> {
    let trimmed = prefix?.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("{}/", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.endpoint(), "https://rgw.cscs.ch");
        assert_eq!(config.region(), "cscs-zonegroup");
        assert_eq!(config.bucket_path(), "ska:sdc3-simdata");
        assert_eq!(config.dest(), Path::new("./download"));
        assert_eq!(config.prefix(), None);
        assert_eq!(config.scope(), "");
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.max_keys(), 1000);
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_bare_bucket_without_tenant() {
        let config = Config::builder().tenant("").build().unwrap();
        assert_eq!(config.bucket_path(), "sdc3-simdata");
        assert_eq!(config.label(), "sdc3-simdata");
    }

    #[test]
    fn test_prefix_normalized() {
        assert_eq!(normalize_prefix(None), None);
        assert_eq!(normalize_prefix(Some("")), None);
        assert_eq!(normalize_prefix(Some("/")), None);
        assert_eq!(normalize_prefix(Some("SDC3")), Some("SDC3/".to_string()));
        assert_eq!(normalize_prefix(Some("/SDC3/image/")), Some("SDC3/image/".to_string()));

        let config = Config::builder().prefix(Some("SDC3/image")).build().unwrap();
        assert_eq!(config.scope(), "SDC3/image/");
        assert_eq!(config.label(), "ska:sdc3-simdata/SDC3/image");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::builder().endpoint("rgw.cscs.ch").build().is_err());
        assert!(Config::builder().bucket("B").build().is_err());
        assert!(Config::builder().tenant("a:b").build().is_err());
        assert!(Config::builder().concurrency(0).build().is_err());
        assert!(Config::builder().max_keys(0).build().is_err());
        assert!(Config::builder().idle_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed_and_max_keys_capped() {
        let config = Config::builder()
            .endpoint("http://localhost:9000/")
            .max_keys(5000)
            .build()
            .unwrap();
        assert_eq!(config.endpoint(), "http://localhost:9000");
        assert_eq!(config.max_keys(), 1000);
    }
}
