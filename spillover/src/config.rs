//! Configuration for the two regions and the routing policy.
//!
//! Loaded from a TOML file. Region credentials and endpoints are consumed
//! as-is; everything else has a default. Validation runs up front so a bad
//! configuration fails before any work begins.

use crate::asset::PrimaryFallback;
use crate::error::{Result, SpilloverError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Backlog depth at which requests overflow to the backup region.
pub const DEFAULT_QUEUE_THRESHOLD: usize = 3;

/// Default encode profile handed to the processor.
pub const DEFAULT_ENCODE_PROFILE: &str = "Content Adaptive Multiple Bitrate MP4";

/// Default processor name looked up in the catalog.
pub const DEFAULT_ENCODER_NAME: &str = "Media Encoder Standard";

/// Identity, endpoint, and storage settings for one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionSettings {
    /// AAD tenant domain.
    pub tenant: String,
    /// Client id of the service principal.
    pub client_id: String,
    /// Client secret of the service principal.
    pub client_secret: String,
    /// Job-submission endpoint URI.
    pub job_endpoint: String,
    /// Storage connection string for the region's account.
    pub storage_connection_string: String,
}

impl RegionSettings {
    fn validate(&self, label: &str) -> Result<()> {
        for (field, value) in [
            ("tenant", &self.tenant),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("job_endpoint", &self.job_endpoint),
            ("storage_connection_string", &self.storage_connection_string),
        ] {
            if value.trim().is_empty() {
                return Err(SpilloverError::Config(format!(
                    "missing {label}.{field}"
                )));
            }
        }
        Ok(())
    }
}

/// Full router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pending-job count at or above which work overflows to backup.
    #[serde(default = "default_threshold")]
    pub queue_threshold: usize,
    /// Delete backup-region artifacts after a successful round trip.
    #[serde(default = "default_true")]
    pub cleanup_backup: bool,
    /// Encode profile handed to the processor.
    #[serde(default = "default_profile")]
    pub encode_profile: String,
    /// Processor name looked up in the catalog.
    #[serde(default = "default_encoder")]
    pub encoder_name: String,
    /// Bound on the job wait, in seconds.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Retries for region calls before failing the request.
    #[serde(default = "default_region_retries")]
    pub region_retries: u32,
    /// Base delay between retries, in milliseconds. Doubles per attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Policy when no copied file qualifies as primary.
    #[serde(default)]
    pub primary_fallback: PrimaryFallback,
    /// Primary region.
    #[serde(default)]
    pub primary: RegionSettings,
    /// Backup region.
    #[serde(default)]
    pub backup: RegionSettings,
}

fn default_threshold() -> usize {
    DEFAULT_QUEUE_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    DEFAULT_ENCODE_PROFILE.to_string()
}

fn default_encoder() -> String {
    DEFAULT_ENCODER_NAME.to_string()
}

fn default_job_timeout_secs() -> u64 {
    3600
}

fn default_region_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_threshold: default_threshold(),
            cleanup_backup: true,
            encode_profile: default_profile(),
            encoder_name: default_encoder(),
            job_timeout_secs: default_job_timeout_secs(),
            region_retries: default_region_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            primary_fallback: PrimaryFallback::default(),
            primary: RegionSettings::default(),
            backup: RegionSettings::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SpilloverError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)
            .map_err(|e| SpilloverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail mid-request.
    pub fn validate(&self) -> Result<()> {
        self.primary.validate("primary")?;
        self.backup.validate("backup")?;
        if self.encoder_name.trim().is_empty() {
            return Err(SpilloverError::Config("missing encoder_name".into()));
        }
        if self.encode_profile.trim().is_empty() {
            return Err(SpilloverError::Config("missing encode_profile".into()));
        }
        if self.job_timeout_secs == 0 {
            return Err(SpilloverError::Config("job_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Bound on the job wait.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Base delay between region-call retries.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_toml(label: &str) -> String {
        format!(
            r#"
            [{label}]
            tenant = "{label}.example.net"
            client_id = "client"
            client_secret = "secret"
            job_endpoint = "https://{label}.example.net/api"
            storage_connection_string = "DefaultEndpointsProtocol=https;AccountName={label}store;AccountKey=aGVsbG8="
            "#
        )
    }

    fn full_toml() -> String {
        format!("{}\n{}", region_toml("primary"), region_toml("backup"))
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml(&full_toml()).unwrap();
        assert_eq!(config.queue_threshold, 3);
        assert!(config.cleanup_backup);
        assert_eq!(config.encoder_name, DEFAULT_ENCODER_NAME);
        assert_eq!(config.job_timeout(), Duration::from_secs(3600));
        assert_eq!(config.primary_fallback, PrimaryFallback::None);
    }

    #[test]
    fn test_overrides() {
        let raw = format!(
            "queue_threshold = 7\ncleanup_backup = false\nprimary_fallback = \"first_file\"\n{}",
            full_toml()
        );
        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.queue_threshold, 7);
        assert!(!config.cleanup_backup);
        assert_eq!(config.primary_fallback, PrimaryFallback::FirstFile);
    }

    #[test]
    fn test_missing_region_rejected() {
        let err = Config::from_toml(&region_toml("primary")).unwrap_err();
        assert!(err.to_string().contains("backup."), "{err}");
    }

    #[test]
    fn test_blank_field_rejected() {
        let raw = full_toml().replace("client_id = \"client\"", "client_id = \"  \"");
        let err = Config::from_toml(&raw).unwrap_err();
        assert!(matches!(err, SpilloverError::Config(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spillover.toml");
        std::fs::write(&path, full_toml()).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.queue_threshold, 3);
    }
}
