use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use chrono_tz::Tz;

use crate::{
    error::{EtlError, Result},
    publish::S3Settings,
    upstream::{Coordinate, UpstreamSettings},
};

pub const DEFAULT_CONNECTION_ID: &str = "weathermap_api";
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_BUCKET: &str = "weather-s3bucket";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TIMEZONE: &str = "Asia/Kuala_Lumpur";

/// Weather API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Name of the connection the key was issued under, for log context.
    pub connection_id: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connection_id: DEFAULT_CONNECTION_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Queried coordinate and the zone sunrise/sunset are reported in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            lat: 1.3521,
            lon: 103.8198,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Destination bucket and the session credentials used to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsS3Config {
    #[serde(rename = "AWS_ACCESS_KEY_ID", skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY", skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(rename = "AWS_TOKEN", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub bucket: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl Default for AwsS3Config {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            token: None,
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Where artifacts are written before upload. Defaults to the OS temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [upstream]
/// api_key = "..."
///
/// [aws_s3]
/// AWS_ACCESS_KEY_ID = "..."
/// AWS_SECRET_ACCESS_KEY = "..."
/// AWS_TOKEN = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub location: LocationConfig,
    pub aws_s3: AwsS3Config,
    pub output: OutputConfig,
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to the default location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-etl", "weather-etl").ok_or_else(|| {
            EtlError::Config("could not determine platform config directory".into())
        })?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.upstream.api_key = Some(api_key);
    }

    pub fn set_aws_credentials(
        &mut self,
        access_key_id: String,
        secret_access_key: String,
        token: Option<String>,
    ) {
        self.aws_s3.access_key_id = Some(access_key_id);
        self.aws_s3.secret_access_key = Some(secret_access_key);
        self.aws_s3.token = token.filter(|t| !t.is_empty());
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.location.timezone.parse::<Tz>().map_err(|_| {
            EtlError::Config(format!(
                "unknown timezone '{}' in [location].timezone",
                self.location.timezone
            ))
        })
    }

    pub fn coordinate(&self) -> Result<Coordinate> {
        Coordinate::new(self.location.lat, self.location.lon)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.output
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn upstream_settings(&self) -> Result<UpstreamSettings> {
        let api_key = non_empty(self.upstream.api_key.as_deref()).ok_or_else(|| {
            EtlError::Config(format!(
                "no API key configured for connection '{}'.\n\
                 Hint: set [upstream].api_key or run `weather-etl configure`.",
                self.upstream.connection_id
            ))
        })?;

        Ok(UpstreamSettings {
            connection_id: self.upstream.connection_id.clone(),
            base_url: self.upstream.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            coordinate: self.coordinate()?,
            timeout: Duration::from_secs(self.upstream.timeout_secs),
        })
    }

    pub fn s3_settings(&self) -> Result<S3Settings> {
        let missing = |key: &str| {
            EtlError::Config(format!(
                "missing aws_s3.{key}.\n\
                 Hint: set it in the config file or run `weather-etl configure`."
            ))
        };

        let access_key_id = non_empty(self.aws_s3.access_key_id.as_deref())
            .ok_or_else(|| missing("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = non_empty(self.aws_s3.secret_access_key.as_deref())
            .ok_or_else(|| missing("AWS_SECRET_ACCESS_KEY"))?;

        if self.aws_s3.bucket.trim().is_empty() {
            return Err(EtlError::Config("aws_s3.bucket cannot be empty".into()));
        }

        Ok(S3Settings {
            bucket: self.aws_s3.bucket.clone(),
            region: self.aws_s3.region.clone(),
            endpoint: self.aws_s3.endpoint.clone(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: non_empty(self.aws_s3.token.as_deref()).map(str::to_string),
            force_path_style: self.aws_s3.force_path_style,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
