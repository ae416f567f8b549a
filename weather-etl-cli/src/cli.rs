use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Text};
use serde_json::Value;
use tracing::info;
use weather_etl_core::{
    COLUMNS, Config, OpenWeatherClient, Pipeline, RunReport, S3ObjectStore, WeatherSource,
    read_artifact,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-etl",
    version,
    about = "Fetch current weather, normalize it and publish it as CSV to S3"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "WEATHER_ETL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// One scheduled invocation: probe, extract, transform and load.
    Run,

    /// Check that the weather API answers HTTP 200.
    Probe,

    /// Fetch the current payload and print it as JSON.
    Extract,

    /// Transform and load a payload saved earlier.
    Load {
        /// JSON file holding the payload, or `-` for stdin.
        #[arg(long)]
        payload: PathBuf,
    },

    /// Print the record stored in a CSV artifact.
    Inspect {
        /// Path to the artifact.
        path: PathBuf,
    },

    /// Interactively set the API key, location and S3 credentials.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match &self.command {
            Command::Run => {
                let config = self.load_config()?;
                let client = upstream_client(&config)?;
                let pipeline = pipeline(&config).await?;

                let report = pipeline.run(&client).await?;
                print_report(&report);
            }
            Command::Probe => {
                let config = self.load_config()?;
                upstream_client(&config)?.probe().await?;
                println!("weather API is available");
            }
            Command::Extract => {
                let config = self.load_config()?;
                let payload = upstream_client(&config)?.fetch().await?;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
            Command::Load { payload } => {
                let config = self.load_config()?;
                let payload = read_payload(payload)?;
                let pipeline = pipeline(&config).await?;

                let report = pipeline.load(&payload).await?;
                print_report(&report);
            }
            Command::Inspect { path } => {
                let record = read_artifact(path)?;
                for (column, value) in COLUMNS.iter().zip(record.values()) {
                    println!("{column:<14} {value}");
                }
            }
            Command::Configure => self.configure()?,
        }

        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config file: {}", path.display())),
            None => Config::load().context("Failed to load config"),
        }
    }

    fn configure(&self) -> Result<()> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => Config::config_file_path()?,
        };
        let mut config = if path.exists() {
            Config::load_from(&path)?
        } else {
            Config::default()
        };

        if let Some(key) = prompt_secret("OpenWeather API key:", config.upstream.api_key.as_deref())? {
            config.set_api_key(key);
        }

        config.location.lat = CustomType::<f64>::new("Latitude:")
            .with_default(config.location.lat)
            .with_error_message("Please enter a number")
            .prompt()?;
        config.location.lon = CustomType::<f64>::new("Longitude:")
            .with_default(config.location.lon)
            .with_error_message("Please enter a number")
            .prompt()?;
        config.location.timezone = Text::new("Timezone for sunrise/sunset:")
            .with_default(&config.location.timezone)
            .prompt()?;
        config.timezone()?;
        config.coordinate()?;

        config.aws_s3.bucket = Text::new("S3 bucket:")
            .with_default(&config.aws_s3.bucket)
            .prompt()?;
        let access_key = Text::new("AWS_ACCESS_KEY_ID:")
            .with_default(config.aws_s3.access_key_id.as_deref().unwrap_or_default())
            .prompt()?;
        let secret = prompt_secret(
            "AWS_SECRET_ACCESS_KEY:",
            config.aws_s3.secret_access_key.as_deref(),
        )?
        .unwrap_or_default();
        let token = prompt_secret("AWS_TOKEN (empty for none):", config.aws_s3.token.as_deref())?;
        config.set_aws_credentials(access_key, secret, token);

        config.save_to(&path)?;
        info!(path = %path.display(), "configuration saved");
        println!("Configuration written to {}", path.display());
        Ok(())
    }
}

fn upstream_client(config: &Config) -> Result<OpenWeatherClient> {
    let settings = config.upstream_settings()?;
    Ok(OpenWeatherClient::new(settings)?)
}

async fn pipeline(config: &Config) -> Result<Pipeline<S3ObjectStore>> {
    let timezone = config.timezone()?;
    let s3 = config.s3_settings()?;
    let store = S3ObjectStore::new(&s3)
        .await
        .context("Failed to set up the S3 client")?;

    Ok(Pipeline::new(timezone, config.scratch_dir(), store))
}

fn read_payload(path: &Path) -> Result<Value> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path.display()))?
    };

    serde_json::from_str(&contents).context("Payload is not valid JSON")
}

/// Prompt for a secret; an empty answer keeps `existing`.
fn prompt_secret(label: &str, existing: Option<&str>) -> Result<Option<String>> {
    let help = if existing.is_some() {
        "Leave empty to keep the current value"
    } else {
        "Input is hidden"
    };
    let answer = Password::new(label)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message(help)
        .prompt()?;

    if answer.trim().is_empty() {
        Ok(existing.map(str::to_string))
    } else {
        Ok(Some(answer))
    }
}

fn print_report(report: &RunReport) {
    println!(
        "{} {} {}C -> {}",
        report.record.snapshot_date, report.record.place, report.record.temp_c, report.remote
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_load_with_global_config() {
        let cli = Cli::try_parse_from([
            "weather-etl",
            "load",
            "--payload",
            "payload.json",
            "--config",
            "/etc/weather-etl.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/weather-etl.toml")));
        assert!(matches!(cli.command, Command::Load { ref payload } if payload == Path::new("payload.json")));
    }

    #[test]
    fn load_requires_payload() {
        assert!(Cli::try_parse_from(["weather-etl", "load"]).is_err());
    }

    #[test]
    fn reads_payload_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload.json");
        fs::write(&path, r#"{"dt": 1700000000}"#).unwrap();

        let value = read_payload(&path).unwrap();
        assert_eq!(value["dt"], 1_700_000_000);

        fs::write(&path, "not json").unwrap();
        assert!(read_payload(&path).is_err());
    }

    #[test]
    fn missing_payload_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let err = read_payload(&path).unwrap_err();
        assert!(err.to_string().contains("absent.json"), "{err}");
    }
}
