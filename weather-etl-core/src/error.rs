use std::{fmt, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Config,
    Probe,
    Extract,
    Transform,
    Write,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Probe => "probe",
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Write => "write",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("weather API returned status {status}: {body}")]
    UpstreamUnavailable { status: u16, body: String },

    #[error("weather API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed weather payload at `{field}`: {reason}")]
    MalformedPayload { field: String, reason: String },

    #[error("failed to write artifact {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact {}: {reason}", .path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("error uploading file to {location}: {cause}")]
    Publish { location: String, cause: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl EtlError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EtlError::MalformedPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stage the failure belongs to, as reported to the scheduler.
    pub fn stage(&self) -> Stage {
        match self {
            EtlError::UpstreamUnavailable { .. } | EtlError::Http(_) => Stage::Extract,
            EtlError::MalformedPayload { .. } => Stage::Transform,
            EtlError::Write { .. } | EtlError::InvalidArtifact { .. } => Stage::Write,
            EtlError::Publish { .. } => Stage::Publish,
            EtlError::Config(_)
            | EtlError::Io(_)
            | EtlError::TomlDe(_)
            | EtlError::TomlSer(_) => Stage::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_follows_variant() {
        let err = EtlError::UpstreamUnavailable {
            status: 401,
            body: "invalid key".into(),
        };
        assert_eq!(err.stage(), Stage::Extract);
        assert_eq!(EtlError::malformed("main", "missing").stage(), Stage::Transform);
        assert_eq!(EtlError::Config("x".into()).stage(), Stage::Config);
    }

    #[test]
    fn messages_carry_detail() {
        let err = EtlError::UpstreamUnavailable {
            status: 503,
            body: "down for maintenance".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("down for maintenance"));

        let err = EtlError::malformed("weather[0]", "array is empty");
        assert_eq!(
            err.to_string(),
            "malformed weather payload at `weather[0]`: array is empty"
        );
    }
}
