//! Core library for the `weather-etl` job.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather current-weather client (availability probe and extraction)
//! - Unit/time normalization and the flat CSV record built from a payload
//! - Local CSV artifacts and their upload to S3-compatible storage
//! - The pipeline that runs those stages in order
//!
//! It is used by `weather-etl-cli`, but the stages can be driven by any
//! scheduler that hands over a decoded payload.

pub mod artifact;
pub mod config;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod upstream;

pub use artifact::{Artifact, ArtifactWriter, read_artifact};
pub use config::Config;
pub use error::{EtlError, Result, Stage};
pub use payload::WeatherPayload;
pub use pipeline::{Pipeline, RunReport};
pub use publish::{
    MemoryObjectStore, ObjectStore, RemoteObjectRef, RemotePublisher, S3ObjectStore, S3Settings,
};
pub use record::{COLUMNS, RecordBuilder, UNKNOWN_COUNTRY, UNKNOWN_PLACE, WeatherRecord};
pub use upstream::{Coordinate, OpenWeatherClient, UpstreamSettings, WeatherSource};
