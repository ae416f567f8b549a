//! The scheduled job as explicit composition: probe, extract, build the
//! record, write the artifact, publish it.
//!
//! Every failure ends the invocation. Nothing is retried here and a local
//! artifact left behind by a failed upload is not removed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{error, info, info_span, Instrument};

use crate::{
    artifact::{Artifact, ArtifactWriter},
    error::{EtlError, Result, Stage},
    publish::{ObjectStore, RemoteObjectRef, RemotePublisher},
    record::{RecordBuilder, WeatherRecord},
    upstream::WeatherSource,
};

/// Everything one successful invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub record: WeatherRecord,
    pub artifact: Artifact,
    pub remote: RemoteObjectRef,
}

pub struct Pipeline<S> {
    builder: RecordBuilder,
    writer: ArtifactWriter,
    publisher: RemotePublisher<S>,
}

impl<S: ObjectStore> Pipeline<S> {
    pub fn new(timezone: Tz, scratch_dir: impl Into<PathBuf>, store: S) -> Self {
        Self {
            builder: RecordBuilder::new(timezone),
            writer: ArtifactWriter::new(scratch_dir),
            publisher: RemotePublisher::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.publisher.store()
    }

    /// Probe the source, fetch one payload, then transform and load it.
    pub async fn run<W>(&self, source: &W) -> Result<RunReport>
    where
        W: WeatherSource + ?Sized,
    {
        source
            .probe()
            .instrument(info_span!("pipeline_stage", stage = %Stage::Probe))
            .await
            .inspect_err(|e| stage_failed(Stage::Probe, e))?;

        let payload = source
            .fetch()
            .instrument(info_span!("pipeline_stage", stage = %Stage::Extract))
            .await
            .inspect_err(|e| stage_failed(Stage::Extract, e))?;

        self.load(&payload).await
    }

    /// Transform and load a payload obtained elsewhere, named after the current time.
    pub async fn load(&self, payload: &Value) -> Result<RunReport> {
        self.transform_and_load(payload, Utc::now()).await
    }

    /// Build, write and publish one payload. `generated_at` names the artifact.
    pub async fn transform_and_load(
        &self,
        payload: &Value,
        generated_at: DateTime<Utc>,
    ) -> Result<RunReport> {
        let record = self
            .builder
            .build_from_value(payload)
            .inspect_err(|e| stage_failed(Stage::Transform, e))?;

        let artifact = self
            .writer
            .write_at(&record, generated_at)
            .inspect_err(|e| stage_failed(Stage::Write, e))?;

        // The publisher logs its own failure with the target location.
        let remote = self
            .publisher
            .publish(&artifact.path, &record.country, &artifact.filename)
            .instrument(info_span!("pipeline_stage", stage = %Stage::Publish))
            .await?;

        info!(
            place = %record.place,
            country = %record.country,
            temp_c = record.temp_c,
            location = %remote,
            "weather snapshot published"
        );

        Ok(RunReport {
            record,
            artifact,
            remote,
        })
    }
}

fn stage_failed(stage: Stage, err: &EtlError) {
    error!(stage = %stage, error = %err, "pipeline stage failed");
}
