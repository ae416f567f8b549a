//! Local CSV artifact: one header row and one data row per invocation.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::{
    error::{EtlError, Result},
    record::{COLUMNS, WeatherRecord},
};

/// Layout of the generation timestamp in artifact filenames.
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A fully written, flushed CSV file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub filename: String,
    pub generated_at: DateTime<Utc>,
}

/// `YYYYMMDDHHMMSS.csv` for the given generation instant.
pub fn artifact_filename(generated_at: DateTime<Utc>) -> String {
    format!("{}.csv", generated_at.format(FILENAME_TIMESTAMP_FORMAT))
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    scratch_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Write `record` named after the current wall-clock time.
    pub fn write(&self, record: &WeatherRecord) -> Result<Artifact> {
        self.write_at(record, Utc::now())
    }

    /// Write `record` named after `generated_at`. The file is synced to disk
    /// before this returns.
    pub fn write_at(&self, record: &WeatherRecord, generated_at: DateTime<Utc>) -> Result<Artifact> {
        let filename = artifact_filename(generated_at);
        let path = self.scratch_dir.join(&filename);

        fs::create_dir_all(&self.scratch_dir).map_err(|source| EtlError::Write {
            path: self.scratch_dir.clone(),
            source,
        })?;

        write_csv(&path, record).map_err(|source| EtlError::Write {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "artifact written");

        Ok(Artifact {
            path,
            filename,
            generated_at,
        })
    }
}

fn write_csv(path: &Path, record: &WeatherRecord) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(file);

    writer.write_record(COLUMNS)?;
    writer.write_record(record.values())?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    debug!(path = %path.display(), "artifact synced");
    Ok(())
}

/// Parse an artifact produced by [`ArtifactWriter`] back into its record.
pub fn read_artifact(path: &Path) -> Result<WeatherRecord> {
    let invalid = |reason: String| EtlError::InvalidArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| invalid(e.to_string()))?;

    let headers = reader.headers().map_err(|e| invalid(e.to_string()))?;
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(invalid(format!(
            "unexpected header row: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut rows = reader.deserialize::<WeatherRecord>();
    let record = rows
        .next()
        .ok_or_else(|| invalid("no data row".to_string()))?
        .map_err(|e| invalid(e.to_string()))?;

    if rows.next().is_some() {
        return Err(invalid("more than one data row".to_string()));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record() -> WeatherRecord {
        WeatherRecord {
            snapshot_date: "2023-11-14 22:13:20".into(),
            place: "Singapore".into(),
            country: "SG".into(),
            sunrise_time: "2023-11-15 05:56:40".into(),
            sunset_time: "2023-11-15 17:20:00".into(),
            temp_c: 26.85,
            feels_like_c: 25.85,
            temp_min_c: 24.85,
            temp_max_c: 27.85,
            pressure: 1010.0,
            humidity: 70.0,
            wind_speed: 3.1,
            wind_deg: 200.0,
            clouds: 40.0,
            weather: "clear sky".into(),
        }
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 8, 5, 9).unwrap()
    }

    #[test]
    fn filename_is_generation_timestamp() {
        assert_eq!(artifact_filename(instant()), "20250320080509.csv");
    }

    #[test]
    fn writes_header_and_single_row() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let artifact = writer.write_at(&record(), instant()).unwrap();

        assert_eq!(artifact.filename, "20250320080509.csv");
        assert_eq!(artifact.path, dir.path().join("20250320080509.csv"));

        let contents = fs::read_to_string(&artifact.path).unwrap();
        assert_eq!(
            contents,
            "Snapshot_date,Place,Country,Sunrise_time,Sunset_time,temp_C,feels_like_C,\
             temp_min_C,temp_max_C,pressure,humidity,wind_speed,wind_deg,clouds,weather\n\
             2023-11-14 22:13:20,Singapore,SG,2023-11-15 05:56:40,2023-11-15 17:20:00,\
             26.85,25.85,24.85,27.85,1010,70,3.1,200,40,clear sky\n"
        );
    }

    #[test]
    fn round_trips_through_csv() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let original = record();

        let artifact = writer.write_at(&original, instant()).unwrap();
        let parsed = read_artifact(&artifact.path).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn quotes_only_fields_with_delimiters() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let mut original = record();
        original.place = "Kuala Lumpur, Federal Territory".into();

        let artifact = writer.write_at(&original, instant()).unwrap();
        let contents = fs::read_to_string(&artifact.path).unwrap();

        assert!(contents.contains(",\"Kuala Lumpur, Federal Territory\",SG,"));
        assert!(contents.contains(",clear sky\n"));
        assert_eq!(read_artifact(&artifact.path).unwrap(), original);
    }

    #[test]
    fn creates_missing_scratch_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("weather").join("scratch");
        let writer = ArtifactWriter::new(&nested);

        let artifact = writer.write_at(&record(), instant()).unwrap();
        assert!(artifact.path.starts_with(&nested));
        assert!(artifact.path.exists());
    }

    #[test]
    fn unwritable_location_is_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"occupied").unwrap();

        let writer = ArtifactWriter::new(&blocker);
        let err = writer.write_at(&record(), instant()).unwrap_err();

        assert!(matches!(err, EtlError::Write { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_foreign_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let err = read_artifact(&path).unwrap_err();
        assert!(matches!(err, EtlError::InvalidArtifact { .. }), "got {err:?}");
    }
}
