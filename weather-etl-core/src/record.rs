use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{EtlError, Result},
    normalize::{epoch_to_local_string, epoch_to_utc_string, kelvin_to_celsius},
    payload::WeatherPayload,
};

/// Place used when the payload carries no `name`.
pub const UNKNOWN_PLACE: &str = "Unknown";

/// Country used when the payload carries no `sys.country`.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Column order of the published CSV.
pub const COLUMNS: [&str; 15] = [
    "Snapshot_date",
    "Place",
    "Country",
    "Sunrise_time",
    "Sunset_time",
    "temp_C",
    "feels_like_C",
    "temp_min_C",
    "temp_max_C",
    "pressure",
    "humidity",
    "wind_speed",
    "wind_deg",
    "clouds",
    "weather",
];

/// One flattened weather snapshot. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    #[serde(rename = "Snapshot_date")]
    pub snapshot_date: String,
    #[serde(rename = "Place")]
    pub place: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Sunrise_time")]
    pub sunrise_time: String,
    #[serde(rename = "Sunset_time")]
    pub sunset_time: String,
    #[serde(rename = "temp_C")]
    pub temp_c: f64,
    #[serde(rename = "feels_like_C")]
    pub feels_like_c: f64,
    #[serde(rename = "temp_min_C")]
    pub temp_min_c: f64,
    #[serde(rename = "temp_max_C")]
    pub temp_max_c: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub clouds: f64,
    pub weather: String,
}

impl WeatherRecord {
    /// Cell values in [`COLUMNS`] order. Numbers use the shortest
    /// representation that parses back to the same value.
    pub fn values(&self) -> [String; 15] {
        [
            self.snapshot_date.clone(),
            self.place.clone(),
            self.country.clone(),
            self.sunrise_time.clone(),
            self.sunset_time.clone(),
            self.temp_c.to_string(),
            self.feels_like_c.to_string(),
            self.temp_min_c.to_string(),
            self.temp_max_c.to_string(),
            self.pressure.to_string(),
            self.humidity.to_string(),
            self.wind_speed.to_string(),
            self.wind_deg.to_string(),
            self.clouds.to_string(),
            self.weather.clone(),
        ]
    }
}

/// Maps upstream payloads to [`WeatherRecord`]s. Sunrise and sunset are
/// rendered in `timezone`; the snapshot time is always UTC.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    timezone: Tz,
}

impl RecordBuilder {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Validate a raw decoded body and build its record.
    pub fn build_from_value(&self, raw: &Value) -> Result<WeatherRecord> {
        let payload = WeatherPayload::from_value(raw)?;
        self.build(&payload)
    }

    pub fn build(&self, payload: &WeatherPayload) -> Result<WeatherRecord> {
        let snapshot_date = epoch_to_utc_string(payload.dt)
            .ok_or_else(|| EtlError::malformed("dt", "epoch out of range"))?;
        let sunrise_time = epoch_to_local_string(payload.sys.sunrise, self.timezone)
            .ok_or_else(|| EtlError::malformed("sys.sunrise", "epoch out of range"))?;
        let sunset_time = epoch_to_local_string(payload.sys.sunset, self.timezone)
            .ok_or_else(|| EtlError::malformed("sys.sunset", "epoch out of range"))?;

        let place = non_empty_or(payload.name.as_deref(), UNKNOWN_PLACE);
        let country = non_empty_or(payload.sys.country.as_deref(), UNKNOWN_COUNTRY);

        Ok(WeatherRecord {
            snapshot_date,
            place,
            country,
            sunrise_time,
            sunset_time,
            temp_c: kelvin_to_celsius(payload.main.temp),
            feels_like_c: kelvin_to_celsius(payload.main.feels_like),
            temp_min_c: kelvin_to_celsius(payload.main.temp_min),
            temp_max_c: kelvin_to_celsius(payload.main.temp_max),
            pressure: payload.main.pressure,
            humidity: payload.main.humidity,
            wind_speed: payload.wind.speed,
            wind_deg: payload.wind.deg,
            clouds: payload.clouds,
            weather: payload.description.clone(),
        })
    }
}

fn non_empty_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::sample;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn builder() -> RecordBuilder {
        RecordBuilder::new(chrono_tz::Asia::Kuala_Lumpur)
    }

    #[test]
    fn builds_record_from_sample_payload() {
        let record = builder().build_from_value(&sample()).unwrap();

        assert_eq!(
            record,
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
        );
    }

    #[test]
    fn values_follow_column_order() {
        let record = builder().build_from_value(&sample()).unwrap();
        let values = record.values();

        assert_eq!(values.len(), COLUMNS.len());
        assert_eq!(values[0], "2023-11-14 22:13:20");
        assert_eq!(values[2], "SG");
        assert_eq!(values[5], "26.85");
        assert_eq!(values[9], "1010");
        assert_eq!(values[11], "3.1");
        assert_eq!(values[14], "clear sky");
    }

    #[test]
    fn missing_place_and_country_use_fallbacks() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("name");
        raw["sys"].as_object_mut().unwrap().remove("country");

        let record = builder().build_from_value(&raw).unwrap();
        assert_eq!(record.place, UNKNOWN_PLACE);
        assert_eq!(record.country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn blank_place_uses_fallback() {
        let mut raw = sample();
        raw["name"] = json!("");

        let record = builder().build_from_value(&raw).unwrap();
        assert_eq!(record.place, UNKNOWN_PLACE);
    }

    #[test]
    fn sun_times_follow_configured_zone() {
        let record = RecordBuilder::new(chrono_tz::UTC)
            .build_from_value(&sample())
            .unwrap();
        assert_eq!(record.sunrise_time, "2023-11-14 21:56:40");
        assert_eq!(record.sunset_time, "2023-11-15 09:20:00");
    }

    #[test]
    fn malformed_payload_yields_no_record() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("main");

        let err = builder().build_from_value(&raw).unwrap_err();
        assert!(matches!(err, EtlError::MalformedPayload { ref field, .. } if field == "main"));
    }

    #[test]
    fn unrepresentable_epoch_is_malformed() {
        let mut raw = sample();
        raw["sys"]["sunset"] = json!(i64::MAX);

        let err = builder().build_from_value(&raw).unwrap_err();
        assert!(matches!(err, EtlError::MalformedPayload { ref field, .. } if field == "sys.sunset"));
    }
}
