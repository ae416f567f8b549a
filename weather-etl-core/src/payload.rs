//! Typed view of the OpenWeather `data/2.5/weather` response body.
//!
//! Only the fields the record needs are decoded. A bad body is reported as
//! [`EtlError::MalformedPayload`] naming the offending path, rather than
//! surfacing later as an unrelated fault.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::{Number, Value};

use crate::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MainReadings {
    /// Kelvin.
    pub temp: f64,
    /// Kelvin.
    pub feels_like: f64,
    /// Kelvin.
    pub temp_min: f64,
    /// Kelvin.
    pub temp_max: f64,
    /// hPa.
    pub pressure: f64,
    /// Percent.
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SunTimes {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(deserialize_with = "epoch")]
    pub sunrise: i64,
    #[serde(deserialize_with = "epoch")]
    pub sunset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPayload {
    /// Observation time, epoch seconds (UTC).
    pub dt: i64,
    pub main: MainReadings,
    pub wind: Wind,
    /// Cloudiness, percent.
    pub clouds: f64,
    /// `weather[0].description`.
    pub description: String,
    pub sys: SunTimes,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(deserialize_with = "epoch")]
    dt: i64,
    main: MainReadings,
    wind: Wind,
    clouds: OwClouds,
    weather: Vec<OwWeather>,
    sys: SunTimes,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

impl WeatherPayload {
    pub fn from_json_str(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| EtlError::malformed("$", format!("body is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(root: &Value) -> Result<Self> {
        // A top-level array would otherwise be accepted as a tuple of fields.
        if !root.is_object() {
            return Err(EtlError::malformed(
                "$",
                format!("expected an object, found {}", kind(root)),
            ));
        }

        let parsed: OwCurrentResponse =
            serde_path_to_error::deserialize(root).map_err(|err| {
                let path = err.path().to_string();
                malformed_at(&path, err.into_inner())
            })?;

        let description = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| EtlError::malformed("weather[0]", "array is empty"))?;

        Ok(Self {
            dt: parsed.dt,
            main: parsed.main,
            wind: parsed.wind,
            clouds: parsed.clouds.all,
            description,
            sys: parsed.sys,
            name: parsed.name,
        })
    }
}

/// Turn a decode failure at `path` into a `MalformedPayload`. A missing key
/// is reported at the key itself rather than at its parent object.
fn malformed_at(path: &str, err: serde_json::Error) -> EtlError {
    let reason = err.to_string();
    let parent = if path == "." { "" } else { path };

    let missing = reason
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'));

    match (missing, parent) {
        (Some(key), "") => EtlError::malformed(key, "missing"),
        (Some(key), parent) => EtlError::malformed(format!("{parent}.{key}"), "missing"),
        (None, "") => EtlError::malformed("$", reason),
        (None, parent) => EtlError::malformed(parent, reason),
    }
}

/// Epoch seconds. `1700000000.0` is tolerated; a fractional part is not.
fn epoch<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    if let Some(secs) = number.as_i64() {
        return Ok(secs);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&f) => {
            Ok(f as i64)
        }
        _ => Err(D::Error::custom(format!(
            "expected integer epoch seconds, found {number}"
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
