//! Unit and time conversions applied to raw upstream values.

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Timestamp layout shared by every time column of the record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KELVIN_OFFSET: f64 = 273.15;

/// Kelvin to Celsius, rounded to two decimal places with exact ties going to
/// the even digit. Inputs are not range checked.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    round2(kelvin - KELVIN_OFFSET)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Render epoch seconds as UTC civil time.
///
/// Returns `None` when the instant is outside the representable range.
pub fn epoch_to_utc_string(epoch_seconds: i64) -> Option<String> {
    let utc = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)?;
    Some(utc.format(TIMESTAMP_FORMAT).to_string())
}

/// Render epoch seconds as civil time in `tz`, honouring the zone's DST rules.
pub fn epoch_to_local_string(epoch_seconds: i64, tz: Tz) -> Option<String> {
    let utc = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)?;
    Some(utc.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string())
}

/// Offset of `tz` from UTC at the given instant, in seconds.
pub fn utc_offset_seconds(epoch_seconds: i64, tz: Tz) -> Option<i32> {
    let utc = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)?;
    Some(
        tz.offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc(),
    )
}
