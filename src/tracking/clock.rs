//! Epoch timestamps and their display form.
//!
//! Timestamps are epoch seconds with millisecond precision. A value chrono
//! cannot place on the calendar is never accepted, so rendering a stored
//! session cannot fall back to a made-up date.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

use crate::tracking::types::{TimeInfo, TrackingError};

/// Widest offset in use by any civil time zone.
pub const MAX_UTC_OFFSET_HOURS: f64 = 14.0;

pub fn to_utc(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let millis = (timestamp * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Non-negative and within the calendar range chrono can render.
pub fn validate_timestamp(field: &str, value: f64) -> Result<(), TrackingError> {
    if value >= 0.0 && to_utc(value).is_some() {
        Ok(())
    } else {
        Err(TrackingError::validation(
            field,
            format!("{value} is not a representable non-negative epoch timestamp"),
        ))
    }
}

pub fn fixed_offset(hours: f64) -> Option<FixedOffset> {
    if !hours.is_finite() || hours.abs() > MAX_UTC_OFFSET_HOURS {
        return None;
    }
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

pub fn validate_offset(field: &str, hours: f64) -> Result<(), TrackingError> {
    match fixed_offset(hours) {
        Some(_) => Ok(()),
        None => Err(TrackingError::validation(
            field,
            format!("{hours} is not a UTC offset within ±{MAX_UTC_OFFSET_HOURS} hours"),
        )),
    }
}

/// Parse a zone label of the form `UTC`, `UTC+11` or `UTC-5.5` into hours.
pub fn parse_timezone(label: &str) -> Result<f64, TrackingError> {
    let label = label.trim();
    let rest = label
        .strip_prefix("UTC")
        .ok_or_else(|| TrackingError::validation("timezone", format!("{label:?} is not a UTC±h offset")))?;
    let hours = if rest.is_empty() {
        0.0
    } else {
        rest.parse::<f64>()
            .map_err(|_| TrackingError::validation("timezone", format!("{label:?} is not a UTC±h offset")))?
    };
    validate_offset("timezone", hours)?;
    Ok(hours)
}

/// `UTC` without an offset, otherwise `UTC+11`, `UTC-5.5`.
pub fn timezone_name(offset_hours: Option<f64>) -> String {
    match offset_hours {
        None => "UTC".to_string(),
        Some(hours) if hours < 0.0 => format!("UTC-{}", hours.abs()),
        Some(hours) => format!("UTC+{hours}"),
    }
}

/// Render `timestamp` in the session's zone. `None` when either value is out
/// of range.
pub fn time_info(timestamp: f64, offset_hours: Option<f64>) -> Option<TimeInfo> {
    let offset = match offset_hours {
        Some(hours) => fixed_offset(hours)?,
        None => FixedOffset::east_opt(0)?,
    };
    let local = to_utc(timestamp)?.with_timezone(&offset);
    Some(TimeInfo {
        timestamp,
        iso: local.to_rfc3339_opts(SecondsFormat::Millis, offset_hours.is_none()),
        iso_local: local.format("%Y-%m-%dT%H:%M:%S").to_string(),
        date: local.format("%Y-%m-%d").to_string(),
        time: local.format("%H:%M:%S").to_string(),
        timezone: timezone_name(offset_hours),
        timezone_offset: offset_hours,
    })
}

/// Wall clock in epoch seconds with millisecond precision.
pub fn now_epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_utc_by_default() {
        let info = time_info(1_700_000_000.25, None).unwrap();
        assert_eq!(info.iso, "2023-11-14T22:13:20.250Z");
        assert_eq!(info.iso_local, "2023-11-14T22:13:20");
        assert_eq!(info.date, "2023-11-14");
        assert_eq!(info.time, "22:13:20");
        assert_eq!(info.timezone, "UTC");
        assert_eq!(info.timezone_offset, None);
    }

    #[test]
    fn renders_in_a_fixed_offset() {
        let info = time_info(1_700_000_000.25, Some(11.0)).unwrap();
        assert_eq!(info.iso, "2023-11-15T09:13:20.250+11:00");
        assert_eq!(info.iso_local, "2023-11-15T09:13:20");
        assert_eq!(info.date, "2023-11-15");
        assert_eq!(info.time, "09:13:20");
        assert_eq!(info.timezone, "UTC+11");
        assert_eq!(info.timezone_offset, Some(11.0));

        let info = time_info(1_700_000_000.0, Some(-5.5)).unwrap();
        assert_eq!(info.iso, "2023-11-14T16:43:20.000-05:30");
        assert_eq!(info.timezone, "UTC-5.5");
    }

    #[test]
    fn unrepresentable_values_do_not_render() {
        assert!(time_info(1.0e13, None).is_none());
        assert!(time_info(f64::MAX, None).is_none());
        assert!(time_info(0.0, Some(30.0)).is_none());
    }

    #[test]
    fn timestamps_outside_the_calendar_are_rejected() {
        assert!(validate_timestamp("start_time", 1_700_000_000.0).is_ok());
        for value in [1.0e13, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                validate_timestamp("start_time", value),
                Err(TrackingError::Validation { .. })
            ));
        }
    }

    #[test]
    fn timezone_labels_parse_to_hours() {
        assert_eq!(parse_timezone("UTC+11").unwrap(), 11.0);
        assert_eq!(parse_timezone("UTC-5.5").unwrap(), -5.5);
        assert_eq!(parse_timezone("UTC").unwrap(), 0.0);
        assert!(parse_timezone("Australia/Sydney").is_err());
        assert!(parse_timezone("UTC+20").is_err());
    }
}
