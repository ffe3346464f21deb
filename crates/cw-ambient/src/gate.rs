use cw_core::{AmbientLimits, AmbientPost, AmbientPre};
use tracing::{info, warn};

use crate::logger::AmbientLogger;

fn within(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

fn envelope(values: &[f64]) -> Option<[f64; 2]> {
    let mut iter = values.iter().copied().filter(|v| v.is_finite());
    let first = iter.next()?;
    Some(iter.fold([first, first], |[lo, hi], v| [lo.min(v), hi.max(v)]))
}

/// Checks conditions before a run.
///
/// Returns `None` (gate closed) when the logger fails, either quantity is
/// missing, or either lies outside its configured bounds.
pub fn check_pre(logger: &dyn AmbientLogger, limits: &AmbientLimits) -> Option<AmbientPre> {
    let reading = match logger.averaged_now(&limits.sensor) {
        Ok(reading) => reading,
        Err(err) => {
            warn!(sensor = %limits.sensor, error = %err, "ambient logger query failed");
            return None;
        }
    };
    let (Some(temperature), Some(humidity)) = (reading.temperature, reading.humidity) else {
        warn!(sensor = %limits.sensor, "ambient reading incomplete");
        return None;
    };
    if !within(temperature, limits.min_temperature, limits.max_temperature) {
        warn!(temperature, "temperature outside limits");
        return None;
    }
    if !within(humidity, limits.min_humidity, limits.max_humidity) {
        warn!(humidity, "humidity outside limits");
        return None;
    }
    info!(temperature, humidity, "ambient conditions acceptable");
    Some(AmbientPre {
        start_time: reading.timestamp,
        temperature,
        humidity,
    })
}

/// Summarises conditions over a run that started at `pre.start_time`.
///
/// `ambient_ok` is only decided when both quantities have samples.
pub fn check_post(
    logger: &dyn AmbientLogger,
    limits: &AmbientLimits,
    pre: &AmbientPre,
) -> AmbientPost {
    let series = match logger.averaged_since(&limits.sensor, pre.start_time) {
        Ok(series) => series,
        Err(err) => {
            warn!(sensor = %limits.sensor, error = %err, "no ambient series for run");
            return AmbientPost {
                temperature_range: None,
                humidity_range: None,
                ambient_ok: None,
            };
        }
    };
    let temperature_range = envelope(&series.temperature);
    let humidity_range = envelope(&series.humidity);
    let ambient_ok = match (temperature_range, humidity_range) {
        (Some([t_lo, t_hi]), Some([rh_lo, rh_hi])) => Some(
            t_hi - t_lo <= limits.max_temperature_change
                && rh_hi - rh_lo <= limits.max_humidity_change,
        ),
        (None, None) => None,
        _ => {
            warn!(
                temperature = temperature_range.is_some(),
                humidity = humidity_range.is_some(),
                "ambient series incomplete, verdict unknown"
            );
            None
        }
    };
    if ambient_ok == Some(false) {
        warn!(?temperature_range, ?humidity_range, "ambient conditions changed too much");
    }
    AmbientPost {
        temperature_range,
        humidity_range,
        ambient_ok,
    }
}
