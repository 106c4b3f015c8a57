//! Wall-clock formatting for progress reports.

use chrono::{TimeDelta, Timelike};

const CENTIS_PER_SECOND: u64 = 100;
const CENTIS_PER_MINUTE: u64 = 60 * CENTIS_PER_SECOND;
const CENTIS_PER_HOUR: u64 = 60 * CENTIS_PER_MINUTE;

/// Describe the time elapsed between `start` and `end`.
///
/// The result reads `runtime = h:mm:ss.ss`, truncated to hundredths of a
/// second. An `end` before `start` yields a leading minus sign.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use pgis_core::timing::report_time_delta;
///
/// let start = Utc::now();
/// let end = start + TimeDelta::milliseconds(61_257);
/// assert_eq!(report_time_delta(start, end), "runtime = 0:01:01.25");
/// ```
#[must_use]
pub fn report_time_delta<T>(start: T, end: T) -> String
where
    T: std::ops::Sub<T, Output = TimeDelta>,
{
    format!("runtime = {}", format_delta(end - start))
}

fn format_delta(delta: TimeDelta) -> String {
    let sign = if delta < TimeDelta::zero() { "-" } else { "" };
    let centis = delta
        .num_milliseconds()
        .unsigned_abs()
        .div_euclid(10);
    let hours = centis.div_euclid(CENTIS_PER_HOUR);
    let minutes = centis.rem_euclid(CENTIS_PER_HOUR).div_euclid(CENTIS_PER_MINUTE);
    let seconds = centis.rem_euclid(CENTIS_PER_MINUTE).div_euclid(CENTIS_PER_SECOND);
    let hundredths = centis.rem_euclid(CENTIS_PER_SECOND);
    format!("{sign}{hours}:{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// Format the time of day as `HH:MM:SS`.
#[must_use]
pub fn clock_time(time: &impl Timelike) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )
}
