use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::{OffsetComponents, Tz};

/// Zone whose wall clock the spreadsheet day number is expressed in.
pub const REPORTING_TIMEZONE: Tz = chrono_tz::US::Central;

/// Roughly one hour as a fraction of a day, added while daylight-saving time is in effect.
pub const DST_ADJUSTMENT_DAYS: f64 = 0.04167;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Timestamps captured once per run and stamped onto every published snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTimestamps {
    pub updated: DateTime<FixedOffset>,
    pub day_number: f64,
}

impl PublishTimestamps {
    pub fn capture() -> Self {
        Self::from_local(Local::now().fixed_offset())
    }

    pub fn from_local(now: DateTime<FixedOffset>) -> Self {
        Self {
            updated: now,
            day_number: spreadsheet_day_number(now.with_timezone(&Utc)),
        }
    }

    /// ISO-8601 with the local UTC offset, e.g. `2024-07-01T12:00:00-05:00`.
    pub fn updated_iso8601(&self) -> String {
        self.updated.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn day_number_display(&self) -> String {
        format_day_number(self.day_number)
    }
}

fn spreadsheet_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Day number of `instant` as read off a US/Central wall clock.
pub fn spreadsheet_day_number(instant: DateTime<Utc>) -> f64 {
    let central = instant.with_timezone(&REPORTING_TIMEZONE);
    let observing_dst = central.offset().dst_offset() != Duration::zero();
    serial_day_number(central.naive_local(), observing_dst)
}

/// Fractional days between the spreadsheet epoch (1899-12-30 00:00) and a wall-clock
/// reading, plus the daylight-saving adjustment when `observing_dst` is set.
pub fn serial_day_number(wall_clock: NaiveDateTime, observing_dst: bool) -> f64 {
    let elapsed = wall_clock - spreadsheet_epoch();
    let days = elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY;
    if observing_dst {
        days + DST_ADJUSTMENT_DAYS
    } else {
        days
    }
}

/// Shortest round-trip representation, keeping a trailing `.0` for whole days.
pub fn format_day_number(value: f64) -> String {
    let rendered = value.to_string();
    if rendered.contains('.') || !value.is_finite() {
        rendered
    } else {
        format!("{rendered}.0")
    }
}
