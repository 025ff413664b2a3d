// crates/fleetsync-core/src/types.rs

const METERS_PER_KILOMETER: f64 = 1000.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// One published row: a vehicle with its odometer and engine totals in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRecord {
    pub name: String,
    pub distance_km: f64,
    pub engine_hours: f64,
}

impl EquipmentRecord {
    /// Builds a record from the raw API units (meters, seconds).
    pub fn from_raw(name: impl Into<String>, odometer_meters: f64, engine_seconds: f64) -> Self {
        Self {
            name: name.into(),
            distance_km: meters_to_km(odometer_meters),
            engine_hours: seconds_to_hours(engine_seconds),
        }
    }

    pub fn hours_display(&self) -> String {
        format_tenths(self.engine_hours)
    }

    pub fn km_display(&self) -> String {
        format_tenths(self.distance_km)
    }
}

pub fn meters_to_km(meters: f64) -> f64 {
    round_tenths(meters / METERS_PER_KILOMETER)
}

pub fn seconds_to_hours(seconds: f64) -> f64 {
    round_tenths(seconds / SECONDS_PER_HOUR)
}

/// Rounds half away from zero to one decimal place.
pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Always prints exactly one decimal place, so whole numbers render as `2.0`.
pub fn format_tenths(value: f64) -> String {
    format!("{value:.1}")
}
