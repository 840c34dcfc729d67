//! Mock readers for testing without battery hardware
//!
//! Provides canned registry records for a few representative machines so the
//! derivation and the dump tool can be exercised on any host.
//!
//! # Usage
//!
//! ```
//! use powertelemetry::mock::{MockProfile, MockReader};
//! use powertelemetry::get_battery_info;
//!
//! let reader = MockReader::new(MockProfile::Healthy);
//! let info = get_battery_info(&reader).unwrap();
//! assert_eq!(info.calculations.health_by_max_capacity, 90);
//! ```

use crate::reader::{BATTERY_SERVICE_CLASS, keys};
use crate::{FetchError, RawRecord, RecordReader};

/// Pre-defined mock machines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProfile {
    /// Laptop on AC power with a young, well balanced pack
    Healthy,
    /// Older pack on battery power with a drifting cell
    Degraded,
    /// Battery whose firmware reports no per-cell voltages or design capacity
    NoCells,
    /// Machine without a battery
    Desktop,
}

impl MockProfile {
    /// Get the registry record for this mock, or the error a real reader
    /// would report
    pub fn to_record(self) -> Result<RawRecord, FetchError> {
        match self {
            MockProfile::Healthy => Ok(RawRecord::new()
                .with(keys::IS_CHARGING, true)
                .with(keys::EXTERNAL_CONNECTED, true)
                .with(keys::FULLY_CHARGED, false)
                .with(keys::CYCLE_COUNT, 231)
                .with(keys::DESIGN_CAPACITY, 8579)
                .with(keys::MAX_CAPACITY, 7701)
                .with(keys::NOMINAL_CAPACITY, 7945)
                .with(keys::CURRENT_CAPACITY, 6120)
                .with(keys::TIME_TO_EMPTY, keys::TIME_NOT_APPLICABLE)
                .with(keys::TIME_TO_FULL, 41)
                .with(keys::TEMPERATURE, 3051)
                .with(keys::VOLTAGE, 12891)
                .with(keys::AMPERAGE, 1532)
                .with(keys::SERIAL, "F5D1234ABCDEFG")
                .with(keys::DEVICE_NAME, "bq40z651")
                .with(
                    keys::ADAPTER_DETAILS,
                    RawRecord::new()
                        .with(keys::ADAPTER_WATTS, 96)
                        .with(keys::ADAPTER_VOLTAGE, 20000)
                        .with(keys::ADAPTER_CURRENT, 4700)
                        .with(keys::ADAPTER_DESCRIPTION, "pd charger"),
                )
                .with(
                    keys::POWER_TELEMETRY,
                    RawRecord::new()
                        .with(keys::SYSTEM_VOLTAGE_IN, 19517)
                        .with(keys::SYSTEM_CURRENT_IN, 3213),
                )
                .with(
                    keys::BATTERY_DATA,
                    RawRecord::new().with(keys::CELL_VOLTAGE, vec![3783, 3785, 3784]),
                )),
            MockProfile::Degraded => Ok(RawRecord::new()
                .with(keys::IS_CHARGING, false)
                .with(keys::EXTERNAL_CONNECTED, false)
                .with(keys::FULLY_CHARGED, false)
                .with(keys::CYCLE_COUNT, 1187)
                .with(keys::DESIGN_CAPACITY, 5103)
                .with(keys::MAX_CAPACITY, 3890)
                .with(keys::NOMINAL_CAPACITY, 4012)
                .with(keys::CURRENT_CAPACITY, 2210)
                .with(keys::TIME_TO_EMPTY, 142)
                .with(keys::TIME_TO_FULL, keys::TIME_NOT_APPLICABLE)
                .with(keys::TEMPERATURE, 2874)
                .with(keys::VOLTAGE, 11353)
                .with(keys::AMPERAGE, -1043)
                .with(keys::SERIAL, "D86345ZYXWVUT")
                .with(keys::DEVICE_NAME, "bq20z451")
                .with(
                    keys::BATTERY_DATA,
                    RawRecord::new().with(keys::CELL_VOLTAGE, vec![3811, 3752, 3790]),
                )),
            MockProfile::NoCells => Ok(RawRecord::new()
                .with(keys::EXTERNAL_CONNECTED, true)
                .with(keys::FULLY_CHARGED, true)
                .with(keys::VOLTAGE, 12600)
                .with(keys::AMPERAGE, 0)
                .with(keys::SERIAL, "UNKNOWN")),
            MockProfile::Desktop => Err(FetchError::NoMatchingDevice(
                BATTERY_SERVICE_CLASS.to_string(),
            )),
        }
    }

    /// Get profile from string name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "healthy" => Some(MockProfile::Healthy),
            "degraded" => Some(MockProfile::Degraded),
            "nocells" | "no_cells" | "no-cells" => Some(MockProfile::NoCells),
            "desktop" => Some(MockProfile::Desktop),
            _ => None,
        }
    }

    /// List all available mock profiles
    pub fn all() -> &'static [MockProfile] {
        &[
            MockProfile::Healthy,
            MockProfile::Degraded,
            MockProfile::NoCells,
            MockProfile::Desktop,
        ]
    }
}

/// Reader returning a fixed record or a fixed failure
#[derive(Debug, Clone)]
pub struct MockReader {
    result: Result<RawRecord, FetchError>,
}

impl MockReader {
    /// Create a reader for a predefined profile
    pub fn new(profile: MockProfile) -> Self {
        Self {
            result: profile.to_record(),
        }
    }

    /// Create a reader that always returns `record`
    pub fn with_record(record: RawRecord) -> Self {
        Self { result: Ok(record) }
    }

    /// Create a reader that always fails with `error`
    pub fn failing(error: FetchError) -> Self {
        Self { result: Err(error) }
    }
}

impl RecordReader for MockReader {
    fn fetch(&self) -> Result<RawRecord, FetchError> {
        tracing::debug!("[MOCK] Returning canned battery record");
        self.result.clone()
    }
}
