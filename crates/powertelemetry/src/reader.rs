//! Record reader contract
//!
//! A reader locates the first battery service on the machine and returns its
//! property record. Resource handling for the underlying query stays inside
//! the reader; callers only ever see a [`RawRecord`] or a [`FetchError`].

use crate::RawRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Registry class of the smart-battery power-management service
pub const BATTERY_SERVICE_CLASS: &str = "AppleSmartBattery";

/// Why a reader could not produce a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Service class not found: {0}")]
    ServiceNotFound(String),

    #[error("No matching device: {0}")]
    NoMatchingDevice(String),

    #[error("Property fetch failed: {0}")]
    PropertyFetchFailed(String),
}

/// Source of raw battery property records
pub trait RecordReader {
    /// Fetch the property record of the first matching battery service
    fn fetch(&self) -> Result<RawRecord, FetchError>;
}

impl<R: RecordReader + ?Sized> RecordReader for Box<R> {
    fn fetch(&self) -> Result<RawRecord, FetchError> {
        (**self).fetch()
    }
}

/// Property keys shared by every reader
pub mod keys {
    pub const IS_CHARGING: &str = "IsCharging";
    pub const EXTERNAL_CONNECTED: &str = "ExternalConnected";
    pub const FULLY_CHARGED: &str = "FullyCharged";
    pub const CYCLE_COUNT: &str = "CycleCount";
    pub const DESIGN_CAPACITY: &str = "DesignCapacity";
    pub const MAX_CAPACITY: &str = "AppleRawMaxCapacity";
    pub const NOMINAL_CAPACITY: &str = "NominalChargeCapacity";
    pub const CURRENT_CAPACITY: &str = "AppleRawCurrentCapacity";
    pub const TIME_TO_EMPTY: &str = "AvgTimeToEmpty";
    pub const TIME_TO_FULL: &str = "AvgTimeToFull";
    pub const TEMPERATURE: &str = "Temperature";
    pub const VOLTAGE: &str = "Voltage";
    pub const AMPERAGE: &str = "Amperage";
    pub const SERIAL: &str = "Serial";
    pub const DEVICE_NAME: &str = "DeviceName";

    pub const ADAPTER_DETAILS: &str = "AdapterDetails";
    pub const ADAPTER_WATTS: &str = "Watts";
    pub const ADAPTER_VOLTAGE: &str = "AdapterVoltage";
    pub const ADAPTER_CURRENT: &str = "Current";
    pub const ADAPTER_DESCRIPTION: &str = "Description";

    pub const POWER_TELEMETRY: &str = "PowerTelemetryData";
    pub const SYSTEM_VOLTAGE_IN: &str = "SystemVoltageIn";
    pub const SYSTEM_CURRENT_IN: &str = "SystemCurrentIn";

    pub const BATTERY_DATA: &str = "BatteryData";
    pub const CELL_VOLTAGE: &str = "CellVoltage";

    /// Reported for time estimates that do not apply
    pub const TIME_NOT_APPLICABLE: i64 = 65535;
}

/// Replays a record previously dumped as JSON
#[derive(Debug, Clone)]
pub struct JsonFileReader {
    path: PathBuf,
}

impl JsonFileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordReader for JsonFileReader {
    fn fetch(&self) -> Result<RawRecord, FetchError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                FetchError::NoMatchingDevice(format!("{} does not exist", self.path.display()))
            }
            _ => FetchError::PropertyFetchFailed(format!("{}: {}", self.path.display(), e)),
        })?;

        let json: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            FetchError::PropertyFetchFailed(format!("{}: {}", self.path.display(), e))
        })?;

        let record = RawRecord::from_json(&json).ok_or_else(|| {
            FetchError::PropertyFetchFailed(format!(
                "{}: top-level value is not an object",
                self.path.display()
            ))
        })?;

        tracing::debug!(
            "Loaded {} properties from {}",
            record.len(),
            self.path.display()
        );
        Ok(record)
    }
}
