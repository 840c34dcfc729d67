//! Linux power_supply reader
//!
//! Builds a registry-shaped record from `/sys/class/power_supply`, converting
//! the kernel's micro-units into the millivolt/milliamp/mAh units the rest of
//! the crate expects.

use crate::reader::keys;
use crate::{FetchError, RawRecord, RecordReader};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Reads the first battery under a power_supply class directory
#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

/// Supplies found while scanning the class directory
#[derive(Debug, Default)]
struct Supplies {
    battery: Option<PathBuf>,
    adapter: Option<PathBuf>,
}

impl SysfsReader {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_POWER_SUPPLY_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the first battery and the first online mains/USB supply
    fn detect_power_supplies(&self) -> Result<Supplies, FetchError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            FetchError::PropertyFetchFailed(format!("{}: {}", self.root.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();

        let mut supplies = Supplies::default();
        for path in paths {
            let Some(psu_type) = read_sysfs_string(&path.join("type")) else {
                continue;
            };

            match psu_type.to_lowercase().as_str() {
                "battery" if supplies.battery.is_none() => {
                    tracing::debug!("Found battery at {}", path.display());
                    supplies.battery = Some(path);
                }
                "mains" | "usb" | "usb_pd" | "usb_c"
                    if supplies.adapter.is_none()
                        && read_sysfs_int(&path.join("online")) == Some(1) =>
                {
                    tracing::debug!("Found online adapter at {}", path.display());
                    supplies.adapter = Some(path);
                }
                _ => {}
            }
        }

        Ok(supplies)
    }
}

impl Default for SysfsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordReader for SysfsReader {
    fn fetch(&self) -> Result<RawRecord, FetchError> {
        if !self.root.exists() {
            return Err(FetchError::ServiceNotFound(format!(
                "{} does not exist",
                self.root.display()
            )));
        }

        let supplies = self.detect_power_supplies()?;
        let battery = supplies.battery.ok_or_else(|| {
            FetchError::NoMatchingDevice(format!("no battery under {}", self.root.display()))
        })?;

        let mut record = battery_record(&battery);
        if let Some(adapter) = &supplies.adapter {
            record.insert(keys::EXTERNAL_CONNECTED, true);
            record.insert(keys::ADAPTER_DETAILS, adapter_details(adapter));
            record.insert(keys::POWER_TELEMETRY, adapter_telemetry(adapter));
        }

        tracing::info!(
            "Read {} properties from {}",
            record.len(),
            battery.display()
        );
        Ok(record)
    }
}

fn battery_record(path: &Path) -> RawRecord {
    let read = |name: &str| read_sysfs_int(&path.join(name));
    let status = read_sysfs_string(&path.join("status")).unwrap_or_default();

    let voltage_uv = read("voltage_now");
    let min_design_uv = read("voltage_min_design").or(voltage_uv);

    // charge_* is µAh; energy_* (µWh) only batteries need a voltage to convert
    let capacity_mah = |charge: &str, energy: &str| -> Option<i64> {
        read(charge).map(|uah| uah / 1000).or_else(|| {
            let uwh = read(energy)?;
            let uv = min_design_uv.filter(|v| *v > 0)?;
            Some(uwh * 1000 / uv)
        })
    };

    let discharging = status == "Discharging";
    let current_ua = read("current_now").or_else(|| {
        let uw = read("power_now")?;
        let uv = voltage_uv.filter(|v| *v > 0)?;
        Some(uw * 1_000_000 / uv)
    });
    // Drivers disagree on sign; normalize to negative while discharging
    let current_ua = current_ua.map(|ua| if discharging { -ua.abs() } else { ua.abs() });

    let minutes = |name: &str| {
        read(name)
            .map(|secs| secs / 60)
            .unwrap_or(keys::TIME_NOT_APPLICABLE)
    };

    let full_mah = capacity_mah("charge_full", "energy_full");

    let mut record = RawRecord::new()
        .with(keys::IS_CHARGING, status == "Charging")
        .with(keys::FULLY_CHARGED, status == "Full")
        .with(
            keys::EXTERNAL_CONNECTED,
            status == "Charging" || status == "Full",
        )
        .with(keys::TIME_TO_EMPTY, minutes("time_to_empty_avg"))
        .with(keys::TIME_TO_FULL, minutes("time_to_full_avg"));

    let optional = [
        (keys::CYCLE_COUNT, read("cycle_count")),
        (
            keys::DESIGN_CAPACITY,
            capacity_mah("charge_full_design", "energy_full_design"),
        ),
        (keys::MAX_CAPACITY, full_mah),
        // no smoothed figure in sysfs; the full-charge value stands in
        (keys::NOMINAL_CAPACITY, full_mah),
        (
            keys::CURRENT_CAPACITY,
            capacity_mah("charge_now", "energy_now"),
        ),
        // tenths of a degree -> hundredths
        (keys::TEMPERATURE, read("temp").map(|t| t * 10)),
        (keys::VOLTAGE, voltage_uv.map(|uv| uv / 1000)),
        (keys::AMPERAGE, current_ua.map(|ua| ua / 1000)),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            record.insert(key, value);
        }
    }

    for (key, file) in [(keys::SERIAL, "serial_number"), (keys::DEVICE_NAME, "model_name")] {
        if let Some(value) = read_sysfs_string(&path.join(file)) {
            record.insert(key, value);
        }
    }

    record
}

fn adapter_details(path: &Path) -> RawRecord {
    let read = |name: &str| read_sysfs_int(&path.join(name));
    let mut details = RawRecord::new();

    let voltage_uv = read("voltage_max");
    let current_ua = read("current_max");
    if let Some(uv) = voltage_uv {
        details.insert(keys::ADAPTER_VOLTAGE, uv / 1000);
    }
    if let Some(ua) = current_ua {
        details.insert(keys::ADAPTER_CURRENT, ua / 1000);
    }
    if let (Some(uv), Some(ua)) = (voltage_uv, current_ua) {
        let watts = (uv as i128 * ua as i128 / 1_000_000_000_000) as i64;
        details.insert(keys::ADAPTER_WATTS, watts);
    }

    let description = read_sysfs_string(&path.join("model_name")).or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });
    if let Some(description) = description {
        details.insert(keys::ADAPTER_DESCRIPTION, description);
    }

    details
}

fn adapter_telemetry(path: &Path) -> RawRecord {
    let mut telemetry = RawRecord::new();
    if let Some(uv) = read_sysfs_int(&path.join("voltage_now")) {
        telemetry.insert(keys::SYSTEM_VOLTAGE_IN, uv / 1000);
    }
    if let Some(ua) = read_sysfs_int(&path.join("current_now")) {
        telemetry.insert(keys::SYSTEM_CURRENT_IN, ua / 1000);
    }
    telemetry
}

/// Read integer from sysfs file
fn read_sysfs_int(path: &Path) -> Option<i64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Read a trimmed, non-empty string from sysfs file
fn read_sysfs_string(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_supply(root: &Path, name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn test_missing_root_is_service_not_found() {
        let dir = TempDir::new().unwrap();
        let reader = SysfsReader::with_root(dir.path().join("power_supply"));
        assert!(matches!(reader.fetch(), Err(FetchError::ServiceNotFound(_))));
    }

    #[test]
    fn test_unreadable_root_is_property_fetch_failed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("power_supply");
        fs::write(&root, "not a directory").unwrap();

        let reader = SysfsReader::with_root(&root);
        assert!(matches!(
            reader.fetch(),
            Err(FetchError::PropertyFetchFailed(_))
        ));
    }

    #[test]
    fn test_no_battery_is_no_matching_device() {
        let dir = TempDir::new().unwrap();
        write_supply(dir.path(), "AC", &[("type", "Mains"), ("online", "1")]);
        let reader = SysfsReader::with_root(dir.path());
        assert!(matches!(reader.fetch(), Err(FetchError::NoMatchingDevice(_))));
    }

    #[test]
    fn test_charge_based_battery() {
        let dir = TempDir::new().unwrap();
        write_supply(
            dir.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("voltage_now", "12891000"),
                ("current_now", "512000"),
                ("charge_full_design", "8579000"),
                ("charge_full", "7701000"),
                ("charge_now", "5000000"),
                ("cycle_count", "231"),
                ("temp", "305"),
                ("serial_number", " F5D1234 "),
                ("model_name", "bq40z651"),
            ],
        );

        let record = SysfsReader::with_root(dir.path()).fetch().unwrap();
        assert!(!record.bool(keys::IS_CHARGING));
        assert!(!record.bool(keys::EXTERNAL_CONNECTED));
        assert_eq!(record.int(keys::DESIGN_CAPACITY), 8579);
        assert_eq!(record.int(keys::MAX_CAPACITY), 7701);
        assert_eq!(record.int(keys::NOMINAL_CAPACITY), 7701);
        assert_eq!(record.int(keys::CURRENT_CAPACITY), 5000);
        assert_eq!(record.int(keys::VOLTAGE), 12891);
        assert_eq!(record.int(keys::AMPERAGE), -512);
        assert_eq!(record.int(keys::TEMPERATURE), 3050);
        assert_eq!(record.int(keys::CYCLE_COUNT), 231);
        assert_eq!(record.int(keys::TIME_TO_EMPTY), keys::TIME_NOT_APPLICABLE);
        assert_eq!(record.string(keys::SERIAL), "F5D1234");
        assert_eq!(record.string(keys::DEVICE_NAME), "bq40z651");
    }

    #[test]
    fn test_energy_based_battery_with_adapter() {
        let dir = TempDir::new().unwrap();
        write_supply(
            dir.path(),
            "BAT1",
            &[
                ("type", "Battery"),
                ("status", "Charging"),
                ("voltage_min_design", "11400000"),
                ("voltage_now", "12000000"),
                ("power_now", "24000000"),
                ("energy_full_design", "57000000"),
                ("energy_full", "51300000"),
                ("time_to_full_avg", "3600"),
            ],
        );
        write_supply(
            dir.path(),
            "USBC0",
            &[
                ("type", "USB"),
                ("online", "1"),
                ("voltage_max", "20000000"),
                ("current_max", "3250000"),
                ("voltage_now", "19517000"),
                ("current_now", "3213000"),
            ],
        );

        let record = SysfsReader::with_root(dir.path()).fetch().unwrap();
        assert!(record.bool(keys::IS_CHARGING));
        assert!(record.bool(keys::EXTERNAL_CONNECTED));
        assert_eq!(record.int(keys::DESIGN_CAPACITY), 5000);
        assert_eq!(record.int(keys::MAX_CAPACITY), 4500);
        assert_eq!(record.int(keys::AMPERAGE), 2000);
        assert_eq!(record.int(keys::TIME_TO_FULL), 60);

        let adapter = record.record_or_empty(keys::ADAPTER_DETAILS);
        assert_eq!(adapter.int(keys::ADAPTER_WATTS), 65);
        assert_eq!(adapter.int(keys::ADAPTER_VOLTAGE), 20000);
        assert_eq!(adapter.string(keys::ADAPTER_DESCRIPTION), "USBC0");

        let telemetry = record.record_or_empty(keys::POWER_TELEMETRY);
        assert_eq!(telemetry.int(keys::SYSTEM_VOLTAGE_IN), 19517);
        assert_eq!(telemetry.int(keys::SYSTEM_CURRENT_IN), 3213);
    }

    #[test]
    fn test_offline_adapter_is_ignored() {
        let dir = TempDir::new().unwrap();
        write_supply(dir.path(), "AC", &[("type", "Mains"), ("online", "0")]);
        write_supply(dir.path(), "BAT0", &[("type", "Battery"), ("status", "Discharging")]);

        let record = SysfsReader::with_root(dir.path()).fetch().unwrap();
        assert!(!record.bool(keys::EXTERNAL_CONNECTED));
        assert!(record.record(keys::ADAPTER_DETAILS).is_none());
    }
}
