//! Battery snapshot and derived metrics
//!
//! Maps a raw property record into physical units and computes health and
//! power-flow figures from it. Derivation is pure: one record in, one
//! snapshot out, no state kept between calls.

use crate::reader::keys;
use crate::{FetchError, RawRecord, RecordReader};
use serde::Serialize;

/// Upper bound on reported cell voltages
pub const MAX_CELLS: usize = 16;

/// Point-in-time battery and power-flow snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    pub state: State,
    pub identity: Identity,
    pub capacity: Capacity,
    pub charge: Charge,
    pub electrical: Electrical,
    /// Per-cell voltages in mV, in registry order
    pub cell_voltages: Vec<i64>,
    pub adapter: Adapter,
    pub calculations: Calculations,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub is_charging: bool,
    pub is_connected: bool,
    pub fully_charged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub serial_number: String,
    pub device_name: String,
    pub cycle_count: i64,
}

/// Capacities in mAh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub design_capacity: i64,
    pub max_capacity: i64,
    pub nominal_capacity: i64,
}

/// Charge level in mAh; time estimates in minutes (65535 = not applicable)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub current_capacity: i64,
    pub time_to_empty: i64,
    pub time_to_full: i64,
}

/// Battery temperature (°C), voltage (V) and amperage (A, negative while discharging)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Electrical {
    pub temperature: f64,
    pub voltage: f64,
    pub amperage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Adapter {
    pub description: String,
    pub max_watts: i64,
    /// Negotiated ceiling
    pub max_voltage: f64,
    pub max_amperage: f64,
    /// Live measured draw
    pub input_voltage: f64,
    pub input_amperage: f64,
}

/// Derived health percentages and power flow in watts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculations {
    pub health_by_max_capacity: i64,
    pub health_by_nominal_capacity: i64,
    pub condition_adjusted_health: i64,
    pub ac_power: f64,
    pub battery_power: f64,
    pub system_power: f64,
}

impl BatteryInfo {
    /// Battery current is flowing out
    pub fn is_discharging(&self) -> bool {
        self.electrical.amperage < 0.0
    }
}

/// Fetch a record from `reader` and derive a snapshot from it.
///
/// A fetch failure is returned unchanged; no mapping happens in that case.
pub fn get_battery_info<R>(reader: &R) -> Result<BatteryInfo, FetchError>
where
    R: RecordReader + ?Sized,
{
    let record = reader.fetch()?;
    Ok(derive_snapshot(&record))
}

/// Map a raw record into a snapshot and compute the derived metrics
pub fn derive_snapshot(record: &RawRecord) -> BatteryInfo {
    let adapter = record.record_or_empty(keys::ADAPTER_DETAILS);
    let telemetry = record.record_or_empty(keys::POWER_TELEMETRY);
    let battery_data = record.record_or_empty(keys::BATTERY_DATA);

    // Raw registry units: mV, mA, hundredths of °C
    let voltage_mv = record.int(keys::VOLTAGE);
    let amperage_ma = record.int(keys::AMPERAGE);
    let input_voltage_mv = telemetry.int(keys::SYSTEM_VOLTAGE_IN);
    let input_amperage_ma = telemetry.int(keys::SYSTEM_CURRENT_IN);

    let capacity = Capacity {
        design_capacity: record.int(keys::DESIGN_CAPACITY),
        max_capacity: record.int(keys::MAX_CAPACITY),
        nominal_capacity: record.int(keys::NOMINAL_CAPACITY),
    };
    let cell_voltages = battery_data.int_array(keys::CELL_VOLTAGE, MAX_CELLS);

    let (health_by_max_capacity, health_by_nominal_capacity, condition_adjusted_health) =
        health(&capacity, &cell_voltages);

    let ac = power_hundredths(input_voltage_mv, input_amperage_ma);
    let battery = power_hundredths(voltage_mv, amperage_ma);

    BatteryInfo {
        state: State {
            is_charging: record.bool(keys::IS_CHARGING),
            is_connected: record.bool(keys::EXTERNAL_CONNECTED),
            fully_charged: record.bool(keys::FULLY_CHARGED),
        },
        identity: Identity {
            serial_number: record.string(keys::SERIAL),
            device_name: record.string(keys::DEVICE_NAME),
            cycle_count: record.int(keys::CYCLE_COUNT),
        },
        capacity,
        charge: Charge {
            current_capacity: record.int(keys::CURRENT_CAPACITY),
            time_to_empty: record.int(keys::TIME_TO_EMPTY),
            time_to_full: record.int(keys::TIME_TO_FULL),
        },
        electrical: Electrical {
            temperature: record.int(keys::TEMPERATURE) as f64 / 100.0,
            voltage: milli(voltage_mv),
            amperage: milli(amperage_ma),
        },
        cell_voltages,
        adapter: Adapter {
            description: adapter.string(keys::ADAPTER_DESCRIPTION),
            max_watts: adapter.int(keys::ADAPTER_WATTS),
            max_voltage: milli(adapter.int(keys::ADAPTER_VOLTAGE)),
            max_amperage: milli(adapter.int(keys::ADAPTER_CURRENT)),
            input_voltage: milli(input_voltage_mv),
            input_amperage: milli(input_amperage_ma),
        },
        calculations: Calculations {
            health_by_max_capacity,
            health_by_nominal_capacity,
            condition_adjusted_health,
            ac_power: watts(ac),
            battery_power: watts(battery),
            system_power: watts(ac - battery),
        },
    }
}

/// Health percentages: (by max, by nominal, condition adjusted).
///
/// All zero when the design capacity is not positive. The condition
/// modifier is added to the unrounded nominal ratio so only one rounding
/// step happens.
fn health(capacity: &Capacity, cell_voltages: &[i64]) -> (i64, i64, i64) {
    if capacity.design_capacity <= 0 {
        return (0, 0, 0);
    }

    let design = capacity.design_capacity as f64;
    let by_max = capacity.max_capacity as f64 / design * 100.0;
    let by_nominal = capacity.nominal_capacity as f64 / design * 100.0;

    let modifier = cell_drift(cell_voltages).map_or(0.0, condition_modifier);

    (
        by_max.round() as i64,
        by_nominal.round() as i64,
        (by_nominal + modifier).round() as i64,
    )
}

/// Spread between the highest and lowest cell voltage, in mV.
///
/// `None` with fewer than two cells.
pub fn cell_drift(cell_voltages: &[i64]) -> Option<i64> {
    if cell_voltages.len() < 2 {
        return None;
    }

    let mut min = cell_voltages[0];
    let mut max = cell_voltages[0];
    for &v in cell_voltages {
        min = min.min(v);
        max = max.max(v);
    }
    Some(max.saturating_sub(min))
}

/// Health bonus or penalty for a given cell drift in mV
pub fn condition_modifier(drift: i64) -> f64 {
    match drift {
        d if d <= 5 => 2.5,
        d if d <= 15 => 1.0,
        d if d <= 30 => 0.0,
        d if d <= 50 => -2.0,
        _ => -10.0,
    }
}

/// Power of a millivolt/milliamp pair in hundredths of a watt, truncated toward zero.
///
/// mV x mA is µW, so dividing by 10_000 drops everything past the hundredths
/// place exactly. Integer division in Rust already truncates toward zero.
pub fn power_hundredths(millivolts: i64, milliamps: i64) -> i64 {
    let micro_watts = millivolts as i128 * milliamps as i128;
    (micro_watts / 10_000).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn watts(hundredths: i64) -> f64 {
    hundredths as f64 / 100.0
}

fn milli(raw: i64) -> f64 {
    raw as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(design: i64, max: i64, nominal: i64) -> Capacity {
        Capacity {
            design_capacity: design,
            max_capacity: max,
            nominal_capacity: nominal,
        }
    }

    #[test]
    fn test_condition_modifier_thresholds() {
        assert_eq!(condition_modifier(0), 2.5);
        assert_eq!(condition_modifier(5), 2.5);
        assert_eq!(condition_modifier(6), 1.0);
        assert_eq!(condition_modifier(15), 1.0);
        assert_eq!(condition_modifier(16), 0.0);
        assert_eq!(condition_modifier(30), 0.0);
        assert_eq!(condition_modifier(31), -2.0);
        assert_eq!(condition_modifier(50), -2.0);
        assert_eq!(condition_modifier(51), -10.0);
        assert_eq!(condition_modifier(400), -10.0);
    }

    #[test]
    fn test_cell_drift() {
        assert_eq!(cell_drift(&[]), None);
        assert_eq!(cell_drift(&[3800]), None);
        assert_eq!(cell_drift(&[3783, 3785, 3784]), Some(2));
        assert_eq!(cell_drift(&[3900, 3810, 3850]), Some(90));
    }

    #[test]
    fn test_health_reference_values() {
        let (by_max, by_nominal, adjusted) =
            health(&capacity(8579, 7701, 7945), &[3783, 3785, 3784]);
        assert_eq!(by_max, 90);
        assert_eq!(by_nominal, 93);
        // 92.61 + 2.5
        assert_eq!(adjusted, 95);
    }

    #[test]
    fn test_health_single_rounding() {
        // 92.6 + 2.5 = 95.1 -> 95; rounding the nominal ratio first would give 96
        let (_, by_nominal, adjusted) = health(&capacity(1000, 0, 926), &[3800, 3801]);
        assert_eq!(by_nominal, 93);
        assert_eq!(adjusted, 95);
    }

    #[test]
    fn test_health_skipped_without_design_capacity() {
        assert_eq!(health(&capacity(0, 7701, 7945), &[3783, 3790]), (0, 0, 0));
        assert_eq!(health(&capacity(-5, 7701, 7945), &[]), (0, 0, 0));
    }

    #[test]
    fn test_health_without_cells_has_no_modifier() {
        let (_, by_nominal, adjusted) = health(&capacity(8579, 7701, 7945), &[]);
        assert_eq!(adjusted, by_nominal);
        let (_, by_nominal, adjusted) = health(&capacity(8579, 7701, 7945), &[3800]);
        assert_eq!(adjusted, by_nominal);
    }

    #[test]
    fn test_health_rounds_half_away_from_zero() {
        // 32 / 256 = 12.5%, 96 / 256 = 37.5%
        let (by_max, by_nominal, _) = health(&capacity(256, 32, 96), &[]);
        assert_eq!(by_max, 13);
        assert_eq!(by_nominal, 38);
    }

    #[test]
    fn test_power_hundredths_truncates() {
        // 19.517 V x 3.213 A = 62.708121 W
        assert_eq!(power_hundredths(19517, 3213), 6270);
        // 12.000 V x -0.999 A = -11.988 W
        assert_eq!(power_hundredths(12000, -999), -1198);
        assert_eq!(power_hundredths(0, 5000), 0);
    }

    #[test]
    fn test_power_hundredths_does_not_overflow() {
        assert_eq!(power_hundredths(i64::MAX, i64::MAX), i64::MAX);
        assert_eq!(power_hundredths(i64::MAX, i64::MIN), i64::MIN);
    }
}
