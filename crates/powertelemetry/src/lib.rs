//! Battery and power telemetry
//!
//! Reads the smart-battery service's property record from the platform
//! device registry and turns it into a typed snapshot with derived health
//! percentages and live power flow.
//!
//! # Readers
//!
//! - [`IoregReader`] - macOS I/O registry via `ioreg`
//! - [`SysfsReader`] - Linux `/sys/class/power_supply`
//! - [`JsonFileReader`] - replay of a previously dumped record
//! - [`mock::MockReader`] - canned records for tests
//!
//! # Example
//!
//! ```no_run
//! use powertelemetry::{IoregReader, get_battery_info};
//!
//! fn main() -> Result<(), powertelemetry::FetchError> {
//!     let info = get_battery_info(&IoregReader::new())?;
//!     println!("Health: {}%", info.calculations.health_by_max_capacity);
//!     println!("System draw: {} W", info.calculations.system_power);
//!     Ok(())
//! }
//! ```

pub mod battery;
pub mod ioreg;
pub mod mock;
pub mod reader;
pub mod record;
pub mod sysfs;

pub use battery::{
    Adapter, BatteryInfo, Calculations, Capacity, Charge, Electrical, Identity, MAX_CELLS, State,
    derive_snapshot, get_battery_info,
};
pub use ioreg::IoregReader;
pub use reader::{BATTERY_SERVICE_CLASS, FetchError, JsonFileReader, RecordReader};
pub use record::{RawRecord, Value};
pub use sysfs::SysfsReader;
