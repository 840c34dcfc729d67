//! Registry reader for macOS
//!
//! Queries the I/O registry through the `ioreg` tool in text mode and parses
//! the property block of the first matching entry:
//!
//! ```text
//! +-o AppleSmartBattery  <class AppleSmartBattery, id 0x100000250, ...>
//!   | {
//!   |   "DesignCapacity" = 8579
//!   |   "IsCharging" = No
//!   |   "AdapterDetails" = {"Watts"=96,"Description"="pd charger"}
//!   |   "BatteryData" = {"CellVoltage"=(3783,3785,3784)}
//!   | }
//! ```

use crate::reader::BATTERY_SERVICE_CLASS;
use crate::record::Value;
use crate::{FetchError, RawRecord, RecordReader};
use std::process::Command;

const IOREG: &str = "ioreg";

/// Reads battery properties from the I/O registry via `ioreg`
#[derive(Debug, Clone)]
pub struct IoregReader {
    class: String,
    program: String,
}

impl IoregReader {
    /// Reader for the smart-battery service class
    pub fn new() -> Self {
        Self::with_class(BATTERY_SERVICE_CLASS)
    }

    /// Reader for an arbitrary registry class
    pub fn with_class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            program: IOREG.to_string(),
        }
    }

    /// Run a different registry dump program with the same arguments
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl Default for IoregReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordReader for IoregReader {
    fn fetch(&self) -> Result<RawRecord, FetchError> {
        tracing::debug!("Querying registry class {}", self.class);

        let output = Command::new(&self.program)
            .args(["-r", "-c", &self.class])
            .output()
            .map_err(|e| {
                FetchError::ServiceNotFound(format!(
                    "{}: failed to run {}: {}",
                    self.class, self.program, e
                ))
            })?;

        if !output.status.success() {
            return Err(FetchError::ServiceNotFound(format!(
                "{}: {} exited with {}",
                self.class, self.program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let record = parse_ioreg_output(&stdout, &self.class)?;
        tracing::info!(
            "Read {} properties from registry class {}",
            record.len(),
            self.class
        );
        Ok(record)
    }
}

/// Parse the properties of the first entry in `ioreg` text output
pub fn parse_ioreg_output(output: &str, class: &str) -> Result<RawRecord, FetchError> {
    let block =
        property_block(output).ok_or_else(|| FetchError::NoMatchingDevice(class.to_string()))?;

    let record = Parser::new(&block)
        .parse_block()
        .map_err(|e| FetchError::PropertyFetchFailed(format!("{}: {}", class, e)))?;

    if record.is_empty() {
        return Err(FetchError::PropertyFetchFailed(format!(
            "{}: entry has no properties",
            class
        )));
    }
    Ok(record)
}

/// Lines belonging to the first entry, with tree decoration stripped
fn property_block(output: &str) -> Option<String> {
    let mut lines = output.lines().map(strip_tree_prefix);

    lines.by_ref().find(|line| line.starts_with("+-o"))?;

    let block: Vec<&str> = lines.take_while(|line| !line.starts_with("+-o")).collect();
    Some(block.join("\n"))
}

fn strip_tree_prefix(line: &str) -> &str {
    let line = line.trim_start();
    match line.strip_prefix('|') {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parse the outermost `{ ... }` block
    fn parse_block(&mut self) -> Result<RawRecord, String> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                self.parse_entries()
            }
            Some(_) => Err(format!("expected '{{' at offset {}", self.pos)),
            None => Ok(RawRecord::new()),
        }
    }

    /// Parse `"key" = value` pairs up to the closing brace
    fn parse_entries(&mut self) -> Result<RawRecord, String> {
        let mut record = RawRecord::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err("unterminated record".to_string()),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(record);
                }
                Some(b'"') => {}
                Some(_) => return Err(format!("expected property name at offset {}", self.pos)),
            }

            let key = self.parse_string()?;
            self.skip_whitespace();
            if self.peek() != Some(b'=') {
                return Err(format!("expected '=' after \"{}\"", key));
            }
            self.pos += 1;
            self.skip_whitespace();

            if let Some(value) = self.parse_value()? {
                record.insert(key, value);
            }
        }
    }

    /// Parse one value. `Ok(None)` means the value was consumed but has no
    /// record representation (data blobs, floats, mixed arrays).
    fn parse_value(&mut self) -> Result<Option<Value>, String> {
        match self.peek() {
            None => Err("unexpected end of input".to_string()),
            Some(b'"') => Ok(Some(Value::Str(self.parse_string()?))),
            Some(b'{') => {
                self.pos += 1;
                Ok(Some(Value::Record(self.parse_entries()?)))
            }
            Some(b'(') => {
                self.pos += 1;
                self.parse_array()
            }
            Some(b'<') => {
                self.skip_past(b'>')?;
                Ok(None)
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => Ok(self.parse_number()),
            Some(_) => {
                let start = self.pos;
                let word = self.bare_word();
                Ok(match word {
                    "" => {
                        let found = self.src[start] as char;
                        return Err(format!("unexpected '{}' at offset {}", found, start));
                    }
                    "Yes" => Some(Value::Bool(true)),
                    "No" => Some(Value::Bool(false)),
                    _ => None,
                })
            }
        }
    }

    fn parse_array(&mut self) -> Result<Option<Value>, String> {
        let mut items = Vec::new();
        let mut all_ints = true;
        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err("unterminated array".to_string()),
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let start = self.pos;
                    match self.parse_value()? {
                        Some(Value::Int(v)) => items.push(v),
                        _ => all_ints = false,
                    }
                    if self.pos == start {
                        return Err(format!("unexpected input in array at offset {}", start));
                    }
                }
            }
        }
        Ok(all_ints.then_some(Value::IntArray(items)))
    }

    fn parse_string(&mut self) -> Result<String, String> {
        // opening quote
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err("unterminated string".to_string()),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                Some(b'\\') if self.pos + 1 < self.src.len() => {
                    bytes.push(self.src[self.pos + 1]);
                    self.pos += 2;
                }
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    /// Signed quantities such as Amperage are printed as unsigned 64-bit
    /// values; those reinterpret as two's-complement negatives.
    fn parse_number(&mut self) -> Option<Value> {
        let word = self.bare_word();
        if let Ok(v) = word.parse::<i64>() {
            return Some(Value::Int(v));
        }
        word.parse::<u64>().ok().map(|v| Value::Int(v as i64))
    }

    fn bare_word(&mut self) -> &'a str {
        let src: &'a [u8] = self.src;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b',' | b'}' | b')') {
                break;
            }
            self.pos += 1;
        }
        std::str::from_utf8(&src[start..self.pos]).unwrap_or("")
    }

    fn skip_past(&mut self, end: u8) -> Result<(), String> {
        match self.src[self.pos..].iter().position(|&b| b == end) {
            Some(offset) => {
                self.pos += offset + 1;
                Ok(())
            }
            None => Err(format!("missing '{}'", end as char)),
        }
    }
}
