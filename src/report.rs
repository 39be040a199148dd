//! Result output for the command-line tool.
//!
//! - **stdout**: results only (header text or JSON, one object per line)
//! - **stderr**: logs and progress
//!
//! Lines are written with an explicit `\n` and flushed immediately so a
//! script reading stdout sees whole lines.

use std::io::Write;

use serde::Serialize;

use crate::cartridge::CartridgeMetadata;
use crate::progress::{percent, Progress};

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes.
///
/// # Errors
///
/// Returns IO error if write or flush fails.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

/// Write a JSON value to stdout as a single line.
pub fn write_stdout_json<T: Serialize>(value: &T) -> crate::error::Result<()> {
    let json = serde_json::to_string(value)?;
    write_stdout_line(&json)?;
    Ok(())
}

/// Cartridge header with every code spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderReport {
    /// Title text, up to the first NUL.
    pub title: String,
    /// Cartridge type description.
    pub cartridge_type: &'static str,
    /// ROM size description.
    pub rom_size: &'static str,
    /// RAM size description.
    pub ram_size: &'static str,
    /// RAM size in bytes, if the code is known.
    pub ram_bytes: Option<u64>,
    /// Mask ROM version.
    pub version: u8,
    /// Header checksum matched.
    pub checksum_valid: bool,
    /// Default ROM dump file name (valid header only).
    pub rom_file: Option<String>,
    /// Default save file name (valid header only).
    pub save_file: Option<String>,
}

impl HeaderReport {
    /// Build the report for a decoded header.
    pub fn new(meta: &CartridgeMetadata) -> Self {
        Self {
            title: meta.title_str(),
            cartridge_type: meta.cartridge_type.describe(),
            rom_size: meta.rom_size.describe(),
            ram_size: meta.ram_size.describe(),
            ram_bytes: meta.ram_size.bytes(),
            version: meta.version,
            checksum_valid: meta.checksum_valid,
            rom_file: meta.rom_file_name(),
            save_file: meta.save_file_name(),
        }
    }

    /// Human-readable block, one field per line.
    pub fn to_text(&self) -> String {
        if !self.checksum_valid {
            return "No cartridge inserted or cartridge read failed!".to_string();
        }
        format!(
            "Rom title: {}\nCartridge type: {}\nRom size: {}\nRam size: {}\nRom version: {}\nChecksum: OK",
            self.title, self.cartridge_type, self.rom_size, self.ram_size, self.version
        )
    }
}

/// Progress printer for a terminal: `State: done of total (pct%)` on
/// one line of stderr, redrawn in place.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    drawn: bool,
}

impl ConsoleProgress {
    /// Create a printer with nothing drawn yet.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Format one progress line.
pub fn progress_line(total: u64, remaining: u64) -> String {
    let done = total.saturating_sub(remaining);
    format!(
        "State: {} of {} ({:.1}%)",
        done,
        total,
        percent(total, remaining)
    )
}

impl Progress for ConsoleProgress {
    fn start(&mut self, label: &'static str) {
        eprintln!("{}", label);
    }

    fn update(&mut self, total: u64, remaining: u64) {
        let mut stderr = std::io::stderr().lock();
        // Progress is best effort; a closed stderr must not abort a dump.
        let _ = write!(stderr, "\r{}", progress_line(total, remaining));
        let _ = stderr.flush();
        self.drawn = true;
    }

    fn finish(&mut self) {
        if std::mem::take(&mut self.drawn) {
            eprintln!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(checksum: u8) -> CartridgeMetadata {
        CartridgeMetadata::decode(&[3, b'A', b'B', b'C', 0x13, 0x02, 0x03, 0x01, checksum])
            .unwrap()
    }

    #[test]
    fn test_write_stdout_line_does_not_panic() {
        let result = write_stdout_line(r#"{"test": true}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn test_header_report_fields() {
        let report = HeaderReport::new(&meta(1));

        assert_eq!(report.title, "ABC");
        assert_eq!(report.cartridge_type, "13h - MBC3+RAM+BATTERY");
        assert_eq!(report.ram_bytes, Some(32 * 1024));
        assert_eq!(report.rom_file.as_deref(), Some("ABC.gb"));
        assert_eq!(report.save_file.as_deref(), Some("ABC.sav"));
        assert!(report.to_text().starts_with("Rom title: ABC\n"));
    }

    #[test]
    fn test_header_report_invalid_checksum() {
        let report = HeaderReport::new(&meta(0));

        assert!(report.rom_file.is_none());
        assert!(report.to_text().starts_with("No cartridge"));
    }

    #[test]
    fn test_header_report_json() {
        let value = serde_json::to_value(HeaderReport::new(&meta(1))).unwrap();
        assert_eq!(value["title"], "ABC");
        assert_eq!(value["version"], 1);
        assert_eq!(value["checksum_valid"], true);
    }

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(200, 50), "State: 150 of 200 (75.0%)");
        assert_eq!(progress_line(0, 0), "State: 0 of 0 (100.0%)");
    }
}
