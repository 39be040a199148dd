//! Cartridge header metadata.
//!
//! The read-header reply is a small block laid out as:
//!
//! ```text
//! ┌─────────┬──────────────┬──────┬──────┬──────┬─────────┬──────────┐
//! │ Title   │ Title        │ Type │ ROM  │ RAM  │ Version │ Checksum │
//! │ length T│ T bytes      │      │ size │ size │         │ valid    │
//! └─────────┴──────────────┴──────┴──────┴──────┴─────────┴──────────┘
//! ```
//!
//! The firmware may NUL-terminate the title, in which case the five
//! field bytes start one byte later. The block is parsed once into a
//! [`CartridgeMetadata`] and never re-indexed downstream.

mod codes;

pub use codes::{CartridgeType, RamSize, RomSize};

use serde::Serialize;

use crate::error::{LinkError, Result};
use crate::protocol::HEADER_PAYLOAD_CAPACITY;

/// Field bytes following the title.
pub const TRAILING_FIELDS: usize = 5;

/// Extension of a ROM dump.
pub const ROM_EXTENSION: &str = "gb";

/// Extension of a RAM (save) dump.
pub const SAVE_EXTENSION: &str = "sav";

/// Decoded cartridge header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartridgeMetadata {
    /// Raw title bytes, without terminator.
    pub title: Vec<u8>,
    /// Controller code.
    pub cartridge_type: CartridgeType,
    /// ROM size code.
    pub rom_size: RomSize,
    /// RAM size code.
    pub ram_size: RamSize,
    /// Mask ROM version.
    pub version: u8,
    /// Header checksum matched; other fields are unreliable otherwise.
    pub checksum_valid: bool,
}

impl CartridgeMetadata {
    /// Decode a read-header payload.
    ///
    /// # Errors
    ///
    /// Returns `MalformedMetadata` if the declared title does not leave
    /// room for the five field bytes, or would not fit the header capacity.
    ///
    /// # Example
    ///
    /// ```
    /// use gbx_link::cartridge::CartridgeMetadata;
    ///
    /// let payload = [3, b'A', b'B', b'C', 0x13, 0x02, 0x00, 0x01, 0x01];
    /// let meta = CartridgeMetadata::decode(&payload).unwrap();
    /// assert_eq!(meta.title_str(), "ABC");
    /// assert_eq!(meta.cartridge_type.describe(), "13h - MBC3+RAM+BATTERY");
    /// assert!(meta.checksum_valid);
    /// ```
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let title_len = check_len(payload)?;
        let title_end = 1 + title_len;

        // Skip the title terminator when the firmware sends one.
        let fields_at = if payload[title_end] == 0 && payload.len() > title_end + TRAILING_FIELDS
        {
            title_end + 1
        } else {
            title_end
        };
        let fields = &payload[fields_at..fields_at + TRAILING_FIELDS];

        Ok(Self {
            title: payload[1..title_end].to_vec(),
            cartridge_type: CartridgeType(fields[0]),
            rom_size: RomSize(fields[1]),
            ram_size: RamSize(fields[2]),
            version: fields[3],
            checksum_valid: fields[4] != 0,
        })
    }

    /// Title as text, stopping at the first NUL.
    pub fn title_str(&self) -> String {
        let end = self
            .title
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.title.len());
        String::from_utf8_lossy(&self.title[..end]).into_owned()
    }

    /// File name for a ROM dump, only for a valid header.
    pub fn rom_file_name(&self) -> Option<String> {
        self.file_name(ROM_EXTENSION)
    }

    /// File name for a RAM dump, only for a valid header.
    pub fn save_file_name(&self) -> Option<String> {
        self.file_name(SAVE_EXTENSION)
    }

    fn file_name(&self, extension: &str) -> Option<String> {
        if !self.checksum_valid {
            return None;
        }
        let stem: String = self
            .title_str()
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if stem.is_empty() {
            return None;
        }
        Some(format!("{stem}.{extension}"))
    }
}

/// Check the length precondition and return the title length.
fn check_len(payload: &[u8]) -> Result<usize> {
    let malformed = |title_len| LinkError::MalformedMetadata {
        title_len,
        payload_len: payload.len(),
    };

    let title_len = *payload.first().ok_or_else(|| malformed(0))? as usize;
    let needed = 1 + title_len + TRAILING_FIELDS;
    if needed > HEADER_PAYLOAD_CAPACITY || needed > payload.len() {
        return Err(malformed(title_len));
    }
    Ok(title_len)
}
