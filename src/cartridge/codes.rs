//! Cartridge header code tables.
//!
//! The header carries one-byte codes for the memory controller, the ROM
//! size and the RAM size. These wrappers keep the raw code and give it a
//! human-readable description.

use std::fmt;

use serde::Serialize;

const UNKNOWN: &str = "UNKNOWN";

/// Memory bank controller and extra hardware on the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CartridgeType(pub u8);

impl CartridgeType {
    /// Human-readable description, prefixed with the hex code.
    pub fn describe(self) -> &'static str {
        match self.0 {
            0x00 => "00h - ROM ONLY",
            0x01 => "01h - MBC1",
            0x02 => "02h - MBC1+RAM",
            0x03 => "03h - MBC1+RAM+BATTERY",
            0x05 => "05h - MBC2",
            0x06 => "06h - MBC2+BATTERY",
            0x08 => "08h - ROM+RAM",
            0x09 => "09h - ROM+RAM+BATTERY",
            0x0B => "0Bh - MMM01",
            0x0C => "0Ch - MMM01+RAM",
            0x0D => "0Dh - MMM01+RAM+BATTERY",
            0x0F => "0Fh - MBC3+TIMER+BATTERY",
            0x10 => "10h - MBC3+TIMER+RAM+BATTERY",
            0x11 => "11h - MBC3",
            0x12 => "12h - MBC3+RAM",
            0x13 => "13h - MBC3+RAM+BATTERY",
            0x19 => "19h - MBC5",
            0x1A => "1Ah - MBC5+RAM",
            0x1B => "1Bh - MBC5+RAM+BATTERY",
            0x1C => "1Ch - MBC5+RUMBLE",
            0x1D => "1Dh - MBC5+RUMBLE+RAM",
            0x1E => "1Eh - MBC5+RUMBLE+RAM+BATTERY",
            0x20 => "20h - MBC6",
            0x22 => "22h - MBC7+SENSOR+RUMBLE+RAM+BATTERY",
            0xFC => "FCh - POCKET CAMERA",
            0xFD => "FDh - BANDAI TAMA5",
            0xFE => "FEh - HuC3",
            0xFF => "FFh - HuC1+RAM+BATTERY",
            _ => UNKNOWN,
        }
    }

    /// Check if the controller has a battery keeping RAM alive.
    pub fn has_battery(self) -> bool {
        self.describe().contains("BATTERY")
    }
}

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// ROM size code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RomSize(pub u8);

impl RomSize {
    /// Human-readable description, prefixed with the hex code.
    pub fn describe(self) -> &'static str {
        match self.0 {
            0x00 => "00h - 32KByte(no ROM banking)",
            0x01 => "01h - 64KByte(4 banks)",
            0x02 => "02h - 128KByte(8 banks)",
            0x03 => "03h - 256KByte(16 banks)",
            0x04 => "04h - 512KByte(32 banks)",
            0x05 => "05h - 1MByte(64 banks) => only 63 banks used by MBC1",
            0x06 => "06h - 2MByte(128 banks) => only 125 banks used by MBC1",
            0x07 => "07h - 4MByte(256 banks)",
            0x08 => "08h - 8MByte(512 banks)",
            0x52 => "52h - 1.1MByte(72 banks)",
            0x53 => "53h - 1.2MByte(80 banks)",
            0x54 => "54h - 1.5MByte(96 banks)",
            _ => UNKNOWN,
        }
    }

    /// ROM size in bytes (16 KiB banks), if the code is known.
    pub fn bytes(self) -> Option<u64> {
        const BANK: u64 = 16 * 1024;
        match self.0 {
            code @ 0x00..=0x08 => Some((32 * 1024) << code),
            0x52 => Some(72 * BANK),
            0x53 => Some(80 * BANK),
            0x54 => Some(96 * BANK),
            _ => None,
        }
    }
}

impl fmt::Display for RomSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// RAM size code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RamSize(pub u8);

impl RamSize {
    /// Human-readable description, prefixed with the hex code.
    pub fn describe(self) -> &'static str {
        match self.0 {
            0x00 => "00h - None",
            0x01 => "01h - 2 KBytes",
            0x02 => "02h - 8 Kbytes",
            0x03 => "03h - 32 KBytes(4 banks of 8KBytes each)",
            0x04 => "04h - 128 KBytes(16 banks of 8KBytes each)",
            0x05 => "05h - 64 KBytes(8 banks of 8KBytes each)",
            _ => UNKNOWN,
        }
    }

    /// RAM size in bytes, if the code is known.
    ///
    /// MBC2 carts report `00h` but carry 512 half-bytes on the controller;
    /// the device answers get-ram-size for those, not this table.
    pub fn bytes(self) -> Option<u64> {
        match self.0 {
            0x00 => Some(0),
            0x01 => Some(2 * 1024),
            0x02 => Some(8 * 1024),
            0x03 => Some(32 * 1024),
            0x04 => Some(128 * 1024),
            0x05 => Some(64 * 1024),
            _ => None,
        }
    }
}

impl fmt::Display for RamSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartridge_type_descriptions() {
        assert_eq!(CartridgeType(0x13).describe(), "13h - MBC3+RAM+BATTERY");
        assert_eq!(CartridgeType(0x00).describe(), "00h - ROM ONLY");
        assert_eq!(CartridgeType(0x0B).describe(), "0Bh - MMM01");
        assert_eq!(CartridgeType(0x42).describe(), "UNKNOWN");
        assert_eq!(CartridgeType(0x1B).to_string(), "1Bh - MBC5+RAM+BATTERY");
    }

    #[test]
    fn test_battery_detection() {
        assert!(CartridgeType(0x03).has_battery());
        assert!(CartridgeType(0x10).has_battery());
        assert!(!CartridgeType(0x01).has_battery());
        assert!(!CartridgeType(0x77).has_battery());
    }

    #[test]
    fn test_rom_size_bytes() {
        assert_eq!(RomSize(0x00).bytes(), Some(32 * 1024));
        assert_eq!(RomSize(0x02).bytes(), Some(128 * 1024));
        assert_eq!(RomSize(0x08).bytes(), Some(8 * 1024 * 1024));
        assert_eq!(RomSize(0x52).bytes(), Some(72 * 16 * 1024));
        assert_eq!(RomSize(0x09).bytes(), None);
        assert_eq!(RomSize(0x09).describe(), "UNKNOWN");
    }

    #[test]
    fn test_ram_size_bytes() {
        assert_eq!(RamSize(0x00).bytes(), Some(0));
        assert_eq!(RamSize(0x02).bytes(), Some(8192));
        assert_eq!(RamSize(0x05).bytes(), Some(64 * 1024));
        assert_eq!(RamSize(0x06).bytes(), None);
        assert_eq!(RamSize(0x03).describe(), "03h - 32 KBytes(4 banks of 8KBytes each)");
    }
}
