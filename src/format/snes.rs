// SNES (LoROM / HiROM / ExHiROM).
//
// This file is part of Poppy.
// Copyright (C) 2024 The Poppy Authors
//
// Poppy is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// Poppy is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Poppy.  If not, see <http://www.gnu.org/licenses/>.

//! The internal header copy (§4.K) at `$7FC0`/`$FFC0`/`$40FFC0`
//! depending on `lorom`/`hirom`/`exhirom`, plus the 16-bit checksum and
//! its one's complement computed over the padded ROM body.

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

#[derive(Clone, Copy, PartialEq, Eq)]
enum MapMode {
    LoRom,
    HiRom,
    ExHiRom,
}

fn map_mode(metadata: &Metadata) -> MapMode {
    if metadata.flag("exhirom") {
        MapMode::ExHiRom
    } else if metadata.flag("hirom") {
        MapMode::HiRom
    } else {
        MapMode::LoRom
    }
}

fn next_power_of_two_at_least_32k(len: usize) -> usize {
    let mut size = 32 * 1024;
    while size < len {
        size *= 2;
    }
    size
}

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let mode = map_mode(metadata);
    let header_offset = match mode {
        MapMode::LoRom => 0x7FC0,
        MapMode::HiRom => 0xFFC0,
        MapMode::ExHiRom => 0x40FFC0,
    };

    let rom_size = next_power_of_two_at_least_32k(image.bytes.len());
    let mut rom = image.bytes.to_vec();
    rom.resize(rom_size, 0);

    if header_offset + 64 > rom.len() {
        return Err(Kind::BadDirectiveArg("snes", "ROM too small for header offset".into()));
    }

    let title = metadata.str("snes_title").unwrap_or_else(|| "POPPY".to_string());
    let region = metadata.int("snes_region").unwrap_or(0) as u8;
    let fastrom = metadata.flag("snes_fastrom");
    let developer = metadata.int("snes_developer").unwrap_or(0) as u8;
    let version = metadata.int("snes_version").unwrap_or(0) as u8;
    let cartridge_type = metadata.int("snes_cartridge_type").unwrap_or(0) as u8;
    let sram_code = metadata.int("snes_sram").unwrap_or(0) as u8;

    let mut map_byte = match mode {
        MapMode::LoRom => 0x20,
        MapMode::HiRom | MapMode::ExHiRom => 0x21,
    };
    if fastrom {
        map_byte |= 0x10;
    }

    let rom_size_code = (rom_size / 1024).trailing_zeros() as u8;

    let h = header_offset;
    rom[h..h + 21].copy_from_slice(&pad_ascii(&title, 21, b' '));
    rom[h + 21] = map_byte;
    rom[h + 22] = cartridge_type;
    rom[h + 23] = rom_size_code;
    rom[h + 24] = sram_code;
    rom[h + 25] = region;
    rom[h + 26] = developer;
    rom[h + 27] = version;
    // checksum fields h+28..h+32 filled in after the running sum below.

    let mut sum: u32 = 0;
    for (i, b) in rom.iter().enumerate() {
        if i < h + 28 || i >= h + 32 {
            sum = sum.wrapping_add(*b as u32);
        }
    }
    let checksum = (sum & 0xFFFF) as u16;
    let complement = !checksum;
    rom[h + 28] = (complement & 0xFF) as u8;
    rom[h + 29] = (complement >> 8) as u8;
    rom[h + 30] = (checksum & 0xFF) as u8;
    rom[h + 31] = (checksum >> 8) as u8;

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::MetaValue;

    #[test]
    fn lorom_header_lands_at_7fc0() {
        let mut meta = Metadata::default();
        meta.push("snes_title", MetaValue::Str("TEST GAME".into()));
        let image = RawImage { base: 0, bytes: &[0xEAu8; 1024] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 32 * 1024);
        assert_eq!(&rom[0x7FC0..0x7FC9], b"TEST GAME");
        assert_eq!(rom[0x7FC0 + 21], 0x20);
    }

    #[test]
    fn hirom_sets_map_mode_byte() {
        let mut meta = Metadata::default();
        meta.push("hirom", MetaValue::Int(1));
        let image = RawImage { base: 0, bytes: &[0u8; 1024] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom[0xFFC0 + 21], 0x21);
    }

    #[test]
    fn checksum_and_complement_are_bitwise_inverses() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0x11u8; 2000] };
        let rom = wrap(&image, &meta).unwrap();
        let h = 0x7FC0;
        let complement = u16::from_le_bytes([rom[h + 28], rom[h + 29]]);
        let checksum = u16::from_le_bytes([rom[h + 30], rom[h + 31]]);
        assert_eq!(complement, !checksum);
    }
}
