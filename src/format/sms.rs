// Sega Master System / Game Gear.
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

//! The `TMR SEGA` header (§4.K). Its location slides with ROM size —
//! real hardware and emulators look for it at `$7FF0` in the last 16K
//! bank mapped through slot 2, so a 32K image carries it at `$7FF0` but
//! larger images carry it at `size - $4000 + $7FF0`.

use crate::analyze::Metadata;
use crate::format::RawImage;
use crate::message::Kind;

fn header_offset(rom_len: usize) -> usize {
    if rom_len <= 0x8000 {
        0x7FF0
    } else {
        rom_len - 0x4000 + 0x7FF0
    }
}

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let mut rom = image.bytes.to_vec();
    rom.resize(rom.len().max(0x8000), 0);

    let h = header_offset(rom.len());
    if h + 16 > rom.len() {
        return Err(Kind::BadDirectiveArg("sms", "ROM too small for header offset".into()));
    }

    rom[h..h + 8].copy_from_slice(b"TMR SEGA");
    rom[h + 8] = 0;
    rom[h + 9] = 0;
    // h+10..h+12 checksum, filled in below.

    let product_code = metadata.int("sms_product_code").unwrap_or(0) as u32;
    let version = metadata.int("sms_version").unwrap_or(0) as u8 & 0x0F;
    rom[h + 12] = (product_code % 10 + ((product_code / 10) % 10) * 16) as u8;
    rom[h + 13] = ((product_code / 100) % 10 + ((product_code / 1000) % 10) * 16) as u8;
    rom[h + 14] = (version & 0x0F) | (((product_code / 10000) as u8 & 0x0F) << 4);

    let size_code = metadata.int("sms_size_code").unwrap_or(0xC) as u8 & 0x0F;
    let region_code = metadata.int("sms_region_code").unwrap_or(4) as u8 & 0x0F;
    rom[h + 15] = (region_code << 4) | size_code;

    let mut checksum: u16 = 0;
    for (i, &b) in rom.iter().enumerate() {
        if i < h + 10 || i >= h + 12 {
            checksum = checksum.wrapping_add(b as u16);
        }
    }
    rom[h + 10..h + 12].copy_from_slice(&checksum.to_le_bytes());

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_for_a_32k_rom_lands_at_7ff0() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xEAu8; 0x8000] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[0x7FF0..0x7FF8], b"TMR SEGA");
    }

    #[test]
    fn header_slides_for_larger_roms() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 0x10000] };
        let rom = wrap(&image, &meta).unwrap();
        let h = 0x10000 - 0x4000 + 0x7FF0;
        assert_eq!(&rom[h..h + 8], b"TMR SEGA");
    }

    #[test]
    fn checksum_excludes_its_own_field() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0x7u8; 0x8000] };
        let rom = wrap(&image, &meta).unwrap();
        let h = 0x7FF0;
        let mut expect: u16 = 0;
        for (i, &b) in rom.iter().enumerate() {
            if i < h + 10 || i >= h + 12 {
                expect = expect.wrapping_add(b as u16);
            }
        }
        assert_eq!(u16::from_le_bytes([rom[h + 10], rom[h + 11]]), expect);
    }
}
