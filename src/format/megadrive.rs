// Sega Mega Drive / Genesis.
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

//! The `$100`-anchored console header (§4.K): console name, copyright,
//! domestic/overseas titles, product code, big-endian checksum over the
//! body from `$200` onward, I/O support string, ROM/RAM ranges.

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let mut rom = image.bytes.to_vec();
    rom.resize(rom.len().max(0x200), 0);

    rom[0x100..0x110].copy_from_slice(&pad_ascii("SEGA MEGA DRIVE ", 16, b' '));
    let copyright = metadata.str("md_copyright").unwrap_or_else(|| "(C)POPPY 2024.OCT".to_string());
    rom[0x110..0x120].copy_from_slice(&pad_ascii(&copyright, 16, b' '));
    let domestic = metadata.str("md_domestic_title").unwrap_or_default();
    rom[0x120..0x150].copy_from_slice(&pad_ascii(&domestic, 48, b' '));
    let overseas = metadata.str("md_overseas_title").unwrap_or_else(|| domestic.clone());
    rom[0x150..0x180].copy_from_slice(&pad_ascii(&overseas, 48, b' '));

    let product_code = metadata.str("md_product_code").unwrap_or_default();
    rom[0x180..0x18E].copy_from_slice(&pad_ascii(&product_code, 14, b' '));

    let io_support = metadata.str("md_io_support").unwrap_or_else(|| "J".to_string());
    rom[0x190..0x1A0].copy_from_slice(&pad_ascii(&io_support, 16, b' '));

    let rom_end = (rom.len() as u32).saturating_sub(1);
    rom[0x1A0..0x1A4].copy_from_slice(&0u32.to_be_bytes());
    rom[0x1A4..0x1A8].copy_from_slice(&rom_end.to_be_bytes());
    let ram_start: u32 = 0x00FF_0000;
    let ram_end: u32 = 0x00FF_FFFF;
    rom[0x1A8..0x1AC].copy_from_slice(&ram_start.to_be_bytes());
    rom[0x1AC..0x1B0].copy_from_slice(&ram_end.to_be_bytes());

    let has_sram = metadata.flag("md_sram");
    rom[0x1B0..0x1B2].copy_from_slice(if has_sram { b"RA" } else { b"  " });
    rom[0x1B2] = 0x00;
    rom[0x1B3] = 0x00;
    rom[0x1B4..0x1B8].copy_from_slice(&ram_start.to_be_bytes());
    rom[0x1B8..0x1BC].copy_from_slice(&ram_end.to_be_bytes());

    let region = metadata.str("md_region").unwrap_or_else(|| "JUE".to_string());
    rom[0x1F0..0x1F0 + region.len().min(16)].copy_from_slice(&pad_ascii(&region, region.len().min(16), b' '));

    let mut checksum: u16 = 0;
    for chunk in rom[0x200..].chunks(2) {
        let word = if chunk.len() == 2 { u16::from_be_bytes([chunk[0], chunk[1]]) } else { (chunk[0] as u16) << 8 };
        checksum = checksum.wrapping_add(word);
    }
    rom[0x18E..0x190].copy_from_slice(&checksum.to_be_bytes());

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_name_is_at_0x100() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 0x400] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[0x100..0x110], b"SEGA MEGA DRIVE ");
    }

    #[test]
    fn checksum_covers_body_from_0x200() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0x01u8; 0x400] };
        let rom = wrap(&image, &meta).unwrap();
        let mut expect: u16 = 0;
        for chunk in rom[0x200..].chunks(2) {
            expect = expect.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        assert_eq!(u16::from_be_bytes([rom[0x18E], rom[0x18F]]), expect);
    }
}
