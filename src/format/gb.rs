// Game Boy / Game Boy Color.
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

//! `$0100-$014F` cartridge header (§4.K): entry jump, the fixed
//! Nintendo logo, title, CGB flag, MBC type, ROM/RAM size codes,
//! region, and the two checksums.

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

/// The 48-byte bitmap every real Game Boy boot ROM compares the
/// cartridge against before it will run it.
const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let rom_size_code = metadata.int("gb_rom_size").unwrap_or(0) as u8;
    let rom_size = 32 * 1024 * (1usize << rom_size_code);
    let header_end = 0x0150usize;
    if rom_size < header_end {
        return Err(Kind::BadDirectiveArg("gb_rom_size", rom_size_code.to_string()));
    }

    let mut rom = image.bytes.to_vec();
    rom.resize(rom_size.max(rom.len()), 0);

    rom[0x0100] = 0x00; // nop
    rom[0x0101] = 0xC3; // jp $0150
    rom[0x0102] = 0x50;
    rom[0x0103] = 0x01;
    rom[0x0104..0x0134].copy_from_slice(&NINTENDO_LOGO);

    let title = metadata.str("gb_title").unwrap_or_default();
    rom[0x0134..0x013F].copy_from_slice(&pad_ascii(&title, 11, 0));

    rom[0x0143] = if metadata.flag("gb_cgb") { 0x80 } else { 0x00 };
    rom[0x0147] = metadata.int("gb_mbc").unwrap_or(0) as u8;
    rom[0x0148] = rom_size_code;
    rom[0x0149] = metadata.int("gb_ram_size").unwrap_or(0) as u8;
    rom[0x014A] = metadata.int("gb_region").unwrap_or(0) as u8;
    rom[0x014B] = 0x33; // old licensee: use new-licensee code
    rom[0x014C] = metadata.int("gb_version").unwrap_or(0) as u8;

    let mut header_checksum: u8 = 0;
    for &b in &rom[0x0134..0x014D] {
        header_checksum = header_checksum.wrapping_sub(b).wrapping_sub(1);
    }
    rom[0x014D] = header_checksum;

    let mut global_sum: u16 = 0;
    for (i, &b) in rom.iter().enumerate() {
        if i != 0x014E && i != 0x014F {
            global_sum = global_sum.wrapping_add(b as u16);
        }
    }
    rom[0x014E] = (global_sum >> 8) as u8;
    rom[0x014F] = (global_sum & 0xFF) as u8;

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::MetaValue;

    #[test]
    fn entry_jumps_past_the_header() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 0x0150] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[0x0100..0x0104], &[0x00, 0xC3, 0x50, 0x01]);
        assert_eq!(&rom[0x0104..0x0134], &super::NINTENDO_LOGO);
    }

    #[test]
    fn header_checksum_matches_formula() {
        let mut meta = Metadata::default();
        meta.push("gb_title", MetaValue::Str("POPPY".into()));
        let image = RawImage { base: 0, bytes: &[0u8; 0x0150] };
        let rom = wrap(&image, &meta).unwrap();
        let mut expect: u8 = 0;
        for &b in &rom[0x0134..0x014D] {
            expect = expect.wrapping_sub(b).wrapping_sub(1);
        }
        assert_eq!(rom[0x014D], expect);
    }
}
