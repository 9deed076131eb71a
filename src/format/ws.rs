// Bandai WonderSwan / WonderSwan Color.
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

//! The 16-byte footer (§4.K) at the end of the image, not a leading
//! header: maker ID, game ID, cart-features byte, ROM-size code
//! (`log2` of the image size in 128K units), save-type code, the
//! real-time-clock-present flag, and a checksum that is the 16-bit sum
//! of every other byte in the image, footer included.

use crate::analyze::Metadata;
use crate::format::RawImage;
use crate::message::Kind;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let unit = 128 * 1024;
    let mut rom = image.bytes.to_vec();
    let padded = rom.len().div_ceil(unit).max(1) * unit;
    rom.resize(padded, 0);

    let rom_size_code = (padded / unit).trailing_zeros() as u8;

    let maker_id = metadata.int("ws_maker_id").unwrap_or(0) as u8;
    let game_id = metadata.int("ws_game_id").unwrap_or(0) as u8;
    let cart_features = metadata.int("ws_cart_features").unwrap_or(0) as u8;
    let save_type = metadata.int("ws_save_type").unwrap_or(0) as u8;
    let has_rtc = metadata.flag("ws_rtc");

    let mut footer = vec![0u8; 16];
    footer[0] = maker_id;
    footer[1] = game_id;
    footer[2] = cart_features;
    footer[3] = rom_size_code;
    footer[4] = save_type;
    footer[5] = if has_rtc { 1 } else { 0 };
    // footer[6..14] reserved.
    footer[14] = 0; // checksum low, filled below.
    footer[15] = 0; // checksum high.

    rom.extend_from_slice(&footer);

    let footer_start = rom.len() - 16;
    let mut checksum: u16 = 0;
    for (i, &b) in rom.iter().enumerate() {
        if i < footer_start + 14 || i >= footer_start + 16 {
            checksum = checksum.wrapping_add(b as u16);
        }
    }
    rom[footer_start + 14..footer_start + 16].copy_from_slice(&checksum.to_le_bytes());

    if !(0..=0xFF).contains(&(rom_size_code as i64)) {
        return Err(Kind::BadDirectiveArg("ws_rom_size", rom_size_code.to_string()));
    }
    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_is_the_last_16_bytes() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xEAu8; 1000] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 128 * 1024);
        assert_eq!(rom[rom.len() - 16 + 3], 0); // 128K unit -> log2(1) == 0
    }

    #[test]
    fn rom_size_code_reflects_padded_length() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 200 * 1024] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 256 * 1024);
        assert_eq!(rom[rom.len() - 16 + 3], 1);
    }

    #[test]
    fn checksum_sums_every_byte_including_the_footer() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0x03u8; 1000] };
        let rom = wrap(&image, &meta).unwrap();
        let footer_start = rom.len() - 16;
        let mut expect: u16 = 0;
        for (i, &b) in rom.iter().enumerate() {
            if i < footer_start + 14 || i >= footer_start + 16 {
                expect = expect.wrapping_add(b as u16);
            }
        }
        assert_eq!(u16::from_le_bytes([rom[footer_start + 14], rom[footer_start + 15]]), expect);
    }
}
