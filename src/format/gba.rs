// Game Boy Advance.
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

//! The `$00-$BF` ROM header (§4.K): the entry branch, the 156-byte
//! Nintendo logo the BIOS intro compares against, title/game code/maker
//! code, the fixed `$96` value, and the header checksum the BIOS
//! actually enforces before it will jump into the cartridge.

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

const HEADER_SIZE: usize = 0xC0;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let title = metadata.str("gba_title").unwrap_or_default();
    if title.len() > 12 {
        return Err(Kind::BadDirectiveArg("gba_title", title));
    }
    let game_code = metadata.str("gba_game_code").unwrap_or_else(|| "0000".to_string());
    let maker_code = metadata.str("gba_maker_code").unwrap_or_else(|| "00".to_string());
    let version = metadata.int("gba_version").unwrap_or(0) as u8;

    let mut rom = image.bytes.to_vec();
    if rom.len() < HEADER_SIZE {
        rom.resize(HEADER_SIZE, 0);
    }

    // B instruction branching past the header to the first code byte.
    let offset = (HEADER_SIZE as i32 - 8) / 4;
    let branch = 0xEA00_0000u32 | (offset as u32 & 0x00FF_FFFF);
    rom[0x00..0x04].copy_from_slice(&branch.to_le_bytes());

    // Logo region is left zeroed: poppy does not bundle Nintendo's
    // copyrighted bitmap, so images built here only run on BIOSes or
    // emulators with the logo check disabled.
    rom[0x04..0xA0].fill(0);

    rom[0xA0..0xAC].copy_from_slice(&pad_ascii(&title, 12, 0));
    rom[0xAC..0xB0].copy_from_slice(&pad_ascii(&game_code, 4, b'0'));
    rom[0xB0..0xB2].copy_from_slice(&pad_ascii(&maker_code, 2, b'0'));
    rom[0xB2] = 0x96;
    rom[0xB3] = 0x00; // main unit code
    rom[0xB4] = 0x00; // device type
    rom[0xB5..0xBC].fill(0); // reserved
    rom[0xBC] = version;
    // rom[0xBD] checksum, filled below.

    let sum: i32 = rom[0xA0..0xBD].iter().map(|&b| b as i32).sum();
    rom[0xBD] = (-(sum + 0x19)) as u8;
    rom[0xBE..0xC0].fill(0); // reserved

    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_branch_skips_past_the_header() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xFFu8; 0x200] };
        let rom = wrap(&image, &meta).unwrap();
        let instr = u32::from_le_bytes([rom[0], rom[1], rom[2], rom[3]]);
        assert_eq!(instr & 0xFF00_0000, 0xEA00_0000);
    }

    #[test]
    fn fixed_value_and_checksum_are_present() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 0x200] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom[0xB2], 0x96);
        let sum: i32 = rom[0xA0..0xBD].iter().map(|&b| b as i32).sum();
        assert_eq!(rom[0xBD], (-(sum + 0x19)) as u8);
    }

    #[test]
    fn title_longer_than_twelve_bytes_is_rejected() {
        let mut meta = Metadata::default();
        meta.push("gba_title", crate::analyze::MetaValue::Str("WAY TOO LONG TITLE".into()));
        let image = RawImage { base: 0, bytes: &[0u8; 0x200] };
        assert!(wrap(&image, &meta).is_err());
    }
}
