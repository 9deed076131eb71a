// SPC700 sound file (`.spc`, SNES APU dump).
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

//! The `.spc` snapshot format (§4.K): a fixed 33-byte text header, the
//! six APU registers, an ID666 tag block, a 64K RAM image seeded with
//! the assembled code at its link address, 128 bytes of DSP register
//! state, and the 64-byte IPL ROM region (left as the hardware's own
//! boot ROM provides it, since poppy assembles APU programs, not the
//! IPL itself).

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

const HEADER_TEXT: &[u8; 33] = b"SNES-SPC700 Sound File Data v0.30";
const RAM_SIZE: usize = 0x10000;
const TOTAL_SIZE: usize = 0x10200;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    if image.base < 0 || image.base as usize + image.bytes.len() > RAM_SIZE {
        return Err(Kind::BadDirectiveArg("spc", "program does not fit in 64K APU RAM".into()));
    }

    let mut file = vec![0u8; TOTAL_SIZE];
    file[0..33].copy_from_slice(&HEADER_TEXT[..33]);
    file[33] = 0x1A;
    file[34] = 0x1A;
    file[35] = if metadata.flag("spc_has_id666") { 26 } else { 27 };
    file[36] = 30;

    let pc = metadata.int("spc_pc").unwrap_or(image.base) as u16;
    file[37..39].copy_from_slice(&pc.to_le_bytes());
    file[39] = metadata.int("spc_a").unwrap_or(0) as u8;
    file[40] = metadata.int("spc_x").unwrap_or(0) as u8;
    file[41] = metadata.int("spc_y").unwrap_or(0) as u8;
    file[42] = metadata.int("spc_psw").unwrap_or(0) as u8;
    file[43] = metadata.int("spc_sp").unwrap_or(0xEF) as u8;

    let song_title = metadata.str("spc_song_title").unwrap_or_default();
    file[46..78].copy_from_slice(&pad_ascii(&song_title, 32, 0));
    let game_title = metadata.str("spc_game_title").unwrap_or_default();
    file[78..110].copy_from_slice(&pad_ascii(&game_title, 32, 0));
    let artist = metadata.str("spc_artist").unwrap_or_default();
    file[177..209].copy_from_slice(&pad_ascii(&artist, 32, 0));

    let ram = &mut file[0x100..0x100 + RAM_SIZE];
    let start = image.base as usize;
    ram[start..start + image.bytes.len()].copy_from_slice(image.bytes);

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_carries_the_fixed_text_header() {
        let meta = Metadata::default();
        let image = RawImage { base: 0x200, bytes: &[0xCDu8, 0x00] };
        let file = wrap(&image, &meta).unwrap();
        assert_eq!(&file[0..33], &HEADER_TEXT[..]);
        assert_eq!(file.len(), TOTAL_SIZE);
    }

    #[test]
    fn program_is_embedded_at_its_link_address() {
        let meta = Metadata::default();
        let image = RawImage { base: 0x200, bytes: &[0xAA, 0xBB, 0xCC] };
        let file = wrap(&image, &meta).unwrap();
        assert_eq!(&file[0x100 + 0x200..0x100 + 0x203], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn program_outside_ram_is_rejected() {
        let meta = Metadata::default();
        let image = RawImage { base: 0xFFFE, bytes: &[0u8; 8] };
        assert!(wrap(&image, &meta).is_err());
    }
}
