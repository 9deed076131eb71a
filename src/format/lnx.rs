// Atari Lynx.
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

//! The 64-byte `LYNX` header (§4.K) prepended to the raw image: magic,
//! per-bank page size in 256-byte units, the bank-1 size (0 for
//! cartridges with a single bank), version, cart name, manufacturer
//! name, and the rotation byte the handheld's BIOS reads to orient the
//! screen.

use crate::analyze::Metadata;
use crate::format::{pad_ascii, RawImage};
use crate::message::Kind;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let bank0_pages = metadata.int("lnx_bank0_pages").unwrap_or(((image.bytes.len() + 255) / 256) as i64);
    if !(0..=0xFFFF).contains(&bank0_pages) {
        return Err(Kind::BadDirectiveArg("lnx_bank0_pages", bank0_pages.to_string()));
    }
    let bank1_pages = metadata.int("lnx_bank1_pages").unwrap_or(0);
    let version = metadata.int("lnx_version").unwrap_or(1) as u16;
    let name = metadata.str("lnx_name").unwrap_or_default();
    let manufacturer = metadata.str("lnx_manufacturer").unwrap_or_default();
    let rotation = metadata.int("lnx_rotation").unwrap_or(0) as u8;

    let mut header = vec![0u8; 64];
    header[0..4].copy_from_slice(b"LYNX");
    header[4..6].copy_from_slice(&(bank0_pages as u16).to_le_bytes());
    header[6..8].copy_from_slice(&(bank1_pages as u16).to_le_bytes());
    header[8..10].copy_from_slice(&version.to_le_bytes());
    header[10..42].copy_from_slice(&pad_ascii(&name, 32, 0));
    header[42..58].copy_from_slice(&pad_ascii(&manufacturer, 16, 0));
    header[58] = rotation;
    // header[59..64] reserved, left zero.

    let mut out = header;
    out.extend_from_slice(image.bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::MetaValue;

    #[test]
    fn header_starts_with_lynx_magic() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xFFu8; 512] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[0..4], b"LYNX");
        assert_eq!(rom.len(), 64 + 512);
    }

    #[test]
    fn bank0_pages_defaults_from_image_length() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0u8; 512] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(u16::from_le_bytes([rom[4], rom[5]]), 2);
    }

    #[test]
    fn name_is_embedded_and_null_padded() {
        let mut meta = Metadata::default();
        meta.push("lnx_name", MetaValue::Str("POPPY".into()));
        let image = RawImage { base: 0, bytes: &[] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[10..15], b"POPPY");
        assert_eq!(rom[15], 0);
    }
}
