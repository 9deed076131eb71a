// iNES (NES/Famicom).
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

//! The 16-byte iNES header (§4.K): `"NES\x1A"` magic, PRG/CHR unit
//! counts, mapper nibbles split across flags 6/7, the iNES 2.0 marker
//! bit, and the mirroring/battery/trainer/region flags.

use bitflags::bitflags;

use crate::analyze::Metadata;
use crate::format::RawImage;
use crate::message::Kind;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Flags6: u8 {
        const VERTICAL_MIRRORING = 0x01;
        const BATTERY = 0x02;
        const TRAINER = 0x04;
        const FOUR_SCREEN = 0x08;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Flags7: u8 {
        const VS_UNISYSTEM = 0x01;
        const PLAYCHOICE10 = 0x02;
        const NES2 = 0x08;
    }
}

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let prg_units = metadata.int("ines_prg").unwrap_or(1).max(1) as u8;
    let chr_units = metadata.int("ines_chr").unwrap_or(0).max(0) as u8;
    let mapper = metadata.int("ines_mapper").unwrap_or(0);
    if !(0..=4095).contains(&mapper) {
        return Err(Kind::BadDirectiveArg("ines_mapper", mapper.to_string()));
    }
    let submapper = metadata.int("ines_submapper").unwrap_or(0) as u8 & 0x0F;

    let mut flags6 = Flags6::empty();
    if metadata.int("ines_mirroring") == Some(1) {
        flags6 |= Flags6::VERTICAL_MIRRORING;
    }
    if metadata.flag("ines_battery") {
        flags6 |= Flags6::BATTERY;
    }
    if metadata.flag("ines_four_screen") {
        flags6 |= Flags6::FOUR_SCREEN;
    }
    let mapper_low = (mapper as u8 & 0x0F) << 4;
    let flags6 = Flags6::from_bits_retain(flags6.bits() | mapper_low);

    let mapper_mid = (((mapper >> 4) & 0x0F) as u8) << 4;
    let flags7 = Flags7::from_bits_retain(Flags7::NES2.bits() | mapper_mid);
    let mapper_high = ((mapper >> 8) & 0x0F) as u8;

    let mut header = vec![0u8; 16];
    header[0..4].copy_from_slice(b"NES\x1A");
    header[4] = prg_units;
    header[5] = chr_units;
    header[6] = flags6.bits();
    header[7] = flags7.bits();
    header[8] = (submapper << 4) | mapper_high;
    header[9] = 0;
    header[10] = 0;

    let mut out = header;
    out.extend_from_slice(image.bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_starts_with_magic() {
        let mut meta = Metadata::default();
        meta.push("ines_prg", crate::analyze::MetaValue::Int(2));
        meta.push("ines_chr", crate::analyze::MetaValue::Int(1));
        let image = RawImage { base: 0, bytes: &[0xEA; 32 * 1024] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(&rom[0..4], b"NES\x1A");
        assert_eq!(rom[4], 2);
        assert_eq!(rom[5], 1);
    }

    #[test]
    fn mapper_nibbles_split_across_flags_6_and_7() {
        let mut meta = Metadata::default();
        meta.push("ines_mapper", crate::analyze::MetaValue::Int(4));
        let image = RawImage { base: 0, bytes: &[] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom[6] & 0xF0, 0x40);
        assert_eq!(rom[7] & 0x08, 0x08); // NES 2.0 marker always set
    }

    #[test]
    fn out_of_range_mapper_is_rejected() {
        let mut meta = Metadata::default();
        meta.push("ines_mapper", crate::analyze::MetaValue::Int(99999));
        let image = RawImage { base: 0, bytes: &[] };
        assert!(wrap(&image, &meta).is_err());
    }
}
