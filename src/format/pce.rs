// PC Engine / TurboGrafx-16 (HuCard).
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

//! A HuCard carries no header at all (§4.K): the hardware maps
//! `MPR7`'s bank directly to the reset vector. We pad the image up to
//! the next 128K unit most PCE flash carts and emulators expect, that's
//! the whole job.

use crate::analyze::Metadata;
use crate::format::RawImage;
use crate::message::Kind;

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let unit = 128 * 1024;
    let mut rom = image.bytes.to_vec();
    if metadata.flag("pce_no_pad") {
        return Ok(rom);
    }
    let padded = rom.len().div_ceil(unit).max(1) * unit;
    rom.resize(padded, 0);
    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_up_to_a_128k_unit() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xEAu8; 1000] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 128 * 1024);
    }

    #[test]
    fn no_pad_flag_leaves_image_untouched() {
        let mut meta = Metadata::default();
        meta.push("pce_no_pad", crate::analyze::MetaValue::Int(1));
        let image = RawImage { base: 0, bytes: &[1, 2, 3] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom, vec![1, 2, 3]);
    }
}
