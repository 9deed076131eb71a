// Atari 2600 (VCS).
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

//! There is no header (§4.K): the 6507 reset vector at the top of the
//! bank does all the work. We only pad to one of the bank sizes the
//! stock Atari hardware (and common bankswitch schemes) actually map:
//! 2K, 4K, 8K, 12K, 16K or 32K, rounding up and filling with `$FF` so an
//! accidentally-short program still lands a defined reset vector if the
//! source placed one.

use crate::analyze::Metadata;
use crate::format::RawImage;
use crate::message::Kind;

const BANK_SIZES: [usize; 6] = [2 * 1024, 4 * 1024, 8 * 1024, 12 * 1024, 16 * 1024, 32 * 1024];

pub fn wrap(image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    let requested = metadata.int("a26_bank_size").map(|n| n as usize);
    let size = match requested {
        Some(n) if BANK_SIZES.contains(&n) => n,
        Some(n) => return Err(Kind::BadDirectiveArg("a26_bank_size", n.to_string())),
        None => *BANK_SIZES
            .iter()
            .find(|&&s| s >= image.bytes.len())
            .unwrap_or(&BANK_SIZES[BANK_SIZES.len() - 1]),
    };
    if image.bytes.len() > size {
        return Err(Kind::BadDirectiveArg("a26_bank_size", "program exceeds bank size".into()));
    }

    let mut rom = image.bytes.to_vec();
    rom.resize(size, 0xFF);
    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_up_to_the_next_standard_bank_size() {
        let meta = Metadata::default();
        let image = RawImage { base: 0, bytes: &[0xEAu8; 100] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 2 * 1024);
        assert_eq!(rom[2047], 0xFF);
    }

    #[test]
    fn explicit_bank_size_is_honored() {
        let mut meta = Metadata::default();
        meta.push("a26_bank_size", crate::analyze::MetaValue::Int(4 * 1024));
        let image = RawImage { base: 0, bytes: &[0u8; 10] };
        let rom = wrap(&image, &meta).unwrap();
        assert_eq!(rom.len(), 4 * 1024);
    }

    #[test]
    fn program_larger_than_bank_is_rejected() {
        let mut meta = Metadata::default();
        meta.push("a26_bank_size", crate::analyze::MetaValue::Int(2 * 1024));
        let image = RawImage { base: 0, bytes: &[0u8; 3000] };
        assert!(wrap(&image, &meta).is_err());
    }
}
