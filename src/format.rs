// Output Formatter
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

//! Wraps the raw code image in the selected platform's cartridge
//! header (§4.K), reading the metadata a compilation's platform-header
//! directives accumulated in [`crate::analyze::Metadata`].

use crate::analyze::Metadata;
use crate::message::Kind;

pub mod a26;
pub mod gb;
pub mod gba;
pub mod ines;
pub mod lnx;
pub mod megadrive;
pub mod pce;
pub mod sms;
pub mod snes;
pub mod spc;
pub mod ws;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Platform {
    Nes,
    Snes,
    Gb,
    Genesis,
    Gba,
    Sms,
    Pce,
    A26,
    Lnx,
    Ws,
    Spc,
}

impl Platform {
    pub fn by_name(name: &str) -> Option<Platform> {
        Some(match name.to_ascii_lowercase().as_str() {
            "nes" => Platform::Nes,
            "snes" => Platform::Snes,
            "gb" => Platform::Gb,
            "genesis" | "md" | "megadrive" => Platform::Genesis,
            "gba" => Platform::Gba,
            "sms" => Platform::Sms,
            "pce" => Platform::Pce,
            "a26" => Platform::A26,
            "lnx" => Platform::Lnx,
            "ws" => Platform::Ws,
            "spc" => Platform::Spc,
            _ => return None,
        })
    }

    /// The extension `manifest::output_path` falls back to when `output`
    /// is unset.
    pub fn default_extension(self) -> &'static str {
        match self {
            Platform::Nes => "nes",
            Platform::Snes => "sfc",
            Platform::Gb => "gb",
            Platform::Genesis => "bin",
            Platform::Gba => "gba",
            Platform::Sms => "sms",
            Platform::Pce => "pce",
            Platform::A26 => "a26",
            Platform::Lnx => "lnx",
            Platform::Ws => "ws",
            Platform::Spc => "spc",
        }
    }
}

/// One address space's assembled bytes, already anchored at the
/// lowest written address — what [`crate::codegen::Image`] carries,
/// restated here so `format` does not depend on `codegen` directly.
pub struct RawImage<'a> {
    pub base: i64,
    pub bytes: &'a [u8],
}

pub fn wrap(platform: Platform, image: &RawImage, metadata: &Metadata) -> Result<Vec<u8>, Kind> {
    match platform {
        Platform::Nes => ines::wrap(image, metadata),
        Platform::Snes => snes::wrap(image, metadata),
        Platform::Gb => gb::wrap(image, metadata),
        Platform::Genesis => megadrive::wrap(image, metadata),
        Platform::Gba => gba::wrap(image, metadata),
        Platform::Sms => sms::wrap(image, metadata),
        Platform::Pce => pce::wrap(image, metadata),
        Platform::A26 => a26::wrap(image, metadata),
        Platform::Lnx => lnx::wrap(image, metadata),
        Platform::Ws => ws::wrap(image, metadata),
        Platform::Spc => spc::wrap(image, metadata),
    }
}

/// ASCII string padded (or truncated) to `len` bytes with `pad`.
pub(crate) fn pad_ascii(s: &str, len: usize, pad: u8) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.truncate(len);
    bytes.resize(len, pad);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_resolves_case_insensitively() {
        assert_eq!(Platform::by_name("NES"), Some(Platform::Nes));
        assert_eq!(Platform::by_name("md"), Some(Platform::Genesis));
        assert_eq!(Platform::by_name("huh"), None);
    }

    #[test]
    fn ascii_padding_truncates_and_pads() {
        assert_eq!(pad_ascii("hi", 5, b' '), b"hi   ".to_vec());
        assert_eq!(pad_ascii("toolong", 3, b' '), b"too".to_vec());
    }
}
