// Debug-Symbol File Writers
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

//! `.nl`/`.mlb`/`.sym` emitters (§6), chosen by the output path's
//! extension. All three walk [`Symbols::sorted_labels`], which already
//! orders by `(address_space, address, name)` — the one iteration order
//! §9 allows for anything that affects emitted files.

use std::fmt::Write as _;
use std::path::Path;

use crate::symbol::{Symbols, SymbolValue};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolFileFormat {
    /// FCEUX `.nl`: one line per symbol, `$addr#name#comment`.
    Fceux,
    /// Mesen `.mlb`: `space:addr:name`.
    Mesen,
    /// Generic `.sym`: `bank:addr name`.
    Generic,
}

impl SymbolFileFormat {
    pub fn from_path(path: &Path) -> Option<SymbolFileFormat> {
        match path.extension()?.to_str()? {
            "nl" => Some(SymbolFileFormat::Fceux),
            "mlb" => Some(SymbolFileFormat::Mesen),
            "sym" => Some(SymbolFileFormat::Generic),
            _ => None,
        }
    }
}

/// Mesen's address-space names for the three spaces this assembler
/// distinguishes; anything else falls back to `PRG` since Mesen has no
/// slot for an arbitrary custom space.
fn mesen_space_name(space_index: u16) -> &'static str {
    match space_index {
        0 => "PRG",
        1 => "RAM",
        2 => "ZEROPAGE",
        _ => "PRG",
    }
}

pub fn render(symbols: &Symbols, format: SymbolFileFormat) -> String {
    let mut out = String::new();
    for symbol in symbols.sorted_labels() {
        let SymbolValue::Address(space, addr) = symbol.value else { continue };
        match format {
            SymbolFileFormat::Fceux => {
                let _ = writeln!(out, "${:04X}#{}#", addr, symbol.name);
            }
            SymbolFileFormat::Mesen => {
                let _ = writeln!(out, "{}:{:04X}:{}", mesen_space_name(space.0), addr, symbol.name);
            }
            SymbolFileFormat::Generic => {
                let _ = writeln!(out, "{:02X}:{:04X} {}", space.0, addr, symbol.name);
            }
        }
    }
    out
}

pub fn write(symbols: &Symbols, path: &Path) -> std::io::Result<()> {
    let format = SymbolFileFormat::from_path(path)
        .unwrap_or(SymbolFileFormat::Generic);
    std::fs::write(path, render(symbols, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::symbol::AddressSpace;

    fn sample_symbols() -> Symbols {
        let mut syms = Symbols::new();
        let root = syms.scopes.root();
        syms.define_global(root, "reset", SymbolValue::Address(AddressSpace(0), 0x8000), Location::builtin(), false).unwrap();
        syms.define_global(root, "nmi", SymbolValue::Address(AddressSpace(0), 0x8010), Location::builtin(), false).unwrap();
        syms
    }

    #[test]
    fn fceux_format_matches_hash_delimited_layout() {
        let rendered = render(&sample_symbols(), SymbolFileFormat::Fceux);
        assert_eq!(rendered, "$8000#reset#\n$8010#nmi#\n");
    }

    #[test]
    fn mlb_format_uses_space_colon_addr_colon_name() {
        let rendered = render(&sample_symbols(), SymbolFileFormat::Mesen);
        assert_eq!(rendered, "PRG:8000:reset\nPRG:8010:nmi\n");
    }

    #[test]
    fn generic_sym_format_uses_bank_colon_addr_space_name() {
        let rendered = render(&sample_symbols(), SymbolFileFormat::Generic);
        assert_eq!(rendered, "00:8000 reset\n00:8010 nmi\n");
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(SymbolFileFormat::from_path(Path::new("out.nl")), Some(SymbolFileFormat::Fceux));
        assert_eq!(SymbolFileFormat::from_path(Path::new("out.mlb")), Some(SymbolFileFormat::Mesen));
        assert_eq!(SymbolFileFormat::from_path(Path::new("out.sym")), Some(SymbolFileFormat::Generic));
        assert_eq!(SymbolFileFormat::from_path(Path::new("out.txt")), None);
    }
}
