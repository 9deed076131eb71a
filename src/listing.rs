// Human-Readable Listing Writer
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

//! The `-l`/`--listing` side file (§6): the resolved source file list
//! followed by the symbol table, in that order. Symbols are sorted
//! `(address_space, address, name)` like every other export §9 singles
//! out for deterministic iteration order.

use std::fmt::Write as _;
use std::path::Path;

use crate::source::{FileId, SourceRegistry};
use crate::symbol::{SymbolValue, Symbols};

pub fn render(sources: &SourceRegistry, files: &[FileId], symbols: &Symbols) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; source files");
    for &id in files {
        let _ = writeln!(out, ";   {}", sources.path(id).display());
    }
    let _ = writeln!(out, ";");
    let _ = writeln!(out, "; symbols");
    for symbol in symbols.sorted_labels() {
        let SymbolValue::Address(space, addr) = symbol.value else { continue };
        let _ = writeln!(out, "{:02X}:{:04X}  {}", space.0, addr, symbol.name);
    }
    out
}

pub fn write(sources: &SourceRegistry, files: &[FileId], symbols: &Symbols, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render(sources, files, symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::symbol::AddressSpace;

    #[test]
    fn lists_source_files_before_symbols() {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("main.pasm", "reset:\n  sei\n".to_string());
        let mut symbols = Symbols::new();
        let root = symbols.scopes.root();
        symbols.define_global(root, "reset", SymbolValue::Address(AddressSpace(0), 0x8000), Location::builtin(), false).unwrap();

        let files: Vec<_> = sources.file_ids().collect();
        let rendered = render(&sources, &files, &symbols);
        let files_line = rendered.find("; source files").unwrap();
        let symbols_line = rendered.find("; symbols").unwrap();
        assert!(files_line < symbols_line);
        assert!(rendered.contains("main.pasm"));
        assert!(rendered.contains("00:8000  reset"));
    }

    #[test]
    fn empty_symbol_table_still_lists_files() {
        let mut sources = SourceRegistry::new();
        sources.add_text("only.pasm", "nop\n".to_string());
        let symbols = Symbols::new();
        let files: Vec<_> = sources.file_ids().collect();
        let rendered = render(&sources, &files, &symbols);
        assert!(rendered.contains("only.pasm"));
    }
}
