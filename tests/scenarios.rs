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

//! The six end-to-end worked examples, byte for byte.

use poppy::compiler::{compile, CompileOptions};
use poppy::source::SourceRegistry;
use poppy::symbol::AddressSpace;

fn assemble(text: &str) -> poppy::compiler::CompileResult {
    let mut sources = SourceRegistry::new();
    let file = sources.add_text("scenario.pasm", text.to_string());
    compile(sources, file, &CompileOptions::default())
}

fn raw_bytes(result: &poppy::compiler::CompileResult) -> &[u8] {
    result.images.get(&AddressSpace::default()).expect("one image").as_slice()
}

#[test]
fn scenario_1_6502_immediate_load() {
    let result = assemble(".arch 6502\n.org $8000\n  lda #$42\n  rts\n");
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    assert_eq!(raw_bytes(&result), &[0xa9, 0x42, 0x60]);
}

#[test]
fn scenario_2_6502_relative_branch_forward() {
    let result = assemble(
        ".arch 6502\n.org $8000\n  lda #0\n  beq +\n  lda #1\n+:\n  sta $00\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    assert_eq!(raw_bytes(&result), &[0xa9, 0x00, 0xf0, 0x02, 0xa9, 0x01, 0x85, 0x00]);
}

#[test]
fn scenario_3_6502_zero_page_optimization() {
    let result = assemble(".arch 6502\n.org $8000\n  sta $10\n  sta $0010\n  sta $0100\n");
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    assert_eq!(raw_bytes(&result), &[0x85, 0x10, 0x85, 0x10, 0x8d, 0x00, 0x01]);
}

#[test]
fn scenario_4_65816_m_x_flag_sizing() {
    let result = assemble(
        ".snes\n.org $8000\n.a8\n.i8\n  lda #$ff\n  ldx #$aa\n.a16\n  lda #$1234\n.i16\n  ldx #$5678\n  rep #$30\n  sep #$20\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    let code = &raw_bytes(&result)[..14.min(raw_bytes(&result).len())];
    assert_eq!(
        code,
        &[0xa9, 0xff, 0xa2, 0xaa, 0xa9, 0x34, 0x12, 0xa2, 0x78, 0x56, 0xc2, 0x30, 0xe2, 0x20][..]
    );
}

#[test]
fn scenario_5_macro_with_local_labels_and_parameters() {
    let result = assemble(
        ".arch 6502\n.macro delay n\n  ldx #n\n@l:\n  dex\n  bne @l\n.endmacro\n.org $8000\n  @delay 3\n  @delay 5\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    let bytes = raw_bytes(&result);
    assert_eq!(bytes.len(), 10);
    assert_eq!(&bytes[0..2], &[0xa2, 0x03]);
    assert_eq!(bytes[2], 0xca);
    assert_eq!(bytes[3], 0xd0);
    assert_eq!(&bytes[5..7], &[0xa2, 0x05]);
    assert_eq!(bytes[7], 0xca);
    assert_eq!(bytes[8], 0xd0);
}

#[test]
fn scenario_6_ines_header_generation() {
    let result = assemble(
        ".nes\n.ines_prg 2\n.ines_chr 1\n.ines_mapper 0\n.ines_mirroring 1\n.org $8000\nreset:\n  sei\n.org $fffa\n  .word reset\n  .word reset\n  .word reset\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    let bytes = raw_bytes(&result);
    assert_eq!(&bytes[0..8], &[0x4e, 0x45, 0x53, 0x1a, 0x02, 0x01, 0x01, 0x08]);
}
