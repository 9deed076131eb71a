// MOS 6502 Family Descriptor (6502 / 6507 / 65C02 / HuC6280)
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

//! The four NMOS-6502-derived targets share one opcode family: NMOS
//! 6502, its address-bus-truncated sibling 6507, the CMOS 65C02
//! (adds `bra`/`phx`/`phy`/`plx`/`ply`/`stz`/`trb`/`tsb`, the `(zp)`
//! addressing form on the original ALU ops, and `jmp (abs,x)`), and
//! HuC6280 (CMOS-compatible plus its own small set of block-transfer
//! and speed/MPR instructions). §4.I, §4.G (zero-page optimization).

use crate::ast::{Expr, IndexReg, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{
    require_fit, Descriptor, Encoded, Endianness, FlagState, Mos6502Variant, OperandFacts, Sizing,
};

/// The addressing-mode shape the analyzer/codegen resolved for one
/// instruction site, after the zero-page-vs-absolute decision.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `jmp (abs)` — always a full 16-bit address, never zero-page.
    Indirect,
    /// `(zp,x)`.
    IndirectX,
    /// `(zp),y`.
    IndirectY,
    /// 65C02 `(zp)`, no index.
    IndirectZp,
    /// 65C02 `jmp (abs,x)`.
    IndirectAbsX,
    /// Branch displacement, 8-bit signed.
    Relative,
}

impl Mode {
    pub(crate) fn operand_len(self) -> u32 {
        match self {
            Mode::Implied | Mode::Accumulator => 0,
            Mode::Immediate
            | Mode::ZeroPage
            | Mode::ZeroPageX
            | Mode::ZeroPageY
            | Mode::IndirectX
            | Mode::IndirectY
            | Mode::IndirectZp
            | Mode::Relative => 1,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect | Mode::IndirectAbsX => 2,
        }
    }

    /// True for the modes that come in a zero-page/absolute pair and
    /// are thus candidates for the DP optimization (§4.G).
    pub(crate) fn is_absolute_family(self) -> bool {
        matches!(self, Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY)
    }

    pub(crate) fn narrowed(self) -> Mode {
        match self {
            Mode::Absolute => Mode::ZeroPage,
            Mode::AbsoluteX => Mode::ZeroPageX,
            Mode::AbsoluteY => Mode::ZeroPageY,
            other => other,
        }
    }
}

const BRANCH_MNEMONICS: &[&str] = &["bcc", "bcs", "beq", "bmi", "bne", "bpl", "bvc", "bvs", "bra"];

struct Entry {
    mnemonic: &'static str,
    implied: Option<u8>,
    accumulator: Option<u8>,
    immediate: Option<u8>,
    zp: Option<u8>,
    zpx: Option<u8>,
    zpy: Option<u8>,
    abs: Option<u8>,
    absx: Option<u8>,
    absy: Option<u8>,
    ind: Option<u8>,
    indx: Option<u8>,
    indy: Option<u8>,
    indzp: Option<u8>,
    indabsx: Option<u8>,
    rel: Option<u8>,
    /// `true` if this row requires 65C02-or-later (65C02 or HuC6280).
    cmos_only: bool,
}

const E: Entry = Entry {
    mnemonic: "",
    implied: None,
    accumulator: None,
    immediate: None,
    zp: None,
    zpx: None,
    zpy: None,
    abs: None,
    absx: None,
    absy: None,
    ind: None,
    indx: None,
    indy: None,
    indzp: None,
    indabsx: None,
    rel: None,
    cmos_only: false,
};

/// One row per mnemonic; `None` in a field means that addressing mode
/// is not legal for the mnemonic. 65C02-only fields (the `(zp)` form on
/// the ALU ops, `jmp (abs,x)`, accumulator `inc`/`dec`, and `bit`'s
/// extra modes) are folded into the base rows and simply unavailable
/// on plain NMOS 6502/6507.
static TABLE: &[Entry] = &[
    Entry { mnemonic: "adc", immediate: Some(0x69), zp: Some(0x65), zpx: Some(0x75), abs: Some(0x6D), absx: Some(0x7D), absy: Some(0x79), indx: Some(0x61), indy: Some(0x71), indzp: Some(0x72), ..E },
    Entry { mnemonic: "and", immediate: Some(0x29), zp: Some(0x25), zpx: Some(0x35), abs: Some(0x2D), absx: Some(0x3D), absy: Some(0x39), indx: Some(0x21), indy: Some(0x31), indzp: Some(0x32), ..E },
    Entry { mnemonic: "asl", accumulator: Some(0x0A), zp: Some(0x06), zpx: Some(0x16), abs: Some(0x0E), absx: Some(0x1E), ..E },
    Entry { mnemonic: "bcc", rel: Some(0x90), ..E },
    Entry { mnemonic: "bcs", rel: Some(0xB0), ..E },
    Entry { mnemonic: "beq", rel: Some(0xF0), ..E },
    Entry { mnemonic: "bit", zp: Some(0x24), abs: Some(0x2C), immediate: Some(0x89), zpx: Some(0x34), absx: Some(0x3C), cmos_only: false, ..E },
    Entry { mnemonic: "bmi", rel: Some(0x30), ..E },
    Entry { mnemonic: "bne", rel: Some(0xD0), ..E },
    Entry { mnemonic: "bpl", rel: Some(0x10), ..E },
    Entry { mnemonic: "brk", implied: Some(0x00), ..E },
    Entry { mnemonic: "bvc", rel: Some(0x50), ..E },
    Entry { mnemonic: "bvs", rel: Some(0x70), ..E },
    Entry { mnemonic: "clc", implied: Some(0x18), ..E },
    Entry { mnemonic: "cld", implied: Some(0xD8), ..E },
    Entry { mnemonic: "cli", implied: Some(0x58), ..E },
    Entry { mnemonic: "clv", implied: Some(0xB8), ..E },
    Entry { mnemonic: "cmp", immediate: Some(0xC9), zp: Some(0xC5), zpx: Some(0xD5), abs: Some(0xCD), absx: Some(0xDD), absy: Some(0xD9), indx: Some(0xC1), indy: Some(0xD1), indzp: Some(0xD2), ..E },
    Entry { mnemonic: "cpx", immediate: Some(0xE0), zp: Some(0xE4), abs: Some(0xEC), ..E },
    Entry { mnemonic: "cpy", immediate: Some(0xC0), zp: Some(0xC4), abs: Some(0xCC), ..E },
    Entry { mnemonic: "dec", zp: Some(0xC6), zpx: Some(0xD6), abs: Some(0xCE), absx: Some(0xDE), accumulator: Some(0x3A), ..E },
    Entry { mnemonic: "dex", implied: Some(0xCA), ..E },
    Entry { mnemonic: "dey", implied: Some(0x88), ..E },
    Entry { mnemonic: "eor", immediate: Some(0x49), zp: Some(0x45), zpx: Some(0x55), abs: Some(0x4D), absx: Some(0x5D), absy: Some(0x59), indx: Some(0x41), indy: Some(0x51), indzp: Some(0x52), ..E },
    Entry { mnemonic: "inc", zp: Some(0xE6), zpx: Some(0xF6), abs: Some(0xEE), absx: Some(0xFE), accumulator: Some(0x1A), ..E },
    Entry { mnemonic: "inx", implied: Some(0xE8), ..E },
    Entry { mnemonic: "iny", implied: Some(0xC8), ..E },
    Entry { mnemonic: "jmp", abs: Some(0x4C), ind: Some(0x6C), indabsx: Some(0x7C), ..E },
    Entry { mnemonic: "jsr", abs: Some(0x20), ..E },
    Entry { mnemonic: "lda", immediate: Some(0xA9), zp: Some(0xA5), zpx: Some(0xB5), abs: Some(0xAD), absx: Some(0xBD), absy: Some(0xB9), indx: Some(0xA1), indy: Some(0xB1), indzp: Some(0xB2), ..E },
    Entry { mnemonic: "ldx", immediate: Some(0xA2), zp: Some(0xA6), zpy: Some(0xB6), abs: Some(0xAE), absy: Some(0xBE), ..E },
    Entry { mnemonic: "ldy", immediate: Some(0xA0), zp: Some(0xA4), zpx: Some(0xB4), abs: Some(0xAC), absx: Some(0xBC), ..E },
    Entry { mnemonic: "lsr", accumulator: Some(0x4A), zp: Some(0x46), zpx: Some(0x56), abs: Some(0x4E), absx: Some(0x5E), ..E },
    Entry { mnemonic: "nop", implied: Some(0xEA), ..E },
    Entry { mnemonic: "ora", immediate: Some(0x09), zp: Some(0x05), zpx: Some(0x15), abs: Some(0x0D), absx: Some(0x1D), absy: Some(0x19), indx: Some(0x01), indy: Some(0x11), indzp: Some(0x12), ..E },
    Entry { mnemonic: "pha", implied: Some(0x48), ..E },
    Entry { mnemonic: "php", implied: Some(0x08), ..E },
    Entry { mnemonic: "pla", implied: Some(0x68), ..E },
    Entry { mnemonic: "plp", implied: Some(0x28), ..E },
    Entry { mnemonic: "rol", accumulator: Some(0x2A), zp: Some(0x26), zpx: Some(0x36), abs: Some(0x2E), absx: Some(0x3E), ..E },
    Entry { mnemonic: "ror", accumulator: Some(0x6A), zp: Some(0x66), zpx: Some(0x76), abs: Some(0x6E), absx: Some(0x7E), ..E },
    Entry { mnemonic: "rti", implied: Some(0x40), ..E },
    Entry { mnemonic: "rts", implied: Some(0x60), ..E },
    Entry { mnemonic: "sbc", immediate: Some(0xE9), zp: Some(0xE5), zpx: Some(0xF5), abs: Some(0xED), absx: Some(0xFD), absy: Some(0xF9), indx: Some(0xE1), indy: Some(0xF1), indzp: Some(0xF2), ..E },
    Entry { mnemonic: "sec", implied: Some(0x38), ..E },
    Entry { mnemonic: "sed", implied: Some(0xF8), ..E },
    Entry { mnemonic: "sei", implied: Some(0x78), ..E },
    Entry { mnemonic: "sta", zp: Some(0x85), zpx: Some(0x95), abs: Some(0x8D), absx: Some(0x9D), absy: Some(0x99), indx: Some(0x81), indy: Some(0x91), indzp: Some(0x92), ..E },
    Entry { mnemonic: "stx", zp: Some(0x86), zpy: Some(0x96), abs: Some(0x8E), ..E },
    Entry { mnemonic: "sty", zp: Some(0x84), zpx: Some(0x94), abs: Some(0x8C), ..E },
    Entry { mnemonic: "tax", implied: Some(0xAA), ..E },
    Entry { mnemonic: "tay", implied: Some(0xA8), ..E },
    Entry { mnemonic: "tsx", implied: Some(0xBA), ..E },
    Entry { mnemonic: "txa", implied: Some(0x8A), ..E },
    Entry { mnemonic: "txs", implied: Some(0x9A), ..E },
    Entry { mnemonic: "tya", implied: Some(0x98), ..E },
    // 65C02-only mnemonics.
    Entry { mnemonic: "bra", rel: Some(0x80), cmos_only: true, ..E },
    Entry { mnemonic: "phx", implied: Some(0xDA), cmos_only: true, ..E },
    Entry { mnemonic: "phy", implied: Some(0x5A), cmos_only: true, ..E },
    Entry { mnemonic: "plx", implied: Some(0xFA), cmos_only: true, ..E },
    Entry { mnemonic: "ply", implied: Some(0x7A), cmos_only: true, ..E },
    Entry { mnemonic: "stz", zp: Some(0x64), zpx: Some(0x74), abs: Some(0x9C), absx: Some(0x9E), cmos_only: true, ..E },
    Entry { mnemonic: "trb", zp: Some(0x14), abs: Some(0x1C), cmos_only: true, ..E },
    Entry { mnemonic: "tsb", zp: Some(0x04), abs: Some(0x0C), cmos_only: true, ..E },
    // HuC6280-only, implied/immediate forms (block-transfer ternary-operand
    // forms are out of scope — the parser's AST carries at most two
    // operands per instruction, see DESIGN.md).
    Entry { mnemonic: "sxy", implied: Some(0x02), cmos_only: true, ..E },
    Entry { mnemonic: "say", implied: Some(0x42), cmos_only: true, ..E },
    Entry { mnemonic: "cla", implied: Some(0x62), cmos_only: true, ..E },
    Entry { mnemonic: "clx", implied: Some(0x82), cmos_only: true, ..E },
    Entry { mnemonic: "cly", implied: Some(0xC2), cmos_only: true, ..E },
    Entry { mnemonic: "csl", implied: Some(0x54), cmos_only: true, ..E },
    Entry { mnemonic: "csh", implied: Some(0xD4), cmos_only: true, ..E },
    Entry { mnemonic: "set", implied: Some(0xF4), cmos_only: true, ..E },
    Entry { mnemonic: "st0", immediate: Some(0x03), cmos_only: true, ..E },
    Entry { mnemonic: "st1", immediate: Some(0x13), cmos_only: true, ..E },
    Entry { mnemonic: "st2", immediate: Some(0x23), cmos_only: true, ..E },
    Entry { mnemonic: "tam", immediate: Some(0x53), cmos_only: true, ..E },
    Entry { mnemonic: "tma", immediate: Some(0x43), cmos_only: true, ..E },
];

fn find(mnemonic: &str) -> Option<&'static Entry> {
    TABLE.iter().find(|e| e.mnemonic == mnemonic)
}

fn opcode_for(entry: &Entry, mode: Mode) -> Option<u8> {
    match mode {
        Mode::Implied => entry.implied,
        Mode::Accumulator => entry.accumulator,
        Mode::Immediate => entry.immediate,
        Mode::ZeroPage => entry.zp,
        Mode::ZeroPageX => entry.zpx,
        Mode::ZeroPageY => entry.zpy,
        Mode::Absolute => entry.abs,
        Mode::AbsoluteX => entry.absx,
        Mode::AbsoluteY => entry.absy,
        Mode::Indirect => entry.ind,
        Mode::IndirectX => entry.indx,
        Mode::IndirectY => entry.indy,
        Mode::IndirectZp => entry.indzp,
        Mode::IndirectAbsX => entry.indabsx,
        Mode::Relative => entry.rel,
    }
}

/// Classifies the parser's syntactic [`SyntaxMode`] into a 6502
/// [`Mode`], given the mnemonic (branches read as `Absolute(e)`
/// syntactically but mean `Relative`) and whether pass 1 committed to
/// the narrow (zero-page) form.
pub fn classify(mnemonic: &str, mode: &SyntaxMode, direct_page: bool) -> Option<Mode> {
    if BRANCH_MNEMONICS.contains(&mnemonic) {
        return match mode {
            SyntaxMode::Absolute(_) => Some(Mode::Relative),
            _ => None,
        };
    }
    let raw = match mode {
        SyntaxMode::Implied => Mode::Implied,
        SyntaxMode::Accumulator => Mode::Accumulator,
        SyntaxMode::Immediate(_) => Mode::Immediate,
        SyntaxMode::Indexed(_, IndexReg::X) => Mode::AbsoluteX,
        SyntaxMode::Indexed(_, IndexReg::Y) => Mode::AbsoluteY,
        SyntaxMode::Indexed(_, IndexReg::S) => return None,
        SyntaxMode::IndexedIndirect(_) => {
            if mnemonic == "jmp" {
                Mode::IndirectAbsX
            } else {
                Mode::IndirectX
            }
        }
        SyntaxMode::IndirectIndexed(_) => Mode::IndirectY,
        // A bare `(e)` is always a one-byte zero-page pointer except
        // for `jmp`, whose indirect form takes a full 16-bit address —
        // 6502 has no "absolute indirect" addressing mode otherwise.
        SyntaxMode::Indirect(_) => {
            if mnemonic == "jmp" {
                Mode::Indirect
            } else {
                Mode::IndirectZp
            }
        }
        SyntaxMode::Absolute(_) => {
            if direct_page {
                Mode::ZeroPage
            } else {
                Mode::Absolute
            }
        }
        _ => return None,
    };
    Some(raw)
}

fn variant_allows(entry: &Entry, variant: Mos6502Variant) -> bool {
    !entry.cmos_only || matches!(variant, Mos6502Variant::Cmos65c02 | Mos6502Variant::HuC6280)
}

/// Looks up a CMOS-compatible base opcode by mnemonic/mode, for reuse by
/// the 65816 descriptor (native mode inherits the 65C02 opcode map for
/// every mnemonic it doesn't redefine itself).
pub(crate) fn lookup_shared(mnemonic: &str, mode: Mode) -> Option<u8> {
    find(mnemonic).filter(|e| variant_allows(e, Mos6502Variant::Cmos65c02)).and_then(|e| opcode_for(e, mode))
}

fn fits_i8(v: i64) -> bool {
    (-128..=255).contains(&v)
}

/// Shared by every variant's `size` fn; `variant` only gates which
/// mnemonics/modes are legal.
fn size_for(instr: &Instruction, facts: OperandFacts, variant: Mos6502Variant) -> Result<Sizing, Kind> {
    let mnemonic = instr.mnemonic.to_ascii_lowercase();
    let entry = find(&mnemonic).filter(|e| variant_allows(e, variant)).ok_or_else(|| Kind::NoEncoding(mnemonic.clone()))?;

    // Try the absolute/wide form first to decide whether zero-page
    // narrowing is even on the table, then narrow if the operand is
    // already known to fit (§4.G).
    let wide = classify(&mnemonic, &instr.mode, false).ok_or_else(|| Kind::UnsupportedMode(mnemonic.clone()))?;
    let can_narrow = wide.is_absolute_family() && opcode_for(entry, wide.narrowed()).is_some();
    let direct_page = can_narrow
        && matches!(facts.constant_value, Some(v) if v >= 0 && v <= 0xFF);

    let mode = classify(&mnemonic, &instr.mode, direct_page).ok_or_else(|| Kind::UnsupportedMode(mnemonic.clone()))?;
    opcode_for(entry, mode).ok_or_else(|| Kind::NoEncoding(format!("{mnemonic} ({mode:?})")))?;

    let len = 1 + mode.operand_len();
    Ok(Sizing { len, direct_page, width: mode.operand_len() as u8 })
}

fn encode_for(
    instr: &Instruction,
    sizing: Sizing,
    value: Option<i64>,
    next_pc: i64,
    variant: Mos6502Variant,
) -> Result<Encoded, Kind> {
    let mnemonic = instr.mnemonic.to_ascii_lowercase();
    let entry = find(&mnemonic).filter(|e| variant_allows(e, variant)).ok_or_else(|| Kind::NoEncoding(mnemonic.clone()))?;
    let mode = classify(&mnemonic, &instr.mode, sizing.direct_page).ok_or_else(|| Kind::UnsupportedMode(mnemonic.clone()))?;
    let opcode = opcode_for(entry, mode).ok_or_else(|| Kind::NoEncoding(format!("{mnemonic} ({mode:?})")))?;

    let mut bytes = vec![opcode];
    match mode {
        Mode::Implied | Mode::Accumulator => {}
        Mode::Relative => {
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
        m if m.operand_len() == 1 => {
            let v = value.ok_or(Kind::MissingOperand)?;
            if !fits_i8(v) {
                return Err(Kind::OperandTooWide(v));
            }
            bytes.push(v as u8);
        }
        _ => {
            let v = value.ok_or(Kind::MissingOperand)?;
            bytes.extend_from_slice(&(v as u16).to_le_bytes());
        }
    }
    Ok(Encoded::new(bytes))
}

pub fn descriptor(variant: Mos6502Variant) -> Descriptor {
    // `size`/`encode` are plain `fn` items (no closures) so they fit
    // the descriptor's function-pointer fields; the variant is baked
    // in by dispatching through a tiny per-variant shim since `fn`
    // pointers cannot close over `variant` directly.
    let (size_fn, encode_fn): (crate::target::SizeFn, crate::target::EncodeFn) = match variant {
        Mos6502Variant::Nmos6502 => (size_nmos6502, encode_nmos6502),
        Mos6502Variant::Nmos6507 => (size_nmos6507, encode_nmos6507),
        Mos6502Variant::Cmos65c02 => (size_cmos65c02, encode_cmos65c02),
        Mos6502Variant::HuC6280 => (size_huc6280, encode_huc6280),
    };
    Descriptor {
        arch: crate::target::Arch::Mos6502(variant),
        endianness: Endianness::Little,
        size: size_fn,
        encode: encode_fn,
    }
}

fn size_nmos6502(i: &Instruction, _f: &FlagState, o: OperandFacts, _o2: OperandFacts) -> Result<Sizing, Kind> {
    size_for(i, o, Mos6502Variant::Nmos6502)
}
fn size_nmos6507(i: &Instruction, _f: &FlagState, o: OperandFacts, _o2: OperandFacts) -> Result<Sizing, Kind> {
    size_for(i, o, Mos6502Variant::Nmos6507)
}
fn size_cmos65c02(i: &Instruction, _f: &FlagState, o: OperandFacts, _o2: OperandFacts) -> Result<Sizing, Kind> {
    size_for(i, o, Mos6502Variant::Cmos65c02)
}
fn size_huc6280(i: &Instruction, _f: &FlagState, o: OperandFacts, _o2: OperandFacts) -> Result<Sizing, Kind> {
    size_for(i, o, Mos6502Variant::HuC6280)
}

fn encode_nmos6502(i: &Instruction, _f: &FlagState, s: Sizing, v: Option<i64>, _v2: Option<i64>, pc: i64) -> Result<Encoded, Kind> {
    encode_for(i, s, v, pc, Mos6502Variant::Nmos6502)
}
fn encode_nmos6507(i: &Instruction, _f: &FlagState, s: Sizing, v: Option<i64>, _v2: Option<i64>, pc: i64) -> Result<Encoded, Kind> {
    encode_for(i, s, v, pc, Mos6502Variant::Nmos6507)
}
fn encode_cmos65c02(i: &Instruction, _f: &FlagState, s: Sizing, v: Option<i64>, _v2: Option<i64>, pc: i64) -> Result<Encoded, Kind> {
    encode_for(i, s, v, pc, Mos6502Variant::Cmos65c02)
}
fn encode_huc6280(i: &Instruction, _f: &FlagState, s: Sizing, v: Option<i64>, _v2: Option<i64>, pc: i64) -> Result<Encoded, Kind> {
    encode_for(i, s, v, pc, Mos6502Variant::HuC6280)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::target::{FlagState, NO_OPERAND};

    fn instr(mnemonic: &str, mode: SyntaxMode) -> Instruction {
        Instruction { mnemonic: mnemonic.into(), size_suffix: None, mode, mode2: None, loc: Location::builtin() }
    }

    #[test]
    fn immediate_load_is_two_bytes() {
        let i = instr("lda", SyntaxMode::Immediate(Expr::Integer(0x42)));
        let facts = OperandFacts { constant_value: Some(0x42) };
        let sizing = size_nmos6502(&i, &FlagState::default(), facts, NO_OPERAND).unwrap();
        assert_eq!(sizing.len, 2);
        let enc = encode_nmos6502(&i, &FlagState::default(), sizing, Some(0x42), None, 0x8002).unwrap();
        assert_eq!(enc.bytes, vec![0xA9, 0x42]);
    }

    #[test]
    fn zero_page_operand_narrows() {
        let i = instr("sta", SyntaxMode::Absolute(Expr::Integer(0x10)));
        let facts = OperandFacts { constant_value: Some(0x10) };
        let sizing = size_nmos6502(&i, &FlagState::default(), facts, NO_OPERAND).unwrap();
        assert!(sizing.direct_page);
        assert_eq!(sizing.len, 2);
        let enc = encode_nmos6502(&i, &FlagState::default(), sizing, Some(0x10), None, 0x8002).unwrap();
        assert_eq!(enc.bytes, vec![0x85, 0x10]);
    }

    #[test]
    fn unresolved_operand_stays_absolute() {
        let i = instr("sta", SyntaxMode::Absolute(Expr::Symbol("later".into())));
        let sizing = size_nmos6502(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert!(!sizing.direct_page);
        assert_eq!(sizing.len, 3);
    }

    #[test]
    fn branch_forward_two_bytes() {
        let i = instr("beq", SyntaxMode::Absolute(Expr::Symbol("target".into())));
        let sizing = size_nmos6502(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(sizing.len, 2);
        let enc = encode_nmos6502(&i, &FlagState::default(), sizing, Some(0x8006), None, 0x8004).unwrap();
        assert_eq!(enc.bytes, vec![0xF0, 0x02]);
    }

    #[test]
    fn branch_out_of_range_is_an_error() {
        let i = instr("beq", SyntaxMode::Absolute(Expr::Symbol("target".into())));
        let sizing = size_nmos6502(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let err = encode_nmos6502(&i, &FlagState::default(), sizing, Some(0x9000), None, 0x8002);
        assert!(matches!(err, Err(Kind::BranchOutOfRange(_, 8))));
    }

    #[test]
    fn c02_only_mnemonic_rejected_on_nmos() {
        let i = instr("bra", SyntaxMode::Absolute(Expr::Symbol("x".into())));
        assert!(size_nmos6502(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).is_err());
        assert!(size_cmos65c02(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).is_ok());
    }

    #[test]
    fn implied_instruction_is_one_byte() {
        let i = instr("rts", SyntaxMode::Implied);
        let sizing = size_nmos6502(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(sizing.len, 1);
        let enc = encode_nmos6502(&i, &FlagState::default(), sizing, None, None, 0x8001).unwrap();
        assert_eq!(enc.bytes, vec![0x60]);
    }
}
