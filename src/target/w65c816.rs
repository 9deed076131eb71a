// WDC 65C816 Descriptor
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

//! Native-mode 65C816. Every mnemonic it inherits from the 65C02 keeps
//! that opcode (`mos6502::lookup_shared`, §4.I); this module only adds
//! what 65816 changes: the M/X-dependent immediate width on the
//! accumulator/index instruction classes, the new addressing modes
//! (stack-relative, direct-page indirect long, absolute long), and the
//! bank/stack/flag-width mnemonics the 6502 family never had.

use crate::ast::{Expr, IndexReg, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::mos6502::{self, Mode as BaseMode};
use crate::target::{
    require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing, Tracked,
};

/// Accumulator-width-sensitive immediate operand (`lda #n`, `adc #n`, ...).
const ACC_IMMEDIATE: &[&str] = &["lda", "adc", "and", "cmp", "eor", "ora", "sbc", "bit"];
/// Index-register-width-sensitive immediate operand (`ldx #n`, `cpy #n`, ...).
const IDX_IMMEDIATE: &[&str] = &["ldx", "ldy", "cpx", "cpy"];

/// `addr,s` stack-relative: (mnemonic, opcode, `(sr,s),y` opcode).
const STACK_RELATIVE: &[(&str, u8, u8)] = &[
    ("ora", 0x03, 0x13),
    ("and", 0x23, 0x33),
    ("eor", 0x43, 0x53),
    ("adc", 0x63, 0x73),
    ("sta", 0x83, 0x93),
    ("lda", 0xA3, 0xB3),
    ("cmp", 0xC3, 0xD3),
    ("sbc", 0xE3, 0xF3),
];

/// `[dp]` / `[dp],y` direct-page indirect long: (mnemonic, opcode, y-indexed opcode).
const DP_INDIRECT_LONG: &[(&str, u8, u8)] = &[
    ("ora", 0x07, 0x17),
    ("and", 0x27, 0x37),
    ("eor", 0x47, 0x57),
    ("adc", 0x67, 0x77),
    ("sta", 0x87, 0x97),
    ("lda", 0xA7, 0xB7),
    ("cmp", 0xC7, 0xD7),
    ("sbc", 0xE7, 0xF7),
];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Shape {
    /// Delegate entirely to the shared 65C02 base opcode map.
    Base,
    /// `#n`, width decided by the M or X flag at analysis time.
    ImmAcc,
    ImmIdx,
    /// `#n`, always one byte: `cop`, `wdm`, `rep`, `sep`.
    ImmByte,
    /// `addr,s`.
    StackRel,
    /// `(addr,s),y` — unsupported, see DESIGN.md.
    StackRelIndirectY,
    /// `[dp]`.
    DpIndirectLong,
    /// `[dp],y`.
    DpIndirectLongY,
    /// `pea addr` — always a 16-bit absolute pushed verbatim.
    Abs16,
    /// `pei (dp)` — one dp-address byte.
    DpOperand,
    /// `per label` / `brl label` — 16-bit signed PC-relative.
    RelativeLong,
    /// `jml`/`jsl addr` — 24-bit absolute.
    AbsoluteLong,
    /// `jmp [addr]` — 16-bit absolute pointing at a long address.
    AbsoluteIndirectLong,
    /// `mvn`/`mvp src,dest` — two bank bytes.
    BlockMove,
    Implied,
}

fn implied_opcode(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "rtl" => 0x6B,
        "phb" => 0x8B,
        "phd" => 0x0B,
        "phk" => 0x4B,
        "plb" => 0xAB,
        "pld" => 0x2B,
        "tcd" => 0x5B,
        "tcs" => 0x1B,
        "tdc" => 0x7B,
        "tsc" => 0x3B,
        "txy" => 0x9B,
        "tyx" => 0xBB,
        "wai" => 0xCB,
        "xba" => 0xEB,
        "xce" => 0xFB,
        _ => return None,
    })
}

fn imm_byte_opcode(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "cop" => 0x02,
        "wdm" => 0x42,
        "rep" => 0xC2,
        "sep" => 0xE2,
        _ => return None,
    })
}

/// Classifies one instruction site into the shape that decides its
/// length and encoding, without yet resolving the M/X-dependent width.
fn shape_of(mnemonic: &str, mode: &SyntaxMode) -> Option<Shape> {
    if implied_opcode(mnemonic).is_some() {
        return Some(Shape::Implied);
    }
    if imm_byte_opcode(mnemonic).is_some() {
        return Some(Shape::ImmByte);
    }
    match mnemonic {
        "pea" => return Some(Shape::Abs16),
        "pei" => return Some(Shape::DpOperand),
        "per" | "brl" => return Some(Shape::RelativeLong),
        "jml" => {
            return Some(match mode {
                SyntaxMode::IndirectLong(_) => Shape::AbsoluteIndirectLong,
                _ => Shape::AbsoluteLong,
            })
        }
        "jsl" => return Some(Shape::AbsoluteLong),
        "mvn" | "mvp" => return Some(Shape::BlockMove),
        _ => {}
    }
    match mode {
        SyntaxMode::Immediate(_) if ACC_IMMEDIATE.contains(&mnemonic) => Some(Shape::ImmAcc),
        SyntaxMode::Immediate(_) if IDX_IMMEDIATE.contains(&mnemonic) => Some(Shape::ImmIdx),
        SyntaxMode::Indexed(_, IndexReg::S) if STACK_RELATIVE.iter().any(|(m, ..)| *m == mnemonic) => {
            Some(Shape::StackRel)
        }
        SyntaxMode::RegisterIndirect(r, _) if r.eq_ignore_ascii_case("s") => Some(Shape::StackRelIndirectY),
        SyntaxMode::IndirectLong(_) if DP_INDIRECT_LONG.iter().any(|(m, ..)| *m == mnemonic) => {
            Some(Shape::DpIndirectLong)
        }
        SyntaxMode::IndirectLongIndexed(_) if DP_INDIRECT_LONG.iter().any(|(m, ..)| *m == mnemonic) => {
            Some(Shape::DpIndirectLongY)
        }
        _ => None,
    }
}

fn imm_width(flags: &FlagState, shape: Shape) -> Result<u8, Kind> {
    let tracked = match shape {
        Shape::ImmAcc => flags.m,
        Shape::ImmIdx => flags.x,
        _ => unreachable!(),
    };
    match tracked {
        Tracked::Known(w) => Ok(w),
        Tracked::Unknown => Err(Kind::AmbiguousOperandWidth),
    }
}

/// Delegates to the shared 65C02 opcode map, applying the same
/// direct-page narrowing rule the 6502 family uses (§4.G).
fn base_size(mnemonic: &str, mode: &SyntaxMode, facts: OperandFacts) -> Result<Sizing, Kind> {
    let wide = mos6502::classify(mnemonic, mode, false).ok_or_else(|| Kind::UnsupportedMode(mnemonic.into()))?;
    let can_narrow = wide.is_absolute_family() && mos6502::lookup_shared(mnemonic, wide.narrowed()).is_some();
    let direct_page = can_narrow && matches!(facts.constant_value, Some(v) if (0..=0xFF).contains(&v));
    let narrow = mos6502::classify(mnemonic, mode, direct_page).ok_or_else(|| Kind::UnsupportedMode(mnemonic.into()))?;
    mos6502::lookup_shared(mnemonic, narrow).ok_or_else(|| Kind::NoEncoding(format!("{mnemonic} ({narrow:?})")))?;
    let len = 1 + narrow.operand_len();
    Ok(Sizing { len, direct_page, width: narrow.operand_len() as u8 })
}

fn size(instr: &Instruction, flags: &FlagState, facts: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    let mnemonic = instr.mnemonic.to_ascii_lowercase();
    let shape = shape_of(&mnemonic, &instr.mode)
        .or_else(|| if mos6502::classify(&mnemonic, &instr.mode, false).is_some() { Some(Shape::Base) } else { None })
        .ok_or_else(|| Kind::UnsupportedMode(mnemonic.clone()))?;

    match shape {
        Shape::Base => base_size(&mnemonic, &instr.mode, facts),
        Shape::Implied => Ok(Sizing { len: 1, direct_page: false, width: 0 }),
        Shape::ImmByte => Ok(Sizing { len: 2, direct_page: false, width: 1 }),
        Shape::ImmAcc | Shape::ImmIdx => {
            let width = imm_width(flags, shape)?;
            Ok(Sizing { len: 1 + width as u32, direct_page: false, width })
        }
        Shape::StackRel | Shape::DpIndirectLong | Shape::DpIndirectLongY | Shape::DpOperand => {
            Ok(Sizing { len: 2, direct_page: false, width: 1 })
        }
        Shape::StackRelIndirectY => Err(Kind::UnsupportedMode(format!(
            "{mnemonic} (sr,s),y — not representable by this parser's two-operand grammar"
        ))),
        Shape::Abs16 | Shape::RelativeLong => Ok(Sizing { len: 3, direct_page: false, width: 2 }),
        Shape::AbsoluteIndirectLong => Ok(Sizing { len: 3, direct_page: false, width: 2 }),
        Shape::AbsoluteLong => Ok(Sizing { len: 4, direct_page: false, width: 3 }),
        Shape::BlockMove => Ok(Sizing { len: 3, direct_page: false, width: 2 }),
    }
}

fn encode(
    instr: &Instruction,
    _flags: &FlagState,
    sizing: Sizing,
    value: Option<i64>,
    value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    let mnemonic = instr.mnemonic.to_ascii_lowercase();

    if let Some(op) = implied_opcode(&mnemonic) {
        return Ok(Encoded::new(vec![op]));
    }
    if let Some(op) = imm_byte_opcode(&mnemonic) {
        let v = value.ok_or(Kind::MissingOperand)?;
        return Ok(Encoded::new(vec![op, v as u8]));
    }

    match mnemonic.as_str() {
        "pea" => {
            let v = value.ok_or(Kind::MissingOperand)?;
            let mut bytes = vec![0xF4];
            bytes.extend_from_slice(&(v as u16).to_le_bytes());
            return Ok(Encoded::new(bytes));
        }
        "pei" => {
            let v = value.ok_or(Kind::MissingOperand)?;
            return Ok(Encoded::new(vec![0xD4, v as u8]));
        }
        "per" | "brl" => {
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 16)?;
            let op = if mnemonic == "per" { 0x62 } else { 0x82 };
            let mut bytes = vec![op];
            bytes.extend_from_slice(&(disp as i16).to_le_bytes());
            return Ok(Encoded::new(bytes));
        }
        "jml" => {
            let v = value.ok_or(Kind::MissingOperand)?;
            return Ok(match &instr.mode {
                SyntaxMode::IndirectLong(_) => {
                    let mut bytes = vec![0xDC];
                    bytes.extend_from_slice(&(v as u16).to_le_bytes());
                    Encoded::new(bytes)
                }
                _ => {
                    let mut bytes = vec![0x5C];
                    bytes.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
                    Encoded::new(bytes)
                }
            });
        }
        "jsl" => {
            let v = value.ok_or(Kind::MissingOperand)?;
            let mut bytes = vec![0x22];
            bytes.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
            return Ok(Encoded::new(bytes));
        }
        "mvn" | "mvp" => {
            let src = value.ok_or(Kind::MissingOperand)?;
            let dest = value2.ok_or(Kind::MissingOperand)?;
            let op = if mnemonic == "mvn" { 0x54 } else { 0x44 };
            return Ok(Encoded::new(vec![op, dest as u8, src as u8]));
        }
        _ => {}
    }

    if ACC_IMMEDIATE.contains(&mnemonic.as_str()) || IDX_IMMEDIATE.contains(&mnemonic.as_str()) {
        if let SyntaxMode::Immediate(_) = &instr.mode {
            let opcode = mos6502::lookup_shared(&mnemonic, BaseMode::Immediate)
                .ok_or_else(|| Kind::NoEncoding(mnemonic.clone()))?;
            let v = value.ok_or(Kind::MissingOperand)?;
            let mut bytes = vec![opcode];
            if sizing.width == 1 {
                bytes.push(v as u8);
            } else {
                bytes.extend_from_slice(&(v as u16).to_le_bytes());
            }
            return Ok(Encoded::new(bytes));
        }
    }

    if let SyntaxMode::Indexed(_, IndexReg::S) = &instr.mode {
        if let Some((_, op, _)) = STACK_RELATIVE.iter().find(|(m, ..)| *m == mnemonic) {
            let v = value.ok_or(Kind::MissingOperand)?;
            return Ok(Encoded::new(vec![*op, v as u8]));
        }
    }
    if let SyntaxMode::IndirectLong(_) = &instr.mode {
        if let Some((_, op, _)) = DP_INDIRECT_LONG.iter().find(|(m, ..)| *m == mnemonic) {
            let v = value.ok_or(Kind::MissingOperand)?;
            return Ok(Encoded::new(vec![*op, v as u8]));
        }
    }
    if let SyntaxMode::IndirectLongIndexed(_) = &instr.mode {
        if let Some((_, _, opy)) = DP_INDIRECT_LONG.iter().find(|(m, ..)| *m == mnemonic) {
            let v = value.ok_or(Kind::MissingOperand)?;
            return Ok(Encoded::new(vec![*opy, v as u8]));
        }
    }

    // Everything else falls through to the shared 65C02 opcode map,
    // re-deriving the mode from pass 1's committed narrowing decision.
    let mode = mos6502::classify(&mnemonic, &instr.mode, sizing.direct_page)
        .ok_or_else(|| Kind::UnsupportedMode(mnemonic.clone()))?;
    let opcode = mos6502::lookup_shared(&mnemonic, mode)
        .ok_or_else(|| Kind::NoEncoding(format!("{mnemonic} ({mode:?})")))?;
    let mut bytes = vec![opcode];
    match mode {
        BaseMode::Implied | BaseMode::Accumulator => {}
        BaseMode::Relative => {
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
        m if m.operand_len() == 1 => {
            let v = value.ok_or(Kind::MissingOperand)?;
            bytes.push(v as u8);
        }
        _ => {
            let v = value.ok_or(Kind::MissingOperand)?;
            bytes.extend_from_slice(&(v as u16).to_le_bytes());
        }
    }
    Ok(Encoded::new(bytes))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::W65c816, endianness: Endianness::Little, size, encode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::target::NO_OPERAND;

    fn instr(mnemonic: &str, mode: SyntaxMode) -> Instruction {
        Instruction { mnemonic: mnemonic.into(), size_suffix: None, mode, mode2: None, loc: Location::builtin() }
    }

    #[test]
    fn accumulator_width_follows_m_flag() {
        let flags8 = FlagState { m: Tracked::Known(1), x: Tracked::Known(1), ..FlagState::default() };
        let flags16 = FlagState { m: Tracked::Known(2), x: Tracked::Known(1), ..FlagState::default() };
        let i = instr("lda", SyntaxMode::Immediate(Expr::Integer(0xFF)));

        let s8 = size(&i, &flags8, OperandFacts { constant_value: Some(0xFF) }, NO_OPERAND).unwrap();
        assert_eq!(s8.len, 2);
        let e8 = encode(&i, &flags8, s8, Some(0xFF), None, 0).unwrap();
        assert_eq!(e8.bytes, vec![0xA9, 0xFF]);

        let s16 = size(&i, &flags16, OperandFacts { constant_value: Some(0xFF) }, NO_OPERAND).unwrap();
        assert_eq!(s16.len, 3);
        let e16 = encode(&i, &flags16, s16, Some(0xFF), None, 0).unwrap();
        assert_eq!(e16.bytes, vec![0xA9, 0xFF, 0x00]);
    }

    #[test]
    fn index_width_follows_x_flag_independent_of_m() {
        let flags = FlagState { m: Tracked::Known(1), x: Tracked::Known(2), ..FlagState::default() };
        let i = instr("ldx", SyntaxMode::Immediate(Expr::Integer(0xAA)));
        let s = size(&i, &flags, OperandFacts { constant_value: Some(0xAA) }, NO_OPERAND).unwrap();
        assert_eq!(s.len, 3);
        let enc = encode(&i, &flags, s, Some(0xAA), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xA2, 0xAA, 0x00]);
    }

    #[test]
    fn unknown_width_is_ambiguous() {
        let flags = FlagState::default();
        let i = instr("lda", SyntaxMode::Immediate(Expr::Integer(1)));
        let err = size(&i, &flags, OperandFacts { constant_value: Some(1) }, NO_OPERAND);
        assert!(matches!(err, Err(Kind::AmbiguousOperandWidth)));
    }

    #[test]
    fn rep_sep_are_one_byte_immediates() {
        let flags = FlagState::default();
        let rep = instr("rep", SyntaxMode::Immediate(Expr::Integer(0x30)));
        let s = size(&rep, &flags, OperandFacts { constant_value: Some(0x30) }, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&rep, &flags, s, Some(0x30), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xC2, 0x30]);

        let sep = instr("sep", SyntaxMode::Immediate(Expr::Integer(0x20)));
        let s = size(&sep, &flags, OperandFacts { constant_value: Some(0x20) }, NO_OPERAND).unwrap();
        let enc = encode(&sep, &flags, s, Some(0x20), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xE2, 0x20]);
    }

    #[test]
    fn direct_page_indirect_long_is_one_operand_byte() {
        let flags = FlagState::default();
        let i = instr("lda", SyntaxMode::IndirectLong(Expr::Integer(0x10)));
        let s = size(&i, &flags, OperandFacts { constant_value: Some(0x10) }, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &flags, s, Some(0x10), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xA7, 0x10]);
    }

    #[test]
    fn inherited_mnemonic_reuses_base_opcode_map() {
        let flags = FlagState::default();
        let i = instr("inx", SyntaxMode::Implied);
        let s = size(&i, &flags, NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 1);
        let enc = encode(&i, &flags, s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xE8]);
    }

    #[test]
    fn block_move_emits_dest_then_src() {
        let flags = FlagState::default();
        let i = Instruction {
            mnemonic: "mvn".into(),
            size_suffix: None,
            mode: SyntaxMode::Absolute(Expr::Integer(0x01)),
            mode2: Some(SyntaxMode::Absolute(Expr::Integer(0x02))),
            loc: Location::builtin(),
        };
        let s = size(&i, &flags, OperandFacts { constant_value: Some(0x01) }, OperandFacts { constant_value: Some(0x02) }).unwrap();
        assert_eq!(s.len, 3);
        let enc = encode(&i, &flags, s, Some(0x01), Some(0x02), 0).unwrap();
        assert_eq!(enc.bytes, vec![0x54, 0x02, 0x01]);
    }
}
