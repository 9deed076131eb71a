// Sony SPC700 Descriptor
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

//! A representative but real subset of the SNES sound coprocessor's
//! instruction set (§4.I): `mov` between `a`/`x`/`y`/direct page/
//! immediate, the dyadic ALU group (`or`/`and`/`eor`/`cmp`/`adc`/`sbc`)
//! against `a`, `inc`/`dec`/`asl`/`lsr`/`rol`/`ror a`, `push`/`pop`,
//! the short branches, `jmp`/`call`, `cbne`/`dbnz` on a direct-page
//! byte, and the zero-operand status/control instructions. `movw`/the
//! 16-bit `ya` arithmetic group, `tcall`/`pcall`, and the bit-oriented
//! `set1`/`clr1`/`and1`/`or1`/`tset1`/`tclr1` forms are left out of
//! this subset.
//!
//! `FlagState::direct_page` (the `.dp 0`/`.dp 1` base selector) is
//! carried for the analyzer's bookkeeping but never folded into the
//! emitted byte: every direct-page operand here is encoded as its
//! bare low 8 bits, same as real SPC700 assemblers — which page those
//! bits land in is a runtime `P` flag question, not an assembly-time
//! one.

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

fn reg_name(mode: &SyntaxMode) -> Option<&str> {
    match mode {
        SyntaxMode::Accumulator => Some("a"),
        SyntaxMode::Register(r) => Some(r.as_str()),
        _ => None,
    }
}

fn is_dp(mode: &SyntaxMode) -> bool {
    matches!(mode, SyntaxMode::Absolute(_))
}

fn alu_row(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "or" => 0,
        "and" => 1,
        "eor" => 2,
        "cmp" => 3,
        "adc" => 4,
        "sbc" => 5,
        _ => return None,
    })
}

const BRANCHES: &[(&str, u8)] = &[
    ("bra", 0x2F),
    ("beq", 0xF0),
    ("bne", 0xD0),
    ("bcs", 0xB0),
    ("bcc", 0x90),
    ("bvs", 0x70),
    ("bvc", 0x50),
    ("bmi", 0x30),
    ("bpl", 0x10),
];

#[derive(Clone, Copy)]
enum Shape {
    Fixed(u8),
    MovRegReg(u8),
    MovRegImm(u8),
    MovADp { to_a: bool },
    MovDpImm,
    AluAImm(u8),
    AluADp(u8),
    Branch(u8),
    Jmp,
    Call,
    CbneDp,
    DbnzDp,
}

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "nop" => Some(Shape::Fixed(0x00)),
        "sleep" => Some(Shape::Fixed(0xEF)),
        "stop" => Some(Shape::Fixed(0xFF)),
        "clrc" => Some(Shape::Fixed(0x60)),
        "setc" => Some(Shape::Fixed(0x80)),
        "notc" => Some(Shape::Fixed(0xED)),
        "clrv" => Some(Shape::Fixed(0xE0)),
        "clrp" => Some(Shape::Fixed(0x20)),
        "setp" => Some(Shape::Fixed(0x40)),
        "ei" => Some(Shape::Fixed(0xA0)),
        "di" => Some(Shape::Fixed(0xC0)),
        "ret" => Some(Shape::Fixed(0x6F)),
        "ret1" => Some(Shape::Fixed(0x7F)),
        "brk" => Some(Shape::Fixed(0x0F)),
        "daa" => Some(Shape::Fixed(0xDF)),
        "das" => Some(Shape::Fixed(0xBE)),
        "xcn" => Some(Shape::Fixed(0x9F)),
        "inc" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0xBC)),
        "dec" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0x9C)),
        "asl" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0x1C)),
        "lsr" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0x5C)),
        "rol" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0x3C)),
        "ror" if reg_name(mode) == Some("a") => Some(Shape::Fixed(0x7C)),
        "push" => match reg_name(mode) {
            Some("a") => Some(Shape::Fixed(0x2D)),
            Some("x") => Some(Shape::Fixed(0x4D)),
            Some("y") => Some(Shape::Fixed(0x6D)),
            _ => None,
        },
        "pop" => match reg_name(mode) {
            Some("a") => Some(Shape::Fixed(0xAE)),
            Some("x") => Some(Shape::Fixed(0xCE)),
            Some("y") => Some(Shape::Fixed(0xEE)),
            _ => None,
        },
        "mov" => match (reg_name(mode), mode2) {
            (Some("a"), Some(SyntaxMode::Register(r))) if r == "x" => Some(Shape::MovRegReg(0x7D)),
            (Some("a"), Some(SyntaxMode::Register(r))) if r == "y" => Some(Shape::MovRegReg(0xDD)),
            (Some("x"), Some(SyntaxMode::Accumulator)) => Some(Shape::MovRegReg(0x5D)),
            (Some("y"), Some(SyntaxMode::Accumulator)) => Some(Shape::MovRegReg(0xFD)),
            (Some("x"), Some(SyntaxMode::Register(r))) if r == "sp" => Some(Shape::MovRegReg(0x9D)),
            (Some("sp"), Some(SyntaxMode::Register(r))) if r == "x" => Some(Shape::MovRegReg(0xBD)),
            (Some("a"), Some(SyntaxMode::Immediate(_))) => Some(Shape::MovRegImm(0xE8)),
            (Some("x"), Some(SyntaxMode::Immediate(_))) => Some(Shape::MovRegImm(0xCD)),
            (Some("y"), Some(SyntaxMode::Immediate(_))) => Some(Shape::MovRegImm(0x8D)),
            (Some("a"), Some(m2)) if is_dp(m2) => Some(Shape::MovADp { to_a: true }),
            _ if is_dp(mode) && mode2.map(reg_name) == Some(Some("a")) => Some(Shape::MovADp { to_a: false }),
            _ if is_dp(mode) && matches!(mode2, Some(SyntaxMode::Immediate(_))) => Some(Shape::MovDpImm),
            _ => None,
        },
        "cbne" => is_dp(mode).then_some(Shape::CbneDp),
        "dbnz" => is_dp(mode).then_some(Shape::DbnzDp),
        "jmp" => Some(Shape::Jmp),
        "call" => Some(Shape::Call),
        _ => {
            if let Some(row) = alu_row(&m) {
                if reg_name(mode) == Some("a") {
                    match mode2 {
                        Some(SyntaxMode::Immediate(_)) => return Some(Shape::AluAImm(row)),
                        Some(m2) if is_dp(m2) => return Some(Shape::AluADp(row)),
                        _ => {}
                    }
                }
                None
            } else {
                BRANCHES.iter().find(|(name, _)| *name == m).map(|(_, op)| Shape::Branch(*op))
            }
        }
    }
}

fn size(instr: &Instruction, _flags: &FlagState, _f1: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let len: u32 = match shape {
        Shape::Fixed(_) | Shape::MovRegReg(_) => 1,
        Shape::MovRegImm(_) | Shape::MovADp { .. } | Shape::AluAImm(_) | Shape::AluADp(_) | Shape::Branch(_) => 2,
        Shape::MovDpImm | Shape::CbneDp | Shape::DbnzDp => 3,
        Shape::Jmp => 3,
        Shape::Call => 3,
    };
    Ok(Sizing { len, direct_page: false, width: 0 })
}

fn encode(
    instr: &Instruction,
    _flags: &FlagState,
    _sizing: Sizing,
    value: Option<i64>,
    value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let mut bytes = Vec::new();
    match shape {
        Shape::Fixed(op) | Shape::MovRegReg(op) => bytes.push(op),
        Shape::MovRegImm(op) => {
            bytes.push(op);
            bytes.push(value.ok_or(Kind::MissingOperand)? as u8);
        }
        Shape::MovADp { to_a } => {
            bytes.push(if to_a { 0xE4 } else { 0xC4 });
            bytes.push(value.ok_or(Kind::MissingOperand)? as u8);
        }
        Shape::MovDpImm => {
            bytes.push(0x8F);
            let imm = value2.ok_or(Kind::MissingOperand)?;
            let dp = value.ok_or(Kind::MissingOperand)?;
            bytes.push(imm as u8);
            bytes.push(dp as u8);
        }
        Shape::AluAImm(row) => {
            bytes.push(row * 0x20 + 0x08);
            bytes.push(value.ok_or(Kind::MissingOperand)? as u8);
        }
        Shape::AluADp(row) => {
            bytes.push(row * 0x20 + 0x04);
            bytes.push(value.ok_or(Kind::MissingOperand)? as u8);
        }
        Shape::Jmp => {
            bytes.push(0x5F);
            let target = value.ok_or(Kind::MissingOperand)?;
            bytes.extend_from_slice(&(target as u16).to_le_bytes());
        }
        Shape::Call => {
            bytes.push(0x3F);
            let target = value.ok_or(Kind::MissingOperand)?;
            bytes.extend_from_slice(&(target as u16).to_le_bytes());
        }
        Shape::Branch(op) => {
            bytes.push(op);
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
        Shape::CbneDp => {
            bytes.push(0x2E);
            let dp = value.ok_or(Kind::MissingOperand)?;
            bytes.push(dp as u8);
            let target = value2.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
        Shape::DbnzDp => {
            bytes.push(0xB6);
            let dp = value.ok_or(Kind::MissingOperand)?;
            bytes.push(dp as u8);
            let target = value2.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
    }
    Ok(Encoded::new(bytes))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::Spc700, endianness: Endianness::Little, size, encode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::target::NO_OPERAND;

    fn instr2(mnemonic: &str, mode: SyntaxMode, mode2: Option<SyntaxMode>) -> Instruction {
        Instruction { mnemonic: mnemonic.into(), size_suffix: None, mode, mode2, loc: Location::builtin() }
    }

    #[test]
    fn mov_a_immediate() {
        let i = instr2("mov", SyntaxMode::Accumulator, Some(SyntaxMode::Immediate(Expr::Integer(0x42))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x42), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xE8, 0x42]);
    }

    #[test]
    fn and_a_direct_page() {
        let i = instr2("and", SyntaxMode::Accumulator, Some(SyntaxMode::Absolute(Expr::Integer(0x10))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x10), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x24, 0x10]);
    }

    #[test]
    fn branch_is_relative() {
        let i = instr2("bne", SyntaxMode::Absolute(Expr::Symbol("l".into())), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, Some(0x10), None, 0x12).unwrap();
        assert_eq!(enc.bytes, vec![0xD0, 0xFE]);
    }

    #[test]
    fn dbnz_direct_page_then_relative() {
        let i = instr2("dbnz", SyntaxMode::Absolute(Expr::Integer(0x20)), Some(SyntaxMode::Absolute(Expr::Symbol("l".into()))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 3);
        let enc = encode(&i, &FlagState::default(), s, Some(0x20), Some(0x0FF0), 0x1000).unwrap();
        assert_eq!(enc.bytes, vec![0xB6, 0x20, 0xF0]);
    }
}
