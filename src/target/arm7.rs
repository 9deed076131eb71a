// ARM7TDMI Descriptor
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

//! A representative but real subset of the little-endian ARM (32-bit
//! ARM instruction set only — `ARM7_FAMILY` has no per-condition
//! mnemonic variants, so conditional execution is out of scope, and
//! there is no Thumb encoding here): the data-processing group
//! (`mov`/`mvn`/`add`/`sub`/`and`/`orr`/`eor`/`bic`/`cmp`/`cmn`/`tst`/
//! `teq`, register or 8-bit unrotated immediate operand2), `ldr`/`str`/
//! `ldrb`/`strb` register-offset addressing, `b`/`bl`/`bx`, `swi`/`svc`,
//! and `bx`/`swi`. `ldm`/`stm` are left out entirely — the parser never
//! produces the `{r0,r4-r7}` register-list syntax they need (see
//! DESIGN.md) — as are `mul`/`mla`, which need three and four register
//! operands respectively and this AST caps instructions at two. The
//! data-processing immediate only covers the unrotated 0-255 range, not
//! the full 4-bit-rotate/8-bit-immediate field.

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

fn rn(name: &str) -> Option<u8> {
    match name {
        "sp" => Some(13),
        "lr" => Some(14),
        "pc" => Some(15),
        _ if name.len() >= 2 && name.starts_with('r') => name[1..].parse::<u8>().ok().filter(|n| *n <= 15),
        _ => None,
    }
}

fn reg_name(mode: &SyntaxMode) -> Option<&str> {
    match mode {
        SyntaxMode::Register(r) => Some(r.as_str()),
        SyntaxMode::Indirect(Expr::Symbol(s)) => Some(s.as_str()),
        SyntaxMode::RegisterIndirect(r, _) => Some(r.as_str()),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Op2 {
    Reg(u8),
    Imm(u8),
}

fn op2_of(mode: &SyntaxMode, value: Option<i64>) -> Result<Op2, Kind> {
    match mode {
        SyntaxMode::Register(_) => Ok(Op2::Reg(reg_name(mode).and_then(rn).ok_or(Kind::MissingOperand)?)),
        SyntaxMode::Immediate(_) => {
            let v = value.ok_or(Kind::MissingOperand)?;
            if !(0..=255).contains(&v) {
                return Err(Kind::OperandTooWide(v));
            }
            Ok(Op2::Imm(v as u8))
        }
        _ => Err(Kind::UnsupportedMode("operand2".into())),
    }
}

#[derive(Clone, Copy)]
enum Shape {
    /// `mov`/`mvn`: `Rd, op2`.
    Move { opcode: u8, rd: u8 },
    /// `add`/`sub`/`and`/`orr`/`eor`/`bic`: `Rd, Rn, op2`.
    Dyadic { opcode: u8, rd: u8, rn: u8 },
    /// `cmp`/`cmn`/`tst`/`teq`: `Rn, op2`.
    Test { opcode: u8, rn: u8 },
    /// `ldr`/`str`/`ldrb`/`strb` with `[Rn]` or `[Rn, #imm]`.
    Transfer { load: bool, byte: bool, rd: u8, rn: u8 },
    Branch { link: bool },
    Bx { rm: u8 },
    Swi,
}

fn data_op_code(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "and" => 0x0,
        "eor" => 0x1,
        "sub" => 0x2,
        "add" => 0x4,
        "orr" => 0xC,
        "mov" => 0xD,
        "bic" => 0xE,
        "mvn" => 0xF,
        "tst" => 0x8,
        "teq" => 0x9,
        "cmp" => 0xA,
        "cmn" => 0xB,
        _ => return None,
    })
}

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "mov" | "mvn" => {
            let rd = reg_name(mode).and_then(rn)?;
            Some(Shape::Move { opcode: data_op_code(&m)?, rd })
        }
        "add" | "sub" | "and" | "orr" | "eor" | "bic" => {
            let rd = reg_name(mode).and_then(rn)?;
            let rn_reg = reg_name(mode2?).and_then(rn)?;
            Some(Shape::Dyadic { opcode: data_op_code(&m)?, rd, rn: rn_reg })
        }
        "cmp" | "cmn" | "tst" | "teq" => {
            let reg = reg_name(mode).and_then(rn)?;
            Some(Shape::Test { opcode: data_op_code(&m)?, rn: reg })
        }
        "ldr" | "str" | "ldrb" | "strb" => {
            let rd = reg_name(mode).and_then(rn)?;
            let base = reg_name(mode2?).and_then(rn)?;
            Some(Shape::Transfer { load: m.starts_with("ldr"), byte: m.ends_with('b'), rd, rn: base })
        }
        "b" => Some(Shape::Branch { link: false }),
        "bl" => Some(Shape::Branch { link: true }),
        "bx" | "blx" => reg_name(mode).and_then(rn).map(|rm| Shape::Bx { rm }),
        "swi" | "svc" => Some(Shape::Swi),
        _ => None,
    }
}

fn size(instr: &Instruction, _flags: &FlagState, _f1: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    Ok(Sizing { len: 4, direct_page: false, width: 4 })
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
    const COND_AL: u32 = 0xE << 28;
    let word: u32 = match shape {
        Shape::Move { opcode, rd } => {
            let op2 = op2_of(&instr.mode2.clone().unwrap_or_else(|| instr.mode.clone()), value)?;
            let (i_bit, op2_bits) = match op2 {
                Op2::Reg(r) => (0u32, r as u32),
                Op2::Imm(v) => (1u32, v as u32),
            };
            COND_AL | (i_bit << 25) | ((opcode as u32) << 21) | ((rd as u32) << 12) | op2_bits
        }
        Shape::Dyadic { opcode, rd, rn: rn_reg } => {
            let op2 = op2_of(instr.mode2.as_ref().ok_or(Kind::MissingOperand)?, value2.or(value))?;
            let (i_bit, op2_bits) = match op2 {
                Op2::Reg(r) => (0u32, r as u32),
                Op2::Imm(v) => (1u32, v as u32),
            };
            COND_AL | (i_bit << 25) | ((opcode as u32) << 21) | ((rn_reg as u32) << 16) | ((rd as u32) << 12) | op2_bits
        }
        Shape::Test { opcode, rn: rn_reg } => {
            let op2 = op2_of(instr.mode2.as_ref().ok_or(Kind::MissingOperand)?, value)?;
            let (i_bit, op2_bits) = match op2 {
                Op2::Reg(r) => (0u32, r as u32),
                Op2::Imm(v) => (1u32, v as u32),
            };
            COND_AL | (i_bit << 25) | ((opcode as u32) << 21) | (1 << 20) | ((rn_reg as u32) << 16) | op2_bits
        }
        Shape::Transfer { load, byte, rd, rn: base } => {
            // U bit is hardwired to "add" (up-offset); negative
            // displacements aren't representable in this subset.
            let offset = value.unwrap_or(0);
            require_fit(offset, 12)?;
            let l_bit = if load { 1u32 } else { 0 };
            let b_bit = if byte { 1u32 } else { 0 };
            (0x01 << 26) | COND_AL | (1 << 24) | (1 << 23) | (b_bit << 22) | (l_bit << 20) | ((base as u32) << 16)
                | ((rd as u32) << 12)
                | (offset.unsigned_abs() as u32 & 0xFFF)
        }
        Shape::Branch { link } => {
            let target = value.ok_or(Kind::MissingOperand)?;
            let pc_for_calc = next_pc + 4;
            let diff = target - pc_for_calc;
            require_fit(diff >> 2, 24)?;
            let offset = ((diff >> 2) as u32) & 0x00FF_FFFF;
            let l_bit = if link { 1u32 } else { 0 };
            COND_AL | (0b101 << 25) | (l_bit << 24) | offset
        }
        Shape::Bx { rm } => COND_AL | 0x012F_FF10 | rm as u32,
        Shape::Swi => COND_AL | (0xF << 24),
    };
    Ok(Encoded::new(word.to_le_bytes().to_vec()))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::Arm7, endianness: Endianness::Little, size, encode }
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
    fn mov_register_to_register() {
        let i = instr2("mov", SyntaxMode::Register("r0".into()), Some(SyntaxMode::Register("r1".into())));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 4);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(u32::from_le_bytes(enc.bytes.try_into().unwrap()), 0xE1A00001);
    }

    #[test]
    fn mov_immediate() {
        let i = instr2("mov", SyntaxMode::Register("r0".into()), Some(SyntaxMode::Immediate(Expr::Integer(5))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, Some(5), None, 0).unwrap();
        assert_eq!(u32::from_le_bytes(enc.bytes.try_into().unwrap()), 0xE3A00005);
    }

    #[test]
    fn branch_link_uses_pipeline_adjusted_pc() {
        let i = instr2("bl", SyntaxMode::Absolute(Expr::Symbol("f".into())), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 4);
        let enc = encode(&i, &FlagState::default(), s, Some(0x104), None, 0x100).unwrap();
        let word = u32::from_le_bytes(enc.bytes.try_into().unwrap());
        assert_eq!(word, 0xEB000000);
    }

    #[test]
    fn bx_lr_is_fixed_encoding() {
        let i = instr2("bx", SyntaxMode::Register("lr".into()), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(u32::from_le_bytes(enc.bytes.try_into().unwrap()), 0xE12FFF1E);
    }
}
