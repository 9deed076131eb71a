// NEC V30MZ Descriptor
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

//! A representative but real subset of the V30MZ's 8086-compatible
//! instruction set (§4.I): register/register and register/immediate
//! forms of `mov` and the dyadic ALU group (`add`/`sub`/`and`/`or`/
//! `xor`/`cmp`), `push`/`pop`/`inc`/`dec` on 16-bit registers, the
//! zero-operand control instructions, `int`, `jmp`/`call`/`ret`/`retf`,
//! the short conditional jumps, and `loop`/`loopz`/`loopnz`. Memory
//! operands (`[bx]`, segment overrides, string instructions) are left
//! out: this descriptor only encodes the register-direct `mod=11`
//! ModR/M forms.

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

fn reg16(name: &str) -> Option<u8> {
    Some(match name {
        "ax" => 0,
        "cx" => 1,
        "dx" => 2,
        "bx" => 3,
        "sp" => 4,
        "bp" => 5,
        "si" => 6,
        "di" => 7,
        _ => return None,
    })
}

fn reg8(name: &str) -> Option<u8> {
    Some(match name {
        "al" => 0,
        "cl" => 1,
        "dl" => 2,
        "bl" => 3,
        "ah" => 4,
        "ch" => 5,
        "dh" => 6,
        "bh" => 7,
        _ => return None,
    })
}

fn reg_name(mode: &SyntaxMode) -> Option<&str> {
    match mode {
        SyntaxMode::Register(r) => Some(r.as_str()),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Fixed(&'static [u8]),
    PushPop { push: bool, reg: u8 },
    IncDec { inc: bool, reg: u8 },
    MovRegReg { dst: u8, src: u8, wide: bool },
    MovRegImm { reg: u8, wide: bool },
    AluRegReg { op: u8, dst: u8, src: u8, wide: bool },
    AluRegImm { op: u8, reg: u8, wide: bool },
    IntImm,
    JmpShort,
    CallRel16,
    CondJumpShort { cc: u8 },
    LoopShort { opcode: u8 },
}

fn alu_op_index(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "add" => 0,
        "or" => 1,
        "and" => 4,
        "sub" => 5,
        "xor" => 6,
        "cmp" => 7,
        _ => return None,
    })
}

const CONDITIONS: &[(&str, u8)] = &[
    ("jae", 0x3), ("jb", 0x2), ("jbe", 0x6), ("ja", 0x7), ("je", 0x4), ("jne", 0x5),
    ("jl", 0xC), ("jle", 0xE), ("jg", 0xF), ("jge", 0xD),
];

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "nop" => Some(Shape::Fixed(&[0x90])),
        "hlt" => Some(Shape::Fixed(&[0xF4])),
        "cli" => Some(Shape::Fixed(&[0xFA])),
        "sti" => Some(Shape::Fixed(&[0xFB])),
        "cld" => Some(Shape::Fixed(&[0xFC])),
        "std" => Some(Shape::Fixed(&[0xFD])),
        "iret" => Some(Shape::Fixed(&[0xCF])),
        "ret" => Some(Shape::Fixed(&[0xC3])),
        "retf" => Some(Shape::Fixed(&[0xCB])),
        "lahf" => Some(Shape::Fixed(&[0x9F])),
        "sahf" => Some(Shape::Fixed(&[0x9E])),
        "push" => reg_name(mode).and_then(reg16).map(|r| Shape::PushPop { push: true, reg: r }),
        "pop" => reg_name(mode).and_then(reg16).map(|r| Shape::PushPop { push: false, reg: r }),
        "inc" => reg_name(mode).and_then(reg16).map(|r| Shape::IncDec { inc: true, reg: r }),
        "dec" => reg_name(mode).and_then(reg16).map(|r| Shape::IncDec { inc: false, reg: r }),
        "mov" => {
            let dst = reg_name(mode)?;
            match mode2? {
                SyntaxMode::Register(src) => {
                    if let (Some(d), Some(s)) = (reg16(dst), reg16(src)) {
                        Some(Shape::MovRegReg { dst: d, src: s, wide: true })
                    } else if let (Some(d), Some(s)) = (reg8(dst), reg8(src)) {
                        Some(Shape::MovRegReg { dst: d, src: s, wide: false })
                    } else {
                        None
                    }
                }
                SyntaxMode::Immediate(_) => {
                    if let Some(r) = reg16(dst) {
                        Some(Shape::MovRegImm { reg: r, wide: true })
                    } else {
                        reg8(dst).map(|r| Shape::MovRegImm { reg: r, wide: false })
                    }
                }
                _ => None,
            }
        }
        "add" | "sub" | "and" | "or" | "xor" | "cmp" => {
            let dst = reg_name(mode)?;
            let op = alu_op_index(&m)?;
            match mode2? {
                SyntaxMode::Register(src) => {
                    if let (Some(d), Some(s)) = (reg16(dst), reg16(src)) {
                        Some(Shape::AluRegReg { op, dst: d, src: s, wide: true })
                    } else if let (Some(d), Some(s)) = (reg8(dst), reg8(src)) {
                        Some(Shape::AluRegReg { op, dst: d, src: s, wide: false })
                    } else {
                        None
                    }
                }
                SyntaxMode::Immediate(_) => {
                    if let Some(r) = reg16(dst) {
                        Some(Shape::AluRegImm { op, reg: r, wide: true })
                    } else {
                        reg8(dst).map(|r| Shape::AluRegImm { op, reg: r, wide: false })
                    }
                }
                _ => None,
            }
        }
        "int" => Some(Shape::IntImm),
        "jmp" => Some(Shape::JmpShort),
        "call" => Some(Shape::CallRel16),
        "loop" => Some(Shape::LoopShort { opcode: 0xE2 }),
        "loopz" => Some(Shape::LoopShort { opcode: 0xE1 }),
        "loopnz" => Some(Shape::LoopShort { opcode: 0xE0 }),
        _ => CONDITIONS.iter().find(|(name, _)| *name == m).map(|(_, cc)| Shape::CondJumpShort { cc: *cc }),
    }
}

fn size(instr: &Instruction, _flags: &FlagState, _f1: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let len: u32 = match shape {
        Shape::Fixed(bytes) => bytes.len() as u32,
        Shape::PushPop { .. } | Shape::IncDec { .. } => 1,
        Shape::MovRegReg { .. } | Shape::AluRegReg { .. } => 2,
        Shape::MovRegImm { wide, .. } => 1 + if wide { 2 } else { 1 },
        Shape::AluRegImm { wide, .. } => 2 + if wide { 2 } else { 1 },
        Shape::IntImm => 2,
        Shape::JmpShort | Shape::CondJumpShort { .. } | Shape::LoopShort { .. } => 2,
        Shape::CallRel16 => 3,
    };
    Ok(Sizing { len, direct_page: false, width: 0 })
}

fn modrm_reg_direct(reg_field: u8, rm_field: u8) -> u8 {
    0xC0 | (reg_field << 3) | rm_field
}

fn encode(
    instr: &Instruction,
    _flags: &FlagState,
    _sizing: Sizing,
    value: Option<i64>,
    _value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let mut bytes = Vec::new();
    match shape {
        Shape::Fixed(opcodes) => bytes.extend_from_slice(opcodes),
        Shape::PushPop { push, reg } => bytes.push(if push { 0x50 } else { 0x58 } | reg),
        Shape::IncDec { inc, reg } => bytes.push(if inc { 0x40 } else { 0x48 } | reg),
        Shape::MovRegReg { dst, src, wide } => {
            bytes.push(if wide { 0x8B } else { 0x8A });
            bytes.push(modrm_reg_direct(dst, src));
        }
        Shape::MovRegImm { reg, wide } => {
            bytes.push((if wide { 0xB8 } else { 0xB0 }) | reg);
            let v = value.ok_or(Kind::MissingOperand)?;
            if wide {
                bytes.extend_from_slice(&(v as u16).to_le_bytes());
            } else {
                bytes.push(v as u8);
            }
        }
        Shape::AluRegReg { op, dst, src, wide } => {
            bytes.push((op << 3) | if wide { 0x03 } else { 0x02 });
            bytes.push(modrm_reg_direct(dst, src));
        }
        Shape::AluRegImm { op, reg, wide } => {
            bytes.push(if wide { 0x81 } else { 0x80 });
            bytes.push(modrm_reg_direct(op, reg));
            let v = value.ok_or(Kind::MissingOperand)?;
            if wide {
                bytes.extend_from_slice(&(v as u16).to_le_bytes());
            } else {
                bytes.push(v as u8);
            }
        }
        Shape::IntImm => {
            bytes.push(0xCD);
            let v = value.ok_or(Kind::MissingOperand)?;
            bytes.push(v as u8);
        }
        Shape::JmpShort | Shape::CondJumpShort { .. } | Shape::LoopShort { .. } => {
            let opcode = match shape {
                Shape::JmpShort => 0xEB,
                Shape::CondJumpShort { cc } => 0x70 | cc,
                Shape::LoopShort { opcode } => opcode,
                _ => unreachable!(),
            };
            bytes.push(opcode);
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 8)?;
            bytes.push(disp as i8 as u8);
        }
        Shape::CallRel16 => {
            bytes.push(0xE8);
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 16)?;
            bytes.extend_from_slice(&(disp as i16).to_le_bytes());
        }
    }
    Ok(Encoded::new(bytes))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::V30mz, endianness: Endianness::Little, size, encode }
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
    fn mov_ax_imm16() {
        let i = instr2("mov", SyntaxMode::Register("ax".into()), Some(SyntaxMode::Immediate(Expr::Integer(0x1234))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 3);
        let enc = encode(&i, &FlagState::default(), s, Some(0x1234), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xB8, 0x34, 0x12]);
    }

    #[test]
    fn add_bx_cx() {
        let i = instr2("add", SyntaxMode::Register("bx".into()), Some(SyntaxMode::Register("cx".into())));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x03, 0xD9]);
    }

    #[test]
    fn push_pop_are_single_byte() {
        let i = instr2("push", SyntaxMode::Register("bp".into()), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 1);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x55]);
    }

    #[test]
    fn conditional_jump_is_relative() {
        let i = instr2("je", SyntaxMode::Absolute(Expr::Symbol("l".into())), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, Some(0x1000), None, 0x1002).unwrap();
        assert_eq!(enc.bytes, vec![0x74, 0xFE]);
    }
}
