// Sharp SM83 Descriptor (Game Boy CPU)
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

//! The Game Boy's SM83. A representative but real subset (§4.I budget):
//! the full 8-bit load/ALU grid, 16-bit loads and `push`/`pop`, the
//! conditional and unconditional control-flow forms, and the CB-prefixed
//! rotate/shift/bit/res/set block. `(hl+)`/`(hl-)` autoincrement syntax
//! and `stop`'s trailing zero byte are left out — the parser has no
//! grammar for the former (see DESIGN.md), and the latter is emitted as
//! a plain single opcode byte here.

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

/// 8-bit register/operand slot index used by the `ld r,r'`/ALU grid.
fn r8(name: &str) -> Option<u8> {
    Some(match name {
        "b" => 0,
        "c" => 1,
        "d" => 2,
        "e" => 3,
        "h" => 4,
        "l" => 5,
        "a" => 7,
        _ => return None,
    })
}

/// 16-bit register pair index for `ld rr,nn`/`inc rr`/`dec rr`/`add hl,rr`.
fn r16_sp(name: &str) -> Option<u8> {
    Some(match name {
        "bc" => 0,
        "de" => 1,
        "hl" => 2,
        "sp" => 3,
        _ => return None,
    })
}

/// 16-bit register pair index for `push`/`pop`.
fn r16_af(name: &str) -> Option<u8> {
    Some(match name {
        "bc" => 0,
        "de" => 1,
        "hl" => 2,
        "af" => 3,
        _ => return None,
    })
}

fn condition(name: &str) -> Option<u8> {
    Some(match name {
        "nz" => 0,
        "z" => 1,
        "nc" => 2,
        "c" => 3,
        _ => return None,
    })
}

/// The symbolic name carried by a bare register operand or a register
/// named inside parens (`(hl)`), unified across both `SyntaxMode` shapes
/// the parser produces for them.
fn reg_name(mode: &SyntaxMode) -> Option<&str> {
    match mode {
        SyntaxMode::Accumulator => Some("a"),
        SyntaxMode::Register(r) => Some(r.as_str()),
        SyntaxMode::Indirect(Expr::Symbol(s)) => Some(s.as_str()),
        // `nz`/`z`/`nc` are plain identifiers to the parser (they don't
        // collide with any register name), so a bare condition operand
        // surfaces as `Absolute(Symbol(..))` rather than `Register(..)`.
        SyntaxMode::Absolute(Expr::Symbol(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn is_indirect(mode: &SyntaxMode) -> bool {
    matches!(mode, SyntaxMode::Indirect(_))
}

const ALU_MNEMONICS: &[(&str, u8)] =
    &[("add", 0), ("adc", 1), ("sub", 2), ("sbc", 3), ("and", 4), ("xor", 5), ("or", 6), ("cp", 7)];

/// Two-operand ALU form's operand-1 must be the accumulator; this looks
/// past that to classify operand 2 as an `r8` grid slot or `(hl)` (slot 6).
fn alu_operand_slot(mode: &SyntaxMode) -> Option<u8> {
    if is_indirect(mode) && reg_name(mode) == Some("hl") {
        return Some(6);
    }
    reg_name(mode).and_then(r8)
}

#[derive(Clone, Copy)]
enum Shape {
    Implied(u8),
    /// `ld r,r'` / `ld r,(hl)` / `ld (hl),r`.
    LdR8R8(u8, u8),
    /// `ld r,n`.
    LdR8Imm(u8),
    /// `ld (hl),n`.
    LdHlImm,
    /// `ld a,(nn)` / `ld (nn),a`.
    LdAAbs { store: bool },
    /// `ld a,(bc|de)` / `ld (bc|de),a`.
    LdAIndirect { pair: u8, store: bool },
    /// `ldh (n),a` / `ldh a,(n)`.
    LdhImm { store: bool },
    /// `ldh (c),a` / `ldh a,(c)`.
    LdhC { store: bool },
    /// `ld rr,nn`.
    LdRr16Imm(u8),
    /// `ld (nn),sp`.
    LdAbsSp,
    /// `ld sp,hl`.
    LdSpHl,
    /// `ld hl,sp+e` (`hl` is the only destination the hardware allows).
    LdHlSpOffset,
    Push(u8),
    Pop(u8),
    /// ALU op: `a, r8` grid slot, or `a, n` immediate.
    AluReg(u8, u8),
    AluImm(u8),
    IncR8(u8),
    DecR8(u8),
    IncRr16(u8),
    DecRr16(u8),
    AddHlRr(u8),
    /// `jp nn` / `jp cc,nn` / `jp (hl)`.
    Jp { cc: Option<u8>, hl: bool },
    /// `jr e` / `jr cc,e`.
    Jr { cc: Option<u8> },
    Call { cc: Option<u8> },
    Ret { cc: Option<u8> },
    Rst(u8),
    /// CB-prefixed: rotate/shift (group 0-7), grid slot.
    CbRot(u8, u8),
    /// CB-prefixed `bit`/`res`/`set`.
    CbBit(u8, u8, u8),
}

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "nop" => Some(Shape::Implied(0x00)),
        "stop" => Some(Shape::Implied(0x10)),
        "halt" => Some(Shape::Implied(0x76)),
        "di" => Some(Shape::Implied(0xF3)),
        "ei" => Some(Shape::Implied(0xFB)),
        "rlca" => Some(Shape::Implied(0x07)),
        "rrca" => Some(Shape::Implied(0x0F)),
        "rla" => Some(Shape::Implied(0x17)),
        "rra" => Some(Shape::Implied(0x1F)),
        "daa" => Some(Shape::Implied(0x27)),
        "cpl" => Some(Shape::Implied(0x2F)),
        "scf" => Some(Shape::Implied(0x37)),
        "ccf" => Some(Shape::Implied(0x3F)),
        "reti" => Some(Shape::Implied(0xD9)),
        "ret" if mode2.is_none() && matches!(mode, SyntaxMode::Implied) => Some(Shape::Ret { cc: None }),
        "ret" => reg_name(mode).and_then(condition).map(|cc| Shape::Ret { cc: Some(cc) }),
        "push" => reg_name(mode).and_then(r16_af).map(Shape::Push),
        "pop" => reg_name(mode).and_then(r16_af).map(Shape::Pop),
        "rst" => match mode {
            SyntaxMode::Absolute(Expr::Integer(n)) => Some(Shape::Rst(*n as u8)),
            _ => None,
        },
        "inc" | "dec" => {
            if let Some(slot) = if is_indirect(mode) && reg_name(mode) == Some("hl") { Some(6) } else { reg_name(mode).and_then(r8) } {
                Some(if m == "inc" { Shape::IncR8(slot) } else { Shape::DecR8(slot) })
            } else {
                let pair = reg_name(mode).and_then(r16_sp)?;
                Some(if m == "inc" { Shape::IncRr16(pair) } else { Shape::DecRr16(pair) })
            }
        }
        "add" if reg_name(mode) == Some("hl") => reg_name(mode2?).and_then(r16_sp).map(Shape::AddHlRr),
        _ if ALU_MNEMONICS.iter().any(|(name, _)| *name == m) => {
            let (_, group) = ALU_MNEMONICS.iter().find(|(name, _)| *name == m).unwrap();
            // One-operand form (`and b`) and explicit `a, x` form are both legal.
            let rhs = mode2.unwrap_or(mode);
            if let Some(slot) = alu_operand_slot(rhs) {
                Some(Shape::AluReg(*group, slot))
            } else if matches!(rhs, SyntaxMode::Immediate(_)) {
                Some(Shape::AluImm(*group))
            } else {
                None
            }
        }
        "jp" => {
            if matches!(mode, SyntaxMode::Indirect(_)) && reg_name(mode) == Some("hl") {
                Some(Shape::Jp { cc: None, hl: true })
            } else if let Some(m2) = mode2 {
                let cc = reg_name(mode).and_then(condition)?;
                let _ = m2;
                Some(Shape::Jp { cc: Some(cc), hl: false })
            } else {
                Some(Shape::Jp { cc: None, hl: false })
            }
        }
        "jr" => {
            if let Some(_m2) = mode2 {
                let cc = reg_name(mode).and_then(condition)?;
                Some(Shape::Jr { cc: Some(cc) })
            } else {
                Some(Shape::Jr { cc: None })
            }
        }
        "call" => {
            if let Some(_m2) = mode2 {
                let cc = reg_name(mode).and_then(condition)?;
                Some(Shape::Call { cc: Some(cc) })
            } else {
                Some(Shape::Call { cc: None })
            }
        }
        "rlc" | "rrc" | "rl" | "rr" | "sla" | "sra" | "swap" | "srl" => {
            let group = match m.as_str() {
                "rlc" => 0,
                "rrc" => 1,
                "rl" => 2,
                "rr" => 3,
                "sla" => 4,
                "sra" => 5,
                "swap" => 6,
                "srl" => 7,
                _ => unreachable!(),
            };
            let slot = if is_indirect(mode) && reg_name(mode) == Some("hl") { Some(6) } else { reg_name(mode).and_then(r8) };
            slot.map(|s| Shape::CbRot(group, s))
        }
        "bit" | "res" | "set" => {
            let bit = match mode {
                SyntaxMode::Absolute(Expr::Integer(n)) => *n as u8,
                _ => return None,
            };
            let target = mode2?;
            let slot = if is_indirect(target) && reg_name(target) == Some("hl") { Some(6) } else { reg_name(target).and_then(r8) }?;
            let opcode_base = match m.as_str() {
                "bit" => 0x40,
                "res" => 0x80,
                "set" => 0xC0,
                _ => unreachable!(),
            };
            Some(Shape::CbBit(opcode_base, bit, slot))
        }
        "ld" | "ldh" => classify_load(&m, mode, mode2?),
        _ => None,
    }
}

fn classify_load(m: &str, dst: &SyntaxMode, src: &SyntaxMode) -> Option<Shape> {
    if m == "ldh" {
        return match (dst, src) {
            (SyntaxMode::Indirect(Expr::Symbol(s)), _) if s == "c" => Some(Shape::LdhC { store: true }),
            (_, SyntaxMode::Indirect(Expr::Symbol(s))) if s == "c" => Some(Shape::LdhC { store: false }),
            (SyntaxMode::Indirect(_), _) => Some(Shape::LdhImm { store: true }),
            (_, SyntaxMode::Indirect(_)) => Some(Shape::LdhImm { store: false }),
            _ => None,
        };
    }
    // `ld sp,hl`
    if reg_name(dst) == Some("sp") && reg_name(src) == Some("hl") && !is_indirect(dst) && !is_indirect(src) {
        return Some(Shape::LdSpHl);
    }
    // `ld hl,sp+e`
    if reg_name(dst) == Some("hl") && reg_name(src) == Some("sp") && !is_indirect(dst) {
        return Some(Shape::LdHlSpOffset);
    }
    // `ld (nn),sp`
    if matches!(dst, SyntaxMode::Indirect(_)) && reg_name(dst).is_none() && reg_name(src) == Some("sp") {
        return Some(Shape::LdAbsSp);
    }
    // 16-bit immediate load.
    if let Some(pair) = reg_name(dst).and_then(r16_sp) {
        if !is_indirect(dst) && matches!(src, SyntaxMode::Absolute(_) | SyntaxMode::Immediate(_)) {
            return Some(Shape::LdRr16Imm(pair));
        }
    }
    // `ld a,(bc|de)` / `ld (bc|de),a`.
    if reg_name(dst) == Some("a") && !is_indirect(dst) {
        if let Some(pair @ (0 | 1)) = is_indirect(src).then(|| reg_name(src)).flatten().and_then(r16_sp) {
            return Some(Shape::LdAIndirect { pair, store: false });
        }
        if matches!(src, SyntaxMode::Indirect(_)) && reg_name(src).is_none() {
            return Some(Shape::LdAAbs { store: false });
        }
    }
    if reg_name(src) == Some("a") && !is_indirect(src) {
        if let Some(pair @ (0 | 1)) = is_indirect(dst).then(|| reg_name(dst)).flatten().and_then(r16_sp) {
            return Some(Shape::LdAIndirect { pair, store: true });
        }
        if matches!(dst, SyntaxMode::Indirect(_)) && reg_name(dst).is_none() {
            return Some(Shape::LdAAbs { store: true });
        }
    }
    // `ld (hl),n`
    if is_indirect(dst) && reg_name(dst) == Some("hl") && matches!(src, SyntaxMode::Immediate(_)) {
        return Some(Shape::LdHlImm);
    }
    // 8-bit register/`(hl)` grid.
    let dst_slot = if is_indirect(dst) && reg_name(dst) == Some("hl") { Some(6) } else { reg_name(dst).and_then(r8) };
    if let Some(d) = dst_slot {
        if let Some(s) = alu_operand_slot(src) {
            return Some(Shape::LdR8R8(d, s));
        }
        if matches!(src, SyntaxMode::Immediate(_)) {
            return Some(Shape::LdR8Imm(d));
        }
    }
    None
}

/// `pub(crate)` so the Z80 descriptor can delegate its shared subset —
/// the SM83 is a stripped-down Z80 core, and the opcode bytes coincide
/// for every mnemonic the two families have in common.
pub(crate) fn size(instr: &Instruction, _flags: &FlagState, _f1: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let len = match shape {
        Shape::Implied(_) | Shape::Push(_) | Shape::Pop(_) | Shape::LdR8R8(..) | Shape::LdAIndirect { .. }
        | Shape::LdSpHl | Shape::AluReg(..) | Shape::IncR8(_) | Shape::DecR8(_) | Shape::IncRr16(_)
        | Shape::DecRr16(_) | Shape::AddHlRr(_) | Shape::Ret { .. } | Shape::Rst(_) | Shape::LdhC { .. }
        | Shape::Jp { hl: true, .. } => 1,
        Shape::LdR8Imm(_) | Shape::AluImm(_) | Shape::LdhImm { .. } | Shape::LdHlImm | Shape::Jr { .. }
        | Shape::LdHlSpOffset => 2,
        Shape::LdAAbs { .. } | Shape::LdRr16Imm(_) | Shape::Jp { .. } | Shape::Call { .. } => 3,
        Shape::LdAbsSp => 3,
        Shape::CbRot(..) | Shape::CbBit(..) => 2,
    };
    Ok(Sizing { len, direct_page: false, width: (len - 1) as u8 })
}

pub(crate) fn encode(
    instr: &Instruction,
    _flags: &FlagState,
    _sizing: Sizing,
    value: Option<i64>,
    _value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let rel = |bytes: &mut Vec<u8>| -> Result<(), Kind> {
        let target = value.ok_or(Kind::MissingOperand)?;
        let disp = target - next_pc;
        require_fit(disp, 8)?;
        bytes.push(disp as i8 as u8);
        Ok(())
    };
    let imm8 = |bytes: &mut Vec<u8>| -> Result<(), Kind> {
        bytes.push(value.ok_or(Kind::MissingOperand)? as u8);
        Ok(())
    };
    let imm16 = |bytes: &mut Vec<u8>| -> Result<(), Kind> {
        bytes.extend_from_slice(&(value.ok_or(Kind::MissingOperand)? as u16).to_le_bytes());
        Ok(())
    };

    let mut bytes = Vec::new();
    match shape {
        Shape::Implied(op) => bytes.push(op),
        Shape::LdR8R8(d, s) => bytes.push(0x40 | (d << 3) | s),
        Shape::LdR8Imm(d) => {
            bytes.push(0x06 | (d << 3));
            imm8(&mut bytes)?;
        }
        Shape::LdHlImm => {
            bytes.push(0x36);
            imm8(&mut bytes)?;
        }
        Shape::LdAAbs { store } => {
            bytes.push(if store { 0xEA } else { 0xFA });
            imm16(&mut bytes)?;
        }
        Shape::LdAIndirect { pair, store } => bytes.push(if store { 0x02 | (pair << 4) } else { 0x0A | (pair << 4) }),
        Shape::LdhImm { store } => {
            bytes.push(if store { 0xE0 } else { 0xF0 });
            imm8(&mut bytes)?;
        }
        Shape::LdhC { store } => bytes.push(if store { 0xE2 } else { 0xF2 }),
        Shape::LdRr16Imm(pair) => {
            bytes.push(0x01 | (pair << 4));
            imm16(&mut bytes)?;
        }
        Shape::LdAbsSp => {
            bytes.push(0x08);
            imm16(&mut bytes)?;
        }
        Shape::LdSpHl => bytes.push(0xF9),
        Shape::LdHlSpOffset => {
            bytes.push(0xF8);
            imm8(&mut bytes)?;
        }
        Shape::Push(pair) => bytes.push(0xC5 | (pair << 4)),
        Shape::Pop(pair) => bytes.push(0xC1 | (pair << 4)),
        Shape::AluReg(group, slot) => bytes.push(0x80 | (group << 3) | slot),
        Shape::AluImm(group) => {
            bytes.push(0xC6 | (group << 3));
            imm8(&mut bytes)?;
        }
        Shape::IncR8(slot) => bytes.push(0x04 | (slot << 3)),
        Shape::DecR8(slot) => bytes.push(0x05 | (slot << 3)),
        Shape::IncRr16(pair) => bytes.push(0x03 | (pair << 4)),
        Shape::DecRr16(pair) => bytes.push(0x0B | (pair << 4)),
        Shape::AddHlRr(pair) => bytes.push(0x09 | (pair << 4)),
        Shape::Jp { cc: None, hl: true } => bytes.push(0xE9),
        Shape::Jp { cc: None, hl: false } => {
            bytes.push(0xC3);
            imm16(&mut bytes)?;
        }
        Shape::Jp { cc: Some(cc), .. } => {
            bytes.push(0xC2 | (cc << 3));
            imm16(&mut bytes)?;
        }
        Shape::Jr { cc: None } => {
            bytes.push(0x18);
            rel(&mut bytes)?;
        }
        Shape::Jr { cc: Some(cc) } => {
            bytes.push(0x20 | (cc << 3));
            rel(&mut bytes)?;
        }
        Shape::Call { cc: None } => {
            bytes.push(0xCD);
            imm16(&mut bytes)?;
        }
        Shape::Call { cc: Some(cc) } => {
            bytes.push(0xC4 | (cc << 3));
            imm16(&mut bytes)?;
        }
        Shape::Ret { cc: None } => bytes.push(0xC9),
        Shape::Ret { cc: Some(cc) } => bytes.push(0xC0 | (cc << 3)),
        Shape::Rst(n) => bytes.push(0xC7 | n),
        Shape::CbRot(group, slot) => {
            bytes.push(0xCB);
            bytes.push((group << 3) | slot);
        }
        Shape::CbBit(base, bit, slot) => {
            bytes.push(0xCB);
            bytes.push(base | (bit << 3) | slot);
        }
    }
    Ok(Encoded::new(bytes))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::Sm83, endianness: Endianness::Little, size, encode }
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
    fn ld_register_to_register() {
        let i = instr2("ld", SyntaxMode::Register("b".into()), Some(SyntaxMode::Accumulator));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 1);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x47]);
    }

    #[test]
    fn ld_a_immediate() {
        let i = instr2("ld", SyntaxMode::Accumulator, Some(SyntaxMode::Immediate(Expr::Integer(0x42))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x42), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x3E, 0x42]);
    }

    #[test]
    fn ld_hl_16bit_immediate() {
        let i = instr2("ld", SyntaxMode::Register("hl".into()), Some(SyntaxMode::Absolute(Expr::Integer(0xC000))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 3);
        let enc = encode(&i, &FlagState::default(), s, Some(0xC000), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x21, 0x00, 0xC0]);
    }

    #[test]
    fn conditional_jr_backward() {
        let i = instr2("jr", SyntaxMode::Register("c".into()), Some(SyntaxMode::Absolute(Expr::Symbol("loop".into()))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x0FF0), None, 0x1000).unwrap();
        assert_eq!(enc.bytes, vec![0x38, 0xF0]);
    }

    #[test]
    fn cb_bit_test_on_hl() {
        let i = instr2("bit", SyntaxMode::Absolute(Expr::Integer(7)), Some(SyntaxMode::Indirect(Expr::Symbol("hl".into()))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xCB, 0x7E]);
    }

    #[test]
    fn push_and_pop() {
        let push = instr2("push", SyntaxMode::Register("af".into()), None);
        let s = size(&push, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&push, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xF5]);
    }
}
