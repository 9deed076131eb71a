// Motorola 68000 Descriptor
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

//! A representative but real subset of the big-endian 68000 (§4.I
//! budget): `move`/`movea`/`moveq`, `lea`, `clr`, the `Dn,ea`/`ea,Dn`
//! dyadic ALU group (`add`/`sub`/`and`/`or`/`eor`/`cmp`) plus their
//! `#imm,ea` immediate forms, `not`/`neg`/`tst`, `swap`/`exg`, the
//! `bcc` branch family, `jmp`/`jsr`/`rts`/`rte`/`rtr`, `dbcc`, and the
//! zero-operand control instructions. Extension-word indexed addressing
//! (`d8(An,Xn)`) and the full `movem` register-list form are left out —
//! the parser produces no `RegisterList` for this grammar (see
//! DESIGN.md), only a flat `d(An)` base-plus-displacement operand.

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::{require_fit, Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

fn dn(name: &str) -> Option<u8> {
    if name.len() == 2 && name.starts_with('d') {
        name[1..].parse::<u8>().ok().filter(|n| *n <= 7)
    } else {
        None
    }
}

fn an(name: &str) -> Option<u8> {
    if name == "sp" {
        return Some(7);
    }
    if name.len() == 2 && name.starts_with('a') {
        name[1..].parse::<u8>().ok().filter(|n| *n <= 7)
    } else {
        None
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

/// The effective-address field pair (`mmm` mode, `rrr` register) plus
/// any extension words the mode needs, resolved once the operand's
/// constant value (if any) is known.
struct Ea {
    mode: u8,
    reg: u8,
    extra_len: u32,
}

fn size_suffix_width(suffix: Option<char>) -> u32 {
    match suffix {
        Some('b') => 1,
        Some('l') => 4,
        _ => 2,
    }
}

fn ea_shape(mode: &SyntaxMode, data_width: u32) -> Option<Ea> {
    if let Some(n) = reg_name(mode).and_then(dn) {
        if !matches!(mode, SyntaxMode::Indirect(_) | SyntaxMode::RegisterIndirect(..)) {
            return Some(Ea { mode: 0, reg: n, extra_len: 0 });
        }
    }
    if let Some(n) = reg_name(mode).and_then(an) {
        match mode {
            SyntaxMode::Register(_) => return Some(Ea { mode: 1, reg: n, extra_len: 0 }),
            SyntaxMode::Indirect(_) => return Some(Ea { mode: 2, reg: n, extra_len: 0 }),
            SyntaxMode::RegisterIndirect(_, Some(_)) => return Some(Ea { mode: 5, reg: n, extra_len: 2 }),
            _ => {}
        }
    }
    match mode {
        SyntaxMode::Immediate(_) => Some(Ea { mode: 7, reg: 4, extra_len: data_width.max(2) }),
        SyntaxMode::Absolute(_) => Some(Ea { mode: 7, reg: 1, extra_len: 4 }),
        _ => None,
    }
}

/// The word-sized extension bytes for one resolved operand (its
/// immediate/absolute/displacement value), appended after the opcode
/// word(s).
fn ea_extension(mode: &SyntaxMode, value: Option<i64>, data_width: u32) -> Result<Vec<u8>, Kind> {
    match mode {
        SyntaxMode::Immediate(_) => {
            let v = value.ok_or(Kind::MissingOperand)?;
            Ok(match data_width {
                1 => vec![0, v as u8],
                4 => (v as u32).to_be_bytes().to_vec(),
                _ => (v as u16).to_be_bytes().to_vec(),
            })
        }
        SyntaxMode::Absolute(_) => {
            let v = value.ok_or(Kind::MissingOperand)?;
            Ok((v as u32).to_be_bytes().to_vec())
        }
        SyntaxMode::RegisterIndirect(_, Some(_)) => {
            let v = value.ok_or(Kind::MissingOperand)?;
            Ok((v as i16).to_be_bytes().to_vec())
        }
        _ => Ok(Vec::new()),
    }
}

const CONDITIONS: &[(&str, u8)] = &[
    ("ra", 0x0),
    ("sr", 0x1),
    ("hi", 0x2),
    ("ls", 0x3),
    ("cc", 0x4),
    ("cs", 0x5),
    ("ne", 0x6),
    ("eq", 0x7),
    ("vc", 0x8),
    ("vs", 0x9),
    ("pl", 0xA),
    ("mi", 0xB),
    ("ge", 0xC),
    ("lt", 0xD),
    ("gt", 0xE),
    ("le", 0xF),
];

fn branch_condition(mnemonic: &str) -> Option<u8> {
    let suffix = mnemonic.strip_prefix('b')?;
    CONDITIONS.iter().find(|(name, _)| *name == suffix).map(|(_, code)| *code)
}

fn alu_opcode_word(mnemonic: &str, dn_reg: u8, direction_to_ea: bool, ea: &Ea, size_bits: u8) -> Option<u16> {
    let base: u16 = match mnemonic {
        "add" => 0xD000,
        "sub" => 0x9000,
        "and" => 0xC000,
        "or" => 0x8000,
        "eor" => 0xB000,
        "cmp" => 0xB000,
        _ => return None,
    };
    let dir_bit: u16 = if direction_to_ea { 1 } else { 0 };
    Some(base | ((dn_reg as u16) << 9) | (dir_bit << 8) | ((size_bits as u16) << 6) | ((ea.mode as u16) << 3) | ea.reg as u16)
}

fn size_bits_of(width: u32) -> u8 {
    match width {
        1 => 0,
        4 => 2,
        _ => 1,
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Implied(u16),
    Move { width: u32 },
    Movea { width: u32 },
    Moveq,
    Lea,
    Clr { width: u32 },
    Not { width: u32 },
    Neg { width: u32 },
    Tst { width: u32 },
    Alu { width: u32, dn_reg: u8, to_ea: bool },
    AluImm { width: u32 },
    Swap,
    ExgDD(u8, u8),
    ExgAA(u8, u8),
    ExgDA(u8, u8),
    Branch { cond: u8 },
    Jmp,
    Jsr,
    Dbcc { cond: u8, reg: u8 },
    TrapImm,
    LinkImm(u8),
    UnlkReg(u8),
}

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let width = size_suffix_width(instr.size_suffix);
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "nop" => Some(Shape::Implied(0x4E71)),
        "rts" => Some(Shape::Implied(0x4E75)),
        "rte" => Some(Shape::Implied(0x4E73)),
        "rtr" => Some(Shape::Implied(0x4E77)),
        "reset" => Some(Shape::Implied(0x4E70)),
        "trapv" => Some(Shape::Implied(0x4E76)),
        "stop" => Some(Shape::TrapImm),
        "trap" => Some(Shape::TrapImm),
        "swap" => reg_name(mode).and_then(dn).map(|_| Shape::Swap),
        "link" => reg_name(mode).and_then(an).map(Shape::LinkImm),
        "unlk" => reg_name(mode).and_then(an).map(Shape::UnlkReg),
        "exg" => {
            let (a, b) = (reg_name(mode)?, reg_name(mode2?)?);
            if let (Some(x), Some(y)) = (dn(a), dn(b)) {
                Some(Shape::ExgDD(x, y))
            } else if let (Some(x), Some(y)) = (an(a), an(b)) {
                Some(Shape::ExgAA(x, y))
            } else if let (Some(x), Some(y)) = (dn(a), an(b)) {
                Some(Shape::ExgDA(x, y))
            } else if let (Some(y), Some(x)) = (dn(b), an(a)) {
                Some(Shape::ExgDA(y, x))
            } else {
                None
            }
        }
        "lea" => Some(Shape::Lea),
        "movea" => Some(Shape::Movea { width }),
        "moveq" => Some(Shape::Moveq),
        "move" => Some(Shape::Move { width }),
        "clr" => Some(Shape::Clr { width }),
        "not" => Some(Shape::Not { width }),
        "neg" => Some(Shape::Neg { width }),
        "tst" => Some(Shape::Tst { width }),
        "jmp" => Some(Shape::Jmp),
        "jsr" => Some(Shape::Jsr),
        "dbra" => reg_name(mode).and_then(dn).map(|r| Shape::Dbcc { cond: 0x1, reg: r }),
        "dbcc" => reg_name(mode).and_then(dn).map(|r| Shape::Dbcc { cond: 0x4, reg: r }),
        // `cmp` only ever reads `<ea>,Dn` on real hardware (there is no
        // `cmp Dn,<ea>` form — that's `cmp` with destination-in-memory
        // territory belongs to `cmpm`, which this subset omits).
        "cmp" => mode2.and_then(|m2| reg_name(m2)).and_then(dn).map(|r| Shape::Alu { width, dn_reg: r, to_ea: false }),
        "add" | "sub" | "and" | "or" => {
            if let Some(r) = reg_name(mode).and_then(dn) {
                Some(Shape::Alu { width, dn_reg: r, to_ea: true })
            } else if let Some(r) = mode2.and_then(|m2| reg_name(m2)).and_then(dn) {
                Some(Shape::Alu { width, dn_reg: r, to_ea: false })
            } else {
                None
            }
        }
        // Real EOR only has a `Dn,<ea>` form; `<ea>,Dn` belongs to a
        // different opcode this subset doesn't implement.
        "eor" => reg_name(mode).and_then(dn).map(|r| Shape::Alu { width, dn_reg: r, to_ea: true }),
        // `addq`/`subq` embed their 3-bit immediate directly in the
        // opcode word instead of an extension word; left out of this
        // subset rather than encoded wrong.
        "addi" | "subi" | "andi" | "ori" | "eori" | "cmpi" => Some(Shape::AluImm { width }),
        _ => branch_condition(&m).map(|cond| Shape::Branch { cond }),
    }
}

fn size(instr: &Instruction, _flags: &FlagState, f1: OperandFacts, _f2: OperandFacts) -> Result<Sizing, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let len: u32 = match shape {
        Shape::Implied(_) | Shape::Swap | Shape::ExgDD(..) | Shape::ExgAA(..) | Shape::ExgDA(..) => 2,
        Shape::Moveq | Shape::LinkImm(_) | Shape::UnlkReg(_) | Shape::Dbcc { .. } => 4,
        Shape::TrapImm => 4,
        Shape::Move { width } | Shape::Movea { width } => {
            let ea = ea_shape(&instr.mode, width).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            let dst = instr.mode2.as_ref().and_then(|m| ea_shape(m, width)).ok_or(Kind::MissingOperand)?;
            2 + ea.extra_len + dst.extra_len
        }
        Shape::Lea => {
            let ea = ea_shape(&instr.mode, 4).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            2 + ea.extra_len
        }
        Shape::Clr { width } | Shape::Not { width } | Shape::Neg { width } | Shape::Tst { width } => {
            let ea = ea_shape(&instr.mode, width).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            2 + ea.extra_len
        }
        Shape::Jmp | Shape::Jsr => {
            let ea = ea_shape(&instr.mode, 4).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            2 + ea.extra_len
        }
        Shape::Alu { width, .. } => {
            let ea_side = if matches!(instr.mode, SyntaxMode::Register(ref r) if dn(r).is_some()) {
                instr.mode2.as_ref().unwrap_or(&instr.mode)
            } else {
                &instr.mode
            };
            let ea = ea_shape(ea_side, width).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            2 + ea.extra_len
        }
        Shape::AluImm { width } => {
            let ea = ea_shape(&instr.mode2.clone().unwrap_or(instr.mode.clone()), width)
                .ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
            2 + width.max(2) + ea.extra_len
        }
        Shape::Branch { .. } => {
            // Short (8-bit) displacement if pass 1 can already prove it
            // fits; otherwise commit to the safe 16-bit extension word.
            match f1.constant_value {
                Some(v) => {
                    if crate::target::signed_fits(v, 8) && v != 0 {
                        2
                    } else {
                        4
                    }
                }
                None => 4,
            }
        }
    };
    Ok(Sizing { len, direct_page: false, width: 0 })
}

fn encode(
    instr: &Instruction,
    _flags: &FlagState,
    sizing: Sizing,
    value: Option<i64>,
    value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    let shape = classify(instr).ok_or_else(|| Kind::UnsupportedMode(instr.mnemonic.clone()))?;
    let mut words: Vec<u8> = Vec::new();
    let push16 = |bytes: &mut Vec<u8>, w: u16| bytes.extend_from_slice(&w.to_be_bytes());

    match shape {
        Shape::Implied(op) => push16(&mut words, op),
        Shape::Swap => {
            let r = reg_name(&instr.mode).and_then(dn).ok_or(Kind::MissingOperand)?;
            push16(&mut words, 0x4840 | r as u16);
        }
        Shape::ExgDD(x, y) => push16(&mut words, 0xC140 | ((x as u16) << 9) | y as u16),
        Shape::ExgAA(x, y) => push16(&mut words, 0xC148 | ((x as u16) << 9) | y as u16),
        Shape::ExgDA(d, a) => push16(&mut words, 0xC188 | ((d as u16) << 9) | a as u16),
        Shape::LinkImm(a) => {
            push16(&mut words, 0x4E50 | a as u16);
            let v = value.ok_or(Kind::MissingOperand)?;
            push16(&mut words, v as i16 as u16);
        }
        Shape::UnlkReg(a) => push16(&mut words, 0x4E58 | a as u16),
        Shape::TrapImm => {
            let v = value.ok_or(Kind::MissingOperand)?;
            if instr.mnemonic.eq_ignore_ascii_case("trap") {
                push16(&mut words, 0x4E40 | (v as u16 & 0xF));
            } else {
                push16(&mut words, 0x4E72);
                push16(&mut words, v as u16);
            }
        }
        Shape::Moveq => {
            let r = reg_name(&instr.mode).and_then(dn).ok_or(Kind::MissingOperand)?;
            let v = value2.or(value).ok_or(Kind::MissingOperand)?;
            push16(&mut words, 0x7000 | ((r as u16) << 9) | (v as u8 as u16));
        }
        Shape::Move { width } | Shape::Movea { width } => {
            let src_mode = &instr.mode;
            let dst_mode = instr.mode2.as_ref().ok_or(Kind::MissingOperand)?;
            let src = ea_shape(src_mode, width).ok_or(Kind::MissingOperand)?;
            let dst = ea_shape(dst_mode, width).ok_or(Kind::MissingOperand)?;
            let size_bits: u16 = match width {
                1 => 0b01,
                4 => 0b10,
                _ => 0b11,
            };
            let op = (size_bits << 12)
                | ((dst.reg as u16) << 9)
                | ((dst.mode as u16) << 6)
                | ((src.mode as u16) << 3)
                | src.reg as u16;
            push16(&mut words, op);
            words.extend(ea_extension(src_mode, value, width)?);
            words.extend(ea_extension(dst_mode, value2, width)?);
        }
        Shape::Lea => {
            let a = instr.mode2.as_ref().and_then(reg_name).and_then(an).ok_or(Kind::MissingOperand)?;
            let ea = ea_shape(&instr.mode, 4).ok_or(Kind::MissingOperand)?;
            push16(&mut words, 0x41C0 | ((a as u16) << 9) | ((ea.mode as u16) << 3) | ea.reg as u16);
            words.extend(ea_extension(&instr.mode, value, 4)?);
        }
        Shape::Clr { width } | Shape::Not { width } | Shape::Neg { width } | Shape::Tst { width } => {
            let base: u16 = match instr.mnemonic.to_ascii_lowercase().as_str() {
                "clr" => 0x4200,
                "not" => 0x4600,
                "neg" => 0x4400,
                _ => 0x4A00,
            };
            let ea = ea_shape(&instr.mode, width).ok_or(Kind::MissingOperand)?;
            push16(&mut words, base | ((size_bits_of(width) as u16) << 6) | ((ea.mode as u16) << 3) | ea.reg as u16);
            words.extend(ea_extension(&instr.mode, value, width)?);
        }
        Shape::Jmp | Shape::Jsr => {
            let base: u16 = if matches!(shape, Shape::Jmp) { 0x4EC0 } else { 0x4E80 };
            let ea = ea_shape(&instr.mode, 4).ok_or(Kind::MissingOperand)?;
            push16(&mut words, base | ((ea.mode as u16) << 3) | ea.reg as u16);
            words.extend(ea_extension(&instr.mode, value, 4)?);
        }
        Shape::Dbcc { cond, reg } => {
            push16(&mut words, 0x50C8 | ((cond as u16) << 8) | reg as u16);
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            require_fit(disp, 16)?;
            push16(&mut words, disp as i16 as u16);
        }
        Shape::Alu { width, dn_reg, to_ea } => {
            let ea_side = if to_ea { instr.mode2.as_ref().unwrap_or(&instr.mode) } else { &instr.mode };
            let ea = ea_shape(ea_side, width).ok_or(Kind::MissingOperand)?;
            let mnemonic = instr.mnemonic.to_ascii_lowercase();
            let op = alu_opcode_word(&mnemonic, dn_reg, to_ea, &ea, size_bits_of(width)).ok_or_else(|| Kind::NoEncoding(mnemonic.clone()))?;
            push16(&mut words, op);
            let ea_value = if to_ea { value2.or(value) } else { value };
            words.extend(ea_extension(ea_side, ea_value, width)?);
        }
        Shape::AluImm { width } => {
            let base: u16 = match instr.mnemonic.to_ascii_lowercase().as_str() {
                "addi" => 0x0600,
                "subi" => 0x0400,
                "andi" => 0x0200,
                "ori" => 0x0000,
                "eori" => 0x0A00,
                _ => 0x0C00,
            };
            let target = instr.mode2.clone().unwrap_or_else(|| instr.mode.clone());
            let ea = ea_shape(&target, width).ok_or(Kind::MissingOperand)?;
            push16(&mut words, base | ((size_bits_of(width) as u16) << 6) | ((ea.mode as u16) << 3) | ea.reg as u16);
            let imm = value.ok_or(Kind::MissingOperand)?;
            words.extend(match width {
                1 => vec![0, imm as u8],
                4 => (imm as u32).to_be_bytes().to_vec(),
                _ => (imm as u16).to_be_bytes().to_vec(),
            });
            words.extend(ea_extension(&target, value2, width)?);
        }
        Shape::Branch { cond } => {
            let target = value.ok_or(Kind::MissingOperand)?;
            let disp = target - next_pc;
            if sizing.len == 2 {
                require_fit(disp, 8)?;
                push16(&mut words, 0x6000 | ((cond as u16) << 8) | (disp as i8 as u8 as u16));
            } else {
                push16(&mut words, 0x6000 | ((cond as u16) << 8));
                require_fit(disp, 16)?;
                push16(&mut words, disp as i16 as u16);
            }
        }
    }
    Ok(Encoded::new(words))
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::M68000, endianness: Endianness::Big, size, encode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use crate::target::NO_OPERAND;

    fn instr2(mnemonic: &str, suffix: Option<char>, mode: SyntaxMode, mode2: Option<SyntaxMode>) -> Instruction {
        Instruction { mnemonic: mnemonic.into(), size_suffix: suffix, mode, mode2, loc: Location::builtin() }
    }

    #[test]
    fn moveq_is_one_word() {
        let i = instr2("moveq", None, SyntaxMode::Register("d0".into()), Some(SyntaxMode::Immediate(Expr::Integer(5))));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 4);
        let enc = encode(&i, &FlagState::default(), s, Some(5), None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x70, 0x05]);
    }

    #[test]
    fn move_register_to_register() {
        let i = instr2("move", Some('l'), SyntaxMode::Register("d0".into()), Some(SyntaxMode::Register("d1".into())));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x22, 0x00]);
    }

    #[test]
    fn rts_is_implied() {
        let i = instr2("rts", None, SyntaxMode::Implied, None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x4E, 0x75]);
    }

    #[test]
    fn short_branch_uses_one_extension_byte() {
        let i = instr2("bne", None, SyntaxMode::Absolute(Expr::Symbol("x".into())), None);
        let facts = OperandFacts { constant_value: Some(0x10) };
        let s = size(&i, &FlagState::default(), facts, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x1012), None, 0x1002).unwrap();
        assert_eq!(enc.bytes, vec![0x66, 0x10]);
    }
}
