// Zilog Z80 Descriptor
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

//! The core Z80 byte grid (8/16-bit loads, ALU, rotates/shifts, bit
//! ops, jumps/calls/returns) coincides byte-for-byte with the SM83
//! (§4.I), so this module only overrides the handful of mnemonics where
//! the two diverge (`reti`) and adds the genuine Z80-only instructions:
//! `ex`/`exx`, the block transfer/search/IO instruction groups, `neg`,
//! `im`, and `rld`/`rrd`. `ix`/`iy` displacement addressing (`(ix+d)`)
//! is left out — the parser has no grammar for a register-plus-constant
//! indirect operand (see DESIGN.md).

use crate::ast::{Expr, Instruction, SyntaxMode};
use crate::message::Kind;
use crate::target::sm83;
use crate::target::{Arch, Descriptor, Encoded, Endianness, FlagState, OperandFacts, Sizing};

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

fn reg_name(mode: &SyntaxMode) -> Option<&str> {
    match mode {
        SyntaxMode::Accumulator => Some("a"),
        SyntaxMode::Register(r) => Some(r.as_str()),
        SyntaxMode::Indirect(Expr::Symbol(s)) => Some(s.as_str()),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Simple(&'static [u8]),
    ExDeHl,
    ExSpHl,
    /// `out (n),a` / `in a,(n)`.
    PortImm { out: bool },
    /// `out (c),r` / `in r,(c)`.
    PortC { out: bool, slot: u8 },
    Djnz,
    /// `im 0`/`im 1`/`im 2`.
    Im(u8),
}

fn classify(instr: &Instruction) -> Option<Shape> {
    let m = instr.mnemonic.to_ascii_lowercase();
    let (mode, mode2) = (&instr.mode, instr.mode2.as_ref());
    match m.as_str() {
        "reti" => Some(Shape::Simple(&[0xED, 0x4D])),
        "exx" => Some(Shape::Simple(&[0xD9])),
        "ex" => match (reg_name(mode), mode2.and_then(reg_name)) {
            (Some("de"), Some("hl")) => Some(Shape::ExDeHl),
            _ if matches!(mode, SyntaxMode::Indirect(_)) && reg_name(mode) == Some("sp") && mode2.and_then(reg_name) == Some("hl") => {
                Some(Shape::ExSpHl)
            }
            _ => None,
        },
        "neg" => Some(Shape::Simple(&[0xED, 0x44])),
        "rld" => Some(Shape::Simple(&[0xED, 0x6F])),
        "rrd" => Some(Shape::Simple(&[0xED, 0x67])),
        "djnz" => Some(Shape::Djnz),
        "im" => match mode {
            SyntaxMode::Absolute(Expr::Integer(0)) => Some(Shape::Im(0x46)),
            SyntaxMode::Absolute(Expr::Integer(1)) => Some(Shape::Im(0x56)),
            SyntaxMode::Absolute(Expr::Integer(2)) => Some(Shape::Im(0x5E)),
            _ => None,
        },
        "ldi" => Some(Shape::Simple(&[0xED, 0xA0])),
        "ldir" => Some(Shape::Simple(&[0xED, 0xB0])),
        "ldd" => Some(Shape::Simple(&[0xED, 0xA8])),
        "lddr" => Some(Shape::Simple(&[0xED, 0xB8])),
        "cpi" => Some(Shape::Simple(&[0xED, 0xA1])),
        "cpir" => Some(Shape::Simple(&[0xED, 0xB1])),
        "cpd" => Some(Shape::Simple(&[0xED, 0xA9])),
        "cpdr" => Some(Shape::Simple(&[0xED, 0xB9])),
        "ini" => Some(Shape::Simple(&[0xED, 0xA2])),
        "inir" => Some(Shape::Simple(&[0xED, 0xB2])),
        "ind" => Some(Shape::Simple(&[0xED, 0xAA])),
        "indr" => Some(Shape::Simple(&[0xED, 0xBA])),
        "outi" => Some(Shape::Simple(&[0xED, 0xA3])),
        "otir" => Some(Shape::Simple(&[0xED, 0xB3])),
        "outd" => Some(Shape::Simple(&[0xED, 0xAB])),
        "otdr" => Some(Shape::Simple(&[0xED, 0xBB])),
        "out" => {
            if matches!(mode, SyntaxMode::Indirect(Expr::Symbol(s)) if s == "c") {
                let slot = mode2.and_then(reg_name).and_then(r8)?;
                Some(Shape::PortC { out: true, slot })
            } else if matches!(mode, SyntaxMode::Indirect(_)) {
                Some(Shape::PortImm { out: true })
            } else {
                None
            }
        }
        "in" => {
            if mode2.is_some_and(|m2| matches!(m2, SyntaxMode::Indirect(Expr::Symbol(s)) if s == "c")) {
                let slot = reg_name(mode).and_then(r8)?;
                Some(Shape::PortC { out: false, slot })
            } else if mode2.is_some_and(|m2| matches!(m2, SyntaxMode::Indirect(_))) {
                Some(Shape::PortImm { out: false })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn size(instr: &Instruction, flags: &FlagState, f1: OperandFacts, f2: OperandFacts) -> Result<Sizing, Kind> {
    if let Some(shape) = classify(instr) {
        let len = match shape {
            Shape::Simple(bytes) => bytes.len() as u32,
            Shape::ExDeHl | Shape::ExSpHl => 1,
            Shape::PortC { .. } | Shape::PortImm { .. } | Shape::Djnz | Shape::Im(_) => 2,
        };
        return Ok(Sizing { len, direct_page: false, width: (len - 1) as u8 });
    }
    sm83::size(instr, flags, f1, f2)
}

fn encode(
    instr: &Instruction,
    flags: &FlagState,
    sizing: Sizing,
    value: Option<i64>,
    value2: Option<i64>,
    next_pc: i64,
) -> Result<Encoded, Kind> {
    if let Some(shape) = classify(instr) {
        let mut bytes = Vec::new();
        match shape {
            Shape::Simple(opcodes) => bytes.extend_from_slice(opcodes),
            Shape::ExDeHl => bytes.push(0xEB),
            Shape::ExSpHl => bytes.push(0xE3),
            Shape::PortImm { out } => {
                let v = value.ok_or(Kind::MissingOperand)? as u8;
                if out {
                    bytes.push(0xD3);
                    bytes.push(v);
                } else {
                    bytes.push(0xDB);
                    bytes.push(v);
                }
            }
            Shape::PortC { out, slot } => {
                bytes.push(0xED);
                bytes.push(if out { 0x41 | (slot << 3) } else { 0x40 | (slot << 3) });
            }
            Shape::Djnz => {
                bytes.push(0x10);
                let target = value.ok_or(Kind::MissingOperand)?;
                let disp = target - next_pc;
                crate::target::require_fit(disp, 8)?;
                bytes.push(disp as i8 as u8);
            }
            Shape::Im(opcode2) => {
                bytes.push(0xED);
                bytes.push(opcode2);
            }
        }
        return Ok(Encoded::new(bytes));
    }
    sm83::encode(instr, flags, sizing, value, value2, next_pc)
}

pub fn descriptor() -> Descriptor {
    Descriptor { arch: Arch::Z80, endianness: Endianness::Little, size, encode }
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
    fn shared_load_reuses_sm83_opcode() {
        let i = instr2("ld", SyntaxMode::Register("b".into()), Some(SyntaxMode::Accumulator));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0x47]);
    }

    #[test]
    fn reti_is_two_bytes_not_sm83s_one() {
        let i = instr2("reti", SyntaxMode::Implied, None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xED, 0x4D]);
    }

    #[test]
    fn djnz_is_relative() {
        let i = instr2("djnz", SyntaxMode::Absolute(Expr::Symbol("loop".into())), None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, Some(0x0FF0), None, 0x1000).unwrap();
        assert_eq!(enc.bytes, vec![0x10, 0xF0]);
    }

    #[test]
    fn block_copy_is_fixed_two_bytes() {
        let i = instr2("ldir", SyntaxMode::Implied, None);
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xED, 0xB0]);
    }

    #[test]
    fn out_port_c_uses_register_slot() {
        let i = instr2("out", SyntaxMode::Indirect(Expr::Symbol("c".into())), Some(SyntaxMode::Register("b".into())));
        let s = size(&i, &FlagState::default(), NO_OPERAND, NO_OPERAND).unwrap();
        assert_eq!(s.len, 2);
        let enc = encode(&i, &FlagState::default(), s, None, None, 0).unwrap();
        assert_eq!(enc.bytes, vec![0xED, 0x41]);
    }
}
