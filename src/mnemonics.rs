// Mnemonic Recognition
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

//! The lexer classifies a bare word as `Mnemonic` using the
//! ISA-agnostic union of every supported architecture's mnemonic set
//! (§4.C, step 2); architecture-specificity (is this mnemonic legal
//! *for the selected target*) is enforced later, by `analyze`.

/// 6502 / 65C02 / 6507 / HuC6280 / 65816 (65816 additions marked).
const MOS6502_FAMILY: &[&str] = &[
    "adc", "and", "asl", "bcc", "bcs", "beq", "bit", "bmi", "bne", "bpl", "brk", "bvc", "bvs",
    "clc", "cld", "cli", "clv", "cmp", "cpx", "cpy", "dec", "dex", "dey", "eor", "inc", "inx",
    "iny", "jmp", "jsr", "lda", "ldx", "ldy", "lsr", "nop", "ora", "pha", "php", "pla", "plp",
    "rol", "ror", "rti", "rts", "sbc", "sec", "sed", "sei", "sta", "stx", "sty", "tax", "tay",
    "tsx", "txa", "txs", "tya",
    // 65C02 additions
    "bra", "phx", "phy", "plx", "ply", "stz", "trb", "tsb",
    // 65816 additions
    "brl", "cop", "jml", "jsl", "mvn", "mvp", "pea", "pei", "per", "phb", "phd", "phk", "plb",
    "pld", "rep", "rtl", "sep", "tcd", "tcs", "tdc", "tsc", "txy", "tyx", "wai", "wdm", "xba",
    "xce",
    // HuC6280 additions
    "csl", "csh", "say", "sxy", "tai", "tdd", "tia", "tii", "tin", "st0", "st1", "st2", "cla",
    "clx", "cly", "set",
];

const SM83_FAMILY: &[&str] = &[
    "ld", "ldh", "push", "pop", "add", "adc", "sub", "sbc", "and", "or", "xor", "cp", "inc",
    "dec", "daa", "cpl", "ccf", "scf", "nop", "halt", "stop", "di", "ei", "jp", "jr", "call",
    "ret", "reti", "rst", "rlca", "rla", "rrca", "rra", "rlc", "rl", "rrc", "rr", "sla", "sra",
    "swap", "srl", "bit", "res", "set",
];

const Z80_FAMILY: &[&str] = &[
    "ex", "exx", "ldi", "ldir", "ldd", "lddr", "cpi", "cpir", "cpd", "cpdr", "neg", "im", "rld",
    "rrd", "djnz", "out", "outi", "otir", "outd", "otdr", "in", "ini", "inir", "ind", "indr",
];

const M68000_FAMILY: &[&str] = &[
    "move", "movea", "movem", "movep", "moveq", "lea", "pea", "clr", "exg", "swap", "add",
    "adda", "addi", "addq", "addx", "sub", "suba", "subi", "subq", "subx", "neg", "negx", "and",
    "andi", "or", "ori", "eor", "eori", "not", "asl", "asr", "lsl", "lsr", "rol", "ror", "roxl",
    "roxr", "cmp", "cmpa", "cmpi", "cmpm", "tst", "bra", "bsr", "bcc", "bcs", "beq", "bge", "bgt",
    "bhi", "ble", "bls", "blt", "bmi", "bne", "bpl", "bvc", "bvs", "dbcc", "dbra", "jmp", "jsr",
    "rts", "rtr", "rte", "trap", "trapv", "link", "unlk", "nop", "reset", "stop", "muls", "mulu",
    "divs", "divu", "ext", "tas", "scc", "btst", "bset", "bclr", "bchg",
];

const ARM7_FAMILY: &[&str] = &[
    "mov", "mvn", "add", "adc", "sub", "sbc", "rsb", "rsc", "mul", "mla", "and", "orr", "eor",
    "bic", "cmp", "cmn", "tst", "teq", "ldr", "str", "ldm", "stm", "b", "bl", "bx", "blx", "swi",
    "svc", "mrs", "msr", "swp", "umull", "umlal", "smull", "smlal", "ldrb", "strb", "ldrh",
    "strh", "ldsb", "ldsh",
];

const V30MZ_FAMILY: &[&str] = &[
    "mov", "push", "pop", "xchg", "in", "out", "lea", "lds", "les", "lahf", "sahf", "add", "adc",
    "sub", "sbb", "cmp", "inc", "dec", "and", "or", "xor", "not", "neg", "mul", "imul", "div",
    "idiv", "shl", "shr", "sar", "rol", "ror", "rcl", "rcr", "jmp", "call", "ret", "retf", "je",
    "jne", "jl", "jle", "jg", "jge", "jb", "jbe", "ja", "jae", "loop", "loopz", "loopnz", "int",
    "iret", "cli", "sti", "cld", "std", "hlt", "nop", "rep", "repne", "movs", "cmps", "scas",
    "lods", "stos",
];

const SPC700_FAMILY: &[&str] = &[
    "mov", "adc", "sbc", "cmp", "and", "or", "eor", "inc", "dec", "asl", "lsr", "rol", "ror",
    "xcn", "movw", "incw", "decw", "addw", "subw", "cmpw", "mul", "div", "daa", "das", "bra",
    "beq", "bne", "bcs", "bcc", "bvs", "bvc", "bmi", "bpl", "bbs", "bbc", "cbne", "dbnz", "jmp",
    "call", "pcall", "tcall", "ret", "ret1", "brk", "nop", "sleep", "stop", "set1", "clr1",
    "tset1", "tclr1", "and1", "or1", "eor1", "not1", "mov1", "clrc", "setc", "notc", "clrv",
    "clrp", "setp", "ei", "di", "push", "pop",
];

const ALIASES: &[&str] = &["db", "dw", "dl", "dd", "ds"];

/// Returns true if `word` (already lower-cased, size suffix already
/// stripped by the caller) is in the union of every known mnemonic.
pub fn is_mnemonic(word: &str) -> bool {
    MOS6502_FAMILY.contains(&word)
        || SM83_FAMILY.contains(&word)
        || Z80_FAMILY.contains(&word)
        || M68000_FAMILY.contains(&word)
        || ARM7_FAMILY.contains(&word)
        || V30MZ_FAMILY.contains(&word)
        || SPC700_FAMILY.contains(&word)
        || ALIASES.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_cross_architecture_union() {
        assert!(is_mnemonic("lda"));
        assert!(is_mnemonic("ld"));
        assert!(is_mnemonic("move"));
        assert!(is_mnemonic("mov"));
        assert!(is_mnemonic("tcall"));
    }

    #[test]
    fn rejects_identifiers() {
        assert!(!is_mnemonic("counter"));
        assert!(!is_mnemonic("player_x"));
    }
}
