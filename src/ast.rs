// Abstract Syntax Tree
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

//! The statement and expression trees produced by the parser (§3, §4.D).

use crate::source::Location;

pub type Program = Vec<Stmt>;

#[derive(Clone, Debug, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Low,
    High,
    Bank,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Integer(i64),
    Str(String),
    Char(char),
    /// A plain identifier reference, resolved against the scope stack.
    Symbol(String),
    /// `@name` local-label reference.
    Local(String),
    /// An anonymous-label reference: `+`, `++`, `-`, `+tag`, ...
    Anonymous(crate::token::Anon),
    /// `*` — current PC at the referencing site.
    Pc,
    /// `defined(name)`, synthesized by the parser for `.ifdef`/`.ifndef`
    /// and available to user expressions as well.
    Defined(String),
    Unary(UnaryOp, Box<Expr>, Location),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Location),
    Grouping(Box<Expr>),
}

impl Expr {
    pub fn location_hint(&self) -> Option<&Location> {
        match self {
            Expr::Unary(_, _, loc) | Expr::Binary(_, _, _, loc) => Some(loc),
            _ => None,
        }
    }
}

impl SyntaxMode {
    /// The expression a target descriptor needs to evaluate to produce
    /// this mode's operand bytes, if any (`Implied`/`Accumulator`/bare
    /// register forms carry none).
    pub fn expr(&self) -> Option<&Expr> {
        use SyntaxMode::*;
        match self {
            Implied | Accumulator | Register(_) | RegisterList(_) => None,
            Immediate(e) | Indirect(e) | IndexedIndirect(e) | IndirectIndexed(e)
            | IndirectLong(e) | IndirectLongIndexed(e) | StackRelative(e) | Absolute(e)
            | Indexed(e, _) => Some(e),
            RegisterIndirect(_, e) => e.as_ref(),
        }
    }

    /// The register named in a register-carrying syntax form, if any
    /// (used by the register-based ISAs' `classify` functions).
    pub fn register_name(&self) -> Option<&str> {
        match self {
            SyntaxMode::Register(r) => Some(r.as_str()),
            SyntaxMode::RegisterIndirect(r, _) => Some(r.as_str()),
            _ => None,
        }
    }
}

/// Syntactic addressing mode as classified by the parser for the 65xx
/// family (§4.D); other families carry raw operand text that the
/// target descriptor interprets at analysis time.
#[derive(Clone, Debug, PartialEq)]
pub enum SyntaxMode {
    Implied,
    Accumulator,
    Immediate(Expr),
    Indirect(Expr),
    IndexedIndirect(Expr),   // (e,x)
    IndirectIndexed(Expr),   // (e),y
    IndirectLong(Expr),      // [e]
    IndirectLongIndexed(Expr), // [e],y
    Indexed(Expr, IndexReg),
    StackRelative(Expr),
    Absolute(Expr),
    /// Register-operand syntax used by M68000/Z80/ARM/V30MZ, carried
    /// opaquely until the target descriptor resolves it.
    Register(String),
    RegisterIndirect(String, Option<Expr>),
    RegisterList(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexReg {
    X,
    Y,
    S,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub mnemonic: String,
    pub size_suffix: Option<char>,
    pub mode: SyntaxMode,
    /// Second operand, for the two-operand ISAs (M68000, Z80, ARM,
    /// V30MZ); `None` for accumulator-implicit ISAs (6502 family,
    /// SPC700, SM83) where `mode` is the sole explicit operand.
    pub mode2: Option<SyntaxMode>,
    pub loc: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataWidth {
    Byte,
    Word,
    Long,
    DWord,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DefKind {
    /// `=` / `.define` / `.equ` — one-shot; redefinition is an error.
    Define,
    /// `.set` — may be redefined.
    Set,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Label { name: String, loc: Location },
    LocalLabel { name: String, loc: Location },
    AnonymousLabel { anon: crate::token::Anon, loc: Location },

    Instruction(Instruction),

    Assignment { name: String, value: Expr, kind: DefKind, loc: Location },

    /// A data-emitting directive: `.byte`/`.word`/`.long`/`.dword`.
    Data { width: DataWidth, values: Vec<DataItem>, loc: Location },

    Org { address: Expr, space: Option<String>, loc: Location },
    Align { boundary: Expr, loc: Location },
    Pad { address: Expr, fill: Option<Expr>, loc: Location },
    Fill { count: Expr, value: Option<Expr>, loc: Location },

    IncludeBinary { path: String, offset: Option<Expr>, length: Option<Expr>, loc: Location },

    /// Every other, simpler directive: `.assert`, `.error`, `.warning`,
    /// CPU-state and platform-header directives, target selectors.
    Directive { name: String, args: Vec<Expr>, loc: Location },

    MacroDefinition(MacroDef),
    MacroInvocation { name: String, args: Vec<Expr>, loc: Location },

    If { arms: Vec<(Expr, Vec<Stmt>)>, else_body: Option<Vec<Stmt>>, loc: Location },
    Repeat { count: Expr, body: Vec<Stmt>, loc: Location },
    Enum { start: Expr, members: Vec<String>, loc: Location },

    Scope { body: Vec<Stmt>, loc: Location },
    Proc { name: String, body: Vec<Stmt>, loc: Location },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataItem {
    Expr(Expr),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacroParam {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<MacroParam>,
    pub body: Vec<Stmt>,
    pub loc: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_equality() {
        assert_eq!(Expr::Integer(1), Expr::Integer(1));
        assert_ne!(Expr::Integer(1), Expr::Integer(2));
    }
}
