// Expression Evaluator
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

//! Evaluates an [`Expr`] to a 64-bit two's-complement value (§4.H).
//! Division and remainder truncate toward zero; division or remainder
//! by zero is [`Kind::DivisionByZero`]. `<`, `>`, `^` extract the low
//! byte, high byte, and bank byte of their operand. `*` reads the
//! context's current program counter.
//!
//! In [`EvalMode::ConstantOnly`], any reference to a symbol whose
//! value is not yet known (forward reference) is [`Kind::NotConstant`]
//! rather than a deferred placeholder; this mode is used by `.assert`,
//! `.if`, and `.rept` counts, which must resolve during expansion or
//! at the end of pass 1.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::message::Kind;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EvalMode {
    /// Forward references and unresolved symbols are errors.
    ConstantOnly,
    /// Used during code generation, after every symbol has a value.
    Final,
}

/// Supplies symbol values and the current program counter to the
/// evaluator. Implemented by the symbol table during analysis/codegen,
/// and by small in-memory maps during macro/conditional expansion.
pub trait EvalContext {
    fn lookup(&self, name: &str) -> Option<i64>;
    fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
    fn pc(&self) -> Option<i64> {
        None
    }
    fn lookup_local(&self, name: &str) -> Option<i64> {
        self.lookup(name)
    }
    fn lookup_anonymous(&self, _anon: &crate::token::Anon) -> Option<i64> {
        None
    }
}

/// A context with nothing defined; used where evaluation should only
/// ever see literals (e.g. a macro body before any symbol exists).
pub struct NullContext;

impl EvalContext for NullContext {}

/// A flat constant environment, used by the macro/conditional expander
/// to track `.define`/`.set` values seen so far in file order.
#[derive(Default)]
pub struct MapContext {
    values: HashMap<String, i64>,
}

impl MapContext {
    pub fn new() -> Self {
        MapContext::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.values.insert(name.into(), value);
    }
}

impl EvalContext for MapContext {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

pub fn eval(expr: &Expr, mode: EvalMode, ctx: &dyn EvalContext) -> Result<i64, Kind> {
    match expr {
        Expr::Integer(n) => Ok(*n),
        Expr::Char(c) => Ok(*c as i64),
        Expr::Str(_) => Err(Kind::TypeMismatch("string literal used where a number is required".into())),
        Expr::Symbol(name) => resolve(name, ctx.lookup(name), mode),
        Expr::Local(name) => resolve(name, ctx.lookup_local(name), mode),
        Expr::Anonymous(anon) => match ctx.lookup_anonymous(anon) {
            Some(v) => Ok(v),
            None if mode == EvalMode::ConstantOnly => Err(Kind::NotConstant),
            None => Err(Kind::NoAnonymousTarget),
        },
        Expr::Pc => match ctx.pc() {
            Some(v) => Ok(v),
            None if mode == EvalMode::ConstantOnly => Err(Kind::NotConstant),
            None => Err(Kind::Internal("program counter unavailable".into())),
        },
        Expr::Defined(name) => Ok(if ctx.is_defined(name) { 1 } else { 0 }),
        Expr::Grouping(inner) => eval(inner, mode, ctx),
        Expr::Unary(op, inner, _loc) => {
            let v = eval(inner, mode, ctx)?;
            Ok(match op {
                UnaryOp::Neg => v.wrapping_neg(),
                UnaryOp::Not => {
                    if v == 0 {
                        1
                    } else {
                        0
                    }
                }
                UnaryOp::BitNot => !v,
                UnaryOp::Low => v & 0xff,
                UnaryOp::High => (v >> 8) & 0xff,
                UnaryOp::Bank => (v >> 16) & 0xff,
            })
        }
        Expr::Binary(op, l, r, _loc) => {
            let a = eval(l, mode, ctx)?;
            match op {
                BinaryOp::And => {
                    if a == 0 {
                        return Ok(0);
                    }
                    let b = eval(r, mode, ctx)?;
                    return Ok(if b != 0 { 1 } else { 0 });
                }
                BinaryOp::Or => {
                    if a != 0 {
                        return Ok(1);
                    }
                    let b = eval(r, mode, ctx)?;
                    return Ok(if b != 0 { 1 } else { 0 });
                }
                _ => {}
            }
            let b = eval(r, mode, ctx)?;
            Ok(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(Kind::DivisionByZero);
                    }
                    a.wrapping_div(b)
                }
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                BinaryOp::BitXor => a ^ b,
                BinaryOp::Shl => a.wrapping_shl(b as u32 & 63),
                BinaryOp::Shr => ((a as u64) >> (b as u32 & 63)) as i64,
                BinaryOp::Eq => bool_to_i64(a == b),
                BinaryOp::Ne => bool_to_i64(a != b),
                BinaryOp::Lt => bool_to_i64(a < b),
                BinaryOp::Le => bool_to_i64(a <= b),
                BinaryOp::Gt => bool_to_i64(a > b),
                BinaryOp::Ge => bool_to_i64(a >= b),
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            })
        }
    }
}

fn resolve(name: &str, found: Option<i64>, mode: EvalMode) -> Result<i64, Kind> {
    match found {
        Some(v) => Ok(v),
        None if mode == EvalMode::ConstantOnly => Err(Kind::NotConstant),
        None => Err(Kind::UndefinedSymbol(name.to_string())),
    }
}

fn bool_to_i64(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> Expr {
        use crate::lexer::{resolve_locations, Lexer};
        use crate::parser::Parser;
        use crate::source::SourceRegistry;
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", format!(".byte {s}\n"));
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        let (prog, diags) = Parser::new(&tokens).parse();
        assert!(!diags.has_errors());
        match &prog[0] {
            crate::ast::Stmt::Data { values, .. } => match &values[0] {
                crate::ast::DataItem::Expr(e) => e.clone(),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval(&e("1+2*3"), EvalMode::Final, &NullContext), Ok(7));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(eval(&e("-7/2"), EvalMode::Final, &NullContext), Ok(-3));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval(&e("1/0"), EvalMode::Final, &NullContext), Err(Kind::DivisionByZero));
    }

    #[test]
    fn byte_extractors() {
        assert_eq!(eval(&e("<$1234"), EvalMode::Final, &NullContext), Ok(0x34));
        assert_eq!(eval(&e(">$1234"), EvalMode::Final, &NullContext), Ok(0x12));
        assert_eq!(eval(&e("^$012345"), EvalMode::Final, &NullContext), Ok(0x01));
    }

    #[test]
    fn undefined_symbol_in_final_mode_is_an_error() {
        assert_eq!(eval(&e("missing"), EvalMode::Final, &NullContext), Err(Kind::UndefinedSymbol("missing".into())));
    }

    #[test]
    fn forward_reference_in_constant_mode_is_not_constant() {
        assert_eq!(eval(&e("missing"), EvalMode::ConstantOnly, &NullContext), Err(Kind::NotConstant));
    }

    #[test]
    fn symbol_resolves_via_context() {
        let mut ctx = MapContext::new();
        ctx.set("base", 0x8000);
        assert_eq!(eval(&e("base+1"), EvalMode::Final, &ctx), Ok(0x8001));
    }

    #[test]
    fn short_circuit_and_or() {
        assert_eq!(eval(&e("0 && missing"), EvalMode::Final, &NullContext), Ok(0));
        assert_eq!(eval(&e("1 || missing"), EvalMode::Final, &NullContext), Ok(1));
    }

    #[test]
    fn defined_checks_context() {
        let mut ctx = MapContext::new();
        ctx.set("flag", 1);
        assert_eq!(eval(&Expr::Defined("flag".into()), EvalMode::Final, &ctx), Ok(1));
        assert_eq!(eval(&Expr::Defined("nope".into()), EvalMode::Final, &ctx), Ok(0));
    }
}
