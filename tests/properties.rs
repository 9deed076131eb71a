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

//! Bounded property-style checks (§8 "property tests"): a fixed seed
//! list of expression trees checked against a reference `i64`
//! computation, and macro-hygiene stress cases with several concurrent
//! expansions of a recursive macro.

use poppy::ast::{BinaryOp, Expr, UnaryOp};
use poppy::compiler::{compile, CompileOptions};
use poppy::eval::{eval, EvalContext, EvalMode, MapContext, NullContext};
use poppy::source::{Location, SourceRegistry};
use poppy::symbol::AddressSpace;

fn int(n: i64) -> Expr {
    Expr::Integer(n)
}

fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary(op, Box::new(l), Box::new(r), Location::builtin())
}

fn un(op: UnaryOp, e: Expr) -> Expr {
    Expr::Unary(op, Box::new(e), Location::builtin())
}

/// A small fixed seed list of expression trees, each paired with the
/// `i64` value a reference evaluator (plain Rust arithmetic) would
/// produce — the trees are built by hand so this file has no
/// dependency on randomness, which the workflow running this would
/// never be able to reproduce deterministically.
fn seed_trees() -> Vec<(Expr, i64)> {
    vec![
        (bin(BinaryOp::Add, int(2), int(3)), 5),
        (bin(BinaryOp::Mul, int(6), int(7)), 42),
        (bin(BinaryOp::Sub, int(0), int(1)), -1),
        (un(UnaryOp::Neg, int(5)), -5),
        (bin(BinaryOp::Shl, int(1), int(8)), 256),
        (bin(BinaryOp::Shr, int(256), int(4)), 16),
        (bin(BinaryOp::BitAnd, int(0xFF), int(0x0F)), 0x0F),
        (bin(BinaryOp::BitOr, int(0xF0), int(0x0F)), 0xFF),
        (bin(BinaryOp::BitXor, int(0xFF), int(0x0F)), 0xF0),
        (un(UnaryOp::Low, int(0x1234)), 0x34),
        (un(UnaryOp::High, int(0x1234)), 0x12),
        (un(UnaryOp::Bank, int(0x7e1234)), 0x7e),
        (
            bin(BinaryOp::Add, bin(BinaryOp::Mul, int(4), int(4)), bin(BinaryOp::Div, int(9), int(3))),
            19,
        ),
        (bin(BinaryOp::Eq, int(3), int(3)), 1),
        (bin(BinaryOp::Ne, int(3), int(4)), 1),
        (bin(BinaryOp::Lt, int(1), int(2)), 1),
        (bin(BinaryOp::Ge, int(2), int(2)), 1),
        (bin(BinaryOp::And, int(1), int(0)), 0),
        (bin(BinaryOp::Or, int(0), int(1)), 1),
        (un(UnaryOp::Not, int(0)), 1),
        (un(UnaryOp::BitNot, int(0)), -1),
    ]
}

#[test]
fn expression_trees_match_reference_evaluation() {
    let ctx = NullContext;
    for (expr, expected) in seed_trees() {
        let got = eval(&expr, EvalMode::Final, &ctx).unwrap_or_else(|e| panic!("{expr:?}: {e}"));
        assert_eq!(got, expected, "mismatch for {expr:?}");
    }
}

#[test]
fn division_and_remainder_truncate_toward_zero() {
    let ctx = NullContext;
    let seven_div_neg_two = bin(BinaryOp::Div, int(7), int(-2));
    assert_eq!(eval(&seven_div_neg_two, EvalMode::Final, &ctx).unwrap(), -3);
    let neg_seven_div_two = bin(BinaryOp::Div, int(-7), int(2));
    assert_eq!(eval(&neg_seven_div_two, EvalMode::Final, &ctx).unwrap(), -3);
}

#[test]
fn division_by_zero_is_an_eval_error() {
    let ctx = NullContext;
    let expr = bin(BinaryOp::Div, int(1), int(0));
    assert!(eval(&expr, EvalMode::Final, &ctx).is_err());
}

#[test]
fn constant_only_mode_rejects_forward_references() {
    let ctx = MapContext::new();
    let expr = Expr::Symbol("not_yet_defined".into());
    assert!(eval(&expr, EvalMode::ConstantOnly, &ctx).is_err());
}

#[test]
fn map_context_resolves_defined_symbols() {
    let mut ctx = MapContext::new();
    ctx.set("width", 4);
    let expr = bin(BinaryOp::Mul, Expr::Symbol("width".into()), int(2));
    assert_eq!(eval(&expr, EvalMode::Final, &ctx).unwrap(), 8);
    assert!(ctx.is_defined("width"));
    assert!(!ctx.is_defined("height"));
}

fn assemble(text: &str) -> poppy::compiler::CompileResult {
    let mut sources = SourceRegistry::new();
    let file = sources.add_text("props.pasm", text.to_string());
    compile(sources, file, &CompileOptions::default())
}

/// Five concurrent expansions of a recursive macro: each invocation's
/// `@l` must resolve to its own address, never colliding with a
/// sibling expansion's (§8 "macro-local hygiene").
#[test]
fn five_sequential_macro_expansions_do_not_collide() {
    let result = assemble(
        ".arch 6502\n\
         .macro spin n\n\
         \x20 ldx #n\n\
         @l:\n\
         \x20 dex\n\
         \x20 bne @l\n\
         .endmacro\n\
         .org $8000\n\
         \x20 @spin 1\n\
         \x20 @spin 2\n\
         \x20 @spin 3\n\
         \x20 @spin 4\n\
         \x20 @spin 5\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    let bytes = result.images.get(&AddressSpace::default()).expect("one image");
    // Each expansion is `ldx #n` (2 bytes) + `dex` (1) + `bne rel` (2) = 5 bytes.
    assert_eq!(bytes.len(), 25);
    for i in 0..5 {
        let base = i * 5;
        assert_eq!(bytes[base], 0xa2, "ldx opcode at expansion {i}");
        assert_eq!(bytes[base + 1], (i + 1) as u8, "ldx operand at expansion {i}");
        assert_eq!(bytes[base + 2], 0xca, "dex opcode at expansion {i}");
        assert_eq!(bytes[base + 3], 0xd0, "bne opcode at expansion {i}");
        assert_eq!(bytes[base + 4], (-3i8) as u8, "bne displacement at expansion {i}, branches back to its own dex");
    }
}

#[test]
fn recursive_macro_with_nested_call_keeps_labels_distinct() {
    let result = assemble(
        ".arch 6502\n\
         .macro twice n\n\
         \x20 ldx #n\n\
         @l:\n\
         \x20 dex\n\
         \x20 bne @l\n\
         .endmacro\n\
         .org $8000\n\
         \x20 @twice 7\n\
         \x20 @twice 7\n",
    );
    assert!(!result.has_errors(), "{}", result.diagnostics.render(&result.sources));
    let bytes = result.images.get(&AddressSpace::default()).expect("one image");
    assert_eq!(bytes.len(), 10);
    assert_eq!(&bytes[0..5], &bytes[5..10], "identical-argument expansions still emit identical bytes");
}
