// Macro and Conditional Expansion
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

//! Rewrites the parsed statement tree into one with every `.macro`
//! definition, `@name` invocation, `.if`/`.rept`/`.enum` resolved away
//! (§4.E). Expansion works on the AST, not on raw tokens: a macro body
//! is a `Vec<Stmt>` captured at definition time, and expansion
//! substitutes `Expr::Symbol`/`Expr::Local` references to parameter
//! names wherever they occur, then re-emits the body as ordinary
//! statements at the call site.

use std::collections::HashMap;

use crate::ast::*;
use crate::eval::{self, EvalMode};
use crate::message::{Diagnostics, Kind};
use crate::source::Location;

const DEFAULT_MAX_DEPTH: usize = 256;

pub struct Expander {
    max_depth: usize,
    macros: HashMap<String, MacroDef>,
    hygiene_counter: u32,
    consts: eval::MapContext,
}

impl Expander {
    pub fn new() -> Self {
        Expander {
            max_depth: DEFAULT_MAX_DEPTH,
            macros: HashMap::new(),
            hygiene_counter: 0,
            consts: eval::MapContext::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn expand(&mut self, program: Program) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        self.collect_macros(&program, &mut diags);
        let out = self.expand_block(&program, 0, &mut diags);
        (out, diags)
    }

    /// Macro definitions are visible throughout the whole file,
    /// regardless of where `.macro` textually appears, matching the
    /// "defined once, callable anywhere" model of §4.E.
    fn collect_macros(&mut self, stmts: &[Stmt], diags: &mut Diagnostics) {
        for stmt in stmts {
            if let Stmt::MacroDefinition(def) = stmt {
                if self.macros.contains_key(&def.name) {
                    diags.push(def.loc.clone(), Kind::DuplicateSymbol(def.name.clone()));
                } else {
                    self.macros.insert(def.name.clone(), def.clone());
                }
                // Nested `.macro` definitions are not descended into:
                // bodies are expanded lazily, at call time.
            } else {
                for_each_body(stmt, |body| self.collect_macros(body, diags));
            }
        }
    }

    fn expand_block(&mut self, stmts: &[Stmt], depth: usize, diags: &mut Diagnostics) -> Vec<Stmt> {
        let mut out = Vec::new();
        for stmt in stmts {
            self.expand_stmt(stmt, depth, diags, &mut out);
        }
        out
    }

    fn expand_stmt(&mut self, stmt: &Stmt, depth: usize, diags: &mut Diagnostics, out: &mut Vec<Stmt>) {
        match stmt {
            Stmt::MacroDefinition(_) => {
                // Definitions produce no code at their own site.
            }
            Stmt::MacroInvocation { name, args, loc } => {
                self.expand_call(name, args, loc, depth, diags, out);
            }
            Stmt::If { arms, else_body, loc } => {
                self.expand_if(arms, else_body.as_deref(), loc, depth, diags, out);
            }
            Stmt::Repeat { count, body, loc } => {
                self.expand_rept(count, body, loc, depth, diags, out);
            }
            Stmt::Scope { body, loc } => {
                let body = self.expand_block(body, depth, diags);
                out.push(Stmt::Scope { body, loc: loc.clone() });
            }
            Stmt::Proc { name, body, loc } => {
                let body = self.expand_block(body, depth, diags);
                out.push(Stmt::Proc { name: name.clone(), body, loc: loc.clone() });
            }
            Stmt::Enum { start, members, loc } => {
                self.expand_enum(start, members, loc, diags, out);
            }
            Stmt::Assignment { name, value, kind, loc } => {
                if let Ok(v) = eval::eval(value, EvalMode::ConstantOnly, &self.consts) {
                    self.consts.set(name.clone(), v);
                }
                out.push(Stmt::Assignment {
                    name: name.clone(),
                    value: value.clone(),
                    kind: kind.clone(),
                    loc: loc.clone(),
                });
            }
            other => out.push(other.clone()),
        }
    }

    fn expand_call(
        &mut self,
        name: &str,
        args: &[Expr],
        loc: &Location,
        depth: usize,
        diags: &mut Diagnostics,
        out: &mut Vec<Stmt>,
    ) {
        if depth >= self.max_depth {
            diags.push(loc.clone(), Kind::MacroTooDeep(self.max_depth));
            return;
        }
        let Some(def) = self.macros.get(name).cloned() else {
            diags.push(loc.clone(), Kind::UnknownMacro(name.to_string()));
            return;
        };
        if args.len() > def.params.len() {
            diags.push(loc.clone(), Kind::MacroArity(name.to_string(), def.params.len(), args.len()));
            return;
        }

        let mut bindings = HashMap::new();
        for (i, param) in def.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(e) => e.clone(),
                None => match &param.default {
                    Some(d) => d.clone(),
                    None => {
                        diags.push(loc.clone(), Kind::MacroArity(name.to_string(), def.params.len(), args.len()));
                        return;
                    }
                },
            };
            bindings.insert(param.name.clone(), value);
        }

        self.hygiene_counter += 1;
        let suffix = self.hygiene_counter;

        let body = substitute_block(&def.body, &bindings, suffix, loc);
        let expanded = self.expand_block(&body, depth + 1, diags);
        out.extend(expanded);
    }

    /// `.enum start … .ende` makes a contiguous run of constants, one
    /// per bare member name, beginning at `start` and counting up by
    /// one per line (§4.E).
    fn expand_enum(&mut self, start: &Expr, members: &[String], loc: &Location, diags: &mut Diagnostics, out: &mut Vec<Stmt>) {
        let mut value = match eval::eval(start, EvalMode::ConstantOnly, &self.consts) {
            Ok(v) => v,
            Err(kind) => {
                diags.push(loc.clone(), kind);
                return;
            }
        };
        for name in members {
            self.consts.set(name.clone(), value);
            out.push(Stmt::Assignment {
                name: name.clone(),
                value: Expr::Integer(value),
                kind: DefKind::Define,
                loc: loc.clone(),
            });
            value += 1;
        }
    }

    fn expand_if(
        &mut self,
        arms: &[(Expr, Vec<Stmt>)],
        else_body: Option<&[Stmt]>,
        loc: &Location,
        depth: usize,
        diags: &mut Diagnostics,
        out: &mut Vec<Stmt>,
    ) {
        for (cond, body) in arms {
            match eval::eval(cond, EvalMode::ConstantOnly, &self.consts) {
                Ok(v) => {
                    if v != 0 {
                        let expanded = self.expand_block(body, depth, diags);
                        out.extend(expanded);
                        return;
                    }
                }
                Err(kind) => {
                    diags.push(cond.location_hint().cloned().unwrap_or_else(|| loc.clone()), kind);
                    return;
                }
            }
        }
        if let Some(body) = else_body {
            let expanded = self.expand_block(body, depth, diags);
            out.extend(expanded);
        }
    }

    fn expand_rept(
        &mut self,
        count: &Expr,
        body: &[Stmt],
        loc: &Location,
        depth: usize,
        diags: &mut Diagnostics,
        out: &mut Vec<Stmt>,
    ) {
        let n = match eval::eval(count, EvalMode::ConstantOnly, &self.consts) {
            Ok(v) => v,
            Err(kind) => {
                diags.push(loc.clone(), kind);
                return;
            }
        };
        if n < 0 {
            diags.push(loc.clone(), Kind::TypeMismatch(".rept count must not be negative".into()));
            return;
        }
        for _ in 0..n {
            let expanded = self.expand_block(body, depth, diags);
            out.extend(expanded);
        }
    }
}

impl Default for Expander {
    fn default() -> Self {
        Expander::new()
    }
}

/// Calls `f` with every nested statement body a statement owns, so
/// callers can recurse into macro definitions that live inside
/// `.scope`/`.proc`/`.if`/`.rept` blocks without duplicating the match.
fn for_each_body<'a>(stmt: &'a Stmt, mut f: impl FnMut(&'a [Stmt])) {
    match stmt {
        Stmt::If { arms, else_body, .. } => {
            for (_, body) in arms {
                f(body);
            }
            if let Some(body) = else_body {
                f(body);
            }
        }
        Stmt::Repeat { body, .. } | Stmt::Scope { body, .. } | Stmt::Proc { body, .. } => f(body),
        _ => {}
    }
}

fn substitute_block(body: &[Stmt], bindings: &HashMap<String, Expr>, suffix: u32, call_site: &Location) -> Vec<Stmt> {
    body.iter().map(|s| substitute_stmt(s, bindings, suffix, call_site)).collect()
}

fn substitute_stmt(stmt: &Stmt, bindings: &HashMap<String, Expr>, suffix: u32, call_site: &Location) -> Stmt {
    let rewrite_loc = |loc: &Location| loc.expanded_from(call_site.clone());
    match stmt {
        Stmt::Label { name, loc } => Stmt::Label { name: name.clone(), loc: rewrite_loc(loc) },
        Stmt::LocalLabel { name, loc } => {
            Stmt::LocalLabel { name: hygienic(name, suffix), loc: rewrite_loc(loc) }
        }
        Stmt::AnonymousLabel { anon, loc } => Stmt::AnonymousLabel { anon: anon.clone(), loc: rewrite_loc(loc) },
        Stmt::Instruction(i) => Stmt::Instruction(Instruction {
            mnemonic: i.mnemonic.clone(),
            size_suffix: i.size_suffix,
            mode: substitute_mode(&i.mode, bindings, suffix),
            mode2: i.mode2.as_ref().map(|m| substitute_mode(m, bindings, suffix)),
            loc: rewrite_loc(&i.loc),
        }),
        Stmt::Assignment { name, value, kind, loc } => Stmt::Assignment {
            name: name.clone(),
            value: substitute_expr(value, bindings, suffix),
            kind: kind.clone(),
            loc: rewrite_loc(loc),
        },
        Stmt::Data { width, values, loc } => Stmt::Data {
            width: width.clone(),
            values: values
                .iter()
                .map(|item| match item {
                    DataItem::Expr(e) => DataItem::Expr(substitute_expr(e, bindings, suffix)),
                    DataItem::Str(s) => DataItem::Str(s.clone()),
                })
                .collect(),
            loc: rewrite_loc(loc),
        },
        Stmt::Org { address, space, loc } => Stmt::Org {
            address: substitute_expr(address, bindings, suffix),
            space: space.clone(),
            loc: rewrite_loc(loc),
        },
        Stmt::Align { boundary, loc } => {
            Stmt::Align { boundary: substitute_expr(boundary, bindings, suffix), loc: rewrite_loc(loc) }
        }
        Stmt::Pad { address, fill, loc } => Stmt::Pad {
            address: substitute_expr(address, bindings, suffix),
            fill: fill.as_ref().map(|e| substitute_expr(e, bindings, suffix)),
            loc: rewrite_loc(loc),
        },
        Stmt::Fill { count, value, loc } => Stmt::Fill {
            count: substitute_expr(count, bindings, suffix),
            value: value.as_ref().map(|e| substitute_expr(e, bindings, suffix)),
            loc: rewrite_loc(loc),
        },
        Stmt::IncludeBinary { path, offset, length, loc } => Stmt::IncludeBinary {
            path: path.clone(),
            offset: offset.as_ref().map(|e| substitute_expr(e, bindings, suffix)),
            length: length.as_ref().map(|e| substitute_expr(e, bindings, suffix)),
            loc: rewrite_loc(loc),
        },
        Stmt::Directive { name, args, loc } => Stmt::Directive {
            name: name.clone(),
            args: args.iter().map(|e| substitute_expr(e, bindings, suffix)).collect(),
            loc: rewrite_loc(loc),
        },
        Stmt::MacroDefinition(def) => Stmt::MacroDefinition(def.clone()),
        Stmt::MacroInvocation { name, args, loc } => Stmt::MacroInvocation {
            name: name.clone(),
            args: args.iter().map(|e| substitute_expr(e, bindings, suffix)).collect(),
            loc: rewrite_loc(loc),
        },
        Stmt::If { arms, else_body, loc } => Stmt::If {
            arms: arms
                .iter()
                .map(|(c, b)| (substitute_expr(c, bindings, suffix), substitute_block(b, bindings, suffix, call_site)))
                .collect(),
            else_body: else_body.as_ref().map(|b| substitute_block(b, bindings, suffix, call_site)),
            loc: rewrite_loc(loc),
        },
        Stmt::Repeat { count, body, loc } => Stmt::Repeat {
            count: substitute_expr(count, bindings, suffix),
            body: substitute_block(body, bindings, suffix, call_site),
            loc: rewrite_loc(loc),
        },
        Stmt::Enum { start, members, loc } => Stmt::Enum {
            start: substitute_expr(start, bindings, suffix),
            members: members.clone(),
            loc: rewrite_loc(loc),
        },
        Stmt::Scope { body, loc } => {
            Stmt::Scope { body: substitute_block(body, bindings, suffix, call_site), loc: rewrite_loc(loc) }
        }
        Stmt::Proc { name, body, loc } => Stmt::Proc {
            name: name.clone(),
            body: substitute_block(body, bindings, suffix, call_site),
            loc: rewrite_loc(loc),
        },
    }
}

fn substitute_mode(mode: &SyntaxMode, bindings: &HashMap<String, Expr>, suffix: u32) -> SyntaxMode {
    use SyntaxMode::*;
    match mode {
        Implied => Implied,
        Accumulator => Accumulator,
        Immediate(e) => Immediate(substitute_expr(e, bindings, suffix)),
        Indirect(e) => Indirect(substitute_expr(e, bindings, suffix)),
        IndexedIndirect(e) => IndexedIndirect(substitute_expr(e, bindings, suffix)),
        IndirectIndexed(e) => IndirectIndexed(substitute_expr(e, bindings, suffix)),
        IndirectLong(e) => IndirectLong(substitute_expr(e, bindings, suffix)),
        IndirectLongIndexed(e) => IndirectLongIndexed(substitute_expr(e, bindings, suffix)),
        Indexed(e, r) => Indexed(substitute_expr(e, bindings, suffix), *r),
        StackRelative(e) => StackRelative(substitute_expr(e, bindings, suffix)),
        Absolute(e) => Absolute(substitute_expr(e, bindings, suffix)),
        Register(r) => Register(r.clone()),
        RegisterIndirect(r, e) => RegisterIndirect(r.clone(), e.as_ref().map(|e| substitute_expr(e, bindings, suffix))),
        RegisterList(rs) => RegisterList(rs.clone()),
    }
}

/// Substitutes parameter references and applies `@name` hygiene:
/// every local label/reference inside a macro body is renamed with a
/// per-expansion suffix so that two calls to the same macro never
/// collide, matching §4.E's hygiene requirement.
fn substitute_expr(expr: &Expr, bindings: &HashMap<String, Expr>, suffix: u32) -> Expr {
    match expr {
        Expr::Symbol(name) => bindings.get(name).cloned().unwrap_or_else(|| Expr::Symbol(name.clone())),
        Expr::Local(name) => {
            if let Some(e) = bindings.get(name) {
                e.clone()
            } else {
                Expr::Local(hygienic(name, suffix))
            }
        }
        Expr::Unary(op, inner, loc) => {
            Expr::Unary(op.clone(), Box::new(substitute_expr(inner, bindings, suffix)), loc.clone())
        }
        Expr::Binary(op, l, r, loc) => Expr::Binary(
            op.clone(),
            Box::new(substitute_expr(l, bindings, suffix)),
            Box::new(substitute_expr(r, bindings, suffix)),
            loc.clone(),
        ),
        Expr::Grouping(inner) => Expr::Grouping(Box::new(substitute_expr(inner, bindings, suffix))),
        other => other.clone(),
    }
}

fn hygienic(name: &str, suffix: u32) -> String {
    format!("{name}__{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{resolve_locations, Lexer};
    use crate::parser::Parser;
    use crate::source::SourceRegistry;

    fn expand(src: &str) -> (Program, Diagnostics) {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", src.to_string());
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        let (prog, pdiags) = Parser::new(&tokens).parse();
        assert!(!pdiags.has_errors(), "{:?}", pdiags.into_vec());
        let mut expander = Expander::new();
        expander.expand(prog)
    }

    #[test]
    fn expands_simple_macro() {
        let (prog, diags) = expand(".macro poke a, v\nlda #v\nsta a\n.endmacro\n@poke $10, 5\n");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        assert_eq!(prog.len(), 2);
        assert!(matches!(&prog[0], Stmt::Instruction(i) if i.mnemonic == "lda"));
        assert!(matches!(&prog[1], Stmt::Instruction(i) if i.mnemonic == "sta"));
    }

    #[test]
    fn macro_local_labels_are_hygienic_per_call() {
        let (prog, diags) = expand(
            ".macro wait\n@l:\nbne @l\n.endmacro\n@wait\n@wait\n",
        );
        assert!(!diags.has_errors());
        let names: Vec<_> = prog
            .iter()
            .filter_map(|s| match s {
                Stmt::LocalLabel { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn unknown_macro_is_an_error() {
        let (_prog, diags) = expand("@nope 1\n");
        assert!(diags.has_errors());
    }

    #[test]
    fn macro_default_argument_is_used_when_omitted() {
        let (prog, diags) = expand(".macro delay n=3\nldx #n\n.endmacro\n@delay\n");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        assert!(matches!(&prog[0], Stmt::Instruction(i) if i.mnemonic == "ldx"));
    }

    #[test]
    fn if_selects_taken_branch_only() {
        let (prog, diags) = expand(".if 0\nnop\n.else\nrts\n.endif\n");
        assert!(!diags.has_errors());
        assert_eq!(prog.len(), 1);
        assert!(matches!(&prog[0], Stmt::Instruction(i) if i.mnemonic == "rts"));
    }

    #[test]
    fn rept_repeats_body() {
        let (prog, diags) = expand(".rept 3\nnop\n.endr\n");
        assert!(!diags.has_errors());
        assert_eq!(prog.len(), 3);
    }

    #[test]
    fn enum_assigns_increasing_constants() {
        let (prog, diags) = expand(".enum 10\nfoo\nbar\nbaz\n.ende\n");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        assert_eq!(prog.len(), 3);
        let values: Vec<_> = prog
            .iter()
            .map(|s| match s {
                Stmt::Assignment { name, value: Expr::Integer(v), .. } => (name.clone(), *v),
                _ => panic!("expected assignment, got {s:?}"),
            })
            .collect();
        assert_eq!(values, vec![("foo".into(), 10), ("bar".into(), 11), ("baz".into(), 12)]);
    }

    #[test]
    fn macro_recursion_depth_is_limited() {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", ".macro spin\n@spin\n.endmacro\n@spin\n".to_string());
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        let (prog, pdiags) = Parser::new(&tokens).parse();
        assert!(!pdiags.has_errors());
        let (_prog, diags) = Expander::new().with_max_depth(4).expand(prog);
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| matches!(d.kind, Kind::MacroTooDeep(_))));
    }
}
