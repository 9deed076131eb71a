// Semantic Analyzer (Pass 1)
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

//! Walks the expanded statement tree once, assigning every label its
//! address, sizing every instruction and data-emitting directive, and
//! committing the 6502-family zero-page decision and every other
//! width-sensitive choice (§4.G). Pass 2 ([`crate::codegen`]) re-walks
//! the identical tree in the identical order and must reuse these
//! [`crate::target::Sizing`] values verbatim — recomputing them against
//! final symbol values would violate the "no statement relocates
//! between passes" invariant (§3).

use std::collections::HashMap;
use std::fs;

use crate::ast::*;
use crate::eval::{self, EvalContext, EvalMode};
use crate::message::{Diagnostics, Kind};
use crate::source::Location;
use crate::symbol::{AddressSpace, ScopeId, SymbolValue, Symbols};
use crate::format::Platform;
use crate::target::{self, Arch, FlagState, Mos6502Variant, OperandFacts, Sizing, Tracked, NO_OPERAND};

#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    Int(i64),
    Str(String),
}

/// Platform/target header directives (`ines_mapper`, `snes_title`, ...)
/// that `analyze` does not special-case itself: collected generically
/// by name so each `format::*` writer can read the ones it cares about.
#[derive(Default, Clone, Debug)]
pub struct Metadata(HashMap<String, Vec<MetaValue>>);

impl Metadata {
    pub fn push(&mut self, name: &str, value: MetaValue) {
        self.0.entry(name.to_string()).or_default().push(value);
    }

    pub fn ints(&self, name: &str) -> Vec<i64> {
        self.0
            .get(name)
            .map(|vs| vs.iter().filter_map(|v| match v { MetaValue::Int(i) => Some(*i), _ => None }).collect())
            .unwrap_or_default()
    }

    pub fn strs(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .map(|vs| vs.iter().filter_map(|v| match v { MetaValue::Str(s) => Some(s.clone()), _ => None }).collect())
            .unwrap_or_default()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.ints(name).into_iter().next()
    }

    pub fn str(&self, name: &str) -> Option<String> {
        self.strs(name).into_iter().next()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// One data-emitting statement's final byte width, recorded by the same
/// sequence number scheme as instruction [`Sizing`] so pass 2 need not
/// recompute it (relevant for `.align`/`.fill`/`.pad`, whose width
/// depends on the PC at the point they run, not just their own syntax).
#[derive(Clone, Copy, Debug)]
pub struct DirectiveSizing {
    pub len: u32,
}

pub struct Analysis {
    pub symbols: Symbols,
    pub arch: Option<Arch>,
    /// The platform directive (`.nes`/`.snes`/...) that fired, if any —
    /// what `compiler::compile` hands to `format::wrap`.
    pub platform: Option<Platform>,
    pub metadata: Metadata,
    /// Pass-1 decisions for `Stmt::Instruction`, in visit order.
    pub instruction_sizings: Vec<Sizing>,
    /// Pass-1 byte widths for size-ambiguous directives, in visit order.
    pub directive_sizings: Vec<DirectiveSizing>,
    /// Final length of each address space's image, in bytes from its
    /// lowest written address — used by `format::*` to size output buffers.
    pub space_extent: HashMap<AddressSpace, (i64, i64)>,
    /// Every `ScopeId` minted for a `.scope`/`.proc` body, in visit
    /// order. Pass 2 walks the identical tree and consumes these in the
    /// same order instead of calling `push_child` again, which would
    /// mint fresh scopes disconnected from the symbols pass 1 bound
    /// into the real ones.
    pub scope_sequence: Vec<ScopeId>,
    pub diagnostics: Diagnostics,
}

struct SpaceEnv {
    pc: i64,
    low: i64,
    high: i64,
}

pub struct Analyzer {
    symbols: Symbols,
    arch: Option<Arch>,
    platform: Option<Platform>,
    flags: FlagState,
    metadata: Metadata,
    instruction_sizings: Vec<Sizing>,
    directive_sizings: Vec<DirectiveSizing>,
    spaces: HashMap<AddressSpace, SpaceEnv>,
    space_names: HashMap<String, AddressSpace>,
    current_space: AddressSpace,
    /// The innermost `.scope`/`.proc` enclosing the statement being
    /// visited right now; symbol lookups climb from here, not from the
    /// root, so a name bound inside a scope is visible to references
    /// inside that same scope.
    current_scope: ScopeId,
    scope_sequence: Vec<ScopeId>,
    diags: Diagnostics,
    asserts: Vec<(Expr, String, Location)>,
}

impl Analyzer {
    pub fn new() -> Self {
        let symbols = Symbols::new();
        let current_scope = symbols.scopes.root();
        Analyzer {
            symbols,
            arch: None,
            platform: None,
            flags: FlagState::default(),
            metadata: Metadata::default(),
            instruction_sizings: Vec::new(),
            directive_sizings: Vec::new(),
            spaces: HashMap::new(),
            space_names: HashMap::new(),
            current_space: AddressSpace::default(),
            current_scope,
            scope_sequence: Vec::new(),
            diags: Diagnostics::new(),
            asserts: Vec::new(),
        }
    }

    pub fn analyze(mut self, program: &Program) -> Analysis {
        let root = self.symbols.scopes.root();
        self.walk(program, root);
        self.check_asserts();

        let mut space_extent = HashMap::new();
        for (space, env) in &self.spaces {
            if env.high > env.low {
                space_extent.insert(*space, (env.low, env.high));
            }
        }

        Analysis {
            symbols: self.symbols,
            arch: self.arch,
            platform: self.platform,
            metadata: self.metadata,
            instruction_sizings: self.instruction_sizings,
            directive_sizings: self.directive_sizings,
            space_extent,
            scope_sequence: self.scope_sequence,
            diagnostics: self.diags,
        }
    }

    fn current_pc(&mut self) -> i64 {
        self.spaces.entry(self.current_space).or_insert(SpaceEnv { pc: 0, low: i64::MAX, high: i64::MIN }).pc
    }

    fn advance_pc(&mut self, len: u32) {
        let space = self.current_space;
        let env = self.spaces.entry(space).or_insert(SpaceEnv { pc: 0, low: i64::MAX, high: i64::MIN });
        env.low = env.low.min(env.pc);
        env.pc += len as i64;
        env.high = env.high.max(env.pc);
    }

    fn set_pc(&mut self, value: i64) {
        let space = self.current_space;
        let env = self.spaces.entry(space).or_insert(SpaceEnv { pc: 0, low: i64::MAX, high: i64::MIN });
        env.pc = value;
    }

    fn space_for(&mut self, name: &Option<String>) -> AddressSpace {
        match name {
            None => self.current_space,
            Some(n) => {
                let next_id = self.space_names.len() as u16 + 1;
                *self.space_names.entry(n.clone()).or_insert(AddressSpace(next_id))
            }
        }
    }

    fn walk(&mut self, stmts: &[Stmt], scope: ScopeId) {
        let outer = self.current_scope;
        self.current_scope = scope;
        for stmt in stmts {
            self.stmt(stmt, scope);
        }
        self.current_scope = outer;
    }

    fn const_eval(&self, expr: &Expr) -> Result<i64, Kind> {
        eval::eval(expr, EvalMode::ConstantOnly, self)
    }

    fn stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Label { name, loc } => self.define_label(scope, name, loc.clone(), false),
            Stmt::LocalLabel { name, loc } => {
                let pc = self.current_pc();
                let space = self.current_space;
                if let Err(kind) = self.symbols.define_local(name, SymbolValue::Address(space, pc), loc.clone()) {
                    self.diags.push(loc.clone(), kind);
                }
            }
            Stmt::AnonymousLabel { anon, loc } => {
                let pc = self.current_pc();
                let space = self.current_space;
                self.symbols.define_anonymous(anon.clone(), SymbolValue::Address(space, pc), loc.clone());
            }

            Stmt::Assignment { name, value, kind, loc } => {
                let mutable = matches!(kind, DefKind::Set);
                match self.const_eval(value) {
                    Ok(v) => {
                        if let Err(existing_id) =
                            self.symbols.define(scope, name, SymbolValue::Integer(v), loc.clone(), mutable)
                        {
                            let _ = existing_id;
                            self.diags.push(loc.clone(), Kind::DuplicateSymbol(name.clone()));
                        }
                    }
                    Err(kind) => self.diags.push(loc.clone(), kind),
                }
            }

            Stmt::Data { width, values, loc } => {
                let unit = match width {
                    DataWidth::Byte => 1u32,
                    DataWidth::Word => 2,
                    DataWidth::Long => 3,
                    DataWidth::DWord => 4,
                };
                let mut len = 0u32;
                for item in values {
                    len += match item {
                        DataItem::Expr(_) => unit,
                        DataItem::Str(s) => s.len() as u32,
                    };
                }
                self.directive_sizings.push(DirectiveSizing { len });
                self.advance_pc(len);
                let _ = loc;
            }

            Stmt::Org { address, space, loc } => {
                let target_space = self.space_for(space);
                match self.const_eval(address) {
                    Ok(v) => {
                        self.current_space = target_space;
                        self.set_pc(v);
                    }
                    Err(kind) => self.diags.push(loc.clone(), kind),
                }
            }

            Stmt::Align { boundary, loc } => {
                let len = match self.const_eval(boundary) {
                    Ok(b) if b > 0 => {
                        let pc = self.current_pc();
                        let rem = pc.rem_euclid(b);
                        if rem == 0 { 0 } else { (b - rem) as u32 }
                    }
                    Ok(b) => {
                        self.diags.push(loc.clone(), Kind::BadDirectiveArg("align", b.to_string()));
                        0
                    }
                    Err(kind) => {
                        self.diags.push(loc.clone(), kind);
                        0
                    }
                };
                self.directive_sizings.push(DirectiveSizing { len });
                self.advance_pc(len);
            }

            Stmt::Pad { address, fill: _, loc } => {
                let len = match self.const_eval(address) {
                    Ok(target) => {
                        let pc = self.current_pc();
                        if target < pc {
                            self.diags.push(loc.clone(), Kind::BadDirectiveArg("pad", target.to_string()));
                            0
                        } else {
                            (target - pc) as u32
                        }
                    }
                    Err(kind) => {
                        self.diags.push(loc.clone(), kind);
                        0
                    }
                };
                self.directive_sizings.push(DirectiveSizing { len });
                self.advance_pc(len);
            }

            Stmt::Fill { count, value: _, loc } => {
                let len = match self.const_eval(count) {
                    Ok(n) if n >= 0 => n as u32,
                    Ok(n) => {
                        self.diags.push(loc.clone(), Kind::BadDirectiveArg("fill", n.to_string()));
                        0
                    }
                    Err(kind) => {
                        self.diags.push(loc.clone(), kind);
                        0
                    }
                };
                self.directive_sizings.push(DirectiveSizing { len });
                self.advance_pc(len);
            }

            Stmt::IncludeBinary { path, offset, length, loc } => {
                let len = match self.incbin_len(path, offset, length) {
                    Ok(n) => n,
                    Err(kind) => {
                        self.diags.push(loc.clone(), kind);
                        0
                    }
                };
                self.directive_sizings.push(DirectiveSizing { len });
                self.advance_pc(len);
            }

            Stmt::Directive { name, args, loc } => self.directive(name, args, loc),

            Stmt::Instruction(instr) => self.instruction(instr, scope),

            Stmt::MacroDefinition(_) | Stmt::MacroInvocation { .. } => {
                // Fully resolved by the expander; none should survive to here.
            }

            Stmt::If { .. } | Stmt::Repeat { .. } | Stmt::Enum { .. } => {
                // Likewise resolved by the expander.
            }

            Stmt::Scope { body, .. } => {
                let child = self.symbols.scopes.push_child(scope);
                self.scope_sequence.push(child);
                self.walk(body, child);
            }
            Stmt::Proc { name, body, loc } => {
                self.define_label(scope, name, loc.clone(), false);
                let child = self.symbols.scopes.push_child(scope);
                self.scope_sequence.push(child);
                self.walk(body, child);
            }
        }
    }

    fn define_label(&mut self, scope: ScopeId, name: &str, loc: Location, mutable: bool) {
        let pc = self.current_pc();
        let space = self.current_space;
        if self
            .symbols
            .define_global(scope, name, SymbolValue::Address(space, pc), loc.clone(), mutable)
            .is_err()
        {
            self.diags.push(loc, Kind::DuplicateSymbol(name.to_string()));
        }
    }

    fn incbin_len(&self, path: &str, offset: &Option<Expr>, length: &Option<Expr>) -> Result<u32, Kind> {
        let meta = fs::metadata(path).map_err(|e| Kind::Io(format!("{}: {}", path, e)))?;
        let file_len = meta.len() as i64;
        let start = match offset {
            Some(e) => self.const_eval(e)?,
            None => 0,
        };
        let len = match length {
            Some(e) => self.const_eval(e)?,
            None => file_len - start,
        };
        if len < 0 || start < 0 || start + len > file_len {
            return Err(Kind::BadDirectiveArg("incbin", format!("{path} range out of bounds")));
        }
        Ok(len as u32)
    }

    fn directive(&mut self, name: &str, args: &[Expr], loc: &Location) {
        match name {
            "a8" => self.flags.m = Tracked::Known(1),
            "a16" => self.flags.m = Tracked::Known(2),
            "i8" => self.flags.x = Tracked::Known(1),
            "i16" => self.flags.x = Tracked::Known(2),
            "arm" => self.flags.thumb = false,
            "thumb" => self.flags.thumb = true,
            "dp" => match args.first().map(|e| self.const_eval(e)) {
                Some(Ok(0)) => self.flags.direct_page = 0,
                Some(Ok(1)) => self.flags.direct_page = 1,
                Some(Ok(v)) => self.diags.push(loc.clone(), Kind::BadDirectiveArg("dp", v.to_string())),
                Some(Err(kind)) => self.diags.push(loc.clone(), kind),
                None => self.diags.push(loc.clone(), Kind::MissingOperand),
            },

            "assert" => {
                if let [cond, rest @ ..] = args {
                    let message = rest
                        .first()
                        .and_then(|e| if let Expr::Str(s) = e { Some(s.clone()) } else { None })
                        .unwrap_or_else(|| "assertion failed".to_string());
                    self.asserts.push((cond.clone(), message, loc.clone()));
                } else {
                    self.diags.push(loc.clone(), Kind::MissingOperand);
                }
            }
            "error" => {
                let text = args.first().and_then(expr_as_text).unwrap_or_default();
                self.diags.push(loc.clone(), Kind::UserError(text));
            }
            "warning" => {
                let text = args.first().and_then(expr_as_text).unwrap_or_default();
                self.diags.push(loc.clone(), Kind::UserWarning(text));
            }

            "nes" => {
                self.arch = Some(Arch::Mos6502(Mos6502Variant::Nmos6502));
                self.platform = Some(Platform::Nes);
            }
            "snes" => {
                self.arch = Some(Arch::W65c816);
                self.platform = Some(Platform::Snes);
            }
            "gb" => {
                self.arch = Some(Arch::Sm83);
                self.platform = Some(Platform::Gb);
            }
            "genesis" | "md" => {
                self.arch = Some(Arch::M68000);
                self.platform = Some(Platform::Genesis);
            }
            "gba" => {
                self.arch = Some(Arch::Arm7);
                self.platform = Some(Platform::Gba);
            }
            "sms" => {
                self.arch = Some(Arch::Z80);
                self.platform = Some(Platform::Sms);
            }
            "pce" => {
                self.arch = Some(Arch::Mos6502(Mos6502Variant::HuC6280));
                self.platform = Some(Platform::Pce);
            }
            "a26" => {
                self.arch = Some(Arch::Mos6502(Mos6502Variant::Nmos6507));
                self.platform = Some(Platform::A26);
            }
            "lnx" => {
                self.arch = Some(Arch::Mos6502(Mos6502Variant::Nmos6502));
                self.platform = Some(Platform::Lnx);
            }
            "ws" => {
                self.arch = Some(Arch::V30mz);
                self.platform = Some(Platform::Ws);
            }
            "spc" => {
                self.arch = Some(Arch::Spc700);
                self.platform = Some(Platform::Spc);
            }
            "arch" => {
                let text = args.first().and_then(directive_arg_as_name).unwrap_or_default();
                self.arch = arch_by_name(&text);
                if self.arch.is_none() {
                    self.diags.push(loc.clone(), Kind::BadDirectiveArg("arch", text));
                }
            }

            _ => {
                for arg in args {
                    match arg {
                        Expr::Str(s) => self.metadata.push(name, MetaValue::Str(s.clone())),
                        other => match self.const_eval(other) {
                            Ok(v) => self.metadata.push(name, MetaValue::Int(v)),
                            Err(kind) => self.diags.push(loc.clone(), kind),
                        },
                    }
                }
                if args.is_empty() {
                    self.metadata.push(name, MetaValue::Int(1));
                }
            }
        }
    }

    fn check_asserts(&mut self) {
        let asserts = std::mem::take(&mut self.asserts);
        for (cond, message, loc) in asserts {
            match eval::eval(&cond, EvalMode::ConstantOnly, self) {
                Ok(0) => self.diags.push(loc, Kind::AssertionFailed(message)),
                Ok(_) => {}
                Err(kind) => self.diags.push(loc, kind),
            }
        }
    }

    fn operand_facts(&self, mode: Option<&SyntaxMode>) -> OperandFacts {
        let expr = match mode.and_then(|m| m.expr()) {
            Some(e) => e,
            None => return NO_OPERAND,
        };
        match self.const_eval(expr) {
            Ok(v) => OperandFacts { constant_value: Some(v) },
            Err(_) => NO_OPERAND,
        }
    }

    fn instruction(&mut self, instr: &Instruction, _scope: ScopeId) {
        let arch = match self.arch {
            Some(a) => a,
            None => {
                self.diags.push(
                    instr.loc.clone(),
                    Kind::Internal("no target architecture selected before the first instruction".into()),
                );
                return;
            }
        };
        let descriptor = target::descriptor_for(arch);
        let facts1 = self.operand_facts(Some(&instr.mode));
        let facts2 = self.operand_facts(instr.mode2.as_ref());
        match (descriptor.size)(instr, &self.flags, facts1, facts2) {
            Ok(sizing) => {
                self.instruction_sizings.push(sizing);
                self.advance_pc(sizing.len);
            }
            Err(kind) => self.diags.push(instr.loc.clone(), kind),
        }
        self.rep_sep_tracking(instr);
    }

    /// `REP #imm`/`SEP #imm` deterministically clear/set the tracked
    /// `M`/`X` bits when the operand is a literal; any other operand
    /// makes both bits `Unknown` until the next explicit `.a8`/`.a16`/
    /// `.i8`/`.i16` (Open Question 2).
    fn rep_sep_tracking(&mut self, instr: &Instruction) {
        let m = instr.mnemonic.to_ascii_lowercase();
        if m != "rep" && m != "sep" {
            return;
        }
        let literal = match instr.mode.expr() {
            Some(Expr::Integer(v)) => Some(*v),
            _ => None,
        };
        match literal {
            Some(mask) => {
                let set = m == "sep";
                if mask & 0x20 != 0 {
                    self.flags.m = Tracked::Known(if set { 1 } else { 2 });
                }
                if mask & 0x10 != 0 {
                    self.flags.x = Tracked::Known(if set { 1 } else { 2 });
                }
            }
            None => {
                self.flags.m = Tracked::Unknown;
                self.flags.x = Tracked::Unknown;
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new()
    }
}

impl EvalContext for Analyzer {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.symbols.scopes.lookup(self.current_scope, name).and_then(|id| self.symbols.value(id).as_i64())
    }

    fn pc(&self) -> Option<i64> {
        self.spaces.get(&self.current_space).map(|e| e.pc)
    }

    fn lookup_local(&self, name: &str) -> Option<i64> {
        self.symbols.lookup_local(name).and_then(|id| self.symbols.value(id).as_i64())
    }

    fn lookup_anonymous(&self, anon: &crate::token::Anon) -> Option<i64> {
        let pc = self.pc().unwrap_or(0);
        self.symbols.resolve_anonymous(anon, pc)
    }
}

fn expr_as_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Str(s) => Some(s.clone()),
        _ => None,
    }
}

/// `.arch` accepts both a quoted name (`.arch "6502"`) and a bare one
/// (`.arch 6502`, `.arch sm83`); the lexer tokenizes the latter as a
/// number or a symbol rather than a string.
fn directive_arg_as_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Str(s) => Some(s.clone()),
        Expr::Symbol(s) => Some(s.clone()),
        Expr::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

fn arch_by_name(name: &str) -> Option<Arch> {
    Some(match name.to_ascii_lowercase().as_str() {
        "6502" => Arch::Mos6502(Mos6502Variant::Nmos6502),
        "6507" => Arch::Mos6502(Mos6502Variant::Nmos6507),
        "65c02" => Arch::Mos6502(Mos6502Variant::Cmos65c02),
        "huc6280" => Arch::Mos6502(Mos6502Variant::HuC6280),
        "65816" => Arch::W65c816,
        "sm83" => Arch::Sm83,
        "z80" => Arch::Z80,
        "m68000" => Arch::M68000,
        "arm7" => Arch::Arm7,
        "v30mz" => Arch::V30mz,
        "spc700" => Arch::Spc700,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{resolve_locations, Lexer};
    use crate::parser::Parser;
    use crate::source::SourceRegistry;

    fn analyze_source(text: &str) -> Analysis {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", text.to_string());
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        let (prog, parse_diags) = Parser::new(&tokens).parse();
        assert!(!parse_diags.has_errors(), "{:?}", parse_diags);
        let mut expander = crate::expand::Expander::new();
        let (prog, expand_diags) = expander.expand(prog);
        assert!(!expand_diags.has_errors(), "{:?}", expand_diags);
        Analyzer::new().analyze(&prog)
    }

    #[test]
    fn labels_receive_sequential_addresses() {
        let a = analyze_source(".arch 6502\n.org $8000\nstart:\n  nop\nloop:\n  nop\n");
        assert!(!a.diagnostics.has_errors(), "{:?}", a.diagnostics);
        let root = a.symbols.scopes.root();
        let start = a.symbols.scopes.lookup(root, "start").unwrap();
        let loop_ = a.symbols.scopes.lookup(root, "loop").unwrap();
        assert_eq!(a.symbols.value(start).as_i64(), Some(0x8000));
        assert_eq!(a.symbols.value(loop_).as_i64(), Some(0x8001));
    }

    #[test]
    fn zero_page_resolvable_operand_is_narrowed() {
        let a = analyze_source(".arch 6502\nptr = $10\n  lda ptr\n");
        assert!(!a.diagnostics.has_errors(), "{:?}", a.diagnostics);
        assert_eq!(a.instruction_sizings.len(), 1);
        assert!(a.instruction_sizings[0].direct_page);
        assert_eq!(a.instruction_sizings[0].len, 2);
    }

    #[test]
    fn forward_reference_stays_wide() {
        let a = analyze_source(".arch 6502\n  lda later\nlater:\n  nop\n");
        assert!(!a.diagnostics.has_errors(), "{:?}", a.diagnostics);
        assert!(!a.instruction_sizings[0].direct_page);
        assert_eq!(a.instruction_sizings[0].len, 3);
    }

    #[test]
    fn missing_target_is_an_error() {
        let a = analyze_source("  nop\n");
        assert!(a.diagnostics.has_errors());
    }

    #[test]
    fn assert_failure_is_reported() {
        let a = analyze_source(".arch 6502\nx = 1\n.assert x == 2, \"bad\"\n");
        assert!(a.diagnostics.has_errors());
    }

    #[test]
    fn unrecognized_directive_becomes_metadata() {
        let a = analyze_source(".arch 6502\n.ines_mapper 4\n");
        assert_eq!(a.metadata.int("ines_mapper"), Some(4));
    }
}
