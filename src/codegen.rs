// Code Generator (Pass 2)
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

//! Re-walks the expanded statement tree — in the exact order
//! [`crate::analyze`] visited it — now with every symbol resolved, and
//! emits final bytes. Every width decision was already made in pass 1;
//! this pass never recomputes a [`crate::target::Sizing`], only
//! consults it, which is what keeps the "no relocation between passes"
//! invariant (§3) actually true rather than merely hoped for.

use std::collections::HashMap;

use crate::analyze::Analysis;
use crate::ast::*;
use crate::eval::{self, EvalContext, EvalMode};
use crate::message::{Diagnostics, Kind};
use crate::symbol::{AddressSpace, ScopeId, Symbols};
use crate::target::{self, FlagState, Tracked};

/// One address space's assembled bytes, anchored at its lowest written
/// address so sparse `.org` gaps in between are filled with zero.
pub struct Image {
    pub base: i64,
    pub bytes: Vec<u8>,
}

pub struct CodegenOutput {
    pub images: HashMap<AddressSpace, Image>,
    pub diagnostics: Diagnostics,
}

struct Cursor {
    /// Index into `analysis.instruction_sizings` of the next instruction.
    instr: usize,
    /// Index into `analysis.directive_sizings` of the next sized directive.
    directive: usize,
    /// Index into `analysis.scope_sequence` of the next `.scope`/`.proc`.
    scope: usize,
}

pub struct Codegen<'a> {
    analysis: &'a Analysis,
    symbols: &'a Symbols,
    flags: FlagState,
    spaces: HashMap<AddressSpace, i64>,
    space_names: HashMap<String, AddressSpace>,
    current_space: AddressSpace,
    /// Mirrors [`crate::analyze::Analyzer`]'s `current_scope`: symbol
    /// lookups climb from here, not from the root.
    current_scope: ScopeId,
    images: HashMap<AddressSpace, Image>,
    cursor: Cursor,
    diags: Diagnostics,
}

impl<'a> Codegen<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        let mut images = HashMap::new();
        for (space, (low, high)) in &analysis.space_extent {
            images.insert(*space, Image { base: *low, bytes: vec![0u8; (*high - *low) as usize] });
        }
        let symbols = &analysis.symbols;
        let current_scope = symbols.scopes.root();
        Codegen {
            analysis,
            symbols,
            flags: FlagState::default(),
            spaces: HashMap::new(),
            space_names: HashMap::new(),
            current_space: AddressSpace::default(),
            current_scope,
            images,
            cursor: Cursor { instr: 0, directive: 0, scope: 0 },
            diags: Diagnostics::new(),
        }
    }

    pub fn run(mut self, program: &Program) -> CodegenOutput {
        let root = self.symbols.scopes.root();
        self.walk(program, root);
        CodegenOutput { images: self.images, diagnostics: self.diags }
    }

    fn pc(&self) -> i64 {
        *self.spaces.get(&self.current_space).unwrap_or(&0)
    }

    fn write(&mut self, bytes: &[u8]) {
        let space = self.current_space;
        let pc = *self.spaces.entry(space).or_insert(0);
        if let Some(img) = self.images.get_mut(&space) {
            let offset = (pc - img.base) as usize;
            if offset + bytes.len() <= img.bytes.len() {
                img.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        *self.spaces.get_mut(&space).unwrap() += bytes.len() as i64;
    }

    fn advance(&mut self, len: u32) {
        let space = self.current_space;
        *self.spaces.entry(space).or_insert(0) += len as i64;
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

    fn final_eval(&self, expr: &Expr) -> Result<i64, Kind> {
        eval::eval(expr, EvalMode::Final, self)
    }

    fn walk(&mut self, stmts: &[Stmt], scope: ScopeId) {
        let outer = self.current_scope;
        self.current_scope = scope;
        for stmt in stmts {
            self.stmt(stmt, scope);
        }
        self.current_scope = outer;
    }

    fn stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Label { .. } | Stmt::LocalLabel { .. } | Stmt::AnonymousLabel { .. } => {}

            Stmt::Assignment { .. } => {}

            Stmt::Data { width, values, loc } => self.data(width, values, loc),

            Stmt::Org { address, space, loc } => {
                let target_space = self.space_for(space);
                match self.final_eval(address) {
                    Ok(v) => {
                        self.current_space = target_space;
                        self.spaces.insert(target_space, v);
                    }
                    Err(kind) => self.diags.push(loc.clone(), kind),
                }
            }

            Stmt::Align { loc, .. } => {
                let len = self.next_directive_len();
                let fill = vec![0u8; len as usize];
                self.write(&fill);
                let _ = loc;
            }

            Stmt::Pad { fill, loc, .. } => {
                let len = self.next_directive_len();
                let value = match fill {
                    Some(e) => self.final_eval(e).unwrap_or(0) as u8,
                    None => 0,
                };
                self.write(&vec![value; len as usize]);
                let _ = loc;
            }

            Stmt::Fill { value, loc, .. } => {
                let len = self.next_directive_len();
                let value = match value {
                    Some(e) => self.final_eval(e).unwrap_or(0) as u8,
                    None => 0,
                };
                self.write(&vec![value; len as usize]);
                let _ = loc;
            }

            Stmt::IncludeBinary { path, offset, length, loc } => self.incbin(path, offset, length, loc),

            Stmt::Directive { name, args, loc } => self.directive(name, args, loc),

            Stmt::Instruction(instr) => self.instruction(instr),

            Stmt::MacroDefinition(_) | Stmt::MacroInvocation { .. } => {}
            Stmt::If { .. } | Stmt::Repeat { .. } | Stmt::Enum { .. } => {}

            Stmt::Scope { body, .. } => {
                let child = self.next_scope();
                self.walk(body, child);
            }
            Stmt::Proc { body, .. } => {
                let child = self.next_scope();
                self.walk(body, child);
            }
        }
        let _ = scope;
    }

    fn next_scope(&mut self) -> ScopeId {
        let id = self.analysis.scope_sequence[self.cursor.scope];
        self.cursor.scope += 1;
        id
    }

    fn next_directive_len(&mut self) -> u32 {
        let sizing = self.analysis.directive_sizings[self.cursor.directive];
        self.cursor.directive += 1;
        sizing.len
    }

    fn data(&mut self, width: &DataWidth, values: &[DataItem], loc: &Location) {
        for item in values {
            match item {
                DataItem::Str(s) => self.write(s.as_bytes()),
                DataItem::Expr(expr) => match self.final_eval(expr) {
                    Ok(v) => {
                        let bytes = match width {
                            DataWidth::Byte => vec![v as u8],
                            DataWidth::Word => (v as u16).to_le_bytes().to_vec(),
                            DataWidth::Long => {
                                let b = (v as u32).to_le_bytes();
                                vec![b[0], b[1], b[2]]
                            }
                            DataWidth::DWord => (v as u32).to_le_bytes().to_vec(),
                        };
                        let bytes = match self.analysis.arch.map(|a| a.endianness()) {
                            Some(target::Endianness::Big) => {
                                let mut b = bytes;
                                b.reverse();
                                b
                            }
                            _ => bytes,
                        };
                        self.write(&bytes);
                    }
                    Err(kind) => self.diags.push(loc.clone(), kind),
                },
            }
        }
    }

    fn incbin(&mut self, path: &str, offset: &Option<Expr>, length: &Option<Expr>, loc: &Location) {
        let len = self.next_directive_len();
        match std::fs::read(path) {
            Ok(data) => {
                let start = offset.as_ref().and_then(|e| self.final_eval(e).ok()).unwrap_or(0) as usize;
                let end = (start + len as usize).min(data.len());
                let slice = if start <= end { &data[start..end] } else { &[] };
                self.write(slice);
            }
            Err(e) => self.diags.push(loc.clone(), Kind::Io(format!("{}: {}", path, e))),
        }
        let _ = length;
    }

    fn directive(&mut self, name: &str, args: &[Expr], loc: &Location) {
        match name {
            "a8" => self.flags.m = Tracked::Known(1),
            "a16" => self.flags.m = Tracked::Known(2),
            "i8" => self.flags.x = Tracked::Known(1),
            "i16" => self.flags.x = Tracked::Known(2),
            "arm" => self.flags.thumb = false,
            "thumb" => self.flags.thumb = true,
            "dp" => match args.first().map(|e| self.final_eval(e)) {
                Some(Ok(0)) => self.flags.direct_page = 0,
                Some(Ok(1)) => self.flags.direct_page = 1,
                _ => {}
            },
            "assert" | "error" | "warning" => {}
            _ => {}
        }
    }

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

    fn operand_value(&mut self, mode: Option<&SyntaxMode>, loc: &Location) -> Option<i64> {
        let expr = mode.and_then(|m| m.expr())?;
        match self.final_eval(expr) {
            Ok(v) => Some(v),
            Err(kind) => {
                self.diags.push(loc.clone(), kind);
                None
            }
        }
    }

    fn instruction(&mut self, instr: &Instruction) {
        let sizing = self.analysis.instruction_sizings[self.cursor.instr];
        self.cursor.instr += 1;

        let arch = match self.analysis.arch {
            Some(a) => a,
            None => return,
        };
        let descriptor = target::descriptor_for(arch);
        let value = self.operand_value(Some(&instr.mode), &instr.loc);
        let value2 = self.operand_value(instr.mode2.as_ref(), &instr.loc);
        let next_pc = self.pc() + sizing.len as i64;
        match (descriptor.encode)(instr, &self.flags, sizing, value, value2, next_pc) {
            Ok(encoded) => self.write(&encoded.bytes),
            Err(kind) => self.diags.push(instr.loc.clone(), kind),
        }
        self.rep_sep_tracking(instr);
    }
}

impl<'a> EvalContext for Codegen<'a> {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.symbols.scopes.lookup(self.current_scope, name).and_then(|id| self.symbols.value(id).as_i64())
    }

    fn pc(&self) -> Option<i64> {
        Some(Codegen::pc(self))
    }

    fn lookup_local(&self, name: &str) -> Option<i64> {
        self.symbols.lookup_local(name).and_then(|id| self.symbols.value(id).as_i64())
    }

    fn lookup_anonymous(&self, anon: &crate::token::Anon) -> Option<i64> {
        self.symbols.resolve_anonymous(anon, Codegen::pc(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Analyzer;
    use crate::lexer::{resolve_locations, Lexer};
    use crate::parser::Parser;
    use crate::source::SourceRegistry;

    fn assemble(text: &str) -> (Analysis, CodegenOutput) {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", text.to_string());
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        let (prog, parse_diags) = Parser::new(&tokens).parse();
        assert!(!parse_diags.has_errors(), "{:?}", parse_diags);
        let mut expander = crate::expand::Expander::new();
        let (prog, expand_diags) = expander.expand(prog);
        assert!(!expand_diags.has_errors(), "{:?}", expand_diags);
        let analysis = Analyzer::new().analyze(&prog);
        assert!(!analysis.diagnostics.has_errors(), "{:?}", analysis.diagnostics);
        let output = Codegen::new(&analysis).run(&prog);
        (analysis, output)
    }

    #[test]
    fn emits_sequential_bytes() {
        let (_analysis, out) = assemble(".arch 6502\n.org $8000\n  nop\n  nop\n");
        assert!(!out.diagnostics.has_errors(), "{:?}", out.diagnostics);
        let img = out.images.get(&AddressSpace::default()).unwrap();
        assert_eq!(img.base, 0x8000);
        assert_eq!(img.bytes, vec![0xEA, 0xEA]);
    }

    #[test]
    fn zero_page_instruction_matches_pass_one_width() {
        let (_analysis, out) = assemble(".arch 6502\n.org $0\nptr = $10\n  lda ptr\n  nop\n");
        assert!(!out.diagnostics.has_errors(), "{:?}", out.diagnostics);
        let img = out.images.get(&AddressSpace::default()).unwrap();
        assert_eq!(img.bytes, vec![0xA5, 0x10, 0xEA]);
    }

    #[test]
    fn forward_reference_resolves_to_final_address() {
        let (_analysis, out) = assemble(".arch 6502\n.org $8000\n  jmp later\nlater:\n  nop\n");
        assert!(!out.diagnostics.has_errors(), "{:?}", out.diagnostics);
        let img = out.images.get(&AddressSpace::default()).unwrap();
        assert_eq!(&img.bytes[0..3], &[0x4C, 0x03, 0x80]);
    }

    #[test]
    fn data_directive_emits_little_endian_words() {
        let (_analysis, out) = assemble(".arch 6502\n.org $0\n  .word $1234, $5678\n");
        assert!(!out.diagnostics.has_errors(), "{:?}", out.diagnostics);
        let img = out.images.get(&AddressSpace::default()).unwrap();
        assert_eq!(img.bytes, vec![0x34, 0x12, 0x78, 0x56]);
    }
}
