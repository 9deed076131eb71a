// Compilation Orchestrator
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

//! Ties the Source Registry through the Output Formatter into one call
//! (§4, §6). Every stage keeps ownership of its own state; this module
//! only sequences them and collects their diagnostics into one list,
//! the way the teacher's `aex::compiler::compile` sequences lexer,
//! parser, and code generator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::analyze::Analyzer;
use crate::ast::{DefKind, Expr, Program, Stmt};
use crate::codegen::Codegen;
use crate::expand::Expander;
use crate::format::{self, Platform, RawImage};
use crate::message::{Diagnostics, Kind};
use crate::preprocess::Preprocessor;
use crate::source::{Location, SourceRegistry};
use crate::symbol::AddressSpace;

/// One finished compilation: the platform-wrapped bytes per address
/// space that produced output, plus every diagnostic collected along
/// the way. `images` is keyed by [`AddressSpace`] because a single
/// source can legitimately target more than one (e.g. SNES ROM + SRAM
/// regions); most single-platform builds populate exactly one entry.
pub struct CompileResult {
    pub images: BTreeMap<AddressSpace, Vec<u8>>,
    pub symbols: crate::symbol::Symbols,
    pub diagnostics: Diagnostics,
    pub sources: SourceRegistry,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

#[derive(Default)]
pub struct CompileOptions {
    pub include_paths: Vec<PathBuf>,
    /// Constants injected before pass 1 runs (manifest `defines`, or
    /// `-D name=value` on the command line).
    pub defines: Vec<(String, i64)>,
}

/// Runs the whole pipeline against `entry`, returning the wrapped image
/// bytes for every address space the source populated.
pub fn compile_file(entry: &Path, options: &CompileOptions) -> CompileResult {
    let mut sources = SourceRegistry::new();
    let file = match sources.add_file(entry) {
        Ok(id) => id,
        Err(e) => {
            let mut diags = Diagnostics::new();
            diags.push(Location::builtin(), Kind::Io(format!("{}: {e}", entry.display())));
            return CompileResult {
                images: BTreeMap::new(),
                symbols: crate::symbol::Symbols::new(),
                diagnostics: diags,
                sources,
            };
        }
    };
    info!("compiling {}", entry.display());
    compile(sources, file, options)
}

pub fn compile(mut sources: SourceRegistry, entry: crate::source::FileId, options: &CompileOptions) -> CompileResult {
    let mut diagnostics = Diagnostics::new();

    let preprocessor = Preprocessor::new(options.include_paths.clone());
    let (tokens, preprocess_diags) = preprocessor.process(&mut sources, entry);
    diagnostics.extend(preprocess_diags);
    debug!("preprocessed {} tokens", tokens.len());

    let (mut program, parse_diags) = crate::parser::Parser::new(&tokens).parse();
    diagnostics.extend(parse_diags);
    prepend_defines(&mut program, &options.defines);

    let mut expander = Expander::new();
    let (program, expand_diags) = expander.expand(program);
    diagnostics.extend(expand_diags);

    let analysis = Analyzer::new().analyze(&program);
    diagnostics.extend(analysis.diagnostics.clone());
    if diagnostics.has_errors() {
        return CompileResult { images: BTreeMap::new(), symbols: analysis.symbols, diagnostics, sources };
    }

    let codegen_output = Codegen::new(&analysis).run(&program);
    diagnostics.extend(codegen_output.diagnostics);
    if diagnostics.has_errors() {
        return CompileResult { images: BTreeMap::new(), symbols: analysis.symbols, diagnostics, sources };
    }

    let mut images = BTreeMap::new();
    for (space, image) in &codegen_output.images {
        let raw = RawImage { base: image.base, bytes: &image.bytes };
        match wrap_for_platform(analysis.platform, &raw, &analysis.metadata) {
            Ok(bytes) => {
                images.insert(*space, bytes);
            }
            Err(kind) => diagnostics.push(Location::builtin(), kind),
        }
    }

    debug!("produced {} image(s)", images.len());
    CompileResult { images, symbols: analysis.symbols, diagnostics, sources }
}

/// With no platform directive in the source, the raw code image is the
/// output — there is no cartridge header to attach.
fn wrap_for_platform(platform: Option<Platform>, image: &RawImage, metadata: &crate::analyze::Metadata) -> Result<Vec<u8>, Kind> {
    match platform {
        Some(p) => format::wrap(p, image, metadata),
        None => Ok(image.bytes.to_vec()),
    }
}

fn prepend_defines(program: &mut Program, defines: &[(String, i64)]) {
    let mut prelude: Vec<Stmt> = defines
        .iter()
        .map(|(name, value)| Stmt::Assignment {
            name: name.clone(),
            value: Expr::Integer(*value),
            kind: DefKind::Define,
            loc: Location::builtin(),
        })
        .collect();
    prelude.append(program);
    *program = prelude;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_source(text: &str) -> CompileResult {
        let mut sources = SourceRegistry::new();
        let file = sources.add_text("t.pasm", text.to_string());
        compile(sources, file, &CompileOptions::default())
    }

    #[test]
    fn assembles_a_small_nes_program() {
        let result = compile_source(".nes\n.org $8000\nstart:\n  lda #$01\n  sta $2000\n  rts\n");
        assert!(!result.has_errors(), "{:?}", result.diagnostics.into_vec());
        assert_eq!(result.images.len(), 1);
    }

    #[test]
    fn undefined_symbol_is_a_diagnostic_not_a_panic() {
        let result = compile_source(".nes\n.org $8000\n  lda undefined_thing\n");
        assert!(result.has_errors());
    }

    #[test]
    fn manifest_defines_are_visible_before_pass_one() {
        let mut sources = SourceRegistry::new();
        let file = sources.add_text("t.pasm", ".nes\n.org $8000\n  lda #width\n".to_string());
        let options = CompileOptions { include_paths: Vec::new(), defines: vec![("width".into(), 4)] };
        let result = compile(sources, file, &options);
        assert!(!result.has_errors(), "{:?}", result.diagnostics.into_vec());
    }
}
