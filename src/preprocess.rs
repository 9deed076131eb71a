// Preprocessor
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

//! Resolves `.include` / `.incbin` and flattens every included file's
//! tokens into one stream (§4.B). Tokens keep the `file_id` of the
//! physical file that wrote them; `.incbin` is never expanded, only
//! its path is rewritten to an absolute one so later stages can read
//! the file slice without re-resolving search paths.

use std::path::{Path, PathBuf};

use crate::lexer::{resolve_locations, Lexer};
use crate::message::{Diagnostics, Kind};
use crate::source::{FileId, SourceRegistry};
use crate::token::{Token, TokenKind};

const DEFAULT_MAX_DEPTH: usize = 16;

pub struct Preprocessor {
    search_paths: Vec<PathBuf>,
    max_depth: usize,
}

impl Preprocessor {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Preprocessor { search_paths, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Resolves `name` as included from `including`: relative to the
    /// including file's directory first, then each configured search
    /// path in order.
    pub fn resolve_path(
        &self,
        sources: &SourceRegistry,
        including: FileId,
        name: &str,
    ) -> Option<PathBuf> {
        let requested = Path::new(name);
        if requested.is_absolute() && requested.exists() {
            return Some(requested.to_path_buf());
        }
        if let Some(dir) = sources.path(including).parent() {
            let candidate = dir.join(requested);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        for base in &self.search_paths {
            let candidate = base.join(requested);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    /// Expands `entry` into a single flat token stream.
    pub fn process(&self, sources: &mut SourceRegistry, entry: FileId) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.expand_file(sources, entry, &mut stack, &mut out, &mut diags);
        out.push(Token::new(
            TokenKind::Eof,
            "",
            crate::source::Location::new(entry, 0, 0, 0),
        ));
        (out, diags)
    }

    fn expand_file(
        &self,
        sources: &mut SourceRegistry,
        file: FileId,
        stack: &mut Vec<FileId>,
        out: &mut Vec<Token>,
        diags: &mut Diagnostics,
    ) {
        if stack.len() >= self.max_depth {
            diags.push(
                sources.location(file, 0),
                Kind::IncludeTooDeep(self.max_depth),
            );
            return;
        }
        stack.push(file);

        let mut tokens = Lexer::new(sources, file).tokenize();
        resolve_locations(sources, &mut tokens);

        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            match &tok.kind {
                TokenKind::Error(kind) => {
                    diags.push(tok.loc.clone(), kind.clone());
                    i += 1;
                }
                TokenKind::Directive(name) if name == "include" => {
                    let loc = tok.loc.clone();
                    if let Some((path_str, consumed)) = string_operand(&tokens, i + 1) {
                        i += 1 + consumed;
                        match self.resolve_path(sources, file, &path_str) {
                            None => {
                                diags.push(loc, Kind::IncludeNotFound(path_str));
                            }
                            Some(resolved) => {
                                if stack_contains_path(sources, stack, &resolved) {
                                    diags.push(loc, Kind::CircularInclude(path_str));
                                } else {
                                    match sources.add_file(&resolved) {
                                        Ok(included) => {
                                            self.expand_file(sources, included, stack, out, diags)
                                        }
                                        Err(e) => diags.push(loc, Kind::Io(e.to_string())),
                                    }
                                }
                            }
                        }
                    } else {
                        diags.push(loc, Kind::BadDirectiveArg("include", "expected a string".into()));
                        i += 1;
                    }
                }
                TokenKind::Directive(name) if name == "incbin" => {
                    out.push(tok.clone());
                    i += 1;
                    if let Some((path_str, consumed)) = string_operand(&tokens, i) {
                        match self.resolve_path(sources, file, &path_str) {
                            Some(resolved) => {
                                out.push(Token::new(
                                    TokenKind::String(resolved.to_string_lossy().into_owned()),
                                    tokens[i].text.clone(),
                                    tokens[i].loc.clone(),
                                ));
                            }
                            None => {
                                diags.push(tokens[i].loc.clone(), Kind::IncludeNotFound(path_str));
                                out.push(tokens[i].clone());
                            }
                        }
                        i += consumed;
                    }
                }
                TokenKind::Eof => {
                    i += 1;
                }
                _ => {
                    out.push(tok.clone());
                    i += 1;
                }
            }
        }

        stack.pop();
    }
}

fn string_operand(tokens: &[Token], at: usize) -> Option<(String, usize)> {
    match tokens.get(at).map(|t| &t.kind) {
        Some(TokenKind::String(s)) => Some((s.clone(), 1)),
        _ => None,
    }
}

fn stack_contains_path(sources: &SourceRegistry, stack: &[FileId], path: &Path) -> bool {
    stack.iter().any(|&id| sources.path(id) == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flattens_single_file() {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("a.pasm", "lda #1\n".into());
        let pp = Preprocessor::new(vec![]);
        let (tokens, diags) = pp.process(&mut sources, f);
        assert!(!diags.has_errors());
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Mnemonic(ref m, _) if m == "lda")));
    }

    #[test]
    fn includes_relative_file() {
        let dir = std::env::temp_dir().join(format!("poppy-pp-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let inc_path = dir.join("inc.pasm");
        std::fs::File::create(&inc_path).unwrap().write_all(b"nop\n").unwrap();
        let main_path = dir.join("main.pasm");
        std::fs::File::create(&main_path)
            .unwrap()
            .write_all(b"include \"inc.pasm\"\n".replace("include", ".include").as_bytes())
            .unwrap();

        let mut sources = SourceRegistry::new();
        let f = sources.add_file(&main_path).unwrap();
        let pp = Preprocessor::new(vec![]);
        let (tokens, diags) = pp.process(&mut sources, f);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Mnemonic(ref m, _) if m == "nop")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn detects_circular_include() {
        let dir = std::env::temp_dir().join(format!("poppy-pp-circ-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.pasm");
        let b = dir.join("b.pasm");
        std::fs::write(&a, ".include \"b.pasm\"\n").unwrap();
        std::fs::write(&b, ".include \"a.pasm\"\n").unwrap();

        let mut sources = SourceRegistry::new();
        let f = sources.add_file(&a).unwrap();
        let pp = Preprocessor::new(vec![]);
        let (_tokens, diags) = pp.process(&mut sources, f);
        assert!(diags.has_errors());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_include_is_an_error() {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("a.pasm", ".include \"nope.pasm\"\n".into());
        let pp = Preprocessor::new(vec![]);
        let (_tokens, diags) = pp.process(&mut sources, f);
        assert!(diags.has_errors());
    }
}
