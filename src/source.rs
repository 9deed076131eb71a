// Source Registry
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

//! Owns every file's text by absolute path and maps byte offsets to
//! `(line, column)` pairs. Read-only once a file has been registered.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Dense identifier for a registered file. Stable for the lifetime of
/// a [`SourceRegistry`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FileId(u32);

/// A single source location: file, 1-based line/column, and the raw
/// byte offset those resolve from. Immutable once constructed and
/// attached verbatim to every token and AST node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    /// Present when this location was produced by macro expansion:
    /// the site of the `@macro` call that produced it.
    pub expanded_from: Option<Box<Location>>,
}

impl Location {
    pub fn new(file: FileId, line: u32, column: u32, offset: u32) -> Self {
        Location { file, line, column, offset, expanded_from: None }
    }

    /// Returns a copy of this location re-rooted at an expansion site,
    /// chaining through any expansion site the call itself already has.
    pub fn expanded_from(&self, site: Location) -> Location {
        let mut loc = self.clone();
        loc.expanded_from = Some(Box::new(site));
        loc
    }

    pub fn builtin() -> Self {
        Location::new(FileId(u32::MAX), 0, 0, 0)
    }

    pub fn is_builtin(&self) -> bool {
        self.file.0 == u32::MAX
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_builtin() {
            f.write_str("(built-in)")
        } else {
            write!(f, "{}:{}:{}", self.file.0, self.line, self.column)
        }
    }
}

struct Entry {
    path: PathBuf,
    text: String,
    /// Byte offset of the first character of each line; `line_starts[0] == 0`.
    line_starts: Vec<u32>,
}

/// Owns the text of every file opened during one compilation. A file
/// is read at most once; its bytes never change after registration.
pub struct SourceRegistry {
    entries: Vec<Entry>,
    by_path: HashMap<PathBuf, FileId>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry { entries: Vec::new(), by_path: HashMap::new() }
    }

    /// Registers already-available text under a logical path (used for
    /// stdin, tests, and programmatically supplied sources).
    pub fn add_text(&mut self, path: impl AsRef<Path>, text: String) -> FileId {
        let path = path.as_ref().to_path_buf();
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let line_starts = compute_line_starts(&text);
        let id = FileId(self.entries.len() as u32);
        self.entries.push(Entry { path: path.clone(), text, line_starts });
        self.by_path.insert(path, id);
        id
    }

    /// Reads a file from disk and registers it. Returns the existing id
    /// if the (canonicalized where possible) path was already read.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> io::Result<FileId> {
        let path = path.as_ref();
        let canon = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(&id) = self.by_path.get(&canon) {
            return Ok(id);
        }
        let text = fs::read_to_string(path)?;
        Ok(self.add_text(canon, text))
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.entries[id.0 as usize].path
    }

    /// Every registered file, in registration order — the entry file
    /// first, then each include the preprocessor pulled in. Used by the
    /// listing writer's source file list.
    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.entries.len() as u32).map(FileId)
    }

    pub fn text(&self, id: FileId) -> &str {
        &self.entries[id.0 as usize].text
    }

    /// Resolves a byte offset within `file` to a 1-based `(line, column)`.
    /// Column is a UTF-8 byte-aware character count from the start of
    /// the line (ASCII-only source is the common case for `.pasm`).
    pub fn line_column(&self, file: FileId, offset: u32) -> (u32, u32) {
        let entry = &self.entries[file.0 as usize];
        let line_idx = match entry.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = entry.line_starts[line_idx];
        let text = &entry.text[line_start as usize..offset as usize];
        let column = text.chars().count() as u32 + 1;
        (line_idx as u32 + 1, column)
    }

    pub fn location(&self, file: FileId, offset: u32) -> Location {
        let (line, column) = self.line_column(file, offset);
        Location::new(file, line, column, offset)
    }

    /// The source line (without its terminator) containing `offset`,
    /// used to render the caret diagnostics described in the spec.
    pub fn line_text(&self, file: FileId, line: u32) -> &str {
        let entry = &self.entries[file.0 as usize];
        let idx = (line - 1) as usize;
        let start = entry.line_starts[idx] as usize;
        let end = entry
            .line_starts
            .get(idx + 1)
            .map(|&e| e as usize)
            .unwrap_or(entry.text.len());
        entry.text[start..end].trim_end_matches(['\n', '\r'])
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_line_starts(text: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_text_once() {
        let mut reg = SourceRegistry::new();
        let a = reg.add_text("f.pasm", "lda #1\nrts\n".into());
        let b = reg.add_text("f.pasm", "ignored\n".into());
        assert_eq!(a, b);
        assert_eq!(reg.text(a), "lda #1\nrts\n");
    }

    #[test]
    fn line_column_first_line() {
        let mut reg = SourceRegistry::new();
        let f = reg.add_text("f.pasm", "lda #1\nrts\n".into());
        assert_eq!(reg.line_column(f, 0), (1, 1));
        assert_eq!(reg.line_column(f, 4), (1, 5));
    }

    #[test]
    fn line_column_second_line() {
        let mut reg = SourceRegistry::new();
        let f = reg.add_text("f.pasm", "lda #1\nrts\n".into());
        assert_eq!(reg.line_column(f, 7), (2, 1));
        assert_eq!(reg.line_column(f, 9), (2, 3));
    }

    #[test]
    fn line_text_strips_newline() {
        let mut reg = SourceRegistry::new();
        let f = reg.add_text("f.pasm", "lda #1\nrts\n".into());
        assert_eq!(reg.line_text(f, 1), "lda #1");
        assert_eq!(reg.line_text(f, 2), "rts");
    }

    #[test]
    fn expanded_from_chains() {
        let loc = Location::new(FileId(0), 1, 1, 0);
        let site = Location::new(FileId(0), 5, 1, 40);
        let expanded = loc.expanded_from(site.clone());
        assert_eq!(expanded.expanded_from.as_deref(), Some(&site));
    }

    #[test]
    fn file_ids_lists_every_registered_file_in_order() {
        let mut reg = SourceRegistry::new();
        let a = reg.add_text("a.pasm", "a\n".into());
        let b = reg.add_text("b.pasm", "b\n".into());
        assert_eq!(reg.file_ids().collect::<Vec<_>>(), vec![a, b]);
    }
}
