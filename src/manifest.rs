// Project Manifest
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

//! `poppy.json` (§6): what file(s) to assemble, what platform to target,
//! and what side files to emit alongside the ROM.
//!
//! A project may optionally ship as a `.poppy` archive: a ZIP whose
//! entries are `poppy.json`, the source tree, and a `.poppy/` metadata
//! folder holding `version.txt`, `checksums.txt`
//! (`SHA256:<relpath>:<hex>` per line) and `build-info.json`. That
//! container is not implemented here — no ZIP crate appears anywhere in
//! this project's dependency lineage, and fabricating one to hand-roll
//! inflate/deflate would be worse than not shipping it (see DESIGN.md).
//! This module only documents the layout so a future crate can target it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::message::Kind;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub platform: Option<String>,
    pub entry: PathBuf,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    #[serde(default)]
    pub defines: BTreeMap<String, i64>,
    #[serde(default)]
    pub symbols: Option<PathBuf>,
    #[serde(default)]
    pub listing: Option<PathBuf>,
    #[serde(default)]
    pub mapfile: Option<PathBuf>,
    #[serde(default)]
    pub auto_labels: bool,
    #[serde(default)]
    pub configurations: BTreeMap<String, ConfigurationOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigurationOverlay {
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub defines: BTreeMap<String, i64>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest, Kind> {
        let text = fs::read_to_string(path).map_err(|e| Kind::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Kind::Io(format!("{}: {}", path.display(), e)))
    }

    /// Applies a named overlay from `configurations`: its `output`
    /// replaces the base value, and its `defines` are merged in,
    /// overlay values winning on key collision (§6 "deep-merge defines,
    /// override output").
    pub fn with_configuration(&self, name: &str) -> Manifest {
        let mut merged = self.clone();
        if let Some(overlay) = self.configurations.get(name) {
            if overlay.output.is_some() {
                merged.output = overlay.output.clone();
            }
            for (k, v) in &overlay.defines {
                merged.defines.insert(k.clone(), *v);
            }
        }
        merged
    }

    /// Resolves `sources` glob patterns against `root`, appends to
    /// `entry`, and removes duplicates while preserving first-seen
    /// order (§6 "duplicates removed preserving order").
    pub fn resolve_sources(&self, root: &Path) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        let mut push_unique = |p: PathBuf| {
            if !seen.contains(&p) {
                seen.push(p);
            }
        };
        push_unique(root.join(&self.entry));
        for pattern in &self.sources {
            for path in glob_match(root, pattern) {
                push_unique(path);
            }
        }
        seen
    }

    pub fn output_path(&self, ext: &str) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from(format!("{}.{}", self.name, ext)))
    }
}

/// A small glob matcher covering the patterns a source tree actually
/// needs: `*` (any run of characters except `/`), `**` (any run of
/// path segments), and `?` (one character). No bracket-expression or
/// brace-expansion support — `sources` entries in practice are things
/// like `src/**/*.pasm`, not shell-grade patterns.
fn glob_match(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    walk(root, root, pattern, &mut matches);
    matches.sort();
    matches
}

fn walk(root: &Path, dir: &Path, pattern: &str, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else { continue };
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            walk(root, &path, pattern, out);
        } else if glob_segments_match(pattern, &relative_str) {
            out.push(path);
        }
    }
}

fn glob_segments_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();
    glob_match_at(&pattern_chars, &text_chars)
}

fn glob_match_at(pattern: &[char], text: &[char]) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    if pattern[0] == '*' {
        if pattern.len() >= 2 && pattern[1] == '*' {
            let rest = &pattern[2..];
            let rest = if rest.first() == Some(&'/') { &rest[1..] } else { rest };
            for split in 0..=text.len() {
                if glob_match_at(rest, &text[split..]) {
                    return true;
                }
            }
            false
        } else {
            for split in 0..=text.len() {
                if text[..split].contains(&'/') {
                    break;
                }
                if glob_match_at(&pattern[1..], &text[split..]) {
                    return true;
                }
            }
            false
        }
    } else if pattern[0] == '?' {
        !text.is_empty() && text[0] != '/' && glob_match_at(&pattern[1..], &text[1..])
    } else {
        !text.is_empty() && pattern[0] == text[0] && glob_match_at(&pattern[1..], &text[1..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_manifest() {
        let json = r#"{"name":"demo","version":"0.1.0","entry":"main.pasm"}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "demo");
        assert_eq!(manifest.entry, PathBuf::from("main.pasm"));
        assert!(manifest.defines.is_empty());
    }

    #[test]
    fn configuration_overlay_merges_defines_and_overrides_output() {
        let json = r#"{
            "name":"demo","version":"0.1.0","entry":"main.pasm",
            "output":"demo.nes",
            "defines":{"base":1},
            "configurations":{"debug":{"output":"demo-debug.nes","defines":{"debug_mode":1}}}
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let merged = manifest.with_configuration("debug");
        assert_eq!(merged.output, Some(PathBuf::from("demo-debug.nes")));
        assert_eq!(merged.defines.get("base"), Some(&1));
        assert_eq!(merged.defines.get("debug_mode"), Some(&1));
    }

    #[test]
    fn unknown_configuration_name_is_a_no_op() {
        let json = r#"{"name":"demo","version":"0.1.0","entry":"main.pasm"}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let merged = manifest.with_configuration("nope");
        assert_eq!(merged.output, manifest.output);
    }

    #[test]
    fn star_star_matches_nested_directories() {
        assert!(glob_segments_match("src/**/*.pasm", "src/a/b/main.pasm"));
        assert!(glob_segments_match("src/**/*.pasm", "src/main.pasm"));
        assert!(!glob_segments_match("src/**/*.pasm", "src/main.inc"));
    }

    #[test]
    fn single_star_does_not_cross_path_separators() {
        assert!(glob_segments_match("src/*.pasm", "src/main.pasm"));
        assert!(!glob_segments_match("src/*.pasm", "src/sub/main.pasm"));
    }
}
