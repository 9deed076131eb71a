// Command-Line Argument Parsing
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

//! Two entry points (§6): `assemble <input> [-o out] [-s symfile]
//! [-l listing] [-t target] [-I path]... [-v]` compiles one file
//! directly, and `build [manifest] [-c configuration] [-v]` drives a
//! `poppy.json`-described project. Parsed by `main`, never by library
//! code.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poppy", version, about = "A multi-target retro assembler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile one source file directly.
    Assemble(AssembleArgs),
    /// Compile the project described by a `poppy.json` manifest.
    Build(BuildArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AssembleArgs {
    /// Entry source file to assemble.
    pub input: PathBuf,

    /// Output ROM/image path. Defaults to the input's stem with the
    /// target's conventional extension.
    #[arg(short = 'o', long = "out")]
    pub output: Option<PathBuf>,

    /// Debug-symbol file to emit; format is chosen by extension
    /// (`.nl`/`.mlb`/`.sym`).
    #[arg(short = 's', long = "symfile")]
    pub symfile: Option<PathBuf>,

    /// Human-readable listing file to emit: resolved source file list
    /// followed by the symbol table.
    #[arg(short = 'l', long = "listing")]
    pub listing: Option<PathBuf>,

    /// Target CPU, overriding any in-source `.arch`/platform directive.
    #[arg(short = 't', long = "target")]
    pub target: Option<String>,

    /// Additional include search paths, searched in order given.
    #[arg(short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// `-D name=value` constants, injected before pass 1 like manifest
    /// `defines`.
    #[arg(short = 'D', long = "define", value_parser = parse_define)]
    pub defines: Vec<(String, i64)>,

    /// One line per compiled file on stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ClapArgs, Debug)]
pub struct BuildArgs {
    /// Path to the project manifest.
    #[arg(default_value = "poppy.json")]
    pub manifest: PathBuf,

    /// Named overlay from the manifest's `configurations` table.
    #[arg(short = 'c', long = "configuration")]
    pub configuration: Option<String>,

    /// One line per compiled file on stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

fn parse_define(raw: &str) -> Result<(String, i64), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let value = parse_integer(value).ok_or_else(|| format!("not an integer literal: `{value}`"))?;
    Ok((name.to_string(), value))
}

/// Accepts the same numeric literal forms `-D` needs on a command
/// line: `$hex`, `%binary` (with `_` separators), and plain decimal.
/// The bank form `$bb:aaaa` and full expression syntax stay in the
/// lexer/parser — this is only for flat CLI constants.
fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix('%') {
        i64::from_str_radix(&bin.replace('_', ""), 2).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_parses_name_and_decimal_value() {
        assert_eq!(parse_define("width=4").unwrap(), ("width".to_string(), 4));
    }

    #[test]
    fn define_parses_hex_value() {
        assert_eq!(parse_define("base=$8000").unwrap(), ("base".to_string(), 0x8000));
    }

    #[test]
    fn define_rejects_missing_equals() {
        assert!(parse_define("width").is_err());
    }
}
