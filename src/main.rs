// Poppy CLI Entry Point
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

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use poppy::cli::{AssembleArgs, BuildArgs, Cli, Command};
use poppy::compiler::{self, CompileOptions};
use poppy::manifest::Manifest;
use poppy::source::SourceRegistry;
use poppy::{format, listing, symfile, target};

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match &cli.command {
        Command::Assemble(args) => run_assemble(args),
        Command::Build(args) => run_build(args),
    }
}

fn run_assemble(args: &AssembleArgs) -> ExitCode {
    if let Some(target_name) = &args.target {
        if target::Arch::by_name(target_name).is_none() {
            error!("unknown target `{target_name}`");
            return ExitCode::from(1);
        }
    }

    if args.verbose {
        info!("assembling {}", args.input.display());
    }

    let options = CompileOptions { include_paths: args.include.clone(), defines: args.defines.clone() };
    let result = compiler::compile_file(&args.input, &options);

    for diagnostic in result.diagnostics.iter() {
        eprintln!("{}", diagnostic.render(&result.sources));
    }

    if result.has_errors() {
        return ExitCode::from(1);
    }

    let output_path = args.output.clone().unwrap_or_else(|| args.input.with_extension("bin"));
    let Some(bytes) = result.images.values().next() else {
        error!("no bytes were emitted");
        return ExitCode::from(2);
    };
    if let Err(e) = std::fs::write(&output_path, bytes) {
        error!("{}: {e}", output_path.display());
        return ExitCode::from(2);
    }

    if let Some(symfile_path) = &args.symfile {
        if let Err(e) = symfile::write(&result.symbols, symfile_path) {
            error!("{}: {e}", symfile_path.display());
            return ExitCode::from(2);
        }
    }

    if let Some(listing_path) = &args.listing {
        let files: Vec<_> = result.sources.file_ids().collect();
        if let Err(e) = listing::write(&result.sources, &files, &result.symbols, listing_path) {
            error!("{}: {e}", listing_path.display());
            return ExitCode::from(2);
        }
    }

    if args.verbose {
        info!("wrote {}", output_path.display());
    }

    ExitCode::from(0)
}

fn run_build(args: &BuildArgs) -> ExitCode {
    let manifest = match Manifest::load(&args.manifest) {
        Ok(m) => m,
        Err(e) => {
            error!("{}: {e}", args.manifest.display());
            return ExitCode::from(2);
        }
    };
    let manifest = match &args.configuration {
        Some(name) => manifest.with_configuration(name),
        None => manifest,
    };

    let root = args.manifest.parent().unwrap_or_else(|| Path::new("."));
    let entry_path = root.join(&manifest.entry);

    if args.verbose {
        info!("building {} ({})", manifest.name, entry_path.display());
    }

    let mut sources = SourceRegistry::new();
    let entry_file = match sources.add_file(&entry_path) {
        Ok(id) => id,
        Err(e) => {
            error!("{}: {e}", entry_path.display());
            return ExitCode::from(2);
        }
    };
    for path in manifest.resolve_sources(root) {
        if path != entry_path {
            if let Err(e) = sources.add_file(&path) {
                error!("{}: {e}", path.display());
                return ExitCode::from(2);
            }
        }
    }

    let defines: Vec<(String, i64)> = manifest.defines.iter().map(|(k, v)| (k.clone(), *v)).collect();
    let options = CompileOptions { include_paths: manifest.includes.clone(), defines };
    let result = compiler::compile(sources, entry_file, &options);

    for diagnostic in result.diagnostics.iter() {
        eprintln!("{}", diagnostic.render(&result.sources));
    }

    if result.has_errors() {
        return ExitCode::from(1);
    }

    let ext = manifest
        .platform
        .as_deref()
        .and_then(format::Platform::by_name)
        .map(|p| p.default_extension())
        .unwrap_or("bin");
    let output_path = manifest.output_path(ext);
    let Some(bytes) = result.images.values().next() else {
        error!("no bytes were emitted");
        return ExitCode::from(2);
    };
    if let Err(e) = std::fs::write(&output_path, bytes) {
        error!("{}: {e}", output_path.display());
        return ExitCode::from(2);
    }

    if let Some(symbols_path) = &manifest.symbols {
        if let Err(e) = symfile::write(&result.symbols, symbols_path) {
            error!("{}: {e}", symbols_path.display());
            return ExitCode::from(2);
        }
    }

    if let Some(listing_path) = &manifest.listing {
        let files: Vec<_> = result.sources.file_ids().collect();
        if let Err(e) = listing::write(&result.sources, &files, &result.symbols, listing_path) {
            error!("{}: {e}", listing_path.display());
            return ExitCode::from(2);
        }
    }

    if manifest.mapfile.is_some() {
        warn!("`mapfile` is recognized in the manifest but has no writer yet; ignoring it");
    }

    if args.verbose {
        info!("wrote {}", output_path.display());
    }

    ExitCode::from(0)
}
