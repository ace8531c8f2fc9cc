use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use thrift_codegen::{compile_document, CompiledDocument};

use super::load_document;

fn compile(path: &PathBuf) -> Result<CompiledDocument> {
    let document = load_document(path)?;
    Ok(compile_document(&document)?)
}

pub fn check(documents: &[PathBuf]) -> Result<()> {
    let mut failures = 0;

    for path in documents {
        match compile(path) {
            Ok(compiled) => println!(
                "  {} {} ({} struct(s), {} service(s))",
                "✓".green(),
                path.display(),
                compiled.structs.len(),
                compiled.services.len()
            ),
            Err(e) => {
                failures += 1;
                println!("  {} {}: {:#}", "✗".red(), path.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} document(s) failed to compile", failures, documents.len());
    }

    println!("{} All documents compiled", "✓".green().bold());
    Ok(())
}
