use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use thrift_codegen::{compile_document, write_typescript_to_file, TypeScriptCompiler};
use thrift_idl::resolve_namespace;

use super::load_document;
use crate::config::ThriftcConfig;

pub fn generate(config_path: &str, documents: &[PathBuf], out: Option<PathBuf>) -> Result<()> {
    let config = ThriftcConfig::load_optional(config_path)?.unwrap_or_default();
    let out_dir = config.output_dir(out);
    let ts_config = config.typescript_config();

    for path in documents {
        println!("{} Compiling {}...", "→".blue().bold(), path.display());

        let document = load_document(path)?;
        let compiled =
            compile_document(&document).with_context(|| format!("Failed to compile {}", path.display()))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("index");
        let namespace = resolve_namespace(&out_dir, &document, stem);

        let output = TypeScriptCompiler::new(&document, &compiled)
            .with_config(ts_config.clone())
            .compile()
            .with_context(|| format!("Failed to render TypeScript for {}", path.display()))?;

        if let Some(parent) = namespace.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        write_typescript_to_file(&output, &namespace.path)
            .with_context(|| format!("Failed to write {}", namespace.path.display()))?;

        tracing::debug!(
            "Wrote {} (namespace '{}', scope '{}')",
            namespace.path.display(),
            namespace.name,
            namespace.scope
        );
        println!(
            "  {} {} ({} struct(s), {} service(s))",
            "✓".green(),
            namespace.path.display(),
            compiled.structs.len(),
            compiled.services.len()
        );
    }

    println!(
        "{} Generated {} file(s) in {}",
        "✓".green().bold(),
        documents.len(),
        out_dir.display()
    );
    Ok(())
}
