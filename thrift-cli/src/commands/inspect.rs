use anyhow::{Context, Result};
use std::path::Path;
use thrift_codegen::compile_document;
use thrift_idl::suggest_similar;

use super::load_document;

pub fn inspect(path: &Path, definition: Option<&str>) -> Result<()> {
    let document = load_document(path)?;
    let compiled =
        compile_document(&document).with_context(|| format!("Failed to compile {}", path.display()))?;

    let json = match definition {
        None => serde_json::to_string_pretty(&compiled)?,
        Some(name) => {
            if let Some(codec) = compiled.struct_codec(name) {
                serde_json::to_string_pretty(codec)?
            } else if let Some(service) = compiled.service(name) {
                serde_json::to_string_pretty(service)?
            } else {
                let candidates: Vec<&str> = compiled
                    .structs
                    .iter()
                    .map(|s| s.name.as_str())
                    .chain(compiled.services.iter().map(|s| s.name.as_str()))
                    .collect();
                let suggestions = suggest_similar(name, &candidates, 3);
                match suggestions.first() {
                    Some(s) => anyhow::bail!(
                        "No struct or service named '{}'. Did you mean: {}?",
                        name,
                        s.candidate
                    ),
                    None => anyhow::bail!("No struct or service named '{}'", name),
                }
            }
        }
    };

    println!("{}", json);
    Ok(())
}
