//! Output location for a document, derived from its namespace declarations.

use crate::types::ThriftDocument;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub scope: String,
    pub name: String,
    pub path: PathBuf,
}

fn path_for_namespace(out_dir: &Path, namespace: &str, file_stem: &str) -> PathBuf {
    let last_segment = namespace.rsplit('.').next().unwrap_or_default();
    out_dir.join(last_segment).join(format!("{}.ts", file_stem))
}

fn empty_namespace(out_dir: &Path) -> Namespace {
    Namespace {
        scope: String::new(),
        name: String::new(),
        path: path_for_namespace(out_dir, "", "index"),
    }
}

/// Pick the namespace used for generated output.
///
/// The `js` scope wins, then `java` (the Scrooge convention), otherwise the
/// document lands in the root of `out_dir` as `index.ts`.
pub fn resolve_namespace(out_dir: &Path, document: &ThriftDocument, file_stem: &str) -> Namespace {
    let by_scope: HashMap<&str, Namespace> = document
        .namespaces()
        .map(|ns| {
            (
                ns.scope.as_str(),
                Namespace {
                    scope: ns.scope.clone(),
                    name: ns.name.clone(),
                    path: path_for_namespace(out_dir, &ns.name, file_stem),
                },
            )
        })
        .collect();

    by_scope
        .get("js")
        .or_else(|| by_scope.get("java"))
        .cloned()
        .unwrap_or_else(|| empty_namespace(out_dir))
}
