use crate::error::CodegenError;
use crate::service::{generate_method_structs, generate_service, ServiceCodec};
use crate::structs::{generate_struct, StructCodec};
use serde::Serialize;
use std::collections::HashMap;
use thrift_idl::{ResolveError, Statement, StructKind, SymbolTable, ThriftDocument};

/// Every codec generated for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompiledDocument {
    pub structs: Vec<StructCodec>,
    pub services: Vec<ServiceCodec>,
    #[serde(skip)]
    struct_index: HashMap<String, usize>,
}

impl CompiledDocument {
    pub fn struct_codec(&self, name: &str) -> Option<&StructCodec> {
        self.struct_index.get(name).map(|&i| &self.structs[i])
    }

    pub fn service(&self, name: &str) -> Option<&ServiceCodec> {
        self.services.iter().find(|s| s.name == name)
    }

    fn push_struct(&mut self, codec: StructCodec) -> Result<(), CodegenError> {
        if self.struct_index.contains_key(&codec.name) {
            return Err(ResolveError::DuplicateDefinition {
                name: codec.name.clone(),
            }
            .into());
        }
        self.struct_index.insert(codec.name.clone(), self.structs.len());
        self.structs.push(codec);
        Ok(())
    }
}

pub struct DocumentCompiler<'a> {
    symbols: SymbolTable<'a>,
    document: &'a ThriftDocument,
}

impl<'a> DocumentCompiler<'a> {
    pub fn new(document: &'a ThriftDocument) -> Result<Self, CodegenError> {
        Ok(Self {
            symbols: SymbolTable::new(document)?,
            document,
        })
    }

    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    pub fn compile(&self) -> Result<CompiledDocument, CodegenError> {
        let mut compiled = CompiledDocument::default();

        for statement in &self.document.body {
            let (kind, definition) = match statement {
                Statement::Struct(def) => (StructKind::Struct, def),
                Statement::Union(def) => (StructKind::Union, def),
                Statement::Exception(def) => (StructKind::Exception, def),
                _ => continue,
            };
            compiled.push_struct(generate_struct(kind, definition, &self.symbols)?)?;
        }

        for service in self.document.services() {
            for codec in generate_method_structs(service, &self.symbols)? {
                compiled.push_struct(codec)?;
            }
        }

        for service in self.document.services() {
            compiled.services.push(generate_service(service, &self.symbols)?);
        }

        tracing::debug!(
            "Compiled document: {} struct codec(s), {} service(s)",
            compiled.structs.len(),
            compiled.services.len()
        );

        Ok(compiled)
    }
}

pub fn compile_document(document: &ThriftDocument) -> Result<CompiledDocument, CodegenError> {
    DocumentCompiler::new(document)?.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift_idl::parse_document_content;

    #[test]
    fn test_synthesized_name_collision() {
        let doc = parse_document_content(
            r#"{"body":[
                {"type":"StructDefinition","name":"EchoSayArgs","fields":[]},
                {"type":"ServiceDefinition","name":"Echo","functions":[{"name":"say","returnType":{"type":"void"}}]}
            ]}"#,
        )
        .unwrap();

        let err = compile_document(&doc).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Resolve(ResolveError::DuplicateDefinition { ref name }) if name == "EchoSayArgs"
        ));
    }

    #[test]
    fn test_service_used_as_type() {
        let doc = parse_document_content(
            r#"{"body":[
                {"type":"ServiceDefinition","name":"Echo","functions":[]},
                {"type":"StructDefinition","name":"Holder","fields":[
                    {"name":"svc","fieldID":1,"fieldType":{"type":"identifier","value":"Echo"}}
                ]}
            ]}"#,
        )
        .unwrap();

        let err = compile_document(&doc).unwrap_err();
        assert_eq!(err.to_string(), "Identifier Echo is a service being used as a type");
    }
}
