//! Service method layout: synthesized argument/result structs and the
//! per-method metadata the Client and Processor dispatch on.

use crate::error::CodegenError;
use crate::structs::{generate_struct, StructCodec};
use serde::Serialize;
use std::collections::HashSet;
use thrift_idl::utils::to_pascal_case;
use thrift_idl::{
    FieldDefinition, FieldType, FunctionDefinition, Requiredness, ResolvedIdentifier,
    ServiceDefinition, StructKind, StructLike, SymbolTable,
};

/// Field name of the success slot in every result struct.
pub const SUCCESS_FIELD: &str = "success";

/// A declared exception and the result-struct slot it travels in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionSlot {
    pub field: String,
    pub id: i16,
    pub exception: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCodec {
    pub name: String,
    /// Service that declares the method (differs from the owner for inherited methods).
    pub declared_in: String,
    pub args_struct: String,
    /// `None` for one-way methods.
    pub result_struct: Option<String>,
    pub return_type: FieldType,
    pub oneway: bool,
    pub exceptions: Vec<ExceptionSlot>,
}

impl MethodCodec {
    pub fn returns_void(&self) -> bool {
        self.return_type == FieldType::Void
    }

    pub fn exception_slot(&self, exception: &str) -> Option<&ExceptionSlot> {
        self.exceptions.iter().find(|slot| slot.exception == exception)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCodec {
    pub name: String,
    pub extends: Option<String>,
    /// Inherited methods first, then the service's own.
    pub methods: Vec<MethodCodec>,
}

impl ServiceCodec {
    pub fn method(&self, name: &str) -> Option<&MethodCodec> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.name.as_str())
    }
}

pub fn args_struct_name(service: &str, method: &str) -> String {
    format!("{}{}Args", service, to_pascal_case(method))
}

pub fn result_struct_name(service: &str, method: &str) -> String {
    format!("{}{}Result", service, to_pascal_case(method))
}

/// Argument list of `function` as a struct.
pub fn synthesize_args(service: &str, function: &FunctionDefinition) -> StructLike {
    StructLike {
        name: args_struct_name(service, &function.name),
        fields: function.fields.clone(),
    }
}

/// `{0: success, <declared exceptions>}`, every slot optional.
pub fn synthesize_result(service: &str, function: &FunctionDefinition) -> Option<StructLike> {
    if function.oneway {
        return None;
    }
    let mut fields = vec![FieldDefinition {
        requiredness: Requiredness::Optional,
        ..FieldDefinition::new(SUCCESS_FIELD, 0, function.return_type.clone())
    }];
    fields.extend(function.throws.iter().map(|throw| FieldDefinition {
        requiredness: Requiredness::Optional,
        default_value: None,
        ..throw.clone()
    }));
    Some(StructLike {
        name: result_struct_name(service, &function.name),
        fields,
    })
}

fn method_codec(
    service: &ServiceDefinition,
    function: &FunctionDefinition,
    symbols: &SymbolTable,
) -> Result<MethodCodec, CodegenError> {
    let exceptions = function
        .throws
        .iter()
        .map(|throw| -> Result<ExceptionSlot, CodegenError> {
            let id = throw.field_id.ok_or_else(|| CodegenError::MissingFieldId {
                struct_name: result_struct_name(&service.name, &function.name),
                field: throw.name.clone(),
                line: throw.line,
            })?;
            Ok(ExceptionSlot {
                field: throw.name.clone(),
                id,
                exception: exception_name(&throw.field_type, symbols)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MethodCodec {
        name: function.name.clone(),
        declared_in: service.name.clone(),
        args_struct: args_struct_name(&service.name, &function.name),
        result_struct: (!function.oneway)
            .then(|| result_struct_name(&service.name, &function.name)),
        return_type: function.return_type.clone(),
        oneway: function.oneway,
        exceptions,
    })
}

fn exception_name(field_type: &FieldType, symbols: &SymbolTable) -> Result<String, CodegenError> {
    let FieldType::Identifier { value } = field_type else {
        return Err(CodegenError::Internal(format!(
            "Declared exception type {} is not an identifier",
            field_type.display_name()
        )));
    };
    match symbols.resolve_type(value)? {
        ResolvedIdentifier::StructLike { definition, .. } => Ok(definition.name.clone()),
        ResolvedIdentifier::Typedef { underlying, .. } => exception_name(underlying, symbols),
        other => Err(CodegenError::Internal(format!(
            "Declared exception {} does not name a struct-like type",
            other.name()
        ))),
    }
}

/// Argument/result codecs for the service's own methods.
pub fn generate_method_structs(
    service: &ServiceDefinition,
    symbols: &SymbolTable,
) -> Result<Vec<StructCodec>, CodegenError> {
    let mut codecs = Vec::new();
    for function in &service.functions {
        let args = synthesize_args(&service.name, function);
        codecs.push(generate_struct(StructKind::Struct, &args, symbols)?);
        if let Some(result) = synthesize_result(&service.name, function) {
            codecs.push(generate_struct(StructKind::Struct, &result, symbols)?);
        }
    }
    Ok(codecs)
}

/// Method table including everything inherited through `extends`.
pub fn generate_service(
    service: &ServiceDefinition,
    symbols: &SymbolTable,
) -> Result<ServiceCodec, CodegenError> {
    let mut chain = vec![service];
    let mut seen = HashSet::from([service.name.as_str()]);
    let mut current = service;
    while let Some(parent) = &current.extends {
        let parent = symbols.service(parent)?;
        if !seen.insert(parent.name.as_str()) {
            return Err(CodegenError::Internal(format!(
                "Service {} extends itself through {}",
                service.name, parent.name
            )));
        }
        chain.push(parent);
        current = parent;
    }

    let mut methods: Vec<MethodCodec> = Vec::new();
    for definition in chain.iter().rev() {
        for function in &definition.functions {
            let method = method_codec(definition, function, symbols)?;
            match methods.iter_mut().find(|m| m.name == method.name) {
                Some(existing) => *existing = method,
                None => methods.push(method),
            }
        }
    }

    tracing::debug!(
        "Generated service {} with {} method(s) ({} inherited level(s))",
        service.name,
        methods.len(),
        chain.len() - 1
    );

    Ok(ServiceCodec {
        name: service.name.clone(),
        extends: service.extends.clone(),
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift_idl::{parse_document_content, ThriftDocument};

    fn document() -> ThriftDocument {
        parse_document_content(
            r#"{"body":[
                {"type":"ExceptionDefinition","name":"Oops","fields":[{"name":"why","fieldID":1,"fieldType":{"type":"string"}}]},
                {"type":"ServiceDefinition","name":"Base","functions":[
                    {"name":"ping","returnType":{"type":"void"}},
                    {"name":"version","returnType":{"type":"string"}}
                ]},
                {"type":"ServiceDefinition","name":"Child","extends":"Base","functions":[
                    {"name":"version","returnType":{"type":"i32"}},
                    {"name":"explode","returnType":{"type":"i64"},
                     "fields":[{"name":"force","fieldID":1,"fieldType":{"type":"double"}}],
                     "throws":[{"name":"oops","fieldID":3,"fieldType":{"type":"identifier","value":"Oops"}}]},
                    {"name":"fire","returnType":{"type":"void"},"oneway":true}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_result_struct_layout() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();
        let child = symbols.service("Child").unwrap();
        let codecs = generate_method_structs(child, &symbols).unwrap();

        let result = codecs
            .iter()
            .find(|c| c.name == "ChildExplodeResult")
            .unwrap();
        let ids: Vec<_> = result.fields.iter().map(|f| (f.name.as_str(), f.id)).collect();
        assert_eq!(ids, vec![("success", 0), ("oops", 3)]);
        assert!(result
            .fields
            .iter()
            .all(|f| f.requiredness == Requiredness::Optional));

        // one-way methods get arguments but no result
        assert!(codecs.iter().any(|c| c.name == "ChildFireArgs"));
        assert!(!codecs.iter().any(|c| c.name == "ChildFireResult"));
    }

    #[test]
    fn test_inherited_methods_and_overrides() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();
        let service = generate_service(symbols.service("Child").unwrap(), &symbols).unwrap();

        let names: Vec<_> = service.method_names().collect();
        assert_eq!(names, vec!["ping", "version", "explode", "fire"]);

        let ping = service.method("ping").unwrap();
        assert_eq!(ping.declared_in, "Base");
        assert_eq!(ping.args_struct, "BasePingArgs");

        let version = service.method("version").unwrap();
        assert_eq!(version.declared_in, "Child");
        assert_eq!(version.return_type, FieldType::I32);

        let explode = service.method("explode").unwrap();
        assert_eq!(explode.exception_slot("Oops").map(|s| s.id), Some(3));
        assert!(service.method("fire").unwrap().result_struct.is_none());
    }
}
