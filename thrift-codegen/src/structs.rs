//! Decode/encode procedures for structs, unions and exceptions.

use crate::codec::{emit_read, emit_write, wire_type_for, GenState};
use crate::constants::lower_const;
use crate::error::CodegenError;
use crate::ir::{Case, Expr, FieldInit, Stmt};
use crate::protocol::WireType;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashSet;
use thrift_idl::{FieldDefinition, FieldType, Requiredness, StructKind, StructLike, SymbolTable};

/// Local the decode loop binds each field header to.
pub const FIELD_HEADER: &str = "ret";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldLayout {
    pub name: String,
    pub id: i16,
    pub field_type: FieldType,
    pub wire_type: WireType,
    pub requiredness: Requiredness,
    pub default: Option<Value>,
}

/// Generated codec for one struct-like definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructCodec {
    pub name: String,
    pub kind: StructKind,
    pub fields: Vec<FieldLayout>,
    pub decode: Vec<Stmt>,
    pub encode: Vec<Stmt>,
}

impl StructCodec {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_required_field(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.requiredness == Requiredness::Required)
    }
}

pub fn generate_struct(
    kind: StructKind,
    definition: &StructLike,
    symbols: &SymbolTable,
) -> Result<StructCodec, CodegenError> {
    let fields = layout_fields(definition, symbols)?;
    let decode = generate_decode(kind, definition, &fields, symbols)?;
    let encode = generate_encode(kind, definition, &fields, symbols)?;

    tracing::debug!(
        "Generated {:?} codec {}: {} field(s), {} decode / {} encode statement(s)",
        kind,
        definition.name,
        fields.len(),
        decode.len(),
        encode.len()
    );

    Ok(StructCodec {
        name: definition.name.clone(),
        kind,
        fields,
        decode,
        encode,
    })
}

fn layout_fields(definition: &StructLike, symbols: &SymbolTable) -> Result<Vec<FieldLayout>, CodegenError> {
    let mut seen = HashSet::new();
    definition
        .fields
        .iter()
        .map(|field| -> Result<FieldLayout, CodegenError> {
            let id = field_id(definition, field)?;
            if !seen.insert(id) {
                return Err(CodegenError::DuplicateFieldId {
                    struct_name: definition.name.clone(),
                    id,
                });
            }
            let default = field
                .default_value
                .as_ref()
                .map(|literal| {
                    lower_const(
                        literal,
                        &field.field_type,
                        symbols,
                        &format!("{}.{}", definition.name, field.name),
                    )
                })
                .transpose()?;
            Ok(FieldLayout {
                name: field.name.clone(),
                id,
                field_type: field.field_type.clone(),
                wire_type: wire_type_for(&field.field_type, symbols)?,
                requiredness: field.requiredness,
                default,
            })
        })
        .collect()
}

fn field_id(definition: &StructLike, field: &FieldDefinition) -> Result<i16, CodegenError> {
    field.field_id.ok_or_else(|| CodegenError::MissingFieldId {
        struct_name: definition.name.clone(),
        field: field.name.clone(),
        line: field.line,
    })
}

fn generate_decode(
    kind: StructKind,
    definition: &StructLike,
    fields: &[FieldLayout],
    symbols: &SymbolTable,
) -> Result<Vec<Stmt>, CodegenError> {
    let mut state = GenState::new(symbols);
    state.header = Some(FIELD_HEADER.to_string());

    let skip = || Stmt::Skip {
        header: FIELD_HEADER.to_string(),
    };

    let mut cases = Vec::with_capacity(fields.len());
    for field in fields {
        let then = if field.wire_type == WireType::Void {
            emit_read(&mut state, &field.field_type, "")?
        } else {
            let value = state.names.fresh("value");
            let mut stmts = emit_read(&mut state, &field.field_type, &value)?;
            stmts.push(Stmt::Stage {
                field: field.name.clone(),
                value,
            });
            stmts
        };
        cases.push(Case {
            id: field.id,
            body: vec![Stmt::IfWireType {
                header: FIELD_HEADER.to_string(),
                expected: field.wire_type,
                then,
                otherwise: vec![skip()],
            }],
        });
    }

    Ok(vec![
        Stmt::ReadStructBegin,
        Stmt::Loop {
            body: vec![
                Stmt::ReadFieldBegin {
                    header: FIELD_HEADER.to_string(),
                },
                Stmt::BreakIfStop {
                    header: FIELD_HEADER.to_string(),
                },
                Stmt::Switch {
                    header: FIELD_HEADER.to_string(),
                    cases,
                    default: vec![skip()],
                },
                Stmt::ReadFieldEnd,
            ],
        },
        Stmt::ReadStructEnd,
        Stmt::Construct {
            struct_name: definition.name.clone(),
            kind,
            fields: fields
                .iter()
                .filter(|f| f.wire_type != WireType::Void)
                .map(|f| FieldInit {
                    name: f.name.clone(),
                    id: f.id,
                    required: f.requiredness == Requiredness::Required,
                    default: f.default.clone(),
                })
                .collect(),
        },
    ])
}

fn generate_encode(
    kind: StructKind,
    definition: &StructLike,
    fields: &[FieldLayout],
    symbols: &SymbolTable,
) -> Result<Vec<Stmt>, CodegenError> {
    let mut state = GenState::new(symbols);
    let mut stmts = Vec::new();

    if kind == StructKind::Union {
        stmts.push(Stmt::RequireSingleField {
            source: Expr::This,
            struct_name: definition.name.clone(),
            fields: fields.iter().map(|f| f.name.clone()).collect(),
        });
    }

    for field in fields.iter().filter(|f| f.requiredness == Requiredness::Required) {
        stmts.push(Stmt::RequirePresent {
            source: Expr::this_field(field.name.clone()),
            field: field.name.clone(),
        });
    }

    stmts.push(Stmt::WriteStructBegin {
        name: definition.name.clone(),
    });

    for field in fields {
        if field.wire_type == WireType::Void {
            continue;
        }
        let source = Expr::this_field(field.name.clone());
        let mut body = vec![Stmt::WriteFieldBegin {
            name: field.name.clone(),
            wire_type: field.wire_type,
            id: field.id,
        }];
        body.extend(emit_write(&mut state, &field.field_type, source.clone())?);
        body.push(Stmt::WriteFieldEnd);
        stmts.push(Stmt::IfPresent { source, body });
    }

    stmts.push(Stmt::WriteFieldStop);
    stmts.push(Stmt::WriteStructEnd);
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift_idl::{parse_document_content, ThriftDocument};

    fn document(fields: &str) -> ThriftDocument {
        parse_document_content(&format!(
            r#"{{"body":[{{"type":"StructDefinition","name":"Sample","fields":[{}]}}]}}"#,
            fields
        ))
        .unwrap()
    }

    fn generate(doc: &ThriftDocument) -> Result<StructCodec, CodegenError> {
        let symbols = SymbolTable::new(doc).unwrap();
        let (kind, def) = symbols.struct_like("Sample").unwrap();
        generate_struct(kind, def, &symbols)
    }

    #[test]
    fn test_missing_field_id() {
        let doc = document(r#"{"name":"id","fieldType":{"type":"i32"},"line":7}"#);
        let err = generate(&doc).unwrap_err();
        assert_eq!(err.to_string(), "FieldID for Sample.id on line 7 is null");
    }

    #[test]
    fn test_duplicate_field_id() {
        let doc = document(
            r#"{"name":"a","fieldID":1,"fieldType":{"type":"i32"}},
               {"name":"b","fieldID":1,"fieldType":{"type":"string"}}"#,
        );
        assert!(matches!(
            generate(&doc),
            Err(CodegenError::DuplicateFieldId { id: 1, .. })
        ));
    }

    #[test]
    fn test_empty_struct_procedures() {
        let doc = document("");
        let codec = generate(&doc).unwrap();

        assert_eq!(
            codec.encode,
            vec![
                Stmt::WriteStructBegin {
                    name: "Sample".into()
                },
                Stmt::WriteFieldStop,
                Stmt::WriteStructEnd,
            ]
        );
        let Stmt::Loop { body } = &codec.decode[1] else {
            panic!("decode should loop over fields");
        };
        assert!(matches!(&body[2], Stmt::Switch { cases, .. } if cases.is_empty()));
    }

    #[test]
    fn test_case_guards_on_expected_wire_type() {
        let doc = document(
            r#"{"name":"count","fieldID":3,"fieldType":{"type":"i32"},"requiredness":"required"}"#,
        );
        let codec = generate(&doc).unwrap();
        let Stmt::Loop { body } = &codec.decode[1] else {
            panic!("decode should loop over fields");
        };
        let Stmt::Switch { cases, .. } = &body[2] else {
            panic!("expected switch");
        };
        assert_eq!(cases[0].id, 3);
        assert!(matches!(
            &cases[0].body[0],
            Stmt::IfWireType { expected: WireType::I32, .. }
        ));
        assert!(matches!(&codec.encode[0], Stmt::RequirePresent { field, .. } if field == "count"));
    }

    #[test]
    fn test_void_field_is_skipped_and_never_staged() {
        let doc = document(r#"{"name":"nothing","fieldID":0,"fieldType":{"type":"void"}}"#);
        let codec = generate(&doc).unwrap();

        let mut staged = 0;
        crate::ir::walk(&codec.decode, &mut |stmt| {
            if matches!(stmt, Stmt::Stage { .. }) {
                staged += 1;
            }
        });
        assert_eq!(staged, 0);
        assert!(!codec
            .encode
            .iter()
            .any(|s| matches!(s, Stmt::IfPresent { .. })));
    }
}
