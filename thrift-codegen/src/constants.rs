//! Lowering of constant literals (field defaults, const initializers) into
//! runtime values of the declared type.

use crate::codec::MAX_TYPE_DEPTH;
use crate::error::CodegenError;
use crate::value::{StructValue, Value};
use thrift_idl::{ConstValue, Definition, FieldType, ResolvedIdentifier, SymbolTable};

/// Lower `literal` to a value of `field_type`. `field` names the slot for
/// diagnostics.
pub fn lower_const(
    literal: &ConstValue,
    field_type: &FieldType,
    symbols: &SymbolTable,
    field: &str,
) -> Result<Value, CodegenError> {
    Lowering { symbols, field }.lower(literal, field_type, 0)
}

struct Lowering<'s, 'a> {
    symbols: &'s SymbolTable<'a>,
    field: &'s str,
}

impl Lowering<'_, '_> {
    fn invalid(&self, reason: impl Into<String>) -> CodegenError {
        CodegenError::InvalidDefault {
            field: self.field.to_string(),
            reason: reason.into(),
        }
    }

    fn lower(&self, literal: &ConstValue, field_type: &FieldType, depth: usize) -> Result<Value, CodegenError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(self.invalid("constant nests too deeply"));
        }

        if let ConstValue::Identifier(reference) = literal {
            return self.lower_reference(reference, field_type, depth);
        }

        match field_type {
            FieldType::Bool => match literal {
                ConstValue::Bool(b) => Ok(Value::Bool(*b)),
                ConstValue::Int(0) => Ok(Value::Bool(false)),
                ConstValue::Int(1) => Ok(Value::Bool(true)),
                other => Err(self.mismatch("bool", other)),
            },
            FieldType::Byte | FieldType::I8 => {
                let v = self.int(literal, "byte")?;
                i8::try_from(v)
                    .map(Value::Byte)
                    .map_err(|_| self.invalid(format!("{} does not fit in a byte", v)))
            }
            FieldType::I16 => {
                let v = self.int(literal, "i16")?;
                i16::try_from(v)
                    .map(Value::I16)
                    .map_err(|_| self.invalid(format!("{} does not fit in an i16", v)))
            }
            FieldType::I32 => {
                let v = self.int(literal, "i32")?;
                i32::try_from(v)
                    .map(Value::I32)
                    .map_err(|_| self.invalid(format!("{} does not fit in an i32", v)))
            }
            FieldType::I64 => Ok(Value::I64(self.int(literal, "i64")?)),
            FieldType::Double => match literal {
                ConstValue::Double(d) => Ok(Value::Double(*d)),
                ConstValue::Int(i) => Ok(Value::Double(*i as f64)),
                other => Err(self.mismatch("double", other)),
            },
            FieldType::String => match literal {
                ConstValue::String(s) => Ok(Value::String(s.clone())),
                other => Err(self.mismatch("string", other)),
            },
            FieldType::Binary => match literal {
                ConstValue::String(s) => Ok(Value::Binary(s.as_bytes().to_vec())),
                other => Err(self.mismatch("binary", other)),
            },
            FieldType::List { value_type } | FieldType::Set { value_type } => {
                let ConstValue::List(items) = literal else {
                    return Err(self.mismatch(&field_type.display_name(), literal));
                };
                let values = items
                    .iter()
                    .map(|item| self.lower(item, value_type, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match field_type {
                    FieldType::Set { .. } => Value::Set(values),
                    _ => Value::List(values),
                })
            }
            FieldType::Map {
                key_type,
                value_type,
            } => {
                let ConstValue::Map(entries) = literal else {
                    return Err(self.mismatch(&field_type.display_name(), literal));
                };
                let pairs = entries
                    .iter()
                    .map(|entry| -> Result<(Value, Value), CodegenError> {
                        Ok((
                            self.lower(&entry.key, key_type, depth + 1)?,
                            self.lower(&entry.value, value_type, depth + 1)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Map(pairs))
            }
            FieldType::Identifier { value } => match self.symbols.resolve_type(value)? {
                ResolvedIdentifier::Typedef { underlying, .. } => {
                    self.lower(literal, underlying, depth + 1)
                }
                ResolvedIdentifier::Enum(_) => {
                    let v = self.int(literal, "enum")?;
                    i32::try_from(v)
                        .map(Value::I32)
                        .map_err(|_| self.invalid(format!("{} does not fit in an enum", v)))
                }
                ResolvedIdentifier::StructLike { definition, .. } => {
                    let ConstValue::Map(entries) = literal else {
                        return Err(self.mismatch(&definition.name, literal));
                    };
                    let mut instance = StructValue::new(definition.name.clone());
                    for entry in entries {
                        let ConstValue::String(key) = &entry.key else {
                            return Err(self.invalid("struct constant keys must be strings"));
                        };
                        let slot = definition
                            .fields
                            .iter()
                            .find(|f| &f.name == key)
                            .ok_or_else(|| {
                                self.invalid(format!("{} has no field {}", definition.name, key))
                            })?;
                        let value = self.lower(&entry.value, &slot.field_type, depth + 1)?;
                        instance.set(key.clone(), value);
                    }
                    Ok(Value::Struct(instance))
                }
                ResolvedIdentifier::Const(_) | ResolvedIdentifier::Service(_) => Err(
                    CodegenError::Internal(format!("{} resolved to a non-type definition", value)),
                ),
            },
            FieldType::Void => Err(self.invalid("void fields cannot carry a default")),
        }
    }

    /// `Enum.MEMBER` or the name of another constant.
    fn lower_reference(&self, reference: &str, field_type: &FieldType, depth: usize) -> Result<Value, CodegenError> {
        if let Some(Definition::Const(def)) = self.symbols.lookup(reference) {
            return self.lower(&def.initializer, field_type, depth + 1);
        }
        let member = self
            .symbols
            .resolve_enum_member(reference)
            .map_err(|_| self.invalid(format!("{} is neither a constant nor an enum member", reference)))?;
        self.lower(&ConstValue::Int(i64::from(member)), field_type, depth + 1)
    }

    fn int(&self, literal: &ConstValue, expected: &str) -> Result<i64, CodegenError> {
        match literal {
            ConstValue::Int(v) => Ok(*v),
            other => Err(self.mismatch(expected, other)),
        }
    }

    fn mismatch(&self, expected: &str, literal: &ConstValue) -> CodegenError {
        let found = match literal {
            ConstValue::Int(_) => "int",
            ConstValue::Double(_) => "double",
            ConstValue::Bool(_) => "bool",
            ConstValue::String(_) => "string",
            ConstValue::List(_) => "list",
            ConstValue::Map(_) => "map",
            ConstValue::Identifier(_) => "identifier",
        };
        self.invalid(format!("expected {} literal, found {}", expected, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift_idl::{parse_document_content, ConstEntry, ThriftDocument};

    fn document() -> ThriftDocument {
        parse_document_content(
            r#"{"body":[
                {"type":"EnumDefinition","name":"Status","members":[{"name":"ACTIVE"},{"name":"GONE","initializer":9}]},
                {"type":"ConstDefinition","name":"LIMIT","fieldType":{"type":"i32"},"initializer":{"type":"int","value":100}},
                {"type":"StructDefinition","name":"Point","fields":[
                    {"name":"x","fieldID":1,"fieldType":{"type":"i32"}},
                    {"name":"y","fieldID":2,"fieldType":{"type":"i32"}}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_enum_member_and_const_references() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();

        let status = lower_const(
            &ConstValue::Identifier("Status.GONE".into()),
            &FieldType::identifier("Status"),
            &symbols,
            "status",
        )
        .unwrap();
        assert_eq!(status, Value::I32(9));

        let quota = lower_const(
            &ConstValue::Identifier("LIMIT".into()),
            &FieldType::I32,
            &symbols,
            "quota",
        )
        .unwrap();
        assert_eq!(quota, Value::I32(100));
    }

    #[test]
    fn test_out_of_range_is_invalid_default() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();

        let err = lower_const(&ConstValue::Int(300), &FieldType::Byte, &symbols, "flags").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid default value for flags: 300 does not fit in a byte"
        );
    }

    #[test]
    fn test_struct_literal() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();
        let literal = ConstValue::Map(vec![ConstEntry {
            key: ConstValue::String("x".into()),
            value: ConstValue::Int(4),
        }]);

        let value = lower_const(&literal, &FieldType::identifier("Point"), &symbols, "origin").unwrap();
        assert_eq!(value, Value::Struct(StructValue::new("Point").with("x", 4)));
    }

    #[test]
    fn test_container_literals() {
        let doc = document();
        let symbols = SymbolTable::new(&doc).unwrap();
        let literal = ConstValue::List(vec![ConstValue::String("a".into())]);

        assert_eq!(
            lower_const(&literal, &FieldType::set(FieldType::String), &symbols, "tags").unwrap(),
            Value::Set(vec![Value::from("a")])
        );
        assert!(lower_const(&literal, &FieldType::I32, &symbols, "count").is_err());
    }
}
