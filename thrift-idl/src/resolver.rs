//! Symbol table and identifier resolution.
//!
//! Every visible definition is merged into one flat namespace. Identifier
//! references found in field types are resolved against it; typedef chains
//! are unwrapped here so that downstream code never has to follow them.

use crate::error::{DefinitionRole, ResolveError};
use crate::search::suggest_similar;
use crate::types::*;
use crate::utils::base_name;
use std::collections::{HashMap, HashSet};

const SUGGESTION_DISTANCE: usize = 3;

/// A definition as stored in the symbol table.
#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    StructLike {
        kind: StructKind,
        definition: &'a StructLike,
    },
    Enum(&'a EnumDefinition),
    Typedef(&'a TypedefDefinition),
    Const(&'a ConstDefinition),
    Service(&'a ServiceDefinition),
}

/// Result of resolving an identifier reference.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedIdentifier<'a> {
    StructLike {
        kind: StructKind,
        definition: &'a StructLike,
    },
    Enum(&'a EnumDefinition),
    /// `underlying` is never itself an identifier naming another typedef.
    Typedef {
        definition: &'a TypedefDefinition,
        underlying: &'a FieldType,
    },
    Const(&'a ConstDefinition),
    Service(&'a ServiceDefinition),
}

impl<'a> ResolvedIdentifier<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            ResolvedIdentifier::StructLike { definition, .. } => &definition.name,
            ResolvedIdentifier::Enum(def) => &def.name,
            ResolvedIdentifier::Typedef { definition, .. } => &definition.name,
            ResolvedIdentifier::Const(def) => &def.name,
            ResolvedIdentifier::Service(def) => &def.name,
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable<'a> {
    definitions: HashMap<&'a str, Definition<'a>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(document: &'a ThriftDocument) -> Result<Self, ResolveError> {
        Self::from_documents(std::slice::from_ref(document))
    }

    /// Merge the definitions of several documents (a file and its includes).
    pub fn from_documents(documents: &'a [ThriftDocument]) -> Result<Self, ResolveError> {
        let mut definitions = HashMap::new();

        for statement in documents.iter().flat_map(|doc| doc.body.iter()) {
            let definition = match statement {
                Statement::Namespace(_) | Statement::Include(_) => continue,
                Statement::Const(def) => Definition::Const(def),
                Statement::Struct(def) => Definition::StructLike {
                    kind: StructKind::Struct,
                    definition: def,
                },
                Statement::Union(def) => Definition::StructLike {
                    kind: StructKind::Union,
                    definition: def,
                },
                Statement::Exception(def) => Definition::StructLike {
                    kind: StructKind::Exception,
                    definition: def,
                },
                Statement::Enum(def) => Definition::Enum(def),
                Statement::Typedef(def) => Definition::Typedef(def),
                Statement::Service(def) => Definition::Service(def),
            };
            let Some(name) = statement.definition_name() else {
                continue;
            };
            if definitions.insert(name, definition).is_some() {
                return Err(ResolveError::DuplicateDefinition {
                    name: name.to_string(),
                });
            }
        }

        let table = SymbolTable { definitions };
        table.validate_typedefs()?;

        tracing::debug!(
            "Built symbol table with {} definitions from {} document(s)",
            table.definitions.len(),
            documents.len()
        );

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Exact name first, then the last segment of an include-qualified name.
    pub fn lookup(&self, name: &str) -> Option<Definition<'a>> {
        self.definitions
            .get(name)
            .or_else(|| self.definitions.get(base_name(name)))
            .copied()
    }

    /// Resolve an identifier to whatever it names.
    pub fn resolve(&self, name: &str) -> Result<ResolvedIdentifier<'a>, ResolveError> {
        let definition = self.lookup(name).ok_or_else(|| self.unknown(name))?;

        Ok(match definition {
            Definition::StructLike { kind, definition } => {
                ResolvedIdentifier::StructLike { kind, definition }
            }
            Definition::Enum(def) => ResolvedIdentifier::Enum(def),
            Definition::Typedef(def) => ResolvedIdentifier::Typedef {
                definition: def,
                underlying: self.underlying_type(def)?,
            },
            Definition::Const(def) => ResolvedIdentifier::Const(def),
            Definition::Service(def) => ResolvedIdentifier::Service(def),
        })
    }

    /// Resolve an identifier that appears in type position.
    pub fn resolve_type(&self, name: &str) -> Result<ResolvedIdentifier<'a>, ResolveError> {
        let resolved = self.resolve(name)?;
        match resolved {
            ResolvedIdentifier::Const(def) => Err(ResolveError::TypeMisuse {
                name: def.name.clone(),
                role: DefinitionRole::Const,
            }),
            ResolvedIdentifier::Service(def) => Err(ResolveError::TypeMisuse {
                name: def.name.clone(),
                role: DefinitionRole::Service,
            }),
            _ => Ok(resolved),
        }
    }

    pub fn struct_like(&self, name: &str) -> Option<(StructKind, &'a StructLike)> {
        match self.lookup(name)? {
            Definition::StructLike { kind, definition } => Some((kind, definition)),
            _ => None,
        }
    }

    pub fn service(&self, name: &str) -> Result<&'a ServiceDefinition, ResolveError> {
        match self.lookup(name) {
            Some(Definition::Service(def)) => Ok(def),
            _ => Err(self.unknown(name)),
        }
    }

    /// Numeric value of an `Enum.MEMBER` reference.
    pub fn resolve_enum_member(&self, reference: &str) -> Result<i32, ResolveError> {
        let not_found = || ResolveError::UnknownEnumMember {
            name: reference.to_string(),
        };
        let (enum_name, member) = reference.rsplit_once('.').ok_or_else(not_found)?;
        let Some(Definition::Enum(def)) = self.lookup(enum_name) else {
            return Err(not_found());
        };
        def.member_values()
            .into_iter()
            .find(|(name, _)| *name == member)
            .map(|(_, value)| value)
            .ok_or_else(not_found)
    }

    /// Follow a typedef chain to the first type that is not a typedef reference.
    fn underlying_type(&self, typedef: &'a TypedefDefinition) -> Result<&'a FieldType, ResolveError> {
        let mut chain = vec![typedef.name.clone()];
        let mut seen: HashSet<&str> = HashSet::from([typedef.name.as_str()]);
        let mut current = &typedef.definition_type;

        while let FieldType::Identifier { value } = current {
            let Some(Definition::Typedef(next)) = self.lookup(value) else {
                break;
            };
            chain.push(next.name.clone());
            if !seen.insert(next.name.as_str()) {
                return Err(ResolveError::TypedefCycle { chain });
            }
            current = &next.definition_type;
        }

        Ok(current)
    }

    /// Reject typedefs that reach themselves, directly or through container
    /// element types. Struct references end the walk: those recurse through
    /// generated procedures, not through the type expression.
    fn validate_typedefs(&self) -> Result<(), ResolveError> {
        for definition in self.definitions.values() {
            if let Definition::Typedef(def) = definition {
                let mut stack = vec![def.name.clone()];
                self.walk_typedef(&def.definition_type, &mut stack)?;
            }
        }
        Ok(())
    }

    fn walk_typedef(&self, ty: &FieldType, stack: &mut Vec<String>) -> Result<(), ResolveError> {
        match ty {
            FieldType::List { value_type } | FieldType::Set { value_type } => {
                self.walk_typedef(value_type, stack)
            }
            FieldType::Map {
                key_type,
                value_type,
            } => {
                self.walk_typedef(key_type, stack)?;
                self.walk_typedef(value_type, stack)
            }
            FieldType::Identifier { value } => {
                let Some(Definition::Typedef(next)) = self.lookup(value) else {
                    return Ok(());
                };
                if stack.iter().any(|name| name == &next.name) {
                    let mut chain = stack.clone();
                    chain.push(next.name.clone());
                    return Err(ResolveError::TypedefCycle { chain });
                }
                stack.push(next.name.clone());
                self.walk_typedef(&next.definition_type, stack)?;
                stack.pop();
                Ok(())
            }
            FieldType::Bool
            | FieldType::Byte
            | FieldType::I8
            | FieldType::I16
            | FieldType::I32
            | FieldType::I64
            | FieldType::Double
            | FieldType::String
            | FieldType::Binary
            | FieldType::Void => Ok(()),
        }
    }

    fn unknown(&self, name: &str) -> ResolveError {
        let candidates: Vec<&str> = self.definitions.keys().copied().collect();
        ResolveError::UnknownIdentifier {
            name: name.to_string(),
            suggestions: suggest_similar(name, &candidates, SUGGESTION_DISTANCE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typedef(name: &str, ty: FieldType) -> Statement {
        Statement::Typedef(TypedefDefinition {
            name: name.to_string(),
            definition_type: ty,
        })
    }

    fn document() -> ThriftDocument {
        ThriftDocument {
            body: vec![
                Statement::Struct(StructLike {
                    name: "User".to_string(),
                    fields: vec![FieldDefinition::new("id", 1, FieldType::I64)],
                }),
                Statement::Enum(EnumDefinition {
                    name: "Color".to_string(),
                    members: vec![
                        EnumMember {
                            name: "RED".to_string(),
                            initializer: None,
                        },
                        EnumMember {
                            name: "GREEN".to_string(),
                            initializer: Some(5),
                        },
                    ],
                }),
                typedef("UserId", FieldType::I64),
                typedef("AccountId", FieldType::identifier("UserId")),
                typedef("Users", FieldType::list(FieldType::identifier("User"))),
                Statement::Const(ConstDefinition {
                    name: "MAX_USERS".to_string(),
                    field_type: FieldType::I32,
                    initializer: ConstValue::Int(10),
                }),
                Statement::Service(ServiceDefinition {
                    name: "UserService".to_string(),
                    extends: None,
                    functions: vec![],
                }),
            ],
        }
    }

    #[test]
    fn test_resolve_struct_and_enum() {
        let doc = document();
        let table = SymbolTable::new(&doc).unwrap();

        assert!(matches!(
            table.resolve_type("User").unwrap(),
            ResolvedIdentifier::StructLike {
                kind: StructKind::Struct,
                ..
            }
        ));
        assert!(matches!(
            table.resolve_type("Color").unwrap(),
            ResolvedIdentifier::Enum(_)
        ));
        assert!(table.resolve_type("shared.User").is_ok());
    }

    #[test]
    fn test_typedef_chain_is_unwrapped() {
        let doc = document();
        let table = SymbolTable::new(&doc).unwrap();

        match table.resolve_type("AccountId").unwrap() {
            ResolvedIdentifier::Typedef { underlying, .. } => {
                assert_eq!(underlying, &FieldType::I64)
            }
            other => panic!("expected typedef, got {:?}", other),
        }
    }

    #[test]
    fn test_const_and_service_are_type_misuse() {
        let doc = document();
        let table = SymbolTable::new(&doc).unwrap();

        let err = table.resolve_type("MAX_USERS").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::TypeMisuse {
                role: DefinitionRole::Const,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Identifier MAX_USERS is a value being used as a type"
        );

        assert!(matches!(
            table.resolve_type("UserService"),
            Err(ResolveError::TypeMisuse {
                role: DefinitionRole::Service,
                ..
            })
        ));
        // Plain resolution still reports what the name is.
        assert!(matches!(
            table.resolve("MAX_USERS").unwrap(),
            ResolvedIdentifier::Const(_)
        ));
    }

    #[test]
    fn test_unknown_identifier_suggests() {
        let doc = document();
        let table = SymbolTable::new(&doc).unwrap();

        let err = table.resolve("Usr").unwrap_err();
        assert!(err.to_string().contains("Did you mean: User?"), "{}", err);
    }

    #[test]
    fn test_typedef_cycle_detected() {
        let doc = ThriftDocument {
            body: vec![
                typedef("A", FieldType::identifier("B")),
                typedef("B", FieldType::identifier("A")),
            ],
        };
        assert!(matches!(
            SymbolTable::new(&doc),
            Err(ResolveError::TypedefCycle { .. })
        ));
    }

    #[test]
    fn test_typedef_cycle_through_container_detected() {
        let doc = ThriftDocument {
            body: vec![typedef("Tree", FieldType::list(FieldType::identifier("Tree")))],
        };
        let err = SymbolTable::new(&doc).unwrap_err();
        assert_eq!(err.to_string(), "Typedef cycle detected: Tree -> Tree");
    }

    #[test]
    fn test_duplicate_definition() {
        let doc = ThriftDocument {
            body: vec![typedef("A", FieldType::I32), typedef("A", FieldType::I64)],
        };
        assert!(matches!(
            SymbolTable::new(&doc),
            Err(ResolveError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn test_enum_member_lookup() {
        let doc = document();
        let table = SymbolTable::new(&doc).unwrap();

        assert_eq!(table.resolve_enum_member("Color.RED").unwrap(), 0);
        assert_eq!(table.resolve_enum_member("Color.GREEN").unwrap(), 5);
        assert!(table.resolve_enum_member("Color.BLUE").is_err());
        assert!(table.resolve_enum_member("RED").is_err());
    }
}
