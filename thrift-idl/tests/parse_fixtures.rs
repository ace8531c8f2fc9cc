use std::path::{Path, PathBuf};
use thrift_idl::parse::parse_document_file;
use thrift_idl::{resolve_namespace, ResolvedIdentifier, StructKind, SymbolTable};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_parse_user_service() {
    let document =
        parse_document_file(fixture_path("user_service.json")).expect("should parse user_service.json");

    assert_eq!(document.body.len(), 11, "user_service should have 11 statements");
    assert_eq!(document.struct_likes().count(), 3);
    assert_eq!(document.services().count(), 2);
    assert_eq!(document.includes().count(), 1);
}

#[test]
fn test_resolve_user_service_definitions() {
    let document = parse_document_file(fixture_path("user_service.json")).unwrap();
    let table = SymbolTable::new(&document).expect("symbol table should build");

    assert_eq!(table.len(), 8);
    assert!(matches!(
        table.resolve_type("Lookup").unwrap(),
        ResolvedIdentifier::StructLike {
            kind: StructKind::Union,
            ..
        }
    ));
    assert!(matches!(
        table.resolve_type("NotFound").unwrap(),
        ResolvedIdentifier::StructLike {
            kind: StructKind::Exception,
            ..
        }
    ));
    assert_eq!(table.resolve_enum_member("Status.DELETED").unwrap(), 5);
    assert_eq!(table.service("UserService").unwrap().extends.as_deref(), Some("BaseService"));
}

#[test]
fn test_user_service_namespace() {
    let document = parse_document_file(fixture_path("user_service.json")).unwrap();
    let namespace = resolve_namespace(Path::new("gen"), &document, "user_service");

    assert_eq!(namespace.name, "com.acme.users");
    assert_eq!(namespace.path, PathBuf::from("gen/users/user_service.ts"));
}
