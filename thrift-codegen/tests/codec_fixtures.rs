use std::path::PathBuf;
use thrift_codegen::{
    compile_document, BinaryProtocol, CompiledDocument, MemoryTransport, Protocol, ProtocolErrorKind, StructValue,
    TypeScriptCompiler, Value, Vm, WireType,
};
use thrift_idl::{parse_document_content, parse_document_file, ThriftDocument};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load() -> (ThriftDocument, CompiledDocument) {
    let document = parse_document_file(fixture_path("user_service.json")).expect("fixture should parse");
    let compiled = compile_document(&document).expect("fixture should compile");
    (document, compiled)
}

fn encode(vm: &Vm, value: &StructValue) -> Vec<u8> {
    let mut output = BinaryProtocol::new(MemoryTransport::new());
    vm.encode(value, &mut output).expect("encode should succeed");
    output.flush().unwrap();
    output.transport().written().to_vec()
}

fn decode(vm: &Vm, name: &str, bytes: &[u8]) -> thrift_codegen::Result<StructValue> {
    let mut input = BinaryProtocol::new(MemoryTransport::with_input(bytes));
    vm.decode(name, &mut input)
}

fn sample_user() -> StructValue {
    StructValue::new("User")
        .with("id", Value::I64(7))
        .with("name", "ada")
        .with("tags", Value::Set(vec!["admin".into()]))
        .with(
            "attributes",
            Value::List(vec![
                Value::Map(vec![]),
                Value::Map(vec![
                    ("x".into(), Value::I32(1)),
                    ("y".into(), Value::I32(2)),
                ]),
            ]),
        )
}

#[test]
fn test_compile_fixture() {
    let (_, compiled) = load();

    // 3 declared + args for 4 methods + results for 3 two-way methods
    assert_eq!(compiled.structs.len(), 10);
    let service = compiled.service("UserService").unwrap();
    let names: Vec<_> = service.method_names().collect();
    assert_eq!(names, vec!["ping", "getUser", "countUsers", "touch"]);
    assert_eq!(service.method("ping").unwrap().declared_in, "BaseService");
    assert!(compiled.struct_codec("UserServiceTouchResult").is_none());
}

#[test]
fn test_user_round_trip_applies_defaults() {
    let (_, compiled) = load();
    let vm = Vm::new(&compiled);

    let bytes = encode(&vm, &sample_user());
    let decoded = decode(&vm, "User", &bytes).unwrap();

    let expected = sample_user()
        .with("status", Value::I32(0))
        .with("quota", Value::I32(100));
    assert_eq!(decoded, expected);
}

#[test]
fn test_nested_container_headers() {
    let (_, compiled) = load();
    let bytes = encode(&Vm::new(&compiled), &sample_user());

    // field 6 LIST of MAP, 2 elements: an empty map<string,i32>, then one with 2 entries
    let expected: [u8; 20] = [
        0x0F, 0x00, 0x06, 0x0D, 0, 0, 0, 2, 0x0B, 0x08, 0, 0, 0, 0, 0x0B, 0x08, 0, 0, 0, 2,
    ];
    assert!(
        bytes.windows(expected.len()).any(|w| w == expected),
        "container headers not found in {:02x?}",
        bytes
    );
}

#[test]
fn test_empty_args_encode_to_stop() {
    let (_, compiled) = load();
    let vm = Vm::new(&compiled);
    let bytes = encode(&vm, &StructValue::new("BaseServicePingArgs"));
    assert_eq!(bytes, vec![0x00]);

    let decoded = decode(&vm, "BaseServicePingArgs", &[0x00]).unwrap();
    assert!(decoded.is_empty());
    assert_eq!(encode(&vm, &decoded), vec![0x00]);
}

const SCALARS: &str = r#"{"body":[
    {"type":"StructDefinition","name":"Scalars","fields":[
        {"name":"flag","fieldID":1,"fieldType":{"type":"bool"}},
        {"name":"small","fieldID":2,"fieldType":{"type":"byte"}},
        {"name":"tiny","fieldID":3,"fieldType":{"type":"i8"}},
        {"name":"short","fieldID":4,"fieldType":{"type":"i16"}},
        {"name":"ratio","fieldID":5,"fieldType":{"type":"double"}},
        {"name":"blob","fieldID":6,"fieldType":{"type":"binary"}}
    ]}
]}"#;

#[test]
fn test_scalar_field_layout() {
    let document = parse_document_content(SCALARS).unwrap();
    let compiled = compile_document(&document).unwrap();
    let vm = Vm::new(&compiled);
    let value = StructValue::new("Scalars")
        .with("flag", true)
        .with("small", Value::Byte(-2))
        .with("tiny", Value::Byte(127))
        .with("short", Value::I16(-300))
        .with("ratio", Value::Double(1.5))
        .with("blob", Value::Binary(vec![0x00, 0xff, 0x07]));

    let bytes = encode(&vm, &value);
    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x02, 0x00, 0x01, 0x01,
        0x03, 0x00, 0x02, 0xfe,
        0x03, 0x00, 0x03, 0x7f,
        0x06, 0x00, 0x04, 0xfe, 0xd4,
        0x04, 0x00, 0x05, 0x3f, 0xf8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x0b, 0x00, 0x06, 0x00, 0x00, 0x00, 0x03, 0x00, 0xff, 0x07,
        0x00,
    ];
    assert_eq!(bytes, expected);
    assert_eq!(decode(&vm, "Scalars", &bytes).unwrap(), value);
}

#[test]
fn test_undeclared_enum_value_passes_through() {
    let (_, compiled) = load();
    let vm = Vm::new(&compiled);
    let user = sample_user().with("status", Value::I32(99));

    let decoded = decode(&vm, "User", &encode(&vm, &user)).unwrap();
    assert_eq!(decoded.get("status"), Some(&Value::I32(99)));
}

#[test]
fn test_unknown_fields_are_skipped() {
    let (_, compiled) = load();
    let mut output = BinaryProtocol::new(MemoryTransport::new());
    output.write_field_begin("extra", WireType::String, 9).unwrap();
    output.write_string("zz").unwrap();
    output.write_field_begin("message", WireType::String, 1).unwrap();
    output.write_string("gone").unwrap();
    output.write_field_stop().unwrap();
    output.flush().unwrap();

    let decoded = decode(&Vm::new(&compiled), "NotFound", &output.transport().written()).unwrap();
    assert_eq!(decoded, StructValue::new("NotFound").with("message", "gone"));
}

#[test]
fn test_wire_type_mismatch_is_skipped() {
    let (_, compiled) = load();
    let mut output = BinaryProtocol::new(MemoryTransport::new());
    output.write_field_begin("message", WireType::I32, 1).unwrap();
    output.write_i32(404).unwrap();
    output.write_field_stop().unwrap();
    output.flush().unwrap();

    let decoded = decode(&Vm::new(&compiled), "NotFound", &output.transport().written()).unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn test_required_fields() {
    let (_, compiled) = load();
    let vm = Vm::new(&compiled);

    let mut output = BinaryProtocol::new(MemoryTransport::new());
    let err = vm
        .encode(&StructValue::new("User").with("id", Value::I64(1)), &mut output)
        .unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::MissingRequiredField));
    assert_eq!(err.to_string(), "Required field name is unset!");

    let mut output = BinaryProtocol::new(MemoryTransport::new());
    output.write_field_begin("id", WireType::I64, 1).unwrap();
    output.write_i64(1).unwrap();
    output.write_field_stop().unwrap();
    output.flush().unwrap();
    let err = decode(&vm, "User", &output.transport().written()).unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::MissingRequiredField));
    assert_eq!(err.to_string(), "Unable to read User from input");
}

#[test]
fn test_union_needs_exactly_one_field() {
    let (_, compiled) = load();
    let vm = Vm::new(&compiled);

    let both = StructValue::new("Lookup")
        .with("byId", Value::I64(1))
        .with("byName", "ada");
    let mut output = BinaryProtocol::new(MemoryTransport::new());
    let err = vm.encode(&both, &mut output).unwrap_err();
    assert_eq!(err.to_string(), "Union Lookup must have exactly one field set, found 2");

    let err = decode(&vm, "Lookup", &[0x00]).unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::InvalidData));
    assert_eq!(err.to_string(), "Union Lookup was decoded with no field set");

    let one = StructValue::new("Lookup").with("byName", "ada");
    assert_eq!(decode(&vm, "Lookup", &encode(&vm, &one)).unwrap(), one);
}

#[test]
fn test_wrong_value_type_is_invalid_data() {
    let (_, compiled) = load();
    let user = StructValue::new("User").with("id", 7).with("name", "ada");

    let mut output = BinaryProtocol::new(MemoryTransport::new());
    let err = Vm::new(&compiled).encode(&user, &mut output).unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::InvalidData));
    assert_eq!(err.to_string(), "Expected i64 value, found i32");
}

#[test]
fn test_compiled_document_serializes() {
    let (_, compiled) = load();
    let json = serde_json::to_value(&compiled).unwrap();

    let user = json["structs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "User")
        .unwrap();
    assert_eq!(user["decode"][0]["op"], "ReadStructBegin");
    assert_eq!(user["fields"][0]["wire_type"], "I64");
}

#[test]
fn test_typescript_for_fixture() {
    let (document, compiled) = load();
    let ts = TypeScriptCompiler::new(&document, &compiled)
        .compile()
        .unwrap()
        .full_file();

    assert!(ts.contains("export type UserId = thrift.Int64;"));
    assert!(ts.contains("export const DEFAULT_QUOTA: number = 100;"));
    assert!(ts.contains("export class User {"));
    assert!(ts.contains("export namespace UserService {"));
    assert!(ts.contains("public ping(): Promise<void> {"));
    assert!(ts.contains("public getUser(lookup: Lookup): Promise<User> {"));
    assert!(ts.contains("if (err instanceof NotFound) {"));
}
