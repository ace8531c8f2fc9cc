use crate::compiler::CompiledDocument;
use crate::constants::lower_const;
use crate::error::CodegenError;
use crate::ir::{walk, ContainerKind, Expr, FieldInit, ScalarKind, Stmt, ValueCodec};
use crate::protocol::WireType;
use crate::service::{MethodCodec, ServiceCodec, SUCCESS_FIELD};
use crate::structs::StructCodec;
use crate::value::Value;
use std::collections::HashMap;
use thrift_idl::utils::base_name;
use thrift_idl::{FieldType, ResolvedIdentifier, Statement, StructKind, SymbolTable, ThriftDocument};

/// Output structure for TypeScript generation
#[derive(Debug, Clone)]
pub struct TypeScriptOutput {
    pub imports: String,
    pub body: String,
}

impl TypeScriptOutput {
    pub fn full_file(&self) -> String {
        format!("{}\n\n{}", self.imports, self.body)
    }
}

/// Configuration for TypeScript generation
#[derive(Debug, Clone)]
pub struct TypeScriptConfig {
    /// Module the generated code imports as `thrift`.
    pub thrift_import: String,
    pub indent: usize,
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            thrift_import: "@creditkarma/thrift-server-core".to_string(),
            indent: 4,
        }
    }
}

impl TypeScriptConfig {
    pub fn with_thrift_import(mut self, module: impl Into<String>) -> Self {
        self.thrift_import = module.into();
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

/// Renders a compiled document as TypeScript classes.
pub struct TypeScriptCompiler<'d> {
    document: &'d ThriftDocument,
    compiled: &'d CompiledDocument,
    config: TypeScriptConfig,
}

impl<'d> TypeScriptCompiler<'d> {
    pub fn new(document: &'d ThriftDocument, compiled: &'d CompiledDocument) -> Self {
        Self {
            document,
            compiled,
            config: TypeScriptConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TypeScriptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compile(&self) -> Result<TypeScriptOutput, CodegenError> {
        let symbols = SymbolTable::new(self.document)?;
        let renderer = Renderer {
            symbols: &symbols,
            compiled: self.compiled,
        };
        let mut out = Emitter::new(self.config.indent);

        for statement in &self.document.body {
            match statement {
                Statement::Enum(def) => {
                    out.open(format!("export enum {} {{", def.name));
                    for (name, value) in def.member_values() {
                        out.line(format!("{} = {},", name, value));
                    }
                    out.close("}");
                    out.blank();
                }
                Statement::Typedef(def) => {
                    out.line(format!(
                        "export type {} = {};",
                        def.name,
                        ts_type(&def.definition_type)
                    ));
                    out.blank();
                }
                Statement::Const(def) => {
                    let value = lower_const(&def.initializer, &def.field_type, &symbols, &def.name)?;
                    out.line(format!(
                        "export const {}: {} = {};",
                        def.name,
                        ts_type(&def.field_type),
                        literal(&value)
                    ));
                    out.blank();
                }
                _ => {}
            }
        }

        for codec in &self.compiled.structs {
            renderer.render_struct(&mut out, codec);
            out.blank();
        }

        for service in &self.compiled.services {
            renderer.render_service(&mut out, service);
            out.blank();
        }

        Ok(TypeScriptOutput {
            imports: format!(
                "/* Autogenerated by thriftc. DO NOT EDIT. */\nimport * as thrift from \"{}\";",
                self.config.thrift_import
            ),
            body: out.finish(),
        })
    }
}

struct Emitter {
    out: String,
    indent: String,
    level: usize,
}

impl Emitter {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent: " ".repeat(indent),
            level: 0,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.level {
            self.out.push_str(&self.indent);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.level += 1;
    }

    fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.dedent();
        self.line(text);
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Per-procedure state: the struct being rendered and the IDL types of its locals.
struct Procedure<'c> {
    codec: &'c StructCodec,
    locals: HashMap<String, FieldType>,
}

struct Renderer<'r, 'a> {
    symbols: &'r SymbolTable<'a>,
    compiled: &'r CompiledDocument,
}

impl<'r, 'a> Renderer<'r, 'a> {
    /// Typedefs replaced by what they alias.
    fn underlying(&self, ty: &FieldType) -> FieldType {
        if let FieldType::Identifier { value } = ty {
            if let Ok(ResolvedIdentifier::Typedef { underlying, .. }) = self.symbols.resolve_type(value) {
                return underlying.clone();
            }
        }
        ty.clone()
    }

    fn bind_elements(
        &self,
        locals: &mut HashMap<String, FieldType>,
        container: &FieldType,
        key: Option<&str>,
        value: &str,
    ) {
        match self.underlying(container) {
            FieldType::List { value_type } | FieldType::Set { value_type } => {
                locals.insert(value.to_string(), *value_type);
            }
            FieldType::Map {
                key_type,
                value_type,
            } => {
                if let Some(key) = key {
                    locals.insert(key.to_string(), *key_type);
                }
                locals.insert(value.to_string(), *value_type);
            }
            _ => {}
        }
    }

    /// Decode locals only learn their type at the `Stage` that consumes them,
    /// so types flow outward-in from staged fields through container inserts.
    fn decode_locals(&self, codec: &StructCodec) -> HashMap<String, FieldType> {
        let mut locals = HashMap::new();
        let mut inserts = Vec::new();
        walk(&codec.decode, &mut |stmt| match stmt {
            Stmt::Stage { field, value } => {
                if let Some(layout) = codec.field(field) {
                    locals.insert(value.clone(), layout.field_type.clone());
                }
            }
            Stmt::Insert {
                container,
                key,
                value,
                ..
            } => inserts.push((container.as_str(), key.as_deref(), value.as_str())),
            _ => {}
        });

        let mut changed = true;
        while changed {
            changed = false;
            for (container, key, value) in &inserts {
                if locals.contains_key(*value) {
                    continue;
                }
                if let Some(container_type) = locals.get(*container).cloned() {
                    self.bind_elements(&mut locals, &container_type, *key, value);
                    changed |= locals.contains_key(*value);
                }
            }
        }
        locals
    }

    fn render_struct(&self, out: &mut Emitter, codec: &StructCodec) {
        let fields: Vec<_> = codec
            .fields
            .iter()
            .filter(|f| f.wire_type != WireType::Void)
            .collect();

        out.open(format!("export class {} {{", codec.name));
        for field in &fields {
            out.line(format!("public {}?: {};", field.name, ts_type(&field.field_type)));
        }

        let params = fields
            .iter()
            .map(|f| format!("{}?: {}", f.name, ts_type(&f.field_type)))
            .collect::<Vec<_>>()
            .join("; ");
        out.open(format!("constructor(args: {{ {} }} = {{}}) {{", params));
        for field in &fields {
            out.open(format!("if (args.{} != null) {{", field.name));
            out.line(format!("this.{} = args.{};", field.name, field.name));
            out.close("}");
        }
        out.close("}");

        out.open("public write(output: thrift.TProtocol): void {");
        let mut encode = Procedure {
            codec,
            locals: HashMap::new(),
        };
        self.render_stmts(out, &codec.encode, &mut encode);
        out.line("return;");
        out.close("}");

        out.open(format!("public static read(input: thrift.TProtocol): {} {{", codec.name));
        out.line("const _args: any = {};");
        let mut decode = Procedure {
            codec,
            locals: self.decode_locals(codec),
        };
        self.render_stmts(out, &codec.decode, &mut decode);
        out.close("}");
        out.close("}");
    }

    fn local_type(&self, proc: &Procedure, name: &str) -> Option<String> {
        proc.locals.get(name).map(|ty| ts_type(&self.underlying(ty)))
    }

    fn expr_type(&self, proc: &Procedure, expr: &Expr) -> Option<FieldType> {
        match expr {
            Expr::This => None,
            Expr::Local { name } => proc.locals.get(name).cloned(),
            Expr::Field { base, name } => match base.as_ref() {
                Expr::This => proc.codec.field(name).map(|f| f.field_type.clone()),
                _ => None,
            },
        }
    }

    fn render_stmts(&self, out: &mut Emitter, stmts: &[Stmt], proc: &mut Procedure) {
        for stmt in stmts {
            self.render_stmt(out, stmt, proc);
        }
    }

    fn render_stmt(&self, out: &mut Emitter, stmt: &Stmt, proc: &mut Procedure) {
        match stmt {
            Stmt::ReadStructBegin => out.line("input.readStructBegin();"),
            Stmt::ReadStructEnd => out.line("input.readStructEnd();"),
            Stmt::ReadFieldBegin { header } => out.line(format!(
                "const {}: thrift.IThriftField = input.readFieldBegin();",
                header
            )),
            Stmt::ReadFieldEnd => out.line("input.readFieldEnd();"),
            Stmt::ReadContainerBegin { kind, metadata } => out.line(format!(
                "const {}: thrift.IThrift{} = input.read{}Begin();",
                metadata,
                kind.name(),
                kind.name()
            )),
            Stmt::ReadContainerEnd { kind } => out.line(format!("input.read{}End();", kind.name())),
            Stmt::Read { codec, dest } => {
                let ty = self
                    .local_type(proc, dest)
                    .unwrap_or_else(|| codec_type(codec));
                let read = match codec {
                    ValueCodec::Scalar { kind } => format!("input.read{}()", kind.method_suffix()),
                    ValueCodec::Struct { name } => format!("{}.read(input)", name),
                };
                out.line(format!("const {}: {} = {};", dest, ty, read));
            }
            Stmt::NewContainer { kind, dest } => {
                let ty = self.local_type(proc, dest).unwrap_or_else(|| match kind {
                    ContainerKind::List { .. } => "Array<any>".to_string(),
                    ContainerKind::Set { .. } => "Set<any>".to_string(),
                    ContainerKind::Map { .. } => "Map<any, any>".to_string(),
                });
                out.line(format!("const {}: {} = new {}();", dest, ty, ty));
            }
            Stmt::Insert {
                kind,
                container,
                key,
                value,
            } => match (kind, key) {
                (ContainerKind::Map { .. }, Some(key)) => {
                    out.line(format!("{}.set({}, {});", container, key, value))
                }
                (ContainerKind::Set { .. }, _) => out.line(format!("{}.add({});", container, value)),
                _ => out.line(format!("{}.push({});", container, value)),
            },
            Stmt::Skip { header } => out.line(format!("input.skip({}.fieldType);", header)),
            Stmt::Loop { body } => {
                out.open("while (true) {");
                self.render_stmts(out, body, proc);
                out.close("}");
            }
            Stmt::BreakIfStop { header } => {
                out.open(format!("if ({}.fieldType === thrift.TType.STOP) {{", header));
                out.line("break;");
                out.close("}");
            }
            Stmt::Switch {
                header,
                cases,
                default,
            } => {
                out.open(format!("switch ({}.fieldId) {{", header));
                for case in cases {
                    out.open(format!("case {}:", case.id));
                    self.render_stmts(out, &case.body, proc);
                    out.line("break;");
                    out.dedent();
                }
                out.open("default: {");
                self.render_stmts(out, default, proc);
                out.close("}");
                out.close("}");
            }
            Stmt::IfWireType {
                header,
                expected,
                then,
                otherwise,
            } => {
                out.open(format!(
                    "if ({}.fieldType === thrift.TType.{}) {{",
                    header,
                    ttype(*expected)
                ));
                self.render_stmts(out, then, proc);
                if !otherwise.is_empty() {
                    out.dedent();
                    out.open("} else {");
                    self.render_stmts(out, otherwise, proc);
                }
                out.close("}");
            }
            Stmt::Repeat {
                metadata,
                counter,
                body,
            } => {
                out.open(format!(
                    "for (let {c} = 0; {c} < {m}.size; {c}++) {{",
                    c = counter,
                    m = metadata
                ));
                self.render_stmts(out, body, proc);
                out.close("}");
            }
            Stmt::Stage { field, value } => out.line(format!("_args.{} = {};", field, value)),
            Stmt::Construct {
                struct_name,
                kind,
                fields,
            } => render_construct(out, struct_name, *kind, fields),

            Stmt::WriteStructBegin { name } => out.line(format!("output.writeStructBegin({});", quote(name))),
            Stmt::WriteStructEnd => out.line("output.writeStructEnd();"),
            Stmt::WriteFieldBegin { name, wire_type, id } => out.line(format!(
                "output.writeFieldBegin({}, thrift.TType.{}, {});",
                quote(name),
                ttype(*wire_type),
                id
            )),
            Stmt::WriteFieldEnd => out.line("output.writeFieldEnd();"),
            Stmt::WriteFieldStop => out.line("output.writeFieldStop();"),
            Stmt::WriteContainerBegin { kind, source } => {
                let source = render_expr(source);
                match kind {
                    ContainerKind::List { element } => out.line(format!(
                        "output.writeListBegin(thrift.TType.{}, {}.length);",
                        ttype(*element),
                        source
                    )),
                    ContainerKind::Set { element } => out.line(format!(
                        "output.writeSetBegin(thrift.TType.{}, {}.size);",
                        ttype(*element),
                        source
                    )),
                    ContainerKind::Map { key, value } => out.line(format!(
                        "output.writeMapBegin(thrift.TType.{}, thrift.TType.{}, {}.size);",
                        ttype(*key),
                        ttype(*value),
                        source
                    )),
                }
            }
            Stmt::WriteContainerEnd { kind } => out.line(format!("output.write{}End();", kind.name())),
            Stmt::Write { codec, source } => match codec {
                ValueCodec::Scalar { kind } => out.line(format!(
                    "output.write{}({});",
                    kind.method_suffix(),
                    render_expr(source)
                )),
                ValueCodec::Struct { .. } => out.line(format!("{}.write(output);", render_expr(source))),
            },
            Stmt::ForEach {
                source,
                key,
                value,
                body,
                ..
            } => {
                if let Some(container) = self.expr_type(proc, source) {
                    self.bind_elements(&mut proc.locals, &container, key.as_deref(), value);
                }
                let value_param = format!(
                    "{}: {}",
                    value,
                    self.local_type(proc, value).unwrap_or_else(|| "any".to_string())
                );
                let params = match key {
                    Some(key) => format!(
                        "{}, {}: {}",
                        value_param,
                        key,
                        self.local_type(proc, key).unwrap_or_else(|| "any".to_string())
                    ),
                    None => value_param,
                };
                out.open(format!("{}.forEach(({}): void => {{", render_expr(source), params));
                self.render_stmts(out, body, proc);
                out.close("});");
            }
            Stmt::IfPresent { source, body } => {
                out.open(format!("if ({} != null) {{", render_expr(source)));
                self.render_stmts(out, body, proc);
                out.close("}");
            }
            Stmt::RequirePresent { source, field } => {
                out.open(format!("if ({} == null) {{", render_expr(source)));
                out.line(protocol_exception(
                    "UNKNOWN",
                    &quote(&format!("Required field {} is unset!", field)),
                ));
                out.close("}");
            }
            Stmt::RequireSingleField {
                source,
                struct_name,
                fields,
            } => {
                out.line("let _fieldsSet: number = 0;");
                for field in fields {
                    out.open(format!("if ({} != null) {{", render_expr(&Expr::field(source.clone(), field))));
                    out.line("_fieldsSet++;");
                    out.close("}");
                }
                out.open("if (_fieldsSet !== 1) {");
                out.line(protocol_exception(
                    "INVALID_DATA",
                    &format!(
                        "`Union {} must have exactly one field set, found ${{_fieldsSet}}`",
                        struct_name
                    ),
                ));
                out.close("}");
            }
        }
    }

    fn render_service(&self, out: &mut Emitter, service: &ServiceCodec) {
        out.open(format!("export namespace {} {{", service.name));

        out.open("export interface IHandler<Context = any> {");
        for method in &service.methods {
            let mut params = self.params(method);
            params.push("context?: Context".to_string());
            let ret = ts_type(&method.return_type);
            out.line(format!("{}({}): {} | Promise<{}>;", method.name, params.join(", "), ret, ret));
        }
        out.close("}");
        out.blank();

        self.render_client(out, service);
        out.blank();
        self.render_processor(out, service);

        out.close("}");
    }

    fn args_fields(&self, method: &MethodCodec) -> Vec<String> {
        self.compiled
            .struct_codec(&method.args_struct)
            .map(|codec| {
                codec
                    .fields
                    .iter()
                    .filter(|f| f.wire_type != WireType::Void)
                    .map(|f| f.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn params(&self, method: &MethodCodec) -> Vec<String> {
        self.compiled
            .struct_codec(&method.args_struct)
            .map(|codec| {
                codec
                    .fields
                    .iter()
                    .filter(|f| f.wire_type != WireType::Void)
                    .map(|f| format!("{}: {}", f.name, ts_type(&f.field_type)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn render_client(&self, out: &mut Emitter, service: &ServiceCodec) {
        out.open("export class Client {");
        out.line("public _seqid: number;");
        out.line("public _reqs: { [requestId: number]: (error: any, result?: any) => void };");
        out.line("public output: thrift.TTransport;");
        out.line("public protocol: new (trans: thrift.TTransport) => thrift.TProtocol;");
        out.open("constructor(output: thrift.TTransport, protocol: new (trans: thrift.TTransport) => thrift.TProtocol) {");
        out.line("this._seqid = 0;");
        out.line("this._reqs = {};");
        out.line("this.output = output;");
        out.line("this.protocol = protocol;");
        out.close("}");
        out.open("public incrementSeqId(): number {");
        out.line("return this._seqid += 1;");
        out.close("}");

        for method in &service.methods {
            let params = self.params(method).join(", ");
            let mut forwarded = self.args_fields(method);
            let args_object = format!("{{ {} }}", forwarded.join(", "));
            forwarded.push("requestId".to_string());
            let forwarded = forwarded.join(", ");
            let ret = ts_type(&method.return_type);

            out.open(format!("public {}({}): Promise<{}> {{", method.name, params, ret));
            out.line("const requestId: number = this.incrementSeqId();");
            if method.oneway {
                out.line(format!("this.send_{}({});", method.name, forwarded));
                out.line("return Promise.resolve();");
            } else {
                out.open(format!("return new Promise<{}>((resolve, reject): void => {{", ret));
                out.open("this._reqs[requestId] = (error: any, result?: any): void => {");
                out.line("delete this._reqs[requestId];");
                out.open("if (error != null) {");
                out.line("reject(error);");
                out.dedent();
                out.open("} else {");
                out.line("resolve(result);");
                out.close("}");
                out.close("};");
                out.line(format!("this.send_{}({});", method.name, forwarded));
                out.close("});");
            }
            out.close("}");

            let send_params = if params.is_empty() {
                "requestId: number".to_string()
            } else {
                format!("{}, requestId: number", params)
            };
            out.open(format!("public send_{}({}): void {{", method.name, send_params));
            out.line("const output: thrift.TProtocol = new this.protocol(this.output);");
            out.line(format!(
                "output.writeMessageBegin({}, thrift.MessageType.{}, requestId);",
                quote(&method.name),
                if method.oneway { "ONEWAY" } else { "CALL" }
            ));
            out.line(format!(
                "const args: {} = new {}({});",
                method.args_struct, method.args_struct, args_object
            ));
            out.line("args.write(output);");
            out.line("output.writeMessageEnd();");
            out.line("this.output.flush();");
            out.close("}");

            if let Some(result_struct) = &method.result_struct {
                self.render_recv(out, method, result_struct);
            }
        }

        out.open("public recv(input: thrift.TProtocol): void {");
        out.line("const metadata: thrift.IThriftMessage = input.readMessageBegin();");
        out.open("switch (metadata.fieldName) {");
        for method in service.methods.iter().filter(|m| !m.oneway) {
            out.open(format!("case {}:", quote(&method.name)));
            out.line(format!(
                "this.recv_{}(input, metadata.messageType, metadata.requestId);",
                method.name
            ));
            out.line("return;");
            out.dedent();
        }
        out.open("default: {");
        out.line("input.skip(thrift.TType.STRUCT);");
        out.line("input.readMessageEnd();");
        out.close("}");
        out.close("}");
        out.close("}");

        out.close("}");
    }

    fn render_recv(&self, out: &mut Emitter, method: &MethodCodec, result_struct: &str) {
        out.open(format!(
            "public recv_{}(input: thrift.TProtocol, mtype: thrift.MessageType, rseqid: number): void {{",
            method.name
        ));
        out.line("const callback = this._reqs[rseqid];");
        out.open("if (callback == null) {");
        out.line("input.skip(thrift.TType.STRUCT);");
        out.line("input.readMessageEnd();");
        out.line("return;");
        out.close("}");
        out.open("if (mtype === thrift.MessageType.EXCEPTION) {");
        out.line("const x: thrift.TApplicationException = new thrift.TApplicationException();");
        out.line("x.read(input);");
        out.line("input.readMessageEnd();");
        out.line("return callback(x);");
        out.close("}");
        out.line(format!("const result: {} = {}.read(input);", result_struct, result_struct));
        out.line("input.readMessageEnd();");
        out.open(format!("if (result.{} != null) {{", SUCCESS_FIELD));
        out.line(format!("return callback(undefined, result.{});", SUCCESS_FIELD));
        out.close("}");
        for slot in &method.exceptions {
            out.open(format!("if (result.{} != null) {{", slot.field));
            out.line(format!("return callback(result.{});", slot.field));
            out.close("}");
        }
        if method.returns_void() {
            out.line("return callback(undefined);");
        } else {
            out.line(format!(
                "return callback(new thrift.TApplicationException(thrift.TApplicationExceptionType.MISSING_RESULT, {}));",
                quote(&format!("{} failed: unknown result", method.name))
            ));
        }
        out.close("}");
    }

    fn render_processor(&self, out: &mut Emitter, service: &ServiceCodec) {
        out.open("export class Processor<Context = any> {");
        out.line("public _handler: IHandler<Context>;");
        out.open("constructor(handler: IHandler<Context>) {");
        out.line("this._handler = handler;");
        out.close("}");

        out.open("public process(input: thrift.TProtocol, output: thrift.TProtocol, context?: Context): void {");
        out.line("const metadata: thrift.IThriftMessage = input.readMessageBegin();");
        out.line("const requestId: number = metadata.requestId;");
        out.open("switch (metadata.fieldName) {");
        for method in &service.methods {
            out.open(format!("case {}: {{", quote(&method.name)));
            out.line(format!("this.process_{}(requestId, input, output, context);", method.name));
            out.line("return;");
            out.close("}");
        }
        out.open("default: {");
        out.line("input.skip(thrift.TType.STRUCT);");
        out.line("input.readMessageEnd();");
        out.line("const err: thrift.TApplicationException = new thrift.TApplicationException(thrift.TApplicationExceptionType.UNKNOWN_METHOD, \"Unknown function \" + metadata.fieldName);");
        write_message(out, "metadata.fieldName", "EXCEPTION", "err");
        out.line("return;");
        out.close("}");
        out.close("}");
        out.close("}");

        for method in &service.methods {
            self.render_process_method(out, method);
        }
        out.close("}");
    }

    fn render_process_method(&self, out: &mut Emitter, method: &MethodCodec) {
        let ret = ts_type(&method.return_type);
        let name = quote(&method.name);
        let mut call_args: Vec<String> = self
            .args_fields(method)
            .iter()
            .map(|f| format!("args.{}", f))
            .collect();
        call_args.push("context".to_string());

        out.open(format!(
            "public process_{}(requestId: number, input: thrift.TProtocol, output: thrift.TProtocol, context?: Context): void {{",
            method.name
        ));
        out.open(format!("new Promise<{}>((resolve, reject): void => {{", ret));
        out.open("try {");
        out.line(format!(
            "const args: {} = {}.read(input);",
            method.args_struct, method.args_struct
        ));
        out.line("input.readMessageEnd();");
        out.line(format!("resolve(this._handler.{}({}));", method.name, call_args.join(", ")));
        out.dedent();
        out.open("} catch (err) {");
        out.line("reject(err);");
        out.close("}");

        let Some(result_struct) = &method.result_struct else {
            out.close("}).catch((): void => {});");
            out.close("}");
            return;
        };

        out.dedent();
        out.open(format!("}}).then((data: {}): void => {{", ret));
        if method.returns_void() {
            out.line(format!("const result: {} = new {}();", result_struct, result_struct));
        } else {
            out.line(format!(
                "const result: {} = new {}({{ {}: data }});",
                result_struct, result_struct, SUCCESS_FIELD
            ));
        }
        write_message(out, &name, "REPLY", "result");
        out.dedent();
        out.open("}).catch((err: any): void => {");
        for (i, slot) in method.exceptions.iter().enumerate() {
            let branch = if i == 0 { "if" } else { "} else if" };
            if i > 0 {
                out.dedent();
            }
            out.open(format!("{} (err instanceof {}) {{", branch, slot.exception));
            out.line(format!(
                "const result: {} = new {}({{ {}: err }});",
                result_struct, result_struct, slot.field
            ));
            write_message(out, &name, "REPLY", "result");
        }
        if !method.exceptions.is_empty() {
            out.dedent();
            out.open("} else {");
        }
        out.line("const x: thrift.TApplicationException = new thrift.TApplicationException(thrift.TApplicationExceptionType.UNKNOWN, err.message);");
        write_message(out, &name, "EXCEPTION", "x");
        if !method.exceptions.is_empty() {
            out.close("}");
        }
        out.close("});");
        out.close("}");
    }
}

fn write_message(out: &mut Emitter, name: &str, message_type: &str, payload: &str) {
    out.line(format!(
        "output.writeMessageBegin({}, thrift.MessageType.{}, requestId);",
        name, message_type
    ));
    out.line(format!("{}.write(output);", payload));
    out.line("output.writeMessageEnd();");
    out.line("output.flush();");
}

fn render_construct(out: &mut Emitter, struct_name: &str, kind: StructKind, fields: &[FieldInit]) {
    let missing = quote(&format!("Unable to read {} from input", struct_name));
    for field in fields.iter().filter(|f| f.required) {
        out.open(format!("if (_args.{} === undefined) {{", field.name));
        out.line(protocol_exception("UNKNOWN", &missing));
        out.close("}");
    }

    if kind == StructKind::Union {
        out.line("let _fieldsSet: number = 0;");
        for field in fields {
            out.open(format!("if (_args.{} !== undefined) {{", field.name));
            out.line("_fieldsSet++;");
            out.close("}");
        }
        out.open("if (_fieldsSet === 0) {");
        out.line(protocol_exception(
            "INVALID_DATA",
            &quote(&format!("Union {} was decoded with no field set", struct_name)),
        ));
        out.dedent();
        out.open("} else if (_fieldsSet > 1) {");
        out.line(protocol_exception(
            "INVALID_DATA",
            &format!("`Union {} was decoded with ${{_fieldsSet}} fields set`", struct_name),
        ));
        out.close("}");
    }

    for field in fields {
        if let Some(default) = &field.default {
            out.open(format!("if (_args.{} === undefined) {{", field.name));
            out.line(format!("_args.{} = {};", field.name, literal(default)));
            out.close("}");
        }
    }

    out.line(format!("return new {}(_args);", struct_name));
}

fn protocol_exception(kind: &str, message: &str) -> String {
    format!(
        "throw new thrift.TProtocolException(thrift.TProtocolExceptionType.{}, {});",
        kind, message
    )
}

fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::This => "this".to_string(),
        Expr::Local { name } => name.clone(),
        Expr::Field { base, name } => format!("{}.{}", render_expr(base), name),
    }
}

fn codec_type(codec: &ValueCodec) -> String {
    match codec {
        ValueCodec::Scalar { kind } => match kind {
            ScalarKind::Bool => "boolean".to_string(),
            ScalarKind::I64 => "thrift.Int64".to_string(),
            ScalarKind::String => "string".to_string(),
            ScalarKind::Binary => "Buffer".to_string(),
            ScalarKind::Byte | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::Double => "number".to_string(),
        },
        ValueCodec::Struct { name } => name.clone(),
    }
}

/// TypeScript spelling of an IDL type. Identifiers keep their (undotted) name.
pub fn ts_type(ty: &FieldType) -> String {
    match ty {
        FieldType::Bool => "boolean".to_string(),
        FieldType::Byte | FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::Double => {
            "number".to_string()
        }
        FieldType::I64 => "thrift.Int64".to_string(),
        FieldType::String => "string".to_string(),
        FieldType::Binary => "Buffer".to_string(),
        FieldType::List { value_type } => format!("Array<{}>", ts_type(value_type)),
        FieldType::Set { value_type } => format!("Set<{}>", ts_type(value_type)),
        FieldType::Map {
            key_type,
            value_type,
        } => format!("Map<{}, {}>", ts_type(key_type), ts_type(value_type)),
        FieldType::Identifier { value } => base_name(value).to_string(),
        FieldType::Void => "void".to_string(),
    }
}

fn ttype(wire: WireType) -> &'static str {
    match wire {
        WireType::Stop => "STOP",
        WireType::Void => "VOID",
        WireType::Bool => "BOOL",
        WireType::Byte => "BYTE",
        WireType::Double => "DOUBLE",
        WireType::I16 => "I16",
        WireType::I32 => "I32",
        WireType::I64 => "I64",
        WireType::String => "STRING",
        WireType::Struct => "STRUCT",
        WireType::Map => "MAP",
        WireType::Set => "SET",
        WireType::List => "LIST",
    }
}

/// Runtime value as a TypeScript expression.
fn literal(value: &Value) -> String {
    let join = |items: &[Value]| items.iter().map(literal).collect::<Vec<_>>().join(", ");
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => format!("thrift.Int64.fromDecimalString(\"{}\")", v),
        Value::Double(v) if v.is_infinite() => {
            if *v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        }
        Value::Double(v) => v.to_string(),
        Value::String(s) => quote(s),
        Value::Binary(bytes) => format!(
            "Buffer.from([{}])",
            bytes.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
        ),
        Value::List(items) => format!("[{}]", join(items)),
        Value::Set(items) => format!("new Set([{}])", join(items)),
        Value::Map(entries) => format!(
            "new Map([{}])",
            entries
                .iter()
                .map(|(k, v)| format!("[{}, {}]", literal(k), literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Struct(sv) => format!(
            "new {}({{ {} }})",
            sv.name,
            sv.fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Void => "undefined".to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write TypeScript output to a file
pub fn write_typescript_to_file(output: &TypeScriptOutput, path: &std::path::Path) -> Result<(), std::io::Error> {
    std::fs::write(path, output.full_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;
    use thrift_idl::parse_document_content;

    const DOC: &str = r#"{"body":[
        {"type":"EnumDefinition","name":"Color","members":[{"name":"RED"},{"name":"BLUE","initializer":5}]},
        {"type":"TypedefDefinition","name":"Tags","definitionType":{"type":"list","valueType":{"type":"string"}}},
        {"type":"ConstDefinition","name":"GREETING","fieldType":{"type":"string"},
         "initializer":{"type":"string","value":"hi \"there\""}},
        {"type":"StructDefinition","name":"Item","fields":[
            {"name":"id","fieldID":1,"fieldType":{"type":"i32"},"requiredness":"required"},
            {"name":"tags","fieldID":2,"fieldType":{"type":"identifier","value":"Tags"}},
            {"name":"color","fieldID":3,"fieldType":{"type":"identifier","value":"Color"},
             "defaultValue":{"type":"identifier","value":"Color.BLUE"}},
            {"name":"level","fieldID":4,"fieldType":{"type":"i32"},"requiredness":"required",
             "defaultValue":{"type":"int","value":7}}
        ]},
        {"type":"ServiceDefinition","name":"Store","functions":[
            {"name":"get","returnType":{"type":"identifier","value":"Item"},
             "fields":[{"name":"id","fieldID":1,"fieldType":{"type":"i32"}}]},
            {"name":"touch","returnType":{"type":"void"},"oneway":true}
        ]}
    ]}"#;

    fn render() -> String {
        let document = parse_document_content(DOC).unwrap();
        let compiled = compile_document(&document).unwrap();
        TypeScriptCompiler::new(&document, &compiled)
            .compile()
            .unwrap()
            .full_file()
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(ts_type(&FieldType::I64), "thrift.Int64");
        assert_eq!(
            ts_type(&FieldType::map(FieldType::String, FieldType::list(FieldType::Binary))),
            "Map<string, Array<Buffer>>"
        );
        assert_eq!(ts_type(&FieldType::identifier("shared.User")), "User");
    }

    #[test]
    fn test_enums_typedefs_and_consts() {
        let ts = render();
        assert!(ts.starts_with("/* Autogenerated by thriftc. DO NOT EDIT. */"));
        assert!(ts.contains("import * as thrift from \"@creditkarma/thrift-server-core\";"));
        assert!(ts.contains("export enum Color {\n    RED = 0,\n    BLUE = 5,\n}"));
        assert!(ts.contains("export type Tags = Array<string>;"));
        assert!(ts.contains("export const GREETING: string = \"hi \\\"there\\\"\";"));
    }

    #[test]
    fn test_struct_class_walks_codec() {
        let ts = render();
        assert!(ts.contains("export class Item {"));
        assert!(ts.contains("public static read(input: thrift.TProtocol): Item {"));
        assert!(ts.contains("const ret: thrift.IThriftField = input.readFieldBegin();"));
        assert!(ts.contains("if (ret.fieldType === thrift.TType.STOP) {"));
        assert!(ts.contains("output.writeFieldBegin(\"id\", thrift.TType.I32, 1);"));
        assert!(ts.contains("output.writeListBegin(thrift.TType.STRING, this.tags.length);"));
        assert!(ts.contains("this.tags.forEach((value_"));
        assert!(ts.contains(": string): void => {"));
        assert!(ts.contains("_args.color = 5;"));
        assert!(ts.contains("\"Unable to read Item from input\""));
        assert!(ts.contains("\"Required field id is unset!\""));
    }

    #[test]
    fn test_required_check_runs_before_defaults() {
        let ts = render();
        let check = ts.find("if (_args.level === undefined) {").unwrap();
        let default = ts.find("_args.level = 7;").unwrap();
        assert!(check < default);
        assert!(ts[check..default].contains("\"Unable to read Item from input\""));
    }

    #[test]
    fn test_decode_locals_take_staged_types() {
        let ts = render();
        assert!(ts.contains(": Array<string> = new Array<string>();"));
    }

    #[test]
    fn test_service_client_and_processor() {
        let ts = render();
        assert!(ts.contains("export namespace Store {"));
        assert!(ts.contains("public get(id: number): Promise<Item> {"));
        assert!(ts.contains("output.writeMessageBegin(\"get\", thrift.MessageType.CALL, requestId);"));
        assert!(ts.contains("output.writeMessageBegin(\"touch\", thrift.MessageType.ONEWAY, requestId);"));
        assert!(ts.contains("\"get failed: unknown result\""));
        assert!(!ts.contains("recv_touch"));
        assert!(ts.contains("\"Unknown function \" + metadata.fieldName"));
    }

    #[test]
    fn test_custom_import_and_indent() {
        let document = parse_document_content(DOC).unwrap();
        let compiled = compile_document(&document).unwrap();
        let output = TypeScriptCompiler::new(&document, &compiled)
            .with_config(TypeScriptConfig::default().with_thrift_import("thrift").with_indent(2))
            .compile()
            .unwrap();
        assert!(output.imports.ends_with("import * as thrift from \"thrift\";"));
        assert!(output.body.contains("export enum Color {\n  RED = 0,"));
    }
}
