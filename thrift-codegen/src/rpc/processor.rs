use super::{HandlerError, ProcessError};
use crate::compiler::CompiledDocument;
use crate::error::{CodegenError, Result};
use crate::exception::{ApplicationException, ApplicationExceptionKind};
use crate::protocol::{MessageHeader, MessageType, Protocol, WireType};
use crate::service::{MethodCodec, ServiceCodec, SUCCESS_FIELD};
use crate::value::{StructValue, Value};
use crate::vm::Vm;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// User implementation of a service.
///
/// `args` is the decoded argument struct. Return `Value::Void` for void
/// methods.
#[async_trait]
pub trait ServiceHandler<C: Send + Sync>: Send + Sync {
    async fn handle(&self, method: &str, args: StructValue, context: &C) -> std::result::Result<Value, HandlerError>;
}

/// Dispatches inbound messages to a [`ServiceHandler`] and writes replies.
pub struct Processor<'d, H> {
    service: &'d ServiceCodec,
    vm: Vm<'d>,
    handler: H,
}

impl<'d, H> Processor<'d, H> {
    pub fn new(document: &'d CompiledDocument, service: &str, handler: H) -> Result<Self> {
        let service = document
            .service(service)
            .ok_or_else(|| CodegenError::Internal(format!("No codec generated for service {}", service)))?;
        Ok(Self {
            service,
            vm: Vm::new(document),
            handler,
        })
    }

    pub fn service(&self) -> &'d ServiceCodec {
        self.service
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Handle exactly one inbound message. At most one reply is written; none
    /// for one-way methods.
    pub async fn process<C>(
        &self,
        input: &mut dyn Protocol,
        output: &mut dyn Protocol,
        context: &C,
    ) -> std::result::Result<(), ProcessError>
    where
        C: Send + Sync,
        H: ServiceHandler<C>,
    {
        let header = input.read_message_begin()?;

        let Some(method) = self.service.method(&header.name) else {
            tracing::warn!("{}: unknown method {}", self.service.name, header.name);
            input.skip(WireType::Struct)?;
            input.read_message_end()?;
            write_exception(
                output,
                &header,
                &ApplicationException::unknown_method(&header.name),
            )?;
            return Ok(());
        };

        let args = match self.vm.decode(&method.args_struct, input) {
            Ok(args) => args,
            Err(source) => {
                if !method.oneway {
                    let exception =
                        ApplicationException::new(ApplicationExceptionKind::ProtocolError, source.to_string());
                    write_exception(output, &header, &exception)?;
                }
                return Err(ProcessError::InvalidArguments {
                    method: method.name.clone(),
                    source,
                });
            }
        };
        input.read_message_end()?;

        tracing::debug!(
            "Dispatching {}.{} seqid={}",
            self.service.name,
            method.name,
            header.sequence_id
        );

        let outcome = AssertUnwindSafe(self.handler.handle(&method.name, args, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(HandlerError::Failed(anyhow::anyhow!(
                    "Handler panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        if method.oneway {
            if let Err(err) = outcome {
                tracing::warn!("One-way {} failed: {}", method.name, err);
            }
            return Ok(());
        }

        let reply = self.reply(method, outcome).and_then(|result| {
            self.vm
                .validate_as(&result.name, &result, output.max_depth())
                .map(|()| result)
                .map_err(|err| ApplicationException::unknown(err.to_string()))
        });
        match reply {
            Ok(result) => write_reply(&self.vm, output, &header, method, &result)?,
            Err(exception) => {
                tracing::warn!("{} failed: {}", method.name, exception.message);
                write_exception(output, &header, &exception)?;
            }
        }
        Ok(())
    }

    /// Result struct for a handler outcome, or the exception to send instead.
    fn reply(
        &self,
        method: &MethodCodec,
        outcome: std::result::Result<Value, HandlerError>,
    ) -> std::result::Result<StructValue, ApplicationException> {
        let result_struct = method.result_struct.clone().unwrap_or_default();
        match outcome {
            Ok(value) => {
                let mut result = StructValue::new(result_struct);
                if !value.is_void() {
                    result.set(SUCCESS_FIELD, value);
                }
                Ok(result)
            }
            Err(HandlerError::Declared(exception)) => match method.exception_slot(&exception.name) {
                Some(slot) => Ok(StructValue::new(result_struct).with(slot.field.clone(), exception)),
                None => Err(ApplicationException::unknown(format!(
                    "{} is not declared by {}",
                    exception.name, method.name
                ))),
            },
            Err(HandlerError::Failed(err)) => Err(ApplicationException::unknown(err.to_string())),
        }
    }
}

fn write_reply(
    vm: &Vm,
    output: &mut dyn Protocol,
    header: &MessageHeader,
    method: &MethodCodec,
    result: &StructValue,
) -> Result<()> {
    output.write_message_begin(&MessageHeader::new(
        header.name.as_str(),
        MessageType::Reply,
        header.sequence_id,
    ))?;
    vm.encode_as(&result.name, result, output)?;
    output.write_message_end()?;
    output.flush()?;
    tracing::debug!("Replied to {} seqid={}", method.name, header.sequence_id);
    Ok(())
}

fn write_exception(output: &mut dyn Protocol, header: &MessageHeader, exception: &ApplicationException) -> Result<()> {
    output.write_message_begin(&MessageHeader::new(
        header.name.as_str(),
        MessageType::Exception,
        header.sequence_id,
    ))?;
    exception.write(output)?;
    output.write_message_end()?;
    output.flush()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;
    use crate::protocol::{BinaryProtocol, MemoryTransport};
    use thrift_idl::parse_document_content;

    struct Adder;

    #[async_trait]
    impl ServiceHandler<()> for Adder {
        async fn handle(&self, method: &str, args: StructValue, _: &()) -> std::result::Result<Value, HandlerError> {
            match method {
                "add" => {
                    let a = args.get("a").and_then(Value::as_i32).unwrap_or(0);
                    let b = args.get("b").and_then(Value::as_i32).unwrap_or(0);
                    Ok(Value::I32(a + b))
                }
                "negate" => Ok(Value::from("not an i32")),
                _ => panic!("boom"),
            }
        }
    }

    const CALC: &str = r#"{"body":[
        {"type":"ServiceDefinition","name":"Calc","functions":[
            {"name":"add","returnType":{"type":"i32"},"fields":[
                {"name":"a","fieldID":1,"fieldType":{"type":"i32"}},
                {"name":"b","fieldID":2,"fieldType":{"type":"i32"}}
            ]},
            {"name":"negate","returnType":{"type":"i32"},"fields":[
                {"name":"a","fieldID":1,"fieldType":{"type":"i32"}}
            ]},
            {"name":"crash","returnType":{"type":"void"}}
        ]}
    ]}"#;

    fn call_bytes(doc: &CompiledDocument, method: &str, seqid: i32, args: StructValue) -> Vec<u8> {
        let mut output = BinaryProtocol::new(MemoryTransport::new());
        output
            .write_message_begin(&MessageHeader::new(method, MessageType::Call, seqid))
            .unwrap();
        Vm::new(doc)
            .encode_as(&format!("Calc{}Args", thrift_idl::utils::to_pascal_case(method)), &args, &mut output)
            .unwrap();
        output.write_message_end().unwrap();
        output.flush().unwrap();
        output.transport().written().to_vec()
    }

    #[tokio::test]
    async fn test_reply_carries_success() {
        let doc = compile_document(&parse_document_content(CALC).unwrap()).unwrap();
        let processor = Processor::new(&doc, "Calc", Adder).unwrap();
        let bytes = call_bytes(&doc, "add", 9, StructValue::new("args").with("a", 2).with("b", 3));

        let mut input = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let mut output = BinaryProtocol::new(MemoryTransport::new());
        processor.process(&mut input, &mut output, &()).await.unwrap();

        let written = output.transport().written();
        let mut reply = BinaryProtocol::new(MemoryTransport::with_input(&written));
        let header = reply.read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("add", MessageType::Reply, 9));
        let result = Vm::new(&doc).decode("CalcAddResult", &mut reply).unwrap();
        assert_eq!(result.get(SUCCESS_FIELD), Some(&Value::I32(5)));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_unknown_exception() {
        let doc = compile_document(&parse_document_content(CALC).unwrap()).unwrap();
        let processor = Processor::new(&doc, "Calc", Adder).unwrap();
        let bytes = call_bytes(&doc, "crash", 4, StructValue::new("args"));

        let mut input = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let mut output = BinaryProtocol::new(MemoryTransport::new());
        processor.process(&mut input, &mut output, &()).await.unwrap();

        let written = output.transport().written();
        let mut reply = BinaryProtocol::new(MemoryTransport::with_input(&written));
        let header = reply.read_message_begin().unwrap();
        assert_eq!(header.message_type, MessageType::Exception);
        let exception = ApplicationException::read(&mut reply).unwrap();
        assert_eq!(exception.kind, ApplicationExceptionKind::Unknown);
        assert_eq!(exception.message, "Handler panicked: boom");
    }

    #[tokio::test]
    async fn test_bad_arguments_reply_protocol_error() {
        let doc = compile_document(&parse_document_content(CALC).unwrap()).unwrap();
        let processor = Processor::new(&doc, "Calc", Adder).unwrap();

        // CALL "add" seqid 1 with a truncated argument struct
        let mut output = BinaryProtocol::new(MemoryTransport::new());
        output
            .write_message_begin(&MessageHeader::new("add", MessageType::Call, 1))
            .unwrap();
        output.write_field_begin("a", WireType::I32, 1).unwrap();
        output.flush().unwrap();
        let bytes = output.transport().written();

        let mut input = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let mut replies = BinaryProtocol::new(MemoryTransport::new());
        let err = processor.process(&mut input, &mut replies, &()).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArguments { ref method, .. } if method == "add"));

        let written = replies.transport().written();
        let mut reply = BinaryProtocol::new(MemoryTransport::with_input(&written));
        assert_eq!(reply.read_message_begin().unwrap().message_type, MessageType::Exception);
        assert_eq!(
            ApplicationException::read(&mut reply).unwrap().kind,
            ApplicationExceptionKind::ProtocolError
        );
    }

    #[tokio::test]
    async fn test_unencodable_result_becomes_unknown_exception() {
        let doc = compile_document(&parse_document_content(CALC).unwrap()).unwrap();
        let processor = Processor::new(&doc, "Calc", Adder).unwrap();
        let bytes = call_bytes(&doc, "negate", 6, StructValue::new("args").with("a", 1));

        let mut input = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let mut output = BinaryProtocol::new(MemoryTransport::new());
        processor.process(&mut input, &mut output, &()).await.unwrap();

        assert!(output.transport().pending().is_empty());
        assert_eq!(output.transport().frames().len(), 1);
        let written = output.transport().written();
        let mut reply = BinaryProtocol::new(MemoryTransport::with_input(&written));
        assert_eq!(
            reply.read_message_begin().unwrap(),
            MessageHeader::new("negate", MessageType::Exception, 6)
        );
        let exception = ApplicationException::read(&mut reply).unwrap();
        assert_eq!(exception.kind, ApplicationExceptionKind::Unknown);
        assert_eq!(exception.message, "Expected i32 value, found string");
    }
}
