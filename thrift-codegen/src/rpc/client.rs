use super::CallError;
use crate::compiler::CompiledDocument;
use crate::error::{CodegenError, Result};
use crate::exception::{ApplicationException, ApplicationExceptionKind};
use crate::protocol::{MessageHeader, MessageType, Protocol, WireType};
use crate::service::{MethodCodec, ServiceCodec, SUCCESS_FIELD};
use crate::value::{StructValue, Value};
use crate::vm::Vm;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Completion = oneshot::Sender<std::result::Result<Value, CallError>>;

struct PendingRequest<'d> {
    method: &'d MethodCodec,
    completion: Completion,
}

/// Completion handle returned by [`Client::call`].
#[derive(Debug)]
pub struct PendingCall {
    seqid: i32,
    receiver: oneshot::Receiver<std::result::Result<Value, CallError>>,
}

impl PendingCall {
    pub fn seqid(&self) -> i32 {
        self.seqid
    }
}

impl Future for PendingCall {
    type Output = std::result::Result<Value, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Issues calls on `output` and correlates replies by sequence id.
///
/// Replies are not read by the client itself; whoever owns the input side
/// feeds each incoming message to [`Client::recv`].
pub struct Client<'d, P> {
    service: &'d ServiceCodec,
    vm: Vm<'d>,
    output: P,
    seqid: i32,
    requests: HashMap<i32, PendingRequest<'d>>,
}

impl<'d, P: Protocol> Client<'d, P> {
    pub fn new(document: &'d CompiledDocument, service: &str, output: P) -> Result<Self> {
        let service = document
            .service(service)
            .ok_or_else(|| CodegenError::Internal(format!("No codec generated for service {}", service)))?;
        Ok(Self {
            service,
            vm: Vm::new(document),
            output,
            seqid: 0,
            requests: HashMap::new(),
        })
    }

    pub fn service(&self) -> &'d ServiceCodec {
        self.service
    }

    /// Last sequence id handed out.
    pub fn seqid(&self) -> i32 {
        self.seqid
    }

    pub fn new_seqid(&mut self) -> i32 {
        self.seqid = self.seqid.wrapping_add(1);
        self.seqid
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut P {
        &mut self.output
    }

    pub fn into_output(self) -> P {
        self.output
    }

    fn method(&self, name: &str) -> Result<&'d MethodCodec> {
        self.service
            .method(name)
            .ok_or_else(|| ApplicationException::unknown_method(name).into())
    }

    /// Write one CALL (or ONEWAY) message and return its sequence id.
    pub fn send(&mut self, method: &str, args: &StructValue) -> Result<i32> {
        let method = self.method(method)?;
        self.vm
            .validate_as(&method.args_struct, args, self.output.max_depth())?;
        let seqid = self.new_seqid();
        let message_type = if method.oneway {
            MessageType::Oneway
        } else {
            MessageType::Call
        };

        self.output
            .write_message_begin(&MessageHeader::new(method.name.as_str(), message_type, seqid))?;
        self.vm.encode_as(&method.args_struct, args, &mut self.output)?;
        self.output.write_message_end()?;
        self.output.flush()?;

        tracing::debug!(
            "Sent {}.{} seqid={} ({:?})",
            self.service.name,
            method.name,
            seqid,
            message_type
        );
        Ok(seqid)
    }

    /// Send and register a completion for the reply.
    ///
    /// One-way calls complete as soon as the message is flushed.
    pub fn call(&mut self, method: &str, args: &StructValue) -> Result<PendingCall> {
        let codec = self.method(method)?;
        let seqid = self.send(method, args)?;
        let (completion, receiver) = oneshot::channel();

        if codec.oneway {
            let _ = completion.send(Ok(Value::Void));
        } else {
            self.requests.insert(
                seqid,
                PendingRequest {
                    method: codec,
                    completion,
                },
            );
        }

        Ok(PendingCall { seqid, receiver })
    }

    /// Consume one reply message from `input` and settle its pending call.
    ///
    /// A reply for a sequence id with no pending call is read and dropped.
    /// Errors reading the message header come back to the caller; anything
    /// after that settles the pending call instead.
    pub fn recv(&mut self, input: &mut dyn Protocol) -> Result<()> {
        let header = input.read_message_begin()?;

        let Some(request) = self.requests.remove(&header.sequence_id) else {
            tracing::debug!(
                "Dropping {} reply for unknown seqid {}",
                header.name,
                header.sequence_id
            );
            input.skip(WireType::Struct)?;
            return input.read_message_end();
        };

        let outcome = match self.read_outcome(request.method, &header, input) {
            Ok(outcome) => outcome,
            Err(err) => Err(CallError::Protocol(err)),
        };
        if let Err(err) = &outcome {
            tracing::debug!("{} seqid={} failed: {}", header.name, header.sequence_id, err);
        }
        let _ = request.completion.send(outcome);
        Ok(())
    }

    fn read_outcome(
        &self,
        method: &MethodCodec,
        header: &MessageHeader,
        input: &mut dyn Protocol,
    ) -> Result<std::result::Result<Value, CallError>> {
        match header.message_type {
            MessageType::Exception => {
                let exception = ApplicationException::read(input)?;
                input.read_message_end()?;
                return Ok(Err(CallError::Application(exception)));
            }
            MessageType::Reply => {}
            MessageType::Call | MessageType::Oneway => {
                input.skip(WireType::Struct)?;
                input.read_message_end()?;
                return Ok(Err(ApplicationException::new(
                    ApplicationExceptionKind::InvalidMessageType,
                    format!("Received {:?} message as a reply to {}", header.message_type, method.name),
                )
                .into()));
            }
        }

        if header.name != method.name {
            input.skip(WireType::Struct)?;
            input.read_message_end()?;
            return Ok(Err(ApplicationException::new(
                ApplicationExceptionKind::WrongMethodName,
                format!("Reply for {} arrived as {}", method.name, header.name),
            )
            .into()));
        }

        let result_struct = method.result_struct.as_deref().ok_or_else(|| {
            CodegenError::Internal(format!("One-way method {} has no result struct", method.name))
        })?;
        let mut result = self.vm.decode(result_struct, input)?;
        input.read_message_end()?;

        Ok(settle(method, &mut result))
    }
}

fn settle(method: &MethodCodec, result: &mut StructValue) -> std::result::Result<Value, CallError> {
    if let Some(success) = result.remove(SUCCESS_FIELD) {
        return Ok(success);
    }
    for slot in &method.exceptions {
        if let Some(Value::Struct(exception)) = result.remove(&slot.field) {
            return Err(CallError::Declared(exception));
        }
    }
    if method.returns_void() {
        return Ok(Value::Void);
    }
    Err(ApplicationException::new(
        ApplicationExceptionKind::MissingResult,
        format!("{} failed: unknown result", method.name),
    )
    .into())
}
