use crate::error::TransportError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Byte channel underneath a protocol. Writes are buffered until `flush`.
pub trait Transport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError>;
    fn flush(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_exact(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }
}

/// In-memory transport: reads from a fixed input buffer, records every
/// flushed frame.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: BytesMut,
    pending: BytesMut,
    frames: Vec<Bytes>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let mut transport = Self::new();
        transport.feed(input);
        transport
    }

    /// Append bytes to the unread input.
    pub fn feed(&mut self, input: impl AsRef<[u8]>) {
        self.input.put_slice(input.as_ref());
    }

    pub fn remaining_input(&self) -> usize {
        self.input.remaining()
    }

    /// Bytes written but not flushed yet.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Every flushed byte, in order.
    pub fn written(&self) -> Bytes {
        let mut all = BytesMut::new();
        for frame in &self.frames {
            all.put_slice(frame);
        }
        all.freeze()
    }

    pub fn take_frames(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.frames)
    }
}

impl Transport for MemoryTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if self.input.remaining() < buf.len() {
            return Err(TransportError::EndOfFile {
                needed: buf.len(),
                available: self.input.remaining(),
            });
        }
        self.input.copy_to_slice(buf);
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.pending.put_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if !self.pending.is_empty() {
            self.frames.push(self.pending.split().freeze());
        }
        Ok(())
    }
}
