//! Outbound counterpart of length-field framing.

use bytes::{BufMut, BytesMut};
use std::any::Any;

use crate::channel::{
    Handler, InboundHandler, Nothing, OutboundContext, OutboundHandler, WriteFuture,
};
use crate::error::PipelineError;

/// Outbound-only handler that prepends a big-endian length field to every
/// outgoing buffer. The counterpart of
/// [LengthFieldBasedFrameDecoder](crate::codec::byte_to_message_decoder::LengthFieldBasedFrameDecoder).
pub struct LengthFieldPrepender {
    length_field_length: usize,
}

impl LengthFieldPrepender {
    /// Creates a prepender writing a `length_field_length`-byte header
    /// (1, 2, 4 or 8).
    pub fn new(length_field_length: usize) -> Self {
        assert!(
            matches!(length_field_length, 1 | 2 | 4 | 8),
            "unsupported length field length {}",
            length_field_length
        );
        Self {
            length_field_length,
        }
    }
}

struct LengthFieldEncoder {
    length_field_length: usize,
}

impl OutboundHandler for LengthFieldEncoder {
    type Win = BytesMut;
    type Wout = BytesMut;

    fn write(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>, msg: Self::Win) -> WriteFuture {
        if self.length_field_length < 8 && msg.len() as u64 >= 1u64 << (8 * self.length_field_length)
        {
            return WriteFuture::ready(Err(PipelineError::Codec(format!(
                "frame length {} does not fit a {} byte length field",
                msg.len(),
                self.length_field_length
            ))));
        }

        let mut buf = BytesMut::with_capacity(self.length_field_length + msg.len());
        buf.put_uint(msg.len() as u64, self.length_field_length);
        buf.extend_from_slice(&msg);
        ctx.fire_write(buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Handler for LengthFieldPrepender {
    type Rin = Nothing;
    type Rout = Nothing;
    type Win = BytesMut;
    type Wout = BytesMut;

    fn name(&self) -> &str {
        "LengthFieldPrepender"
    }

    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    ) {
        (
            None,
            Some(Box::new(LengthFieldEncoder {
                length_field_length: self.length_field_length,
            })),
        )
    }
}
