//! Byte-stream framing: a [MessageDecoder] wrapped in a pipeline handler.

use bytes::BytesMut;
use std::any::Any;

use crate::channel::{
    Handler, InboundContext, InboundHandler, OutboundContext, OutboundHandler, WriteFuture,
};
use crate::error::PipelineError;

pub mod length_field_based_frame_decoder;
pub mod line_based_frame_decoder;

pub use length_field_based_frame_decoder::LengthFieldBasedFrameDecoder;
pub use line_based_frame_decoder::{LineBasedFrameDecoder, TerminatorType};

/// Splits a byte stream into frames.
pub trait MessageDecoder {
    /// Returns decoder name, used as the wrapping handler's name.
    fn id(&self) -> String;
    /// Extracts the next complete frame from `buf`, or `None` if more bytes
    /// are needed.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, PipelineError>;
}

struct ByteToMessageDecoder {
    transport_active: bool,
    buffer: BytesMut,
    message_decoder: Box<dyn MessageDecoder>,
}

struct ByteToMessageEncoder;

/// Both-direction handler that runs a [MessageDecoder] over inbound bytes and
/// passes outbound bytes through untouched.
pub struct ByteToMessageCodec {
    name: String,
    decoder: ByteToMessageDecoder,
    encoder: ByteToMessageEncoder,
}

impl ByteToMessageCodec {
    /// Wraps `message_decoder` in a pipeline handler.
    pub fn new(message_decoder: Box<dyn MessageDecoder>) -> Self {
        Self {
            name: message_decoder.id(),
            decoder: ByteToMessageDecoder {
                transport_active: false,
                buffer: BytesMut::new(),
                message_decoder,
            },
            encoder: ByteToMessageEncoder {},
        }
    }
}

impl InboundHandler for ByteToMessageDecoder {
    type Rin = BytesMut;
    type Rout = BytesMut;

    fn transport_active(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        self.transport_active = true;
        ctx.fire_transport_active();
    }
    fn transport_inactive(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        self.transport_active = false;
        ctx.fire_transport_inactive();
    }

    fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, msg: Self::Rin) {
        // Partial frames are carried over to the next read.
        self.buffer.extend_from_slice(&msg);
        while self.transport_active {
            match self.message_decoder.decode(&mut self.buffer) {
                Ok(Some(frame)) => ctx.fire_read(frame),
                Ok(None) => return,
                Err(err) => {
                    ctx.fire_read_exception(Box::new(err));
                    return;
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl OutboundHandler for ByteToMessageEncoder {
    type Win = BytesMut;
    type Wout = BytesMut;

    fn write(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>, msg: Self::Win) -> WriteFuture {
        ctx.fire_write(msg)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Handler for ByteToMessageCodec {
    type Rin = BytesMut;
    type Rout = BytesMut;
    type Win = BytesMut;
    type Wout = BytesMut;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    ) {
        (Some(Box::new(self.decoder)), Some(Box::new(self.encoder)))
    }
}
