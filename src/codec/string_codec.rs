//! UTF-8 string codec.

use bytes::{BufMut, BytesMut};
use std::any::Any;

use crate::channel::{
    Handler, InboundContext, InboundHandler, OutboundContext, OutboundHandler, WriteFuture,
};

struct StringDecoder;
struct StringEncoder;

/// Both-direction codec between raw byte buffers and UTF-8 strings.
pub struct StringCodec {
    decoder: StringDecoder,
    encoder: StringEncoder,
}

impl Default for StringCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StringCodec {
    /// Creates a new StringCodec
    pub fn new() -> Self {
        StringCodec {
            decoder: StringDecoder {},
            encoder: StringEncoder {},
        }
    }
}

impl InboundHandler for StringDecoder {
    type Rin = BytesMut;
    type Rout = String;

    fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, msg: Self::Rin) {
        match String::from_utf8(msg.to_vec()) {
            Ok(message) => ctx.fire_read(message),
            Err(err) => ctx.fire_read_exception(Box::new(err)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl OutboundHandler for StringEncoder {
    type Win = String;
    type Wout = BytesMut;

    fn write(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>, msg: Self::Win) -> WriteFuture {
        let mut buf = BytesMut::with_capacity(msg.len());
        buf.put(msg.as_bytes());
        ctx.fire_write(buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Handler for StringCodec {
    type Rin = BytesMut;
    type Rout = String;
    type Win = String;
    type Wout = BytesMut;

    fn name(&self) -> &str {
        "StringCodec"
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
