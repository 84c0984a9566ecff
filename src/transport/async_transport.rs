use log::{trace, warn};
use std::any::Any;
use std::marker::PhantomData;

use crate::channel::{
    Handler, InboundContext, InboundHandler, OutboundContext, OutboundHandler, WriteFuture,
};
use crate::error::PipelineError;
use crate::transport::AsyncTransportWrite;

struct AsyncTransportDecoder<T> {
    phantom: PhantomData<T>,
}
struct AsyncTransportEncoder<T> {
    writer: Option<AsyncTransportWrite<T>>,
}

/// Transport-adjacent handler that passes inbound `T`s through and queues
/// outbound `T`s on the transport's write half. Sits at the front of a
/// pipeline.
pub struct AsyncTransport<T> {
    decoder: AsyncTransportDecoder<T>,
    encoder: AsyncTransportEncoder<T>,
}

impl<T> AsyncTransport<T> {
    /// Creates a new asynchronous transport handler
    pub fn new(writer: AsyncTransportWrite<T>) -> Self {
        AsyncTransport {
            decoder: AsyncTransportDecoder {
                phantom: PhantomData,
            },
            encoder: AsyncTransportEncoder {
                writer: Some(writer),
            },
        }
    }
}

impl<T: 'static> InboundHandler for AsyncTransportDecoder<T> {
    type Rin = T;
    type Rout = Self::Rin;

    fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, msg: Self::Rin) {
        ctx.fire_read(msg);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> OutboundHandler for AsyncTransportEncoder<T> {
    type Win = T;
    type Wout = Self::Win;

    fn write(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>, msg: Self::Win) -> WriteFuture {
        match &self.writer {
            Some(writer) => match writer.write(msg) {
                Ok(()) => WriteFuture::ready(Ok(())),
                Err(err) => {
                    warn!("AsyncTransport write error: {}", err);
                    WriteFuture::ready(Err(err.into()))
                }
            },
            None => WriteFuture::ready(Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "transport closed",
            )))),
        }
    }
    fn close(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>) -> WriteFuture {
        trace!("close AsyncTransport");
        self.writer.take();
        WriteFuture::ready(Ok(()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> Handler for AsyncTransport<T> {
    type Rin = T;
    type Rout = Self::Rin;
    type Win = Self::Rin;
    type Wout = Self::Rin;

    fn name(&self) -> &str {
        "AsyncTransport"
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
