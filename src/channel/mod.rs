//! The ordered, bidirectional chain of handlers that a protocol stack is
//! assembled from.

mod completion;
mod handler;
mod handler_internal;
mod pipeline;
mod pipeline_internal;

#[cfg(test)]
mod channel_test;

pub use completion::{WriteFuture, WritePromise};
pub use handler::{
    Handler, HandlerDir, InboundContext, InboundHandler, Nothing, OutboundContext, OutboundHandler,
};
pub use handler_internal::{
    InboundContextInternal, InboundHandlerInternal, OutboundContextInternal,
    OutboundHandlerInternal,
};
pub use pipeline::{Pipeline, PipelineBase, PipelineFactory, PipelineManager, WriteFlags};
