//! ### What is Wireline?
//! Wireline is a typed, bidirectional handler pipeline for assembling protocol
//! stacks out of small, composable stages.
//!
//! ### What is a Pipeline?
//! The fundamental abstraction is the [Pipeline](crate::channel::Pipeline): an
//! ordered chain of request/response [handlers](crate::channel::Handler)
//! through which inbound messages flow from a transport toward application
//! logic and outbound messages flow back. Each handler transforms, buffers,
//! frames, decodes or encodes messages, possibly changing their type as they
//! progress. Once you chain handlers together, it provides an agile way to
//! convert a raw data stream into the desired message type and the inverse --
//! desired message type to raw data stream.
//!
//! A [Handler](crate::channel::Handler) should do one and only one function,
//! just like the UNIX philosophy. If you have a handler that is doing more
//! than one function, split it into individual handlers.
//!
//! ### How does an event flow in a Pipeline?
//! ```text
//!                                                       | write()
//!   +---------------------------------------------------+---------------+
//!   |                             Pipeline              |               |
//!   |                                                  \|/              |
//!   |    +----------+----------+------------+-----------+----------+    |
//!   |    |                       Handler  N                        |    |
//!   |    +----------+----------+------------+-----------+----------+    |
//!   |              /|\                                  |               |
//!   |               |                                   |               |
//!   |          Context.fire_read()            Context.fire_write()      |
//!   |               |                                   |               |
//!   |               |                                  \|/              |
//!   |    +----------+----------+------------+-----------+----------+    |
//!   |    |                       Handler  1                        |    |
//!   |    +----------+----------+------------+-----------+----------+    |
//!   |              /|\                                  |               |
//!   +---------------+-----------------------------------+---------------+
//!                   | read()                            |
//!                   |                                  \|/
//!   +---------------+-----------------------------------+---------------+
//!   |               |                                   |               |
//!   |            Transport (socket reads, queued writes)               |
//!   +-------------------------------------------------------------------+
//! ```
//!
//! A pipeline is typed end to end: `Pipeline<R, W>` reads `R`s at the front
//! and accepts `W`s for writing at the back, and every edge between two
//! adjacent handlers is checked when the pipeline is
//! [finalized](crate::channel::Pipeline::finalize). A handler declares which
//! directions it services; inbound events visit only inbound handlers,
//! front to back, while outbound operations visit outbound handlers back to
//! front and hand back a [completion](crate::channel::WriteFuture).
//!
//! ### Assembling a pipeline
//! ```ignore
//! let pipeline: Pipeline<BytesMut, String> = Pipeline::new();
//! pipeline
//!     .add_back(AsyncTransport::new(writer))?
//!     .add_back(ByteToMessageCodec::new(Box::new(LineBasedFrameDecoder::new(
//!         8192,
//!         true,
//!         TerminatorType::Both,
//!     ))))?
//!     .add_back(StringCodec::new())?;
//! let pipeline = pipeline.finalize()?;
//!
//! pipeline.read(BytesMut::from(&b"hello\r\n"[..]))?;
//! let done = pipeline.write("hi there\r\n".to_string())?;
//! ```
//!
//! It is very important to be strict in the order of insertion as handlers
//! are ordered by insertion: index 0 is the front, closest to the transport.
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;
