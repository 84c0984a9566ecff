use thiserror::Error;

/// Errors raised by pipeline assembly, traversal and outbound completions.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An inbound operation was invoked on a pipeline with no inbound handler.
    #[error("no inbound handler in pipeline")]
    NoInboundHandler,
    /// An outbound operation was invoked on a pipeline with no outbound handler.
    #[error("no outbound handler in pipeline")]
    NoOutboundHandler,
    /// A handler was requested under a type it does not have.
    #[error("handler \"{name}\" at index {index} is not a {expected}")]
    HandlerTypeMismatch {
        /// Registered handler name.
        name: String,
        /// Position in the pipeline, front = 0.
        index: usize,
        /// The type the caller asked for.
        expected: &'static str,
    },
    /// Two adjacent handlers disagree on the message type crossing their edge.
    #[error("\"{from}\" emits {emits} but \"{to}\" accepts {accepts}")]
    LinkTypeMismatch {
        /// Name of the emitting handler.
        from: String,
        /// Type the emitting handler produces.
        emits: &'static str,
        /// Name of the receiving handler.
        to: String,
        /// Type the receiving handler consumes.
        accepts: &'static str,
    },
    /// A handler with this name is already in the pipeline.
    #[error("handler \"{0}\" already in pipeline")]
    DuplicateHandler(String),
    /// No handler under this name or index.
    #[error("no such handler \"{0}\" in pipeline")]
    HandlerNotFound(String),
    /// Removal from a pipeline with no handlers.
    #[error("no handlers in pipeline")]
    Empty,
    /// `Handler::split` yielded neither an inbound nor an outbound half.
    #[error("handler \"{0}\" services no direction")]
    InvalidHandler(String),
    /// The resolver of a write completion went away without completing it.
    #[error("write abandoned before completion")]
    WriteAbandoned,
    /// A codec rejected its input.
    #[error("codec: {0}")]
    Codec(String),
    /// An I/O error surfaced by a transport-adjacent handler.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
