use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::PipelineError;

/// Completion handle returned by outbound `write` and `close` operations.
///
/// A handler that finishes its work synchronously returns
/// [WriteFuture::ready]; a handler that defers or fans out keeps the
/// [WritePromise] side and resolves it later. Dropping an unresolved
/// `WriteFuture` is a best-effort cancellation: the outbound chain is not
/// required to unwind work already handed to the transport.
pub struct WriteFuture {
    state: State,
    guard: Option<WriteGuard>,
}

enum State {
    Ready(Option<Result<(), PipelineError>>),
    Waiting(oneshot::Receiver<Result<(), PipelineError>>),
}

impl WriteFuture {
    /// A completion that resolved before the call returned.
    pub fn ready(result: Result<(), PipelineError>) -> Self {
        Self {
            state: State::Ready(Some(result)),
            guard: None,
        }
    }

    pub(crate) fn track(mut self, pending: &Rc<PendingWrites>) -> Self {
        self.guard = Some(PendingWrites::begin(pending));
        self
    }
}

impl Future for WriteFuture {
    type Output = Result<(), PipelineError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let result = match &mut this.state {
            State::Ready(result) => result.take().expect("write future polled after completion"),
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(result)) => result,
                Poll::Ready(Err(_)) => Err(PipelineError::WriteAbandoned),
            },
        };
        this.state = State::Ready(None);
        this.guard.take();
        Poll::Ready(result)
    }
}

/// Resolver half of a deferred write completion.
pub struct WritePromise {
    tx: Option<oneshot::Sender<Result<(), PipelineError>>>,
}

impl WritePromise {
    /// Creates a promise and the [WriteFuture] it resolves.
    pub fn new() -> (WritePromise, WriteFuture) {
        let (tx, rx) = oneshot::channel();
        (
            WritePromise { tx: Some(tx) },
            WriteFuture {
                state: State::Waiting(rx),
                guard: None,
            },
        )
    }

    /// Resolves the paired future. A promise dropped without completing
    /// resolves it with [PipelineError::WriteAbandoned].
    pub fn complete(mut self, result: Result<(), PipelineError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// Count of outstanding write completions handed out by a pipeline, plus the
/// deletion callback parked until the count returns to zero.
pub(crate) struct PendingWrites {
    outstanding: Cell<usize>,
    on_idle: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl PendingWrites {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            outstanding: Cell::new(0),
            on_idle: RefCell::new(None),
        })
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.outstanding.get() == 0
    }

    /// Parks `f` until the pipeline is idle; runs it immediately if it
    /// already is. A later call replaces a parked callback.
    pub(crate) fn when_idle(&self, f: Box<dyn FnOnce()>) {
        if self.is_idle() {
            f();
        } else {
            *self.on_idle.borrow_mut() = Some(f);
        }
    }

    fn begin(self: &Rc<Self>) -> WriteGuard {
        self.outstanding.set(self.outstanding.get() + 1);
        WriteGuard(Rc::clone(self))
    }

    fn finish(&self) {
        let remaining = self.outstanding.get() - 1;
        self.outstanding.set(remaining);
        if remaining == 0 {
            let parked = self.on_idle.borrow_mut().take();
            if let Some(f) = parked {
                f();
            }
        }
    }
}

struct WriteGuard(Rc<PendingWrites>);

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}
