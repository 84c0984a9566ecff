use std::any::Any;
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::ops::Deref;
use std::rc::Rc;

use crate::channel::completion::{PendingWrites, WriteFuture};
use crate::channel::handler::{Handler, InboundHandler, OutboundHandler};
use crate::channel::pipeline_internal::PipelineInternal;
use crate::error::PipelineError;

/// Owner callback invoked by a pipeline that wishes to be destroyed.
///
/// A manager is registered per pipeline; a multi-pipeline owner registers a
/// small adapter per pipeline that captures whatever identity it needs.
pub trait PipelineManager {
    /// Releases the registered pipeline. Runs only when no outstanding write
    /// completions reference it.
    fn delete_pipeline(&self);
}

/// Advisory flags passed through to whichever outbound handler honours them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Hold off transmitting until more data is queued.
    pub cork: bool,
    /// Mark the end of a record.
    pub eor: bool,
}

/// The non-typed part of a pipeline: transport slot, manager back-pointer and
/// the deletion hook. Handlers reach it through their context.
pub struct PipelineBase {
    transport: RefCell<Option<Rc<dyn Any>>>,
    manager: RefCell<Option<Rc<dyn PipelineManager>>>,
    pending: Rc<PendingWrites>,
}

impl PipelineBase {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            transport: RefCell::new(None),
            manager: RefCell::new(None),
            pending: PendingWrites::new(),
        })
    }

    /// Attaches the transport handle. Opaque to the pipeline; the
    /// transport-adjacent handler downcasts it.
    pub fn set_transport(&self, transport: Rc<dyn Any>) {
        *self.transport.borrow_mut() = Some(transport);
    }

    /// The attached transport handle, if any.
    pub fn transport(&self) -> Option<Rc<dyn Any>> {
        self.transport.borrow().clone()
    }

    /// The attached transport handle downcast to `T`.
    pub fn transport_as<T: 'static>(&self) -> Option<Rc<T>> {
        self.transport().and_then(|t| t.downcast::<T>().ok())
    }

    /// Registers the manager that owns this pipeline.
    pub fn set_pipeline_manager(&self, manager: Rc<dyn PipelineManager>) {
        *self.manager.borrow_mut() = Some(manager);
    }

    /// Asks the manager to destroy this pipeline. The callback is deferred
    /// until every outstanding write completion has resolved or been dropped.
    pub fn delete_pipeline(&self) {
        let manager = self.manager.borrow().clone();
        if let Some(manager) = manager {
            self.pending
                .when_idle(Box::new(move || manager.delete_pipeline()));
        }
    }

    pub(crate) fn pending(&self) -> &Rc<PendingWrites> {
        &self.pending
    }
}

/// An ordered, bidirectional chain of [Handler]s with a transport attached.
///
/// `R` is the inbound type: inbound calls start with `pipeline.read(msg)` at
/// the front handler and travel toward the back. `W` is the outbound type:
/// `pipeline.write(msg)` enters at the back handler and travels toward the
/// transport. Use [Nothing](crate::channel::Nothing) for one of the types if
/// the pipeline is unidirectional; the corresponding operations become
/// uncallable.
///
/// Handlers are added in any order with [add_back](Pipeline::add_back) /
/// [add_front](Pipeline::add_front); [finalize](Pipeline::finalize) wires
/// neighbours and attaches contexts back-to-front. Assembly after finalize is
/// permitted, but operations stay unavailable until the next finalize.
pub struct Pipeline<R: 'static, W: 'static> {
    base: Rc<PipelineBase>,
    pub(crate) internal: RefCell<PipelineInternal<R, W>>,
    write_flags: Cell<WriteFlags>,
    read_buffer_settings: Cell<(u64, u64)>,
    is_static: bool,
}

impl<R: 'static, W: 'static> Default for Pipeline<R, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static, W: 'static> Pipeline<R, W> {
    /// Creates a new Pipeline
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// Creates a pipeline expected to outlive its handlers by external
    /// arrangement: drop performs no detach.
    pub fn new_static() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(is_static: bool) -> Self {
        Self {
            base: PipelineBase::new(),
            internal: RefCell::new(PipelineInternal::new()),
            write_flags: Cell::new(WriteFlags::default()),
            read_buffer_settings: Cell::new((2048, 2048)),
            is_static,
        }
    }

    /// Appends a [Handler] at the last position of this pipeline.
    pub fn add_back(&self, handler: impl Handler) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().add_back(handler, &self.base)?;
        Ok(self)
    }

    /// Inserts a [Handler] at the first position of this pipeline.
    pub fn add_front(&self, handler: impl Handler) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().add_front(handler, &self.base)?;
        Ok(self)
    }

    /// Removes the [Handler] at the last position of this pipeline.
    pub fn remove_back(&self) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().remove_back()?;
        Ok(self)
    }

    /// Removes the [Handler] at the first position of this pipeline.
    pub fn remove_front(&self) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().remove_front()?;
        Ok(self)
    }

    /// Removes the [Handler] registered under `handler_name`.
    pub fn remove(&self, handler_name: &str) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().remove(handler_name)?;
        Ok(self)
    }

    /// Returns the number of Handlers in this pipeline.
    pub fn len(&self) -> usize {
        self.internal.borrow().len()
    }

    /// Whether this pipeline has no handlers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the handler registered under `handler_name` as the owner of this
    /// pipeline; its context is skipped during teardown. Returns whether a
    /// matching handler was found.
    pub fn set_owner(&self, handler_name: &str) -> bool {
        self.internal.borrow_mut().set_owner(handler_name)
    }

    /// Wires neighbour pointers, resolves the inbound and outbound entry
    /// points and attaches contexts back-to-front. Verifies that adjacent
    /// handlers agree on their edge types. Repeatable: a second call without
    /// assembly mutation is a no-op apart from re-running the wiring, and
    /// handlers added since the last call are attached then.
    pub fn finalize(&self) -> Result<&Self, PipelineError> {
        self.internal.borrow_mut().finalize()?;
        Ok(self)
    }

    /// Runs `f` against the inbound handler at `index` (front = 0).
    pub fn inbound_handler<H, T, F>(&self, index: usize, f: F) -> Result<T, PipelineError>
    where
        H: InboundHandler + 'static,
        F: FnOnce(&H) -> T,
    {
        let (name, handler) = {
            let internal = self.internal.borrow();
            let entry = internal
                .entries
                .get(index)
                .ok_or_else(|| PipelineError::HandlerNotFound(index.to_string()))?;
            let handler = entry
                .inbound_handler
                .clone()
                .ok_or_else(|| PipelineError::HandlerNotFound(entry.name.clone()))?;
            (entry.name.clone(), handler)
        };
        let guard = handler.borrow();
        let concrete = guard
            .as_any_internal()
            .downcast_ref::<Box<dyn InboundHandler<Rin = H::Rin, Rout = H::Rout>>>()
            .and_then(|h| h.as_any().downcast_ref::<H>())
            .ok_or(PipelineError::HandlerTypeMismatch {
                name,
                index,
                expected: std::any::type_name::<H>(),
            })?;
        Ok(f(concrete))
    }

    /// Runs `f` against the outbound handler at `index` (front = 0).
    pub fn outbound_handler<H, T, F>(&self, index: usize, f: F) -> Result<T, PipelineError>
    where
        H: OutboundHandler + 'static,
        F: FnOnce(&H) -> T,
    {
        let (name, handler) = {
            let internal = self.internal.borrow();
            let entry = internal
                .entries
                .get(index)
                .ok_or_else(|| PipelineError::HandlerNotFound(index.to_string()))?;
            let handler = entry
                .outbound_handler
                .clone()
                .ok_or_else(|| PipelineError::HandlerNotFound(entry.name.clone()))?;
            (entry.name.clone(), handler)
        };
        let guard = handler.borrow();
        let concrete = guard
            .as_any_internal()
            .downcast_ref::<Box<dyn OutboundHandler<Win = H::Win, Wout = H::Wout>>>()
            .and_then(|h| h.as_any().downcast_ref::<H>())
            .ok_or(PipelineError::HandlerTypeMismatch {
                name,
                index,
                expected: std::any::type_name::<H>(),
            })?;
        Ok(f(concrete))
    }

    /// Transport is active now, which means it is connected. Advisory: a
    /// pipeline with no inbound handler silently drops the event.
    pub fn transport_active(&self) {
        let pair = self.internal.borrow().front_pair();
        if let Some((context, handler)) = pair {
            handler
                .borrow_mut()
                .transport_active_internal(&*context.borrow());
        }
    }

    /// Transport is inactive now, which means it is disconnected. Advisory,
    /// like [transport_active](Pipeline::transport_active).
    pub fn transport_inactive(&self) {
        let pair = self.internal.borrow().front_pair();
        if let Some((context, handler)) = pair {
            handler
                .borrow_mut()
                .transport_inactive_internal(&*context.borrow());
        }
    }

    /// Feeds a message to the front inbound handler.
    pub fn read(&self, msg: R) -> Result<(), PipelineError> {
        let (context, handler) = self
            .internal
            .borrow()
            .front_pair()
            .ok_or(PipelineError::NoInboundHandler)?;
        handler
            .borrow_mut()
            .read_internal(&*context.borrow(), Box::new(msg));
        Ok(())
    }

    /// Feeds an exceptional event to the front inbound handler.
    pub fn read_exception(&self, err: Box<dyn Error>) -> Result<(), PipelineError> {
        let (context, handler) = self
            .internal
            .borrow()
            .front_pair()
            .ok_or(PipelineError::NoInboundHandler)?;
        handler
            .borrow_mut()
            .read_exception_internal(&*context.borrow(), err);
        Ok(())
    }

    /// Feeds an EOF event to the front inbound handler.
    pub fn read_eof(&self) -> Result<(), PipelineError> {
        let (context, handler) = self
            .internal
            .borrow()
            .front_pair()
            .ok_or(PipelineError::NoInboundHandler)?;
        handler.borrow_mut().read_eof_internal(&*context.borrow());
        Ok(())
    }

    /// Submits a message to the back outbound handler, handing back its
    /// completion. The pipeline is not destroyed while the completion is
    /// outstanding.
    pub fn write(&self, msg: W) -> Result<WriteFuture, PipelineError> {
        let (context, handler) = self
            .internal
            .borrow()
            .back_pair()
            .ok_or(PipelineError::NoOutboundHandler)?;
        let future = handler
            .borrow_mut()
            .write_internal(&*context.borrow(), Box::new(msg));
        Ok(future.track(self.base.pending()))
    }

    /// Submits a close to the back outbound handler, handing back its
    /// completion.
    pub fn close(&self) -> Result<WriteFuture, PipelineError> {
        let (context, handler) = self
            .internal
            .borrow()
            .back_pair()
            .ok_or(PipelineError::NoOutboundHandler)?;
        let future = handler.borrow_mut().close_internal(&*context.borrow());
        Ok(future.track(self.base.pending()))
    }

    /// Sets the advisory write flags.
    pub fn set_write_flags(&self, flags: WriteFlags) {
        self.write_flags.set(flags);
    }

    /// The advisory write flags.
    pub fn write_flags(&self) -> WriteFlags {
        self.write_flags.get()
    }

    /// Sets the read-buffer hint as `(min_available, allocation_size)`.
    pub fn set_read_buffer_settings(&self, min_available: u64, allocation_size: u64) {
        self.read_buffer_settings.set((min_available, allocation_size));
    }

    /// The read-buffer hint, `(2048, 2048)` unless overridden.
    pub fn read_buffer_settings(&self) -> (u64, u64) {
        self.read_buffer_settings.get()
    }
}

impl<R: 'static, W: 'static> Deref for Pipeline<R, W> {
    type Target = PipelineBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<R: 'static, W: 'static> Drop for Pipeline<R, W> {
    fn drop(&mut self) {
        if !self.is_static {
            self.internal.borrow_mut().detach_handlers();
        }
    }
}

/// Builds finalized pipelines around a transport handle. Consumed by
/// bootstrap harnesses; the pipeline crate exposes the interface only.
pub trait PipelineFactory {
    /// Inbound message type of produced pipelines.
    type R: 'static;
    /// Outbound message type of produced pipelines.
    type W: 'static;

    /// Constructs a pipeline, adds the concrete handler stack, finalizes it
    /// and hands over ownership.
    fn new_pipeline(
        &self,
        transport: Rc<dyn Any>,
    ) -> Result<Rc<Pipeline<Self::R, Self::W>>, PipelineError>;
}
