use log::warn;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::error::Error;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::channel::completion::WriteFuture;
use crate::channel::handler_internal::{
    InboundContextInternal, InboundHandlerInternal, OutboundContextInternal,
    OutboundHandlerInternal,
};
use crate::channel::pipeline::PipelineBase;
use crate::error::PipelineError;

/// Disables one direction of a `Pipeline` at the type level.
///
/// `Nothing` is uninhabited, so `Pipeline::<Nothing, W>::read` and
/// `Pipeline::<R, Nothing>::write` can never be called: no value of the
/// message type exists.
pub enum Nothing {}

pub(crate) fn is_nothing<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<Nothing>()
}

/// Directions a handler services. Derived from which halves
/// [Handler::split] yields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerDir {
    /// Consumes inbound events only.
    In,
    /// Consumes outbound operations only.
    Out,
    /// Both of the above.
    Both,
}

impl HandlerDir {
    /// Whether this direction participates in the inbound chain.
    pub fn is_inbound(self) -> bool {
        matches!(self, HandlerDir::In | HandlerDir::Both)
    }

    /// Whether this direction participates in the outbound chain.
    pub fn is_outbound(self) -> bool {
        matches!(self, HandlerDir::Out | HandlerDir::Both)
    }
}

/// A pipeline stage. Declares its four edge types and splits itself into the
/// halves it actually services: `(Some, None)` is an inbound-only stage,
/// `(None, Some)` outbound-only, `(Some, Some)` both.
pub trait Handler {
    /// Associated input message type for [InboundHandler::read]
    type Rin: 'static;
    /// Associated output message type for [InboundHandler::read]
    type Rout: 'static;
    /// Associated input message type for [OutboundHandler::write]
    type Win: 'static;
    /// Associated output message type for [OutboundHandler::write]
    type Wout: 'static;

    /// Returns handler name
    fn name(&self) -> &str;

    /// Splits itself into its InboundHandler and OutboundHandler halves.
    #[allow(clippy::type_complexity)]
    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    );

    #[doc(hidden)]
    #[allow(clippy::type_complexity)]
    fn generate(
        self,
    ) -> Result<
        (
            String,
            HandlerDir,
            Option<(
                Rc<RefCell<dyn InboundContextInternal>>,
                Rc<RefCell<dyn InboundHandlerInternal>>,
            )>,
            Option<(
                Rc<RefCell<dyn OutboundContextInternal>>,
                Rc<RefCell<dyn OutboundHandlerInternal>>,
            )>,
        ),
        PipelineError,
    >
    where
        Self: Sized,
    {
        let handler_name = self.name().to_owned();
        let (inbound_handler, outbound_handler) = self.split();

        let dir = match (&inbound_handler, &outbound_handler) {
            (Some(_), Some(_)) => HandlerDir::Both,
            (Some(_), None) => HandlerDir::In,
            (None, Some(_)) => HandlerDir::Out,
            (None, None) => return Err(PipelineError::InvalidHandler(handler_name)),
        };

        let inbound = inbound_handler.map(|handler| {
            let context: InboundContext<Self::Rin, Self::Rout> =
                InboundContext::new(&handler_name);
            (
                Rc::new(RefCell::new(context)) as Rc<RefCell<dyn InboundContextInternal>>,
                Rc::new(RefCell::new(handler)) as Rc<RefCell<dyn InboundHandlerInternal>>,
            )
        });
        let outbound = outbound_handler.map(|handler| {
            let context: OutboundContext<Self::Win, Self::Wout> =
                OutboundContext::new(&handler_name);
            (
                Rc::new(RefCell::new(context)) as Rc<RefCell<dyn OutboundContextInternal>>,
                Rc::new(RefCell::new(handler)) as Rc<RefCell<dyn OutboundHandlerInternal>>,
            )
        });

        Ok((handler_name, dir, inbound, outbound))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Handles an inbound I/O event or intercepts an I/O operation, and forwards it to its next inbound handler in its Pipeline.
pub trait InboundHandler {
    /// Associated input message type for [InboundHandler::read]
    type Rin: 'static;
    /// Associated output message type for [InboundHandler::read]
    type Rout: 'static;

    /// Called once when this handler's context is wired into a finalized pipeline.
    fn attach_pipeline(&mut self, _ctx: &InboundContext<Self::Rin, Self::Rout>) {}
    /// Called once when the pipeline releases this handler.
    fn detach_pipeline(&mut self, _ctx: &InboundContext<Self::Rin, Self::Rout>) {}

    /// Transport is active now, which means it is connected.
    fn transport_active(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        ctx.fire_transport_active();
    }
    /// Transport is inactive now, which means it is disconnected.
    fn transport_inactive(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        ctx.fire_transport_inactive();
    }

    /// Reads a message.
    fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, msg: Self::Rin);
    /// Reads an error exception in one of its inbound operations.
    fn read_exception(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, err: Box<dyn Error>) {
        ctx.fire_read_exception(err);
    }
    /// Reads an EOF event.
    fn read_eof(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        ctx.fire_read_eof();
    }

    /// Casts it to Any dyn trait
    fn as_any(&self) -> &dyn Any;
}

impl<Rin: 'static, Rout: 'static> InboundHandlerInternal
    for Box<dyn InboundHandler<Rin = Rin, Rout = Rout>>
{
    fn attach_internal(&mut self, ctx: &dyn InboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.attach_pipeline(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn detach_internal(&mut self, ctx: &dyn InboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.detach_pipeline(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }

    fn transport_active_internal(&mut self, ctx: &dyn InboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.transport_active(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn transport_inactive_internal(&mut self, ctx: &dyn InboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.transport_inactive(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }

    fn read_internal(&mut self, ctx: &dyn InboundContextInternal, msg: Box<dyn Any>) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            if let Ok(msg) = msg.downcast::<Rin>() {
                self.read(ctx, *msg);
            } else {
                panic!("msg can't downcast::<Rin> in {} handler", ctx.name());
            }
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn read_exception_internal(&mut self, ctx: &dyn InboundContextInternal, err: Box<dyn Error>) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.read_exception(ctx, err);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn read_eof_internal(&mut self, ctx: &dyn InboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<InboundContext<Rin, Rout>>() {
            self.read_eof(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<InboundContext<Rin, Rout>> in {} handler",
                ctx.name()
            );
        }
    }

    fn as_any_internal(&self) -> &dyn Any {
        self
    }
}

/// Handles an outbound I/O event or intercepts an I/O operation, and forwards it to its next outbound handler in its Pipeline.
pub trait OutboundHandler {
    /// Associated input message type for [OutboundHandler::write]
    type Win: 'static;
    /// Associated output message type for [OutboundHandler::write]
    type Wout: 'static;

    /// Called once when this handler's context is wired into a finalized pipeline.
    fn attach_pipeline(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>) {}
    /// Called once when the pipeline releases this handler.
    fn detach_pipeline(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>) {}

    /// Writes a message, handing back its completion.
    fn write(
        &mut self,
        ctx: &OutboundContext<Self::Win, Self::Wout>,
        msg: Self::Win,
    ) -> WriteFuture;
    /// Writes a close event, handing back its completion.
    fn close(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>) -> WriteFuture {
        ctx.fire_close()
    }

    /// Casts it to Any dyn trait
    fn as_any(&self) -> &dyn Any;
}

impl<Win: 'static, Wout: 'static> OutboundHandlerInternal
    for Box<dyn OutboundHandler<Win = Win, Wout = Wout>>
{
    fn attach_internal(&mut self, ctx: &dyn OutboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<OutboundContext<Win, Wout>>() {
            self.attach_pipeline(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<OutboundContext<Win, Wout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn detach_internal(&mut self, ctx: &dyn OutboundContextInternal) {
        if let Some(ctx) = ctx.as_any().downcast_ref::<OutboundContext<Win, Wout>>() {
            self.detach_pipeline(ctx);
        } else {
            panic!(
                "ctx can't downcast_ref::<OutboundContext<Win, Wout>> in {} handler",
                ctx.name()
            );
        }
    }

    fn write_internal(
        &mut self,
        ctx: &dyn OutboundContextInternal,
        msg: Box<dyn Any>,
    ) -> WriteFuture {
        if let Some(ctx) = ctx.as_any().downcast_ref::<OutboundContext<Win, Wout>>() {
            if let Ok(msg) = msg.downcast::<Win>() {
                self.write(ctx, *msg)
            } else {
                panic!("msg can't downcast::<Win> in {} handler", ctx.name());
            }
        } else {
            panic!(
                "ctx can't downcast_ref::<OutboundContext<Win, Wout>> in {} handler",
                ctx.name()
            );
        }
    }
    fn close_internal(&mut self, ctx: &dyn OutboundContextInternal) -> WriteFuture {
        if let Some(ctx) = ctx.as_any().downcast_ref::<OutboundContext<Win, Wout>>() {
            self.close(ctx)
        } else {
            panic!(
                "ctx can't downcast_ref::<OutboundContext<Win, Wout>> in {} handler",
                ctx.name()
            );
        }
    }

    fn as_any_internal(&self) -> &dyn Any {
        self
    }
}

/// Enables a [InboundHandler] to interact with its Pipeline and other handlers.
pub struct InboundContext<Rin, Rout> {
    name: String,

    next_in_context: Option<Rc<RefCell<dyn InboundContextInternal>>>,
    next_in_handler: Option<Rc<RefCell<dyn InboundHandlerInternal>>>,

    next_out: OutboundContext<Rout, Rin>,

    phantom_rin: PhantomData<Rin>,
    phantom_rout: PhantomData<Rout>,
}

impl<Rin: 'static, Rout: 'static> InboundContext<Rin, Rout> {
    /// Creates a new InboundContext
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),

            next_in_context: None,
            next_in_handler: None,

            next_out: OutboundContext::new(name),

            phantom_rin: PhantomData,
            phantom_rout: PhantomData,
        }
    }

    /// The pipeline this context belongs to.
    pub fn pipeline(&self) -> Option<&Rc<PipelineBase>> {
        self.next_out.pipeline()
    }

    /// Transport is active now, which means it is connected.
    pub fn fire_transport_active(&self) {
        if let (Some(next_in_handler), Some(next_in_context)) =
            (&self.next_in_handler, &self.next_in_context)
        {
            let (mut next_handler, next_ctx) =
                (next_in_handler.borrow_mut(), next_in_context.borrow());
            next_handler.transport_active_internal(&*next_ctx);
        }
    }

    /// Transport is inactive now, which means it is disconnected.
    pub fn fire_transport_inactive(&self) {
        if let (Some(next_in_handler), Some(next_in_context)) =
            (&self.next_in_handler, &self.next_in_context)
        {
            let (mut next_handler, next_ctx) =
                (next_in_handler.borrow_mut(), next_in_context.borrow());
            next_handler.transport_inactive_internal(&*next_ctx);
        }
    }

    /// Reads a message.
    pub fn fire_read(&self, msg: Rout) {
        if let (Some(next_in_handler), Some(next_in_context)) =
            (&self.next_in_handler, &self.next_in_context)
        {
            let (mut next_handler, next_ctx) =
                (next_in_handler.borrow_mut(), next_in_context.borrow());
            next_handler.read_internal(&*next_ctx, Box::new(msg));
        } else {
            warn!("read reached end of pipeline");
        }
    }

    /// Reads an error exception in one of its inbound operations.
    pub fn fire_read_exception(&self, err: Box<dyn Error>) {
        if let (Some(next_in_handler), Some(next_in_context)) =
            (&self.next_in_handler, &self.next_in_context)
        {
            let (mut next_handler, next_ctx) =
                (next_in_handler.borrow_mut(), next_in_context.borrow());
            next_handler.read_exception_internal(&*next_ctx, err);
        } else {
            warn!("read_exception reached end of pipeline");
        }
    }

    /// Reads an EOF event.
    pub fn fire_read_eof(&self) {
        if let (Some(next_in_handler), Some(next_in_context)) =
            (&self.next_in_handler, &self.next_in_context)
        {
            let (mut next_handler, next_ctx) =
                (next_in_handler.borrow_mut(), next_in_context.borrow());
            next_handler.read_eof_internal(&*next_ctx);
        } else {
            warn!("read_eof reached end of pipeline");
        }
    }
}

impl<Rin: 'static, Rout: 'static> InboundContextInternal for InboundContext<Rin, Rout> {
    fn fire_transport_active_internal(&self) {
        self.fire_transport_active();
    }
    fn fire_transport_inactive_internal(&self) {
        self.fire_transport_inactive();
    }
    fn fire_read_internal(&self, msg: Box<dyn Any>) {
        if let Ok(msg) = msg.downcast::<Rout>() {
            self.fire_read(*msg);
        } else {
            panic!("msg can't downcast::<Rout> in {} handler", self.name());
        }
    }
    fn fire_read_exception_internal(&self, err: Box<dyn Error>) {
        self.fire_read_exception(err);
    }
    fn fire_read_eof_internal(&self) {
        self.fire_read_eof();
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn read_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<Rin>(), std::any::type_name::<Rin>())
    }
    fn emit_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<Rout>(), std::any::type_name::<Rout>())
    }

    fn set_pipeline(&mut self, pipeline: Option<Rc<PipelineBase>>) {
        self.next_out.set_pipeline(pipeline);
    }
    fn set_next_in_context(
        &mut self,
        next_in_context: Option<Rc<RefCell<dyn InboundContextInternal>>>,
    ) {
        self.next_in_context = next_in_context;
    }
    fn set_next_in_handler(
        &mut self,
        next_in_handler: Option<Rc<RefCell<dyn InboundHandlerInternal>>>,
    ) {
        self.next_in_handler = next_in_handler;
    }
    fn set_next_out_context(
        &mut self,
        next_out_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    ) {
        self.next_out.set_next_out_context(next_out_context);
    }
    fn set_next_out_handler(
        &mut self,
        next_out_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,
    ) {
        self.next_out.set_next_out_handler(next_out_handler);
    }
}

impl<Rin, Rout> Deref for InboundContext<Rin, Rout> {
    type Target = OutboundContext<Rout, Rin>;
    fn deref(&self) -> &Self::Target {
        &self.next_out
    }
}

impl<Rin, Rout> DerefMut for InboundContext<Rin, Rout> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.next_out
    }
}

/// Enables a [OutboundHandler] to interact with its Pipeline and other handlers.
pub struct OutboundContext<Win, Wout> {
    name: String,

    pipeline: Option<Rc<PipelineBase>>,

    next_out_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    next_out_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,

    phantom_win: PhantomData<Win>,
    phantom_wout: PhantomData<Wout>,
}

impl<Win: 'static, Wout: 'static> OutboundContext<Win, Wout> {
    /// Creates a new OutboundContext
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),

            pipeline: None,

            next_out_context: None,
            next_out_handler: None,

            phantom_win: PhantomData,
            phantom_wout: PhantomData,
        }
    }

    /// The pipeline this context belongs to.
    pub fn pipeline(&self) -> Option<&Rc<PipelineBase>> {
        self.pipeline.as_ref()
    }

    /// Writes a message, handing back its completion.
    pub fn fire_write(&self, msg: Wout) -> WriteFuture {
        if let (Some(next_out_handler), Some(next_out_context)) =
            (&self.next_out_handler, &self.next_out_context)
        {
            let (mut next_handler, next_ctx) =
                (next_out_handler.borrow_mut(), next_out_context.borrow());
            next_handler.write_internal(&*next_ctx, Box::new(msg))
        } else {
            warn!("write reached end of pipeline");
            WriteFuture::ready(Err(PipelineError::NoOutboundHandler))
        }
    }

    /// Writes a close event, handing back its completion.
    pub fn fire_close(&self) -> WriteFuture {
        if let (Some(next_out_handler), Some(next_out_context)) =
            (&self.next_out_handler, &self.next_out_context)
        {
            let (mut next_handler, next_ctx) =
                (next_out_handler.borrow_mut(), next_out_context.borrow());
            next_handler.close_internal(&*next_ctx)
        } else {
            warn!("close reached end of pipeline");
            WriteFuture::ready(Err(PipelineError::NoOutboundHandler))
        }
    }
}

impl<Win: 'static, Wout: 'static> OutboundContextInternal for OutboundContext<Win, Wout> {
    fn fire_write_internal(&self, msg: Box<dyn Any>) -> WriteFuture {
        if let Ok(msg) = msg.downcast::<Wout>() {
            self.fire_write(*msg)
        } else {
            panic!("msg can't downcast::<Wout> in {} handler", self.name());
        }
    }
    fn fire_close_internal(&self) -> WriteFuture {
        self.fire_close()
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn write_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<Win>(), std::any::type_name::<Win>())
    }
    fn emit_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<Wout>(), std::any::type_name::<Wout>())
    }

    fn set_pipeline(&mut self, pipeline: Option<Rc<PipelineBase>>) {
        self.pipeline = pipeline;
    }
    fn set_next_out_context(
        &mut self,
        next_out_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    ) {
        self.next_out_context = next_out_context;
    }
    fn set_next_out_handler(
        &mut self,
        next_out_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,
    ) {
        self.next_out_handler = next_out_handler;
    }
}
