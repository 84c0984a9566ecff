use std::{any::Any, any::TypeId, cell::RefCell, error::Error, rc::Rc};

use crate::channel::completion::WriteFuture;
use crate::channel::pipeline::PipelineBase;

/// Internal inbound handler trait, object-safe for chain traversal.
pub trait InboundHandlerInternal {
    #[doc(hidden)]
    fn attach_internal(&mut self, ctx: &dyn InboundContextInternal);
    #[doc(hidden)]
    fn detach_internal(&mut self, ctx: &dyn InboundContextInternal);

    #[doc(hidden)]
    fn transport_active_internal(&mut self, ctx: &dyn InboundContextInternal);
    #[doc(hidden)]
    fn transport_inactive_internal(&mut self, ctx: &dyn InboundContextInternal);

    #[doc(hidden)]
    fn read_internal(&mut self, ctx: &dyn InboundContextInternal, msg: Box<dyn Any>);
    #[doc(hidden)]
    fn read_exception_internal(&mut self, ctx: &dyn InboundContextInternal, err: Box<dyn Error>);
    #[doc(hidden)]
    fn read_eof_internal(&mut self, ctx: &dyn InboundContextInternal);

    /// Casts it to Any dyn trait
    fn as_any_internal(&self) -> &dyn Any;
}

/// Internal inbound context trait, object-safe for chain traversal.
pub trait InboundContextInternal {
    #[doc(hidden)]
    fn fire_transport_active_internal(&self);
    #[doc(hidden)]
    fn fire_transport_inactive_internal(&self);
    #[doc(hidden)]
    fn fire_read_internal(&self, msg: Box<dyn Any>);
    #[doc(hidden)]
    fn fire_read_exception_internal(&self, err: Box<dyn Error>);
    #[doc(hidden)]
    fn fire_read_eof_internal(&self);

    #[doc(hidden)]
    fn name(&self) -> &str;
    /// Casts it to Any dyn trait
    fn as_any(&self) -> &dyn Any;

    /// Type this context's handler reads, as `(id, name)`.
    #[doc(hidden)]
    fn read_type(&self) -> (TypeId, &'static str);
    /// Type this context's handler emits forward, as `(id, name)`.
    #[doc(hidden)]
    fn emit_type(&self) -> (TypeId, &'static str);

    #[doc(hidden)]
    fn set_pipeline(&mut self, pipeline: Option<Rc<PipelineBase>>);
    #[doc(hidden)]
    fn set_next_in_context(
        &mut self,
        next_in_context: Option<Rc<RefCell<dyn InboundContextInternal>>>,
    );
    #[doc(hidden)]
    fn set_next_in_handler(
        &mut self,
        next_in_handler: Option<Rc<RefCell<dyn InboundHandlerInternal>>>,
    );
    #[doc(hidden)]
    fn set_next_out_context(
        &mut self,
        next_out_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    );
    #[doc(hidden)]
    fn set_next_out_handler(
        &mut self,
        next_out_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,
    );
}

/// Internal outbound handler trait, object-safe for chain traversal.
pub trait OutboundHandlerInternal {
    #[doc(hidden)]
    fn attach_internal(&mut self, ctx: &dyn OutboundContextInternal);
    #[doc(hidden)]
    fn detach_internal(&mut self, ctx: &dyn OutboundContextInternal);

    #[doc(hidden)]
    fn write_internal(
        &mut self,
        ctx: &dyn OutboundContextInternal,
        msg: Box<dyn Any>,
    ) -> WriteFuture;
    #[doc(hidden)]
    fn close_internal(&mut self, ctx: &dyn OutboundContextInternal) -> WriteFuture;

    /// Casts it to Any dyn trait
    fn as_any_internal(&self) -> &dyn Any;
}

/// Internal outbound context trait, object-safe for chain traversal.
pub trait OutboundContextInternal {
    #[doc(hidden)]
    fn fire_write_internal(&self, msg: Box<dyn Any>) -> WriteFuture;
    #[doc(hidden)]
    fn fire_close_internal(&self) -> WriteFuture;

    #[doc(hidden)]
    fn name(&self) -> &str;
    /// Casts it to Any dyn trait
    fn as_any(&self) -> &dyn Any;

    /// Type this context's handler accepts from downstream, as `(id, name)`.
    #[doc(hidden)]
    fn write_type(&self) -> (TypeId, &'static str);
    /// Type this context's handler emits toward the transport, as `(id, name)`.
    #[doc(hidden)]
    fn emit_type(&self) -> (TypeId, &'static str);

    #[doc(hidden)]
    fn set_pipeline(&mut self, pipeline: Option<Rc<PipelineBase>>);
    #[doc(hidden)]
    fn set_next_out_context(
        &mut self,
        next_out_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    );
    #[doc(hidden)]
    fn set_next_out_handler(
        &mut self,
        next_out_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,
    );
}
