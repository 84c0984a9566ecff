use log::warn;
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::channel::handler::{is_nothing, Handler, HandlerDir};
use crate::channel::handler_internal::{
    InboundContextInternal, InboundHandlerInternal, OutboundContextInternal,
    OutboundHandlerInternal,
};
use crate::channel::pipeline::PipelineBase;
use crate::error::PipelineError;

/// One handler slot: the halves the handler services, each behind its
/// type-erased context.
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) dir: HandlerDir,
    pub(crate) attached: Cell<bool>,
    pub(crate) inbound_context: Option<Rc<RefCell<dyn InboundContextInternal>>>,
    pub(crate) inbound_handler: Option<Rc<RefCell<dyn InboundHandlerInternal>>>,
    pub(crate) outbound_context: Option<Rc<RefCell<dyn OutboundContextInternal>>>,
    pub(crate) outbound_handler: Option<Rc<RefCell<dyn OutboundHandlerInternal>>>,
}

pub(crate) struct PipelineInternal<R: 'static, W: 'static> {
    /// Insertion order defines the chain; index 0 is closest to the transport.
    pub(crate) entries: Vec<Entry>,
    /// Indices of entries servicing the inbound direction, in chain order.
    pub(crate) in_sequence: Vec<usize>,
    /// Indices of entries servicing the outbound direction, in chain order.
    pub(crate) out_sequence: Vec<usize>,
    /// Inbound entry point, resolved by `finalize`.
    pub(crate) front: Option<usize>,
    /// Outbound entry point, resolved by `finalize`.
    pub(crate) back: Option<usize>,
    /// Name of the owner entry, exempt from detach on teardown.
    pub(crate) owner: Option<String>,

    phantom: PhantomData<(R, W)>,
}

impl<R: 'static, W: 'static> PipelineInternal<R, W> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            in_sequence: Vec::new(),
            out_sequence: Vec::new(),
            front: None,
            back: None,
            owner: None,
            phantom: PhantomData,
        }
    }

    pub(crate) fn add_back(
        &mut self,
        handler: impl Handler,
        base: &Rc<PipelineBase>,
    ) -> Result<(), PipelineError> {
        let entry = self.make_entry(handler, base)?;
        self.entries.push(entry);
        self.mutated();
        Ok(())
    }

    pub(crate) fn add_front(
        &mut self,
        handler: impl Handler,
        base: &Rc<PipelineBase>,
    ) -> Result<(), PipelineError> {
        let entry = self.make_entry(handler, base)?;
        self.entries.insert(0, entry);
        self.mutated();
        Ok(())
    }

    fn make_entry(
        &self,
        handler: impl Handler,
        base: &Rc<PipelineBase>,
    ) -> Result<Entry, PipelineError> {
        let (name, dir, inbound, outbound) = handler.generate()?;
        if self.entries.iter().any(|e| e.name == name) {
            return Err(PipelineError::DuplicateHandler(name));
        }
        if let Some((context, _)) = &inbound {
            context.borrow_mut().set_pipeline(Some(Rc::clone(base)));
        }
        if let Some((context, _)) = &outbound {
            context.borrow_mut().set_pipeline(Some(Rc::clone(base)));
        }
        let (inbound_context, inbound_handler) = match inbound {
            Some((context, handler)) => (Some(context), Some(handler)),
            None => (None, None),
        };
        let (outbound_context, outbound_handler) = match outbound {
            Some((context, handler)) => (Some(context), Some(handler)),
            None => (None, None),
        };
        Ok(Entry {
            name,
            dir,
            attached: Cell::new(false),
            inbound_context,
            inbound_handler,
            outbound_context,
            outbound_handler,
        })
    }

    pub(crate) fn remove_back(&mut self) -> Result<(), PipelineError> {
        if self.entries.is_empty() {
            Err(PipelineError::Empty)
        } else {
            self.entries.pop();
            self.mutated();
            Ok(())
        }
    }

    pub(crate) fn remove_front(&mut self) -> Result<(), PipelineError> {
        if self.entries.is_empty() {
            Err(PipelineError::Empty)
        } else {
            self.entries.remove(0);
            self.mutated();
            Ok(())
        }
    }

    pub(crate) fn remove(&mut self, handler_name: &str) -> Result<(), PipelineError> {
        match self.entries.iter().position(|e| e.name == handler_name) {
            Some(index) => {
                self.entries.remove(index);
                self.mutated();
                Ok(())
            }
            None => Err(PipelineError::HandlerNotFound(handler_name.to_owned())),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn set_owner(&mut self, handler_name: &str) -> bool {
        if self.entries.iter().any(|e| e.name == handler_name) {
            self.owner = Some(handler_name.to_owned());
            true
        } else {
            false
        }
    }

    /// Re-derives the direction sequences and invalidates the entry points;
    /// operations stay unavailable until the next `finalize`.
    fn mutated(&mut self) {
        self.in_sequence = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.dir.is_inbound())
            .map(|(i, _)| i)
            .collect();
        self.out_sequence = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.dir.is_outbound())
            .map(|(i, _)| i)
            .collect();
        self.front = None;
        self.back = None;
    }

    /// Wires neighbour pointers, resolves the entry points and attaches
    /// not-yet-attached contexts back-to-front. Repeatable; attach runs once
    /// per context.
    pub(crate) fn finalize(&mut self) -> Result<(), PipelineError> {
        self.check_edges()?;

        for (pos, &index) in self.in_sequence.iter().enumerate() {
            let entry = &self.entries[index];
            let mut context = entry.inbound_context.as_ref().unwrap().borrow_mut();

            match self.in_sequence.get(pos + 1).map(|&i| &self.entries[i]) {
                Some(next) => {
                    context.set_next_in_context(Some(next.inbound_context.clone().unwrap()));
                    context.set_next_in_handler(Some(next.inbound_handler.clone().unwrap()));
                }
                None => {
                    context.set_next_in_context(None);
                    context.set_next_in_handler(None);
                }
            }

            // Write path for inbound stages: the nearest outbound stage below.
            match self.nearest_outbound_below(index) {
                Some(below) => {
                    context.set_next_out_context(Some(below.outbound_context.clone().unwrap()));
                    context.set_next_out_handler(Some(below.outbound_handler.clone().unwrap()));
                }
                None => {
                    context.set_next_out_context(None);
                    context.set_next_out_handler(None);
                }
            }
        }

        for &index in self.out_sequence.iter() {
            let entry = &self.entries[index];
            let mut context = entry.outbound_context.as_ref().unwrap().borrow_mut();

            match self.nearest_outbound_below(index) {
                Some(below) => {
                    context.set_next_out_context(Some(below.outbound_context.clone().unwrap()));
                    context.set_next_out_handler(Some(below.outbound_handler.clone().unwrap()));
                }
                None => {
                    context.set_next_out_context(None);
                    context.set_next_out_handler(None);
                }
            }
        }

        self.front = self.in_sequence.first().copied();
        self.back = self.out_sequence.last().copied();

        if self.front.is_none() && !is_nothing::<R>() {
            warn!("no inbound handler in pipeline, inbound operations will fail");
        }
        if self.back.is_none() && !is_nothing::<W>() {
            warn!("no outbound handler in pipeline, outbound operations will fail");
        }

        for entry in self.entries.iter().rev() {
            if entry.attached.get() {
                continue;
            }
            if let (Some(context), Some(handler)) = (&entry.inbound_context, &entry.inbound_handler)
            {
                handler.borrow_mut().attach_internal(&*context.borrow());
            }
            if let (Some(context), Some(handler)) =
                (&entry.outbound_context, &entry.outbound_handler)
            {
                handler.borrow_mut().attach_internal(&*context.borrow());
            }
            entry.attached.set(true);
        }

        Ok(())
    }

    fn nearest_outbound_below(&self, index: usize) -> Option<&Entry> {
        self.entries[..index]
            .iter()
            .rev()
            .find(|e| e.dir.is_outbound())
    }

    /// Verifies that every edge of both chains agrees on its message type,
    /// including the pipeline's own `R`/`W` boundary edges.
    fn check_edges(&self) -> Result<(), PipelineError> {
        for pair in self.in_sequence.windows(2) {
            let (from, to) = (&self.entries[pair[0]], &self.entries[pair[1]]);
            let (emit_id, emits) = from.inbound_context.as_ref().unwrap().borrow().emit_type();
            let (read_id, accepts) = to.inbound_context.as_ref().unwrap().borrow().read_type();
            if emit_id != read_id {
                return Err(PipelineError::LinkTypeMismatch {
                    from: from.name.clone(),
                    emits,
                    to: to.name.clone(),
                    accepts,
                });
            }
        }
        if let Some(&first) = self.in_sequence.first() {
            let entry = &self.entries[first];
            let (read_id, accepts) = entry.inbound_context.as_ref().unwrap().borrow().read_type();
            if read_id != TypeId::of::<R>() {
                return Err(PipelineError::LinkTypeMismatch {
                    from: "pipeline".to_owned(),
                    emits: std::any::type_name::<R>(),
                    to: entry.name.clone(),
                    accepts,
                });
            }
        }

        for pair in self.out_sequence.windows(2) {
            let (below, above) = (&self.entries[pair[0]], &self.entries[pair[1]]);
            let (emit_id, emits) = above.outbound_context.as_ref().unwrap().borrow().emit_type();
            let (write_id, accepts) = below.outbound_context.as_ref().unwrap().borrow().write_type();
            if emit_id != write_id {
                return Err(PipelineError::LinkTypeMismatch {
                    from: above.name.clone(),
                    emits,
                    to: below.name.clone(),
                    accepts,
                });
            }
        }
        if let Some(&last) = self.out_sequence.last() {
            let entry = &self.entries[last];
            let (write_id, accepts) = entry.outbound_context.as_ref().unwrap().borrow().write_type();
            if write_id != TypeId::of::<W>() {
                return Err(PipelineError::LinkTypeMismatch {
                    from: "pipeline".to_owned(),
                    emits: std::any::type_name::<W>(),
                    to: entry.name.clone(),
                    accepts,
                });
            }
        }

        Ok(())
    }

    /// Detaches every attached context except the owner's, front to back.
    pub(crate) fn detach_handlers(&mut self) {
        for entry in self.entries.iter() {
            if self.owner.as_deref() == Some(entry.name.as_str()) {
                continue;
            }
            if !entry.attached.get() {
                continue;
            }
            if let (Some(context), Some(handler)) = (&entry.inbound_context, &entry.inbound_handler)
            {
                handler.borrow_mut().detach_internal(&*context.borrow());
            }
            if let (Some(context), Some(handler)) =
                (&entry.outbound_context, &entry.outbound_handler)
            {
                handler.borrow_mut().detach_internal(&*context.borrow());
            }
            entry.attached.set(false);
        }
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn front_pair(
        &self,
    ) -> Option<(
        Rc<RefCell<dyn InboundContextInternal>>,
        Rc<RefCell<dyn InboundHandlerInternal>>,
    )> {
        self.front.map(|index| {
            let entry = &self.entries[index];
            (
                entry.inbound_context.clone().unwrap(),
                entry.inbound_handler.clone().unwrap(),
            )
        })
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn back_pair(
        &self,
    ) -> Option<(
        Rc<RefCell<dyn OutboundContextInternal>>,
        Rc<RefCell<dyn OutboundHandlerInternal>>,
    )> {
        self.back.map(|index| {
            let entry = &self.entries[index];
            (
                entry.outbound_context.clone().unwrap(),
                entry.outbound_handler.clone().unwrap(),
            )
        })
    }
}
