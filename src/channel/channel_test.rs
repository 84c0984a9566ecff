use crate::channel::*;
use crate::error::PipelineError;

use anyhow::Result;
use futures_lite::future::{block_on, poll_once};
use std::any::Any;
use std::cell::RefCell;
use std::error::Error;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default, Clone)]
pub(crate) struct Stats {
    pub(crate) active: Option<Rc<AtomicUsize>>,
    pub(crate) inactive: Option<Rc<AtomicUsize>>,
    pub(crate) read: Option<Rc<AtomicUsize>>,
    pub(crate) read_exception: Option<Rc<AtomicUsize>>,
    pub(crate) read_eof: Option<Rc<AtomicUsize>>,
    pub(crate) write: Option<Rc<AtomicUsize>>,
    pub(crate) close: Option<Rc<AtomicUsize>>,
    /// Lifecycle log: "attach:<name>" / "detach:<name>", one entry per handler.
    pub(crate) lifecycle: Option<Rc<RefCell<Vec<String>>>>,
}

impl Stats {
    fn bump(counter: &Option<Rc<AtomicUsize>>) {
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn log(&self, event: &str, name: &str) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.borrow_mut().push(format!("{}:{}", event, name));
        }
    }
}

struct MockDecoder<Rin, Rout> {
    name: String,
    stats: Stats,

    phantom_in: PhantomData<Rin>,
    phantom_out: PhantomData<Rout>,
}

struct MockEncoder<Win, Wout> {
    name: String,
    stats: Stats,
    record_lifecycle: bool,

    phantom_in: PhantomData<Win>,
    phantom_out: PhantomData<Wout>,
}

impl<Rin, Rout> MockDecoder<Rin, Rout> {
    fn new(name: &str, stats: Stats) -> Self {
        MockDecoder {
            name: name.to_string(),
            stats,
            phantom_in: PhantomData,
            phantom_out: PhantomData,
        }
    }
}

impl<Win, Wout> MockEncoder<Win, Wout> {
    fn new(name: &str, stats: Stats, record_lifecycle: bool) -> Self {
        MockEncoder {
            name: name.to_string(),
            stats,
            record_lifecycle,
            phantom_in: PhantomData,
            phantom_out: PhantomData,
        }
    }
}

/// Both-direction mock, the default workhorse of these tests.
pub(crate) struct MockHandler<R, W> {
    name: String,
    decoder: MockDecoder<R, W>,
    encoder: MockEncoder<W, R>,
}

impl<R, W> MockHandler<R, W> {
    pub(crate) fn new(name: &str, stats: Stats) -> Self {
        MockHandler {
            name: name.to_string(),
            decoder: MockDecoder::new(name, stats.clone()),
            encoder: MockEncoder::new(name, stats, false),
        }
    }
}

/// Inbound-only mock.
struct MockInbound<R, W> {
    name: String,
    decoder: MockDecoder<R, W>,
}

impl<R, W> MockInbound<R, W> {
    fn new(name: &str, stats: Stats) -> Self {
        MockInbound {
            name: name.to_string(),
            decoder: MockDecoder::new(name, stats),
        }
    }
}

/// Outbound-only mock.
struct MockOutbound<W, R> {
    name: String,
    encoder: MockEncoder<W, R>,
}

impl<W, R> MockOutbound<W, R> {
    fn new(name: &str, stats: Stats) -> Self {
        MockOutbound {
            name: name.to_string(),
            encoder: MockEncoder::new(name, stats, true),
        }
    }
}

impl<Rin: Default + 'static, Rout: Default + 'static> InboundHandler for MockDecoder<Rin, Rout> {
    type Rin = Rin;
    type Rout = Rout;

    fn attach_pipeline(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        assert!(ctx.pipeline().is_some());
        self.stats.log("attach", &self.name);
    }
    fn detach_pipeline(&mut self, _ctx: &InboundContext<Self::Rin, Self::Rout>) {
        self.stats.log("detach", &self.name);
    }

    fn transport_active(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        Stats::bump(&self.stats.active);
        ctx.fire_transport_active();
    }
    fn transport_inactive(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        Stats::bump(&self.stats.inactive);
        ctx.fire_transport_inactive();
    }

    fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, _msg: Self::Rin) {
        Stats::bump(&self.stats.read);
        ctx.fire_read(Rout::default());
    }
    fn read_exception(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, err: Box<dyn Error>) {
        Stats::bump(&self.stats.read_exception);
        ctx.fire_read_exception(err);
    }
    fn read_eof(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>) {
        Stats::bump(&self.stats.read_eof);
        ctx.fire_read_eof();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<Win: Default + 'static, Wout: Default + 'static> OutboundHandler for MockEncoder<Win, Wout> {
    type Win = Win;
    type Wout = Wout;

    fn attach_pipeline(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>) {
        if self.record_lifecycle {
            self.stats.log("attach", &self.name);
        }
    }
    fn detach_pipeline(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>) {
        if self.record_lifecycle {
            self.stats.log("detach", &self.name);
        }
    }

    fn write(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>, _msg: Self::Win) -> WriteFuture {
        Stats::bump(&self.stats.write);
        ctx.fire_write(Wout::default())
    }
    fn close(&mut self, ctx: &OutboundContext<Self::Win, Self::Wout>) -> WriteFuture {
        Stats::bump(&self.stats.close);
        ctx.fire_close()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<R: Default + 'static, W: Default + 'static> Handler for MockHandler<R, W> {
    type Rin = R;
    type Rout = W;
    type Win = W;
    type Wout = R;

    fn name(&self) -> &str {
        self.name.as_str()
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

impl<R: Default + 'static, W: Default + 'static> Handler for MockInbound<R, W> {
    type Rin = R;
    type Rout = W;
    type Win = Nothing;
    type Wout = Nothing;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    ) {
        (Some(Box::new(self.decoder)), None)
    }
}

impl<W: Default + 'static, R: Default + 'static> Handler for MockOutbound<W, R> {
    type Rin = Nothing;
    type Rout = Nothing;
    type Win = W;
    type Wout = R;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    ) {
        (None, Some(Box::new(self.encoder)))
    }
}

fn counted_stats() -> Stats {
    Stats {
        active: Some(Rc::new(AtomicUsize::new(0))),
        inactive: Some(Rc::new(AtomicUsize::new(0))),
        read: Some(Rc::new(AtomicUsize::new(0))),
        read_exception: Some(Rc::new(AtomicUsize::new(0))),
        read_eof: Some(Rc::new(AtomicUsize::new(0))),
        write: Some(Rc::new(AtomicUsize::new(0))),
        close: Some(Rc::new(AtomicUsize::new(0))),
        lifecycle: Some(Rc::new(RefCell::new(Vec::new()))),
    }
}

fn count(counter: &Option<Rc<AtomicUsize>>) -> usize {
    counter.as_ref().unwrap().load(Ordering::SeqCst)
}

#[test]
fn pipeline_test_fire_actions() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("handler1", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("handler2", stats.clone()))?;
    let pipeline = pipeline.finalize()?;

    pipeline.transport_active();
    assert_eq!(2, count(&stats.active));

    pipeline.read("TESTING".to_string())?;
    assert_eq!(2, count(&stats.read));

    pipeline.read_exception(Box::new(std::io::Error::new(
        ErrorKind::NotFound,
        "TESTING ERROR",
    )))?;
    assert_eq!(2, count(&stats.read_exception));

    pipeline.read_eof()?;
    assert_eq!(2, count(&stats.read_eof));

    // No transport-terminating stage here, so the completion surfaces the
    // fall-off-the-front as an error.
    let done = pipeline.write("TESTING".to_string())?;
    assert_eq!(2, count(&stats.write));
    assert!(block_on(done).is_err());

    let done = pipeline.close()?;
    assert_eq!(2, count(&stats.close));
    assert!(block_on(done).is_err());

    pipeline.transport_inactive();
    assert_eq!(2, count(&stats.inactive));

    Ok(())
}

#[test]
fn pipeline_test_dynamic_construction() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new(
            "handler1",
            Stats::default(),
        ))?
        .add_back(MockHandler::<String, String>::new(
            "handler2",
            Stats::default(),
        ))?;

    // Exercise both add_front and add_back. Final pipeline is
    // StI <-> ItS <-> StS <-> StS <-> StI <-> ItS
    pipeline
        .add_front(MockHandler::<usize, String>::new(
            "handler3",
            Stats::default(),
        ))?
        .add_front(MockHandler::<String, usize>::new(
            "handler4",
            Stats::default(),
        ))?
        .add_back(MockHandler::<String, usize>::new(
            "handler5",
            Stats::default(),
        ))?
        .add_back(MockHandler::<usize, String>::new(
            "handler6",
            Stats::default(),
        ))?;
    let pipeline = pipeline.finalize()?;

    assert_eq!(6, pipeline.len());

    pipeline.read("TESTING INBOUND MESSAGE".to_owned())?;
    let _ = pipeline.write("TESTING OUTBOUND MESSAGE".to_owned())?;

    Ok(())
}

#[test]
fn pipeline_test_duplicate_names_rejected() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline.add_back(MockHandler::<String, String>::new(
        "handler1",
        Stats::default(),
    ))?;

    let result = pipeline.add_back(MockHandler::<String, String>::new(
        "handler1",
        Stats::default(),
    ));
    assert!(matches!(result, Err(PipelineError::DuplicateHandler(_))));

    Ok(())
}

#[test]
fn pipeline_test_remove_handler() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new(
            "handler1",
            Stats::default(),
        ))?
        .add_back(MockHandler::<String, String>::new(
            "handler2",
            Stats::default(),
        ))?;
    pipeline
        .add_front(MockHandler::<usize, String>::new(
            "handler3",
            Stats::default(),
        ))?
        .add_front(MockHandler::<String, usize>::new(
            "handler4",
            Stats::default(),
        ))?;
    let pipeline = pipeline.finalize()?;

    pipeline.remove("handler3")?;
    pipeline.remove("handler4")?;
    let pipeline = pipeline.finalize()?;

    pipeline.read("TESTING INBOUND MESSAGE".to_owned())?;
    let _ = pipeline.write("TESTING OUTBOUND MESSAGE".to_owned())?;

    assert_eq!(2, pipeline.len());
    assert!(matches!(
        pipeline.remove("no such"),
        Err(PipelineError::HandlerNotFound(_))
    ));

    Ok(())
}

#[test]
fn pipeline_test_remove_front_back() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new(
            "handler1",
            Stats::default(),
        ))?
        .add_back(MockHandler::<String, String>::new(
            "handler2",
            Stats::default(),
        ))?
        .add_back(MockHandler::<String, String>::new(
            "handler3",
            Stats::default(),
        ))?;
    let pipeline = pipeline.finalize()?;

    pipeline.remove_front()?.remove_back()?;
    let pipeline = pipeline.finalize()?;

    assert_eq!(1, pipeline.len());

    pipeline.read("TESTING INBOUND MESSAGE".to_owned())?;
    let _ = pipeline.write("TESTING OUTBOUND MESSAGE".to_owned())?;

    pipeline.remove("handler2")?;
    assert_eq!(0, pipeline.len());
    assert!(matches!(
        pipeline.remove_back(),
        Err(PipelineError::Empty)
    ));

    Ok(())
}

#[test]
fn pipeline_test_mutation_invalidates_entry_points() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline.add_back(MockHandler::<String, String>::new(
        "handler1",
        Stats::default(),
    ))?;
    let pipeline = pipeline.finalize()?;
    pipeline.read("ok".to_owned())?;

    // Assembly after finalize parks the pipeline until the next finalize.
    pipeline.add_back(MockHandler::<String, String>::new(
        "handler2",
        Stats::default(),
    ))?;
    assert!(matches!(
        pipeline.read("parked".to_owned()),
        Err(PipelineError::NoInboundHandler)
    ));
    assert!(matches!(
        pipeline.write("parked".to_owned()),
        Err(PipelineError::NoOutboundHandler)
    ));

    let pipeline = pipeline.finalize()?;
    pipeline.read("ok again".to_owned())?;

    Ok(())
}

#[test]
fn pipeline_test_direction_filtering() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockInbound::<String, String>::new("inbound", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("both", stats.clone()))?
        .add_back(MockOutbound::<String, String>::new(
            "outbound",
            stats.clone(),
        ))?;
    let pipeline = pipeline.finalize()?;

    {
        let internal = pipeline.internal.borrow();
        assert_eq!(vec![0, 1], internal.in_sequence);
        assert_eq!(vec![1, 2], internal.out_sequence);
        assert_eq!(Some(0), internal.front);
        assert_eq!(Some(2), internal.back);
    }

    // Inbound visits the In and Both stages; the Both stage is the tail.
    pipeline.read("INBOUND".to_owned())?;
    assert_eq!(2, count(&stats.read));

    // Outbound visits the Out and Both stages, back to front.
    let _ = pipeline.write("OUTBOUND".to_owned())?;
    assert_eq!(2, count(&stats.write));

    Ok(())
}

#[test]
fn pipeline_test_attach_order_is_back_to_front() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("a", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("b", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("c", stats.clone()))?;
    pipeline.finalize()?;

    let lifecycle = stats.lifecycle.as_ref().unwrap();
    assert_eq!(
        vec!["attach:c", "attach:b", "attach:a"],
        lifecycle.borrow().clone()
    );

    // Detach runs front to back on drop.
    drop(pipeline);
    assert_eq!(
        vec![
            "attach:c",
            "attach:b",
            "attach:a",
            "detach:a",
            "detach:b",
            "detach:c"
        ],
        lifecycle.borrow().clone()
    );

    Ok(())
}

#[test]
fn pipeline_test_finalize_is_idempotent() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("a", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("b", stats.clone()))?;
    pipeline.finalize()?;
    pipeline.finalize()?;

    let lifecycle = stats.lifecycle.as_ref().unwrap();
    assert_eq!(vec!["attach:b", "attach:a"], lifecycle.borrow().clone());

    pipeline.read("still wired".to_owned())?;
    assert_eq!(2, count(&stats.read));

    // A handler added between finalize calls is the only one attached by the
    // second pass.
    pipeline.add_back(MockHandler::<String, String>::new("c", stats.clone()))?;
    pipeline.finalize()?;
    assert_eq!(
        vec!["attach:b", "attach:a", "attach:c"],
        lifecycle.borrow().clone()
    );

    Ok(())
}

#[test]
fn pipeline_test_owner_survives_teardown() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("a", stats.clone()))?
        .add_back(MockHandler::<String, String>::new("owner", stats.clone()))?;

    assert!(pipeline.set_owner("owner"));
    assert!(!pipeline.set_owner("nobody"));

    // Unrelated assembly churn must not disturb the ownership marker.
    pipeline.add_back(MockHandler::<String, String>::new(
        "transient",
        Stats::default(),
    ))?;
    pipeline.remove("transient")?;

    pipeline.finalize()?;
    drop(pipeline);

    let lifecycle = stats.lifecycle.as_ref().unwrap();
    assert_eq!(
        vec!["attach:owner", "attach:a", "detach:a"],
        lifecycle.borrow().clone()
    );

    Ok(())
}

#[test]
fn pipeline_test_static_mode_skips_detach() -> Result<()> {
    let stats = counted_stats();

    let pipeline: Pipeline<String, String> = Pipeline::new_static();
    pipeline.add_back(MockHandler::<String, String>::new("a", stats.clone()))?;
    pipeline.finalize()?;
    drop(pipeline);

    let lifecycle = stats.lifecycle.as_ref().unwrap();
    assert_eq!(vec!["attach:a"], lifecycle.borrow().clone());

    Ok(())
}

#[test]
fn pipeline_test_empty_pipeline_contract_errors() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    let pipeline = pipeline.finalize()?;

    assert!(matches!(
        pipeline.read("unrouted".to_owned()),
        Err(PipelineError::NoInboundHandler)
    ));
    assert!(matches!(
        pipeline.read_eof(),
        Err(PipelineError::NoInboundHandler)
    ));
    assert!(matches!(
        pipeline.write("unrouted".to_owned()),
        Err(PipelineError::NoOutboundHandler)
    ));
    assert!(matches!(
        pipeline.close(),
        Err(PipelineError::NoOutboundHandler)
    ));

    // Advisory events are silently dropped.
    pipeline.transport_active();
    pipeline.transport_inactive();

    Ok(())
}

#[test]
fn pipeline_test_nothing_disables_outbound() -> Result<()> {
    let stats = counted_stats();

    // W = Nothing: `write` is uncallable at the type level, and the
    // message-less outbound operation fails the contract at run time.
    let pipeline: Pipeline<String, Nothing> = Pipeline::new();
    pipeline.add_back(MockInbound::<String, String>::new("in", stats.clone()))?;
    let pipeline = pipeline.finalize()?;

    pipeline.read("INBOUND ONLY".to_owned())?;
    assert_eq!(1, count(&stats.read));
    assert!(matches!(
        pipeline.close(),
        Err(PipelineError::NoOutboundHandler)
    ));

    Ok(())
}

#[test]
fn pipeline_test_link_type_mismatch() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("a", Stats::default()))?
        .add_back(MockHandler::<usize, usize>::new("b", Stats::default()))?;

    assert!(matches!(
        pipeline.finalize(),
        Err(PipelineError::LinkTypeMismatch { .. })
    ));

    // The boundary edges are checked against R and W as well.
    let pipeline: Pipeline<usize, String> = Pipeline::new();
    pipeline.add_back(MockHandler::<String, String>::new("a", Stats::default()))?;
    assert!(matches!(
        pipeline.finalize(),
        Err(PipelineError::LinkTypeMismatch { .. })
    ));

    Ok(())
}

#[test]
fn pipeline_test_typed_handler_access() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new(
            "handler1",
            Stats::default(),
        ))?
        .add_back(MockInbound::<String, String>::new(
            "handler2",
            Stats::default(),
        ))?;
    let pipeline = pipeline.finalize()?;

    let name = pipeline
        .inbound_handler::<MockDecoder<String, String>, _, _>(0, |h| h.name.clone())?;
    assert_eq!("handler1", name);

    let name = pipeline
        .outbound_handler::<MockEncoder<String, String>, _, _>(0, |h| h.name.clone())?;
    assert_eq!("handler1", name);

    // Wrong type parameterization fails, it does not mis-cast.
    assert!(matches!(
        pipeline.inbound_handler::<MockDecoder<usize, String>, _, _>(0, |_| ()),
        Err(PipelineError::HandlerTypeMismatch { .. })
    ));

    // handler2 services no outbound direction.
    assert!(matches!(
        pipeline.outbound_handler::<MockEncoder<String, String>, _, _>(1, |_| ()),
        Err(PipelineError::HandlerNotFound(_))
    ));

    assert!(matches!(
        pipeline.inbound_handler::<MockDecoder<String, String>, _, _>(7, |_| ()),
        Err(PipelineError::HandlerNotFound(_))
    ));

    Ok(())
}

#[test]
fn pipeline_test_config_pass_through() -> Result<()> {
    let pipeline: Pipeline<String, String> = Pipeline::new();

    assert_eq!(WriteFlags::default(), pipeline.write_flags());
    assert_eq!((2048, 2048), pipeline.read_buffer_settings());

    pipeline.set_write_flags(WriteFlags {
        cork: true,
        eor: false,
    });
    pipeline.set_read_buffer_settings(4096, 16384);

    assert!(pipeline.write_flags().cork);
    assert_eq!((4096, 16384), pipeline.read_buffer_settings());

    Ok(())
}

struct PendingWriteEncoder {
    promises: Rc<RefCell<Vec<WritePromise>>>,
}

impl OutboundHandler for PendingWriteEncoder {
    type Win = String;
    type Wout = String;

    fn write(&mut self, _ctx: &OutboundContext<Self::Win, Self::Wout>, _msg: Self::Win) -> WriteFuture {
        let (promise, future) = WritePromise::new();
        self.promises.borrow_mut().push(promise);
        future
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PendingWriteHandler {
    promises: Rc<RefCell<Vec<WritePromise>>>,
}

impl Handler for PendingWriteHandler {
    type Rin = Nothing;
    type Rout = Nothing;
    type Win = String;
    type Wout = String;

    fn name(&self) -> &str {
        "PendingWriteHandler"
    }

    fn split(
        self,
    ) -> (
        Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
        Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
    ) {
        (
            None,
            Some(Box::new(PendingWriteEncoder {
                promises: self.promises,
            })),
        )
    }
}

struct MockManager {
    deleted: Rc<AtomicUsize>,
    held: RefCell<Option<Rc<Pipeline<Nothing, String>>>>,
}

impl PipelineManager for MockManager {
    fn delete_pipeline(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        self.held.borrow_mut().take();
    }
}

#[test]
fn pipeline_test_delete_waits_for_outstanding_writes() -> Result<()> {
    let promises = Rc::new(RefCell::new(Vec::new()));

    let pipeline: Rc<Pipeline<Nothing, String>> = Rc::new(Pipeline::new());
    pipeline.add_back(PendingWriteHandler {
        promises: promises.clone(),
    })?;
    pipeline.finalize()?;

    let deleted = Rc::new(AtomicUsize::new(0));
    let manager = Rc::new(MockManager {
        deleted: deleted.clone(),
        held: RefCell::new(Some(pipeline.clone())),
    });
    pipeline.set_pipeline_manager(manager);

    let mut done = pipeline.write("IN FLIGHT".to_owned())?;
    assert!(block_on(poll_once(&mut done)).is_none());

    // Deletion is requested while the write is outstanding: it must wait.
    pipeline.delete_pipeline();
    assert_eq!(0, deleted.load(Ordering::SeqCst));

    promises.borrow_mut().pop().unwrap().complete(Ok(()));
    assert_eq!(0, deleted.load(Ordering::SeqCst));

    // Observing the completion releases the last guard and the parked
    // deletion runs.
    assert!(block_on(done).is_ok());
    assert_eq!(1, deleted.load(Ordering::SeqCst));

    Ok(())
}

#[test]
fn pipeline_test_dropped_write_releases_delete() -> Result<()> {
    let promises = Rc::new(RefCell::new(Vec::new()));

    let pipeline: Rc<Pipeline<Nothing, String>> = Rc::new(Pipeline::new());
    pipeline.add_back(PendingWriteHandler {
        promises: promises.clone(),
    })?;
    pipeline.finalize()?;

    let deleted = Rc::new(AtomicUsize::new(0));
    let manager = Rc::new(MockManager {
        deleted: deleted.clone(),
        held: RefCell::new(Some(pipeline.clone())),
    });
    pipeline.set_pipeline_manager(manager);

    let done = pipeline.write("ABANDONED".to_owned())?;
    pipeline.delete_pipeline();
    assert_eq!(0, deleted.load(Ordering::SeqCst));

    // Cancellation by dropping the handle counts as settled.
    drop(done);
    assert_eq!(1, deleted.load(Ordering::SeqCst));

    Ok(())
}

#[test]
fn pipeline_test_abandoned_promise_fails_completion() -> Result<()> {
    let promises = Rc::new(RefCell::new(Vec::new()));

    let pipeline: Pipeline<Nothing, String> = Pipeline::new();
    pipeline.add_back(PendingWriteHandler {
        promises: promises.clone(),
    })?;
    let pipeline = pipeline.finalize()?;

    let done = pipeline.write("NEVER RESOLVED".to_owned())?;
    promises.borrow_mut().clear();

    assert!(matches!(block_on(done), Err(PipelineError::WriteAbandoned)));

    Ok(())
}

#[test]
fn pipeline_test_write_back_from_inbound_tail() -> Result<()> {
    // An inbound tail stage answering through ctx.fire_write: the write path
    // must enter at the nearest outbound stage below it.
    struct EchoDecoder {
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl InboundHandler for EchoDecoder {
        type Rin = String;
        type Rout = String;

        fn read(&mut self, ctx: &InboundContext<Self::Rin, Self::Rout>, msg: Self::Rin) {
            self.seen.borrow_mut().push(msg.clone());
            let _ = ctx.fire_write(msg);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct EchoHandler {
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Handler for EchoHandler {
        type Rin = String;
        type Rout = String;
        type Win = Nothing;
        type Wout = Nothing;

        fn name(&self) -> &str {
            "EchoHandler"
        }

        fn split(
            self,
        ) -> (
            Option<Box<dyn InboundHandler<Rin = Self::Rin, Rout = Self::Rout>>>,
            Option<Box<dyn OutboundHandler<Win = Self::Win, Wout = Self::Wout>>>,
        ) {
            (Some(Box::new(EchoDecoder { seen: self.seen })), None)
        }
    }

    let stats = counted_stats();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let pipeline: Pipeline<String, String> = Pipeline::new();
    pipeline
        .add_back(MockHandler::<String, String>::new("below", stats.clone()))?
        .add_back(EchoHandler { seen: seen.clone() })?;
    let pipeline = pipeline.finalize()?;

    pipeline.read("PING".to_owned())?;

    assert_eq!(vec!["PING".to_owned()], seen.borrow().clone());
    assert_eq!(1, count(&stats.write));

    Ok(())
}
