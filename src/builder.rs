//! Chainable pipeline façade
//!
//! Chain methods record operations and return a new pipeline sharing the same
//! source; nothing runs until a terminal is called. Terminals compile the
//! operation list (once per pipeline value), open the source and drive the
//! fused plan over it.

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::config::{Contract, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::execution_plan::{FusedPlan, PlanSummary};
use crate::pipeline::executor::FusedIter;
use crate::pipeline::ir::{Expand, Op, OpInfo, Predicate};
use crate::pipeline::{terminals, Planner};
use crate::search::{TextFields, TextQuery};
use crate::source::{
    BoxCursor, Cursor, CursorFactory, Feed, IntoSource, IterCursor, Materializer, Source,
    SourceClass, SourceHandle,
};

/// Create a pipeline over a random-access source
pub fn lazy<'a, T, S>(source: S) -> Pipeline<'a, T>
where
    T: Clone + 'a,
    S: IntoSource<'a, T>,
{
    Pipeline::new(source)
}

/// A lazy, single-pass pipeline over a source
pub struct Pipeline<'a, T> {
    source: Rc<SourceHandle<'a, T>>,
    ops: Vec<Op<'a, T>>,
    config: PipelineConfig,
    /// Compiled on the first terminal call
    plan: OnceCell<Result<Rc<FusedPlan<'a, T>>>>,
    consumed: Cell<bool>,
}

type Run<'a, T> = (Rc<FusedPlan<'a, T>>, Feed<'a, T>);

impl<'a, T: Clone + 'a> Pipeline<'a, T> {
    pub fn new<S: IntoSource<'a, T>>(source: S) -> Self {
        Self::from_source(Source::Indexed(source.into_source()), PipelineConfig::default())
    }

    /// Pipeline over a single-pass iterator; one terminal run only
    pub fn once<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self::once_cursor(IterCursor(iter.into_iter()))
    }

    /// Pipeline over a single cursor; one terminal run only
    pub fn once_cursor<C: Cursor<T> + 'a>(cursor: C) -> Self {
        let cursor: BoxCursor<'a, T> = Box::new(cursor);
        Self::from_source(
            Source::Once(std::cell::RefCell::new(Some(cursor))),
            PipelineConfig::default(),
        )
    }

    /// Pipeline over a fresh iterator per terminal run
    pub fn replay<I, F>(factory: F) -> Self
    where
        F: Fn() -> I + 'a,
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self::replay_cursor(move || IterCursor(factory().into_iter()))
    }

    /// Pipeline over a fresh cursor per terminal run
    pub fn replay_cursor<C, F>(factory: F) -> Self
    where
        F: Fn() -> C + 'a,
        C: Cursor<T> + 'a,
    {
        let factory: CursorFactory<'a, T> =
            Rc::new(move || -> Result<BoxCursor<'a, T>> { Ok(Box::new(factory())) });
        Self::from_source(Source::Replay(factory), PipelineConfig::default())
    }

    fn from_source(source: Source<'a, T>, config: PipelineConfig) -> Self {
        Pipeline {
            source: Rc::new(SourceHandle::new(source)),
            ops: Vec::new(),
            config,
            plan: OnceCell::new(),
            consumed: Cell::new(false),
        }
    }

    /// New pipeline value over the same source
    fn derive(&self, ops: Vec<Op<'a, T>>, config: PipelineConfig) -> Self {
        Pipeline {
            source: Rc::clone(&self.source),
            ops,
            config,
            plan: OnceCell::new(),
            consumed: Cell::new(false),
        }
    }

    fn push(&self, op: Op<'a, T>) -> Self {
        let mut ops = Vec::with_capacity(self.ops.len() + 1);
        ops.extend(self.ops.iter().cloned());
        ops.push(op);
        self.derive(ops, self.config)
    }

    /// Same operations under another configuration
    pub fn with_config(&self, config: PipelineConfig) -> Self {
        self.derive(self.ops.clone(), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Chain methods
    // ------------------------------------------------------------------

    pub fn transform<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T + 'a,
    {
        self.push(Op::Transform {
            f: Rc::new(move |value: T, _: usize| f(value)),
            indexed: false,
        })
    }

    /// `f` receives the number of elements that reached this step before
    pub fn transform_indexed<F>(&self, f: F) -> Self
    where
        F: Fn(T, usize) -> T + 'a,
    {
        self.push(Op::Transform {
            f: Rc::new(f),
            indexed: true,
        })
    }

    pub fn filter<F>(&self, pred: F) -> Self
    where
        F: Fn(&T) -> bool + 'a,
    {
        self.push(Op::Filter {
            pred: Predicate::Test(Rc::new(move |value: &T, _: usize| pred(value))),
            indexed: false,
            search: None,
        })
    }

    pub fn filter_indexed<F>(&self, pred: F) -> Self
    where
        F: Fn(&T, usize) -> bool + 'a,
    {
        self.push(Op::Filter {
            pred: Predicate::Test(Rc::new(pred)),
            indexed: true,
            search: None,
        })
    }

    /// Skip `start` elements, then stop after `end - start`
    pub fn range(&self, start: usize, end: Option<usize>) -> Self {
        self.push(Op::Range { start, end })
    }

    pub fn drop(&self, n: usize) -> Self {
        self.range(n, None)
    }

    pub fn take(&self, n: usize) -> Self {
        self.range(0, Some(n))
    }

    /// Slice with negative bounds counting from the end
    ///
    /// Non-negative bounds compile to a range. A negative bound needs the total
    /// length, so the upstream pipeline is materialized when a terminal runs.
    pub fn slice(&self, start: isize, end: Option<isize>) -> Self {
        if start >= 0 && end.map_or(true, |end| end >= 0) {
            return self.range(start.unsigned_abs(), end.map(isize::unsigned_abs));
        }

        let upstream = self.derive(self.ops.clone(), self.config);
        let materialize: Materializer<'a, T> = Rc::new(move || -> Result<Vec<T>> {
            let mut values = upstream.collect_unclaimed()?;
            let (from, to) = resolve_slice(values.len(), start, end);
            values.truncate(to);
            values.drain(..from);
            Ok(values)
        });
        Self::from_source(Source::Deferred(materialize), self.config)
    }

    /// Expand every element into the values returned by `f`, one level
    pub fn flat_map<I, F>(&self, f: F) -> Self
    where
        F: Fn(T) -> I + 'a,
        I: IntoIterator<Item = T>,
    {
        self.push(Op::Flatten {
            expand: Rc::new(move |value: T, _: usize| f(value).into_iter().collect()),
            indexed: false,
        })
    }

    pub fn flat_map_indexed<I, F>(&self, f: F) -> Self
    where
        F: Fn(T, usize) -> I + 'a,
        I: IntoIterator<Item = T>,
    {
        self.push(Op::Flatten {
            expand: Rc::new(move |value: T, index: usize| f(value, index).into_iter().collect()),
            indexed: true,
        })
    }

    /// Expand nested elements one level
    pub fn flatten(&self) -> Self
    where
        T: Expand,
    {
        self.push(Op::Flatten {
            expand: Rc::new(|value: T, _: usize| value.expand()),
            indexed: false,
        })
    }

    /// Expand container elements into a pipeline of their items
    pub fn flatten_into(&self) -> Pipeline<'a, T::Item>
    where
        T: IntoIterator,
        T::Item: Clone + 'a,
        T::IntoIter: 'a,
    {
        let upstream = self.derive(self.ops.clone(), self.config);
        let factory: CursorFactory<'a, T::Item> = Rc::new(move || -> Result<BoxCursor<'a, T::Item>> {
            Ok(Box::new(IterCursor(upstream.open_iter()?.flatten())))
        });
        Pipeline::from_source(Source::Replay(factory), self.config)
    }

    /// Change the element type
    ///
    /// Operations after `map` run over a new pipeline that pulls from this one
    /// lazily; nothing is materialized.
    pub fn map<U, F>(&self, f: F) -> Pipeline<'a, U>
    where
        U: Clone + 'a,
        F: Fn(T) -> U + 'a,
    {
        let upstream = self.derive(self.ops.clone(), self.config);
        let f = Rc::new(f);
        let factory: CursorFactory<'a, U> = Rc::new(move || -> Result<BoxCursor<'a, U>> {
            let f = Rc::clone(&f);
            let values = upstream.open_iter()?;
            Ok(Box::new(IterCursor(values.map(move |value| f(value)))))
        });
        Pipeline::from_source(Source::Replay(factory), self.config)
    }

    /// Keep elements where every token of `query` matches one of `fields`
    ///
    /// A query without fields, or without any token of three or more
    /// characters, matches nothing and makes the pipeline statically empty.
    /// Two-letter tokens alone are not enough: `"ab"` and `"a an of"` are
    /// both rejected.
    pub fn filter_text(&self, query: &str, fields: &[&str]) -> Self
    where
        T: TextFields,
    {
        let query = TextQuery::compile(query, fields);
        self.push(Op::Filter {
            pred: query.predicate(),
            indexed: false,
            search: Some(query.shared_info()),
        })
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Inert description of the operation list
    pub fn describe(&self) -> Vec<OpInfo> {
        self.ops.iter().map(Op::info).collect()
    }

    pub fn plan_summary(&self) -> Result<PlanSummary> {
        Ok(self.compiled()?.summary())
    }

    pub fn source_class(&self) -> SourceClass {
        self.source.class()
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.claim()?;
        self.collect_unclaimed()
    }

    pub fn for_each<F: FnMut(T)>(&self, mut sink: F) -> Result<()> {
        self.for_each_indexed(|value, _| sink(value))
    }

    /// `sink` receives the emitted index
    pub fn for_each_indexed<F: FnMut(T, usize)>(&self, sink: F) -> Result<()> {
        if let Some((plan, feed)) = self.prepare()? {
            terminals::for_each(&plan, feed, sink);
        }
        Ok(())
    }

    /// Run `sink` until it fails; pipeline errors convert into `E`
    pub fn try_for_each<E, F>(&self, mut sink: F) -> std::result::Result<(), E>
    where
        E: From<PipelineError>,
        F: FnMut(T) -> std::result::Result<(), E>,
    {
        match self.prepare()? {
            Some((plan, feed)) => terminals::try_for_each(&plan, feed, |value, _| sink(value)),
            None => Ok(()),
        }
    }

    pub fn fold<A, F: FnMut(A, T) -> A>(&self, seed: A, mut combine: F) -> Result<A> {
        self.fold_indexed(seed, |acc, value, _| combine(acc, value))
    }

    pub fn fold_indexed<A, F: FnMut(A, T, usize) -> A>(&self, seed: A, combine: F) -> Result<A> {
        match self.prepare()? {
            Some((plan, feed)) => terminals::fold(&plan, feed, seed, combine),
            None => Ok(seed),
        }
    }

    /// Fold without a seed
    ///
    /// # Errors
    /// `EmptyReduce` when no element reaches the terminal.
    pub fn reduce<F: FnMut(T, T) -> T>(&self, mut combine: F) -> Result<T> {
        self.reduce_indexed(|acc, value, _| combine(acc, value))
    }

    pub fn reduce_indexed<F: FnMut(T, T, usize) -> T>(&self, combine: F) -> Result<T> {
        match self.prepare()? {
            Some((plan, feed)) => terminals::reduce(&plan, feed, combine),
            None => Err(PipelineError::EmptyReduce),
        }
    }

    pub fn any<F: FnMut(&T) -> bool>(&self, mut pred: F) -> Result<bool> {
        self.any_indexed(|value, _| pred(value))
    }

    pub fn any_indexed<F: FnMut(&T, usize) -> bool>(&self, pred: F) -> Result<bool> {
        Ok(match self.prepare()? {
            Some((plan, feed)) => terminals::any(&plan, feed, pred),
            None => false,
        })
    }

    pub fn all<F: FnMut(&T) -> bool>(&self, mut pred: F) -> Result<bool> {
        self.all_indexed(|value, _| pred(value))
    }

    pub fn all_indexed<F: FnMut(&T, usize) -> bool>(&self, pred: F) -> Result<bool> {
        Ok(match self.prepare()? {
            Some((plan, feed)) => terminals::all(&plan, feed, pred),
            None => true,
        })
    }

    pub fn find<F: FnMut(&T) -> bool>(&self, mut pred: F) -> Result<Option<T>> {
        self.find_indexed(|value, _| pred(value))
    }

    pub fn find_indexed<F: FnMut(&T, usize) -> bool>(&self, pred: F) -> Result<Option<T>> {
        Ok(match self.prepare()? {
            Some((plan, feed)) => terminals::find(&plan, feed, pred),
            None => None,
        })
    }

    pub fn count(&self) -> Result<usize> {
        Ok(match self.prepare()? {
            Some((plan, feed)) => terminals::count(&plan, feed),
            None => 0,
        })
    }

    /// Same as `count`; `0` without scanning when statically empty
    pub fn len(&self) -> Result<usize> {
        self.count()
    }

    /// Stops at the first element reaching the terminal
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.any(|_| true)?)
    }

    /// Pull iterator over the fused output
    pub fn iter(&self) -> Result<FusedIter<'a, T>> {
        self.claim()?;
        self.open_iter()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn compiled(&self) -> Result<Rc<FusedPlan<'a, T>>> {
        self.plan
            .get_or_init(|| Planner::plan(&self.ops, &self.config).map(Rc::new))
            .clone()
    }

    /// Enforce the single-use contract
    fn claim(&self) -> Result<()> {
        if self.config.contract == Contract::SingleUse && self.consumed.replace(true) {
            return Err(PipelineError::Consumed("a terminal already ran on this pipeline"));
        }
        Ok(())
    }

    /// Compile and open the source; `None` when statically empty
    fn open(&self) -> Result<Option<Run<'a, T>>> {
        let plan = self.compiled()?;
        if plan.never {
            trace!("statically empty pipeline, source not opened");
            return Ok(None);
        }
        let feed = self.source.open()?;
        Ok(Some((plan, feed)))
    }

    fn prepare(&self) -> Result<Option<Run<'a, T>>> {
        self.claim()?;
        self.open()
    }

    fn collect_unclaimed(&self) -> Result<Vec<T>> {
        Ok(match self.open()? {
            Some((plan, feed)) => terminals::collect(&plan, feed),
            None => Vec::new(),
        })
    }

    fn open_iter(&self) -> Result<FusedIter<'a, T>> {
        Ok(match self.open()? {
            Some((plan, feed)) => FusedIter::new(plan, feed),
            None => FusedIter::new(Rc::new(FusedPlan::never()), Feed::Owned(Vec::new())),
        })
    }
}

impl<'a, T: Clone + 'a> Clone for Pipeline<'a, T> {
    /// Shares source and compiled plan; the clone has not run a terminal
    fn clone(&self) -> Self {
        Pipeline {
            source: Rc::clone(&self.source),
            ops: self.ops.clone(),
            config: self.config,
            plan: self.plan.clone(),
            consumed: Cell::new(false),
        }
    }
}

impl<'a, T: Clone + 'a> From<Vec<T>> for Pipeline<'a, T> {
    fn from(values: Vec<T>) -> Self {
        Pipeline::new(values)
    }
}

impl<T> fmt::Debug for Pipeline<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("ops", &self.ops)
            .field("config", &self.config)
            .field("consumed", &self.consumed.get())
            .finish()
    }
}

/// Resolve slice bounds, negative values counting from the end
fn resolve_slice(len: usize, start: isize, end: Option<isize>) -> (usize, usize) {
    let resolve = |bound: isize| {
        if bound < 0 {
            len.saturating_sub(bound.unsigned_abs())
        } else {
            bound.unsigned_abs().min(len)
        }
    };
    let from = resolve(start);
    let to = end.map_or(len, resolve);
    (from, to.max(from))
}
