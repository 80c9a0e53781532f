//! Pipeline sources and source classification
//!
//! A source is either randomly indexable with a known length (eligible for the
//! indexed loop) or a pull-based cursor (external-iterator loop only).
//! Classification happens at most once per source and is shared by every
//! pipeline derived from it.

use std::cell::{OnceCell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Random access to a length-bearing container
pub trait RandomAccess<T> {
    /// Number of elements
    fn len(&self) -> usize;

    /// Element at `index`, or `None` if the container cannot produce it
    fn get(&self, index: usize) -> Option<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> RandomAccess<T> for Vec<T> {
    #[inline]
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).cloned()
    }
}

impl<T: Clone> RandomAccess<T> for &[T] {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        <[T]>::get(self, index).cloned()
    }
}

impl<T: Clone> RandomAccess<T> for Box<[T]> {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        <[T]>::get(self, index).cloned()
    }
}

impl<T: Clone> RandomAccess<T> for Rc<[T]> {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        <[T]>::get(self, index).cloned()
    }
}

impl<T: Clone> RandomAccess<T> for Arc<[T]> {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        <[T]>::get(self, index).cloned()
    }
}

impl<T: Clone, const N: usize> RandomAccess<T> for [T; N] {
    #[inline]
    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).cloned()
    }
}

impl<T: Clone> RandomAccess<T> for VecDeque<T> {
    #[inline]
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<T> {
        VecDeque::get(self, index).cloned()
    }
}

/// Text is indexed by byte
impl RandomAccess<u8> for &str {
    #[inline]
    fn len(&self) -> usize {
        str::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }
}

impl RandomAccess<u8> for String {
    #[inline]
    fn len(&self) -> usize {
        String::len(self)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }
}

/// Pull-based cursor with an optional early-termination hook
///
/// `close` is called exactly once when a terminal stops before the cursor is
/// exhausted (early stop or an unwinding callback). It is not called after
/// `next` has returned `None`.
pub trait Cursor<T> {
    fn next(&mut self) -> Option<T>;

    fn close(&mut self) {}
}

/// Adapts any iterator into a cursor with a no-op close hook
pub struct IterCursor<I>(pub I);

impl<I: Iterator> Cursor<I::Item> for IterCursor<I> {
    #[inline]
    fn next(&mut self) -> Option<I::Item> {
        self.0.next()
    }
}

/// Walks a random-access container that failed classification
struct IndexCursor<'a, T> {
    source: Rc<dyn RandomAccess<T> + 'a>,
    position: usize,
}

impl<T> Cursor<T> for IndexCursor<'_, T> {
    fn next(&mut self) -> Option<T> {
        if self.position >= self.source.len() {
            return None;
        }
        let value = self.source.get(self.position)?;
        self.position += 1;
        Some(value)
    }
}

pub type BoxCursor<'a, T> = Box<dyn Cursor<T> + 'a>;
pub(crate) type CursorFactory<'a, T> = Rc<dyn Fn() -> Result<BoxCursor<'a, T>> + 'a>;
pub(crate) type Materializer<'a, T> = Rc<dyn Fn() -> Result<Vec<T>> + 'a>;

/// Result of source classification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceClass {
    /// Known length, direct access by position
    Indexed,
    /// Pull-based access only
    Sequential,
}

pub(crate) enum Source<'a, T> {
    /// Length-bearing random-access container
    Indexed(Rc<dyn RandomAccess<T> + 'a>),
    /// Produces a fresh cursor for every run
    Replay(CursorFactory<'a, T>),
    /// A single cursor, usable by one run
    Once(RefCell<Option<BoxCursor<'a, T>>>),
    /// Materialized on demand (negative slice bounds)
    Deferred(Materializer<'a, T>),
}

/// A source plus its memoized classification
pub(crate) struct SourceHandle<'a, T> {
    source: Source<'a, T>,
    class: OnceCell<SourceClass>,
}

impl<'a, T: 'a> SourceHandle<'a, T> {
    pub(crate) fn new(source: Source<'a, T>) -> Self {
        SourceHandle {
            source,
            class: OnceCell::new(),
        }
    }

    /// Classify the source, computing the answer at most once
    pub(crate) fn class(&self) -> SourceClass {
        *self.class.get_or_init(|| classify(&self.source))
    }

    /// Open the source for one run
    pub(crate) fn open(&self) -> Result<Feed<'a, T>> {
        match &self.source {
            Source::Indexed(data) => match self.class() {
                SourceClass::Indexed => Ok(Feed::Indexed(Rc::clone(data))),
                SourceClass::Sequential => Ok(Feed::Cursor(Box::new(IndexCursor {
                    source: Rc::clone(data),
                    position: 0,
                }))),
            },
            Source::Replay(factory) => Ok(Feed::Cursor(factory()?)),
            Source::Once(slot) => slot
                .borrow_mut()
                .take()
                .map(Feed::Cursor)
                .ok_or(PipelineError::Consumed("one-shot source was already read")),
            Source::Deferred(materialize) => Ok(Feed::Owned(materialize()?)),
        }
    }
}

impl<T> fmt::Debug for SourceHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.source {
            Source::Indexed(_) => "indexed",
            Source::Replay(_) => "replay",
            Source::Once(_) => "once",
            Source::Deferred(_) => "deferred",
        };
        f.debug_struct("SourceHandle")
            .field("kind", &kind)
            .field("class", &self.class.get())
            .finish()
    }
}

/// Classify a source
///
/// Dedicated containers and materialized sources are indexed. A
/// random-access container must also be able to produce element 0 unless it
/// is empty; otherwise it is walked sequentially.
fn classify<T>(source: &Source<'_, T>) -> SourceClass {
    match source {
        Source::Indexed(data) => {
            if data.len() == 0 || data.get(0).is_some() {
                SourceClass::Indexed
            } else {
                SourceClass::Sequential
            }
        }
        Source::Deferred(_) => SourceClass::Indexed,
        Source::Replay(_) | Source::Once(_) => SourceClass::Sequential,
    }
}

/// An opened source, owned by one run
pub(crate) enum Feed<'a, T> {
    Indexed(Rc<dyn RandomAccess<T> + 'a>),
    Owned(Vec<T>),
    Cursor(BoxCursor<'a, T>),
}

impl<T> Feed<'_, T> {
    pub(crate) fn len_hint(&self) -> Option<usize> {
        match self {
            Feed::Indexed(data) => Some(data.len()),
            Feed::Owned(data) => Some(data.len()),
            Feed::Cursor(_) => None,
        }
    }
}

/// Closes a cursor on drop unless it was exhausted
///
/// Covers early stops and callbacks that unwind mid-scan.
pub(crate) struct CursorGuard<'a, T> {
    cursor: BoxCursor<'a, T>,
    done: bool,
}

impl<'a, T> CursorGuard<'a, T> {
    pub(crate) fn new(cursor: BoxCursor<'a, T>) -> Self {
        CursorGuard {
            cursor,
            done: false,
        }
    }

    #[inline]
    pub(crate) fn pull(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        let next = self.cursor.next();
        if next.is_none() {
            self.done = true;
        }
        next
    }

    /// Release the cursor before it is exhausted
    pub(crate) fn close(&mut self) {
        if !self.done {
            self.done = true;
            self.cursor.close();
        }
    }
}

impl<T> Drop for CursorGuard<'_, T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Conversion into a pipeline source
pub trait IntoSource<'a, T> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a>;
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for Vec<T> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for &'a [T] {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for &'a Vec<T> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self.as_slice())
    }
}

impl<'a, T: Clone + 'a, const N: usize> IntoSource<'a, T> for [T; N] {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for Box<[T]> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for Rc<[T]> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for Arc<[T]> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

impl<'a, T: Clone + 'a> IntoSource<'a, T> for VecDeque<T> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        Rc::new(self)
    }
}

/// User containers
impl<'a, T> IntoSource<'a, T> for Rc<dyn RandomAccess<T> + 'a> {
    fn into_source(self) -> Rc<dyn RandomAccess<T> + 'a> {
        self
    }
}

impl<'a> IntoSource<'a, u8> for &'a str {
    fn into_source(self) -> Rc<dyn RandomAccess<u8> + 'a> {
        Rc::new(self)
    }
}

impl<'a> IntoSource<'a, u8> for String {
    fn into_source(self) -> Rc<dyn RandomAccess<u8> + 'a> {
        Rc::new(self)
    }
}
