//! Terminal closers
//!
//! Each terminal is one closing action over the shared loop skeletons, so
//! skip, limit and early-stop behave identically for all of them. Callers
//! handle statically empty plans before reaching these functions.

use std::ops::ControlFlow;

use super::execution_plan::FusedPlan;
use super::executor::Executor;
use crate::error::{PipelineError, Result};
use crate::source::Feed;

const CONTINUE: ControlFlow<()> = ControlFlow::Continue(());

/// Materialize into a vector
pub(crate) fn collect<'a, T: Clone>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>) -> Vec<T> {
    let mut out = Vec::with_capacity(plan.capacity_hint(feed.len_hint()));
    Executor::run(plan, feed, |value, _| {
        out.push(value);
        CONTINUE
    });
    if out.capacity() / 2 > out.len() {
        out.shrink_to_fit();
    }
    out
}

/// Invoke `sink` with every element and its emitted index
pub(crate) fn for_each<'a, T, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut sink: F)
where
    T: Clone,
    F: FnMut(T, usize),
{
    Executor::run(plan, feed, |value, index| {
        sink(value, index);
        CONTINUE
    });
}

/// Like `for_each`, stopping at the first error
pub(crate) fn try_for_each<'a, T, E, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut sink: F) -> std::result::Result<(), E>
where
    T: Clone,
    F: FnMut(T, usize) -> std::result::Result<(), E>,
{
    let mut failure = None;
    Executor::run(plan, feed, |value, index| match sink(value, index) {
        Ok(()) => CONTINUE,
        Err(err) => {
            failure = Some(err);
            ControlFlow::Break(())
        }
    });
    failure.map_or(Ok(()), Err)
}

/// Reduce without a seed
///
/// The first element becomes the accumulator; `combine` is first called
/// with the second element (emitted index 1).
pub(crate) fn reduce<'a, T, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut combine: F) -> Result<T>
where
    T: Clone,
    F: FnMut(T, T, usize) -> T,
{
    let mut acc = None;
    Executor::run(plan, feed, |value, index| {
        acc = Some(match acc.take() {
            Some(acc) => combine(acc, value, index),
            None => value,
        });
        CONTINUE
    });
    acc.ok_or(PipelineError::EmptyReduce)
}

/// Fold from a seed
pub(crate) fn fold<'a, T, A, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, seed: A, mut combine: F) -> Result<A>
where
    T: Clone,
    F: FnMut(A, T, usize) -> A,
{
    let mut acc = Some(seed);
    Executor::run(plan, feed, |value, index| {
        // Empty only while `combine` is unwinding
        if let Some(current) = acc.take() {
            acc = Some(combine(current, value, index));
        }
        CONTINUE
    });
    acc.ok_or(PipelineError::EmptyReduce)
}

/// True as soon as one element satisfies `pred`
pub(crate) fn any<'a, T, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut pred: F) -> bool
where
    T: Clone,
    F: FnMut(&T, usize) -> bool,
{
    let mut found = false;
    Executor::run(plan, feed, |value, index| {
        if pred(&value, index) {
            found = true;
            return ControlFlow::Break(());
        }
        CONTINUE
    });
    found
}

/// False as soon as one element fails `pred`
pub(crate) fn all<'a, T, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut pred: F) -> bool
where
    T: Clone,
    F: FnMut(&T, usize) -> bool,
{
    let mut holds = true;
    Executor::run(plan, feed, |value, index| {
        if !pred(&value, index) {
            holds = false;
            return ControlFlow::Break(());
        }
        CONTINUE
    });
    holds
}

/// First element satisfying `pred`
pub(crate) fn find<'a, T, F>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut pred: F) -> Option<T>
where
    T: Clone,
    F: FnMut(&T, usize) -> bool,
{
    let mut found = None;
    Executor::run(plan, feed, |value, index| {
        if pred(&value, index) {
            found = Some(value);
            return ControlFlow::Break(());
        }
        CONTINUE
    });
    found
}

/// Number of elements emitted
pub(crate) fn count<'a, T: Clone>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>) -> usize {
    Executor::run(plan, feed, |_, _| CONTINUE).emitted
}
