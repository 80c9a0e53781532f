//! Pipeline executor
//!
//! Drives a FusedPlan over an opened source with one of two loop skeletons:
//! an indexed loop for random-access sources and a cursor loop for
//! sequential ones. Terminals only supply the closing action.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::trace;

use super::execution_plan::{FusedPlan, RunState};
use crate::source::{CursorGuard, Feed, RandomAccess};

/// Execution statistics for one terminal run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Source elements pulled or indexed
    pub scanned: usize,

    /// Source elements jumped over by a leading skip without being read
    pub jumped: usize,

    /// Terminal closes performed
    pub emitted: usize,

    /// Stopped before the source was exhausted
    pub early_stop: bool,
}

/// Pipeline executor
pub struct Executor;

impl Executor {
    /// Run `plan` once over `feed`, handing every surviving element to `close`
    pub(crate) fn run<'a, T, C>(plan: &FusedPlan<'a, T>, feed: Feed<'a, T>, mut close: C) -> ExecutionStats
    where
        T: Clone,
        C: FnMut(T, usize) -> ControlFlow<()>,
    {
        let mut state = plan.start();

        let mut stats = match feed {
            Feed::Indexed(data) => Self::run_indexed(plan, &*data, &mut state, &mut close),
            Feed::Owned(data) => Self::run_indexed(plan, &data, &mut state, &mut close),
            Feed::Cursor(cursor) => Self::run_cursor(plan, CursorGuard::new(cursor), &mut state, &mut close),
        };
        stats.emitted = state.emitted;

        trace!(
            scanned = stats.scanned,
            jumped = stats.jumped,
            emitted = stats.emitted,
            early_stop = stats.early_stop,
            "pipeline run finished"
        );

        stats
    }

    /// Indexed skeleton: fixed length, fetch by position
    fn run_indexed<T, S, C>(plan: &FusedPlan<'_, T>, data: &S, state: &mut RunState, close: &mut C) -> ExecutionStats
    where
        S: RandomAccess<T> + ?Sized,
        T: Clone,
        C: FnMut(T, usize) -> ControlFlow<()>,
    {
        let len = data.len();
        let mut stats = ExecutionStats::default();

        // A skip in front of every step never reads the skipped elements
        let mut index = 0;
        if let Some(gate) = plan.leading_gate() {
            let jump = state.gates[gate].skip.min(len);
            state.gates[gate].skip -= jump;
            index = jump;
            stats.jumped = jump;
        }

        while index < len {
            let Some(value) = data.get(index) else {
                break;
            };
            index += 1;
            stats.scanned += 1;

            if plan.feed(value, state, close).is_break() || state.sealed {
                stats.early_stop = index < len;
                break;
            }
        }

        stats
    }

    /// Cursor skeleton: pull until exhausted, close the cursor on early stop
    fn run_cursor<T, C>(
        plan: &FusedPlan<'_, T>,
        mut cursor: CursorGuard<'_, T>,
        state: &mut RunState,
        close: &mut C,
    ) -> ExecutionStats
    where
        C: FnMut(T, usize) -> ControlFlow<()>,
    {
        let mut stats = ExecutionStats::default();

        while let Some(value) = cursor.pull() {
            stats.scanned += 1;

            if plan.feed(value, state, close).is_break() || state.sealed {
                stats.early_stop = true;
                cursor.close();
                break;
            }
        }

        stats
    }
}

/// Pull iterator over the fused output of a plan
///
/// Each pulled source element is run to completion; expansions that yield
/// several values are buffered until consumed.
pub struct FusedIter<'a, T> {
    plan: Rc<FusedPlan<'a, T>>,
    state: RunState,
    input: IterInput<'a, T>,
    buffer: VecDeque<T>,
    finished: bool,
}

enum IterInput<'a, T> {
    Indexed {
        data: Rc<dyn RandomAccess<T> + 'a>,
        position: usize,
    },
    Owned(std::vec::IntoIter<T>),
    Cursor(CursorGuard<'a, T>),
}

impl<'a, T> FusedIter<'a, T> {
    pub(crate) fn new(plan: Rc<FusedPlan<'a, T>>, feed: Feed<'a, T>) -> Self {
        let mut state = plan.start();
        let input = match feed {
            Feed::Indexed(data) => {
                let mut position = 0;
                if let Some(gate) = plan.leading_gate() {
                    let jump = state.gates[gate].skip.min(data.len());
                    state.gates[gate].skip -= jump;
                    position = jump;
                }
                IterInput::Indexed { data, position }
            }
            Feed::Owned(data) => IterInput::Owned(data.into_iter()),
            Feed::Cursor(cursor) => IterInput::Cursor(CursorGuard::new(cursor)),
        };

        FusedIter {
            finished: plan.never,
            plan,
            state,
            input,
            buffer: VecDeque::new(),
        }
    }

    fn pull(&mut self) -> Option<T> {
        match &mut self.input {
            IterInput::Indexed { data, position } => {
                if *position >= data.len() {
                    return None;
                }
                let value = data.get(*position)?;
                *position += 1;
                Some(value)
            }
            IterInput::Owned(values) => values.next(),
            IterInput::Cursor(cursor) => cursor.pull(),
        }
    }

    fn stop(&mut self) {
        self.finished = true;
        if let IterInput::Cursor(cursor) = &mut self.input {
            cursor.close();
        }
    }
}

impl<T> Iterator for FusedIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.buffer.pop_front() {
                return Some(value);
            }
            if self.finished {
                return None;
            }

            let Some(value) = self.pull() else {
                self.finished = true;
                return None;
            };

            let buffer = &mut self.buffer;
            let flow = self.plan.feed(value, &mut self.state, &mut |v, _| {
                buffer.push_back(v);
                ControlFlow::Continue(())
            });
            if flow.is_break() || self.state.sealed {
                self.stop();
            }
        }
    }
}
