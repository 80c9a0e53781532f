//! Intermediate Representation for pipeline operations
//!
//! An operation list is an inert, append-only description of a pipeline.
//! Nothing here runs user code; the planner reads the list once per compile.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::search::SearchInfo;

/// Per-element transform callback: (value, index) -> value
pub type MapFn<'a, T> = Rc<dyn Fn(T, usize) -> T + 'a>;

/// Per-element predicate: (value, index) -> keep?
pub type TestFn<'a, T> = Rc<dyn Fn(&T, usize) -> bool + 'a>;

/// Per-element expansion: (value, index) -> component values
pub type ExpandFn<'a, T> = Rc<dyn Fn(T, usize) -> Vec<T> + 'a>;

/// Filter predicate
#[derive(Clone)]
pub enum Predicate<'a, T> {
    /// User or compiled predicate
    Test(TestFn<'a, T>),
    /// Statically known to reject every element
    Never,
}

/// A single operation in the pipeline IR
///
/// `indexed` marks callbacks that take the running index; the planner gives
/// each of them an index counter and leaves the others without one.
#[derive(Clone)]
pub enum Op<'a, T> {
    /// Replace the current value
    Transform { f: MapFn<'a, T>, indexed: bool },

    /// Abandon the current element when the predicate is false
    Filter {
        pred: Predicate<'a, T>,
        indexed: bool,
        /// Introspection only, never read during execution
        search: Option<Rc<SearchInfo>>,
    },

    /// Skip `start` elements, then stop after `end - start` (unbounded
    /// without `end`)
    Range { start: usize, end: Option<usize> },

    /// Expand each element one level into its components
    Flatten { expand: ExpandFn<'a, T>, indexed: bool },
}

impl<'a, T> Op<'a, T> {
    /// Inert description of this operation
    pub fn info(&self) -> OpInfo {
        match self {
            Op::Transform { indexed, .. } => OpInfo::Transform { indexed: *indexed },
            Op::Filter {
                pred,
                indexed,
                search,
            } => OpInfo::Filter {
                indexed: *indexed,
                never: matches!(pred, Predicate::Never),
                search: search.as_deref().cloned(),
            },
            Op::Range { start, end } => OpInfo::Range {
                start: *start,
                end: *end,
            },
            Op::Flatten { indexed, .. } => OpInfo::Flatten { indexed: *indexed },
        }
    }
}

impl<T> fmt::Debug for Op<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.info(), f)
    }
}

/// Serializable description of an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpInfo {
    Transform {
        indexed: bool,
    },
    Filter {
        indexed: bool,
        never: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        search: Option<SearchInfo>,
    },
    Range {
        start: usize,
        end: Option<usize>,
    },
    Flatten {
        indexed: bool,
    },
}

/// Elements that expand one level into values of their own type
///
/// Used by `Pipeline::flatten`. Non-nested values expand to themselves.
pub trait Expand: Sized {
    fn expand(self) -> Vec<Self>;
}

impl Expand for serde_json::Value {
    fn expand(self) -> Vec<Self> {
        match self {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        }
    }
}
