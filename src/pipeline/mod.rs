//! Pipeline planning and fused execution
//!
//! This module turns a recorded operation list into one single-pass loop:
//!
//! 1. **IR (Intermediate Representation)**: the inert operation list built by chaining
//! 2. **Planner**: folds ranges into gates and fuses the remaining steps
//! 3. **Fused Execution**: drives the plan over an indexed or cursor source
//!
//! ## Architecture
//!
//! ```text
//! lazy(v).transform(f).filter(p).take(3)
//!     ↓
//! Ops: [Transform(f), Filter(p), Range(0, 3)]
//!     ↓
//! FusedPlan: [Map(f), Test(p), Gate(take 3)]
//!     ↓
//! Executor: one loop, terminal close per surviving element
//! ```
//!
//! ## Benefits
//!
//! - **No intermediate collections**: each element runs through every step before the next
//! - **Early exit**: limits and short-circuit terminals stop pulling from the source
//! - **Plan once**: compiled plans are cached on the pipeline value
//!
//! ## Limitations
//!
//! - Baseline range mode rejects a skip combined with a filter or flatten
//! - Single-threaded execution

pub mod ir;
pub mod execution_plan;
pub mod planner;
pub mod executor;
pub(crate) mod terminals;

pub use ir::{Expand, Op, OpInfo, Predicate};
pub use execution_plan::{FusedPlan, GateSpec, PlanSummary};
pub use planner::Planner;
pub use executor::{ExecutionStats, Executor, FusedIter};
