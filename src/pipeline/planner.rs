//! Pipeline planner
//!
//! Converts an operation list into a FusedPlan in one left-to-right pass:
//! 1. Transform/Filter/Flatten become fused steps, indexed callbacks get a counter
//! 2. Range bounds are folded into gates (one pair per pipeline in baseline
//!    mode, one pair per range in segmented mode)
//! 3. A statically rejecting filter short-circuits the whole plan

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::execution_plan::{FusedPlan, GateSpec, Gates, Instr};
use super::ir::{Op, Predicate};
use crate::config::{PipelineConfig, RangeMode, SegmentOverflow};
use crate::error::{PipelineError, Result};

/// Pipeline planner
pub struct Planner<'a, T> {
    config: PipelineConfig,

    /// Fused steps in source order
    instrs: Vec<Instr<'a, T>>,

    /// Segmented mode: one gate per range, in place
    gates: Gates,

    /// Number of index counters handed out
    slots: usize,

    /// Aggregate window (sum of starts, composed limit)
    skip_initial: usize,
    max_emits: Option<usize>,

    /// First cardinality-changing construct seen, for the baseline check
    reshaping: Option<&'static str>,

    /// Emit limit in force when a flatten was reached
    limit_before_flatten: Option<usize>,

    never: bool,
}

impl<'a, T> Planner<'a, T> {
    fn new(config: PipelineConfig) -> Self {
        Planner {
            config,
            instrs: Vec::new(),
            gates: SmallVec::new(),
            slots: 0,
            skip_initial: 0,
            max_emits: None,
            reshaping: None,
            limit_before_flatten: None,
            never: false,
        }
    }

    /// Plan an operation list
    ///
    /// # Errors
    /// `SkipWithFilter` in baseline mode when a non-zero skip meets a filter
    /// or flatten; `LimitBeforeFlatten` in baseline mode when a bounded range
    /// precedes a flatten; `TooManySegments` in segmented mode past the cap
    /// with `SegmentOverflow::Reject`.
    pub fn plan(ops: &[Op<'a, T>], config: &PipelineConfig) -> Result<FusedPlan<'a, T>> {
        let mut planner = Planner::new(*config);

        for op in ops {
            planner.process_op(op);
        }

        planner.finish()
    }

    fn process_op(&mut self, op: &Op<'a, T>) {
        match op {
            Op::Transform { f, indexed } => {
                let slot = self.slot(*indexed);
                self.instrs.push(Instr::Map {
                    f: f.clone(),
                    slot,
                });
            }

            Op::Filter { pred, indexed, .. } => {
                self.reshaping.get_or_insert("filter");
                match pred {
                    Predicate::Test(pred) => {
                        let slot = self.slot(*indexed);
                        self.instrs.push(Instr::Test {
                            pred: pred.clone(),
                            slot,
                        });
                    }
                    Predicate::Never => self.never = true,
                }
            }

            Op::Flatten { expand, indexed } => {
                self.reshaping.get_or_insert("flatten");
                if let Some(max) = self.max_emits {
                    self.limit_before_flatten.get_or_insert(max);
                }
                let slot = self.slot(*indexed);
                self.instrs.push(Instr::Expand {
                    f: expand.clone(),
                    slot,
                });
            }

            Op::Range { start, end } => {
                let take = end.map(|end| end.saturating_sub(*start));

                // Baseline windows compose: the new range applies to the output
                // of the current window, so its start also shortens the limit.
                // Segmented gates stay positional and a flatten between ranges
                // may add elements, so there only a zero window is certain.
                self.skip_initial = self.skip_initial.saturating_add(*start);
                let shift = match self.config.range_mode {
                    RangeMode::Baseline => *start,
                    RangeMode::Segmented => 0,
                };
                let left = self.max_emits.map(|max| max.saturating_sub(shift));
                self.max_emits = match (left, take) {
                    (Some(left), Some(len)) => Some(left.min(len)),
                    (left, len) => left.or(len),
                };

                if self.config.range_mode == RangeMode::Segmented {
                    // Pure pass-through ranges need no counters
                    if *start == 0 && take.is_none() {
                        return;
                    }
                    self.instrs.push(Instr::Gate(self.gates.len()));
                    self.gates.push(GateSpec { skip: *start, take });
                }
            }
        }
    }

    /// Hand out an index counter if the callback takes an index
    fn slot(&mut self, indexed: bool) -> Option<usize> {
        if !indexed {
            return None;
        }
        let slot = self.slots;
        self.slots += 1;
        Some(slot)
    }

    fn finish(mut self) -> Result<FusedPlan<'a, T>> {
        if self.never || self.max_emits == Some(0) {
            debug!("pipeline statically empty, skipping codegen");
            return Ok(FusedPlan::never());
        }

        match self.config.range_mode {
            RangeMode::Baseline => self.place_baseline_gates()?,
            RangeMode::Segmented => self.check_segment_cap()?,
        }

        let plan = FusedPlan {
            needs_index: self.slots > 0,
            instrs: self.instrs,
            gates: self.gates,
            slots: self.slots,
            skip_initial: self.skip_initial,
            max_emits: self.max_emits,
            never: false,
        };

        debug!(
            steps = plan.instrs.len(),
            gates = plan.gates.len(),
            skip_initial = plan.skip_initial,
            max_emits = ?plan.max_emits,
            index_slots = plan.slots,
            "compiled pipeline"
        );

        Ok(plan)
    }

    /// One skip gate in front of every step, one limit gate after the last
    fn place_baseline_gates(&mut self) -> Result<()> {
        if self.skip_initial > 0 {
            if let Some(construct) = self.reshaping {
                return Err(PipelineError::SkipWithFilter {
                    skip: self.skip_initial,
                    construct,
                });
            }
            self.gates.push(GateSpec {
                skip: self.skip_initial,
                take: None,
            });
            self.instrs.insert(0, Instr::Gate(self.gates.len() - 1));
        }

        if let Some(take) = self.limit_before_flatten {
            return Err(PipelineError::LimitBeforeFlatten { take });
        }

        if let Some(max) = self.max_emits {
            self.gates.push(GateSpec {
                skip: 0,
                take: Some(max),
            });
            self.instrs.push(Instr::Gate(self.gates.len() - 1));
        }

        Ok(())
    }

    fn check_segment_cap(&self) -> Result<()> {
        let segments = self.gates.len();
        let cap = self.config.segment_cap;
        if segments <= cap {
            return Ok(());
        }
        match self.config.overflow {
            SegmentOverflow::Reject => Err(PipelineError::TooManySegments { segments, cap }),
            SegmentOverflow::Fallback => {
                warn!(segments, cap, "range segments exceed cap, using heap counters");
                Ok(())
            }
        }
    }
}
