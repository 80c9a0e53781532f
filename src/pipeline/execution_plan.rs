//! Fused execution plan
//!
//! A plan is a flat instruction array run once per source element. `Gate`
//! instructions carry the skip/limit bounds of range operations; in baseline
//! mode there is at most one leading skip gate and one trailing limit gate.

use std::fmt;
use std::ops::ControlFlow;

use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use super::ir::{ExpandFn, MapFn, TestFn};
use crate::config::DEFAULT_SEGMENT_CAP;

/// One fused step
pub(crate) enum Instr<'a, T> {
    /// Rebind the current value
    Map { f: MapFn<'a, T>, slot: Option<usize> },
    /// Abandon the element when the predicate fails
    Test { pred: TestFn<'a, T>, slot: Option<usize> },
    /// Run the rest of the plan once per component
    Expand { f: ExpandFn<'a, T>, slot: Option<usize> },
    /// Skip/limit counters of one range
    Gate(usize),
}

/// Initial counters of a range gate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GateSpec {
    /// Elements to discard before any pass
    pub skip: usize,
    /// Elements allowed through after the skip (`None` = unbounded)
    pub take: Option<usize>,
}

pub(crate) type Gates = SmallVec<[GateSpec; DEFAULT_SEGMENT_CAP]>;

/// Compiled pipeline
pub struct FusedPlan<'a, T> {
    pub(crate) instrs: Vec<Instr<'a, T>>,
    pub(crate) gates: Gates,
    /// Number of index counters
    pub(crate) slots: usize,
    /// Aggregate of all range starts
    pub skip_initial: usize,
    /// Emit limit of the composed window
    pub max_emits: Option<usize>,
    /// Some step takes the running index
    pub needs_index: bool,
    /// Statically produces no results
    pub never: bool,
}

/// Serializable summary of a compiled plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub steps: usize,
    pub skip_initial: usize,
    pub max_emits: Option<usize>,
    pub needs_index: bool,
    pub never: bool,
    pub gates: Vec<GateSpec>,
}

impl<'a, T> FusedPlan<'a, T> {
    /// Plan that produces nothing without scanning
    pub(crate) fn never() -> Self {
        FusedPlan {
            instrs: Vec::new(),
            gates: SmallVec::new(),
            slots: 0,
            skip_initial: 0,
            max_emits: Some(0),
            needs_index: false,
            never: true,
        }
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            steps: self
                .instrs
                .iter()
                .filter(|instr| !matches!(instr, Instr::Gate(_)))
                .count(),
            skip_initial: self.skip_initial,
            max_emits: self.max_emits,
            needs_index: self.needs_index,
            never: self.never,
            gates: self.gates.to_vec(),
        }
    }

    /// Fresh per-run counters
    pub(crate) fn start(&self) -> RunState {
        RunState {
            gates: self.gates.iter().copied().collect(),
            slots: smallvec![0; self.slots],
            emitted: 0,
            sealed: false,
        }
    }

    /// Gate that opens the plan, so an indexed loop can jump past its skip
    pub(crate) fn leading_gate(&self) -> Option<usize> {
        match self.instrs.first() {
            Some(Instr::Gate(gate)) => Some(*gate),
            _ => None,
        }
    }

    /// Upper bound on emissions, used to size output buffers
    ///
    /// Without a limit, the source length is only used when no step can
    /// drop or add elements.
    pub(crate) fn capacity_hint(&self, source_len: Option<usize>) -> usize {
        let expands = self.instrs.iter().any(|i| matches!(i, Instr::Expand { .. }));
        let tests = self.instrs.iter().any(|i| matches!(i, Instr::Test { .. }));
        match (source_len, self.max_emits) {
            (_, Some(max)) if !expands => max.min(source_len.unwrap_or(max)),
            (Some(len), _) if !expands && !tests => len,
            _ => 0,
        }
    }

    /// Run one source element through the plan
    ///
    /// `Break` means no further element can be emitted; the caller stops.
    #[inline]
    pub(crate) fn feed<C>(&self, value: T, state: &mut RunState, close: &mut C) -> ControlFlow<()>
    where
        C: FnMut(T, usize) -> ControlFlow<()>,
    {
        self.run_from(0, value, state, close)
    }

    fn run_from<C>(
        &self,
        mut pc: usize,
        mut value: T,
        state: &mut RunState,
        close: &mut C,
    ) -> ControlFlow<()>
    where
        C: FnMut(T, usize) -> ControlFlow<()>,
    {
        while let Some(instr) = self.instrs.get(pc) {
            match instr {
                Instr::Map { f, slot } => {
                    let index = state.tick(*slot);
                    value = f(value, index);
                }
                Instr::Test { pred, slot } => {
                    let index = state.tick(*slot);
                    if !pred(&value, index) {
                        return ControlFlow::Continue(());
                    }
                }
                Instr::Expand { f, slot } => {
                    let index = state.tick(*slot);
                    for inner in f(value, index) {
                        self.run_from(pc + 1, inner, state, close)?;
                    }
                    return ControlFlow::Continue(());
                }
                Instr::Gate(gate) => {
                    let counters = &mut state.gates[*gate];
                    if counters.skip > 0 {
                        counters.skip -= 1;
                        return ControlFlow::Continue(());
                    }
                    match counters.take.as_mut() {
                        // Closed by an earlier element: nothing can pass again
                        Some(0) => return ControlFlow::Break(()),
                        Some(left) => {
                            *left -= 1;
                            if *left == 0 {
                                state.sealed = true;
                            }
                        }
                        None => {}
                    }
                }
            }
            pc += 1;
        }

        let emitted = state.emitted;
        state.emitted += 1;
        close(value, emitted)
    }
}

impl<T> fmt::Debug for FusedPlan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.summary(), f)
    }
}

/// Mutable counters of one terminal run
pub(crate) struct RunState {
    pub(crate) gates: Gates,
    slots: SmallVec<[usize; 4]>,
    pub(crate) emitted: usize,
    /// A gate closed while letting the current element through; stop once
    /// that element is fully processed
    pub(crate) sealed: bool,
}

impl RunState {
    #[inline]
    fn tick(&mut self, slot: Option<usize>) -> usize {
        match slot {
            Some(slot) => {
                let index = self.slots[slot];
                self.slots[slot] += 1;
                index
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn collect(plan: &FusedPlan<'_, i32>, input: &[i32]) -> Vec<i32> {
        let mut state = plan.start();
        let mut out = Vec::new();
        let mut close = |v: i32, _: usize| {
            out.push(v);
            ControlFlow::Continue(())
        };
        for &x in input {
            if plan.feed(x, &mut state, &mut close).is_break() || state.sealed {
                break;
            }
        }
        out
    }

    fn plan(instrs: Vec<Instr<'static, i32>>, gates: &[GateSpec], slots: usize) -> FusedPlan<'static, i32> {
        FusedPlan {
            instrs,
            gates: gates.iter().copied().collect(),
            slots,
            skip_initial: 0,
            max_emits: None,
            needs_index: slots > 0,
            never: false,
        }
    }

    #[test]
    fn test_map_then_test() {
        let p = plan(
            vec![
                Instr::Map { f: Rc::new(|x: i32, _: usize| x * 10), slot: None },
                Instr::Test { pred: Rc::new(|x: &i32, _: usize| *x > 15), slot: None },
            ],
            &[],
            0,
        );
        assert_eq!(collect(&p, &[1, 2, 3]), vec![20, 30]);
    }

    #[test]
    fn test_gate_skip_and_take() {
        let p = plan(
            vec![Instr::Gate(0)],
            &[GateSpec { skip: 1, take: Some(2) }],
            0,
        );
        assert_eq!(collect(&p, &[1, 2, 3, 4, 5]), vec![2, 3]);
    }

    #[test]
    fn test_index_slots_count_arrivals() {
        let p = plan(
            vec![
                Instr::Test { pred: Rc::new(|x: &i32, _: usize| x % 2 == 0), slot: None },
                Instr::Map { f: Rc::new(|x: i32, i: usize| x * 100 + i as i32), slot: Some(0) },
            ],
            &[],
            1,
        );
        assert_eq!(collect(&p, &[1, 2, 3, 4]), vec![200, 401]);
    }

    #[test]
    fn test_expand_runs_rest_per_component() {
        let p = plan(
            vec![
                Instr::Expand { f: Rc::new(|x: i32, _: usize| vec![x, x + 10]), slot: None },
                Instr::Gate(0),
            ],
            &[GateSpec { skip: 0, take: Some(3) }],
            0,
        );
        assert_eq!(collect(&p, &[1, 2, 3]), vec![1, 11, 2]);
    }

    #[test]
    fn test_capacity_hint() {
        let mut p = plan(vec![], &[], 0);
        assert_eq!(p.capacity_hint(Some(10)), 10);
        p.max_emits = Some(3);
        assert_eq!(p.capacity_hint(Some(10)), 3);
        assert_eq!(p.capacity_hint(None), 3);
    }

    #[test]
    fn test_capacity_hint_ignores_length_behind_filter() {
        let mut p = plan(
            vec![Instr::Test { pred: Rc::new(|x: &i32, _: usize| *x > 0), slot: None }],
            &[],
            0,
        );
        assert_eq!(p.capacity_hint(Some(1_000_000)), 0);
        p.max_emits = Some(5);
        assert_eq!(p.capacity_hint(Some(1_000_000)), 5);
    }

    #[test]
    fn test_never_plan_summary() {
        let p: FusedPlan<'_, i32> = FusedPlan::never();
        let summary = p.summary();
        assert!(summary.never);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.max_emits, Some(0));
    }
}
