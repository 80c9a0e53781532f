//! Pipeline configuration

/// Default number of range segments kept in inline counter storage
pub const DEFAULT_SEGMENT_CAP: usize = 4;

/// How terminals treat repeated invocation on one pipeline value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Contract {
    /// Terminals may run any number of times with identical results
    #[default]
    Repeatable,
    /// The second terminal call fails with `PipelineError::Consumed`
    SingleUse,
}

/// How `Range` operations are compiled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RangeMode {
    /// One leading skip counter and one emit limit for the whole pipeline.
    ///
    /// Consecutive ranges compose as windows, so `take(3).drop(1)` keeps
    /// source positions 1 and 2. A limit counts emitted elements: ahead of a
    /// filter it means "the first n matches". A non-zero skip combined with a
    /// filter or flatten is rejected, and so is a limit ahead of a flatten.
    #[default]
    Baseline,
    /// One (skip, emit) counter pair per range, placed where the range sits
    /// in the operation list
    Segmented,
}

/// Behaviour when a segmented pipeline has more ranges than `segment_cap`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SegmentOverflow {
    /// Spill the counters to the heap and keep going
    #[default]
    Fallback,
    /// Fail with `PipelineError::TooManySegments`
    Reject,
}

/// Configuration attached to a pipeline and all pipelines derived from it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub contract: Contract,
    pub range_mode: RangeMode,
    pub segment_cap: usize,
    pub overflow: SegmentOverflow,
}

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig {
            contract: Contract::Repeatable,
            range_mode: RangeMode::Baseline,
            segment_cap: DEFAULT_SEGMENT_CAP,
            overflow: SegmentOverflow::Fallback,
        }
    }

    /// Shorthand for `RangeMode::Segmented` with default cap and fallback
    pub fn segmented() -> Self {
        Self::new().range_mode(RangeMode::Segmented)
    }

    pub fn contract(mut self, contract: Contract) -> Self {
        self.contract = contract;
        self
    }

    pub fn range_mode(mut self, mode: RangeMode) -> Self {
        self.range_mode = mode;
        self
    }

    pub fn segment_cap(mut self, cap: usize) -> Self {
        self.segment_cap = cap;
        self
    }

    pub fn overflow(mut self, overflow: SegmentOverflow) -> Self {
        self.overflow = overflow;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}
