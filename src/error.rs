//! Error types for pipeline compilation and execution.

use thiserror::Error;

/// Result type for pipeline terminals
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline errors
///
/// Errors raised by user callbacks are panics and are never wrapped here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A leading skip cannot be combined with a filter or flatten in
    /// baseline range mode.
    #[error(
        "drop/range with start {skip} cannot be combined with {construct}: the skip counts source \
         elements, not elements that pass the {construct}; use take/range(0, n) only, or \
         enable RangeMode::Segmented"
    )]
    SkipWithFilter {
        skip: usize,
        construct: &'static str,
    },

    /// A bounded range ahead of a flatten cannot share the single emit limit
    /// in baseline range mode.
    #[error(
        "take/range with limit {take} cannot precede flatten: the limit would count flattened \
         elements, not source elements; move the take after the flatten, or enable \
         RangeMode::Segmented"
    )]
    LimitBeforeFlatten { take: usize },

    /// reduce() ran over zero elements without a seed
    #[error("reduce of an empty pipeline with no seed value")]
    EmptyReduce,

    /// Terminal invoked on an already consumed pipeline or one-shot source
    #[error("pipeline already consumed: {0}")]
    Consumed(&'static str),

    /// Segment count exceeds the configured cap with overflow rejection
    #[error("pipeline has {segments} range segments (max: {cap})")]
    TooManySegments { segments: usize, cap: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_with_filter_names_both_constructs() {
        let err = PipelineError::SkipWithFilter {
            skip: 3,
            construct: "filter",
        };
        let msg = err.to_string();
        assert!(msg.contains("drop"));
        assert!(msg.contains("filter"));
        assert!(msg.contains("take"));
    }

    #[test]
    fn limit_before_flatten_names_both_constructs() {
        let msg = PipelineError::LimitBeforeFlatten { take: 2 }.to_string();
        assert!(msg.contains("take"));
        assert!(msg.contains("flatten"));
        assert!(msg.contains("Segmented"));
    }

    #[test]
    fn too_many_segments_message() {
        let err = PipelineError::TooManySegments { segments: 6, cap: 4 };
        assert_eq!(err.to_string(), "pipeline has 6 range segments (max: 4)");
    }
}
