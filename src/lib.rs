//! fusepipe: Lazy single-pass pipelines with loop fusion
//!
//! Chain transforms, filters, ranges and flattens over a source, then run one
//! fused loop when a terminal is called. Nothing is materialized in between.

pub mod builder;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod search;
pub mod source;

pub use builder::{lazy, Pipeline};
pub use config::{Contract, PipelineConfig, RangeMode, SegmentOverflow, DEFAULT_SEGMENT_CAP};
pub use error::{PipelineError, Result};
pub use pipeline::{Expand, ExecutionStats, FusedIter, GateSpec, OpInfo, PlanSummary};
pub use search::{MatchRule, Rejection, SearchInfo, TextFields, TextQuery, TokenRule};
pub use source::{BoxCursor, Cursor, IntoSource, IterCursor, RandomAccess, SourceClass};

/// API Contract Self-Test
///
/// Catches removal of the public entry points downstream crates build on.
///
/// **DO NOT REMOVE** - This is part of the public API stability contract.
#[cfg(test)]
mod api_contract_self_test {
    use super::*;

    /// Ensures the entry point and chain methods exist
    #[test]
    fn pipeline_api_contract() {
        let p = lazy(vec![1, 2, 3])
            .transform(|x| x + 1)
            .filter(|x| x % 2 == 0)
            .take(5);
        assert_eq!(p.to_vec().unwrap(), vec![2, 4]);

        let _drop = p.drop(0);
        let _range = p.range(0, Some(1));
        let _slice = p.slice(-1, None);
        let _indexed = p.transform_indexed(|x, i| x + i as i32);
    }

    /// Ensures every terminal is reachable from the façade
    #[test]
    fn terminals_api_contract() {
        let p = lazy(vec![1, 2, 3]);
        assert_eq!(p.count().unwrap(), 3);
        assert_eq!(p.len().unwrap(), 3);
        assert!(!p.is_empty().unwrap());
        assert_eq!(p.fold(0, |a, x| a + x).unwrap(), 6);
        assert_eq!(p.reduce(|a, x| a + x).unwrap(), 6);
        assert!(p.any(|x| *x == 2).unwrap());
        assert!(p.all(|x| *x > 0).unwrap());
        assert_eq!(p.find(|x| *x > 1).unwrap(), Some(2));
        assert_eq!(p.iter().unwrap().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    /// Ensures configuration knobs and error variants are exported
    #[test]
    fn config_api_contract() {
        let config = PipelineConfig::new()
            .contract(Contract::SingleUse)
            .range_mode(RangeMode::Segmented)
            .segment_cap(DEFAULT_SEGMENT_CAP)
            .overflow(SegmentOverflow::Reject);
        let p = lazy(vec![1]).with_config(config);
        assert!(p.to_vec().is_ok());
        assert!(matches!(p.to_vec(), Err(PipelineError::Consumed(_))));
        assert_eq!(p.source_class(), SourceClass::Indexed);
    }
}
