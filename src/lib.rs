//! Group Assign - roster grouping engine for program cohorts
//!
//! This library turns a flat participant roster into excluded, solo,
//! requested/team and regular capacity-bounded groups. It implements a
//! staged pipeline: normalization, eligibility, buddy-graph components,
//! team clusters and hierarchical gender/locality bucketing, with an
//! exactly-once check over the final result.

pub mod config;
pub mod core;
pub mod models;

// Re-export commonly used types
pub use core::{Assigner, AssignmentError, AliasMap, NormalizeError, NormalizedRoster};
pub use models::{
    AssignmentReport, AssignmentResult, Bucket, BucketKind, EngineConfig, FieldMapping, Participant,
    RawRecord,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Root re-exports build an engine with the stock capacity
        let assigner = Assigner::with_defaults();
        assert_eq!(assigner.config().capacity, 5);
    }
}
