// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AssignmentResult, Bucket, BucketKind, Diagnostics, Eligibility, EngineConfig, GenderKey,
    GenderPreference, Participant, RegionTable,
};
pub use requests::{CanonicalField, FieldCandidates, FieldMapping, MappingReport, RawRecord};
pub use responses::{AssignmentReport, BucketView, Totals};
