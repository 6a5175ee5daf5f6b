// Core algorithm exports
pub mod aliases;
pub mod bucketer;
pub mod buddy_graph;
pub mod eligibility;
pub mod emails;
pub mod ledger;
pub mod normalizer;
pub mod regions;
pub mod teams;

pub use aliases::{name_similarity, AliasMap};
pub use bucketer::{gender_key, Bucketer, BucketerOutput};
pub use buddy_graph::{resolve_requested_groups, BuddyGraph, GraphStats, Resolution};
pub use eligibility::{is_eligible, split_eligible, EligibilitySplit};
pub use emails::parse_buddy_requests;
pub use ledger::{verify_exactly_once, Assigner, AssignmentError};
pub use normalizer::{normalize, NormalizeError, NormalizedRoster};
pub use teams::{build_team_clusters, TeamClusters};
