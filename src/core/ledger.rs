use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use validator::Validate;

use crate::core::{
    bucketer::Bucketer,
    buddy_graph::resolve_requested_groups,
    eligibility::split_eligible,
    normalizer::{normalize, NormalizeError, NormalizedRoster},
    teams::build_team_clusters,
};
use crate::models::{
    AssignmentResult, Bucket, Diagnostics, EngineConfig, FieldMapping, Participant, RawRecord,
};

/// Errors that can occur during an assignment run
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    /// A stage lost or duplicated a participant; this is a bug, not bad input
    #[error(
        "Exactly-once check failed: missing {missing:?}, duplicated {duplicated:?}, \
         unexpected {unexpected:?}"
    )]
    ExactlyOnceViolation {
        missing: Vec<String>,
        duplicated: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Tracks which participant ids have been placed so later stages skip them
#[derive(Debug, Default)]
struct Ledger {
    placed: HashSet<String>,
}

impl Ledger {
    fn record_participants(&mut self, participants: &[Participant]) {
        self.placed.extend(participants.iter().map(|p| p.id.clone()));
    }

    fn record_buckets(&mut self, buckets: &[Bucket]) {
        for bucket in buckets {
            self.record_participants(&bucket.members);
        }
    }

    /// Drop anyone already placed from the pool handed to the next stage
    fn admit(&self, mut pool: Vec<Participant>, stage: &str) -> Vec<Participant> {
        let before = pool.len();
        pool.retain(|p| !self.placed.contains(&p.id));
        if pool.len() != before {
            tracing::warn!(
                "{} already-placed participants withheld from {}",
                before - pool.len(),
                stage
            );
        }
        pool
    }
}

/// Check that every input id appears exactly once across the result
pub fn verify_exactly_once<'a, I>(
    input_ids: I,
    result: &AssignmentResult,
) -> Result<(), AssignmentError>
where
    I: IntoIterator<Item = &'a str>,
{
    let expected: HashSet<&str> = input_ids.into_iter().collect();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in result.placed_ids() {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut missing: Vec<String> = expected
        .iter()
        .filter(|id| !counts.contains_key(**id))
        .map(|id| id.to_string())
        .collect();
    missing.sort();
    let duplicated: Vec<String> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    let unexpected: Vec<String> = counts
        .keys()
        .filter(|id| !expected.contains(**id))
        .map(|id| id.to_string())
        .collect();

    if missing.is_empty() && duplicated.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        tracing::error!(
            "Exactly-once check failed: missing={:?} duplicated={:?} unexpected={:?}",
            missing,
            duplicated,
            unexpected
        );
        Err(AssignmentError::ExactlyOnceViolation {
            missing,
            duplicated,
            unexpected,
        })
    }
}

fn number_buckets(buckets: &mut [Bucket]) {
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.number = i + 1;
    }
}

/// Main assignment orchestrator - runs the staged grouping pipeline
///
/// # Pipeline Stages
/// 1. Eligibility filter
/// 2. Buddy graph resolution into requested groups
/// 3. Team clustering
/// 4. Hierarchical bucketing (solo, gender key, locality)
/// 5. Exactly-once verification
#[derive(Debug, Clone)]
pub struct Assigner {
    config: EngineConfig,
}

impl Assigner {
    pub fn new(config: EngineConfig) -> Result<Self, AssignmentError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize raw records with the given mapping, then assign
    pub fn assign_records(
        &self,
        records: &[RawRecord],
        mapping: &FieldMapping,
    ) -> Result<AssignmentResult, AssignmentError> {
        let roster = normalize(records, mapping, &self.config)?;
        self.assign(roster)
    }

    /// Run every stage over a normalized roster
    pub fn assign(&self, roster: NormalizedRoster) -> Result<AssignmentResult, AssignmentError> {
        let NormalizedRoster {
            participants,
            aliases,
            ambiguous_eligibility,
        } = roster;

        let input_ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
        let capacity = self.config.capacity;
        let mut ledger = Ledger::default();

        tracing::info!("Assigning {} participants (capacity {})", input_ids.len(), capacity);

        let split = split_eligible(participants);
        ledger.record_participants(&split.excluded);

        let pool = ledger.admit(split.eligible, "buddy graph");
        let dedupe = self.config.dedupe_request_keys;
        let resolution = resolve_requested_groups(pool, &aliases, capacity, dedupe);
        ledger.record_buckets(&resolution.groups);

        let pool = ledger.admit(resolution.remaining, "team clusters");
        let teams = build_team_clusters(pool, capacity);
        ledger.record_buckets(&teams.groups);

        let pool = ledger.admit(teams.remaining, "bucketer");
        let bucketed = Bucketer::new(&self.config).run(pool);
        ledger.record_buckets(&bucketed.solo);
        ledger.record_buckets(&bucketed.regular);

        let mut requested_or_team = resolution.groups;
        requested_or_team.extend(teams.groups);

        let mut result = AssignmentResult {
            excluded: split.excluded,
            solo: bucketed.solo,
            requested_or_team,
            regular: bucketed.regular,
            diagnostics: Diagnostics {
                alias_entries: aliases.len(),
                ambiguous_eligibility,
                malformed_request_tokens: resolution.stats.malformed_tokens,
                unknown_references: resolution.stats.unknown_references,
                deduplicated_requests: resolution.stats.deduplicated_requests,
            },
        };
        number_buckets(&mut result.solo);
        number_buckets(&mut result.requested_or_team);
        number_buckets(&mut result.regular);

        verify_exactly_once(input_ids.iter().map(String::as_str), &result)?;

        tracing::info!(
            "Assignment complete: {} excluded, {} solo, {} requested/team, {} regular buckets",
            result.excluded.len(),
            result.solo.len(),
            result.requested_or_team.len(),
            result.regular.len()
        );

        Ok(result)
    }
}

impl Default for Assigner {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aliases::AliasMap;
    use crate::models::{BucketKind, Eligibility, GenderPreference};

    fn create_participant(id: &str, city: &str) -> Participant {
        Participant {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            sex: "female".to_string(),
            gender_preference: GenderPreference::SameGender,
            state_or_province: "Metro Manila".to_string(),
            city: city.to_string(),
            is_local_resident: true,
            ..Default::default()
        }
    }

    fn roster(mut participants: Vec<Participant>) -> NormalizedRoster {
        for (row, p) in participants.iter_mut().enumerate() {
            p.row = row;
        }
        NormalizedRoster {
            participants,
            aliases: AliasMap::new(),
            ambiguous_eligibility: 0,
        }
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = EngineConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(matches!(Assigner::new(config), Err(AssignmentError::InvalidConfig(_))));
    }

    #[test]
    fn test_stages_place_everyone_once() {
        let mut a = create_participant("a", "Manila");
        a.raw_buddy_requests = vec!["b@example.com".to_string()];
        let b = create_participant("b", "Makati");
        let mut x = create_participant("x", "Manila");
        x.eligibility = Eligibility::Ineligible;
        x.raw_buddy_requests = vec!["a@example.com".to_string()];
        let mut t1 = create_participant("t1", "Manila");
        t1.team_label = Some("Phoenix".to_string());
        let mut t2 = create_participant("t2", "Pasig");
        t2.team_label = Some("Phoenix".to_string());
        let mut s = create_participant("s", "Manila");
        s.solo_requested = true;
        let r = create_participant("r", "Manila");

        let result = Assigner::with_defaults()
            .assign(roster(vec![a, b, x, t1, t2, s, r]))
            .expect("assignment succeeds");

        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].id, "x");
        assert_eq!(result.requested_or_team.len(), 2);
        assert_eq!(result.requested_or_team[0].kind, BucketKind::Requested);
        assert_eq!(result.requested_or_team[0].member_ids(), vec!["a", "b"]);
        assert_eq!(result.requested_or_team[1].kind, BucketKind::Team);
        assert_eq!(result.solo[0].member_ids(), vec!["s"]);
        assert_eq!(result.regular.len(), 1);
        assert_eq!(result.regular[0].member_ids(), vec!["r"]);
        assert_eq!(result.placed_ids().count(), 7);
    }

    #[test]
    fn test_buckets_numbered_per_collection() {
        let participants: Vec<_> =
            (0..11).map(|i| create_participant(&format!("p{}", i), "Manila")).collect();
        let result = Assigner::with_defaults()
            .assign(roster(participants))
            .expect("assignment succeeds");

        let numbers: Vec<_> = result.regular.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_verify_reports_offending_ids() {
        let member = |id: &str| create_participant(id, "Manila");
        let result = AssignmentResult {
            regular: vec![
                Bucket::new(BucketKind::Regular, "r1", 5, vec![member("a"), member("b")]),
                Bucket::new(BucketKind::Regular, "r2", 5, vec![member("b"), member("z")]),
            ],
            ..Default::default()
        };

        let err = verify_exactly_once(["a", "b", "c"], &result).unwrap_err();
        match err {
            AssignmentError::ExactlyOnceViolation {
                missing,
                duplicated,
                unexpected,
            } => {
                assert_eq!(missing, vec!["c"]);
                assert_eq!(duplicated, vec!["b"]);
                assert_eq!(unexpected, vec!["z"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
