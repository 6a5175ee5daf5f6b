use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::domain::{AssignmentResult, Bucket, BucketKind, Diagnostics};

/// Exporter-facing view of one bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketView {
    pub number: usize,
    pub label: String,
    pub kind: BucketKind,
    pub origin: Option<String>,
    pub size: usize,
    pub capacity: usize,
    #[serde(rename = "sameLocality")]
    pub same_locality: bool,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<String>,
    #[serde(rename = "memberNames")]
    pub member_names: Vec<String>,
}

impl From<&Bucket> for BucketView {
    fn from(bucket: &Bucket) -> Self {
        Self {
            number: bucket.number,
            label: bucket.label.clone(),
            kind: bucket.kind,
            origin: bucket.origin.clone(),
            size: bucket.len(),
            capacity: bucket.capacity,
            same_locality: bucket.same_locality,
            member_ids: bucket.members.iter().map(|m| m.id.clone()).collect(),
            member_names: bucket.members.iter().map(|m| m.name.clone()).collect(),
        }
    }
}

/// Participant counts per output collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub participants: usize,
    pub excluded: usize,
    pub solo: usize,
    #[serde(rename = "requestedOrTeam")]
    pub requested_or_team: usize,
    pub regular: usize,
    pub buckets: usize,
}

/// Response for a full assignment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentReport {
    #[serde(rename = "runId")]
    pub run_id: Uuid,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub totals: Totals,
    #[serde(rename = "excludedIds")]
    pub excluded_ids: Vec<String>,
    pub solo: Vec<BucketView>,
    #[serde(rename = "requestedOrTeam")]
    pub requested_or_team: Vec<BucketView>,
    pub regular: Vec<BucketView>,
    pub diagnostics: Diagnostics,
}

impl AssignmentReport {
    pub fn from_result(result: &AssignmentResult, run_id: Uuid) -> Self {
        let count = |buckets: &[Bucket]| buckets.iter().map(Bucket::len).sum::<usize>();
        let views = |buckets: &[Bucket]| buckets.iter().map(BucketView::from).collect::<Vec<_>>();

        let totals = Totals {
            participants: result.placed_ids().count(),
            excluded: result.excluded.len(),
            solo: count(&result.solo),
            requested_or_team: count(&result.requested_or_team),
            regular: count(&result.regular),
            buckets: result.buckets().count(),
        };

        Self {
            run_id,
            generated_at: chrono::Utc::now(),
            totals,
            excluded_ids: result.excluded.iter().map(|p| p.id.clone()).collect(),
            solo: views(&result.solo),
            requested_or_team: views(&result.requested_or_team),
            regular: views(&result.regular),
            diagnostics: result.diagnostics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::Participant;

    #[test]
    fn test_report_totals() {
        let member = |id: &str| Participant { id: id.to_string(), ..Default::default() };
        let result = AssignmentResult {
            excluded: vec![member("x")],
            solo: vec![Bucket::new(BucketKind::Solo, "Solo", 1, vec![member("s")])],
            requested_or_team: vec![Bucket::new(
                BucketKind::Requested,
                "Requested 1",
                5,
                vec![member("a"), member("b")],
            )],
            regular: vec![],
            diagnostics: Diagnostics::default(),
        };

        let report = AssignmentReport::from_result(&result, Uuid::new_v4());
        assert_eq!(report.totals.participants, 4);
        assert_eq!(report.totals.requested_or_team, 2);
        assert_eq!(report.totals.buckets, 2);
        assert_eq!(report.excluded_ids, vec!["x"]);
        assert_eq!(report.requested_or_team[0].member_ids, vec!["a", "b"]);
    }
}
