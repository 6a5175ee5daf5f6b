use std::collections::HashMap;

use crate::core::bucketer::{chunk_in_order, chunk_label};
use crate::models::{Bucket, BucketKind, Participant};

/// Team buckets plus the participants left for the bucketer
#[derive(Debug, Clone)]
pub struct TeamClusters {
    pub groups: Vec<Bucket>,
    pub remaining: Vec<Participant>,
}

/// Cluster participants sharing a team label
///
/// Labels are matched exactly after trimming and visited in order of first
/// appearance. A label held by a single participant is not shared, so that
/// participant stays in the pool.
pub fn build_team_clusters(participants: Vec<Participant>, capacity: usize) -> TeamClusters {
    let mut teams: Vec<(String, Vec<Participant>)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unlabeled = Vec::new();

    for p in participants {
        let Some(label) = p.team().map(str::to_string) else {
            unlabeled.push(p);
            continue;
        };
        let idx = *position.entry(label.clone()).or_insert_with(|| {
            teams.push((label, Vec::new()));
            teams.len() - 1
        });
        teams[idx].1.push(p);
    }

    let mut groups = Vec::new();
    let mut remaining = unlabeled;

    for (label, members) in teams {
        if members.len() < 2 {
            remaining.extend(members);
            continue;
        }

        let base = format!("Team {}", label);
        let origin = format!("team:{}", label);
        let chunks = chunk_in_order(members, capacity);
        let total = chunks.len();
        for (k, chunk) in chunks.into_iter().enumerate() {
            groups.push(
                Bucket::new(BucketKind::Team, chunk_label(&base, k + 1, total), capacity, chunk)
                    .with_origin(origin.clone()),
            );
        }
    }

    remaining.sort_by_key(|p| p.row);

    tracing::info!("Team clusters: {} groups, {} left in pool", groups.len(), remaining.len());

    TeamClusters { groups, remaining }
}
