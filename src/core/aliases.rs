use serde::Serialize;
use std::collections::BTreeMap;
use strsim::normalized_levenshtein;

use crate::core::buddy_graph::DisjointSet;
use crate::core::emails::normalize_email;
use crate::models::Participant;

/// Alias email -> canonical email
///
/// Always a function, and canonical emails are never keys, so resolving is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AliasMap {
    aliases: BTreeMap<String, String>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of an email; unknown emails map to themselves
    pub fn resolve(&self, email: &str) -> String {
        let email = normalize_email(email);
        match self.aliases.get(&email) {
            Some(canonical) => canonical.clone(),
            None => email,
        }
    }

    pub fn is_alias(&self, email: &str) -> bool {
        self.aliases.contains_key(&normalize_email(email))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    /// Unify emails of participants whose display names look like the same person
    ///
    /// Pairwise over the roster. Two sets merge only when every name in one scores
    /// at or above `threshold` against every name in the other, so a short name
    /// contained in two different full names cannot chain them together. Within
    /// each unified set the email with the fewest digits in its local part (then
    /// earliest in the roster) becomes canonical.
    pub fn build(participants: &[Participant], threshold: f64, min_name_len: usize) -> Self {
        let mut emails: Vec<String> = Vec::new();
        let mut email_index: BTreeMap<String, usize> = BTreeMap::new();
        let mut entries: Vec<(usize, String)> = Vec::new();

        for p in participants {
            let email = normalize_email(&p.email);
            if email.is_empty() {
                continue;
            }
            let idx = *email_index.entry(email.clone()).or_insert_with(|| {
                emails.push(email.clone());
                emails.len() - 1
            });
            let name = normalize_name(&p.name);
            if name.chars().count() >= min_name_len {
                entries.push((idx, name));
            }
        }

        // Names held by each unified set, keyed by its root
        let mut names_of_set: Vec<Vec<usize>> = vec![Vec::new(); emails.len()];
        for (entry, (email, _)) in entries.iter().enumerate() {
            names_of_set[*email].push(entry);
        }

        let mut sets = DisjointSet::new(emails.len());
        for i in 0..entries.len() {
            for j in i + 1..entries.len() {
                let (email_a, name_a) = &entries[i];
                let (email_b, name_b) = &entries[j];
                let (root_a, root_b) = (sets.find(*email_a), sets.find(*email_b));
                if root_a == root_b {
                    continue;
                }
                let score = name_similarity(name_a, name_b);
                if score < threshold {
                    continue;
                }

                // Complete linkage: every name on one side must match every name on the other
                let linked = names_of_set[root_a].iter().all(|&x| {
                    names_of_set[root_b]
                        .iter()
                        .all(|&y| name_similarity(&entries[x].1, &entries[y].1) >= threshold)
                });
                if !linked {
                    tracing::debug!(
                        "Not unifying {} and {}: their sets hold dissimilar names",
                        emails[*email_a],
                        emails[*email_b]
                    );
                    continue;
                }

                tracing::debug!(
                    "Name match {:?} ~ {:?} (score {:.3}): unifying {} and {}",
                    name_a,
                    name_b,
                    score,
                    emails[*email_a],
                    emails[*email_b]
                );
                sets.union(root_a, root_b);
                let root = sets.find(root_a);
                let absorbed = if root == root_a { root_b } else { root_a };
                let moved = std::mem::take(&mut names_of_set[absorbed]);
                names_of_set[root].extend(moved);
            }
        }

        let mut canonical_of_root: BTreeMap<usize, usize> = BTreeMap::new();
        for idx in 0..emails.len() {
            let root = sets.find(idx);
            let best = canonical_of_root.entry(root).or_insert(idx);
            if canonical_rank(&emails[idx], idx) < canonical_rank(&emails[*best], *best) {
                *best = idx;
            }
        }

        let mut map = AliasMap::new();
        for idx in 0..emails.len() {
            let canonical = canonical_of_root[&sets.find(idx)];
            if canonical != idx {
                map.aliases.insert(emails[idx].clone(), emails[canonical].clone());
            }
        }

        if !map.is_empty() {
            tracing::info!("Built email alias map with {} entries", map.len());
        }
        map
    }
}

/// Lower rank looks more canonical
fn canonical_rank(email: &str, first_seen: usize) -> (usize, usize) {
    let local = email.split('@').next().unwrap_or(email);
    let digits = local.chars().filter(char::is_ascii_digit).count();
    (digits, first_seen)
}

/// Lower-case, strip punctuation, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two normalized names in [0, 1]
///
/// Whole-word containment ("maria santos" in "maria clara santos" does not count,
/// "maria santos" in "maria santos reyes" does) scores 1.0; otherwise the best of
/// normalized edit distance and token overlap.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if format!(" {} ", longer).contains(&format!(" {} ", shorter)) {
        return 1.0;
    }

    let tokens_a: Vec<&str> = a.split(' ').collect();
    let tokens_b: Vec<&str> = b.split(' ').collect();
    let shared = tokens_a.iter().filter(|t| tokens_b.contains(*t)).count();
    let union = tokens_a.len() + tokens_b.len() - shared;
    let overlap = if union > 0 { shared as f64 / union as f64 } else { 0.0 };

    normalized_levenshtein(a, b).max(overlap)
}
