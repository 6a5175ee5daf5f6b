use std::collections::BTreeMap;

use crate::core::regions::LocalityKey;
use crate::models::{Bucket, BucketKind, EngineConfig, GenderKey, GenderPreference, Participant};

/// Label given to singleton solo buckets
pub const SOLO_LABEL: &str = "Solo";

const UNSPECIFIED: &str = "Unspecified";

/// Split members, in their current order, into chunks of at most `capacity`
pub fn chunk_in_order(members: Vec<Participant>, capacity: usize) -> Vec<Vec<Participant>> {
    let capacity = capacity.max(1);
    let mut chunks = Vec::new();
    let mut iter = members.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(capacity).collect());
    }
    chunks
}

/// "Base" for a single chunk, "Base (k/n)" when a group was split
pub fn chunk_label(base: &str, part: usize, total: usize) -> String {
    if total <= 1 {
        base.to_string()
    } else {
        format!("{} ({}/{})", base, part, total)
    }
}

/// Gender partition of a participant; regular buckets never mix keys
pub fn gender_key(participant: &Participant, non_binary_identities: &[String]) -> GenderKey {
    match participant.gender_preference {
        GenderPreference::SameGender => {
            let identity = participant.gender_identity.to_lowercase();
            let non_binary = non_binary_identities
                .iter()
                .any(|marker| !marker.is_empty() && identity.contains(marker.as_str()));
            GenderKey::SameGender {
                sex: participant.sex.trim().to_lowercase(),
                non_binary,
            }
        }
        GenderPreference::NoPreference => GenderKey::NoPreference,
        GenderPreference::Other => GenderKey::Other,
    }
}

/// Full chunks of exactly `capacity`, plus the short remainder (possibly empty)
fn split_full(
    members: Vec<Participant>,
    capacity: usize,
) -> (Vec<Vec<Participant>>, Vec<Participant>) {
    let mut chunks = chunk_in_order(members, capacity);
    let short = chunks.last().map_or(false, |last| last.len() < capacity);
    let remainder = if short { chunks.pop().unwrap_or_default() } else { Vec::new() };
    (chunks, remainder)
}

struct Locality {
    name: String,
    unspecified: bool,
    members: Vec<Participant>,
}

/// Group members by a locality field, in traversal order
fn group_by_locality<F, R>(members: Vec<Participant>, name_of: F, rank_of: R) -> Vec<Locality>
where
    F: Fn(&Participant) -> &str,
    R: Fn(&str) -> u32,
{
    let mut groups: BTreeMap<LocalityKey, Locality> = BTreeMap::new();
    for p in members {
        let raw = name_of(&p).trim().to_string();
        let key = LocalityKey::new(rank_of(&raw), &raw);
        groups
            .entry(key)
            .or_insert_with(|| Locality {
                name: if raw.is_empty() { UNSPECIFIED.to_string() } else { raw.clone() },
                unspecified: raw.is_empty(),
                members: Vec::new(),
            })
            .members
            .push(p);
    }
    groups.into_values().collect()
}

/// Members drawn from one or more localities, never split once formed
#[derive(Debug)]
struct Bin {
    localities: Vec<String>,
    /// Province or country each locality sits in
    parents: Vec<String>,
    members: Vec<Participant>,
}

impl Bin {
    fn single(locality: String, parent: &str, members: Vec<Participant>) -> Self {
        Self {
            localities: vec![locality],
            parents: vec![parent.to_string()],
            members,
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn absorb(&mut self, other: Bin) {
        for locality in other.localities {
            if !self.localities.contains(&locality) {
                self.localities.push(locality);
            }
        }
        for parent in other.parents {
            if !self.parents.contains(&parent) {
                self.parents.push(parent);
            }
        }
        self.members.extend(other.members);
    }
}

/// First-fit decreasing over whole units; no unit is ever split
fn pack_bins(mut units: Vec<Bin>, capacity: usize) -> Vec<Bin> {
    units.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut bins: Vec<Bin> = Vec::new();
    for unit in units {
        let size = unit.len();
        match bins.iter_mut().find(|bin| bin.len() + size <= capacity) {
            Some(bin) => bin.absorb(unit),
            None => bins.push(unit),
        }
    }

    for bin in &mut bins {
        bin.members.sort_by_key(|p| p.row);
    }
    bins
}

/// Output of the hierarchical bucketer
#[derive(Debug, Clone, Default)]
pub struct BucketerOutput {
    pub solo: Vec<Bucket>,
    pub regular: Vec<Bucket>,
}

/// Partitions the remaining pool by gender key and geography, then packs to capacity
#[derive(Debug, Clone, Copy)]
pub struct Bucketer<'a> {
    config: &'a EngineConfig,
}

impl<'a> Bucketer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, participants: Vec<Participant>) -> BucketerOutput {
        let (solo_requested, pool): (Vec<_>, Vec<_>) =
            participants.into_iter().partition(|p| p.solo_requested);

        let solo: Vec<Bucket> = solo_requested
            .into_iter()
            .map(|p| Bucket::new(BucketKind::Solo, SOLO_LABEL, 1, vec![p]))
            .collect();

        let mut partitions: BTreeMap<GenderKey, Vec<Participant>> = BTreeMap::new();
        for p in pool {
            let key = gender_key(&p, &self.config.non_binary_identities);
            partitions.entry(key).or_default().push(p);
        }

        let mut regular = Vec::new();
        for (key, members) in partitions {
            let (local, non_local): (Vec<_>, Vec<_>) =
                members.into_iter().partition(|p| p.is_local_resident);
            tracing::debug!(
                "Gender key {}: {} local, {} non-local",
                key,
                local.len(),
                non_local.len()
            );
            regular.extend(self.bucket_local(&key, local));
            regular.extend(self.bucket_non_local(&key, non_local));
        }

        tracing::info!("Bucketer: {} solo, {} regular buckets", solo.len(), regular.len());

        BucketerOutput { solo, regular }
    }

    /// Province -> city; city remainders consolidated within the province
    fn bucket_local(&self, key: &GenderKey, members: Vec<Participant>) -> Vec<Bucket> {
        let capacity = self.config.capacity;
        let regions = &self.config.regions;
        let mut buckets = Vec::new();

        let provinces = group_by_locality(
            members,
            |p| p.state_or_province.as_str(),
            |name| regions.province_rank(name),
        );
        for province in provinces {
            let mut remainders = Vec::new();

            for city in group_by_locality(province.members, |p| p.city.as_str(), |_| 0) {
                // A blank city is still somewhere in the province
                let locality = if city.unspecified { province.name.clone() } else { city.name };
                let (full, rest) = split_full(city.members, capacity);
                for chunk in full {
                    let bin = Bin::single(locality.clone(), &province.name, chunk);
                    buckets.push(self.regular(key, bin, &province.name));
                }
                if !rest.is_empty() {
                    remainders.push(Bin::single(locality, &province.name, rest));
                }
            }

            for bin in pack_bins(remainders, capacity) {
                buckets.push(self.regular(key, bin, &province.name));
            }
        }

        buckets
    }

    /// Country -> state; short country bins re-packed per timezone region
    fn bucket_non_local(&self, key: &GenderKey, members: Vec<Participant>) -> Vec<Bucket> {
        let capacity = self.config.capacity;
        let regions = &self.config.regions;
        let mut buckets = Vec::new();
        let mut leftovers: BTreeMap<(u32, String), Vec<Bin>> = BTreeMap::new();

        let countries =
            group_by_locality(members, |p| p.country.as_str(), |name| regions.country_rank(name));
        for country in countries {
            let region = if country.unspecified {
                regions.timezone_region("")
            } else {
                regions.timezone_region(&country.name)
            };
            let mut remainders = Vec::new();

            let states =
                group_by_locality(country.members, |p| p.state_or_province.as_str(), |_| 0);
            for state in states {
                let locality = if state.unspecified {
                    country.name.clone()
                } else {
                    format!("{}, {}", state.name, country.name)
                };
                let (full, rest) = split_full(state.members, capacity);
                for chunk in full {
                    let bin = Bin::single(locality.clone(), &country.name, chunk);
                    buckets.push(self.regular(key, bin, &country.name));
                }
                if !rest.is_empty() {
                    remainders.push(Bin::single(locality, &country.name, rest));
                }
            }

            for bin in pack_bins(remainders, capacity) {
                if bin.len() == capacity {
                    buckets.push(self.regular(key, bin, &country.name));
                } else {
                    leftovers
                        .entry((regions.region_rank(region), region.to_string()))
                        .or_default()
                        .push(bin);
                }
            }
        }

        for ((_, region), bins) in leftovers {
            tracing::debug!("Re-packing {} short bins in region {}", bins.len(), region);
            for bin in pack_bins(bins, capacity) {
                buckets.push(self.regular(key, bin, &region));
            }
        }

        buckets
    }

    /// Mixed bins are named after their one shared parent, else after `fallback`
    fn regular(&self, key: &GenderKey, bin: Bin, fallback: &str) -> Bucket {
        let same_locality = bin.localities.len() == 1;
        let label = if same_locality {
            format!("{} - {}", key, bin.localities[0])
        } else if let [parent] = bin.parents.as_slice() {
            format!("{} - {} (mixed)", key, parent)
        } else {
            format!("{} - {} (mixed)", key, fallback)
        };

        let capacity = self.config.capacity;
        let mut bucket = Bucket::new(BucketKind::Regular, label, capacity, bin.members);
        bucket.same_locality = same_locality;
        bucket
    }
}
