use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

/// Participant's stated gender policy for group formation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    SameGender,
    #[default]
    NoPreference,
    Other,
}

impl GenderPreference {
    /// Parse a free-text preference, tolerant of case, spaces and hyphens
    pub fn parse(raw: &str) -> Self {
        let norm = raw.trim().to_lowercase().replace(['-', ' '], "_");
        if norm.contains("same") {
            GenderPreference::SameGender
        } else if norm.starts_with("no_pref")
            || matches!(norm.as_str(), "nopreference" | "any" | "none" | "either")
        {
            GenderPreference::NoPreference
        } else {
            GenderPreference::Other
        }
    }
}

/// Tri-state eligibility; `Unknown` is treated as eligible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    Ineligible,
    #[default]
    Unknown,
}

impl Eligibility {
    /// Only an explicit false-like value excludes.
    pub fn parse(raw: &str) -> Self {
        match parse_flag(raw) {
            Some(true) => Eligibility::Eligible,
            Some(false) => Eligibility::Ineligible,
            None => Eligibility::Unknown,
        }
    }

    pub fn is_eligible(self) -> bool {
        self != Eligibility::Ineligible
    }
}

/// Parse a spreadsheet-style yes/no cell
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" | "checked" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Normalized program participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    /// Position in the input roster, used for stable ordering
    #[serde(default)]
    pub row: usize,
    #[serde(rename = "canonicalEmail", default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sex: String,
    #[serde(rename = "genderIdentity", default)]
    pub gender_identity: String,
    #[serde(rename = "genderPreference", default)]
    pub gender_preference: GenderPreference,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "stateOrProvince", default)]
    pub state_or_province: String,
    #[serde(default)]
    pub city: String,
    #[serde(rename = "isLocalRegionResident", default)]
    pub is_local_resident: bool,
    #[serde(rename = "soloRequested", default)]
    pub solo_requested: bool,
    #[serde(default)]
    pub eligibility: Eligibility,
    #[serde(rename = "rawBuddyRequests", default)]
    pub raw_buddy_requests: Vec<String>,
    #[serde(rename = "teamLabel", default)]
    pub team_label: Option<String>,
    /// Passthrough columns for exporters; never read by the engine
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Participant {
    pub fn is_eligible(&self) -> bool {
        self.eligibility.is_eligible()
    }

    /// Trimmed, non-empty team label
    pub fn team(&self) -> Option<&str> {
        self.team_label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }

    fn locality(&self) -> (&str, &str, &str) {
        (&self.country, &self.state_or_province, &self.city)
    }
}

/// Partition key that is never crossed when forming regular groups
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderKey {
    SameGender { sex: String, non_binary: bool },
    NoPreference,
    Other,
}

impl fmt::Display for GenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenderKey::SameGender { sex, non_binary } => {
                let mut chars = sex.chars();
                match chars.next() {
                    Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str())?,
                    None => write!(f, "Unspecified")?,
                }
                if *non_binary {
                    write!(f, " (non-binary)")?;
                }
                Ok(())
            }
            GenderKey::NoPreference => write!(f, "No preference"),
            GenderKey::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Solo,
    Requested,
    Team,
    Regular,
}

/// A capacity-bounded, ordered group of participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// 1-based position within its output collection, assigned by the ledger
    pub number: usize,
    pub label: String,
    pub kind: BucketKind,
    /// Originating component or team, shared by every chunk cut from it
    pub origin: Option<String>,
    pub capacity: usize,
    #[serde(rename = "sameLocality")]
    pub same_locality: bool,
    pub members: Vec<Participant>,
}

impl Bucket {
    pub fn new(
        kind: BucketKind,
        label: impl Into<String>,
        capacity: usize,
        members: Vec<Participant>,
    ) -> Self {
        let same_locality = members
            .first()
            .map(|first| members.iter().all(|m| m.locality() == first.locality()))
            .unwrap_or(true);

        Self {
            number: 0,
            label: label.into(),
            kind,
            origin: None,
            capacity,
            same_locality,
            members,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }
}

/// Non-fatal observations collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(rename = "aliasEntries")]
    pub alias_entries: usize,
    #[serde(rename = "ambiguousEligibility")]
    pub ambiguous_eligibility: usize,
    #[serde(rename = "malformedRequestTokens")]
    pub malformed_request_tokens: usize,
    #[serde(rename = "unknownReferences")]
    pub unknown_references: usize,
    /// Requesters whose request set repeated an earlier requester's
    #[serde(rename = "deduplicatedRequests")]
    pub deduplicated_requests: Vec<String>,
}

/// Final categorized output of the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub excluded: Vec<Participant>,
    pub solo: Vec<Bucket>,
    #[serde(rename = "requestedOrTeam")]
    pub requested_or_team: Vec<Bucket>,
    pub regular: Vec<Bucket>,
    pub diagnostics: Diagnostics,
}

impl AssignmentResult {
    /// Every participant id in output order, excluded first
    pub fn placed_ids(&self) -> impl Iterator<Item = &str> {
        self.excluded
            .iter()
            .map(|p| p.id.as_str())
            .chain(
                self.solo
                    .iter()
                    .chain(&self.requested_or_team)
                    .chain(&self.regular)
                    .flat_map(|b| b.members.iter().map(|m| m.id.as_str())),
            )
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.solo.iter().chain(&self.requested_or_team).chain(&self.regular)
    }

    /// Find the bucket holding a participant
    pub fn bucket_of(&self, id: &str) -> Option<&Bucket> {
        self.buckets().find(|b| b.contains(id))
    }
}

/// Macro-region and timezone lookup tables used for traversal order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    /// Lower-cased province name -> macro-region ordinal
    pub province_order: BTreeMap<String, u32>,
    /// Lower-cased country name -> timezone region name
    pub timezone_regions: BTreeMap<String, String>,
    /// Timezone region names in traversal order
    pub timezone_order: Vec<String>,
}

/// Engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    #[validate(range(min = 1))]
    pub capacity: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity_threshold: f64,
    /// Names shorter than this (after normalization) never produce aliases
    pub min_alias_name_len: usize,
    pub dedupe_request_keys: bool,
    /// Lower-cased identity fragments treated as non-binary
    pub non_binary_identities: Vec<String>,
    pub regions: RegionTable,
}

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_alias_name_len: 4,
            dedupe_request_keys: true,
            non_binary_identities: default_non_binary_identities(),
            regions: RegionTable::default(),
        }
    }
}

pub fn default_non_binary_identities() -> Vec<String> {
    ["non-binary", "nonbinary", "non binary", "genderqueer", "genderfluid", "agender", "enby"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
