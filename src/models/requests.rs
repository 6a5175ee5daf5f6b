use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One roster row as handed over by a reader: string keys, arbitrary values
pub type RawRecord = BTreeMap<String, serde_json::Value>;

/// Canonical participant fields the engine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Id,
    Email,
    Name,
    Sex,
    GenderIdentity,
    GenderPreference,
    Country,
    StateOrProvince,
    City,
    LocalResident,
    SoloRequested,
    Eligible,
    BuddyRequests,
    TeamLabel,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 14] = [
        CanonicalField::Id,
        CanonicalField::Email,
        CanonicalField::Name,
        CanonicalField::Sex,
        CanonicalField::GenderIdentity,
        CanonicalField::GenderPreference,
        CanonicalField::Country,
        CanonicalField::StateOrProvince,
        CanonicalField::City,
        CanonicalField::LocalResident,
        CanonicalField::SoloRequested,
        CanonicalField::Eligible,
        CanonicalField::BuddyRequests,
        CanonicalField::TeamLabel,
    ];

    pub fn is_required(self) -> bool {
        matches!(
            self,
            CanonicalField::Id | CanonicalField::GenderIdentity | CanonicalField::GenderPreference
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Id => "id",
            CanonicalField::Email => "email",
            CanonicalField::Name => "name",
            CanonicalField::Sex => "sex",
            CanonicalField::GenderIdentity => "gender_identity",
            CanonicalField::GenderPreference => "gender_preference",
            CanonicalField::Country => "country",
            CanonicalField::StateOrProvince => "state_or_province",
            CanonicalField::City => "city",
            CanonicalField::LocalResident => "local_resident",
            CanonicalField::SoloRequested => "solo_requested",
            CanonicalField::Eligible => "eligible",
            CanonicalField::BuddyRequests => "buddy_requests",
            CanonicalField::TeamLabel => "team_label",
        }
    }

    /// Header names tried, in order, during auto-detection
    fn default_candidates(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Id => {
                &["id", "participant id", "participant_id", "record id", "student id"]
            }
            CanonicalField::Email => &["email", "email address", "e-mail", "primary email"],
            CanonicalField::Name => &["name", "full name", "full_name", "participant name"],
            CanonicalField::Sex => &["sex", "sex assigned at birth", "biological sex"],
            CanonicalField::GenderIdentity => &["gender identity", "gender_identity", "gender"],
            CanonicalField::GenderPreference => &[
                "gender preference",
                "gender_preference",
                "group gender preference",
                "preferred group gender",
            ],
            CanonicalField::Country => &["country", "country of residence"],
            CanonicalField::StateOrProvince => &[
                "province",
                "state",
                "state/province",
                "state or province",
                "region",
            ],
            CanonicalField::City => &["city", "city/municipality", "municipality", "town"],
            CanonicalField::LocalResident => {
                &["local resident", "is local", "lives locally", "local_resident"]
            }
            CanonicalField::SoloRequested => {
                &["solo", "solo requested", "wants solo", "solo_requested"]
            }
            CanonicalField::Eligible => &["eligible", "eligibility", "is eligible"],
            CanonicalField::BuddyRequests => &[
                "buddy requests",
                "buddy emails",
                "group with",
                "preferred groupmates",
                "buddy_requests",
            ],
            CanonicalField::TeamLabel => &["team", "team name", "team label", "team_label"],
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CanonicalField::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| format!("unknown canonical field: {}", s))
    }
}

/// Candidate header names per canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCandidates {
    candidates: BTreeMap<CanonicalField, Vec<String>>,
}

impl Default for FieldCandidates {
    fn default() -> Self {
        let candidates = CanonicalField::ALL
            .into_iter()
            .map(|field| {
                let names = field.default_candidates().iter().map(|s| s.to_string()).collect();
                (field, names)
            })
            .collect();
        Self { candidates }
    }
}

impl FieldCandidates {
    /// Replace the candidate list for one field
    pub fn set(&mut self, field: CanonicalField, names: Vec<String>) {
        self.candidates.insert(field, names);
    }

    pub fn get(&self, field: CanonicalField) -> &[String] {
        self.candidates.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolved header name for each canonical field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    fields: BTreeMap<CanonicalField, String>,
}

/// Outcome of header auto-detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingReport {
    pub mapping: FieldMapping,
    pub unresolved_required: Vec<CanonicalField>,
    pub unresolved_optional: Vec<CanonicalField>,
}

impl MappingReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved_required.is_empty()
    }
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: CanonicalField, header: impl Into<String>) -> Self {
        self.set(field, header);
        self
    }

    pub fn set(&mut self, field: CanonicalField, header: impl Into<String>) {
        self.fields.insert(field, header.into());
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Required fields with no header
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| f.is_required() && !self.contains(*f))
            .collect()
    }

    /// Match candidate names against the headers present, case-insensitively
    pub fn detect<'a, I>(headers: I, candidates: &FieldCandidates) -> MappingReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut by_lower: BTreeMap<String, &str> = BTreeMap::new();
        for header in headers {
            by_lower.entry(header.trim().to_lowercase()).or_insert(header);
        }

        let mut mapping = FieldMapping::new();
        let mut unresolved_required = Vec::new();
        let mut unresolved_optional = Vec::new();

        for field in CanonicalField::ALL {
            let found = candidates
                .get(field)
                .iter()
                .find_map(|name| by_lower.get(&name.trim().to_lowercase()).copied());

            match found {
                Some(header) => mapping.set(field, header),
                None if field.is_required() => unresolved_required.push(field),
                None => unresolved_optional.push(field),
            }
        }

        MappingReport {
            mapping,
            unresolved_required,
            unresolved_optional,
        }
    }

    /// Union of keys across every record, for auto-detection
    pub fn headers_of(records: &[RawRecord]) -> BTreeSet<&str> {
        records.iter().flat_map(|r| r.keys().map(String::as_str)).collect()
    }

    /// Headers already claimed by a canonical field
    pub fn mapped_headers(&self) -> BTreeSet<&str> {
        self.fields.values().map(String::as_str).collect()
    }
}
