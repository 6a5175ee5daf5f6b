use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::core::aliases::AliasMap;
use crate::models::domain::parse_flag;
use crate::models::{
    CanonicalField, Eligibility, EngineConfig, FieldMapping, GenderPreference, Participant,
    RawRecord,
};

/// Errors that stop normalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Unresolved required fields: {fields:?}")]
    MissingRequiredFields { fields: Vec<CanonicalField> },

    #[error("Record {row} has no participant id")]
    MissingId { row: usize },

    #[error("Duplicate participant id: {id}")]
    DuplicateId { id: String },
}

/// Canonical roster plus the alias map built over it
#[derive(Debug, Clone)]
pub struct NormalizedRoster {
    pub participants: Vec<Participant>,
    pub aliases: AliasMap,
    /// Non-empty eligibility values that were neither true- nor false-like
    pub ambiguous_eligibility: usize,
}

/// Render any cell value as trimmed text
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Buddy-request cells may be a single string or a list
fn value_tokens(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).filter(|s| !s.is_empty()).collect(),
        other => {
            let text = value_text(other);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
    }
}

/// Collapse common spellings of sex onto `female` / `male`
pub fn normalize_sex(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "f" | "female" | "woman" => "female".to_string(),
        "m" | "male" | "man" => "male".to_string(),
        _ => lower,
    }
}

/// Map raw records onto the canonical schema and build the alias map
pub fn normalize(
    records: &[RawRecord],
    mapping: &FieldMapping,
    config: &EngineConfig,
) -> Result<NormalizedRoster, NormalizeError> {
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        return Err(NormalizeError::MissingRequiredFields { fields: missing });
    }

    for field in CanonicalField::ALL.into_iter().filter(|f| !mapping.contains(*f)) {
        tracing::debug!("Optional field {} is not mapped; treating as absent", field);
    }

    let mapped = mapping.mapped_headers();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut participants = Vec::with_capacity(records.len());
    let mut ambiguous_eligibility = 0;

    for (row, record) in records.iter().enumerate() {
        let cell = |field: CanonicalField| mapping.get(field).and_then(|header| record.get(header));
        let text = |field: CanonicalField| cell(field).map(value_text).unwrap_or_default();
        let flag = |field: CanonicalField| parse_flag(&text(field)).unwrap_or(false);

        let id = text(CanonicalField::Id);
        if id.is_empty() {
            return Err(NormalizeError::MissingId { row });
        }
        if !seen_ids.insert(id.clone()) {
            return Err(NormalizeError::DuplicateId { id });
        }

        let eligibility_raw = text(CanonicalField::Eligible);
        let eligibility = Eligibility::parse(&eligibility_raw);
        if eligibility == Eligibility::Unknown && !eligibility_raw.is_empty() {
            tracing::warn!(
                "Ambiguous eligibility {:?} for {}; keeping as eligible",
                eligibility_raw,
                id
            );
            ambiguous_eligibility += 1;
        }

        let team = text(CanonicalField::TeamLabel);

        let attributes = record
            .iter()
            .filter(|(header, _)| !mapped.contains(header.as_str()))
            .map(|(header, value)| (header.clone(), value_text(value)))
            .collect();

        participants.push(Participant {
            id,
            row,
            email: text(CanonicalField::Email).to_lowercase(),
            name: text(CanonicalField::Name),
            sex: normalize_sex(&text(CanonicalField::Sex)),
            gender_identity: text(CanonicalField::GenderIdentity),
            gender_preference: GenderPreference::parse(&text(CanonicalField::GenderPreference)),
            country: text(CanonicalField::Country),
            state_or_province: text(CanonicalField::StateOrProvince),
            city: text(CanonicalField::City),
            is_local_resident: flag(CanonicalField::LocalResident),
            solo_requested: flag(CanonicalField::SoloRequested),
            eligibility,
            raw_buddy_requests: cell(CanonicalField::BuddyRequests)
                .map(value_tokens)
                .unwrap_or_default(),
            team_label: if team.is_empty() { None } else { Some(team) },
            attributes,
        });
    }

    let aliases = AliasMap::build(
        &participants,
        config.similarity_threshold,
        config.min_alias_name_len,
    );
    for p in &mut participants {
        p.email = aliases.resolve(&p.email);
    }

    tracing::info!(
        "Normalized {} participants ({} email aliases)",
        participants.len(),
        aliases.len()
    );

    Ok(NormalizedRoster {
        participants,
        aliases,
        ambiguous_eligibility,
    })
}
