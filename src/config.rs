use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::domain::{
    default_non_binary_identities, DEFAULT_CAPACITY, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::models::{CanonicalField, EngineConfig, FieldCandidates, FieldMapping, RegionTable};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub fields: FieldSettings,
    #[serde(default)]
    pub regions: RegionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_min_alias_name_len")]
    pub min_alias_name_len: usize,
    #[serde(default = "default_true")]
    pub dedupe_request_keys: bool,
    #[serde(default = "default_non_binary_identities")]
    pub non_binary_identities: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            similarity_threshold: default_similarity_threshold(),
            min_alias_name_len: default_min_alias_name_len(),
            dedupe_request_keys: true,
            non_binary_identities: default_non_binary_identities(),
        }
    }
}

fn default_capacity() -> usize { DEFAULT_CAPACITY }
fn default_similarity_threshold() -> f64 { DEFAULT_SIMILARITY_THRESHOLD }
fn default_min_alias_name_len() -> usize { 4 }
fn default_true() -> bool { true }

/// Header detection settings, keyed by canonical field name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSettings {
    /// Replaces the built-in candidate list for a field
    #[serde(default)]
    pub candidates: BTreeMap<String, Vec<String>>,
    /// Pins a field to an exact header, skipping detection
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// Additions to the built-in region tables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionSettings {
    #[serde(default)]
    pub province_order: BTreeMap<String, u32>,
    #[serde(default)]
    pub timezone_regions: BTreeMap<String, String>,
    /// Replaces the built-in region order when non-empty
    #[serde(default)]
    pub timezone_order: Vec<String>,
}

fn unknown_field(name: &str) -> ConfigError {
    ConfigError::Message(format!("unknown canonical field in [fields]: {}", name))
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with GROUPING_)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., GROUPING__ENGINE__CAPACITY -> engine.capacity
            .add_source(
                Environment::with_prefix("GROUPING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("GROUPING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse settings from an in-memory TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Engine parameters with the region tables merged over the built-ins
    pub fn engine_config(&self) -> EngineConfig {
        let mut regions = RegionTable::default();
        regions.province_order.extend(
            self.regions
                .province_order
                .iter()
                .map(|(name, rank)| (name.trim().to_lowercase(), *rank)),
        );
        regions.timezone_regions.extend(
            self.regions
                .timezone_regions
                .iter()
                .map(|(country, region)| (country.trim().to_lowercase(), region.clone())),
        );
        if !self.regions.timezone_order.is_empty() {
            regions.timezone_order = self.regions.timezone_order.clone();
        }

        EngineConfig {
            capacity: self.engine.capacity,
            similarity_threshold: self.engine.similarity_threshold,
            min_alias_name_len: self.engine.min_alias_name_len,
            dedupe_request_keys: self.engine.dedupe_request_keys,
            non_binary_identities: self
                .engine
                .non_binary_identities
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
            regions,
        }
    }

    /// Candidate header names with configured replacements applied
    pub fn field_candidates(&self) -> Result<FieldCandidates, ConfigError> {
        let mut candidates = FieldCandidates::default();
        for (name, headers) in &self.fields.candidates {
            let field: CanonicalField = name.parse().map_err(|_| unknown_field(name))?;
            candidates.set(field, headers.clone());
        }
        Ok(candidates)
    }

    /// Apply pinned headers on top of a detected mapping
    pub fn apply_overrides(&self, mut mapping: FieldMapping) -> Result<FieldMapping, ConfigError> {
        for (name, header) in &self.fields.overrides {
            let field: CanonicalField = name.parse().map_err(|_| unknown_field(name))?;
            mapping.set(field, header.clone());
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_settings() {
        let engine = EngineSettings::default();
        assert_eq!(engine.capacity, 5);
        assert_eq!(engine.similarity_threshold, 0.9);
        assert!(engine.dedupe_request_keys);
        assert!(engine.non_binary_identities.contains(&"non-binary".to_string()));
    }

    #[test]
    fn test_from_toml_merges_regions() {
        let settings = Settings::from_toml_str(
            r#"
            [engine]
            capacity = 4

            [regions]
            province_order = { "Ilocos Norte" = 1 }
            timezone_regions = { "Brazil" = "Americas" }

            [fields.overrides]
            team_label = "Squad"
            "#,
        )
        .expect("valid settings");

        let config = settings.engine_config();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.regions.province_rank("ilocos norte"), 1);
        assert_eq!(config.regions.timezone_region("Brazil"), "Americas");
        assert_eq!(config.regions.province_rank("Metro Manila"), 0);

        let mapping = settings.apply_overrides(FieldMapping::new()).expect("known fields");
        assert_eq!(mapping.get(CanonicalField::TeamLabel), Some("Squad"));
    }

    #[test]
    fn test_unknown_candidate_field_rejected() {
        let settings = Settings::from_toml_str(
            r#"
            [fields.candidates]
            shoe_size = ["Shoe Size"]
            "#,
        )
        .expect("valid settings");

        assert!(settings.field_candidates().is_err());
    }
}
