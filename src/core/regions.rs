use crate::models::RegionTable;

/// Region assigned to countries missing from the timezone table
pub const UNKNOWN_REGION: &str = "Other";

/// Macro-region ordinals for local provinces (Metro Manila first, then Luzon, Visayas, Mindanao)
const DEFAULT_PROVINCE_ORDER: &[(&str, u32)] = &[
    ("metro manila", 0),
    ("ncr", 0),
    ("national capital region", 0),
    ("bulacan", 1),
    ("cavite", 1),
    ("laguna", 1),
    ("rizal", 1),
    ("batangas", 1),
    ("pampanga", 1),
    ("pangasinan", 1),
    ("benguet", 1),
    ("cebu", 2),
    ("iloilo", 2),
    ("negros occidental", 2),
    ("bohol", 2),
    ("leyte", 2),
    ("davao del sur", 3),
    ("misamis oriental", 3),
    ("zamboanga del sur", 3),
    ("south cotabato", 3),
];

const DEFAULT_TIMEZONE_REGIONS: &[(&str, &str)] = &[
    ("philippines", "Asia-Pacific"),
    ("singapore", "Asia-Pacific"),
    ("malaysia", "Asia-Pacific"),
    ("hong kong", "Asia-Pacific"),
    ("japan", "Asia-Pacific"),
    ("south korea", "Asia-Pacific"),
    ("china", "Asia-Pacific"),
    ("taiwan", "Asia-Pacific"),
    ("australia", "Asia-Pacific"),
    ("new zealand", "Asia-Pacific"),
    ("united arab emirates", "Middle East"),
    ("uae", "Middle East"),
    ("saudi arabia", "Middle East"),
    ("qatar", "Middle East"),
    ("kuwait", "Middle East"),
    ("united kingdom", "Europe"),
    ("uk", "Europe"),
    ("ireland", "Europe"),
    ("germany", "Europe"),
    ("france", "Europe"),
    ("italy", "Europe"),
    ("spain", "Europe"),
    ("netherlands", "Europe"),
    ("united states", "Americas"),
    ("usa", "Americas"),
    ("canada", "Americas"),
    ("mexico", "Americas"),
];

const DEFAULT_TIMEZONE_ORDER: &[&str] = &["Asia-Pacific", "Middle East", "Europe", "Americas"];

impl Default for RegionTable {
    fn default() -> Self {
        Self {
            province_order: DEFAULT_PROVINCE_ORDER
                .iter()
                .map(|(name, rank)| (name.to_string(), *rank))
                .collect(),
            timezone_regions: DEFAULT_TIMEZONE_REGIONS
                .iter()
                .map(|(country, region)| (country.to_string(), region.to_string()))
                .collect(),
            timezone_order: DEFAULT_TIMEZONE_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RegionTable {
    /// Macro-region ordinal of a province; unknown provinces sort last
    pub fn province_rank(&self, province: &str) -> u32 {
        self.province_order
            .get(&province.trim().to_lowercase())
            .copied()
            .unwrap_or(u32::MAX)
    }

    /// Coarse timezone region of a country
    pub fn timezone_region(&self, country: &str) -> &str {
        self.timezone_regions
            .get(&country.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_REGION)
    }

    pub fn region_rank(&self, region: &str) -> u32 {
        self.timezone_order
            .iter()
            .position(|r| r.eq_ignore_ascii_case(region))
            .map(|pos| pos as u32)
            .unwrap_or(u32::MAX)
    }

    /// Traversal rank of a country, by its timezone region
    pub fn country_rank(&self, country: &str) -> u32 {
        self.region_rank(self.timezone_region(country))
    }
}

/// Stable traversal key: ordinal, then named before unspecified, then alphabetical
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalityKey {
    pub rank: u32,
    pub unspecified: bool,
    pub name: String,
}

impl LocalityKey {
    pub fn new(rank: u32, name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self {
            rank,
            unspecified: name.is_empty(),
            name,
        }
    }
}
