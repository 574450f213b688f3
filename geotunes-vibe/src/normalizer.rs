//! Vibe label normalization
//!
//! Maps raw classifier labels onto canonical vibe keys (alias table) and
//! presentation strings (display table). The container table used by
//! content-store sources lives here too so all three can be audited
//! against each other at start-up.
//!
//! Tables are built once and shared read-only.

use crate::types::{CanonicalVibe, VibeLabel};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Key used when a label is empty after cleaning
pub const UNKNOWN_VIBE_KEY: &str = "unknown";

const UNKNOWN_VIBE_DISPLAY: &str = "Unknown";

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    // beach-ish
    ("beach", "beach"),
    ("coastal", "coastal-city"),
    ("coastal-city", "coastal-city"),
    ("coastal city", "coastal-city"),
    ("backwater", "backwater"),
    // mountain / forest / hill
    ("mountain", "mountain"),
    ("hill-town", "hilltown"),
    ("hilltown", "hilltown"),
    ("hill town", "hilltown"),
    ("forest", "forests"),
    ("forests", "forests"),
    // urban / city / cultural / heritage
    ("urban", "urban"),
    ("urban city", "urban"),
    ("city", "city"),
    ("city tour", "city"),
    ("industrial", "urban"),
    ("cultural", "cultural"),
    ("heritage", "heritage"),
    // others
    ("rural", "rural"),
    ("spiritual", "spiritual"),
    ("temple-town", "temple-town"),
    ("temple town", "temple-town"),
];

const DEFAULT_DISPLAY: &[(&str, &str)] = &[
    ("backwater", "Backwater"),
    ("beach", "Beach"),
    ("city", "City Tour"),
    ("coastal", "Coastal Breeze"),
    ("coastal-city", "Coastal City"),
    ("cultural", "Cultural Heritage"),
    ("desert", "Desert"),
    ("forest", "Forest"),
    ("forests", "Forest"),
    ("heritage", "Heritage Site"),
    ("hill-town", "Hill Town"),
    ("hilltown", "Hill Town"),
    ("industrial", "Industrial Zone"),
    ("mountain", "Mountain"),
    ("pilgrim-town", "Pilgrim Town"),
    ("rural", "Rural Countryside"),
    ("spiritual", "Spiritual Place"),
    ("temple-town", "Temple Town"),
    ("urban", "Urban City"),
];

const DEFAULT_CONTAINERS: &[(&str, &str)] = &[
    ("backwater", "1vST4yfCC7RHFtywLAsULWHZ3GdPmIX5d"),
    ("beach", "1EbnPGTeVtCaKVT6VmWSCc3MDH_esd06a"),
    ("city", "18asMRW6OeTRjTGcKquYkAyUakTfdvgwa"),
    ("coastal-city", "14eyJ1LRP4feBueBjk8eIjwcrn3HaLtRY"),
    ("cultural", "1ZyKQ95kvG0gaDncx7yujEgiHrRhIjI6d"),
    ("forests", "1n70OyFBRdRCr8iRQcQK09VpT2Mq488BE"),
    ("heritage", "1TSV_j-LWIqVJyLildF8TBf4AMJhWgVvR"),
    ("hilltown", "1PgTp06mE-7Tw-dUs4LiMu_Vs_9xCFNyZ"),
    ("hill-town", "1PgTp06mE-7Tw-dUs4LiMu_Vs_9xCFNyZ"),
    ("mountain", "1LNtmW4MB3o2e9Z_fXCpeJ5Esn4Mhd20Y"),
    ("rural", "1Mp1rOF8FEjNz-F90KmxsgHhk6lzxd4oj"),
    ("spiritual", "1wuwW1EgQwIDMPJWO9ZoyFs3ac2aG9I2p"),
    ("temple-town", "1XCIZPvp2XZOziQsXl51O1n8pe0qLtoo5"),
    ("urban", "1cEZ9dq7mR4I4Baj-mozk21pgNAlTqcMk"),
];

/// lower-case, trim, `_` → space
fn clean(label: &str) -> String {
    label.trim().to_lowercase().replace('_', " ").trim().to_string()
}

/// Collapse whitespace runs into single hyphens
fn hyphenate(cleaned: &str) -> String {
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

fn lowercase_keys(entries: HashMap<String, String>) -> impl Iterator<Item = (String, String)> {
    entries.into_iter().map(|(k, v)| (clean(&k), v))
}

/// Alias, display and container tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibeTables {
    aliases: HashMap<String, String>,
    display: HashMap<String, String>,
    containers: HashMap<String, String>,
}

impl Default for VibeTables {
    fn default() -> Self {
        let to_map = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };
        Self {
            aliases: to_map(DEFAULT_ALIASES),
            display: to_map(DEFAULT_DISPLAY),
            containers: to_map(DEFAULT_CONTAINERS),
        }
    }
}

impl VibeTables {
    /// Tables with no entries at all
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
            display: HashMap::new(),
            containers: HashMap::new(),
        }
    }

    /// Merge per-entry overrides on top of the current tables
    ///
    /// Alias and display keys are cleaned (lower-cased, trimmed) on insert.
    pub fn with_overrides(
        mut self,
        aliases: HashMap<String, String>,
        display: HashMap<String, String>,
        containers: HashMap<String, String>,
    ) -> Self {
        self.aliases.extend(lowercase_keys(aliases));
        self.display.extend(lowercase_keys(display));
        self.containers.extend(containers);
        self
    }

    pub fn alias(&self, cleaned: &str) -> Option<&str> {
        self.aliases.get(cleaned).map(String::as_str)
    }

    pub fn display(&self, key: &str) -> Option<&str> {
        self.display.get(key).map(String::as_str)
    }

    /// Container id for a canonical key
    pub fn container_for(&self, canonical_key: &str) -> Option<&str> {
        self.containers.get(canonical_key).map(String::as_str)
    }

    /// Cross-check the tables against each other
    ///
    /// The alias table (query composition) and the container table (content
    /// store) are configured independently; anything present in one but not
    /// reachable through the other is reported rather than silently dropped.
    pub fn audit(&self) -> Vec<TableWarning> {
        let mut warnings = Vec::new();
        let normalizer = VibeNormalizer::new(Arc::new(self.clone()));

        let targets: BTreeSet<&str> = self.aliases.values().map(String::as_str).collect();
        for target in &targets {
            if !self.containers.contains_key(*target) {
                warnings.push(TableWarning::AliasTargetWithoutContainer {
                    target: target.to_string(),
                });
            }
            if !self.display.contains_key(*target) {
                warnings.push(TableWarning::TargetWithoutDisplay {
                    target: target.to_string(),
                });
            }
        }

        let containers: BTreeSet<&str> = self.containers.keys().map(String::as_str).collect();
        for key in containers {
            let resolved = normalizer.normalize(key).key;
            if resolved != key {
                warnings.push(TableWarning::ContainerUnreachable {
                    key: key.to_string(),
                    resolves_to: resolved,
                });
            }
        }

        warnings
    }
}

/// Configuration inconsistency found by [`VibeTables::audit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableWarning {
    /// Labels normalize to `target` but no container holds content for it
    AliasTargetWithoutContainer { target: String },
    /// A container exists for `key` but normalization never produces `key`
    ContainerUnreachable { key: String, resolves_to: String },
    /// Canonical key with no presentation string
    TargetWithoutDisplay { target: String },
}

impl fmt::Display for TableWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableWarning::AliasTargetWithoutContainer { target } => write!(
                f,
                "canonical key '{}' has no content container; content-store lookups will be empty",
                target
            ),
            TableWarning::ContainerUnreachable { key, resolves_to } => write!(
                f,
                "container '{}' is unreachable: the label normalizes to '{}'",
                key, resolves_to
            ),
            TableWarning::TargetWithoutDisplay { target } => write!(
                f,
                "canonical key '{}' has no display string; raw labels will be shown",
                target
            ),
        }
    }
}

/// Log every audit finding at warn level
pub fn log_table_warnings(warnings: &[TableWarning]) {
    for warning in warnings {
        warn!("Vibe table configuration: {}", warning);
    }
}

/// Pure label → canonical vibe mapping over shared tables
#[derive(Debug, Clone)]
pub struct VibeNormalizer {
    tables: Arc<VibeTables>,
}

impl VibeNormalizer {
    pub fn new(tables: Arc<VibeTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &VibeTables {
        &self.tables
    }

    /// Normalize a raw label
    ///
    /// Never fails. Unknown labels become their own (hyphenated) key and keep
    /// the raw label as display string.
    pub fn normalize(&self, label: &str) -> CanonicalVibe {
        let cleaned = clean(label);
        if cleaned.is_empty() {
            return CanonicalVibe {
                key: UNKNOWN_VIBE_KEY.to_string(),
                display: UNKNOWN_VIBE_DISPLAY.to_string(),
            };
        }

        let hyphenated = hyphenate(&cleaned);
        let key = self
            .tables
            .alias(&cleaned)
            .or_else(|| self.tables.alias(&hyphenated))
            .map(str::to_string)
            .unwrap_or(hyphenated);

        let raw_lower = label.trim().to_lowercase();
        let display = self
            .tables
            .display(&key)
            .or_else(|| self.tables.display(&cleaned))
            .or_else(|| self.tables.display(&raw_lower))
            .map(str::to_string)
            .unwrap_or_else(|| label.trim().to_string());

        CanonicalVibe { key, display }
    }

    /// Normalize a label produced by the classifier
    pub fn normalize_label(&self, label: &VibeLabel) -> CanonicalVibe {
        self.normalize(label.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
