//! Query planning
//!
//! Turns a canonical vibe plus requested variants into the concrete
//! `QuerySpec`s the aggregator fans out. Variant order here is the order the
//! aggregator merges in, so it decides which variant keeps a duplicate.

use crate::error::{VibeError, VibeResult};
use crate::types::{CanonicalVibe, CatalogKind, QuerySpec, ALL_VARIANTS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default supported variants, in priority order
pub const DEFAULT_VARIANTS: &[&str] = &["English", "Hindi", "Malayalam", "Tamil"];

/// Default upper bound for per-variant limits
pub const DEFAULT_MAX_LIMIT: u32 = 50;

/// How query text is composed for one intent
///
/// Query text = key tokens + variant token (if any) + `keyword`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryComposition {
    /// Trailing keyword distinguishing playlist-style from track-style intents
    pub keyword: String,
    /// Catalog kind requested from search-backed sources
    pub kind: CatalogKind,
}

impl QueryComposition {
    /// Playlist intent ("... music")
    pub fn playlist() -> Self {
        Self {
            keyword: "music".to_string(),
            kind: CatalogKind::Playlist,
        }
    }

    /// Track intent ("... song")
    pub fn track() -> Self {
        Self {
            keyword: "song".to_string(),
            kind: CatalogKind::Track,
        }
    }
}

impl Default for QueryComposition {
    fn default() -> Self {
        Self::playlist()
    }
}

/// Builds query specs for a vibe
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    supported_variants: Vec<String>,
    max_limit: u32,
    composition: QueryComposition,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(
            DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            DEFAULT_MAX_LIMIT,
        )
    }
}

impl QueryPlanner {
    /// Create a planner
    ///
    /// `supported_variants` is the declared priority list "all" expands to.
    /// `max_limit` is raised to 1 if given as 0.
    pub fn new(supported_variants: Vec<String>, max_limit: u32) -> Self {
        Self {
            supported_variants,
            max_limit: max_limit.max(1),
            composition: QueryComposition::default(),
        }
    }

    /// Replace the default composition used by [`QueryPlanner::plan`]
    pub fn with_composition(mut self, composition: QueryComposition) -> Self {
        self.composition = composition;
        self
    }

    pub fn supported_variants(&self) -> &[String] {
        &self.supported_variants
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    /// Plan with the planner's default composition
    pub fn plan(
        &self,
        vibe: &CanonicalVibe,
        variants: &[String],
        limit_per_variant: i64,
    ) -> VibeResult<Vec<QuerySpec>> {
        self.plan_with(vibe, variants, limit_per_variant, &self.composition)
    }

    /// Plan with an explicit composition
    ///
    /// - any "all" (case-insensitive) expands to every supported variant
    /// - otherwise one spec per distinct requested variant, in request order
    /// - no variants at all yields a single spec without a variant
    pub fn plan_with(
        &self,
        vibe: &CanonicalVibe,
        variants: &[String],
        limit_per_variant: i64,
        composition: &QueryComposition,
    ) -> VibeResult<Vec<QuerySpec>> {
        let limit = self.clamp_limit(limit_per_variant)?;

        let requested: Vec<&str> = variants
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        let expanded: Vec<&str> = if requested
            .iter()
            .any(|v| v.eq_ignore_ascii_case(ALL_VARIANTS))
        {
            self.supported_variants.iter().map(String::as_str).collect()
        } else {
            requested
        };

        let mut chosen: Vec<&str> = Vec::with_capacity(expanded.len());
        for variant in expanded {
            if !chosen.iter().any(|c| c.eq_ignore_ascii_case(variant)) {
                chosen.push(variant);
            }
        }

        let specs: Vec<QuerySpec> = if chosen.is_empty() {
            vec![self.spec(vibe, None, limit, composition)]
        } else {
            chosen
                .into_iter()
                .map(|v| self.spec(vibe, Some(v), limit, composition))
                .collect()
        };

        debug!(
            vibe = %vibe.key,
            specs = specs.len(),
            limit = limit,
            kind = composition.kind.as_str(),
            "Planned queries"
        );

        Ok(specs)
    }

    fn clamp_limit(&self, requested: i64) -> VibeResult<u32> {
        if requested <= 0 {
            return Err(VibeError::InvalidLimit(requested));
        }
        let limit = requested.min(self.max_limit as i64) as u32;
        if (limit as i64) < requested {
            debug!(
                requested = requested,
                clamped = limit,
                "Per-variant limit clamped to configured maximum"
            );
        }
        Ok(limit)
    }

    fn spec(
        &self,
        vibe: &CanonicalVibe,
        variant: Option<&str>,
        limit: u32,
        composition: &QueryComposition,
    ) -> QuerySpec {
        QuerySpec {
            canonical_key: vibe.key.clone(),
            variant: variant.map(str::to_string),
            limit,
            query: compose_query(&vibe.key, variant, composition),
            kind: composition.kind,
        }
    }
}

/// Compose search text: key tokens, variant token, trailing keyword
pub fn compose_query(
    canonical_key: &str,
    variant: Option<&str>,
    composition: &QueryComposition,
) -> String {
    let mut tokens: Vec<&str> = canonical_key
        .split('-')
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(v) = variant {
        if !v.eq_ignore_ascii_case(ALL_VARIANTS) {
            tokens.push(v);
        }
    }

    let keyword = composition.keyword.trim();
    if !keyword.is_empty() {
        tokens.push(keyword);
    }

    tokens.join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn beach() -> CanonicalVibe {
        CanonicalVibe {
            key: "beach".into(),
            display: "Beach".into(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_one_spec_per_variant_in_request_order() {
        let planner = QueryPlanner::default();
        let specs = planner.plan(&beach(), &strings(&["Hindi", "English"]), 2).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].variant.as_deref(), Some("Hindi"));
        assert_eq!(specs[0].query, "beach Hindi music");
        assert_eq!(specs[0].limit, 2);
        assert_eq!(specs[1].variant.as_deref(), Some("English"));
        assert_eq!(specs[1].query, "beach English music");
    }

    #[test]
    fn test_all_expands_to_supported_variants() {
        let planner = QueryPlanner::new(strings(&["English", "Hindi", "Tamil"]), 50);
        let specs = planner.plan(&beach(), &strings(&["Hindi", "All"]), 5).unwrap();

        let variants: Vec<_> = specs.iter().map(|s| s.variant.clone().unwrap()).collect();
        assert_eq!(variants, strings(&["English", "Hindi", "Tamil"]));
        assert!(specs.iter().all(|s| !s.query.to_lowercase().contains(" all ")));
    }

    #[test]
    fn test_no_variants_yields_single_unfiltered_spec() {
        let specs = QueryPlanner::default().plan(&beach(), &[], 5).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].variant, None);
        assert_eq!(specs[0].query, "beach music");
    }

    #[test]
    fn test_repeated_variants_collapse() {
        let specs = QueryPlanner::default()
            .plan(&beach(), &strings(&["Hindi", " hindi ", "English", ""]), 5)
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].variant.as_deref(), Some("Hindi"));
        assert_eq!(specs[1].variant.as_deref(), Some("English"));
    }

    #[test]
    fn test_limit_zero_and_negative_rejected() {
        let planner = QueryPlanner::default();
        assert_eq!(
            planner.plan(&beach(), &strings(&["Hindi"]), 0),
            Err(VibeError::InvalidLimit(0))
        );
        assert_eq!(
            planner.plan(&beach(), &strings(&["Hindi"]), -3),
            Err(VibeError::InvalidLimit(-3))
        );
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let planner = QueryPlanner::new(strings(&["English"]), 50);
        let specs = planner.plan(&beach(), &strings(&["English"]), 500).unwrap();
        assert_eq!(specs[0].limit, 50);
    }

    #[test]
    fn test_track_composition() {
        let vibe = CanonicalVibe {
            key: "coastal-city".into(),
            display: "Coastal City".into(),
        };
        let specs = QueryPlanner::default()
            .plan_with(&vibe, &strings(&["Tamil"]), 3, &QueryComposition::track())
            .unwrap();
        assert_eq!(specs[0].query, "coastal city Tamil song");
        assert_eq!(specs[0].kind, CatalogKind::Track);
    }

    #[test]
    fn test_compose_query_omits_sentinel_and_empty_keyword() {
        let composition = QueryComposition {
            keyword: "  ".into(),
            kind: CatalogKind::Playlist,
        };
        assert_eq!(compose_query("temple-town", Some("all"), &composition), "temple town");
    }
}
