//! Concurrent fan-out and merge
//!
//! Every spec runs on its own tokio task bounded by the per-fetch timeout.
//! Outputs are buffered and replayed in planned order before deduplication, so
//! completion order never changes the result: the first variant (in planned
//! order) to produce an id keeps it.

use crate::sources::SourceFetcher;
use crate::types::{AggregatedResult, AggregationOutcome, FetchFailure, QuerySpec, ResultRecord, VariantGroup};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity for records whose source supplied no id
///
/// Hex SHA-256 over title, secondary text and link, separated by a unit
/// separator so field boundaries can't collide.
pub fn synthesize_id(record: &ResultRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(record.secondary_text.as_bytes());
    hasher.update([0x1f]);
    hasher.update(record.external_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fan-out executor
#[derive(Debug, Clone)]
pub struct Aggregator {
    fetch_timeout: Duration,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl Aggregator {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Run all specs concurrently and merge their records
    ///
    /// A spec that fails, times out, or whose worker panics contributes
    /// nothing and is reported in `failures`. There is no overall deadline;
    /// total latency is bounded by the slowest spec's timeout.
    pub async fn aggregate(
        &self,
        specs: &[QuerySpec],
        fetcher: Arc<dyn SourceFetcher>,
    ) -> AggregationOutcome {
        let started = Instant::now();
        let source = fetcher.name();

        let handles: Vec<_> = specs
            .iter()
            .cloned()
            .map(|spec| {
                let fetcher = Arc::clone(&fetcher);
                let timeout = self.fetch_timeout;
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, fetcher.fetch(&spec)).await {
                        Ok(Ok(records)) => Ok(records),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("timed out after {:?}", timeout)),
                    }
                })
            })
            .collect();

        // join_all preserves input order, which is planned order
        let outputs = join_all(handles).await;

        let mut failures = Vec::new();
        let mut buffered: Vec<(&QuerySpec, Vec<ResultRecord>)> = Vec::with_capacity(specs.len());

        for (spec, output) in specs.iter().zip(outputs) {
            let outcome = match output {
                Ok(result) => result,
                Err(join_error) => Err(format!("worker failed: {}", join_error)),
            };
            match outcome {
                Ok(records) => {
                    debug!(
                        source = source,
                        variant = spec.variant_label(),
                        records = records.len(),
                        "Fetch complete"
                    );
                    buffered.push((spec, records));
                }
                Err(reason) => {
                    warn!(
                        source = source,
                        variant = spec.variant_label(),
                        query = %spec.query,
                        reason = %reason,
                        "Fetch failed (variant contributes nothing)"
                    );
                    failures.push(FetchFailure {
                        variant: spec.variant_label().to_string(),
                        query: spec.query.clone(),
                        reason,
                    });
                }
            }
        }

        let result = merge(buffered);

        info!(
            source = source,
            specs = specs.len(),
            records = result.len(),
            groups = result.groups.len(),
            failures = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation complete"
        );

        AggregationOutcome {
            result,
            failures,
            attempted: specs.len(),
        }
    }
}

/// First-seen dedup over per-spec outputs already in planned order
fn merge(buffered: Vec<(&QuerySpec, Vec<ResultRecord>)>) -> AggregatedResult {
    let mut seen: HashSet<String> = HashSet::new();
    let mut groups: Vec<VariantGroup> = Vec::new();
    let mut flat: Vec<ResultRecord> = Vec::new();

    for (spec, records) in buffered {
        let variant = spec.variant_label();
        for mut record in records {
            if record.id.is_empty() {
                record.id = synthesize_id(&record);
            }
            if !seen.insert(record.id.clone()) {
                continue;
            }
            record.variant = variant.to_string();

            match groups.iter_mut().find(|g| g.variant == variant) {
                Some(group) => group.records.push(record.clone()),
                None => groups.push(VariantGroup {
                    variant: variant.to_string(),
                    records: vec![record.clone()],
                }),
            }
            flat.push(record);
        }
    }

    AggregatedResult {
        groups,
        records: flat,
    }
}

// ============================================================================
// Tests
// ============================================================================
