//! Raw feed normalization
//!
//! Merges every raw fragment a provider has stored for a token into the single
//! canonical price table. The provider-specific parsing lives behind
//! [`RawFeedAdapter`]; this module only decides when to rebuild and how
//! fragments are combined.

use crate::domain::errors::PipelineError;
use crate::domain::market::PriceTable;
use crate::domain::ports::{ArtifactStore, RawFeedAdapter};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one normalization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// Nothing new and no rebuild requested
    UpToDate,
    /// No fragment yielded a valid row; nothing was written
    NoData { fragments: usize },
    Written { fragments: usize, rows: usize },
}

pub struct RawFeedNormalizer {
    adapter: Arc<dyn RawFeedAdapter>,
    store: Arc<dyn ArtifactStore>,
}

impl RawFeedNormalizer {
    pub fn new(adapter: Arc<dyn RawFeedAdapter>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { adapter, store }
    }

    /// Rebuilds the canonical table for `token` from all stored fragments.
    ///
    /// With `force_update` the existing table is deleted first, before any
    /// fragment is read, so a failed or empty rebuild never leaves a stale
    /// table behind.
    pub fn normalize(
        &self,
        token: &str,
        new_fragments: &[String],
        force_update: bool,
    ) -> Result<NormalizeOutcome, PipelineError> {
        if new_fragments.is_empty() && !force_update {
            info!("RawFeedNormalizer: {} already up to date", token);
            return Ok(NormalizeOutcome::UpToDate);
        }

        if force_update && self.store.remove_price_table(token)? {
            info!("RawFeedNormalizer: removed stale canonical table for {}", token);
        }

        let mut fragments = self.adapter.list_fragments(token)?;
        fragments.sort();
        fragments.dedup();

        if fragments.is_empty() {
            info!(
                "RawFeedNormalizer: no {} fragments to process for {}",
                self.adapter.provider(),
                token
            );
            return Ok(NormalizeOutcome::NoData { fragments: 0 });
        }

        let mut rows = Vec::new();
        for fragment in &fragments {
            let fragment_rows = self.adapter.normalize(fragment)?;
            debug!(
                "RawFeedNormalizer: {} -> {} rows",
                fragment,
                fragment_rows.len()
            );
            rows.extend(fragment_rows);
        }

        if rows.is_empty() {
            info!(
                "RawFeedNormalizer: no valid {} rows in {} fragments",
                self.adapter.provider(),
                fragments.len()
            );
            return Ok(NormalizeOutcome::NoData {
                fragments: fragments.len(),
            });
        }

        let table = PriceTable::from_rows(rows);
        self.store.write_price_table(token, &table)?;

        info!(
            "RawFeedNormalizer: saved {} {} rows for {} from {} fragments",
            table.len(),
            self.adapter.provider(),
            token,
            fragments.len()
        );

        Ok(NormalizeOutcome::Written {
            fragments: fragments.len(),
            rows: table.len(),
        })
    }
}
