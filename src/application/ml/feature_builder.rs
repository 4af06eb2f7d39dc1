//! Feature construction shared by training and inference
//!
//! Both paths call [`FeatureBuilder::build`] with the layout stored in the
//! model artifact, so column order and count are identical by construction.

use crate::application::market_data::resampler::ohlc_series;
use crate::application::market_data::{IndexedBuckets, Resampler};
use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceTable, Timeframe};
use crate::domain::ml::{FeatureFrame, FeatureLayout};
use chrono::{DateTime, Timelike, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Loaded (not yet resampled) price history for the tokens a layout needs
#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    pub primary: PriceTable,
    pub reference: Option<PriceTable>,
}

impl MarketHistory {
    pub fn single(primary: PriceTable) -> Self {
        Self {
            primary,
            reference: None,
        }
    }

    pub fn paired(primary: PriceTable, reference: PriceTable) -> Self {
        Self {
            primary,
            reference: Some(reference),
        }
    }
}

pub struct FeatureBuilder {
    layout: FeatureLayout,
    resampler: Resampler,
}

impl FeatureBuilder {
    pub fn new(layout: FeatureLayout, timeframe: Timeframe) -> Self {
        Self {
            layout,
            resampler: Resampler::new(timeframe),
        }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Resamples the history and emits one feature row per complete bucket.
    ///
    /// Row `t` targets the close of the bucket ending one width after `t`; the
    /// target is missing when that bucket is empty, and the newest row never has one.
    pub fn build(&self, history: &MarketHistory) -> Result<FeatureFrame, PipelineError> {
        let frame = match &self.layout {
            FeatureLayout::Simple => self.build_simple(&history.primary),
            FeatureLayout::Lagged { lag_depth, .. } => {
                let reference = history.reference.as_ref().ok_or_else(|| {
                    PipelineError::pipeline("lagged features need a reference price history")
                })?;
                self.build_lagged(&history.primary, reference, *lag_depth)
            }
        };

        debug!(
            "FeatureBuilder: {} rows x {} features",
            frame.len(),
            frame.width()
        );
        Ok(frame)
    }

    fn build_simple(&self, table: &PriceTable) -> FeatureFrame {
        let buckets = self.resampler.resample_indexed(&ohlc_series(table));

        let mut frame = self.empty_frame();
        for (&index, (label, values)) in buckets.iter().rev() {
            frame.timestamps.push(*label);
            frame.rows.push(values.clone());
            frame.targets.push(next_close(&buckets, index));
        }
        frame
    }

    fn build_lagged(
        &self,
        primary: &PriceTable,
        reference: &PriceTable,
        lag_depth: usize,
    ) -> FeatureFrame {
        let joined = join_on_timestamp(primary, reference);
        let buckets: IndexedBuckets = self
            .resampler
            .resample_indexed(&joined)
            .into_iter()
            .filter(|(_, (_, v))| v.iter().all(|x| x.is_finite()))
            .collect();

        let mut frame = self.empty_frame();
        for (&index, (label, _)) in buckets.iter().rev() {
            // Lag k is the bucket k widths older; rows missing any lag are skipped
            let lagged: Option<Vec<&Vec<f64>>> = (1..=lag_depth as i64)
                .map(|lag| buckets.get(&(index + lag)).map(|(_, v)| v))
                .collect();
            let Some(lagged) = lagged else {
                continue;
            };

            let mut features = Vec::with_capacity(self.layout.width());
            for asset in 0..2 {
                for field in 0..4 {
                    features.extend(lagged.iter().map(|values| values[asset * 4 + field]));
                }
            }
            features.push(label.hour() as f64);

            frame.timestamps.push(*label);
            frame.rows.push(features);
            frame.targets.push(next_close(&buckets, index));
        }
        frame
    }

    fn empty_frame(&self) -> FeatureFrame {
        FeatureFrame {
            feature_names: self.layout.feature_names(),
            target_name: self.layout.target_name(),
            ..Default::default()
        }
    }
}

/// Primary close (column 3) of the bucket one width newer, if it holds observations
fn next_close(buckets: &IndexedBuckets, index: i64) -> Option<f64> {
    buckets
        .get(&(index - 1))
        .map(|(_, values)| values[3])
        .filter(|close| close.is_finite())
}

/// Inner join of two price tables on identical timestamps: primary OHLC then reference OHLC
fn join_on_timestamp(
    primary: &PriceTable,
    reference: &PriceTable,
) -> Vec<(DateTime<Utc>, Vec<f64>)> {
    let reference_by_ts: BTreeMap<DateTime<Utc>, [f64; 4]> = reference
        .rows()
        .iter()
        .map(|r| (r.timestamp, r.ohlc()))
        .collect();

    primary
        .rows()
        .iter()
        .filter_map(|r| {
            let other = reference_by_ts.get(&r.timestamp)?;
            let mut values = r.ohlc().to_vec();
            values.extend_from_slice(other);
            Some((r.timestamp, values))
        })
        .collect()
}
