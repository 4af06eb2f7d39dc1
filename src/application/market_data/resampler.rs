use crate::domain::market::{PriceRow, PriceTable, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Buckets keyed by their distance from the anchor: index 0 is the newest
/// bucket and index `k` ends exactly `k` widths before it.
pub type IndexedBuckets = BTreeMap<i64, (DateTime<Utc>, Vec<f64>)>;

/// Aggregates observations into fixed-width buckets by mean
///
/// Buckets are right-labeled and right-closed: the bucket labeled `t` holds
/// observations in `(t - width, t]`. Labels are anchored at the latest
/// observation, so the newest bucket always ends exactly at the newest row.
/// Buckets without observations are not emitted.
pub struct Resampler {
    width_ms: i64,
}

impl Resampler {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            width_ms: timeframe.to_millis(),
        }
    }

    pub fn resample(&self, table: &PriceTable) -> PriceTable {
        let rows = self
            .resample_series(&ohlc_series(table))
            .into_iter()
            .map(|(ts, v)| PriceRow::new(ts, v[0], v[1], v[2], v[3]))
            .collect();

        PriceTable::from_rows(rows)
    }

    /// Resamples any multi-column series, oldest bucket first.
    pub fn resample_series(
        &self,
        series: &[(DateTime<Utc>, Vec<f64>)],
    ) -> Vec<(DateTime<Utc>, Vec<f64>)> {
        self.resample_indexed(series).into_values().rev().collect()
    }

    /// Resamples a series sorted ascending by timestamp, keeping each bucket's anchor offset.
    ///
    /// NaN cells are skipped in a column's mean; a column with no finite cell in a bucket yields NaN.
    /// Index gaps mark stretches of time with no observations.
    pub fn resample_indexed(&self, series: &[(DateTime<Utc>, Vec<f64>)]) -> IndexedBuckets {
        let Some((anchor, _)) = series.last() else {
            return IndexedBuckets::new();
        };
        let anchor_ms = anchor.timestamp_millis();
        let width = series.first().map(|(_, v)| v.len()).unwrap_or(0);

        // bucket index counted backwards from the anchor -> (sums, counts)
        let mut sums_by_index: BTreeMap<i64, (Vec<f64>, Vec<usize>)> = BTreeMap::new();
        for (ts, values) in series {
            let offset = anchor_ms - ts.timestamp_millis();
            let index = offset.div_euclid(self.width_ms);
            let (sums, counts) = sums_by_index
                .entry(index)
                .or_insert_with(|| (vec![0.0; width], vec![0; width]));
            for (col, value) in values.iter().enumerate().take(width) {
                if value.is_finite() {
                    sums[col] += value;
                    counts[col] += 1;
                }
            }
        }

        sums_by_index
            .into_iter()
            .filter_map(|(index, (sums, counts))| {
                let label = DateTime::from_timestamp_millis(anchor_ms - index * self.width_ms)?;
                let means = sums
                    .iter()
                    .zip(counts.iter())
                    .map(|(s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
                    .collect();
                Some((index, (label, means)))
            })
            .collect()
    }
}

/// OHLC columns of a price table as a generic series
pub fn ohlc_series(table: &PriceTable) -> Vec<(DateTime<Utc>, Vec<f64>)> {
    table
        .rows()
        .iter()
        .map(|r| (r.timestamp, r.ohlc().to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn minute_table(n: i64, start: DateTime<Utc>) -> PriceTable {
        PriceTable::from_rows(
            (0..n)
                .map(|i| {
                    let p = i as f64;
                    PriceRow::new(start + Duration::minutes(i), p, p + 1.0, p - 1.0, p)
                })
                .collect(),
        )
    }

    #[test]
    fn test_latest_bucket_is_anchored_at_latest_row() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 0).unwrap();
        let table = minute_table(150, start);
        let resampled = Resampler::new(Timeframe::OneHour).resample(&table);

        assert_eq!(resampled.last_timestamp(), table.last_timestamp());
        // 150 minutes -> buckets of 60, 60 and 30 observations
        assert_eq!(resampled.len(), 3);
    }

    #[test]
    fn test_buckets_are_right_closed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // Rows at 00:00 .. 00:10, anchor 00:10, 5-minute buckets
        let table = minute_table(11, start);
        let resampled = Resampler::new(Timeframe::FiveMin).resample(&table);
        let rows = resampled.rows();

        assert_eq!(rows.len(), 3);
        // (23:55, 00:00] holds only the 00:00 row
        assert_eq!(rows[0].timestamp, start);
        assert_eq!(rows[0].close, 0.0);
        // (00:00, 00:05] holds 1..=5
        assert_eq!(rows[1].timestamp, start + Duration::minutes(5));
        assert_eq!(rows[1].close, 3.0);
        // (00:05, 00:10] holds 6..=10
        assert_eq!(rows[2].close, 8.0);
        assert_eq!(rows[2].high, 9.0);
    }

    #[test]
    fn test_every_observation_lies_within_its_bucket() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 3, 0).unwrap();
        let table = minute_table(97, start);
        let resampler = Resampler::new(Timeframe::FifteenMin);
        let width = Timeframe::FifteenMin.to_chrono();
        let resampled = resampler.resample(&table);

        let total: usize = resampled
            .rows()
            .iter()
            .map(|bucket| {
                table
                    .rows()
                    .iter()
                    .filter(|r| r.timestamp > bucket.timestamp - width && r.timestamp <= bucket.timestamp)
                    .count()
            })
            .sum();
        assert_eq!(total, table.len());
    }

    #[test]
    fn test_gaps_produce_no_empty_buckets() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let table = PriceTable::from_rows(vec![
            PriceRow::new(start, 1.0, 1.0, 1.0, 1.0),
            PriceRow::new(start + Duration::hours(5), 2.0, 2.0, 2.0, 2.0),
        ]);

        let resampled = Resampler::new(Timeframe::OneHour).resample(&table);
        assert_eq!(resampled.len(), 2);
        assert!(resampled.rows().iter().all(|r| r.is_complete()));
    }

    #[test]
    fn test_indexed_buckets_keep_their_distance_across_gaps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let table = PriceTable::from_rows(vec![
            PriceRow::new(start, 1.0, 1.0, 1.0, 1.0),
            PriceRow::new(start + Duration::hours(1), 2.0, 2.0, 2.0, 2.0),
            PriceRow::new(start + Duration::hours(5), 3.0, 3.0, 3.0, 3.0),
        ]);

        let buckets = Resampler::new(Timeframe::OneHour).resample_indexed(&ohlc_series(&table));
        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![0, 4, 5]);
        assert_eq!(buckets[&0].0, start + Duration::hours(5));
        assert_eq!(buckets[&4].0, start + Duration::hours(1));
        assert_eq!(buckets[&5].1[3], 1.0);
    }

    #[test]
    fn test_empty_table() {
        let resampled = Resampler::new(Timeframe::OneHour).resample(&PriceTable::default());
        assert!(resampled.is_empty());
    }
}
