//! Chronological cross-validation and the kNN hyper-parameter search

use crate::application::ml::regressors::{
    DistanceMetric, KnnModel, KnnParameters, NeighbourWeights, Regressor,
};
use crate::domain::errors::PipelineError;
use ndarray::{Array2, Axis};
use tracing::{debug, info};

/// One fold: train on `[0, test_start)`, validate on `[test_start, test_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesFold {
    pub test_start: usize,
    pub test_end: usize,
}

/// Expanding-window splitter; validation blocks never precede their training rows
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSplit {
    pub n_splits: usize,
}

impl Default for TimeSeriesSplit {
    fn default() -> Self {
        Self { n_splits: 5 }
    }
}

impl TimeSeriesSplit {
    /// Folds for `n_samples` rows, each validation block `n / (splits + 1)` long.
    ///
    /// The number of splits shrinks for short series; fewer than 2 samples is an error.
    pub fn folds(&self, n_samples: usize) -> Result<Vec<TimeSeriesFold>, PipelineError> {
        if n_samples < 2 {
            return Err(PipelineError::InsufficientData(format!(
                "time-series cross-validation needs at least 2 samples, got {}",
                n_samples
            )));
        }

        let n_splits = self.n_splits.clamp(1, n_samples - 1);
        let test_size = n_samples / (n_splits + 1);
        let first_test = n_samples - n_splits * test_size;

        Ok((0..n_splits)
            .map(|i| {
                let test_start = first_test + i * test_size;
                TimeSeriesFold {
                    test_start,
                    test_end: test_start + test_size,
                }
            })
            .collect())
    }
}

/// Grid search over k, weighting and metric, scored by mean absolute error
pub struct KnnGridSearch {
    pub neighbours: Vec<usize>,
    pub splitter: TimeSeriesSplit,
}

impl Default for KnnGridSearch {
    fn default() -> Self {
        Self {
            neighbours: vec![3, 5, 7, 9, 11, 15],
            splitter: TimeSeriesSplit::default(),
        }
    }
}

fn mean_absolute_error(pred: &[f64], truth: &[f64]) -> f64 {
    pred.iter()
        .zip(truth)
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / truth.len().max(1) as f64
}

impl KnnGridSearch {
    pub fn candidates(&self) -> Vec<KnnParameters> {
        let mut out = Vec::new();
        for &k in &self.neighbours {
            for weights in NeighbourWeights::all() {
                for metric in DistanceMetric::all() {
                    out.push(KnnParameters { k, weights, metric });
                }
            }
        }
        out
    }

    /// Mean validation MAE of `params` over the folds, or `None` if any fold is too small for k
    fn score(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        folds: &[TimeSeriesFold],
        params: KnnParameters,
    ) -> Result<Option<f64>, PipelineError> {
        let mut total = 0.0;
        for fold in folds {
            if fold.test_start < params.k {
                return Ok(None);
            }
            let train_rows: Vec<usize> = (0..fold.test_start).collect();
            let test_rows: Vec<usize> = (fold.test_start..fold.test_end).collect();

            let model = KnnModel::fit(
                &x.select(Axis(0), &train_rows),
                &y[..fold.test_start],
                params,
            )?;
            let pred = model.predict(&x.select(Axis(0), &test_rows))?;
            total += mean_absolute_error(&pred, &y[fold.test_start..fold.test_end]);
        }
        Ok(Some(total / folds.len() as f64))
    }

    /// Picks the candidate with the lowest cross-validated MAE and refits it on all rows
    pub fn fit(&self, x: &Array2<f64>, y: &[f64]) -> Result<KnnModel, PipelineError> {
        let folds = self.splitter.folds(x.nrows())?;

        let mut best: Option<(KnnParameters, f64)> = None;
        for params in self.candidates() {
            let Some(mae) = self.score(x, y, &folds, params)? else {
                debug!("KnnGridSearch: skipping {} (too few rows)", params);
                continue;
            };
            debug!("KnnGridSearch: {} -> MAE {:.6}", params, mae);
            if best.is_none_or(|(_, best_mae)| mae < best_mae) {
                best = Some((params, mae));
            }
        }

        let (params, mae) = best.ok_or_else(|| {
            PipelineError::InsufficientData(format!(
                "no kNN candidate fits {} samples across {} folds",
                x.nrows(),
                folds.len()
            ))
        })?;

        info!("KnnGridSearch: best {} (CV MAE {:.6})", params, mae);
        KnnModel::fit(x, y, params)
    }
}
