//! k-nearest-neighbours regression on smartcore's linear-search backend

use super::Regressor;
use super::linear::to_dense;
use crate::domain::errors::PipelineError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::algorithm::neighbour::KNNAlgorithmName;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::distance::euclidian::Euclidian;
use smartcore::metrics::distance::manhattan::Manhattan;
use smartcore::metrics::distance::{Distance, Distances};
use smartcore::neighbors::KNNWeightFunction;
use smartcore::neighbors::knn_regressor::{KNNRegressor, KNNRegressorParameters};
use std::fmt;

type SmartcoreKnn<D> = KNNRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>, D>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub fn all() -> [DistanceMetric; 2] {
        [DistanceMetric::Euclidean, DistanceMetric::Manhattan]
    }
}

/// How neighbour targets are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighbourWeights {
    Uniform,
    /// Inverse distance; exact matches take all the weight
    Distance,
}

impl NeighbourWeights {
    pub fn all() -> [NeighbourWeights; 2] {
        [NeighbourWeights::Uniform, NeighbourWeights::Distance]
    }

    fn weight_function(&self) -> KNNWeightFunction {
        match self {
            NeighbourWeights::Uniform => KNNWeightFunction::Uniform,
            NeighbourWeights::Distance => KNNWeightFunction::Distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnParameters {
    pub k: usize,
    pub weights: NeighbourWeights,
    pub metric: DistanceMetric,
}

impl fmt::Display for KnnParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "k={} weights={:?} metric={:?}",
            self.k, self.weights, self.metric
        )
    }
}

/// The distance type is a generic of the smartcore model, so each metric gets its own variant
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KnnBackend {
    Euclidean(SmartcoreKnn<Euclidian<f64>>),
    Manhattan(SmartcoreKnn<Manhattan<f64>>),
}

#[derive(Serialize, Deserialize)]
pub struct KnnModel {
    pub params: KnnParameters,
    pub n_samples: usize,
    n_features: usize,
    backend: KnnBackend,
}

impl fmt::Debug for KnnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnnModel")
            .field("params", &self.params)
            .field("n_samples", &self.n_samples)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

fn fit_backend<D: Distance<Vec<f64>>>(
    x: &DenseMatrix<f64>,
    y: &[f64],
    params: KnnParameters,
    distance: D,
) -> Result<SmartcoreKnn<D>, PipelineError> {
    let parameters = KNNRegressorParameters::<f64, Euclidian<f64>>::default()
        .with_k(params.k)
        .with_weight(params.weights.weight_function())
        .with_algorithm(KNNAlgorithmName::LinearSearch)
        .with_distance(distance);

    KNNRegressor::fit(x, &y.to_vec(), parameters)
        .map_err(|e| PipelineError::pipeline(format!("kNN fit failed: {}", e)))
}

impl KnnModel {
    /// Indexes the training set; fails when it holds fewer than `k` samples
    pub fn fit(x: &Array2<f64>, y: &[f64], params: KnnParameters) -> Result<Self, PipelineError> {
        if params.k == 0 || x.nrows() < params.k || x.nrows() != y.len() {
            return Err(PipelineError::InsufficientData(format!(
                "kNN with k={} needs at least k samples, got {} rows and {} targets",
                params.k,
                x.nrows(),
                y.len()
            )));
        }

        let matrix = to_dense(x)?;
        let backend = match params.metric {
            DistanceMetric::Euclidean => KnnBackend::Euclidean(fit_backend(
                &matrix,
                y,
                params,
                Distances::euclidian(),
            )?),
            DistanceMetric::Manhattan => KnnBackend::Manhattan(fit_backend(
                &matrix,
                y,
                params,
                Distances::manhattan(),
            )?),
        };

        Ok(Self {
            params,
            n_samples: x.nrows(),
            n_features: x.ncols(),
            backend,
        })
    }
}

impl Regressor for KnnModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::Shape {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let matrix = to_dense(x)?;
        match &self.backend {
            KnnBackend::Euclidean(model) => model.predict(&matrix),
            KnnBackend::Manhattan(model) => model.predict(&matrix),
        }
        .map_err(|e| PipelineError::pipeline(format!("kNN prediction failed: {}", e)))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(k: usize, weights: NeighbourWeights, metric: DistanceMetric) -> KnnParameters {
        KnnParameters { k, weights, metric }
    }

    #[test]
    fn test_uniform_average_of_nearest() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = vec![0.0, 10.0, 20.0, 100.0];
        let model = KnnModel::fit(
            &x,
            &y,
            params(3, NeighbourWeights::Uniform, DistanceMetric::Euclidean),
        )
        .unwrap();

        let pred = model.predict(&array![[1.1]]).unwrap();
        assert!((pred[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weights_favour_exact_match() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [3.0, 3.0]];
        let y = vec![5.0, 7.0, 9.0];
        let model = KnnModel::fit(
            &x,
            &y,
            params(3, NeighbourWeights::Distance, DistanceMetric::Manhattan),
        )
        .unwrap();

        assert_eq!(model.predict(&array![[1.0, 1.0]]).unwrap(), vec![7.0]);

        // Manhattan distances 1 and 1 to the first two points, 5 to the last
        let pred = model.predict(&array![[0.5, 0.5]]).unwrap()[0];
        let expected = (5.0 + 7.0 + 9.0 / 5.0) / (1.0 + 1.0 + 1.0 / 5.0);
        assert!((pred - expected).abs() < 1e-12);
    }

    #[test]
    fn test_metric_changes_the_neighbourhood() {
        // From the origin: Euclidean ranks (2,2) before (3,0), Manhattan the reverse
        let x = array![[3.0, 0.0], [2.0, 2.0]];
        let y = vec![1.0, 2.0];
        let query = array![[0.0, 0.0]];

        for (metric, expected) in [
            (DistanceMetric::Euclidean, 2.0),
            (DistanceMetric::Manhattan, 1.0),
        ] {
            let model =
                KnnModel::fit(&x, &y, params(1, NeighbourWeights::Uniform, metric)).unwrap();
            assert_eq!(model.predict(&query).unwrap(), vec![expected], "{:?}", metric);
        }
    }

    #[test]
    fn test_serialized_model_predicts_the_same() {
        let x = array![[0.0, 1.0], [1.0, 3.0], [2.0, 2.0], [4.0, 0.5]];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let model = KnnModel::fit(
            &x,
            &y,
            params(2, NeighbourWeights::Distance, DistanceMetric::Manhattan),
        )
        .unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: KnnModel = serde_json::from_str(&json).unwrap();

        let query = array![[1.5, 1.5], [3.0, 1.0]];
        assert_eq!(restored.params, model.params);
        assert_eq!(restored.predict(&query).unwrap(), model.predict(&query).unwrap());
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let model = KnnModel::fit(
            &array![[0.0, 1.0], [1.0, 0.0]],
            &[0.0, 1.0],
            params(1, NeighbourWeights::Uniform, DistanceMetric::Euclidean),
        )
        .unwrap();
        assert!(matches!(
            model.predict(&array![[0.0]]),
            Err(PipelineError::Shape {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_k_larger_than_training_set_is_rejected() {
        let x = array![[0.0], [1.0]];
        let result = KnnModel::fit(
            &x,
            &[0.0, 1.0],
            params(3, NeighbourWeights::Uniform, DistanceMetric::Euclidean),
        );
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }
}
