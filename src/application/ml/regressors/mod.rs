pub mod bayesian_ridge;
pub mod kernel_ridge;
pub mod knn;
pub mod linear;
pub mod svr;

pub use bayesian_ridge::BayesianRidgeModel;
pub use kernel_ridge::KernelRidgeModel;
pub use knn::{DistanceMetric, KnnModel, KnnParameters, NeighbourWeights};
pub use linear::OlsModel;
pub use svr::SvrModel;

use crate::application::ml::model_search::KnnGridSearch;
use crate::domain::errors::PipelineError;
use crate::domain::ml::ModelKind;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A fitted regressor mapping feature rows to a predicted next close
pub trait Regressor: Send + Sync {
    /// One prediction per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError>;

    fn n_features(&self) -> usize;
}

/// Every fitted model the worker can persist, one variant per [`ModelKind`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedEstimator {
    LinearRegression(OlsModel),
    Svr(SvrModel),
    KernelRidge(KernelRidgeModel),
    BayesianRidge(BayesianRidgeModel),
    Knn(KnnModel),
}

impl FittedEstimator {
    /// Fits the strategy for `kind` with its default hyper-parameters.
    ///
    /// `Knn` runs a chronological grid search and refits the best candidate.
    pub fn fit(kind: ModelKind, x: &Array2<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        Ok(match kind {
            ModelKind::LinearRegression => FittedEstimator::LinearRegression(OlsModel::fit(x, y)?),
            ModelKind::Svr => FittedEstimator::Svr(SvrModel::fit(x, y)?),
            ModelKind::KernelRidge => FittedEstimator::KernelRidge(KernelRidgeModel::fit(x, y)?),
            ModelKind::BayesianRidge => {
                FittedEstimator::BayesianRidge(BayesianRidgeModel::fit(x, y)?)
            }
            ModelKind::Knn => FittedEstimator::Knn(KnnGridSearch::default().fit(x, y)?),
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            FittedEstimator::LinearRegression(_) => ModelKind::LinearRegression,
            FittedEstimator::Svr(_) => ModelKind::Svr,
            FittedEstimator::KernelRidge(_) => ModelKind::KernelRidge,
            FittedEstimator::BayesianRidge(_) => ModelKind::BayesianRidge,
            FittedEstimator::Knn(_) => ModelKind::Knn,
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            FittedEstimator::LinearRegression(m) => m,
            FittedEstimator::Svr(m) => m,
            FittedEstimator::KernelRidge(m) => m,
            FittedEstimator::BayesianRidge(m) => m,
            FittedEstimator::Knn(m) => m,
        }
    }
}

impl Regressor for FittedEstimator {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        self.as_regressor().predict(x)
    }

    fn n_features(&self) -> usize {
        self.as_regressor().n_features()
    }
}
