use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    Svr,
    KernelRidge,
    BayesianRidge,
    /// k-nearest-neighbours with time-series grid search; trains on lagged multi-asset features
    Knn,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 5] {
        [
            ModelKind::LinearRegression,
            ModelKind::Svr,
            ModelKind::KernelRidge,
            ModelKind::BayesianRidge,
            ModelKind::Knn,
        ]
    }

    /// Whether features are standardized before fitting (and the scaler persisted)
    pub fn uses_scaler(&self) -> bool {
        matches!(self, ModelKind::Knn)
    }

    /// Whether this strategy trains on the lagged multi-asset layout
    pub fn uses_lagged_features(&self) -> bool {
        matches!(self, ModelKind::Knn)
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linearregression" | "linear" | "ols" => Ok(ModelKind::LinearRegression),
            "svr" => Ok(ModelKind::Svr),
            "kernelridge" => Ok(ModelKind::KernelRidge),
            "bayesianridge" => Ok(ModelKind::BayesianRidge),
            "knn" => Ok(ModelKind::Knn),
            _ => Err(PipelineError::Configuration(format!(
                "Unsupported model: {}. Must be one of LinearRegression, SVR, KernelRidge, BayesianRidge, kNN",
                s
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::Svr => "SVR",
            ModelKind::KernelRidge => "KernelRidge",
            ModelKind::BayesianRidge => "BayesianRidge",
            ModelKind::Knn => "kNN",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!(
            ModelKind::from_str("LinearRegression").unwrap(),
            ModelKind::LinearRegression
        );
        assert_eq!(ModelKind::from_str("SVR").unwrap(), ModelKind::Svr);
        assert_eq!(ModelKind::from_str("kNN").unwrap(), ModelKind::Knn);
        assert_eq!(
            ModelKind::from_str("bayesianridge").unwrap(),
            ModelKind::BayesianRidge
        );
    }

    #[test]
    fn test_unknown_model_is_configuration_error() {
        let err = ModelKind::from_str("RandomForest").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_display_roundtrip() {
        for kind in ModelKind::all() {
            assert_eq!(ModelKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_only_knn_is_scaled() {
        assert!(ModelKind::Knn.uses_scaler());
        assert!(!ModelKind::Svr.uses_scaler());
        assert!(!ModelKind::LinearRegression.uses_lagged_features());
    }
}
