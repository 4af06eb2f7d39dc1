// Raw feed normalization, frame loading and resampling
pub mod market_data;

// Features, regressors, training and inference
pub mod ml;

// Update / inference orchestration
pub mod worker;
