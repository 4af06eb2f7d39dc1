// Market data domain
pub mod market;

// Feature layout and model selection
pub mod ml;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
