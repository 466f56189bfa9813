// Export modules for library usage
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod enrich;
pub mod io;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use crate::classify::{Classifier, CLASSIFIER_VERSION};
pub use crate::config::{ClassificationConfig, RuleSet, Settings};
pub use crate::core::{
    ChangeType, ChangedFile, ClassificationResult, ComplexityLevel, ConfidenceBand, Error,
    FeatureVector, InfraSignalLevel, MergeRequestSnapshot, Result, ReviewReason,
};
pub use crate::storage::Database;
