pub mod errors;
pub mod types;

pub use errors::{Error, Result};
pub use types::{
    BaseTypeOutcome, Certainty, ChangeType, ChangedFile, ClassificationResult, ComplexityBreakdown,
    ComplexityComponent, ComplexityLevel, ConfidenceBand, ConfidenceBreakdown, ConfidenceFactor,
    FeatureVector, InfraRationale, InfraSignalLevel, MergeRequestSnapshot, PathSummary, Rationale,
    ReviewReason,
};
