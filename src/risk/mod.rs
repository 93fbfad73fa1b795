//! Deterministic post-processing of raw model outputs.

mod engine;
mod segments;

pub use engine::{ChurnAssessment, RiskEngine, RiskLevel};
pub use segments::{name_for_profile, SegmentCatalog, UNKNOWN_SEGMENT};
