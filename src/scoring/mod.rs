// Scoring Engine
// Folds labelled frames into aggregate counts and computes the site safety score

pub mod aggregate;
pub mod safety;


pub use aggregate::{aggregate, AggregateCounts};
pub use safety::{score, SafetyScore, TrackedLabel, ViolationCounts};

use crate::detect::reader::DetectionStreamReader;
use crate::detect::{LabelTable, RawFrame};
use crate::error::Result;

/// Read, aggregate and score a raw detector stream in one pass.
/// Any detection or label-resolution error aborts without a score.
pub fn score_stream<I>(frames: I, labels: &LabelTable) -> Result<SafetyScore>
where
    I: IntoIterator<Item = Result<RawFrame>>,
{
    let counts = aggregate(DetectionStreamReader::new(frames, labels))?;
    Ok(score(&counts))
}
