// Count aggregation
//
// Per label, keep the largest number of instances seen in any single frame.
// A worker who stays in view for hundreds of frames still counts once, so a
// running max (not a sum) is the right fold here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detect::reader::FrameDetections;
use crate::error::Result;

/// Label -> maximum simultaneous occurrence across all frames.
/// Labels that never appeared read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateCounts {
    max_counts: BTreeMap<String, u32>,
}

impl AggregateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> u32 {
        self.max_counts.get(label).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.max_counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.max_counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.max_counts.iter().map(|(label, &count)| (label.as_str(), count))
    }

    /// Fold one frame into the running maximum.
    pub fn observe(&mut self, frame: &FrameDetections) {
        let mut frame_counts: BTreeMap<&str, u32> = BTreeMap::new();
        for label in &frame.labels {
            *frame_counts.entry(label.as_str()).or_insert(0) += 1;
        }

        for (label, count) in frame_counts {
            match self.max_counts.get_mut(label) {
                Some(current) if *current >= count => {}
                Some(current) => *current = count,
                None => {
                    self.max_counts.insert(label.to_string(), count);
                }
            }
        }
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for AggregateCounts {
    /// Duplicate labels keep their largest count.
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut max_counts = BTreeMap::new();
        for (label, count) in iter {
            let entry = max_counts.entry(label.into()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        Self { max_counts }
    }
}

/// Aggregate a frame sequence. The first error aborts the fold.
pub fn aggregate<I>(frames: I) -> Result<AggregateCounts>
where
    I: IntoIterator<Item = Result<FrameDetections>>,
{
    let mut counts = AggregateCounts::new();
    let mut frame_total = 0usize;

    for frame in frames {
        counts.observe(&frame?);
        frame_total += 1;
    }

    log::debug!(
        "Aggregated {} frames into {} labels",
        frame_total,
        counts.len()
    );

    Ok(counts)
}
