// Safety scorer
// Three safety attributes per person (helmet, vest, gloves). Each missing one
// costs a point; the score is the share of points kept, floored to an integer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::AggregateCounts;
use crate::constants::{
    LABEL_NO_GLOVES, LABEL_NO_HELMET, LABEL_NO_VEST, LABEL_PERSON, REPORT_NO_GLOVES,
    REPORT_NO_HELMET, REPORT_NO_VEST, SAFETY_ATTRIBUTES_PER_PERSON, SCORE_MAX, SCORE_MIN,
};

/// Labels the scorer looks at. Everything else the detector reports is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrackedLabel {
    Person,
    NoHelmet,
    NoVest,
    NoGloves,
}

impl TrackedLabel {
    pub const ALL: [TrackedLabel; 4] = [
        TrackedLabel::Person,
        TrackedLabel::NoHelmet,
        TrackedLabel::NoVest,
        TrackedLabel::NoGloves,
    ];

    /// Label string as emitted by the detector.
    pub fn detector_label(&self) -> &'static str {
        match self {
            TrackedLabel::Person => LABEL_PERSON,
            TrackedLabel::NoHelmet => LABEL_NO_HELMET,
            TrackedLabel::NoVest => LABEL_NO_VEST,
            TrackedLabel::NoGloves => LABEL_NO_GLOVES,
        }
    }
}

/// Aggregate counts restricted to the tracked labels.
pub fn tracked_counts(counts: &AggregateCounts) -> BTreeMap<TrackedLabel, u32> {
    TrackedLabel::ALL
        .into_iter()
        .map(|label| (label, counts.get(label.detector_label())))
        .collect()
}

/// Violation counts after clamping to the number of people on site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    #[serde(rename = "No Helmet")]
    pub no_helmet: u32,
    #[serde(rename = "No Vest")]
    pub no_vest: u32,
    #[serde(rename = "No Gloves")]
    pub no_gloves: u32,
}

impl ViolationCounts {
    /// Sum of all violations. Widened so three full `u32` counts can't overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.no_helmet) + u64::from(self.no_vest) + u64::from(self.no_gloves)
    }

    /// (report key, count) pairs in display order.
    pub fn entries(&self) -> [(&'static str, u32); 3] {
        [
            (REPORT_NO_HELMET, self.no_helmet),
            (REPORT_NO_VEST, self.no_vest),
            (REPORT_NO_GLOVES, self.no_gloves),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyScore {
    pub total_persons: u32,
    /// Always within 0..=100.
    pub safety_score: u32,
    pub violations: ViolationCounts,
}

/// Compute the safety score for a video's aggregate counts.
pub fn score(counts: &AggregateCounts) -> SafetyScore {
    let tracked = tracked_counts(counts);
    let count_of = |label: TrackedLabel| tracked.get(&label).copied().unwrap_or(0);

    let total_persons = count_of(TrackedLabel::Person);

    // A detector over-count can't exceed the people it could apply to.
    let violations = ViolationCounts {
        no_helmet: count_of(TrackedLabel::NoHelmet).min(total_persons),
        no_vest: count_of(TrackedLabel::NoVest).min(total_persons),
        no_gloves: count_of(TrackedLabel::NoGloves).min(total_persons),
    };

    let safety_score = if total_persons == 0 {
        SCORE_MAX
    } else {
        let possible = u64::from(total_persons) * u64::from(SAFETY_ATTRIBUTES_PER_PERSON);
        let deductions = violations.total();
        // Integer division floors the non-negative ratio exactly.
        let raw = possible.saturating_sub(deductions) * u64::from(SCORE_MAX) / possible;
        raw.clamp(u64::from(SCORE_MIN), u64::from(SCORE_MAX)) as u32
    };

    SafetyScore {
        total_persons,
        safety_score,
        violations,
    }
}
