//! Composite 0–100 score, letter grade, narrative note and trend history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::clamp_finite;

const THROUGHPUT_REFERENCE: f64 = 140.0;
const PROFIT_FLOOR: f64 = -500_000.0;
const PROFIT_SPAN: f64 = 1_500_000.0;
/// Samples back used for the trend delta.
pub const TREND_WINDOW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Grade {
        if score >= 92.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 65.0 {
            Grade::C
        } else if score >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// Each sub-score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub throughput: f64,
    pub profit: f64,
    pub reliability: f64,
    pub carbon: f64,
    pub incidents: f64,
    pub shipments: f64,
    pub directives: f64,
    pub strain: f64,
}

impl SubScores {
    fn weighted(&self) -> f64 {
        self.throughput * 0.18
            + self.profit * 0.16
            + self.reliability * 0.18
            + self.carbon * 0.12
            + self.incidents * 0.10
            + self.shipments * 0.10
            + self.directives * 0.08
            + self.strain * 0.08
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// Saleable product rate, kbpd.
    pub output: f64,
    pub profit_per_day: f64,
    pub reliability: f64,
    pub carbon: f64,
    pub carbon_limit: f64,
    pub incident_pressure: f64,
    pub shipment_reliability: f64,
    pub directive_reliability: f64,
    pub strain_factor: f64,
    pub emergency: bool,
}

pub fn sub_scores(inputs: &ScoreInputs) -> SubScores {
    let carbon_ratio = if inputs.carbon_limit > 0.0 {
        inputs.carbon / inputs.carbon_limit
    } else {
        1.0
    };
    SubScores {
        throughput: clamp_finite(inputs.output / THROUGHPUT_REFERENCE, 0.0, 1.0),
        profit: clamp_finite((inputs.profit_per_day - PROFIT_FLOOR) / PROFIT_SPAN, 0.0, 1.0),
        reliability: clamp_finite((inputs.reliability - 0.5) / 0.5, 0.0, 1.0),
        carbon: clamp_finite((1.25 - carbon_ratio) / 0.5, 0.0, 1.0),
        incidents: clamp_finite(1.0 - inputs.incident_pressure, 0.0, 1.0),
        shipments: clamp_finite(inputs.shipment_reliability, 0.0, 1.0),
        directives: clamp_finite(inputs.directive_reliability, 0.0, 1.0),
        strain: clamp_finite(1.0 - inputs.strain_factor, 0.0, 1.0),
    }
}

struct NoteRule {
    applies: fn(&ScoreInputs, &SubScores, f64) -> bool,
    note: &'static str,
}

/// Issues first, worst first; then highlights.
const NOTE_RULES: &[NoteRule] = &[
    NoteRule {
        applies: |i, _, _| i.emergency,
        note: "Emergency shutdown in effect. The plant is idle.",
    },
    NoteRule {
        applies: |_, s, _| s.reliability < 0.4,
        note: "Unit failures are dragging the plant down. Fund maintenance.",
    },
    NoteRule {
        applies: |_, s, _| s.shipments < 0.6,
        note: "Missed shipments are eroding customer trust.",
    },
    NoteRule {
        applies: |_, s, _| s.profit < 0.3,
        note: "Operating at a loss. Revisit crude intake and spend.",
    },
    NoteRule {
        applies: |_, s, _| s.carbon < 0.3,
        note: "Emissions are over the limit and drawing fines.",
    },
    NoteRule {
        applies: |_, s, _| s.strain < 0.4,
        note: "The plant is overstrained. Ease intake before something breaks.",
    },
    NoteRule {
        applies: |_, _, score| score >= 92.0,
        note: "World-class operation. Keep it steady.",
    },
    NoteRule {
        applies: |_, s, _| s.profit >= 0.85,
        note: "Margins are strong.",
    },
    NoteRule {
        applies: |_, s, _| s.reliability >= 0.9,
        note: "Units are running reliably.",
    },
];

const DEFAULT_NOTE: &str = "Operations are steady.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub score: f64,
    pub grade: Grade,
    pub note: String,
    pub sub_scores: SubScores,
    pub trend: f64,
}

impl Default for Scorecard {
    fn default() -> Self {
        Self {
            score: 0.0,
            grade: Grade::F,
            note: DEFAULT_NOTE.to_string(),
            sub_scores: SubScores::default(),
            trend: 0.0,
        }
    }
}

pub fn evaluate(inputs: &ScoreInputs, history: &PerformanceHistory) -> Scorecard {
    let sub = sub_scores(inputs);
    let score = clamp_finite(sub.weighted() * 100.0, 0.0, 100.0);
    let note = NOTE_RULES
        .iter()
        .find(|rule| (rule.applies)(inputs, &sub, score))
        .map_or(DEFAULT_NOTE, |rule| rule.note);
    Scorecard {
        score,
        grade: Grade::from_score(score),
        note: note.to_string(),
        sub_scores: sub,
        trend: history.trend(score),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub minute: u64,
    pub score: f64,
    pub profit_per_day: f64,
    pub reliability: f64,
    pub carbon: f64,
    pub output: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceHistory {
    samples: VecDeque<HistorySample>,
}

impl PerformanceHistory {
    pub fn push(&mut self, capacity: usize, sample: HistorySample) {
        self.samples.push_back(sample);
        while self.samples.len() > capacity.max(1) {
            self.samples.pop_front();
        }
    }

    pub(crate) fn restore(&mut self, capacity: usize, samples: Vec<HistorySample>) {
        let skip = samples.len().saturating_sub(capacity.max(1));
        self.samples = samples.into_iter().skip(skip).collect();
    }

    /// Score delta against the sample `TREND_WINDOW` back, or the oldest one.
    pub fn trend(&self, current: f64) -> f64 {
        let reference = self
            .samples
            .len()
            .checked_sub(TREND_WINDOW)
            .and_then(|i| self.samples.get(i))
            .or_else(|| self.samples.front());
        reference.map_or(0.0, |s| current - s.score)
    }

    pub fn samples(&self) -> Vec<HistorySample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
