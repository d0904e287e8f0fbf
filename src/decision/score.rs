use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CandidateRequest;

/// Contribution recorded for a source that failed or was not configured.
/// Unavailable sources keep this placeholder in the audit trail but are
/// excluded from the weighted combine.
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSourceKind {
    Model,
    Technical,
    News,
    Strategy,
}

impl ScoreSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Technical => "technical",
            Self::News => "news",
            Self::Strategy => "strategy",
        }
    }

    /// Fixed combination weight for this source.
    pub fn weight(self) -> f64 {
        match self {
            Self::Model => 0.4,
            Self::Technical => 0.3,
            Self::News => 0.2,
            Self::Strategy => 0.1,
        }
    }
}

/// One upstream signal source consulted per candidate. Implementations own
/// their transport and must bound their own upstream calls; the engine adds
/// an outer timeout and treats any failure as an unavailable source.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    fn kind(&self) -> ScoreSourceKind;

    /// Score the candidate in [0, 1], where 0.5 is neutral.
    async fn score(&self, req: &CandidateRequest) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceScore {
    pub kind: ScoreSourceKind,
    pub value: f64,
    pub available: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl SourceScore {
    pub fn available(kind: ScoreSourceKind, value: f64) -> Self {
        Self {
            kind,
            value: value.clamp(0.0, 1.0),
            available: true,
            note: None,
        }
    }

    pub fn unavailable(kind: ScoreSourceKind, note: impl Into<String>) -> Self {
        Self {
            kind,
            value: NEUTRAL_SCORE,
            available: false,
            note: Some(note.into()),
        }
    }
}

/// Re-normalized weighted average over the available sources.
///
/// Missing sources are excluded from numerator and denominator, never padded
/// with zeros: with only model and news present the result is
/// `(0.4*model + 0.2*news) / 0.6`. No available sources at all yields the
/// neutral score.
pub fn combine_scores(sub_scores: &[SourceScore]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for sub in sub_scores.iter().filter(|s| s.available) {
        let w = sub.kind.weight();
        numerator += sub.value * w;
        denominator += w;
    }
    if denominator <= 0.0 {
        NEUTRAL_SCORE
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sources_present_uses_full_weights() {
        let subs = vec![
            SourceScore::available(ScoreSourceKind::Model, 0.8),
            SourceScore::available(ScoreSourceKind::Technical, 0.6),
            SourceScore::available(ScoreSourceKind::News, 0.4),
            SourceScore::available(ScoreSourceKind::Strategy, 0.2),
        ];
        let combined = combine_scores(&subs);
        let expected = 0.8 * 0.4 + 0.6 * 0.3 + 0.4 * 0.2 + 0.2 * 0.1;
        assert!((combined - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_sources_are_renormalized() {
        let subs = vec![
            SourceScore::available(ScoreSourceKind::Model, 0.9),
            SourceScore::unavailable(ScoreSourceKind::Technical, "timeout"),
            SourceScore::available(ScoreSourceKind::News, 0.3),
            SourceScore::unavailable(ScoreSourceKind::Strategy, "not configured"),
        ];
        let combined = combine_scores(&subs);
        let expected = (0.9 * 0.4 + 0.3 * 0.2) / 0.6;
        assert!((combined - expected).abs() < 1e-12);
    }

    #[test]
    fn no_sources_yields_neutral() {
        assert!((combine_scores(&[]) - NEUTRAL_SCORE).abs() < f64::EPSILON);
        let subs = vec![SourceScore::unavailable(ScoreSourceKind::Model, "down")];
        assert!((combine_scores(&subs) - NEUTRAL_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn available_scores_are_clamped() {
        let sub = SourceScore::available(ScoreSourceKind::Model, 1.7);
        assert!((sub.value - 1.0).abs() < f64::EPSILON);
        let sub = SourceScore::available(ScoreSourceKind::Model, -0.3);
        assert!(sub.value.abs() < f64::EPSILON);
    }
}
