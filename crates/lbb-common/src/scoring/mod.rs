//! Score ↔ hirings conversion and star ratings.
//!
//! A score in [0, 100] is a monotonic transform of the number of hirings an
//! office is expected to make. The transform is piecewise: linear up to the
//! 50, 60 and 80 calibration points, then logarithmic up to 100.

mod adjust;

pub use adjust::score_for_rome;

use thiserror::Error;

pub const MAX_SCORE: f64 = 100.0;
pub const MAX_STARS: f64 = 5.0;

/// Round to one decimal digit, the precision used for stars and distances.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Error, PartialEq)]
#[error("scoring curve calibration must satisfy 0 < s50 < s60 < s80 < s100 - 1, got {0:?}")]
pub struct InvalidCurve(pub ScoringCurve);

/// Hiring volumes mapped to the scores 50, 60, 80 and 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringCurve {
    pub score_50_hirings: f64,
    pub score_60_hirings: f64,
    pub score_80_hirings: f64,
    pub score_100_hirings: f64,
}

impl Default for ScoringCurve {
    /// Placeholder calibration for non-production profiles.
    fn default() -> Self {
        Self {
            score_50_hirings: 10.0,
            score_60_hirings: 50.0,
            score_80_hirings: 100.0,
            score_100_hirings: 500.0,
        }
    }
}

impl ScoringCurve {
    pub fn validate(self) -> Result<Self, InvalidCurve> {
        let ordered = 0.0 < self.score_50_hirings
            && self.score_50_hirings < self.score_60_hirings
            && self.score_60_hirings < self.score_80_hirings
            // log10(s100 - s80) is a divisor in the upper branch
            && self.score_80_hirings + 1.0 < self.score_100_hirings;
        let finite = [
            self.score_50_hirings,
            self.score_60_hirings,
            self.score_80_hirings,
            self.score_100_hirings,
        ]
        .iter()
        .all(|v| v.is_finite());

        if ordered && finite {
            Ok(self)
        } else {
            Err(InvalidCurve(self))
        }
    }

    fn log_span(&self) -> f64 {
        (self.score_100_hirings - self.score_80_hirings).log10()
    }

    /// Score in [0, 100] for an expected hiring volume. Negative volumes score 0.
    pub fn score_from_hirings(&self, hirings: f64) -> f64 {
        let h = if hirings.is_nan() { 0.0 } else { hirings.max(0.0) };
        let (s50, s60, s80, s100) = (
            self.score_50_hirings,
            self.score_60_hirings,
            self.score_80_hirings,
            self.score_100_hirings,
        );

        let score = if h <= s50 {
            50.0 * h / s50
        } else if h <= s60 {
            50.0 + 10.0 * (h - s50) / (s60 - s50)
        } else if h <= s80 {
            60.0 + 20.0 * (h - s60) / (s80 - s60)
        } else if h < s100 {
            80.0 + 20.0 * (1.0 + h - s80).log10() / self.log_span()
        } else {
            MAX_SCORE
        };

        score.clamp(0.0, MAX_SCORE)
    }

    /// Inverse of [`ScoringCurve::score_from_hirings`] on [0, 100].
    pub fn hirings_from_score(&self, score: f64) -> f64 {
        let s = score.clamp(0.0, MAX_SCORE);
        let (s50, s60, s80) = (
            self.score_50_hirings,
            self.score_60_hirings,
            self.score_80_hirings,
        );

        if s <= 50.0 {
            s50 * s / 50.0
        } else if s <= 60.0 {
            s50 + (s - 50.0) / 10.0 * (s60 - s50)
        } else if s <= 80.0 {
            s60 + (s - 60.0) / 20.0 * (s80 - s60)
        } else {
            s80 - 1.0 + 10f64.powf((s - 80.0) / 20.0 * self.log_span())
        }
    }
}

/// Curve plus the floor applied to occupation-scoped scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub curve: ScoringCurve,
    /// Below this aggregate score no occupation-scoped estimate is attempted;
    /// above it, adjusted scores never drop under it ("at least one star").
    pub score_for_rome_minimum: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            curve: ScoringCurve::default(),
            score_for_rome_minimum: 20.0,
        }
    }
}

/// 0–5 stars, one decimal.
pub fn stars_from_score(score: f64) -> f64 {
    round_one_decimal(score.clamp(0.0, MAX_SCORE) * MAX_STARS / MAX_SCORE)
}
