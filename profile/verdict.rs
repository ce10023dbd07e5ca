// ========================================================================================
//
//                  The any-drug composite and the five-band verdict
//
// ========================================================================================
//
// Both presentation surfaces of a profile (the text report and the JSON document) go
// through the functions in this module. There is exactly one implementation of the
// composite estimate and exactly one of the verdict mapping.

use crate::types::DrugResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How many of the most likely drugs feed the any-drug composite.
pub const TOP_DRUG_COUNT: usize = 3;

/// Fixed discount standing in for the overlap between correlated drug uses.
pub const OVERLAP_DISCOUNT: f64 = 0.85;

/// The composite never exceeds this value, in percent.
pub const ANY_DRUG_CEILING: f64 = 95.0;

/// Heuristic chance, in percent, of using at least one drug.
///
/// Sums the rates of the [`TOP_DRUG_COUNT`] highest results (fewer if there are
/// fewer results), applies [`OVERLAP_DISCOUNT`], and clamps to `[0, 95]`. The input
/// does not need to be sorted.
pub fn any_drug_estimate(results: &[DrugResult]) -> f64 {
    let mut rates: Vec<f64> = results.iter().map(|r| r.rate).collect();
    rates.sort_by(|a, b| b.total_cmp(a));
    let top: f64 = rates.iter().take(TOP_DRUG_COUNT).sum();
    (top * OVERLAP_DISCOUNT).clamp(0.0, ANY_DRUG_CEILING)
}

/// The qualitative bands, from most to least suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Partying,
    SideEye,
    Average,
    SqueakyClean,
    Saint,
}

impl Verdict {
    /// Every band in descending order. The last band catches everything below the
    /// final threshold.
    pub const BANDS: [Verdict; 5] = [
        Verdict::Partying,
        Verdict::SideEye,
        Verdict::Average,
        Verdict::SqueakyClean,
        Verdict::Saint,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Verdict::Partying => "partying",
            Verdict::SideEye => "side-eye",
            Verdict::Average => "average",
            Verdict::SqueakyClean => "squeaky-clean",
            Verdict::Saint => "saint",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Verdict::Partying => "The government is fairly confident you're out partying.",
            Verdict::SideEye => "The government is giving you a bit of side-eye.",
            Verdict::Average => "You are statistically average. Nothing to see here.",
            Verdict::SqueakyClean => "Squeaky-clean. The government barely thinks about you.",
            Verdict::Saint => "Absolute saint. The government is sure you've never seen a drug.",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// What the verdict thresholds are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictBasis {
    /// `any_drug / baseline_any_drug`: how the respondent compares with the
    /// population estimate from the same dataset.
    #[default]
    Relative,
    /// The any-drug percentage itself.
    Absolute,
}

#[derive(Error, Debug, PartialEq)]
pub enum VerdictError {
    #[error("Verdict thresholds must be finite numbers, but found {0}.")]
    NonFiniteThreshold(f64),

    #[error(
        "Verdict thresholds must be strictly descending, but {next} follows {previous}."
    )]
    NotDescending { previous: f64, next: f64 },
}

/// A threshold table mapping a score to one of the five [`Verdict`] bands.
///
/// `thresholds[i]` is the minimum score for `Verdict::BANDS[i]`. Bands are tried in
/// order and the first whose threshold the score reaches wins; a score below all
/// four thresholds is [`Verdict::Saint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictScale {
    basis: VerdictBasis,
    thresholds: [f64; 4],
}

impl VerdictScale {
    pub const RELATIVE_THRESHOLDS: [f64; 4] = [1.75, 1.2, 0.8, 0.5];
    pub const ABSOLUTE_THRESHOLDS: [f64; 4] = [35.0, 20.0, 8.0, 3.0];

    pub fn new(basis: VerdictBasis, thresholds: [f64; 4]) -> Result<Self, VerdictError> {
        for &t in &thresholds {
            if !t.is_finite() {
                return Err(VerdictError::NonFiniteThreshold(t));
            }
        }
        for pair in thresholds.windows(2) {
            if pair[1] >= pair[0] {
                return Err(VerdictError::NotDescending {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self { basis, thresholds })
    }

    /// The built-in table for `basis`.
    pub fn standard(basis: VerdictBasis) -> Self {
        let thresholds = match basis {
            VerdictBasis::Relative => Self::RELATIVE_THRESHOLDS,
            VerdictBasis::Absolute => Self::ABSOLUTE_THRESHOLDS,
        };
        Self { basis, thresholds }
    }

    pub fn basis(&self) -> VerdictBasis {
        self.basis
    }

    pub fn thresholds(&self) -> [f64; 4] {
        self.thresholds
    }

    /// The number compared against the thresholds.
    ///
    /// Under the relative basis a non-positive `baseline_any_drug` scores `1.0`.
    pub fn score(&self, any_drug: f64, baseline_any_drug: f64) -> f64 {
        match self.basis {
            VerdictBasis::Absolute => any_drug,
            VerdictBasis::Relative if baseline_any_drug > 0.0 => any_drug / baseline_any_drug,
            VerdictBasis::Relative => 1.0,
        }
    }

    /// First-match lookup of `score` in the descending threshold table.
    pub fn classify(&self, score: f64) -> Verdict {
        Verdict::BANDS
            .iter()
            .zip(self.thresholds.iter())
            .find(|&(_, &threshold)| score >= threshold)
            .map_or(Verdict::Saint, |(&band, _)| band)
    }

    pub fn judge(&self, any_drug: f64, baseline_any_drug: f64) -> Verdict {
        self.classify(self.score(any_drug, baseline_any_drug))
    }
}

impl Default for VerdictScale {
    fn default() -> Self {
        Self::standard(VerdictBasis::default())
    }
}
