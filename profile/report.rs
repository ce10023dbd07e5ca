// ========================================================================================
//
//                     Profiles: what a respondent gets back
//
// ========================================================================================

use crate::answers::AnswerSet;
use crate::dataset::Dataset;
use crate::predict::PredictionEngine;
use crate::types::{DrugResult, round_to_hundredths};
use crate::verdict::{Verdict, VerdictScale, any_drug_estimate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The complete outcome for one answer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Per-drug estimates, most likely first.
    pub results: Vec<DrugResult>,
    /// How many answers matched a question and one of its options.
    pub answered: usize,
    /// How many questions the dataset asks.
    pub questions: usize,
    /// Composite chance of using any drug, in percent.
    pub any_drug: f64,
    /// The same composite for someone who answered nothing.
    pub baseline_any_drug: f64,
    pub verdict: Verdict,
    pub verdict_message: String,
}

/// Bundles an engine with a verdict table and the population composite it needs.
///
/// The baseline composite is computed once, at construction, from the empty answer
/// set. A `Profiler` is `Sync` and can score respondents from many threads.
#[derive(Debug, Clone, Copy)]
pub struct Profiler<'a> {
    engine: PredictionEngine<'a>,
    scale: VerdictScale,
    baseline_any_drug: f64,
}

impl<'a> Profiler<'a> {
    pub fn new(dataset: &'a Dataset, scale: VerdictScale) -> Self {
        let engine = PredictionEngine::new(dataset);
        let baseline_any_drug = any_drug_estimate(&engine.predict(&AnswerSet::new()));
        log::debug!("Population any-drug estimate: {baseline_any_drug:.2}%");
        Self {
            engine,
            scale,
            baseline_any_drug,
        }
    }

    pub fn engine(&self) -> PredictionEngine<'a> {
        self.engine
    }

    pub fn scale(&self) -> &VerdictScale {
        &self.scale
    }

    pub fn baseline_any_drug(&self) -> f64 {
        self.baseline_any_drug
    }

    pub fn profile(&self, answers: &AnswerSet) -> Profile {
        let chosen = self.engine.resolve(answers);
        let results = self.engine.predict_resolved(&chosen);
        let any_drug = any_drug_estimate(&results);
        let verdict = self.scale.judge(any_drug, self.baseline_any_drug);
        Profile {
            answered: chosen.len(),
            questions: self.engine.dataset().questions().len(),
            any_drug: round_to_hundredths(any_drug),
            baseline_any_drug: round_to_hundredths(self.baseline_any_drug),
            verdict,
            verdict_message: verdict.message().to_string(),
            results,
        }
    }
}

/// The plain-text report: a ranked table followed by the composite and verdict.
impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drug_width = column_width(self.results.iter().map(|r| r.drug.as_str()), "Drug");
        let class_width = column_width(
            self.results.iter().map(|r| r.classification.as_str()),
            "Class",
        );

        writeln!(
            f,
            "Your government drug profile ({} of {} questions answered)\n",
            self.answered, self.questions
        )?;
        writeln!(
            f,
            "  {:<drug_width$}  {:<class_width$}  {:>8}  {:>11}  {:>10}",
            "Drug", "Class", "Rate", "Baseline", "Multiplier"
        )?;
        for r in &self.results {
            writeln!(
                f,
                "  {:<drug_width$}  {:<class_width$}  {:>7.2}%  vs {:>7.2}%  {:>9.2}x",
                r.drug, r.classification, r.rate, r.baseline_rate, r.multiplier
            )?;
        }
        writeln!(
            f,
            "\nChance of any drug (top 3, overlap discounted): {:.2}% vs {:.2}% for everyone",
            self.any_drug, self.baseline_any_drug
        )?;
        writeln!(f, "Verdict: {}", self.verdict_message)
    }
}

fn column_width<'s>(cells: impl Iterator<Item = &'s str>, header: &str) -> usize {
    cells
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0)
        .max(header.len())
}

/// Renders a profile as pretty-printed JSON.
pub fn render_json(profile: &Profile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(profile)
}

/// Every question with its options, in dataset order, one option per line.
pub struct QuestionListing<'a>(pub &'a Dataset);

impl fmt::Display for QuestionListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for question in self.0.questions() {
            writeln!(f, "{}: {}", question.id(), question.prompt())?;
            for option in question.options() {
                writeln!(f, "    {}", option.label())?;
            }
        }
        Ok(())
    }
}
