// ========================================================================================
//
//                      The prediction engine: geometric mean of ratios
//
// ========================================================================================
//
// This module turns an answer set into one adjusted prevalence per drug. It works in
// two steps. `resolve` matches the answers against the dataset once and keeps the
// recognized options. The per-drug loop then combines those options' rates. The
// engine is a pure function of the dataset it borrows and the answers it is given:
// no I/O, no interior state.
//
// For each drug with baseline `b` and recognized demographic rates `r_1..r_n`:
//
//     adjusted = b * exp( mean( ln(r_i / b) ) )
//
// which is `b` times the geometric mean of the ratios. A single answer therefore
// reproduces its demographic rate exactly, and many answers pointing the same way
// compound sub-linearly instead of multiplying without bound.

use crate::answers::AnswerSet;
use crate::dataset::{Dataset, Drug, QuestionOption};
use crate::types::{DrugIndex, DrugResult, round_to_hundredths};

/// Stand-in demographic rate, in percent, for a missing or zero survey cell. It is
/// applied before the logarithm so that `ln` always sees a positive ratio.
pub const RATE_FLOOR: f64 = 0.01;

/// No drug is ever reported above this rate, in percent.
pub const RATE_CEILING: f64 = 95.0;

/// A read-only view that evaluates answer sets against one dataset.
///
/// The engine is `Copy` and holds only a shared reference, so a single instance can
/// be handed to any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct PredictionEngine<'a> {
    dataset: &'a Dataset,
}

impl<'a> PredictionEngine<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Matches `answers` against the dataset's questions, in dataset order.
    ///
    /// Question ids the dataset does not know, and labels a question does not offer,
    /// are skipped. The length of the returned list is the number of answers the
    /// engine will actually use.
    pub fn resolve(&self, answers: &AnswerSet) -> Vec<&'a QuestionOption> {
        let mut chosen = Vec::with_capacity(answers.len());
        for question in self.dataset.questions() {
            let Some(label) = answers.get(question.id()) else {
                continue;
            };
            match question.option(label) {
                Some(option) => chosen.push(option),
                None => log::debug!(
                    "Ignoring answer '{label}' to question '{}': not one of its options",
                    question.id()
                ),
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            for (id, _) in answers.iter() {
                if self.dataset.question(id).is_none() {
                    log::debug!("Ignoring answer to unknown question '{id}'");
                }
            }
        }
        chosen
    }

    /// Estimates every drug's rate for `answers`, ranked from most to least likely.
    ///
    /// Always returns one result per drug. Ties keep the dataset's drug order.
    pub fn predict(&self, answers: &AnswerSet) -> Vec<DrugResult> {
        let chosen = self.resolve(answers);
        self.predict_resolved(&chosen)
    }

    /// Like [`predict`](Self::predict), for options already produced by
    /// [`resolve`](Self::resolve).
    pub fn predict_resolved(&self, chosen: &[&QuestionOption]) -> Vec<DrugResult> {
        let mut results: Vec<DrugResult> = self
            .dataset
            .drugs()
            .iter()
            .enumerate()
            .map(|(i, drug)| {
                let index = DrugIndex(i);
                let adjusted = adjusted_rate(drug.baseline, chosen.iter().map(|o| o.rate(index)));
                build_result(drug, adjusted)
            })
            .collect();

        // `sort_by` is stable, which keeps dataset order among equal rates.
        results.sort_by(|a, b| b.rate.total_cmp(&a.rate));
        results
    }
}

/// Combines a drug's demographic rates into one adjusted rate, unrounded.
///
/// `None` and non-positive rates are replaced by [`RATE_FLOOR`]. With no rates at all
/// the baseline is returned unchanged. A non-positive baseline always yields `0.0`.
/// The result is clamped to `[0, RATE_CEILING]`.
pub fn adjusted_rate<I>(baseline: f64, demographic_rates: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    if baseline <= 0.0 {
        return 0.0;
    }

    let mut log_ratio_sum = 0.0;
    let mut count = 0usize;
    for rate in demographic_rates {
        let rate = match rate {
            Some(r) if r > 0.0 => r,
            _ => RATE_FLOOR,
        };
        log_ratio_sum += (rate / baseline).ln();
        count += 1;
    }

    let adjusted = if count == 0 {
        baseline
    } else {
        baseline * (log_ratio_sum / count as f64).exp()
    };
    adjusted.clamp(0.0, RATE_CEILING)
}

fn build_result(drug: &Drug, adjusted: f64) -> DrugResult {
    let multiplier = if drug.baseline > 0.0 {
        adjusted / drug.baseline
    } else {
        1.0
    };
    DrugResult {
        drug: drug.name.clone(),
        rate: round_to_hundredths(adjusted),
        baseline_rate: round_to_hundredths(drug.baseline),
        multiplier: round_to_hundredths(multiplier),
        classification: drug.classification.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::from_value(json!({
            "baseline": { "Cannabis": 10.0, "Cocaine": 2.0, "Ketamine": 2.0, "Heroin": 0.0 },
            "drug_classes": { "Cannabis": "Class B", "Cocaine": "Class A", "Heroin": "Class A" },
            "questions": [
                {
                    "id": "age",
                    "question": "How old are you?",
                    "options": {
                        "20–24": { "Cannabis": 20.0, "Cocaine": 6.0, "Ketamine": 4.0, "Heroin": 1.0 },
                        "55–59": { "Cannabis": 2.5, "Cocaine": 0.0 }
                    }
                },
                {
                    "id": "nightclub",
                    "question": "Nightclub visits?",
                    "options": {
                        "4 or more visits": { "Cannabis": 40.0, "Cocaine": 8.0, "Ketamine": 8.0 },
                        "None": { "Cannabis": 5.0, "Cocaine": 1.0, "Ketamine": 0.5 }
                    }
                }
            ]
        }))
        .unwrap()
    }

    fn find<'r>(results: &'r [DrugResult], drug: &str) -> &'r DrugResult {
        results.iter().find(|r| r.drug == drug).unwrap()
    }

    #[test]
    fn empty_answers_reproduce_the_baseline() {
        let dataset = dataset();
        let results = PredictionEngine::new(&dataset).predict(&AnswerSet::new());
        assert_eq!(results.len(), 4);
        let cannabis = find(&results, "Cannabis");
        assert_eq!(cannabis.rate, 10.0);
        assert_eq!(cannabis.baseline_rate, 10.0);
        assert_eq!(cannabis.multiplier, 1.0);
        assert_eq!(cannabis.classification, "Class B");
    }

    #[test]
    fn single_answer_reproduces_its_demographic_rate() {
        let dataset = dataset();
        let answers: AnswerSet = [("age", "20–24")].into_iter().collect();
        let results = PredictionEngine::new(&dataset).predict(&answers);
        let cannabis = find(&results, "Cannabis");
        assert_eq!(cannabis.rate, 20.0);
        assert_eq!(cannabis.multiplier, 2.0);
        assert_eq!(find(&results, "Cocaine").rate, 6.0);
    }

    #[test]
    fn two_answers_take_the_geometric_mean_of_ratios() {
        let dataset = dataset();
        let answers: AnswerSet = [("age", "20–24"), ("nightclub", "4 or more visits")]
            .into_iter()
            .collect();
        let results = PredictionEngine::new(&dataset).predict(&answers);
        // sqrt(2 * 4) * 10
        assert_relative_eq!(find(&results, "Cannabis").rate, 28.28, epsilon = 1e-9);
        // sqrt(3 * 4) * 2
        assert_relative_eq!(find(&results, "Cocaine").rate, 6.93, epsilon = 1e-9);
    }

    #[test]
    fn zero_baseline_is_always_zero() {
        let dataset = dataset();
        let answers: AnswerSet = [("age", "20–24")].into_iter().collect();
        let heroin = find(&PredictionEngine::new(&dataset).predict(&answers), "Heroin").clone();
        assert_eq!(heroin.rate, 0.0);
        assert_eq!(heroin.multiplier, 1.0);
        assert_eq!(heroin.classification, "Class A");
    }

    #[test]
    fn missing_and_zero_cells_use_the_floor() {
        let dataset = dataset();
        let answers: AnswerSet = [("age", "55–59")].into_iter().collect();
        let results = PredictionEngine::new(&dataset).predict(&answers);
        // Cocaine has an explicit 0.0 and Ketamine has no cell at all.
        let cocaine = find(&results, "Cocaine");
        let ketamine = find(&results, "Ketamine");
        assert_eq!(cocaine.rate, 0.01);
        assert_eq!(ketamine.rate, 0.01);
        assert!(cocaine.rate > 0.0);
    }

    #[test]
    fn results_are_ranked_descending_with_stable_ties() {
        let dataset = dataset();
        let results = PredictionEngine::new(&dataset).predict(&AnswerSet::new());
        let order: Vec<&str> = results.iter().map(|r| r.drug.as_str()).collect();
        assert_eq!(order, ["Cannabis", "Cocaine", "Ketamine", "Heroin"]);
    }

    #[test]
    fn unknown_answers_are_ignored() {
        let dataset = dataset();
        let engine = PredictionEngine::new(&dataset);
        let known: AnswerSet = [("age", "20–24")].into_iter().collect();
        let noisy: AnswerSet = [("age", "20–24"), ("shoe_size", "11"), ("nightclub", "Daily")]
            .into_iter()
            .collect();
        assert_eq!(engine.resolve(&noisy).len(), 1);
        assert_eq!(engine.predict(&known), engine.predict(&noisy));
    }

    #[test]
    fn saturation_clamps_at_the_ceiling() {
        let rate = adjusted_rate(20.0, [Some(100.0), Some(100.0), Some(100.0)]);
        assert_eq!(rate, RATE_CEILING);
        assert_eq!(adjusted_rate(5.0, std::iter::empty()), 5.0);
        assert_eq!(adjusted_rate(0.0, [Some(50.0)]), 0.0);
    }

    #[test]
    fn floor_keeps_the_logarithm_finite() {
        let rate = adjusted_rate(10.0, [None, Some(0.0), Some(-3.0)]);
        assert!(rate.is_finite());
        assert_relative_eq!(rate, RATE_FLOOR, epsilon = 1e-12);
    }
}
