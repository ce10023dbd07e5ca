//! # Survey Dataset Store
//!
//! This module is the exclusive entry point for the survey lookup table. It reads
//! the pre-extracted JSON document, validates it against a strict schema, and
//! compiles it into a read-only [`Dataset`] whose per-option rate tables are
//! aligned with the drug enumeration order.
//!
//! - Strict Schema: the document must carry `baseline`, `drug_classes` and
//!   `questions`. Every drug named anywhere must appear in `baseline`.
//! - Fail Early: a structurally broken table is rejected here, at startup, with a
//!   `DatasetError` describing where the problem is. Nothing downstream ever has
//!   to second-guess the data.
//! - Order Preserving: drugs, questions and options keep the order of the source
//!   file, which is the tie-break order for ranked output.

use crate::types::{DrugIndex, json_kind};
use ahash::AHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The largest prevalence a survey cell may hold, in percent.
const MAX_SOURCE_RATE: f64 = 100.0;

/// A comprehensive error type for everything that can be wrong with a dataset file.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "The dataset is not a valid survey document: {0}. Expected top-level 'baseline', 'drug_classes' and 'questions' members."
    )]
    Json(#[from] serde_json::Error),

    #[error("The dataset's 'baseline' mapping is empty. At least one drug is required.")]
    NoDrugs,

    #[error("The rate for drug '{drug}' in {context} must be a number, but found {found}.")]
    NonNumericRate {
        context: String,
        drug: String,
        found: &'static str,
    },

    #[error("The rate {value} for drug '{drug}' in {context} is outside the valid range [0, 100].")]
    RateOutOfRange {
        context: String,
        drug: String,
        value: f64,
    },

    #[error("Drug '{drug}' is referenced in {context} but has no entry in 'baseline'.")]
    UnknownDrug { context: String, drug: String },

    #[error("The classification for drug '{drug}' must be a string, but found {found}.")]
    NonStringClassification { drug: String, found: &'static str },

    #[error("Question id '{0}' appears more than once in 'questions'.")]
    DuplicateQuestion(String),

    #[error("Question '{0}' does not define any options.")]
    EmptyQuestion(String),

    #[error(
        "Option '{option}' of question '{question}' must map drug names to rates, but found {found}."
    )]
    MissingOptionRates {
        question: String,
        option: String,
        found: &'static str,
    },
}

/// A drug known to the survey.
#[derive(Debug, Clone, PartialEq)]
pub struct Drug {
    pub name: String,
    /// The population-wide prevalence, in percent.
    pub baseline: f64,
    /// The legal classification label, empty when the source has none.
    pub classification: String,
}

/// One answer a respondent can pick for a [`Question`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionOption {
    label: String,
    /// Demographic prevalence per drug, indexed by `DrugIndex`. `None` where the
    /// source table has no cell for that drug.
    rates: Vec<Option<f64>>,
}

impl QuestionOption {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The demographic prevalence of `drug` among respondents who chose this option.
    #[inline]
    pub fn rate(&self, drug: DrugIndex) -> Option<f64> {
        self.rates.get(drug.0).copied().flatten()
    }
}

/// A demographic question and its ordered options.
#[derive(Debug, Clone)]
pub struct Question {
    id: String,
    prompt: String,
    options: Vec<QuestionOption>,
    option_index: AHashMap<String, usize>,
}

impl Question {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    /// Looks up an option by its exact label.
    pub fn option(&self, label: &str) -> Option<&QuestionOption> {
        self.option_index.get(label).map(|&i| &self.options[i])
    }
}

/// The validated, immutable survey lookup table.
///
/// A `Dataset` is built once at startup and then only ever read. It holds no
/// interior mutability, so it can be shared by reference across threads.
#[derive(Debug, Clone)]
pub struct Dataset {
    drugs: Vec<Drug>,
    drug_index: AHashMap<String, DrugIndex>,
    questions: Vec<Question>,
    question_index: AHashMap<String, usize>,
}

impl Dataset {
    /// Reads and validates a dataset from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_json_str(&text)?;
        log::info!(
            "Loaded survey dataset '{}': {} drugs, {} questions, {} options",
            path.display(),
            dataset.drugs.len(),
            dataset.questions.len(),
            dataset.option_count()
        );
        Ok(dataset)
    }

    /// Validates a dataset held in a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, DatasetError> {
        let raw: RawDataset = serde_json::from_str(text)?;
        compile(raw)
    }

    /// Validates a dataset from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, DatasetError> {
        let raw: RawDataset = serde_json::from_value(value)?;
        compile(raw)
    }

    /// All drugs, in source order.
    pub fn drugs(&self) -> &[Drug] {
        &self.drugs
    }

    pub fn drug(&self, index: DrugIndex) -> Option<&Drug> {
        self.drugs.get(index.0)
    }

    pub fn drug_index(&self, name: &str) -> Option<DrugIndex> {
        self.drug_index.get(name).copied()
    }

    /// All questions, in source order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.question_index.get(id).map(|&i| &self.questions[i])
    }

    /// The total number of options across every question.
    pub fn option_count(&self) -> usize {
        self.questions.iter().map(|q| q.options.len()).sum()
    }
}

// ========================================================================================
//                              Raw document and compilation
// ========================================================================================

// The raw shape mirrors the JSON file. Mappings stay as `serde_json::Map` so that
// key order survives (the `preserve_order` feature) and so that value errors can
// be reported with the drug and question they belong to.
#[derive(Deserialize)]
struct RawDataset {
    baseline: Map<String, Value>,
    drug_classes: Map<String, Value>,
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    id: String,
    question: String,
    options: Map<String, Value>,
}

fn compile(raw: RawDataset) -> Result<Dataset, DatasetError> {
    if raw.baseline.is_empty() {
        return Err(DatasetError::NoDrugs);
    }

    let mut drugs = Vec::with_capacity(raw.baseline.len());
    let mut drug_index = AHashMap::with_capacity(raw.baseline.len());
    for (name, value) in &raw.baseline {
        let baseline = parse_rate(value, name, "baseline")?;
        if baseline <= 0.0 {
            log::warn!("Drug '{name}' has a zero baseline and will always be reported at 0%");
        }
        drug_index.insert(name.clone(), DrugIndex(drugs.len()));
        drugs.push(Drug {
            name: name.clone(),
            baseline,
            classification: String::new(),
        });
    }

    for (name, value) in &raw.drug_classes {
        let index = lookup_drug(&drug_index, name, "drug_classes")?;
        let label = value
            .as_str()
            .ok_or_else(|| DatasetError::NonStringClassification {
                drug: name.clone(),
                found: json_kind(value),
            })?;
        drugs[index.0].classification = label.to_string();
    }

    let mut questions = Vec::with_capacity(raw.questions.len());
    let mut question_index = AHashMap::with_capacity(raw.questions.len());
    for raw_question in raw.questions {
        if question_index.contains_key(&raw_question.id) {
            return Err(DatasetError::DuplicateQuestion(raw_question.id));
        }
        let question = compile_question(raw_question, &drug_index, drugs.len())?;
        question_index.insert(question.id.clone(), questions.len());
        questions.push(question);
    }

    Ok(Dataset {
        drugs,
        drug_index,
        questions,
        question_index,
    })
}

fn compile_question(
    raw: RawQuestion,
    drug_index: &AHashMap<String, DrugIndex>,
    drug_count: usize,
) -> Result<Question, DatasetError> {
    if raw.options.is_empty() {
        return Err(DatasetError::EmptyQuestion(raw.id));
    }

    let mut options = Vec::with_capacity(raw.options.len());
    let mut option_index = AHashMap::with_capacity(raw.options.len());
    for (label, value) in &raw.options {
        let cells = value
            .as_object()
            .ok_or_else(|| DatasetError::MissingOptionRates {
                question: raw.id.clone(),
                option: label.clone(),
                found: json_kind(value),
            })?;

        let context = format!("question '{}' option '{}'", raw.id, label);
        let mut rates = vec![None; drug_count];
        for (drug, cell) in cells {
            let index = lookup_drug(drug_index, drug, &context)?;
            rates[index.0] = Some(parse_rate(cell, drug, &context)?);
        }
        if rates.iter().all(|r| r.is_none_or(|v| v <= 0.0)) {
            log::warn!("{context} has no positive rates; every drug will use the floor rate");
        }

        option_index.insert(label.clone(), options.len());
        options.push(QuestionOption {
            label: label.clone(),
            rates,
        });
    }

    Ok(Question {
        id: raw.id,
        prompt: raw.question,
        options,
        option_index,
    })
}

fn parse_rate(value: &Value, drug: &str, context: &str) -> Result<f64, DatasetError> {
    let rate = value.as_f64().ok_or_else(|| DatasetError::NonNumericRate {
        context: context.to_string(),
        drug: drug.to_string(),
        found: json_kind(value),
    })?;
    if !(0.0..=MAX_SOURCE_RATE).contains(&rate) {
        return Err(DatasetError::RateOutOfRange {
            context: context.to_string(),
            drug: drug.to_string(),
            value: rate,
        });
    }
    Ok(rate)
}

fn lookup_drug(
    drug_index: &AHashMap<String, DrugIndex>,
    drug: &str,
    context: &str,
) -> Result<DrugIndex, DatasetError> {
    drug_index
        .get(drug)
        .copied()
        .ok_or_else(|| DatasetError::UnknownDrug {
            context: context.to_string(),
            drug: drug.to_string(),
        })
}
