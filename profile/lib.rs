#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod answers;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod predict;
pub mod report;
pub mod types;
pub mod verdict;

pub use answers::AnswerSet;
pub use dataset::{Dataset, DatasetError};
pub use predict::PredictionEngine;
pub use types::{DrugIndex, DrugResult};
pub use verdict::{Verdict, VerdictBasis, VerdictScale, any_drug_estimate};
