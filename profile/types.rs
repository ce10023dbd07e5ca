// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// Only types passed between modules live here. Module-private types stay with
// the code that uses them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The dense position of a drug in the dataset's enumeration order.
///
/// Every per-option rate table in a compiled [`crate::Dataset`] is indexed by this
/// value, so a `DrugIndex` obtained from one dataset is only meaningful for that
/// dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrugIndex(pub usize);

impl fmt::Display for DrugIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drug#{}", self.0)
    }
}

/// One row of engine output: the estimate for a single drug.
///
/// All numeric fields are rounded to two decimal places. Rounding happens exactly
/// once, when the row is built, never inside the combination arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResult {
    pub drug: String,
    /// The adjusted prevalence, in percent, clamped to `[0, 95]`.
    pub rate: f64,
    /// The population-wide prevalence, in percent.
    pub baseline_rate: f64,
    /// `rate / baseline_rate`, computed before rounding. `1.0` for a zero baseline.
    pub multiplier: f64,
    /// The legal classification label. May be empty.
    pub classification: String,
}

/// Rounds a percentage to two decimal places, half away from zero.
#[inline]
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Names the kind of a JSON value for error messages ("a string", "null", ...).
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
