// ========================================================================================
//
//                      Answer intake: from caller input to an AnswerSet
//
// ========================================================================================
//
// An `AnswerSet` is transport agnostic. This module builds one from JSON objects,
// from `id=label` pairs and from JSON-Lines respondent files. It does not check
// answers against a dataset: unknown question ids and option labels are carried
// through and the engine ignores them.

use crate::types::json_kind;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("Failed to read answers from '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Answers are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Answers must be a JSON object mapping question ids to option labels, but found {0}.")]
    NotAnObject(&'static str),

    #[error("Malformed answer '{0}'. Expected the form QUESTION_ID=OPTION_LABEL.")]
    MalformedPair(String),

    #[error("Line {line} of the respondent file is invalid: {details}")]
    InvalidRespondent { line: usize, details: String },
}

/// A respondent's chosen option per question id.
///
/// Entries are kept sorted by question id so that serialized answer sets are
/// deterministic. The map may hold ids and labels that no dataset knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSet {
    entries: BTreeMap<String, String>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an answer, returning the label it replaced, if any.
    pub fn insert(
        &mut self,
        question_id: impl Into<String>,
        option: impl Into<String>,
    ) -> Option<String> {
        self.entries.insert(question_id.into(), option.into())
    }

    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.entries.get(question_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copies every answer from `other` into `self`; `other` wins on conflicts.
    pub fn extend_from(&mut self, other: AnswerSet) {
        self.entries.extend(other.entries);
    }

    /// Parses a JSON object of `question_id -> option_label`.
    ///
    /// Members whose value is not a string are dropped, matching the engine's
    /// "ignore what you do not recognize" policy. Only a document that is not an
    /// object at all is an error.
    pub fn from_json_str(text: &str) -> Result<Self, AnswerError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, AnswerError> {
        let members = match value {
            Value::Object(members) => members,
            other => return Err(AnswerError::NotAnObject(json_kind(&other))),
        };
        let mut answers = AnswerSet::new();
        for (id, label) in members {
            match label {
                Value::String(label) => {
                    answers.insert(id, label);
                }
                other => log::debug!("Dropping answer '{id}': expected a string, found {other}"),
            }
        }
        Ok(answers)
    }

    /// Reads a JSON answer object from a file.
    pub fn load(path: &Path) -> Result<Self, AnswerError> {
        let text = std::fs::read_to_string(path).map_err(|source| AnswerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Builds an answer set from `id=label` strings, as given on a command line.
    ///
    /// Only the first `=` separates id from label, so labels may contain `=`.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, AnswerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut answers = AnswerSet::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (id, label) = pair
                .split_once('=')
                .map(|(id, label)| (id.trim(), label.trim()))
                .filter(|(id, _)| !id.is_empty())
                .ok_or_else(|| AnswerError::MalformedPair(pair.to_string()))?;
            answers.insert(id, label);
        }
        Ok(answers)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut answers = AnswerSet::new();
        for (id, label) in iter {
            answers.insert(id, label);
        }
        answers
    }
}

/// One entry of a batch input file.
#[derive(Debug, Clone, PartialEq)]
pub struct Respondent {
    pub id: String,
    pub answers: AnswerSet,
}

/// Reads a JSON-Lines respondent file. See [`parse_respondents`] for the format.
pub fn read_respondents(path: &Path) -> Result<Vec<Respondent>, AnswerError> {
    let file = File::open(path).map_err(|source| AnswerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_respondents(BufReader::new(file)).map_err(|e| match e {
        AnswerError::Io { source, .. } => AnswerError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses respondents, one JSON object per line. Blank lines are skipped.
///
/// A line shaped `{"id": "r1", "answers": {...}}` names its respondent; any other
/// object is taken as the answers themselves. Respondents without an id are named
/// after their 1-based line number.
pub fn parse_respondents<R: BufRead>(reader: R) -> Result<Vec<Respondent>, AnswerError> {
    let mut respondents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| match source.kind() {
            io::ErrorKind::InvalidData => AnswerError::InvalidRespondent {
                line: line_number,
                details: "not valid UTF-8".to_string(),
            },
            _ => AnswerError::Io {
                path: PathBuf::from("<respondents>"),
                source,
            },
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let invalid = |details: String| AnswerError::InvalidRespondent {
            line: line_number,
            details,
        };
        let value: Value = serde_json::from_str(&line).map_err(|e| invalid(e.to_string()))?;
        let mut members = match value {
            Value::Object(members) => members,
            other => {
                return Err(invalid(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )));
            }
        };

        let (id, answers) = match members.remove("answers") {
            Some(answers) => {
                let id = match members.remove("id") {
                    Some(Value::String(id)) => id,
                    Some(Value::Number(n)) => n.to_string(),
                    _ => line_number.to_string(),
                };
                if id.contains(['\t', '\r', '\n']) {
                    return Err(invalid(format!(
                        "respondent id {id:?} contains a tab or line break"
                    )));
                }
                (id, answers)
            }
            None => (line_number.to_string(), Value::Object(members)),
        };
        let answers = AnswerSet::from_json_value(answers).map_err(|e| invalid(e.to_string()))?;
        respondents.push(Respondent { id, answers });
    }
    Ok(respondents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn json_objects_keep_string_members_only() {
        let answers =
            AnswerSet::from_json_str(r#"{"age": "20–24", "sex": "Male", "pub": 3, "x": null}"#)
                .unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("age"), Some("20–24"));
        assert_eq!(answers.get("pub"), None);
    }

    #[test]
    fn json_non_objects_are_rejected() {
        assert!(matches!(
            AnswerSet::from_json_str(r#"["age", "sex"]"#),
            Err(AnswerError::NotAnObject("an array"))
        ));
        assert!(matches!(
            AnswerSet::from_json_str("{ not json"),
            Err(AnswerError::Json(_))
        ));
    }

    #[test]
    fn empty_object_is_a_valid_empty_set() {
        let answers = AnswerSet::from_json_str("{}").unwrap();
        assert!(answers.is_empty());
    }

    #[test]
    fn pairs_split_on_first_equals() {
        let answers = AnswerSet::from_pairs(["sex=Male", " region = London ", "note=a=b"]).unwrap();
        assert_eq!(answers.get("sex"), Some("Male"));
        assert_eq!(answers.get("region"), Some("London"));
        assert_eq!(answers.get("note"), Some("a=b"));

        assert!(matches!(
            AnswerSet::from_pairs(["sex"]),
            Err(AnswerError::MalformedPair(ref p)) if p == "sex"
        ));
        assert!(AnswerSet::from_pairs(["=Male"]).is_err());
    }

    #[test]
    fn later_answers_override_earlier_ones() {
        let mut base: AnswerSet = [("sex", "Male"), ("age", "16–19")].into_iter().collect();
        let overrides: AnswerSet = [("sex", "Female")].into_iter().collect();
        base.extend_from(overrides);
        assert_eq!(base.get("sex"), Some("Female"));
        assert_eq!(base.get("age"), Some("16–19"));
        assert_eq!(base.insert("age", "20–24"), Some("16–19".to_string()));
    }

    #[test]
    fn iteration_is_sorted_by_question_id() {
        let answers: AnswerSet = [("sex", "Male"), ("age", "16–19"), ("pub", "None")]
            .into_iter()
            .collect();
        let ids: Vec<&str> = answers.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["age", "pub", "sex"]);
    }

    #[test]
    fn respondents_accept_both_line_shapes() {
        let input = concat!(
            r#"{"id": "alice", "answers": {"sex": "Female"}}"#,
            "\n\n",
            r#"{"sex": "Male", "age": "20–24"}"#,
            "\n",
            r#"{"id": 7, "answers": {}}"#,
            "\n",
        );
        let respondents = parse_respondents(Cursor::new(input)).unwrap();
        assert_eq!(respondents.len(), 3);
        assert_eq!(respondents[0].id, "alice");
        assert_eq!(respondents[0].answers.get("sex"), Some("Female"));
        assert_eq!(respondents[1].id, "3");
        assert_eq!(respondents[1].answers.len(), 2);
        assert_eq!(respondents[2].id, "7");
        assert!(respondents[2].answers.is_empty());
    }

    #[test]
    fn respondent_errors_carry_the_line_number() {
        let input = "{\"sex\": \"Male\"}\n[1, 2]\n";
        match parse_respondents(Cursor::new(input)) {
            Err(AnswerError::InvalidRespondent { line, details }) => {
                assert_eq!(line, 2);
                assert!(details.contains("an array"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ids_that_would_break_a_table_row_are_rejected() {
        let input = concat!(
            r#"{"id": "ok", "answers": {}}"#,
            "\n",
            r#"{"id": "a\tb\nc", "answers": {"sex": "Male"}}"#,
            "\n",
        );
        match parse_respondents(Cursor::new(input)) {
            Err(AnswerError::InvalidRespondent { line, details }) => {
                assert_eq!(line, 2);
                assert!(details.contains("tab or line break"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_reported_with_its_line() {
        let mut input = b"{\"sex\": \"Male\"}\n".to_vec();
        input.extend_from_slice(b"{\"sex\": \"\xff\"}\n");
        match parse_respondents(Cursor::new(input)) {
            Err(AnswerError::InvalidRespondent { line, details }) => {
                assert_eq!(line, 2);
                assert_eq!(details, "not valid UTF-8");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
