use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/synthetic_survey.json")
}

fn dossier(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dossier"))
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("run dossier cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

#[test]
fn predict_emits_a_ranked_json_profile() {
    let dataset = fixture();
    let output = dossier(&[
        "predict",
        "--dataset",
        dataset.to_str().expect("path str"),
        "--answer",
        "nightclub=4 or more visits",
        "--answer",
        "age=20–24",
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);

    let profile: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json profile");
    assert_eq!(profile["answered"], 2);
    assert_eq!(profile["questions"], 3);
    assert_eq!(profile["verdict"], "partying");

    let results = profile["results"].as_array().expect("results array");
    assert_eq!(results.len(), 6);
    assert_eq!(results[0]["drug"], "Cannabis");
    let rates: Vec<f64> = results
        .iter()
        .map(|r| r["rate"].as_f64().expect("numeric rate"))
        .collect();
    assert!(rates.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn predict_reads_answers_from_a_file_and_the_settings_file() {
    let tmp = tempdir().expect("temporary directory");
    fs::copy(fixture(), tmp.path().join("survey.json")).expect("copy fixture");
    let config_path = tmp.path().join("dossier.toml");
    fs::write(
        &config_path,
        "dataset = \"survey.json\"\n\n[verdict]\nbasis = \"absolute\"\n",
    )
    .expect("write settings");
    let answers_path = tmp.path().join("me.json");
    fs::write(&answers_path, r#"{"religion": "Christian", "nightclub": "None"}"#)
        .expect("write answers");

    let output = dossier(&[
        "predict",
        "--config",
        config_path.to_str().expect("path str"),
        "--answers",
        answers_path.to_str().expect("path str"),
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);

    let text = stdout(&output);
    assert!(text.contains("2 of 3 questions answered"), "unexpected report:\n{text}");
    assert!(text.contains("Verdict: Squeaky-clean"), "unexpected report:\n{text}");
}

#[test]
fn questions_are_listed_in_file_order() {
    let dataset = fixture();
    let output = dossier(&["questions", "--dataset", dataset.to_str().expect("path str")]);
    assert!(output.status.success());

    let text = stdout(&output);
    let age = text.find("age: How old are you?").expect("age question listed");
    let religion = text.find("religion:").expect("religion question listed");
    assert!(age < religion);
    assert!(text.contains("    1 to 3 visits"));
}

#[test]
fn batch_writes_one_row_per_respondent_and_refuses_to_overwrite() {
    let tmp = tempdir().expect("temporary directory");
    let respondents = tmp.path().join("respondents.jsonl");
    fs::write(
        &respondents,
        "{\"id\": \"alice\", \"answers\": {\"age\": \"20–24\"}}\n\
         \n\
         {\"religion\": \"Christian\"}\n\
         {\"id\": 7, \"answers\": {}}\n",
    )
    .expect("write respondents");
    let out = tmp.path().join("scores.tsv");
    let dataset = fixture();
    let args = [
        "batch",
        "--dataset",
        dataset.to_str().expect("path str"),
        respondents.to_str().expect("path str"),
        "--out",
        out.to_str().expect("path str"),
    ];

    let output = dossier(&args);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);

    let table = fs::read_to_string(&out).expect("read scores");
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(
        lines[0],
        "id\tanswered\tany_drug\tverdict\tCannabis\tCocaine\tEcstasy\tKetamine\tNitrous oxide\tHeroin"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("alice\t1\t"));
    assert!(lines[2].starts_with("3\t1\t"));
    assert!(lines[3].starts_with("7\t0\t"));
    assert!(lines[3].contains("\taverage\t"));

    let again = dossier(&args);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));
    assert_eq!(fs::read_to_string(&out).expect("read scores"), table);
}

#[test]
fn broken_dataset_fails_with_a_message() {
    let tmp = tempdir().expect("temporary directory");
    let dataset = tmp.path().join("broken.json");
    fs::write(
        &dataset,
        r#"{"baseline": {"Cannabis": 8.0}, "drug_classes": {}, "questions": [
            {"id": "age", "question": "Age?", "options": {"20–24": {"Cannabis": "lots"}}}
        ]}"#,
    )
    .expect("write dataset");

    let output = dossier(&["check", "--dataset", dataset.to_str().expect("path str")]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was:\n{stderr}");
    assert!(stderr.contains("Cannabis"), "stderr was:\n{stderr}");
}

#[test]
fn check_summarizes_a_valid_dataset() {
    let dataset = fixture();
    let output = dossier(&["check", "--dataset", dataset.to_str().expect("path str")]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Drugs:     6"));
    assert!(text.contains("Questions: 3"));
    assert!(text.contains("Most common drug: Cannabis (8.00%)"));
}

#[test]
fn missing_dataset_is_reported() {
    let output = dossier(&["questions"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No dataset given"));
}
