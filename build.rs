use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources. Nothing else is scanned.
const SOURCE_ROOTS: [&str; 4] = ["profile", "cli", "tests", "benches"];
const BUILD_SCRIPT: &str = "build.rs";

// One hygiene rule: a line regex, a filter deciding whether a matched line is a
// real violation, and the advice printed when it is.
struct Rule {
    description: &'static str,
    pattern: &'static str,
    is_violation: fn(&str) -> bool,
    advice: &'static str,
    // The build script quotes the patterns it looks for, so only the identifier
    // rule is applied to it.
    applies_to_build_script: bool,
}

const RULES: [Rule; 5] = [
    Rule {
        description: "underscore-prefixed identifiers",
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        is_violation: underscore_outside_comments_and_strings,
        advice: "Underscore-prefixed names are not allowed in this project.\n   \
                 Either use the binding (dropping the underscore) or remove it.",
        applies_to_build_script: true,
    },
    Rule {
        description: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        is_violation: always,
        advice: "#[allow(dead_code)] is STRICTLY FORBIDDEN in this project.\n   \
                 Either use the code or remove it completely.",
        applies_to_build_script: false,
    },
    Rule {
        description: "forbidden words in comments",
        pattern: r"(//|/\*|///).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        is_violation: always,
        advice: "Comments must describe the code as it is, not its history.\n   \
                 Remove change-log words from comments instead of commenting them out.",
        applies_to_build_script: false,
    },
    Rule {
        description: "'**' in regular comments",
        pattern: r"(//|/\*).*\*\*",
        is_violation: not_a_doc_comment,
        advice: "The '**' pattern is only allowed in doc comments.",
        applies_to_build_script: false,
    },
    Rule {
        description: "comments written entirely in uppercase",
        pattern: r"(//|/\*|///).*",
        is_violation: comment_is_all_uppercase,
        advice: "Comments where every letter is uppercase are not allowed.\n   \
                 STRONGLY CONSIDER deleting the comment completely.",
        applies_to_build_script: false,
    },
];

// Collects the violating lines of one file for one rule.
struct RuleCollector<'r> {
    rule: &'r Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl<'r> RuleCollector<'r> {
    fn new(rule: &'r Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn into_error_message(self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.description,
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.advice));
        Some(error_msg)
    }
}

impl Sink for RuleCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if (self.rule.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn always(_: &str) -> bool {
    true
}

fn is_doc_comment(line: &str) -> bool {
    line.trim_start().starts_with("///")
}

fn not_a_doc_comment(line: &str) -> bool {
    !is_doc_comment(line)
}

fn underscore_outside_comments_and_strings(line: &str) -> bool {
    let is_pure_comment = line.trim_start().starts_with("//")
        || (line.contains("/*") && !line.contains("*/match") && !line.contains("*/let"));

    // Odd-numbered segments between double quotes are string contents.
    let is_in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));

    !is_pure_comment && !is_in_string
}

fn comment_is_all_uppercase(line: &str) -> bool {
    let trimmed = line.trim_start();
    let comment_text = if let Some(rest) = trimmed.strip_prefix("///") {
        rest.trim()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        rest.trim()
    } else if let Some(idx) = line.find("/*") {
        let body = &line[idx + 2..];
        match body.find("*/") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        }
    } else {
        return false;
    };

    let mut letters = comment_text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let mut searcher = Searcher::new();
    let build_script = Path::new(BUILD_SCRIPT);

    for rule in &RULES {
        let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
        let targets = files
            .iter()
            .map(PathBuf::as_path)
            .chain(rule.applies_to_build_script.then_some(build_script));

        for path in targets {
            let mut collector = RuleCollector::new(rule, path);
            searcher.search_path(&matcher, path, &mut collector)?;
            if let Some(error_message) = collector.into_error_message() {
                return Err(error_message.into());
            }
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed={BUILD_SCRIPT}");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }
    println!("cargo:rerun-if-env-changed=DOSSIER_RELEASE_TAG");

    // The `eprintln!` is what makes the report visible in cargo's output.
    if let Err(e) = scan(&rust_sources()) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
