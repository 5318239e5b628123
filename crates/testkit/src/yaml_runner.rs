use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use idemsql_core::{RewriteConfig, RewriteOutcome, rewrite_document};
use serde::Deserialize;
use thiserror::Error;

const CASE_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// One rewrite expectation. Without `output` the input must come back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteCase {
    pub input: String,
    pub output: Option<String>,
    /// Anomaly tags in document order, e.g. `unterminated_statement`.
    pub anomalies: Vec<String>,
    pub config: Option<RewriteConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CaseFile {
    pub path: PathBuf,
    pub file_name: String,
    pub cases: BTreeMap<String, RewriteCase>,
}

#[derive(Debug, Error)]
pub enum CaseLoadError {
    #[error("read `{}` failed", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid rewrite cases in {origin}{}", location_suffix(*line, *column))]
    Parse {
        origin: String,
        line: Option<usize>,
        column: Option<usize>,
        #[source]
        source: serde_yaml::Error,
    },
}

fn location_suffix(line: Option<usize>, column: Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

pub fn load_rewrite_cases_from_str(yaml: &str) -> Result<BTreeMap<String, RewriteCase>, CaseLoadError> {
    parse_cases(yaml, "inline yaml")
}

/// Loads every `*.yml` / `*.yaml` file directly inside `dir`, sorted by
/// file name.
pub fn load_rewrite_cases_from_dir(dir: impl AsRef<Path>) -> Result<Vec<CaseFile>, CaseLoadError> {
    let dir = dir.as_ref();
    let read_error = |source| CaseLoadError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_case_file = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| CASE_EXTENSIONS.contains(&extension));
        if path.is_file() && is_case_file {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let yaml = fs::read_to_string(&path).map_err(|source| CaseLoadError::Read {
                path: path.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let cases = parse_cases(&yaml, &path.display().to_string())?;
            Ok(CaseFile {
                path,
                file_name,
                cases,
            })
        })
        .collect()
}

fn parse_cases(yaml: &str, origin: &str) -> Result<BTreeMap<String, RewriteCase>, CaseLoadError> {
    serde_yaml::from_str(yaml).map_err(|source| CaseLoadError::Parse {
        origin: origin.to_string(),
        line: source.location().map(|location| location.line()),
        column: source.location().map(|location| location.column()),
        source,
    })
}

/// Rewrites the case input, compares output and anomalies, then checks that
/// a second rewrite of the output is a no-op.
pub fn run_rewrite_case(case: &RewriteCase) -> TestResult {
    let config = case.config.clone().unwrap_or_default();
    if let Err(error) = config.validate() {
        return TestResult::Failed(format!("invalid case config: {error}"));
    }

    let first = rewrite_document(&case.input, &config);
    let expected = case.output.as_deref().unwrap_or(&case.input);
    if expected != first.text {
        return TestResult::Failed(format!(
            "output mismatch; expected:\n{expected:?}\nactual:\n{:?}",
            first.text
        ));
    }

    let actual_tags = anomaly_tags(&first);
    if actual_tags != case.anomalies {
        return TestResult::Failed(format!(
            "anomaly mismatch; expected {:?}, actual {:?}",
            case.anomalies, actual_tags
        ));
    }

    let second = rewrite_document(&first.text, &config);
    if second.text != first.text {
        return TestResult::Failed(format!(
            "rewrite is not idempotent; second pass produced:\n{}",
            second.text.trim()
        ));
    }

    TestResult::Passed
}

fn anomaly_tags(outcome: &RewriteOutcome) -> Vec<String> {
    outcome
        .anomalies
        .iter()
        .map(|anomaly| anomaly.kind.tag().to_string())
        .collect()
}
