use std::path::PathBuf;

mod yaml_runner;

pub use yaml_runner::{
    CaseFile, CaseLoadError, RewriteCase, TestResult, load_rewrite_cases_from_dir,
    load_rewrite_cases_from_str, run_rewrite_case,
};

/// The workspace-level `tests/cases` directory.
#[must_use]
pub fn cases_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/cases")
}
