use std::{io, path::PathBuf};

use idemsql_core::AnomalyKind;
use miette::Report;

const BATCH_CONTEXT: &str = "while rewriting migrations";
const FILE_CONTEXT: &str = "while rewriting migration";
const STDIN_READ_CONTEXT: &str = "while reading migration from stdin";
const OUTPUT_CONTEXT: &str = "while writing the report";
const CONFIG_READ_CONTEXT: &str = "while reading config file";
const CONFIG_PARSE_CONTEXT: &str = "while parsing config file";

const USAGE_EXIT_CODE: u8 = 2;
const FAILURE_EXIT_CODE: u8 = 1;

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    MissingInput,
    ReadStdin(io::Error),
    WriteOutput(io::Error),
    ReadConfig {
        path: PathBuf,
        source: io::Error,
    },
    ParseConfig {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    Core(idemsql_core::Error),
}

impl From<idemsql_core::Error> for CliError {
    fn from(value: idemsql_core::Error) -> Self {
        Self::Core(value)
    }
}

impl CliError {
    pub(crate) const fn exit_code(&self) -> u8 {
        match self {
            Self::MissingInput
            | Self::ReadConfig { .. }
            | Self::ParseConfig { .. }
            | Self::Core(idemsql_core::Error::Config(_)) => USAGE_EXIT_CODE,
            Self::ReadStdin(_) | Self::WriteOutput(_) | Self::Core(_) => FAILURE_EXIT_CODE,
        }
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::MissingInput => format!("[usage] {}", missing_input_message()),
        CliError::ReadStdin(source) => {
            let report = report_with_context(source, STDIN_READ_CONTEXT);
            format!("[io] {report}")
        }
        CliError::WriteOutput(source) => {
            let report = report_with_context(source, OUTPUT_CONTEXT);
            format!("[io] {report}")
        }
        CliError::ReadConfig { path, source } => {
            let context = format!("{CONFIG_READ_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[config] {report}")
        }
        CliError::ParseConfig { path, source } => {
            let context = format!("{CONFIG_PARSE_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[config] {report}")
        }
        CliError::Core(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, BATCH_CONTEXT);
            format!("[{category}] {report}")
        }
    }
}

/// Renders the error that stopped one file of a batch.
pub(crate) fn render_file_failure(path: PathBuf, error: idemsql_core::Error) -> String {
    let category = core_category(&error);
    let context = format!("{FILE_CONTEXT} `{}`", path.display());
    let report = report_with_context(error, context);
    format!("[{category}] {report}")
}

pub(crate) const fn anomaly_category(kind: AnomalyKind) -> &'static str {
    match kind {
        AnomalyKind::MalformedGuardTarget => "reconcile",
        AnomalyKind::UnterminatedStatement
        | AnomalyKind::UnguardableStatement
        | AnomalyKind::NestedGuardBlock => "scan",
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let anyhow_error = anyhow::Error::new(source).context(context.into());
    miette::miette!("{anyhow_error:#}")
}

fn core_category(error: &idemsql_core::Error) -> &'static str {
    match error {
        idemsql_core::Error::Scan(_) => "scan",
        idemsql_core::Error::Reconcile(_) => "reconcile",
        idemsql_core::Error::Io { .. } => "io",
        idemsql_core::Error::Config(_) => "config",
    }
}

fn missing_input_message() -> &'static str {
    "missing migrations: pass a directory or --stdin"
}
