mod error_presentation;
mod report;

use std::{
    fs,
    io::{self, Read, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{ArgAction, Parser};
use error_presentation::{CliError, CliResult, render_file_failure, render_runtime_error};
use idemsql_core::{
    BatchDriver, BatchMode, BatchOptions, FileStatus, RewriteConfig, rewrite_document,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STDIN_LABEL: &str = "<stdin>";

#[derive(Debug, Parser)]
#[command(
    name = "idemsql",
    version,
    about = "Rewrite SQL migrations so that re-running them is harmless"
)]
struct Cli {
    /// Directory holding the `*.sql` migrations.
    #[arg(required_unless_present = "stdin", conflicts_with = "stdin")]
    dir: Option<PathBuf>,

    /// Rewrite one document from stdin and print it to stdout.
    #[arg(long)]
    stdin: bool,

    /// Report what would change without writing any file.
    #[arg(long)]
    dry_run: bool,

    /// Like --dry-run, but exit 1 when any migration would change.
    #[arg(long)]
    check: bool,

    /// YAML file with rewrite toggles.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Worker threads for directory mode.
    #[arg(short, long, value_name = "N")]
    jobs: Option<NonZeroUsize>,

    /// Repeat for more log output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

enum Outcome {
    Clean,
    Drift,
    Failures,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::Drift | Outcome::Failures) => ExitCode::from(1),
        Err(error) => {
            let code = error.exit_code();
            eprintln!("{}", render_runtime_error(error));
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> CliResult<Outcome> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RewriteConfig::default(),
    };
    config
        .validate()
        .map_err(|error| CliError::Core(idemsql_core::Error::Config(error)))?;

    if cli.stdin {
        return rewrite_stdin(&config, cli.check);
    }
    let Some(dir) = &cli.dir else {
        return Err(CliError::MissingInput);
    };

    let mode = if cli.dry_run || cli.check {
        BatchMode::DryRun
    } else {
        BatchMode::Write
    };
    let mut options = BatchOptions {
        mode,
        ..BatchOptions::default()
    };
    if let Some(jobs) = cli.jobs {
        options.jobs = jobs;
    }
    rewrite_directory(dir, config, options, cli.check)
}

fn load_config(path: &Path) -> CliResult<RewriteConfig> {
    let yaml = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    if yaml.trim().is_empty() {
        debug!(path = %path.display(), "config file is empty, using defaults");
        return Ok(RewriteConfig::default());
    }
    let config = serde_yaml::from_str(&yaml).map_err(|source| CliError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?config, "loaded rewrite config");
    Ok(config)
}

fn rewrite_stdin(config: &RewriteConfig, check: bool) -> CliResult<Outcome> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(CliError::ReadStdin)?;

    let outcome = rewrite_document(&source, config);
    info!(
        statements = outcome.statements,
        rewritten = outcome.rewritten,
        anomalies = outcome.anomalies.len(),
        "rewrote stdin"
    );

    let mut stderr = io::stderr().lock();
    report::write_anomalies(&mut stderr, Path::new(STDIN_LABEL), &outcome.anomalies)
        .map_err(CliError::WriteOutput)?;

    if check {
        return Ok(if outcome.changed {
            Outcome::Drift
        } else {
            Outcome::Clean
        });
    }

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(outcome.text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(CliError::WriteOutput)?;
    Ok(Outcome::Clean)
}

fn rewrite_directory(
    dir: &Path,
    config: RewriteConfig,
    options: BatchOptions,
    check: bool,
) -> CliResult<Outcome> {
    let mode = options.mode;
    let driver = BatchDriver::new(config, options)?;
    let batch = driver.run(dir)?;
    info!(
        dir = %dir.display(),
        scanned = batch.scanned(),
        modified = batch.modified(),
        "batch finished"
    );

    let mut stdout = io::stdout().lock();
    report::write_batch_report(&mut stdout, &batch, mode).map_err(CliError::WriteOutput)?;

    let drift = check && batch.modified() > 0;
    let mut failures = 0_usize;
    for file in batch.files {
        if let FileStatus::Failed(error) = file.status {
            failures += 1;
            eprintln!("{}", render_file_failure(file.path, error));
        }
    }

    Ok(if failures > 0 {
        Outcome::Failures
    } else if drift {
        Outcome::Drift
    } else {
        Outcome::Clean
    })
}
