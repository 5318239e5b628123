use std::{fs, num::NonZeroUsize, path::Path};

use idemsql_core::{
    AnomalyKind, BatchDriver, BatchMode, BatchOptions, ConfigError, Error, FileStatus,
    RewriteConfig,
};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, contents: &[u8]) {
    fs::write(dir.join(name), contents)
        .unwrap_or_else(|error| panic!("failed to write fixture {name}: {error}"));
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name))
        .unwrap_or_else(|error| panic!("failed to read {name}: {error}"))
}

fn options(mode: BatchMode, jobs: usize) -> BatchOptions {
    BatchOptions {
        mode,
        jobs: NonZeroUsize::new(jobs).expect("jobs must be non-zero"),
    }
}

fn file_names(report: &idemsql_core::BatchReport) -> Vec<String> {
    report
        .files
        .iter()
        .map(|file| {
            file.path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[test]
fn write_mode_rewrites_changed_files_in_place_and_reports_in_name_order() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "003_seed.sql", b"INSERT INTO t VALUES (1);\n");
    write(dir.path(), "001_init.sql", b"CREATE TABLE t (id int);\n");
    write(dir.path(), "002_index.sql", b"CREATE INDEX t_idx ON t (id);\n");
    write(dir.path(), "README.md", b"CREATE TABLE not_a_migration (id int);\n");

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::Write, 3))
        .expect("default config is valid");
    let report = driver.run(dir.path()).expect("batch should run");

    assert_eq!(
        file_names(&report),
        vec!["001_init.sql", "002_index.sql", "003_seed.sql"]
    );
    assert_eq!(report.scanned(), 3);
    assert_eq!(report.modified(), 2);
    assert!(matches!(report.files[2].status, FileStatus::Unchanged));

    assert_eq!(
        read(dir.path(), "001_init.sql"),
        "CREATE TABLE IF NOT EXISTS t (id int);\n"
    );
    assert_eq!(
        read(dir.path(), "002_index.sql"),
        "CREATE INDEX IF NOT EXISTS t_idx ON t (id);\n"
    );
    assert_eq!(
        read(dir.path(), "README.md"),
        "CREATE TABLE not_a_migration (id int);\n"
    );
}

#[test]
fn second_batch_run_changes_nothing() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "001_init.sql",
        b"CREATE TABLE t (id int);\nCREATE POLICY p ON t USING (true);\n",
    );

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::Write, 1))
        .expect("default config is valid");
    let first = driver.run(dir.path()).expect("first run");
    assert_eq!(first.modified(), 1);
    let after_first = read(dir.path(), "001_init.sql");

    let second = driver.run(dir.path()).expect("second run");
    assert_eq!(second.modified(), 0);
    assert_eq!(read(dir.path(), "001_init.sql"), after_first);
}

#[test]
fn dry_run_reports_changes_without_writing() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "001_init.sql", b"CREATE TABLE t (id int);\n");

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::DryRun, 2))
        .expect("default config is valid");
    let report = driver.run(dir.path()).expect("batch should run");

    assert_eq!(report.modified(), 1);
    assert_eq!(read(dir.path(), "001_init.sql"), "CREATE TABLE t (id int);\n");
}

#[test]
fn unreadable_file_fails_alone() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "001_binary.sql", &[0xff, 0xfe, 0x00, 0x41]);
    write(dir.path(), "002_init.sql", b"CREATE TABLE t (id int);\n");

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::Write, 2))
        .expect("default config is valid");
    let report = driver.run(dir.path()).expect("batch should run");

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(
        &failed[0].status,
        FileStatus::Failed(Error::Io { operation: "read", .. })
    ));
    assert_eq!(report.modified(), 1);
    assert_eq!(
        fs::read(dir.path().join("001_binary.sql")).expect("binary file"),
        vec![0xff, 0xfe, 0x00, 0x41]
    );
}

#[test]
fn anomalies_are_attached_to_their_file() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "001_broken.sql",
        b"CREATE TABLE a (id int);\nCREATE TABLE b (id int",
    );
    write(dir.path(), "002_clean.sql", b"CREATE TABLE c (id int);\n");

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::DryRun, 1))
        .expect("default config is valid");
    let report = driver.run(dir.path()).expect("batch should run");

    let flagged: Vec<_> = report.flagged().collect();
    assert_eq!(flagged.len(), 1);
    assert!(flagged[0].path.ends_with("001_broken.sql"));
    assert_eq!(
        flagged[0].anomalies[0].kind,
        AnomalyKind::UnterminatedStatement
    );
    assert!(flagged[0].is_modified());
}

#[test]
fn missing_directory_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nope");
    let error = BatchDriver::collect_migrations(&missing).expect_err("missing dir must fail");
    assert!(matches!(error, Error::Io { .. }));
    assert!(error.to_string().contains("read directory"));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = RewriteConfig {
        indent: 40,
        ..RewriteConfig::default()
    };
    let error = BatchDriver::new(config, BatchOptions::default())
        .err()
        .expect("indent over the limit must be rejected");
    assert!(matches!(
        error,
        Error::Config(ConfigError::IndentTooWide { actual: 40, max: 16 })
    ));
}

#[test]
fn parallel_workers_cover_every_file_and_keep_name_order() {
    let dir = tempdir().expect("tempdir");
    for index in (0..24).rev() {
        write(
            dir.path(),
            &format!("{index:03}_table.sql"),
            format!("CREATE TABLE t{index} (id int);\n").as_bytes(),
        );
    }

    let driver = BatchDriver::new(RewriteConfig::default(), options(BatchMode::Write, 4))
        .expect("default config is valid");
    let report = driver.run(dir.path()).expect("batch should run");

    let expected: Vec<String> = (0..24).map(|index| format!("{index:03}_table.sql")).collect();
    assert_eq!(file_names(&report), expected);
    assert_eq!(report.modified(), 24);
    assert_eq!(
        read(dir.path(), "017_table.sql"),
        "CREATE TABLE IF NOT EXISTS t17 (id int);\n"
    );
}
