use std::{fs, process::Command};

use tempfile::tempdir;

fn run_idemsql(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_idemsql"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|error| panic!("failed to run idemsql: {error}"))
}

#[test]
fn missing_directory_keeps_io_category_with_cli_context() {
    let tempdir = tempdir().unwrap_or_else(|error| panic!("failed to create tempdir: {error}"));
    let missing = tempdir.path().join("migrations");
    let missing = missing.to_string_lossy().into_owned();

    let output = run_idemsql(&[missing.as_str()]);

    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[io]"),
        "stderr must carry the io category, got: {stderr}",
    );
    assert!(
        stderr.contains("while rewriting migrations"),
        "stderr must include CLI context, got: {stderr}",
    );
    assert!(
        stderr.contains("read directory"),
        "stderr must retain the failed operation, got: {stderr}",
    );
}

#[test]
fn unknown_config_key_is_a_config_error() {
    let tempdir = tempdir().unwrap_or_else(|error| panic!("failed to create tempdir: {error}"));
    let config_path = tempdir.path().join("idemsql.yml");
    fs::write(&config_path, "tabels: false\n")
        .unwrap_or_else(|error| panic!("failed to write config: {error}"));
    let config_path = config_path.to_string_lossy().into_owned();
    let dir = tempdir.path().to_string_lossy().into_owned();

    let output = run_idemsql(&["--config", config_path.as_str(), dir.as_str()]);

    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[config]"),
        "stderr must carry the config category, got: {stderr}",
    );
    assert!(
        stderr.contains("while parsing config file"),
        "stderr must name the failing step, got: {stderr}",
    );
    assert!(
        stderr.contains("tabels"),
        "stderr must name the unknown key, got: {stderr}",
    );
}

#[test]
fn out_of_range_indent_is_rejected_before_any_file_is_touched() {
    let tempdir = tempdir().unwrap_or_else(|error| panic!("failed to create tempdir: {error}"));
    let config_path = tempdir.path().join("idemsql.yml");
    fs::write(&config_path, "indent: 40\n")
        .unwrap_or_else(|error| panic!("failed to write config: {error}"));
    let migration = tempdir.path().join("001_init.sql");
    fs::write(&migration, "CREATE TABLE t (id int);\n")
        .unwrap_or_else(|error| panic!("failed to write migration: {error}"));
    let config_path = config_path.to_string_lossy().into_owned();
    let dir = tempdir.path().to_string_lossy().into_owned();

    let output = run_idemsql(&["--config", config_path.as_str(), dir.as_str()]);

    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[config]"), "got: {stderr}");
    assert!(stderr.contains("indent must be at most 16 spaces, got 40"), "got: {stderr}");
    assert_eq!(
        fs::read_to_string(&migration)
            .unwrap_or_else(|error| panic!("failed to read migration: {error}")),
        "CREATE TABLE t (id int);\n"
    );
}

#[test]
fn unreadable_migration_is_reported_per_file() {
    let tempdir = tempdir().unwrap_or_else(|error| panic!("failed to create tempdir: {error}"));
    fs::write(tempdir.path().join("001_binary.sql"), [0xff, 0xfe, 0x00])
        .unwrap_or_else(|error| panic!("failed to write migration: {error}"));
    fs::write(
        tempdir.path().join("002_init.sql"),
        "CREATE TABLE t (id int);\n",
    )
    .unwrap_or_else(|error| panic!("failed to write migration: {error}"));
    let dir = tempdir.path().to_string_lossy().into_owned();

    let output = run_idemsql(&[dir.as_str()]);

    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[io]"), "got: {stderr}");
    assert!(
        stderr.contains("while rewriting migration") && stderr.contains("001_binary.sql"),
        "stderr must name the failing file, got: {stderr}",
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("failed"), "got: {stdout}");
    assert!(stdout.contains("1 of 2 files changed"), "got: {stdout}");
}
