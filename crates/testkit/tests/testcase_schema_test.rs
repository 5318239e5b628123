use idemsql_testkit::load_rewrite_cases_from_str;

#[test]
fn output_and_anomalies_default_when_omitted() {
    let yaml = r#"
passthrough:
  input: INSERT INTO t VALUES (1);
"#;

    let cases = load_rewrite_cases_from_str(yaml).expect("yaml must parse");
    let case = cases
        .get("passthrough")
        .expect("named testcase must be present");

    assert_eq!(case.output, None);
    assert!(case.anomalies.is_empty());
    assert_eq!(case.config, None);
}

#[test]
fn config_overrides_fill_remaining_keys_with_defaults() {
    let yaml = r#"
triggers_off:
  input: CREATE TRIGGER t BEFORE UPDATE ON a FOR EACH ROW EXECUTE FUNCTION f();
  config:
    triggers: false
    indent: 4
"#;

    let cases = load_rewrite_cases_from_str(yaml).expect("yaml must parse");
    let config = cases
        .get("triggers_off")
        .and_then(|case| case.config.clone())
        .expect("config must be present");

    assert!(!config.triggers);
    assert!(config.tables);
    assert_eq!(config.indent, 4);
}

#[test]
fn unknown_case_keys_are_rejected() {
    let yaml = r#"
typo:
  input: CREATE TABLE a (id int);
  outptu: CREATE TABLE IF NOT EXISTS a (id int);
"#;

    let error = load_rewrite_cases_from_str(yaml).expect_err("unknown key must fail");
    let message = error.to_string();
    assert!(message.contains("inline yaml"), "unexpected message: {message}");
}

#[test]
fn unknown_config_keys_are_rejected() {
    let yaml = r#"
bad_config:
  input: CREATE TABLE a (id int);
  config:
    sequences: true
"#;

    assert!(load_rewrite_cases_from_str(yaml).is_err());
}
