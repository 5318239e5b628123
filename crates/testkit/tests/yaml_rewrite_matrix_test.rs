use idemsql_testkit::{TestResult, cases_root, load_rewrite_cases_from_dir, run_rewrite_case};

#[test]
fn yaml_rewrite_cases_pass_and_are_idempotent() {
    let case_files = load_rewrite_cases_from_dir(cases_root())
        .unwrap_or_else(|error| panic!("failed to load rewrite case files: {error}"));

    assert!(!case_files.is_empty(), "rewrite case directory must not be empty");

    let mut case_count = 0_usize;
    for case_file in case_files {
        assert!(
            !case_file.cases.is_empty(),
            "rewrite case file '{}' must contain at least one testcase",
            case_file.path.display()
        );

        for (case_name, case) in case_file.cases {
            case_count += 1;
            if let TestResult::Failed(reason) = run_rewrite_case(&case) {
                panic!(
                    "testcase '{}::{}' failed: {}",
                    case_file.file_name, case_name, reason
                );
            }
        }
    }

    assert!(
        case_count >= 25,
        "expected at least 25 rewrite cases, found {case_count}"
    );
}
