use std::fs;

use assert_cmd::Command;

/// Pulls the `// expect: <text>` payloads out of a fixture file, in order.
fn expected_lines(path: &str) -> Vec<String> {
    let source = fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {path}: {e}"));

    source
        .lines()
        .filter_map(|line| line.split_once("// expect:"))
        .map(|(_, payload)| payload.trim().to_string())
        .collect()
}

/// Runs a fixture and asserts its stdout is exactly the concatenation of its
/// `// expect:` payloads, one per line, per the test harness contract.
pub fn assert_fixture(path: &str) {
    let expected = expected_lines(path);
    let expected = if expected.is_empty() { String::new() } else { expected.join("\n") + "\n" };

    Command::cargo_bin("lox")
        .unwrap()
        .arg(path)
        .assert()
        .success()
        .stdout(expected);
}

/// Runs a fixture expected to fail and asserts the process exit code.
pub fn assert_exit_code(path: &str, code: i32) {
    Command::cargo_bin("lox").unwrap().arg(path).assert().failure().code(code);
}
