use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn rill() -> Command {
    Command::cargo_bin("rill").expect("binary should be buildable")
}

fn script_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file should be creatable");
    file.write_all(source.as_bytes())
        .expect("script should be writable");
    file
}

#[test]
fn runs_a_script_file() {
    let script = script_file("var x = 2 + 3 * 4;\nprint x;\n");
    rill()
        .arg(script.path())
        .assert()
        .success()
        .stdout("14\n");
}

#[test]
fn evaluates_an_inline_expression() {
    rill()
        .args(["--expr", "print \"a\" + \"b\";"])
        .assert()
        .success()
        .stdout("ab\n");
}

#[test]
fn closures_work_end_to_end() {
    let script = script_file(
        "var counter;\n\
         {\n\
           var i = 0;\n\
           func inc() { i = i + 1; return i; }\n\
           counter = inc;\n\
         }\n\
         print counter();\n\
         print counter();\n",
    );
    rill()
        .arg(script.path())
        .assert()
        .success()
        .stdout("1\n2\n");
}

#[test]
fn syntax_error_fails_with_diagnostic() {
    rill()
        .args(["--expr", "print ;"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("syntax error"));
}

#[test]
fn runtime_error_reports_the_source_line() {
    let script = script_file("print 1;\nprint 1 / 0;\n");
    rill()
        .arg(script.path())
        .assert()
        .failure()
        .stdout("1\n")
        .stderr(predicate::str::contains("line 2: divide by zero"));
}

#[test]
fn missing_script_file_is_reported() {
    rill()
        .arg("does-not-exist.rill")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read script"));
}
