use std::io::Write;
use std::process::{Command, Output};

const STORIES: &str = r#"{"id":1,"story_tags":"Adventure,Fantasy","rating":4.5,"published":"2019-06-01T00:00:00"}
{"id":2,"story_tags":"Sci-Fi,Drama","rating":3.0,"published":"2021-02-11T12:30:00"}
{"id":3,"story_tags":"Fantasy,Romance","rating":4.9,"published":"2020-05-05T00:00:00"}
{"id":4,"story_tags":"Comedy","published":"2018-01-01"}
"#;

fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn run_tagsieve(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tagsieve"))
        .args(args)
        .output()
        .expect("failed to execute process")
}

fn ids(stdout: &[u8]) -> Vec<i64> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            record["id"].as_i64().unwrap()
        })
        .collect()
}

#[test]
fn filters_records_to_stdout() {
    let input = write_temp(STORIES, ".jsonl");
    let output = run_tagsieve(&[
        "--input",
        input.path().to_str().unwrap(),
        "--tags-field",
        "story_tags",
        "--query",
        "Fantasy, .rating >= 4.6 | Comedy",
    ]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(ids(&output.stdout), vec![3, 4]);
}

#[test]
fn reads_query_and_tags_from_config() {
    let input = write_temp(STORIES, ".jsonl");
    let config = write_temp(
        "query: '-\"Comedy\", .published < \"2020-01-01T00:00:00\"'\ntags:\n  field: story_tags\n",
        ".yaml",
    );
    let out_file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();

    let output = run_tagsieve(&[
        "--input",
        input.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
        "--output",
        out_file.path().to_str().unwrap(),
        "--verbose",
    ]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let content = std::fs::read(out_file.path()).unwrap();
    assert_eq!(ids(&content), vec![1]);
}

#[test]
fn count_and_check_modes() {
    let input = write_temp(STORIES, ".jsonl");
    let output = run_tagsieve(&[
        "--input",
        input.path().to_str().unwrap(),
        "--tags-field",
        "story_tags",
        "--query",
        "Fi",
        "--count",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");

    let output = run_tagsieve(&["--check", "--query", "(fan|drama),.rating>=4"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "(fan | drama), .rating >= 4"
    );
}

#[test]
fn syntax_errors_fail_before_reading() {
    let output = run_tagsieve(&["--input", "does-not-exist.jsonl", "--query", "(fan"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("syntax error"), "{stderr}");
}

#[test]
fn evaluation_errors_abort_unless_skipped() {
    let input = write_temp(
        "{\"id\":1,\"published\":\"2019-01-01\"}\n{\"id\":2,\"published\":\"someday\"}\n",
        ".jsonl",
    );
    let path = input.path().to_str().unwrap();
    let query = ".published < \"2020-01-01\"";

    let output = run_tagsieve(&["--input", path, "--query", query]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));

    let output = run_tagsieve(&["--input", path, "--query", query, "--skip-errors"]);
    assert!(output.status.success());
    assert_eq!(ids(&output.stdout), vec![1]);
}
