// End-to-end tests driving the compiled binary

mod common;
use common::*;

use tempfile::TempDir;

#[test]
fn test_filter_and_project_through_cli() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("comments.zst");
    write_zstd(
        &input,
        "{\"id\":\"1\",\"subreddit\":\"a\",\"body\":\"hi\"}\n{\"id\":\"2\",\"subreddit\":\"b\",\"body\":\"no\"}\n",
    );
    let output = dir.path().join("filtered.jsonl");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--keep",
        "subreddit=a",
        "--project",
        "id,subreddit,body",
    ]);

    assert_eq!(code, 0, "run failed: {}", stderr);
    assert_eq!(
        read_output(&output),
        "{\"body\":\"hi\",\"id\":\"1\",\"subreddit\":\"a\"}\n"
    );
}

#[test]
fn test_fanout_creates_one_file_per_value() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("comments.jsonl");
    write_plain(
        &input,
        "{\"id\":\"1\",\"subreddit\":\"a\"}\n{\"id\":\"2\",\"subreddit\":\"b\"}\n",
    );
    let template = format!("{}/by/{{subreddit}}.jsonl", dir.path().display());

    let (_, stderr, code) = run_arcsift(&[input.to_str().unwrap(), "--fanout", &template]);

    assert_eq!(code, 0, "run failed: {}", stderr);
    assert_eq!(
        read_output(&dir.path().join("by/a.jsonl")),
        "{\"id\":\"1\",\"subreddit\":\"a\"}\n"
    );
    assert_eq!(
        read_output(&dir.path().join("by/b.jsonl")),
        "{\"id\":\"2\",\"subreddit\":\"b\"}\n"
    );
}

#[test]
fn test_output_and_fanout_are_mutually_exclusive() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\n");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        "out.jsonl",
        "--fanout",
        "by/{subreddit}.jsonl",
    ]);

    assert_eq!(code, 2);
    assert!(
        stderr.contains("mutually exclusive"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_missing_destination_is_invalid_usage() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\n");

    let (_, stderr, code) = run_arcsift(&[input.to_str().unwrap()]);

    assert_eq!(code, 2);
    assert!(
        stderr.contains("one of --output or --fanout"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_missing_input_file_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.jsonl");

    let (_, _, code) = run_arcsift(&[
        "/definitely/not/here.zst",
        "-o",
        output.to_str().unwrap(),
    ]);

    assert_eq!(code, 1);
}

#[test]
fn test_malformed_lines_warn_and_skip() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("dirty.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\nnot json\n{\"id\":\"2\"}\n");
    let output = dir.path().join("clean.jsonl");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);

    assert_eq!(code, 0);
    assert!(
        stderr.contains("skipping malformed line"),
        "unexpected stderr: {}",
        stderr
    );
    assert_eq!(sorted_lines(&output), vec!["{\"id\":\"1\"}", "{\"id\":\"2\"}"]);
}

#[test]
fn test_abort_strategy_fails_on_stage_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\n");
    let output = dir.path().join("out.jsonl");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--clean",
        "body",
        "--on-error",
        "abort",
    ]);

    assert_eq!(code, 1);
    assert!(
        stderr.contains("clean-text"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_stats_flag_prints_summary() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\n{\"id\":\"2\"}\n");
    let output = dir.path().join("out.jsonl");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-q",
        "-s",
    ]);

    assert_eq!(code, 0);
    assert!(
        stderr.contains("Records processed: 2 total, 2 written"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_quiet_suppresses_progress_logging() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"id\":\"1\"}\n");
    let output = dir.path().join("out.jsonl");

    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-q",
    ]);

    assert_eq!(code, 0);
    assert!(
        !stderr.contains("reader threads"),
        "quiet run still logged: {}",
        stderr
    );
}

#[test]
fn test_keep_file_reads_lexicon_column() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(
        &input,
        "{\"id\":\"1\",\"subreddit\":\"a\"}\n{\"id\":\"2\",\"subreddit\":\"b\"}\n{\"id\":\"3\",\"subreddit\":\"c\"}\n",
    );
    let lexicon = dir.path().join("subs.tsv");
    write_plain(&lexicon, "a\t120\nc\t7\n");
    let output = dir.path().join("out.jsonl");

    let spec = format!("subreddit={}", lexicon.display());
    let (_, stderr, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--keep-file",
        &spec,
    ]);

    assert_eq!(code, 0, "run failed: {}", stderr);
    assert_eq!(
        sorted_lines(&output),
        vec![
            "{\"id\":\"1\",\"subreddit\":\"a\"}",
            "{\"id\":\"3\",\"subreddit\":\"c\"}",
        ]
    );
}

#[test]
fn test_flag_order_controls_stage_order() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    write_plain(&input, "{\"community\":\"a\",\"id\":\"1\"}\n");
    let output = dir.path().join("out.jsonl");

    // Rename first, so the filter sees the new field name
    let (_, _, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--rename",
        "community=subreddit",
        "--keep",
        "subreddit=a",
    ]);
    assert_eq!(code, 0);
    assert_eq!(
        read_output(&output),
        "{\"id\":\"1\",\"subreddit\":\"a\"}\n"
    );

    // Reversed order filters on a field that does not exist yet
    let (_, _, code) = run_arcsift(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--keep",
        "subreddit=a",
        "--rename",
        "community=subreddit",
    ]);
    assert_eq!(code, 0);
    assert_eq!(read_output(&output), "");
}
