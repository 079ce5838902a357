//! End-to-end coverage driven entirely through the REPL, the way a user
//! or script would talk to this crate: one command per line, textual
//! output read back from whatever `SET OUTPUT` pointed at.

use microql::config::Config;
use microql::repl::Repl;
use std::io::Cursor;
use std::path::Path;

fn config(dir: &Path) -> Config {
    Config { page_size: 4096, pipe_capacity: 16, sort_pages: 4, bnl_block_pages: 4, range_selectivity: 1.0 / 3.0, data_dir: dir.to_path_buf() }
}

/// Runs `script` against a fresh data directory, routing SELECT output to
/// a scratch file. Returns the REPL's exit code, the stderr diagnostics,
/// and the rendered output table.
fn run(dir: &Path, script: &str) -> (i32, String, String) {
    let out_path = dir.join("out.txt");
    let mut repl = Repl::new(config(dir)).unwrap();
    let full_script = format!("SET OUTPUT '{}'\n{}", out_path.display(), script);
    let mut diag = Vec::new();
    let code = repl.run(Cursor::new(full_script), &mut diag);
    let out = std::fs::read_to_string(&out_path).unwrap_or_default();
    (code, String::from_utf8_lossy(&diag).into_owned(), out)
}

/// Parses a `WriteOut`-rendered table into rows of trimmed value strings,
/// dropping the header line and each row's leading row-id column.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut fields: Vec<String> = line.split('|').map(|f| f.trim().to_string()).collect();
            fields.remove(0);
            fields.pop();
            fields
        })
        .collect()
}

fn row(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn assert_same_rows(mut actual: Vec<Vec<String>>, mut expected: Vec<Vec<String>>) {
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected);
}

#[test]
fn select_with_predicate_filters_rows() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("r.csv");
    std::fs::write(&data, "1,10\n2,20\n1,30\n3,40\n").unwrap();

    let script = format!(
        "CREATE TABLE r(a INT, b INT) AS HEAP\nINSERT INTO r FROM '{}'\nSELECT * FROM r WHERE a = 1\nQUIT\n",
        data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");
    assert_same_rows(parse_rows(&out), vec![row(&["1", "10"]), row(&["1", "30"])]);
}

#[test]
fn sum_aggregates_whole_relation() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("r.csv");
    std::fs::write(&data, "1,10\n2,20\n1,30\n3,40\n").unwrap();

    let script = format!(
        "CREATE TABLE r(a INT, b INT) AS HEAP\nINSERT INTO r FROM '{}'\nSELECT SUM(b) FROM r\nQUIT\n",
        data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");
    assert_same_rows(parse_rows(&out), vec![row(&["100"])]);
}

#[test]
fn group_by_sums_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("r.csv");
    std::fs::write(&data, "1,10\n2,20\n1,30\n3,40\n").unwrap();

    let script = format!(
        "CREATE TABLE r(a INT, b INT) AS HEAP\nINSERT INTO r FROM '{}'\nSELECT a, SUM(b) FROM r GROUP BY a\nQUIT\n",
        data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");
    // GroupBy's schema is [sum, a], in that order, regardless of how the
    // select list names them.
    assert_same_rows(parse_rows(&out), vec![row(&["40", "1"]), row(&["20", "2"]), row(&["40", "3"])]);
}

#[test]
fn equijoin_across_two_relations() {
    let dir = tempfile::tempdir().unwrap();
    let s_data = dir.path().join("s.csv");
    let t_data = dir.path().join("t.csv");
    std::fs::write(&s_data, "1\n2\n3\n4\n").unwrap();
    std::fs::write(&t_data, "2,x\n3,y\n3,z\n5,w\n").unwrap();

    let script = format!(
        "CREATE TABLE s(k INT) AS HEAP\nCREATE TABLE t(k INT, v STRING) AS HEAP\nINSERT INTO s FROM '{}'\nINSERT INTO t FROM '{}'\nSELECT * FROM s, t WHERE s.k = t.k\nQUIT\n",
        s_data.display(),
        t_data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");
    assert_same_rows(
        parse_rows(&out),
        vec![row(&["2", "2", "x"]), row(&["3", "3", "y"]), row(&["3", "3", "z"])],
    );
}

#[test]
fn distinct_on_a_qualified_post_join_column() {
    // S.k and T.k both land in the merged schema under the bare name "k";
    // only the join's per-column provenance lets "T.k" resolve to the
    // right one instead of silently picking S.k.
    let dir = tempfile::tempdir().unwrap();
    let s_data = dir.path().join("s.csv");
    let t_data = dir.path().join("t.csv");
    std::fs::write(&s_data, "1\n2\n3\n4\n").unwrap();
    std::fs::write(&t_data, "2,x\n3,y\n3,z\n5,w\n").unwrap();

    let script = format!(
        "CREATE TABLE s(k INT) AS HEAP\nCREATE TABLE t(k INT, v STRING) AS HEAP\nINSERT INTO s FROM '{}'\nINSERT INTO t FROM '{}'\nSELECT DISTINCT t.k FROM s, t WHERE s.k = t.k\nQUIT\n",
        s_data.display(),
        t_data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");
    assert_same_rows(parse_rows(&out), vec![row(&["2"]), row(&["3"])]);
}

#[test]
fn unknown_relation_aborts_query_but_repl_continues() {
    let dir = tempfile::tempdir().unwrap();
    let (code, diag, out) = run(dir.path(), "SELECT * FROM nope\nQUIT\n");
    assert_eq!(code, 0);
    assert!(!diag.is_empty());
    assert!(out.is_empty());
}

#[test]
fn sorted_table_merges_reverse_order_input_into_ascending_runs() {
    // 10,000 rows fed in strictly descending order through a small
    // sort buffer (4 pages of 4 KiB), forcing TPMMS to build and merge
    // more than one run.
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("big.csv");
    let csv: String = (0..10_000).rev().map(|n| format!("{n}\n")).collect();
    std::fs::write(&data, csv).unwrap();

    let script = format!(
        "CREATE TABLE big(x INT) AS SORTED ON x\nINSERT INTO big FROM '{}'\nSELECT * FROM big\nQUIT\n",
        data.display()
    );
    let (code, diag, out) = run(dir.path(), &script);
    assert_eq!(code, 0, "diag: {diag}");

    let rows = parse_rows(&out);
    assert_eq!(rows.len(), 10_000);
    let values: Vec<i64> = rows.iter().map(|r| r[0].parse().unwrap()).collect();
    let expected: Vec<i64> = (0..10_000).collect();
    assert_eq!(values, expected);
}
