use lithium_core::{
    resolve_strategy, CancelFlag, LithiumError, MinimizeOptions, Oracle, OracleDriver, Reducer,
    ReductionReport, RepeatPolicy, SplitKind, Testcase,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Deterministic oracle: reads the on-disk testcase and applies a predicate.
struct FileOracle<F> {
    path: PathBuf,
    predicate: F,
}

impl<F: Fn(&[u8]) -> bool> Oracle for FileOracle<F> {
    fn interesting(&mut self, _args: &[String], _temp_prefix: &Path) -> io::Result<bool> {
        Ok((self.predicate)(&fs::read(&self.path)?))
    }
}

fn reduce<F>(
    contents: &[u8],
    kind: SplitKind,
    strategy: &str,
    options: MinimizeOptions,
    predicate: F,
) -> Result<(Vec<u8>, ReductionReport), LithiumError>
where
    F: Fn(&[u8]) -> bool + 'static,
{
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("case.txt");
    fs::write(&path, contents).expect("write testcase");

    let oracle = FileOracle {
        path: path.clone(),
        predicate,
    };
    let driver = OracleDriver::new(
        Box::new(oracle),
        vec![path.to_string_lossy().to_string()],
        Some(dir.path().join("work")),
    )
    .expect("driver");
    let strategy = resolve_strategy(strategy, options)?;
    let testcase = Testcase::load(&path, kind).expect("load");

    let report = Reducer::new(testcase, driver, strategy, CancelFlag::new()).run()?;
    let final_bytes = fs::read(&path).expect("read back");
    Ok((final_bytes, report))
}

#[test]
fn minimize_keeps_the_single_interesting_line() {
    let (result, report) = reduce(
        b"x\n\nx\nx\no\nx\nx\nx\n",
        SplitKind::Line,
        "minimize",
        MinimizeOptions::default(),
        |data| data.windows(2).any(|w| w == b"o\n"),
    )
    .expect("reduce");
    assert_eq!(result, b"o\n".to_vec());
    assert!(report.reduced);
    assert_eq!(report.init_atoms, 8);
    assert_eq!(report.final_atoms, 1);
}

#[test]
fn minimize_eight_lines_to_one() {
    let (result, report) = reduce(
        b"A\nB\nC\nD\nE\nF\nG\nH\n",
        SplitKind::Line,
        "minimize",
        MinimizeOptions::default(),
        |data| data.contains(&b'D'),
    )
    .expect("reduce");
    assert_eq!(result, b"D\n".to_vec());
    // chunk sizes 4, 2, 1: well under the 2*(8/4 + 8/2 + 8) call bound
    assert!(report.oracle_calls <= 28, "calls = {}", report.oracle_calls);
}

#[test]
fn chunk_size_shorthand_is_a_single_fixed_pass() {
    let (result, report) = reduce(
        b"A\nB\nC\nD\nE\nF\nG\nH\n",
        SplitKind::Line,
        "minimize",
        MinimizeOptions::fixed_chunk_size(2),
        |data| data.contains(&b'D'),
    )
    .expect("reduce");
    // 2-minimal, not 1-minimal: C rides along in D's chunk
    assert_eq!(result, b"C\nD\n".to_vec());
    assert!(report.reduced);
}

#[test]
fn repeat_last_runs_one_extra_round_at_the_boundary_chunk_size() {
    // chunk_max == chunk_min pins the subtle boundary of repeat=last: the
    // size is already final, so a round that removes anything repeats.
    let options = |repeat| MinimizeOptions {
        chunk_min: 1,
        chunk_max: 1,
        repeat,
        ..MinimizeOptions::default()
    };
    let predicate = |data: &[u8]| data.windows(2).any(|w| w == b"b\n");

    let (result, report) = reduce(
        b"a\nb\n",
        SplitKind::Line,
        "minimize",
        options(RepeatPolicy::Never),
        predicate,
    )
    .expect("reduce");
    assert_eq!(result, b"b\n".to_vec());
    assert_eq!(report.oracle_calls, 3);
    assert_eq!(report.cache_hits, 0);

    let (result, report) = reduce(
        b"a\nb\n",
        SplitKind::Line,
        "minimize",
        options(RepeatPolicy::Last),
        predicate,
    )
    .expect("reduce");
    assert_eq!(result, b"b\n".to_vec());
    // the repeat round retries the same empty candidate, served from cache
    assert_eq!(report.oracle_calls, 3);
    assert_eq!(report.cache_hits, 1);
}

#[test]
fn non_monotonic_oracle_terminates_with_an_interesting_file() {
    fn is_prime(value: usize) -> bool {
        value >= 2 && (2..value).all(|candidate| value % candidate != 0)
    }

    let options = MinimizeOptions {
        repeat: RepeatPolicy::Never,
        ..MinimizeOptions::default()
    };
    let (result, _report) = reduce(
        b"aaaaaaaaaaa",
        SplitKind::Char,
        "minimize",
        options,
        |data| is_prime(data.len()),
    )
    .expect("reduce");
    assert!(is_prime(result.len()), "final length {}", result.len());
    assert!(result.len() < 11);
}

#[test]
fn already_minimal_input_gets_one_final_round() {
    let (result, report) = reduce(
        b"D\n",
        SplitKind::Line,
        "minimize",
        MinimizeOptions::default(),
        |data| data.contains(&b'D'),
    )
    .expect("reduce");
    assert_eq!(result, b"D\n".to_vec());
    assert!(!report.reduced);
    // initial check plus one rejected removal
    assert_eq!(report.oracle_calls, 2);
}

#[test]
fn uninteresting_input_is_rejected_up_front() {
    let err = reduce(
        b"A\nB\n",
        SplitKind::Line,
        "minimize",
        MinimizeOptions::default(),
        |data| data.contains(&b'Z'),
    )
    .expect_err("should not reduce");
    assert!(matches!(err, LithiumError::NotInteresting));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn cancellation_leaves_the_last_accepted_state() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("case.txt");
    fs::write(&path, b"A\nB\nC\nD\n").expect("write testcase");

    let oracle = FileOracle {
        path: path.clone(),
        predicate: |_: &[u8]| true,
    };
    let driver = OracleDriver::new(Box::new(oracle), Vec::new(), Some(dir.path().join("work")))
        .expect("driver");
    let strategy = resolve_strategy("minimize", MinimizeOptions::default()).expect("strategy");
    let testcase = Testcase::load(&path, SplitKind::Line).expect("load");

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = Reducer::new(testcase, driver, strategy, cancel)
        .run()
        .expect("run");
    assert!(report.interrupted);
    // only the initial interestingness check ran
    assert_eq!(report.oracle_calls, 1);
    assert_eq!(fs::read(&path).expect("read back"), b"A\nB\nC\nD\n".to_vec());
}

#[test]
fn max_run_time_stops_cleanly() {
    let options = MinimizeOptions {
        max_run_time: Some(Duration::from_secs(0)),
        ..MinimizeOptions::default()
    };
    let (result, report) = reduce(
        b"A\nB\nC\nD\n",
        SplitKind::Line,
        "minimize",
        options,
        |_| true,
    )
    .expect("reduce");
    assert!(report.hit_time_limit);
    assert_eq!(result, b"A\nB\nC\nD\n".to_vec());
}

#[test]
fn power_of_two_bounds_are_enforced() {
    let options = MinimizeOptions {
        chunk_min: 3,
        ..MinimizeOptions::default()
    };
    let Err(err) = resolve_strategy("minimize", options) else {
        panic!("non-power-of-two min must be rejected");
    };
    assert!(matches!(err, LithiumError::Config(_)));
    assert_eq!(err.exit_code(), 2);

    let Err(err) = resolve_strategy("no-such-strategy", MinimizeOptions::default()) else {
        panic!("unknown strategy must be rejected");
    };
    assert!(matches!(err, LithiumError::Config(_)));
}

#[test]
fn check_only_does_not_modify_the_file() {
    let (result, report) = reduce(
        b"A\nB\n",
        SplitKind::Line,
        "check-only",
        MinimizeOptions::default(),
        |data| data.contains(&b'A'),
    )
    .expect("check");
    assert_eq!(result, b"A\nB\n".to_vec());
    assert!(!report.reduced);
    assert_eq!(report.oracle_calls, 1);
}

#[test]
fn rerunning_at_chunk_size_one_removes_nothing() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("case.txt");
    fs::write(&path, b"A\nB\nC\nD\nE\nF\nG\nH\n").expect("write testcase");

    let predicate = |data: &[u8]| data.contains(&b'D');
    for (pass, options) in [
        (0, MinimizeOptions::default()),
        (1, MinimizeOptions::fixed_chunk_size(1)),
    ] {
        let oracle = FileOracle {
            path: path.clone(),
            predicate,
        };
        let driver = OracleDriver::new(
            Box::new(oracle),
            Vec::new(),
            Some(dir.path().join(format!("work{pass}"))),
        )
        .expect("driver");
        let strategy = resolve_strategy("minimize", options).expect("strategy");
        let testcase = Testcase::load(&path, SplitKind::Line).expect("load");
        let report = Reducer::new(testcase, driver, strategy, CancelFlag::new())
            .run()
            .expect("run");
        if pass == 1 {
            // the first pass produced a 1-minimal file
            assert!(!report.reduced);
            assert_eq!(report.init_atoms, report.final_atoms);
        }
    }
    assert_eq!(fs::read(&path).expect("read back"), b"D\n".to_vec());
}
