use lithium_core::{
    resolve_strategy, CancelFlag, MinimizeOptions, Oracle, OracleDriver, ReductionReport,
    SplitKind, Testcase,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct FileOracle<F> {
    path: PathBuf,
    predicate: F,
}

impl<F: Fn(&[u8]) -> bool> Oracle for FileOracle<F> {
    fn interesting(&mut self, _args: &[String], _temp_prefix: &Path) -> io::Result<bool> {
        Ok((self.predicate)(&fs::read(&self.path)?))
    }
}

fn reduce<F>(contents: &[u8], strategy: &str, predicate: F) -> (Vec<u8>, ReductionReport)
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
    let driver = OracleDriver::new(Box::new(oracle), Vec::new(), Some(dir.path().join("work")))
        .expect("driver");
    let strategy = resolve_strategy(strategy, MinimizeOptions::default()).expect("strategy");
    let testcase = Testcase::load(&path, SplitKind::Line).expect("load");

    let report = lithium_core::Reducer::new(testcase, driver, strategy, CancelFlag::new())
        .run()
        .expect("run");
    (fs::read(&path).expect("read back"), report)
}

fn count(data: &[u8], byte: u8) -> usize {
    data.iter().filter(|candidate| **candidate == byte).count()
}

#[test]
fn around_removes_mirrored_padding_together() {
    // the padding on either side of the interesting line only goes away in
    // matched pairs
    let (result, report) = reduce(b"x\nx\nx\no\nx\nx\nx\n", "minimize-around", |data| {
        let Some(pos) = data.windows(2).position(|w| w == b"o\n") else {
            return false;
        };
        data[..pos] == data[pos + 2..]
    });
    assert_eq!(result, b"o\n".to_vec());
    assert!(report.reduced);
}

#[test]
fn balanced_removes_bracket_pairs_with_nesting() {
    let predicate = |data: &[u8]| {
        let Some(pos) = data.windows(2).position(|w| w == b"o\n") else {
            return false;
        };
        let (head, tail) = (&data[..pos], &data[pos + 2..]);
        count(head, b'{') == count(tail, b'}')
            && count(head, b'(') == count(tail, b')')
            && count(head, b'[') == count(tail, b']')
    };
    let (result, report) = reduce(b"[\n[\nxxx{\no\n}\n]\n]\n", "minimize-balanced", predicate);
    assert_eq!(result, b"o\n".to_vec());
    assert!(report.reduced);
}

#[test]
fn balanced_skips_unmatched_positions_without_oracle_calls() {
    // nothing can be removed: every chunk is unbalanced against its tail
    let (result, report) = reduce(b"{\n{\nx\n", "minimize-balanced", |data| {
        data.contains(&b'x')
    });
    assert_eq!(result, b"{\n{\nx\n".to_vec());
    // "x" alone is balanced and gets attempted; the brace chunks never
    // find a closing partner, so only a handful of calls happen
    assert!(report.oracle_calls <= 4, "calls = {}", report.oracle_calls);
}

#[test]
fn collapse_brace_flattens_emptied_blocks() {
    let (result, report) = reduce(
        b"function x() {\nA\nB\n}\n",
        "minimize-collapse-brace",
        |data| {
            data.windows(3).any(|w| w == b"x()")
                && count(data, b'{') == count(data, b'}')
        },
    );
    assert_eq!(result, b"function x() { }\n".to_vec());
    assert!(report.reduced);
}
