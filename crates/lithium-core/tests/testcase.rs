use lithium_core::{LoadError, SplitKind, Testcase};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_case(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write testcase");
    path
}

#[test]
fn line_atomization_round_trips() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"A\nB\nC\nD\n";
    let path = write_case(&dir, "a.txt", contents);
    let testcase = Testcase::load(&path, SplitKind::Line).expect("load");
    assert_eq!(testcase.len(), 4);
    assert_eq!(testcase.atom(), "line");
    assert_eq!(testcase.serialize(), contents.to_vec());
}

#[test]
fn final_line_without_terminator_round_trips() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"A\nB";
    let path = write_case(&dir, "a.txt", contents);
    let testcase = Testcase::load(&path, SplitKind::Line).expect("load");
    assert_eq!(testcase.len(), 2);
    assert_eq!(testcase.serialize(), contents.to_vec());
}

#[test]
fn ddbegin_ddend_bound_the_reducible_region() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"// DDBEGIN\na\nb\nc\n// DDEND\ntail\n";
    let path = write_case(&dir, "a.js", contents);
    let testcase = Testcase::load(&path, SplitKind::Line).expect("load");
    assert_eq!(testcase.len(), 3);
    assert_eq!(testcase.serialize(), contents.to_vec());

    // removing everything reducible keeps the markers and the tail
    let mut testcase = testcase;
    testcase.remove(0..3);
    assert_eq!(
        testcase.serialize(),
        b"// DDBEGIN\n// DDEND\ntail\n".to_vec()
    );
}

#[test]
fn ddend_before_ddbegin_is_an_error() {
    let dir = TempDir::new().expect("tmp dir");
    let path = write_case(&dir, "a.txt", b"// DDEND\nx\n");
    match Testcase::load(&path, SplitKind::Line) {
        Err(LoadError::StrayDdend(_)) => {}
        other => panic!("expected StrayDdend, got {other:?}"),
    }
}

#[test]
fn ddbegin_without_ddend_is_an_error() {
    let dir = TempDir::new().expect("tmp dir");
    let path = write_case(&dir, "a.txt", b"// DDBEGIN\nx\n");
    match Testcase::load(&path, SplitKind::Line) {
        Err(LoadError::MissingDdend(_)) => {}
        other => panic!("expected MissingDdend, got {other:?}"),
    }
}

#[test]
fn empty_file_has_no_reducible_region() {
    let dir = TempDir::new().expect("tmp dir");
    let path = write_case(&dir, "a.txt", b"");
    match Testcase::load(&path, SplitKind::Line) {
        Err(LoadError::EmptyReducibleRegion(_)) => {}
        other => panic!("expected EmptyReducibleRegion, got {other:?}"),
    }
}

#[test]
fn char_split_moves_region_newline_out_when_markers_present() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"DDBEGIN\nabc\nDDEND\n";
    let path = write_case(&dir, "a.txt", contents);
    let testcase = Testcase::load(&path, SplitKind::Char).expect("load");
    // a, b, c; the newline before DDEND is not reducible
    assert_eq!(testcase.len(), 3);
    assert_eq!(testcase.serialize(), contents.to_vec());

    let mut testcase = testcase;
    testcase.remove(0..3);
    assert_eq!(testcase.serialize(), b"DDBEGIN\n\nDDEND\n".to_vec());
}

#[test]
fn char_split_uses_code_points() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = "h\u{e9}llo".as_bytes();
    let path = write_case(&dir, "a.txt", contents);
    let testcase = Testcase::load(&path, SplitKind::Char).expect("load");
    assert_eq!(testcase.len(), 5);
    assert_eq!(testcase.serialize(), contents.to_vec());
}

#[test]
fn jsstr_marks_only_string_contents_reducible() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"var x = 'abc';\n";
    let path = write_case(&dir, "a.js", contents);
    let mut testcase = Testcase::load(&path, SplitKind::JsStr).expect("load");
    assert_eq!(testcase.len(), 3);
    assert_eq!(testcase.serialize(), contents.to_vec());

    // removal only touches the string interior
    testcase.remove(0..2);
    assert_eq!(testcase.serialize(), b"var x = 'c';\n".to_vec());
}

#[test]
fn symbol_and_attrs_round_trip() {
    let dir = TempDir::new().expect("tmp dir");
    for (kind, contents) in [
        (SplitKind::symbol_default(), &b"if (a) {\n  b = 1;\n}\n"[..]),
        (SplitKind::Attrs, &b"<a href=\"x\" id=y>text</a>\n"[..]),
    ] {
        let path = write_case(&dir, "a.txt", contents);
        let testcase = Testcase::load(&path, kind).expect("load");
        assert!(testcase.len() > 0);
        assert_eq!(testcase.serialize(), contents.to_vec());
    }
}

#[test]
fn snapshot_restore_is_exact() {
    let dir = TempDir::new().expect("tmp dir");
    let contents = b"A\nB\nC\nD\n";
    let path = write_case(&dir, "a.txt", contents);
    let mut testcase = Testcase::load(&path, SplitKind::Line).expect("load");

    let snapshot = testcase.snapshot();
    testcase.remove(1..3);
    assert_eq!(testcase.serialize(), b"A\nD\n".to_vec());
    testcase.restore(snapshot);
    assert_eq!(testcase.serialize(), contents.to_vec());
}

#[test]
fn remove_clips_out_of_range_indices() {
    let dir = TempDir::new().expect("tmp dir");
    let path = write_case(&dir, "a.txt", b"A\nB\n");
    let mut testcase = Testcase::load(&path, SplitKind::Line).expect("load");
    testcase.remove(1..100);
    assert_eq!(testcase.serialize(), b"A\n".to_vec());
}

#[test]
fn save_is_atomic_by_rename() {
    let dir = TempDir::new().expect("tmp dir");
    let path = write_case(&dir, "a.txt", b"A\nB\nC\n");
    let mut testcase = Testcase::load(&path, SplitKind::Line).expect("load");
    testcase.remove(0..1);
    testcase.save().expect("save");
    assert_eq!(fs::read(&path).expect("read back"), b"B\nC\n".to_vec());
    assert!(!path.with_extension("tmp").exists());
}
