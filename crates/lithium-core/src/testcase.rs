use crate::error::LoadError;
use crate::split::SplitKind;
use crate::util::{contains_bytes, write_atomic};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A testcase file split into a fixed prefix, an ordered sequence of parts
/// and a fixed suffix. Parts flagged non-reducible are kept verbatim; all
/// strategy indices count reducible parts only.
#[derive(Debug, Clone)]
pub struct Testcase {
    before: Vec<u8>,
    after: Vec<u8>,
    parts: Vec<Vec<u8>>,
    reducible: Vec<bool>,
    path: PathBuf,
    extension: String,
    kind: SplitKind,
}

/// Opaque copy of the reducible state, only usable with `Testcase::restore`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    parts: Vec<Vec<u8>>,
    reducible: Vec<bool>,
}

/// Split on newline boundaries, each line keeping its terminator.
fn split_lines_keepends(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, byte) in data.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(&data[start..=idx]);
            start = idx + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

impl Testcase {
    pub fn load(path: impl AsRef<Path>, kind: SplitKind) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let lines = split_lines_keepends(&data);
        let mut before = Vec::new();
        let mut region = Vec::new();
        let mut after = Vec::new();

        let mut begin_line = None;
        for (idx, line) in lines.iter().enumerate() {
            if contains_bytes(line, b"DDBEGIN") {
                begin_line = Some(idx);
                break;
            }
            if contains_bytes(line, b"DDEND") {
                return Err(LoadError::StrayDdend(path));
            }
        }

        match begin_line {
            None => {
                // no markers, the whole file is the reducible region
                region = data.clone();
            }
            Some(begin) => {
                for line in &lines[..=begin] {
                    before.extend_from_slice(line);
                }
                let mut end_line = None;
                for (idx, line) in lines.iter().enumerate().skip(begin + 1) {
                    if contains_bytes(line, b"DDEND") {
                        end_line = Some(idx);
                        break;
                    }
                }
                let Some(end) = end_line else {
                    return Err(LoadError::MissingDdend(path));
                };
                for line in &lines[begin + 1..end] {
                    region.extend_from_slice(line);
                }
                for line in &lines[end..] {
                    after.extend_from_slice(line);
                }
            }
        }

        let mut parts = Vec::new();
        let mut reducible = Vec::new();
        kind.split(&region, &mut parts, &mut reducible);

        let mut testcase = Testcase {
            before,
            after,
            parts,
            reducible,
            path,
            extension,
            kind,
        };
        testcase.adjust_char_boundary();

        if testcase.len() == 0 {
            return Err(LoadError::EmptyReducibleRegion(testcase.path));
        }
        Ok(testcase)
    }

    /// With char atoms inside DDBEGIN/DDEND, move the region's final newline
    /// into the suffix so the DDEND line cannot fuse with a reduced line.
    fn adjust_char_boundary(&mut self) {
        if self.kind != SplitKind::Char {
            return;
        }
        if self.before.is_empty() && self.after.is_empty() {
            return;
        }
        if self.parts.last().map(Vec::as_slice) == Some(&b"\n"[..]) {
            self.parts.pop();
            self.reducible.pop();
            let mut after = vec![b'\n'];
            after.extend_from_slice(&self.after);
            self.after = after;
        }
    }

    /// Number of reducible atoms.
    pub fn len(&self) -> usize {
        self.reducible.iter().filter(|flag| **flag).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[Vec<u8>] {
        &self.parts
    }

    pub fn reducible(&self) -> &[bool] {
        &self.reducible
    }

    pub fn atom(&self) -> &'static str {
        self.kind.atom()
    }

    pub fn kind(&self) -> &SplitKind {
        &self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Exact bytes of the testcase as written to disk.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.before.clone();
        for part in &self.parts {
            out.extend_from_slice(part);
        }
        out.extend_from_slice(&self.after);
        out
    }

    /// Atomically write the testcase back to its own path.
    pub fn save(&self) -> io::Result<()> {
        write_atomic(&self.path, &self.serialize())
    }

    /// Write a plain copy elsewhere (temp workspace records).
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.serialize())
    }

    /// Remove the reducible atoms in `range` (reducible index space),
    /// keeping non-reducible parts that fall inside the range.
    pub fn remove(&mut self, range: Range<usize>) {
        let mut rank = 0;
        let mut parts = Vec::with_capacity(self.parts.len());
        let mut reducible = Vec::with_capacity(self.reducible.len());
        for (part, flag) in self.parts.drain(..).zip(self.reducible.drain(..)) {
            let drop = flag && rank >= range.start && rank < range.end;
            if flag {
                rank += 1;
            }
            if !drop {
                parts.push(part);
                reducible.push(flag);
            }
        }
        self.parts = parts;
        self.reducible = reducible;
    }

    /// Replace the contents of one part (part index space).
    pub fn set_part(&mut self, index: usize, bytes: Vec<u8>) {
        self.parts[index] = bytes;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            parts: self.parts.clone(),
            reducible: self.reducible.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.parts = snapshot.parts;
        self.reducible = snapshot.reducible;
    }

    /// Re-split the reducible region from raw bytes, keeping prefix and
    /// suffix. Used after whole-region rewrites.
    pub fn reatomize(&mut self, region: &[u8]) {
        self.parts.clear();
        self.reducible.clear();
        let kind = self.kind.clone();
        kind.split(region, &mut self.parts, &mut self.reducible);
        self.adjust_char_boundary();
    }
}
