use crate::split_attrs;
use crate::split_jsstr;
use crate::split_symbol;

pub const DEFAULT_CUT_BEFORE: &[u8] = b"]}:";
pub const DEFAULT_CUT_AFTER: &[u8] = b"?=;{[\n";

/// How a testcase file is divided into atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitKind {
    /// Lines including their terminators. The default.
    Line,
    /// UTF-8 sequence boundaries; bytes that do not start a valid sequence
    /// become single-byte atoms, so arbitrary binary round-trips.
    Char,
    /// Bytes inside JS string literals, escapes kept whole.
    JsStr,
    /// Runs delimited by cut-before/cut-after byte sets.
    Symbol {
        cut_before: Vec<u8>,
        cut_after: Vec<u8>,
    },
    /// XML/HTML attribute assignments.
    Attrs,
}

impl SplitKind {
    pub fn symbol_default() -> Self {
        SplitKind::Symbol {
            cut_before: DEFAULT_CUT_BEFORE.to_vec(),
            cut_after: DEFAULT_CUT_AFTER.to_vec(),
        }
    }

    /// Unit name for summaries, eg. "8 lines".
    pub fn atom(&self) -> &'static str {
        match self {
            SplitKind::Line => "line",
            SplitKind::Char => "char",
            SplitKind::JsStr => "jsstr char",
            SplitKind::Symbol { .. } => "symbol",
            SplitKind::Attrs => "attribute",
        }
    }

    pub fn split(&self, data: &[u8], parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>) {
        match self {
            SplitKind::Line => split_line(data, parts, reducible),
            SplitKind::Char => split_char(data, parts, reducible),
            SplitKind::JsStr => split_jsstr::split(data, parts, reducible),
            SplitKind::Symbol {
                cut_before,
                cut_after,
            } => split_symbol::split(data, cut_before, cut_after, parts, reducible),
            SplitKind::Attrs => split_attrs::split(data, parts, reducible),
        }
    }
}

fn split_line(data: &[u8], parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>) {
    let mut start = 0;
    for (idx, byte) in data.iter().enumerate() {
        if *byte == b'\n' {
            parts.push(data[start..=idx].to_vec());
            reducible.push(true);
            start = idx + 1;
        }
    }
    if start < data.len() {
        parts.push(data[start..].to_vec());
        reducible.push(true);
    }
}

fn utf8_sequence_len(byte: u8) -> usize {
    match byte {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

fn split_char(data: &[u8], parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>) {
    let mut idx = 0;
    while idx < data.len() {
        let want = utf8_sequence_len(data[idx]);
        let end = if want > 1
            && idx + want <= data.len()
            && data[idx + 1..idx + want]
                .iter()
                .all(|byte| byte & 0xC0 == 0x80)
        {
            idx + want
        } else {
            idx + 1
        };
        parts.push(data[idx..end].to_vec());
        reducible.push(true);
        idx = end;
    }
}
