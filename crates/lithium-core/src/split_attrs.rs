//! Atomization by XML/HTML attribute assignments: everything that looks
//! like an attribute inside a tag is reducible, all other bytes are fixed.

use regex::bytes::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)<\s*[A-Za-z][A-Za-z-]*").expect("static regex"))
}

fn attr_at_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)^(?:\s*[A-Za-z][A-Za-z0-9:-]*(?:=|>|\s)|\s*>)").expect("static regex")
    })
}

fn attr_anywhere_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m-u)(?:(?:\s+|^)[A-Za-z][A-Za-z0-9:-]*(?:=|>|\s)|\s*>)")
            .expect("static regex")
    })
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &bytes[start..end]
}

fn push(parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>, bytes: &[u8], flag: bool) {
    parts.push(bytes.to_vec());
    reducible.push(flag);
}

pub(crate) fn split(data: &[u8], parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>) {
    let mut pos = 0;
    let mut in_tag = false;
    while pos < data.len() {
        let rest = &data[pos..];
        if in_tag {
            // inside what looks like `<tag ...`: expect attributes or `>`
            let at_start = attr_at_start_re().find(rest);

            if at_start.is_none() {
                // try skipping unrecognized bytes up to the next candidate
                if let Some(ahead) = attr_anywhere_re().find(rest) {
                    if trim(ahead.as_bytes()) != b">" {
                        debug!("skipping unrecognized tag data");
                        push(parts, reducible, &rest[..ahead.start()], false);
                        pos += ahead.start();
                        continue;
                    }
                }
            }

            let matched = match at_start {
                Some(found) if trim(found.as_bytes()) != b">" => found,
                other => {
                    in_tag = false;
                    if let Some(found) = other {
                        push(parts, reducible, &rest[..found.end()], false);
                        pos += found.end();
                    }
                    continue;
                }
            };

            if !matched.as_bytes().ends_with(b"=") {
                // value-less attribute; leave the trailing `\s` or `>` in
                // place for the next match
                push(parts, reducible, &rest[..matched.end() - 1], true);
                pos += matched.end() - 1;
                continue;
            }

            // attribute with a value, find where the value ends
            let attr_start = pos;
            let mut cursor = pos + matched.end();
            let quoted = matches!(data.get(cursor), Some(&b'\'') | Some(&b'"'));
            let value_end = if quoted {
                let quote = data[cursor];
                cursor += 1;
                data[cursor..]
                    .iter()
                    .position(|byte| *byte == quote)
                    .map(|found| cursor + found + 1)
            } else {
                data[cursor..]
                    .iter()
                    .position(|byte| byte.is_ascii_whitespace() || *byte == b'>')
                    .map(|found| cursor + found)
            };
            match value_end {
                Some(end) => {
                    push(parts, reducible, &data[attr_start..end], true);
                    pos = end;
                }
                None => {
                    // EOF while looking for the value's end, rewind
                    debug!("EOF looking for attribute value end");
                    pos = attr_start;
                    in_tag = false;
                }
            }
        } else {
            let Some(found) = tag_re().find(rest) else {
                break;
            };
            in_tag = true;
            push(parts, reducible, &rest[..found.end()], false);
            pos += found.end();
        }
    }
    if pos < data.len() {
        push(parts, reducible, &data[pos..], false);
    }
}
