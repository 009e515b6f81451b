//! Atomization for JS source: only bytes inside string literals become
//! reducible atoms, and escape notation (`\uXXXX`, `\xXX`, `\u{...}`, `\.`)
//! stays together as a single atom.

use regex::bytes::Regex;
use std::sync::OnceLock;

fn escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s-u)^(?:\\u[0-9A-Fa-f]{4}|\\x[0-9A-Fa-f]{2}|\\u\{[0-9A-Fa-f]+\}|\\.|.)")
            .expect("static regex")
    })
}

pub(crate) fn split(data: &[u8], parts: &mut Vec<Vec<u8>>, reducible: &mut Vec<bool>) {
    let mut data = data.to_vec();
    let mut raw_parts: Vec<Vec<u8>> = Vec::new();
    // indices into raw_parts that are in-string character atoms, ascending
    let mut chars: Vec<usize> = Vec::new();
    let mut instr: Option<u8> = None;

    loop {
        let mut last = 0;
        loop {
            if let Some(quote) = instr {
                let Some(found) = escape_re().find(&data[last..]) else {
                    break;
                };
                let token = data[last..last + found.end()].to_vec();
                chars.push(raw_parts.len());
                if token == [quote] {
                    instr = None;
                    chars.pop();
                }
                last += token.len();
                raw_parts.push(token);
            } else {
                let Some(pos) = data[last..]
                    .iter()
                    .position(|byte| *byte == b'\'' || *byte == b'"')
                else {
                    break;
                };
                instr = Some(data[last + pos]);
                raw_parts.push(data[last..last + pos + 1].to_vec());
                last += pos + 1;
            }
        }

        if last != data.len() {
            raw_parts.push(data[last..].to_vec());
        }

        let Some(quote) = instr else {
            break;
        };

        // hit EOF inside a string: rewind to before the quote that opened it
        // and rescan the remainder as non-string source
        let Some(idx) = (0..raw_parts.len())
            .rev()
            .find(|idx| raw_parts[*idx].last() == Some(&quote) && chars.binary_search(idx).is_err())
        else {
            break;
        };
        data = raw_parts[idx + 1..].concat();
        raw_parts.truncate(idx + 1);
        chars.retain(|chr| *chr < idx);
        instr = None;
    }

    // everything outside string literals is fixed context: coalesce adjacent
    // non-character parts so they cannot be split by chunk boundaries
    let mut flags = vec![false; raw_parts.len()];
    for chr in &chars {
        flags[*chr] = true;
    }
    for (part, flag) in raw_parts.into_iter().zip(flags) {
        if !flag && reducible.last() == Some(&false) {
            parts
                .last_mut()
                .expect("coalesce target")
                .extend_from_slice(&part);
        } else {
            parts.push(part);
            reducible.push(flag);
        }
    }
}
