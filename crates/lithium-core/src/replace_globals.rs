//! JS-specific rewrite strategies. Neither removes atoms; both rewrite part
//! contents under the usual speculate/accept/revert protocol so the file on
//! disk is interesting after every oracle call.

use crate::error::LithiumError;
use crate::oracle::OracleDriver;
use crate::strategy::{
    ensure_interesting, speculate, CancelFlag, MinimizeOptions, RepeatPolicy, RoundContext,
    Strategy, StrategyStatus,
};
use crate::testcase::Testcase;
use crate::util::largest_power_of_two_smaller_than;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// First occurrence of `needle` replaced, or None when absent.
fn replace_first(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() {
        return None;
    }
    let pos = haystack
        .windows(needle.len())
        .position(|window| window == needle)?;
    let mut out = Vec::with_capacity(haystack.len() - needle.len() + replacement.len());
    out.extend_from_slice(&haystack[..pos]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&haystack[pos + needle.len()..]);
    Some(out)
}

/// Replace member accesses by globals: `obj.prop` becomes `prop`, removing
/// the dependency on the object so other strategies can delete it.
pub struct ReplacePropertiesByGlobals {
    options: MinimizeOptions,
}

impl ReplacePropertiesByGlobals {
    pub fn new(options: MinimizeOptions) -> Self {
        ReplacePropertiesByGlobals { options }
    }

    /// One pass over the property words grouped into chunks of parts.
    /// Returns the number of bytes removed by accepted rewrites.
    fn round(
        &self,
        testcase: &mut Testcase,
        context: &mut RoundContext<'_>,
        chunk_size: u64,
        chunk_min: u64,
    ) -> Result<usize, LithiumError> {
        let chunk = chunk_size as usize;
        let mut words: BTreeMap<Vec<u8>, Vec<usize>> = BTreeMap::new();
        for (idx, part) in testcase.parts().iter().enumerate() {
            if !testcase.reducible()[idx] {
                continue;
            }
            for word in property_words(part) {
                words.entry(word).or_default().push(idx);
            }
        }
        if words.is_empty() {
            return Ok(0);
        }

        let mut removed_chars = 0;
        for (word, part_indices) in words {
            let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for part_idx in part_indices {
                groups.entry(part_idx / chunk).or_default().push(part_idx);
            }
            let pattern = property_pattern(&word);
            for (chunk_idx, part_idxs) in groups {
                // single occurrences are only tried at the final chunk size
                if part_idxs.len() == 1 && chunk_size != chunk_min {
                    continue;
                }
                if context.should_stop() {
                    return Ok(removed_chars);
                }
                let mut changes = Vec::with_capacity(part_idxs.len());
                let mut maybe_removed = 0;
                for part_idx in part_idxs {
                    let part = &testcase.parts()[part_idx];
                    let rewritten = pattern.replace_all(part, &word[..]).into_owned();
                    maybe_removed += part.len().saturating_sub(rewritten.len());
                    changes.push((part_idx, rewritten));
                }
                let accepted = speculate(testcase, context.driver, |testcase| {
                    for (part_idx, rewritten) in changes {
                        testcase.set_part(part_idx, rewritten);
                    }
                })?;
                debug!(
                    "replacing '.{}' prefixes in chunk #{chunk_idx}: {}",
                    String::from_utf8_lossy(&word),
                    if accepted { "interesting" } else { "uninteresting" }
                );
                if accepted && maybe_removed > 0 {
                    removed_chars += maybe_removed;
                    context.status.reduced = true;
                }
            }
        }
        Ok(removed_chars)
    }
}

/// `word` occurrences following `<word-byte>.`, eg. `b` in `a.b`.
fn property_words(part: &[u8]) -> Vec<Vec<u8>> {
    let mut words = Vec::new();
    for pos in 1..part.len() {
        if part[pos] != b'.' || !is_word_byte(part[pos - 1]) {
            continue;
        }
        let start = pos + 1;
        let mut end = start;
        while end < part.len() && is_word_byte(part[end]) {
            end += 1;
        }
        if end > start {
            words.push(part[start..end].to_vec());
        }
    }
    words
}

fn property_pattern(word: &[u8]) -> Regex {
    let escaped = regex::escape(&String::from_utf8_lossy(word));
    Regex::new(&format!(r"(?-u)[\w_.]+\.{escaped}")).expect("escaped word regex")
}

impl Strategy for ReplacePropertiesByGlobals {
    fn name(&self) -> &'static str {
        "replace-properties-by-globals"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        ensure_interesting(testcase, driver)?;

        let mut chunk_size = self
            .options
            .chunk_max
            .min(2 * largest_power_of_two_smaller_than(testcase.part_count() as u64));
        let chunk_min = self.options.chunk_min.max(1);
        let mut context = RoundContext::new(driver, cancel, self.options.max_run_time);

        loop {
            info!("Starting a round with chunks of {chunk_size} parts.");
            let removed_chars = self.round(testcase, &mut context, chunk_size, chunk_min)?;
            if context.status.interrupted || context.status.hit_time_limit {
                return Ok(context.status);
            }

            let last = chunk_size <= chunk_min;
            let repeat = removed_chars > 0
                && match self.options.repeat {
                    RepeatPolicy::Always => true,
                    RepeatPolicy::Last => last,
                    RepeatPolicy::Never => false,
                };
            if repeat {
                continue;
            }
            if last {
                break;
            }
            chunk_size >>= 1;
        }
        Ok(context.status)
    }
}

#[derive(Debug, Clone)]
struct CallSite {
    values: Vec<Vec<u8>>,
    chunk: usize,
    pattern: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
struct FunctionInfo {
    // definition: raw argument pieces, the argument list text, part index
    defs: Option<(Vec<Vec<u8>>, Vec<u8>, usize)>,
    uses: Vec<CallSite>,
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)(?:function\s+(\w+)|(\w+)\s*=\s*function)\s*\((\s*\w+\s*(?:,\s*\w+\s*)*)\)")
            .expect("static regex")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)((\w+)\s*\(((?:[^()]|\([^,()]*\))*)\))").expect("static regex")
    })
}

fn split_arguments(list: &[u8]) -> Vec<Vec<u8>> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(|byte| *byte == b',')
        .map(<[u8]>::to_vec)
        .collect()
}

/// Replace function arguments by globals: assignments to globals of the same
/// names are inserted before each call, and the argument lists emptied, so
/// the function boundary stops keeping code alive.
pub struct ReplaceArgumentsByGlobals {
    options: MinimizeOptions,
}

impl ReplaceArgumentsByGlobals {
    pub fn new(options: MinimizeOptions) -> Self {
        ReplaceArgumentsByGlobals { options }
    }

    /// Returns how many arguments were moved to globals this round.
    fn round(
        &self,
        testcase: &mut Testcase,
        context: &mut RoundContext<'_>,
    ) -> Result<usize, LithiumError> {
        let mut functions: BTreeMap<Vec<u8>, FunctionInfo> = BTreeMap::new();
        for (idx, part) in testcase.parts().iter().enumerate() {
            if !testcase.reducible()[idx] {
                continue;
            }
            for captures in definition_re().captures_iter(part) {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map(|group| group.as_bytes().to_vec())
                    .unwrap_or_default();
                let list = captures
                    .get(3)
                    .map(|group| group.as_bytes().to_vec())
                    .unwrap_or_default();
                functions.entry(name).or_default().defs =
                    Some((split_arguments(&list), list, idx));
            }
            for captures in call_re().captures_iter(part) {
                let Some(name) = captures.get(2) else {
                    continue;
                };
                let values = captures
                    .get(3)
                    .map(|group| split_arguments(group.as_bytes()))
                    .unwrap_or_default();
                let pattern = captures
                    .get(1)
                    .map(|group| group.as_bytes().to_vec())
                    .unwrap_or_default();
                functions
                    .entry(name.as_bytes().to_vec())
                    .or_default()
                    .uses
                    .push(CallSite {
                        values,
                        chunk: idx,
                        pattern,
                    });
            }
        }
        if functions.is_empty() {
            return Ok(0);
        }

        info!("Starting removing function arguments.");
        let mut moved = 0;
        for (name, function) in functions {
            let label = String::from_utf8_lossy(&name).into_owned();
            let Some((arg_defs, args_pattern, def_chunk)) = function.defs else {
                info!("Ignoring arguments of '{label}' because it is 'uninteresting'.");
                continue;
            };
            if function.uses.is_empty() {
                info!("Ignoring arguments of '{label}' because it is 'uninteresting'.");
                continue;
            }
            if context.should_stop() {
                return Ok(moved);
            }

            let is_self_call =
                |site: &CallSite| site.chunk == def_chunk && site.values == arg_defs;

            // drop the definition's argument list and assign the arguments
            // as globals before every call
            let mut changes: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
            let def_part = &testcase.parts()[def_chunk];
            if let Some(rewritten) = replace_first(def_part, &args_pattern, b"") {
                changes.insert(def_chunk, rewritten);
            }
            for site in &function.uses {
                if is_self_call(site) {
                    continue;
                }
                let mut setters = Vec::new();
                for (slot, def) in arg_defs.iter().enumerate() {
                    let undefined = b"undefined".to_vec();
                    let value = site.values.get(slot).unwrap_or(&undefined);
                    setters.extend_from_slice(def);
                    setters.extend_from_slice(b" = ");
                    setters.extend_from_slice(value);
                    setters.extend_from_slice(b";\n");
                }
                let base = changes
                    .get(&site.chunk)
                    .cloned()
                    .unwrap_or_else(|| testcase.parts()[site.chunk].clone());
                let mut rewritten = setters;
                rewritten.extend_from_slice(&base);
                changes.insert(site.chunk, rewritten);
            }

            let accepted = speculate(testcase, context.driver, |testcase| {
                for (part_idx, rewritten) in changes {
                    testcase.set_part(part_idx, rewritten);
                }
            })?;
            debug!(
                "removing arguments of '{label}': {}",
                if accepted { "interesting" } else { "uninteresting" }
            );
            if accepted {
                moved += arg_defs.len();
                context.status.reduced = true;
            }

            // then try emptying each call site independently
            for site in &function.uses {
                if is_self_call(site) {
                    continue;
                }
                if context.should_stop() {
                    return Ok(moved);
                }
                let mut empty_call = name.clone();
                empty_call.extend_from_slice(b"()");
                let Some(rewritten) =
                    replace_first(&testcase.parts()[site.chunk], &site.pattern, &empty_call)
                else {
                    continue;
                };
                let chunk = site.chunk;
                let accepted = speculate(testcase, context.driver, |testcase| {
                    testcase.set_part(chunk, rewritten);
                })?;
                debug!(
                    "emptying call of '{label}' at part #{chunk}: {}",
                    if accepted { "interesting" } else { "uninteresting" }
                );
                if accepted {
                    moved += site.values.len();
                    context.status.reduced = true;
                }
            }
        }
        Ok(moved)
    }
}

impl Strategy for ReplaceArgumentsByGlobals {
    fn name(&self) -> &'static str {
        "replace-arguments-by-globals"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        ensure_interesting(testcase, driver)?;
        let mut context = RoundContext::new(driver, cancel, self.options.max_run_time);
        loop {
            let moved = self.round(testcase, &mut context)?;
            if context.status.interrupted || context.status.hit_time_limit {
                return Ok(context.status);
            }
            let repeat = moved > 0
                && matches!(
                    self.options.repeat,
                    RepeatPolicy::Always | RepeatPolicy::Last
                );
            if !repeat {
                break;
            }
        }
        Ok(context.status)
    }
}
