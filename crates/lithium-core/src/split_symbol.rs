//! Delimiter-run atomization: each atom is an optional cut-before byte, a
//! run of non-delimiter bytes, then an optional cut-after byte.

pub(crate) fn split(
    data: &[u8],
    cut_before: &[u8],
    cut_after: &[u8],
    parts: &mut Vec<Vec<u8>>,
    reducible: &mut Vec<bool>,
) {
    let before = |byte: u8| cut_before.contains(&byte);
    let after = |byte: u8| cut_after.contains(&byte);

    let mut idx = 0;
    while idx < data.len() {
        let start = idx;
        if before(data[idx]) {
            idx += 1;
        }
        while idx < data.len() && !before(data[idx]) && !after(data[idx]) {
            idx += 1;
        }
        if idx < data.len() && after(data[idx]) {
            idx += 1;
        }
        debug_assert!(idx > start);
        parts.push(data[start..idx].to_vec());
        reducible.push(true);
    }
}
