//! Per-occurrence binding of predicates to compounds.
//!
//! While the passes run, every extracted pseudo-class leaves a marker in the
//! working text that carries the index of its bag. Markers travel with the
//! text through later rewrites (a `:has` expansion may copy one into several
//! alternatives), so once the passes are done each surviving marker sits in
//! the compound it annotates. [`bind`] walks the selector structure, turns
//! every marker into a table entry anchored at that compound and strips the
//! markers out of the native selector text.

use crate::compile::predicates::{PredicateBag, PredicateTable};
use crate::compile::structure::{self, extend, Complex};

const MARKER_OPEN: &str = ":\u{E000}";
const MARKER_CLOSE: char = '\u{E001}';

/// Marker text standing in for bag `id`.
pub(crate) fn marker(id: usize) -> String {
    format!("{MARKER_OPEN}{id}{MARKER_CLOSE}")
}

/// Byte offset and bag id of every marker in `text`.
fn markers(text: &str) -> Vec<(usize, usize)> {
    text.match_indices(MARKER_OPEN)
        .filter_map(|(offset, _)| {
            let rest = &text[offset + MARKER_OPEN.len()..];
            let close = rest.find(MARKER_CLOSE)?;
            rest[..close].parse().ok().map(|id| (offset, id))
        })
        .collect()
}

/// `text` with every marker removed.
pub(crate) fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(MARKER_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MARKER_OPEN.len()..];
        rest = match after.find(MARKER_CLOSE) {
            Some(close) => &after[close + MARKER_CLOSE.len_utf8()..],
            None => after,
        };
    }
    out.push_str(rest);

    out
}

/// Native selector text plus the anchored predicate table for marked text.
pub(crate) fn bind(text: &str, bags: &[PredicateBag]) -> (String, PredicateTable) {
    let mut table = PredicateTable::new();

    for (index, item) in structure::parse(text).items.iter().enumerate() {
        collect(text, item, &[index], bags, &mut table);
    }

    (strip(text).trim().to_string(), table)
}

fn collect(
    text: &str,
    complex: &Complex,
    path: &[usize],
    bags: &[PredicateBag],
    table: &mut PredicateTable,
) {
    for (position, compound) in complex.compounds.iter().enumerate() {
        let anchor = extend(path, &[position]);
        let fragment = strip(&text[complex.range.start..compound.range.end]);

        for (offset, id) in markers(&text[compound.range.clone()]) {
            if compound.in_group(compound.range.start + offset) {
                continue;
            }
            if let Some(bag) = bags.get(id) {
                table.bag_mut(&anchor, fragment.trim()).merge(bag);
            }
        }

        for (group_index, group) in compound.groups.iter().enumerate() {
            for (item_index, item) in group.items.iter().enumerate() {
                let nested = extend(&anchor, &[group_index, item_index]);
                collect(text, item, &nested, bags, table);
            }
        }
    }
}
