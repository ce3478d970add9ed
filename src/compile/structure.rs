//! Structural view of selector text.
//!
//! A selector list splits into complex selectors, each complex selector into
//! compounds joined by combinators, and each compound may carry
//! parenthesised groups (`:is(...)`, `:where(...)`) that are themselves
//! selector lists. Only byte ranges are recorded; nothing is validated.

use serde::Serialize;
use std::ops::Range;

/// How a compound relates to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Combinator {
    /// whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    pub range: Range<usize>,
    pub items: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
    /// Trimmed extent of the item.
    pub range: Range<usize>,
    pub compounds: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Compound {
    /// `None` for the leftmost compound.
    pub combinator: Option<Combinator>,
    pub range: Range<usize>,
    pub groups: Vec<SelectorList>,
}

impl Compound {
    /// Whether `offset` falls inside one of the compound's groups.
    pub fn in_group(&self, offset: usize) -> bool {
        self.groups.iter().any(|group| group.range.contains(&offset))
    }
}

/// `prefix` followed by `rest`, for building structural paths.
pub(crate) fn extend(prefix: &[usize], rest: &[usize]) -> Vec<usize> {
    let mut path = Vec::with_capacity(prefix.len() + rest.len());
    path.extend_from_slice(prefix);
    path.extend_from_slice(rest);
    path
}

/// Parse all of `text` as a selector list.
pub(crate) fn parse(text: &str) -> SelectorList {
    parse_list(text, 0..text.len())
}

fn parse_list(text: &str, range: Range<usize>) -> SelectorList {
    let mut items = Vec::new();
    let mut start = range.start;

    for split in top_level(text, range.clone(), |c| c == ',') {
        items.push(parse_complex(text, start..split));
        start = split + 1;
    }
    items.push(parse_complex(text, start..range.end));

    SelectorList { range, items }
}

fn parse_complex(text: &str, range: Range<usize>) -> Complex {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());

    let mut compounds = Vec::new();
    let mut current: Option<usize> = None;
    let mut gap: Option<Combinator> = None;
    let mut groups: Vec<Range<usize>> = Vec::new();
    let mut scanner = Scanner::default();

    for (offset, c) in text[start..end].char_indices() {
        let i = start + offset;
        match scanner.step(c) {
            Step::Open => {
                current.get_or_insert(i);
                if scanner.depth == 1 {
                    groups.push(i + 1..i + 1);
                }
            }
            Step::Close => {
                if scanner.depth == 0 {
                    if let Some(group) = groups.last_mut() {
                        group.end = i;
                    }
                }
            }
            Step::Top if c.is_whitespace() || matches!(c, '>' | '+' | '~') => {
                if let Some(from) = current.take() {
                    compounds.push(finish(text, from..i, &mut gap, &mut groups, compounds.is_empty()));
                }
                gap = match c {
                    '>' => Some(Combinator::Child),
                    '+' => Some(Combinator::NextSibling),
                    '~' => Some(Combinator::SubsequentSibling),
                    _ => gap.or(Some(Combinator::Descendant)),
                };
            }
            _ => {
                current.get_or_insert(i);
            }
        }
    }
    if let Some(from) = current {
        compounds.push(finish(text, from..end, &mut gap, &mut groups, compounds.is_empty()));
    }

    Complex {
        range: start..end,
        compounds,
    }
}

fn finish(
    text: &str,
    range: Range<usize>,
    gap: &mut Option<Combinator>,
    groups: &mut Vec<Range<usize>>,
    leftmost: bool,
) -> Compound {
    let combinator = if leftmost {
        None
    } else {
        Some(gap.unwrap_or(Combinator::Descendant))
    };
    *gap = None;

    Compound {
        combinator,
        range,
        groups: groups.drain(..).map(|group| parse_list(text, group)).collect(),
    }
}

/// Byte offsets in `range` where `is_split` holds at nesting depth zero.
fn top_level(text: &str, range: Range<usize>, is_split: impl Fn(char) -> bool) -> Vec<usize> {
    let mut scanner = Scanner::default();
    text[range.clone()]
        .char_indices()
        .filter(|(_, c)| scanner.step(*c) == Step::Top && is_split(*c))
        .map(|(offset, _)| range.start + offset)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Plain character at nesting depth zero.
    Top,
    /// Inside a string, an attribute selector, an escape or a group.
    Nested,
    Open,
    Close,
}

#[derive(Default)]
struct Scanner {
    depth: usize,
    brackets: usize,
    quote: Option<char>,
    escaped: bool,
}

impl Scanner {
    fn step(&mut self, c: char) -> Step {
        if self.escaped {
            self.escaped = false;
            return Step::Nested;
        }
        if c == '\\' {
            self.escaped = true;
            return Step::Nested;
        }
        if let Some(q) = self.quote {
            if c == q {
                self.quote = None;
            }
            return Step::Nested;
        }
        match c {
            '"' | '\'' => {
                self.quote = Some(c);
                Step::Nested
            }
            '[' => {
                self.brackets += 1;
                Step::Nested
            }
            ']' => {
                self.brackets = self.brackets.saturating_sub(1);
                Step::Nested
            }
            _ if self.brackets > 0 => Step::Nested,
            '(' => {
                self.depth += 1;
                Step::Open
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                Step::Close
            }
            _ if self.depth > 0 => Step::Nested,
            _ => Step::Top,
        }
    }
}
