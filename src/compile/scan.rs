//! Quote-, bracket- and nesting-aware scanning of working selector text.
//!
//! Passes never pattern-match blindly: a pseudo-class only counts when it
//! sits outside strings and attribute selectors and ends on an identifier
//! boundary, so `:has` never matches inside `:hasText(...)`.

use crate::query::errors::QueryError;

/// Whether a pseudo-class takes a parenthesised parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Params {
    None,
    Required,
}

/// A located pseudo-class occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Occurrence {
    /// Byte offset of the leading colon.
    pub start: usize,
    /// Byte offset just past the name or the closing parenthesis.
    pub end: usize,
    /// Raw text between the parentheses.
    pub args: Option<String>,
    /// Start of the selector-list item the occurrence belongs to.
    pub fragment_start: usize,
    /// Top-level selector-list branch index.
    pub branch: usize,
    /// The occurrence sits inside a `:not(...)` argument.
    pub negated: bool,
    /// The occurrence sits inside a functional pseudo-class other than
    /// `:is`, `:where`, `:has` or `:not` (`:nth-child(2 of ...)` and the like).
    pub opaque: bool,
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Reject unbalanced parentheses, brackets and strings before any pass runs.
pub(crate) fn check_balanced(selector: &str) -> Result<(), QueryError> {
    let mut parens = 0usize;
    let mut brackets = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in selector.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '(' => parens += 1,
            ')' => {
                if parens == 0 {
                    return Err(QueryError::malformed(selector, "unexpected ')'"));
                }
                parens -= 1;
            }
            '[' => brackets += 1,
            ']' => {
                if brackets == 0 {
                    return Err(QueryError::malformed(selector, "unexpected ']'"));
                }
                brackets -= 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(QueryError::malformed(selector, "unterminated string"));
    }
    if parens > 0 {
        return Err(QueryError::malformed(
            selector,
            "unbalanced parentheses: missing ')'",
        ));
    }
    if brackets > 0 {
        return Err(QueryError::malformed(
            selector,
            "unterminated attribute selector",
        ));
    }

    Ok(())
}

struct Group {
    item_start: usize,
    negated: bool,
    opaque: bool,
}

const TRANSPARENT_GROUPS: [&str; 4] = [":is", ":where", ":has", ":not"];

/// Find the first occurrence of `name` at or after byte `from`.
///
/// `selector` is the caller's original input and is only used for errors.
pub(crate) fn find(
    selector: &str,
    text: &str,
    from: usize,
    name: &str,
    params: Params,
) -> Result<Option<Occurrence>, QueryError> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut brackets = 0usize;
    let mut groups = vec![Group {
        item_start: 0,
        negated: false,
        opaque: false,
    }];
    let mut branch = 0usize;
    let mut previous: Option<char> = None;

    for (i, c) in text.char_indices() {
        let before = previous;
        previous = Some(c);

        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if brackets > 0 {
            match c {
                '"' | '\'' => quote = Some(c),
                ']' => brackets -= 1,
                _ => {}
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                continue;
            }
            '[' => {
                brackets += 1;
                continue;
            }
            '(' => {
                let outer = groups.last();
                let outer_negated = outer.is_some_and(|g| g.negated);
                let outer_opaque = outer.is_some_and(|g| g.opaque);
                let head = &text[..i];
                groups.push(Group {
                    item_start: i + 1,
                    negated: outer_negated || head.ends_with(":not"),
                    opaque: outer_opaque
                        || !TRANSPARENT_GROUPS.iter().any(|name| head.ends_with(name)),
                });
                continue;
            }
            ')' => {
                if groups.len() > 1 {
                    groups.pop();
                }
                continue;
            }
            ',' => {
                if let Some(group) = groups.last_mut() {
                    group.item_start = i + 1;
                }
                if groups.len() == 1 {
                    branch += 1;
                }
                continue;
            }
            ':' => {}
            _ => continue,
        }

        if i < from || !text[i..].starts_with(name) {
            continue;
        }
        if !name.starts_with("::") && before == Some(':') {
            continue;
        }

        let name_end = i + name.len();
        let next = text[name_end..].chars().next();
        if next.is_some_and(is_ident_char) {
            continue;
        }

        let (fragment_start, negated, opaque) = groups
            .last()
            .map(|g| (g.item_start, g.negated, g.opaque))
            .unwrap_or((0, false, false));

        return match params {
            Params::None => {
                if next == Some('(') {
                    return Err(QueryError::malformed(
                        selector,
                        format!("{name} takes no parameters"),
                    ));
                }
                Ok(Some(Occurrence {
                    start: i,
                    end: name_end,
                    args: None,
                    fragment_start,
                    branch,
                    negated,
                    opaque,
                }))
            }
            Params::Required => {
                if next != Some('(') {
                    return Err(QueryError::malformed(
                        selector,
                        format!("{name} requires a parameter list"),
                    ));
                }
                let close = closing_paren(text, name_end).ok_or_else(|| {
                    QueryError::malformed(
                        selector,
                        format!("unterminated parameter list for {name}"),
                    )
                })?;
                Ok(Some(Occurrence {
                    start: i,
                    end: close + 1,
                    args: Some(text[name_end + 1..close].to_string()),
                    fragment_start,
                    branch,
                    negated,
                    opaque,
                }))
            }
        };
    }

    Ok(None)
}

/// Byte offset of the parenthesis closing the one at `open`.
fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// Split on `separator` at nesting depth zero, outside strings and brackets.
pub(crate) fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut brackets = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '[' => brackets += 1,
            ']' => brackets = brackets.saturating_sub(1),
            c if c == separator && depth == 0 && brackets == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    parts
}

/// Strip one pair of matching surrounding quotes.
pub(crate) fn unquote(value: &str) -> &str {
    let value = value.trim();
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Whether the pseudo-class preceded by `prefix` forms a compound on its own
/// (nothing, whitespace or a combinator directly before the colon).
pub(crate) fn stands_alone(prefix: &str) -> bool {
    match prefix.chars().last() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '>' | '+' | '~'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_flag_pseudo_class_with_fragment() {
        let occ = find("div:hidden", "div:hidden", 0, ":hidden", Params::None)
            .unwrap()
            .unwrap();
        assert_eq!(occ.start, 3);
        assert_eq!(occ.end, 10);
        assert_eq!(occ.fragment_start, 0);
        assert_eq!(occ.branch, 0);
    }

    #[test]
    fn respects_identifier_boundary() {
        let text = "p:hasText(a)";
        assert!(find(text, text, 0, ":has", Params::Required)
            .unwrap()
            .is_none());
    }

    #[test]
    fn ignores_strings_and_attribute_values() {
        let text = "a[title=':hidden'], b[data-x=\":hidden\"]";
        assert!(find(text, text, 0, ":hidden", Params::None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn tracks_branches_and_nested_items() {
        let text = "a, :is(b, c:visible)";
        let occ = find(text, text, 0, ":visible", Params::None)
            .unwrap()
            .unwrap();
        assert_eq!(occ.branch, 1);
        assert_eq!(&text[occ.fragment_start..occ.start], " c");
        assert!(!occ.negated);
    }

    #[test]
    fn marks_occurrences_inside_not() {
        let text = "div:not(.a:hidden)";
        let occ = find(text, text, 0, ":hidden", Params::None)
            .unwrap()
            .unwrap();
        assert!(occ.negated);
    }

    #[test]
    fn marks_occurrences_inside_other_functional_groups() {
        let text = "li:nth-child(2 of .a:hidden)";
        let occ = find(text, text, 0, ":hidden", Params::None)
            .unwrap()
            .unwrap();
        assert!(occ.opaque);
        assert!(!occ.negated);

        let text = ":is(p, :where(.a:hidden))";
        let occ = find(text, text, 0, ":hidden", Params::None)
            .unwrap()
            .unwrap();
        assert!(!occ.opaque);
    }

    #[test]
    fn captures_balanced_arguments() {
        let text = "div:has(p:is(.a, .b), span) > i";
        let occ = find(text, text, 0, ":has", Params::Required)
            .unwrap()
            .unwrap();
        assert_eq!(occ.args.as_deref(), Some("p:is(.a, .b), span"));
        assert_eq!(&text[occ.end..], " > i");
    }

    #[test]
    fn parameterised_pseudo_without_parens_is_malformed() {
        let text = "li:this-nth-child";
        let err = find(text, text, 0, ":this-nth-child", Params::Required).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn flag_pseudo_with_parens_is_malformed() {
        let text = "div:hidden(1)";
        let err = find(text, text, 0, ":hidden", Params::None).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn single_colon_name_skips_pseudo_elements() {
        let text = "p::parent";
        assert!(find(text, text, 0, ":parent", Params::None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn balance_check_reports_each_problem() {
        assert!(check_balanced("div:style(color=red").is_err());
        assert!(check_balanced("div)").is_err());
        assert!(check_balanced("a[href").is_err());
        assert!(check_balanced("a:hasText(\"x)").is_err());
        assert!(check_balanced("a:hasText(\"x)\")").is_ok());
    }

    #[test]
    fn split_top_level_keeps_nested_commas() {
        let parts = split_top_level("a, b:is(c, d), \"e,f\"", ',');
        assert_eq!(parts, vec!["a", " b:is(c, d)", " \"e,f\""]);
    }

    #[test]
    fn unquote_strips_one_pair() {
        assert_eq!(unquote(" \"bye\" "), "bye");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\"mixed'"), "\"mixed'");
    }

    #[test]
    fn stands_alone_after_combinators() {
        assert!(stands_alone(""));
        assert!(stands_alone("div "));
        assert!(stands_alone("ul>"));
        assert!(!stands_alone("div"));
        assert!(!stands_alone("a.b"));
    }
}
