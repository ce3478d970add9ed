//! The ordered rewrite passes of the selector preprocessor.
//!
//! Each pass is a pure `Working -> Result<Working>` function. Later passes
//! see text already rewritten by earlier ones, so [`PASSES`] order is part
//! of the contract.

use crate::compile::binding;
use crate::compile::predicates::{CompiledQuery, PredicateBag, StyleAssertion};
use crate::compile::scan::{self, Params};
use crate::query::errors::QueryError;
use tracing::trace;

/// Working copy threaded through the passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Working {
    /// Trimmed caller input, kept for error reporting.
    pub selector: String,
    /// Text being rewritten. Extracted pseudo-classes leave a marker naming
    /// their bag in `bags`.
    pub text: String,
    pub bags: Vec<PredicateBag>,
}

impl Working {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            text: selector.to_string(),
            bags: Vec::new(),
        }
    }

    /// Anchor every marker to its compound and strip the markers.
    pub fn finish(self) -> CompiledQuery {
        let (base, table) = binding::bind(&self.text, &self.bags);
        CompiledQuery::new(base, table)
    }

    fn malformed(&self, message: impl Into<String>) -> QueryError {
        QueryError::malformed(&self.selector, message)
    }
}

pub type Pass = fn(Working) -> Result<Working, QueryError>;

/// Passes in execution order.
pub const PASSES: [(&str, Pass); 8] = [
    ("structural", structural_markers),
    ("positional", positional),
    ("inline-style", inline_style),
    ("style", declared_styles),
    ("hasText", has_text),
    ("has", has),
    ("visibility", visibility),
    ("event", event),
];

/// `::before`, `::after`, `:parent`.
///
/// `::after` records the `before` flag, matching the long-standing behaviour
/// of the extended grammar; the `after` field is never set.
pub fn structural_markers(working: Working) -> Result<Working, QueryError> {
    let working = extract(working, "::before", Params::None, |bag, _| {
        bag.before = true;
        Ok(())
    })?;
    let working = extract(working, "::after", Params::None, |bag, _| {
        bag.before = true;
        Ok(())
    })?;
    extract(working, ":parent", Params::None, |bag, _| {
        bag.parent = true;
        Ok(())
    })
}

/// `:this-first-child`, `:this-last-child`, `:this-nth-child(n)`.
pub fn positional(working: Working) -> Result<Working, QueryError> {
    let working = extract(working, ":this-first-child", Params::None, |bag, _| {
        bag.this_first_child = true;
        Ok(())
    })?;
    let working = extract(working, ":this-last-child", Params::None, |bag, _| {
        bag.this_last_child = true;
        Ok(())
    })?;
    extract(working, ":this-nth-child", Params::Required, |bag, args| {
        let raw = args.unwrap_or_default().trim();
        match raw.parse::<usize>() {
            Ok(n) if n > 0 => {
                bag.this_nth_child = Some(n);
                Ok(())
            }
            _ => Err(format!(
                ":this-nth-child expects a positive integer, got '{raw}'"
            )),
        }
    })
}

/// `:inline-style(p=v;...)` expands in place into `[style*="p:v"]` selectors.
pub fn inline_style(mut working: Working) -> Result<Working, QueryError> {
    let mut from = 0;

    while let Some(occ) = scan::find(
        &working.selector,
        &working.text,
        from,
        ":inline-style",
        Params::Required,
    )? {
        let declarations = parse_style_list(&working, ":inline-style", occ.args.as_deref())?;
        let expanded: String = declarations
            .iter()
            .map(|d| {
                format!(
                    "[style*=\"{}:{}\"]",
                    escape_attr(&d.property),
                    escape_attr(&d.value)
                )
            })
            .collect();

        trace!(expanded = %expanded, "expanded :inline-style");
        working.text.replace_range(occ.start..occ.end, &expanded);
        from = occ.start + expanded.len();
    }

    Ok(working)
}

/// `:external-style(...)` and `:style(...)`.
pub fn declared_styles(working: Working) -> Result<Working, QueryError> {
    let working = extract_styles(working, ":external-style", |bag, list| {
        bag.style_external.extend(list)
    })?;
    extract_styles(working, ":style", |bag, list| bag.styles.extend(list))
}

/// `:hasText(a, b, ...)`.
pub fn has_text(working: Working) -> Result<Working, QueryError> {
    extract(working, ":hasText", Params::Required, |bag, args| {
        let needles: Vec<String> = scan::split_top_level(args.unwrap_or_default(), ',')
            .into_iter()
            .map(|part| scan::unquote(part).to_string())
            .filter(|part| !part.is_empty())
            .collect();

        if needles.is_empty() {
            return Err(":hasText requires at least one non-empty text".to_string());
        }
        bag.has_text.extend(needles);
        Ok(())
    })
}

/// `:has(s1, s2, ...)` becomes `:is(fragment > s1, fragment > s2, ...)`.
pub fn has(mut working: Working) -> Result<Working, QueryError> {
    let mut from = 0;

    while let Some(occ) =
        scan::find(&working.selector, &working.text, from, ":has", Params::Required)?
    {
        let prefix = &working.text[occ.fragment_start..occ.start];
        let leading = &prefix[..prefix.len() - prefix.trim_start().len()];
        let fragment = fragment_text(prefix);

        let children: Vec<&str> = scan::split_top_level(occ.args.as_deref().unwrap_or_default(), ',')
            .into_iter()
            .map(str::trim)
            .filter(|child| !child.is_empty())
            .collect();
        if children.is_empty() {
            return Err(working.malformed(":has requires at least one selector"));
        }

        let expanded = format!(
            "{leading}:is({})",
            children
                .iter()
                .map(|child| format!("{fragment} > {child}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        trace!(expanded = %expanded, "expanded :has");
        working
            .text
            .replace_range(occ.fragment_start..occ.end, &expanded);
        // Rescan the expansion so nested :has(...) arguments are rewritten too.
        from = occ.fragment_start;
    }

    Ok(working)
}

/// `:hidden`, `:visible`.
pub fn visibility(working: Working) -> Result<Working, QueryError> {
    let working = extract(working, ":hidden", Params::None, |bag, _| {
        bag.hidden = true;
        Ok(())
    })?;
    extract(working, ":visible", Params::None, |bag, _| {
        bag.visible = true;
        Ok(())
    })
}

/// `:event(a, b, ...)`.
pub fn event(working: Working) -> Result<Working, QueryError> {
    extract(working, ":event", Params::Required, |bag, args| {
        let names: Vec<String> = args
            .unwrap_or_default()
            .split(',')
            .map(|name| scan::unquote(name).trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Err(":event requires at least one event name".to_string());
        }
        for name in names {
            if !bag.event.contains(&name) {
                bag.event.push(name);
            }
        }
        Ok(())
    })
}

/// Replace every occurrence of `name` with a marker for a fresh bag.
///
/// A pseudo-class that formed its compound on its own leaves `*` behind so
/// the base stays native-safe.
fn extract<F>(mut working: Working, name: &str, params: Params, record: F) -> Result<Working, QueryError>
where
    F: Fn(&mut PredicateBag, Option<&str>) -> Result<(), String>,
{
    let mut from = 0;

    while let Some(occ) = scan::find(&working.selector, &working.text, from, name, params)? {
        if occ.negated {
            return Err(working.malformed(format!(
                "{name} cannot be used inside :not(...)"
            )));
        }
        if occ.opaque {
            return Err(working.malformed(format!(
                "{name} can only be nested inside :is(...), :where(...) or :has(...)"
            )));
        }

        let mut bag = PredicateBag::default();
        record(&mut bag, occ.args.as_deref()).map_err(|message| working.malformed(message))?;

        let universal = scan::stands_alone(&working.text[occ.fragment_start..occ.start]);
        let replacement = format!(
            "{}{}",
            if universal { "*" } else { "" },
            binding::marker(working.bags.len())
        );
        working.bags.push(bag);

        trace!(pseudo = name, branch = occ.branch, "recorded predicate");
        working.text.replace_range(occ.start..occ.end, &replacement);
        from = occ.start + replacement.len();
    }

    Ok(working)
}

fn extract_styles<F>(working: Working, name: &str, apply: F) -> Result<Working, QueryError>
where
    F: Fn(&mut PredicateBag, Vec<StyleAssertion>),
{
    extract(working, name, Params::Required, |bag, args| {
        let declarations = split_declarations(args.unwrap_or_default())
            .map_err(|message| format!("{name}: {message}"))?;
        apply(bag, declarations);
        Ok(())
    })
}

fn parse_style_list(
    working: &Working,
    name: &str,
    args: Option<&str>,
) -> Result<Vec<StyleAssertion>, QueryError> {
    split_declarations(args.unwrap_or_default())
        .map_err(|message| working.malformed(format!("{name}: {message}")))
}

fn split_declarations(args: &str) -> Result<Vec<StyleAssertion>, String> {
    let mut declarations = Vec::new();

    for part in scan::split_top_level(args, ';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let declaration = StyleAssertion::parse(scan::unquote(part))
            .ok_or_else(|| format!("expected prop=value, got '{part}'"))?;
        declarations.push(declaration);
    }

    if declarations.is_empty() {
        return Err("expected at least one prop=value declaration".to_string());
    }

    Ok(declarations)
}

fn fragment_text(prefix: &str) -> String {
    if scan::stands_alone(prefix) {
        format!("{}*", prefix.trim_start())
    } else {
        prefix.trim().to_string()
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pass: Pass, input: &str) -> CompiledQuery {
        pass(Working::new(input)).unwrap().finish()
    }

    #[test]
    fn structural_markers_record_before_for_both_pseudo_elements() {
        let q = run(structural_markers, "p::before, span::after");
        assert_eq!(q.base(), "p, span");
        assert!(q.predicates().get("p").unwrap().before);
        let span = q.predicates().get("span").unwrap();
        assert!(span.before);
        assert!(!span.after);
    }

    #[test]
    fn parent_marker_is_removed() {
        let q = run(structural_markers, "ul:parent");
        assert_eq!(q.base(), "ul");
        assert!(q.predicates().get("ul").unwrap().parent);
    }

    #[test]
    fn positional_records_nth() {
        let q = run(positional, "li:this-nth-child(2)");
        assert_eq!(q.base(), "li");
        assert_eq!(q.predicates().get("li").unwrap().this_nth_child, Some(2));
    }

    #[test]
    fn positional_rejects_zero_and_text() {
        assert!(positional(Working::new("li:this-nth-child(0)")).is_err());
        assert!(positional(Working::new("li:this-nth-child(two)")).is_err());
    }

    #[test]
    fn inline_style_expands_to_attribute_selectors() {
        let w = inline_style(Working::new("div:inline-style(color=red;display:none)")).unwrap();
        assert_eq!(
            w.text,
            "div[style*=\"color:red\"][style*=\"display:none\"]"
        );
        assert!(w.bags.is_empty());
    }

    #[test]
    fn declared_styles_are_recorded_in_order() {
        let q = run(
            declared_styles,
            "p:external-style(color=red):style(display=block;opacity=1)",
        );
        assert_eq!(q.base(), "p");
        let bag = q.predicates().get("p").unwrap();
        assert_eq!(bag.style_external[0].to_string(), "color=red");
        let styles: Vec<String> = bag.styles.iter().map(ToString::to_string).collect();
        assert_eq!(styles, vec!["display=block", "opacity=1"]);
    }

    #[test]
    fn malformed_style_is_rejected() {
        let err = declared_styles(Working::new("p:style(color)")).unwrap_err();
        assert!(err.is_malformed());
        let err = declared_styles(Working::new("p:style()")).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn has_text_splits_trims_and_unquotes() {
        let q = run(has_text, "div:hasText(\"a\", , b ,'c, d')");
        assert_eq!(q.base(), "div");
        assert_eq!(q.predicates().get("div").unwrap().has_text, vec!["a", "b", "c, d"]);
    }

    #[test]
    fn has_expands_into_child_combinators() {
        let w = has(Working::new("div:has(p, span.x)")).unwrap();
        assert_eq!(w.text, ":is(div > p, div > span.x)");
    }

    #[test]
    fn has_keeps_other_branches_and_rescans_nested() {
        let w = has(Working::new("a, ul:has(li:has(b))")).unwrap();
        assert_eq!(w.text, "a, :is(:is(ul > li > b))");
    }

    #[test]
    fn visibility_inserts_universal_for_bare_pseudo() {
        let q = run(visibility, "section :hidden");
        assert_eq!(q.base(), "section *");
        let entry = &q.predicates().entries()[0];
        assert_eq!(entry.fragment, "section *");
        assert_eq!(entry.anchor, [0, 1]);
        assert!(entry.bag.hidden);
    }

    #[test]
    fn visibility_rejects_negation() {
        let err = visibility(Working::new("div:not(:hidden)")).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn visibility_rejects_nth_of_arguments() {
        let err = visibility(Working::new("li:nth-child(2 of .a:hidden)")).unwrap_err();
        assert!(err.is_malformed());
        assert!(visibility(Working::new(":where(li:hidden)")).is_ok());
    }

    #[test]
    fn event_names_are_deduplicated() {
        let q = run(event, "button:event(click, keydown):event(click)");
        assert_eq!(q.base(), "button");
        assert_eq!(
            q.predicates().get("button").unwrap().event,
            vec!["click", "keydown"]
        );
    }

    #[test]
    fn predicates_on_outer_compounds_keep_their_position() {
        let q = run(visibility, "div:hidden p, ul > li:visible");
        assert_eq!(q.base(), "div p, ul > li");

        let entries = q.predicates().entries();
        assert_eq!(entries[0].anchor, [0, 0]);
        assert_eq!(entries[0].fragment, "div");
        assert!(entries[0].bag.hidden);
        assert_eq!(entries[1].anchor, [1, 1]);
        assert_eq!(entries[1].fragment, "ul > li");
        assert!(entries[1].bag.visible);
    }

    #[test]
    fn markers_survive_has_expansion() {
        let w = structural_markers(Working::new("ul:parent:has(li, p)")).unwrap();
        let q = has(w).unwrap().finish();
        assert_eq!(q.base(), ":is(ul > li, ul > p)");

        let anchors: Vec<_> = q.predicates().entries().iter().map(|e| e.anchor.clone()).collect();
        assert_eq!(anchors, vec![vec![0, 0, 0, 0, 0], vec![0, 0, 0, 1, 0]]);
        assert!(q.predicates().entries().iter().all(|e| e.bag.parent));
    }
}
