//! Selector preprocessing for the extended grammar.
//!
//! A raw selector is rewritten by a fixed sequence of passes (see
//! [`passes::PASSES`]). Each pass either expands a custom pseudo-class into
//! native selector syntax (`:inline-style`, `:has`) or removes it from the
//! text and records it in a bag. Every bag is then anchored to the compound
//! it annotated, so `div:hidden p` constrains the `div`, not the `p`. The
//! result is a [`CompiledQuery`]: native-safe selector text plus the
//! [`PredicateTable`] the native engine cannot express.
//!
//! # Example
//!
//! ```
//! use opti_query::compile::compile;
//!
//! let compiled = compile("div:hidden").unwrap();
//! assert_eq!(compiled.base(), "div");
//! assert!(compiled.predicates().get("div").unwrap().hidden);
//! ```

mod binding;
pub mod passes;
pub mod predicates;
pub(crate) mod scan;
pub(crate) mod structure;

pub use passes::{Pass, Working, PASSES};
pub use predicates::{CompiledQuery, PredicateBag, PredicateEntry, PredicateTable, StyleAssertion};
pub use structure::Combinator;

use crate::query::errors::QueryError;
use tracing::{debug, trace};

/// Custom pseudo-classes understood by the preprocessor, in pass order.
pub const CUSTOM_PSEUDO_CLASSES: &[&str] = &[
    "::before",
    "::after",
    ":parent",
    ":this-first-child",
    ":this-last-child",
    ":this-nth-child",
    ":inline-style",
    ":external-style",
    ":style",
    ":hasText",
    ":has",
    ":hidden",
    ":visible",
    ":event",
];

/// Compile an extended selector into native selector text plus predicates.
pub fn compile(selector: &str) -> Result<CompiledQuery, QueryError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(QueryError::malformed(selector, "empty selector"));
    }
    scan::check_balanced(selector)?;

    let mut working = Working::new(selector);
    for (name, pass) in PASSES {
        working = pass(working)?;
        trace!(pass = name, text = %working.text, "rewrite pass");
    }

    let compiled = working.finish();
    debug!(
        selector,
        base = compiled.base(),
        predicates = compiled.predicates().len(),
        "compiled selector"
    );

    Ok(compiled)
}

/// Alias of [`compile`] under the name the query grammar documents.
pub fn parse_query(selector: &str) -> Result<CompiledQuery, QueryError> {
    compile(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_round_trip() {
        let compiled = compile("div:hidden").unwrap();
        assert_eq!(compiled.base(), "div");
        let bag = compiled.predicates().get("div").unwrap();
        assert!(bag.hidden);
        assert!(!bag.visible);
    }

    #[test]
    fn plain_selector_passes_through() {
        let compiled = compile("  ul > li.item:first-child  ").unwrap();
        assert_eq!(compiled.base(), "ul > li.item:first-child");
        assert!(compiled.predicates().is_empty());
    }

    #[test]
    fn empty_selector_is_malformed() {
        assert!(compile("   ").unwrap_err().is_malformed());
    }

    #[test]
    fn unbalanced_selector_is_malformed_before_passes() {
        assert!(compile("div:style(color=red").unwrap_err().is_malformed());
    }

    #[test]
    fn multiple_pseudo_classes_share_one_bag() {
        let compiled = compile("button:event(click):visible:hasText(Save)").unwrap();
        assert_eq!(compiled.base(), "button");
        assert_eq!(compiled.predicates().len(), 1);

        let bag = compiled.predicates().get("button").unwrap();
        assert!(bag.visible);
        assert_eq!(bag.event, vec!["click"]);
        assert_eq!(bag.has_text, vec!["Save"]);
    }

    #[test]
    fn branches_keep_separate_bags() {
        let compiled = compile("div:hidden, div:visible").unwrap();
        assert_eq!(compiled.base(), "div, div");

        let entries = compiled.predicates().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].branch, 0);
        assert!(entries[0].bag.hidden);
        assert_eq!(entries[1].branch, 1);
        assert!(entries[1].bag.visible);
    }

    #[test]
    fn inline_style_and_has_are_resolved_at_compile_time() {
        let compiled = compile("section:has(p:inline-style(color=red))").unwrap();
        assert_eq!(compiled.base(), ":is(section > p[style*=\"color:red\"])");
        assert!(compiled.predicates().is_empty());
    }

    #[test]
    fn predicate_inside_has_argument_keys_on_expanded_fragment() {
        let compiled = compile("ul:has(li:hidden)").unwrap();
        assert_eq!(compiled.base(), ":is(ul > li)");
        assert!(compiled.predicates().get("ul > li").unwrap().hidden);
    }

    #[test]
    fn pseudo_element_markers_are_stripped() {
        let compiled = compile("p.note::after").unwrap();
        assert_eq!(compiled.base(), "p.note");
        assert!(compiled.predicates().get("p.note").unwrap().before);
    }

    #[test]
    fn predicate_on_ancestor_compound_is_anchored_there() {
        let compiled = compile("div:visible > div:hasText(x)").unwrap();
        assert_eq!(compiled.base(), "div > div");

        let entries = compiled.predicates().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].anchor, [0, 0]);
        assert!(entries[0].bag.visible);
        assert_eq!(entries[1].anchor, [0, 1]);
        assert_eq!(entries[1].bag.has_text, vec!["x"]);
    }

    #[test]
    fn parse_query_is_compile() {
        assert_eq!(parse_query("a:visible"), compile("a:visible"));
    }
}
