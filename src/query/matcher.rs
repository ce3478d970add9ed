//! Runs a compiled query against a document and filters the candidates the
//! native engine returns by the recorded predicate bags.
//!
//! Branches without predicates are left to the native engine. A branch with
//! predicates is walked right to left, compound by compound, following its
//! combinators from the candidate to the ancestors and siblings the native
//! match went through; each bag is checked on the element its compound
//! lands on.

use crate::compile::scan::is_ident_char;
use crate::compile::structure::{self, extend, Complex};
use crate::compile::{
    compile, Combinator, CompiledQuery, PredicateBag, PredicateEntry, CUSTOM_PSEUDO_CLASSES,
};
use crate::dom::style::text_content;
use crate::dom::{Document, Visibility};
use crate::query::errors::QueryError;
use scraper::{ElementRef, Selector};
use tracing::debug;

/// Parse selector text with the native engine.
pub fn native_selector(selector: &str) -> Result<Selector, QueryError> {
    Selector::parse(selector).map_err(|error| QueryError::NativeSelectorRejected {
        selector: selector.to_string(),
        message: error.to_string(),
        suggestion: suggest_pseudo_class(selector),
    })
}

/// Closest custom pseudo-class to an unknown one in `selector`, if any is
/// within a couple of edits.
pub fn suggest_pseudo_class(selector: &str) -> Option<String> {
    pseudo_tokens(selector)
        .into_iter()
        .filter(|(token, functional)| !is_native_pseudo(token, *functional))
        .filter_map(|(token, _)| {
            CUSTOM_PSEUDO_CLASSES
                .iter()
                .map(|name| (strsim::levenshtein(&token, name), *name))
                .filter(|(distance, _)| (1..=2).contains(distance))
                .min_by_key(|(distance, _)| *distance)
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name.to_string())
}

fn pseudo_tokens(selector: &str) -> Vec<(String, bool)> {
    let mut tokens = Vec::new();
    let mut rest = selector;

    while let Some(pos) = rest.find(':') {
        let colons = if rest[pos..].starts_with("::") { 2 } else { 1 };
        let after = &rest[pos + colons..];
        let len = after
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map_or(after.len(), |(i, _)| i);

        if len > 0 {
            let functional = after[len..].starts_with('(');
            tokens.push((rest[pos..pos + colons + len].to_string(), functional));
        }
        rest = &after[len..];
    }

    tokens
}

fn is_native_pseudo(token: &str, functional: bool) -> bool {
    let candidate = if functional {
        format!("*{token}(*)")
    } else {
        format!("*{token}")
    };
    let parsed = Selector::parse(&candidate).is_ok();
    parsed
}

struct ScopedBag<'q> {
    fragment: Selector,
    bag: &'q PredicateBag,
}

/// One compound of a complex selector carrying predicates.
struct CompoundPlan<'q> {
    combinator: Option<Combinator>,
    selector: Selector,
    bags: Vec<ScopedBag<'q>>,
    /// Functional pseudo-class arguments holding predicates; each is a list
    /// of alternatives.
    groups: Vec<Vec<ComplexPlan<'q>>>,
}

enum ComplexPlan<'q> {
    /// No predicates inside: the native engine decides alone.
    Native(Selector),
    /// Compounds left to right.
    Bound(Vec<CompoundPlan<'q>>),
}

impl ComplexPlan<'_> {
    fn matches(&self, document: &Document, element: ElementRef<'_>) -> bool {
        match self {
            ComplexPlan::Native(selector) => selector.matches(&element),
            ComplexPlan::Bound(compounds) => match compounds.len().checked_sub(1) {
                Some(last) => match_from(compounds, last, document, element),
                None => false,
            },
        }
    }
}

/// Whether `compounds[..=index]` matches with `element` as the subject of
/// `compounds[index]`, every predicate held by the element it lands on.
fn match_from(
    compounds: &[CompoundPlan<'_>],
    index: usize,
    document: &Document,
    element: ElementRef<'_>,
) -> bool {
    let compound = &compounds[index];
    if !compound.selector.matches(&element) {
        return false;
    }
    if !compound
        .bags
        .iter()
        .all(|scoped| bag_holds(document, element, scoped))
    {
        return false;
    }
    if !compound
        .groups
        .iter()
        .all(|alternatives| alternatives.iter().any(|alt| alt.matches(document, element)))
    {
        return false;
    }

    let (Some(combinator), Some(previous)) = (compound.combinator, index.checked_sub(1)) else {
        return true;
    };
    let next = |candidate: ElementRef<'_>| match_from(compounds, previous, document, candidate);

    match combinator {
        Combinator::Descendant => element.ancestors().filter_map(ElementRef::wrap).any(next),
        Combinator::Child => element.parent().and_then(ElementRef::wrap).is_some_and(next),
        Combinator::NextSibling => element
            .prev_siblings()
            .find_map(ElementRef::wrap)
            .is_some_and(next),
        Combinator::SubsequentSibling => {
            element.prev_siblings().filter_map(ElementRef::wrap).any(next)
        }
    }
}

fn plan_complex<'q>(
    text: &str,
    complex: &Complex,
    path: &[usize],
    entries: &[&'q PredicateEntry],
) -> Result<ComplexPlan<'q>, QueryError> {
    if !entries.iter().any(|entry| entry.anchor.starts_with(path)) {
        return Ok(ComplexPlan::Native(native_selector(
            &text[complex.range.clone()],
        )?));
    }

    let mut compounds = Vec::with_capacity(complex.compounds.len());
    for (position, compound) in complex.compounds.iter().enumerate() {
        let anchor = extend(path, &[position]);

        let bags = entries
            .iter()
            .copied()
            .filter(|entry| entry.anchor == anchor)
            .map(|entry| {
                Ok(ScopedBag {
                    fragment: native_selector(&entry.fragment)?,
                    bag: &entry.bag,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        let mut groups = Vec::new();
        for (group_index, group) in compound.groups.iter().enumerate() {
            let group_path = extend(&anchor, &[group_index]);
            if !entries.iter().any(|entry| entry.anchor.starts_with(&group_path)) {
                continue;
            }
            let alternatives = group
                .items
                .iter()
                .enumerate()
                .map(|(item_index, item)| {
                    plan_complex(text, item, &extend(&group_path, &[item_index]), entries)
                })
                .collect::<Result<Vec<_>, _>>()?;
            groups.push(alternatives);
        }

        compounds.push(CompoundPlan {
            combinator: compound.combinator,
            selector: native_selector(&text[compound.range.clone()])?,
            bags,
            groups,
        });
    }

    Ok(ComplexPlan::Bound(compounds))
}

/// A compiled query bound to native selectors, ready to run.
pub struct Matcher<'q> {
    query: &'q CompiledQuery,
    base: Selector,
    /// One plan per top-level branch; empty when there are no predicates.
    branches: Vec<ComplexPlan<'q>>,
}

impl<'q> Matcher<'q> {
    pub fn new(query: &'q CompiledQuery) -> Result<Self, QueryError> {
        let base = native_selector(query.base())?;

        let entries: Vec<&'q PredicateEntry> = query
            .predicates()
            .entries()
            .iter()
            .filter(|entry| !entry.bag.is_empty())
            .collect();

        let branches = if entries.is_empty() {
            Vec::new()
        } else {
            let text = query.base();
            structure::parse(text)
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| plan_complex(text, item, &[index], &entries))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            query,
            base,
            branches,
        })
    }

    pub fn query(&self) -> &CompiledQuery {
        self.query
    }

    /// First accepted candidate in document order.
    pub fn first<'d>(&self, document: &'d Document) -> Option<ElementRef<'d>> {
        let mut candidates = 0usize;
        let found = document
            .html()
            .select(&self.base)
            .inspect(|_| candidates += 1)
            .find(|element| self.accepts(document, *element));

        debug!(
            base = self.query.base(),
            candidates,
            accepted = found.is_some(),
            "first match"
        );
        found
    }

    /// Every accepted candidate in document order.
    pub fn all<'d>(&self, document: &'d Document) -> Vec<ElementRef<'d>> {
        let mut candidates = 0usize;
        let accepted: Vec<ElementRef<'d>> = document
            .html()
            .select(&self.base)
            .inspect(|_| candidates += 1)
            .filter(|element| self.accepts(document, *element))
            .collect();

        debug!(
            base = self.query.base(),
            candidates,
            accepted = accepted.len(),
            "all matches"
        );
        accepted
    }

    /// Whether a native candidate matches some branch with every predicate
    /// holding on the element its compound lands on.
    pub fn accepts(&self, document: &Document, element: ElementRef<'_>) -> bool {
        if self.branches.is_empty() {
            return true;
        }

        self.branches
            .iter()
            .any(|branch| branch.matches(document, element))
    }
}

fn bag_holds(document: &Document, element: ElementRef<'_>, scoped: &ScopedBag<'_>) -> bool {
    let bag = scoped.bag;

    if !bag.event.is_empty() && !document.events().has_all(element.id(), &bag.event) {
        return false;
    }

    if bag.hidden || bag.visible {
        let visibility = document.styles().visibility(element);
        if bag.hidden && visibility != Visibility::Hidden {
            return false;
        }
        if bag.visible && visibility != Visibility::Visible {
            return false;
        }
    }

    if !bag.has_text.is_empty() {
        let text = text_content(element);
        if !bag.has_text.iter().any(|needle| text.contains(needle.as_str())) {
            return false;
        }
    }

    let styles = document.styles();
    if !bag.styles.iter().all(|assertion| {
        assertion.holds_for(styles.effective(element, &assertion.property).as_deref())
    }) {
        return false;
    }
    if !bag.style_external.iter().all(|assertion| {
        assertion.holds_for(styles.external(element, &assertion.property).as_deref())
    }) {
        return false;
    }

    if bag.is_positional() && !position_holds(element, scoped) {
        return false;
    }

    if bag.parent && !is_parent(element) {
        return false;
    }

    true
}

/// Positional predicates count only siblings that match the fragment.
fn position_holds(element: ElementRef<'_>, scoped: &ScopedBag<'_>) -> bool {
    let Some(parent) = element.parent() else {
        return false;
    };

    let group: Vec<ElementRef<'_>> = parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| scoped.fragment.matches(sibling))
        .collect();
    let Some(position) = group.iter().position(|sibling| *sibling == element) else {
        return false;
    };

    let bag = scoped.bag;
    if bag.this_first_child && position != 0 {
        return false;
    }
    if bag.this_last_child && position + 1 != group.len() {
        return false;
    }
    if let Some(n) = bag.this_nth_child {
        if position + 1 != n {
            return false;
        }
    }

    true
}

fn is_parent(element: ElementRef<'_>) -> bool {
    element.children().any(|child| {
        child.value().is_element()
            || child
                .value()
                .as_text()
                .is_some_and(|text| !text.trim().is_empty())
    })
}

/// Compile and run a selector, returning the first accepted element.
pub fn select_first<'d>(
    document: &'d Document,
    selector: &str,
) -> Result<Option<ElementRef<'d>>, QueryError> {
    let compiled = compile(selector)?;
    Ok(Matcher::new(&compiled)?.first(document))
}

/// Compile and run a selector, returning every accepted element.
pub fn select_all<'d>(
    document: &'d Document,
    selector: &str,
) -> Result<Vec<ElementRef<'d>>, QueryError> {
    let compiled = compile(selector)?;
    Ok(Matcher::new(&compiled)?.all(document))
}
