use serde::Serialize;
use std::fmt;

/// A single `prop=value` assertion from `:style(...)` or `:external-style(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleAssertion {
    pub property: String,
    pub value: String,
}

impl StyleAssertion {
    /// Parse `prop=value` or `prop:value`. Property names are lowercased;
    /// the value is kept as written (trimmed).
    pub fn parse(declaration: &str) -> Option<Self> {
        let split = declaration.find(|c: char| c == '=' || c == ':')?;
        let property = declaration[..split].trim();
        let value = declaration[split + 1..].trim();

        if property.is_empty() || value.is_empty() {
            return None;
        }

        Some(Self {
            property: property.to_ascii_lowercase(),
            value: value.to_string(),
        })
    }

    /// Compare against a resolved style value.
    pub fn holds_for(&self, actual: Option<&str>) -> bool {
        actual.is_some_and(|actual| actual.trim().eq_ignore_ascii_case(&self.value))
    }
}

impl fmt::Display for StyleAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.property, self.value)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Non-native constraints attached to one selector fragment.
///
/// All present predicates are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredicateBag {
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub visible: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<String>,
    #[serde(rename = "hasText", skip_serializing_if = "Vec::is_empty")]
    pub has_text: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub before: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub after: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub parent: bool,
    #[serde(rename = "styleexternal", skip_serializing_if = "Vec::is_empty")]
    pub style_external: Vec<StyleAssertion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleAssertion>,
    #[serde(rename = "thisfirstchild", skip_serializing_if = "is_false")]
    pub this_first_child: bool,
    #[serde(rename = "thislastchild", skip_serializing_if = "is_false")]
    pub this_last_child: bool,
    #[serde(rename = "thisnthchild", skip_serializing_if = "Option::is_none")]
    pub this_nth_child: Option<usize>,
}

impl PredicateBag {
    pub fn is_empty(&self) -> bool {
        *self == PredicateBag::default()
    }

    /// Whether any positional constraint is present.
    pub fn is_positional(&self) -> bool {
        self.this_first_child || self.this_last_child || self.this_nth_child.is_some()
    }

    /// Fold another bag for the same compound into this one.
    pub fn merge(&mut self, other: &PredicateBag) {
        self.hidden |= other.hidden;
        self.visible |= other.visible;
        self.before |= other.before;
        self.after |= other.after;
        self.parent |= other.parent;
        self.this_first_child |= other.this_first_child;
        self.this_last_child |= other.this_last_child;
        if other.this_nth_child.is_some() {
            self.this_nth_child = other.this_nth_child;
        }

        for name in &other.event {
            if !self.event.contains(name) {
                self.event.push(name.clone());
            }
        }
        self.has_text.extend(other.has_text.iter().cloned());
        self.styles.extend(other.styles.iter().cloned());
        self.style_external.extend(other.style_external.iter().cloned());
    }
}

/// One predicate bag with the compound it annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateEntry {
    /// Index of the top-level selector-list item the annotation came from.
    pub branch: usize,
    /// Structural path to the annotated compound in the base selector:
    /// `[item, compound]`, extended by `[group, item, compound]` for each
    /// functional pseudo-class argument the compound sits in.
    pub anchor: Vec<usize>,
    /// Native selector text of the enclosing complex selector up to and
    /// including the annotated compound.
    pub fragment: String,
    pub bag: PredicateBag,
}

/// Ordered predicate entries accumulated by the preprocessor.
///
/// Entries anchored at the same compound share a bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PredicateTable {
    entries: Vec<PredicateEntry>,
}

impl PredicateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PredicateEntry] {
        &self.entries
    }

    /// First bag recorded under `fragment`, in any branch.
    pub fn get(&self, fragment: &str) -> Option<&PredicateBag> {
        self.entries
            .iter()
            .find(|entry| entry.fragment == fragment)
            .map(|entry| &entry.bag)
    }

    /// Entries recorded for one selector-list branch.
    pub fn branch(&self, branch: usize) -> impl Iterator<Item = &PredicateEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.branch == branch)
    }

    /// Bag for the compound at `anchor`, created empty on first use.
    pub fn bag_mut(&mut self, anchor: &[usize], fragment: &str) -> &mut PredicateBag {
        let index = match self
            .entries
            .iter()
            .position(|entry| entry.anchor == anchor)
        {
            Some(index) => index,
            None => {
                self.entries.push(PredicateEntry {
                    branch: anchor.first().copied().unwrap_or_default(),
                    anchor: anchor.to_vec(),
                    fragment: fragment.to_string(),
                    bag: PredicateBag::default(),
                });
                self.entries.len() - 1
            }
        };

        &mut self.entries[index].bag
    }
}

/// Result of preprocessing: native-safe selector text plus predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    base: String,
    predicates: PredicateTable,
}

impl CompiledQuery {
    pub(crate) fn new(base: String, predicates: PredicateTable) -> Self {
        Self { base, predicates }
    }

    /// Selector text handed to the native engine.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn predicates(&self) -> &PredicateTable {
        &self.predicates
    }

    pub fn into_parts(self) -> (String, PredicateTable) {
        (self.base, self.predicates)
    }
}
