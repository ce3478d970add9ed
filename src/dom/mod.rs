//! Parsed document plus the side channels the matcher consults.

pub mod errors;
pub mod events;
pub mod style;

pub use errors::DocumentError;
pub use events::EventLedger;
pub use style::{Origin, StyleResolver, StyleSheet, Visibility};

use crate::query::errors::QueryError;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tracing::debug;

/// How a document is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Cascade the built-in user-agent sheet.
    pub user_agent_styles: bool,
    /// Parse the markup as a fragment instead of a full document.
    pub fragment: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            user_agent_styles: true,
            fragment: false,
        }
    }
}

/// An HTML tree with its style sheets and event tags.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    styles: StyleResolver,
    events: EventLedger,
}

impl Document {
    /// Parse a full HTML document with default options.
    pub fn parse(markup: &str) -> Self {
        Self::with_options(markup, DocumentOptions::default())
    }

    /// Parse an HTML fragment with default styles.
    pub fn parse_fragment(markup: &str) -> Self {
        Self::with_options(
            markup,
            DocumentOptions {
                fragment: true,
                ..DocumentOptions::default()
            },
        )
    }

    pub fn with_options(markup: &str, options: DocumentOptions) -> Self {
        let html = if options.fragment {
            Html::parse_fragment(markup)
        } else {
            Html::parse_document(markup)
        };

        let mut styles = StyleResolver::new();
        if options.user_agent_styles {
            styles.push(StyleSheet::user_agent());
        }
        for css in author_sheets(&html) {
            styles.push(StyleSheet::parse(&css, Origin::Author));
        }

        debug!(
            sheets = styles.sheets().len(),
            fragment = options.fragment,
            "parsed document"
        );

        Self {
            html,
            styles,
            events: EventLedger::new(),
        }
    }

    /// Read and parse an HTML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let markup = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&markup))
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn styles(&self) -> &StyleResolver {
        &self.styles
    }

    pub fn events(&self) -> &EventLedger {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLedger {
        &mut self.events
    }

    /// Element for a node id, if the node is an element.
    pub fn get(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Cascade an extra user-origin sheet.
    pub fn add_user_stylesheet(&mut self, css: &str) {
        self.styles.push(StyleSheet::parse(css, Origin::User));
    }

    /// Read a user-origin sheet from disk.
    pub fn load_user_stylesheet(&mut self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let css = std::fs::read_to_string(path).map_err(|source| DocumentError::StyleSheet {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_user_stylesheet(&css);
        Ok(())
    }

    /// Tag one element as listening for `event`.
    pub fn tag_event(&mut self, node: NodeId, event: &str) -> bool {
        self.events.tag(node, event)
    }

    /// Tag every element matching `selector` (extended grammar) with each of
    /// `names`. Returns the number of elements tagged.
    pub fn tag_events<S: AsRef<str>>(
        &mut self,
        selector: &str,
        names: &[S],
    ) -> Result<usize, QueryError> {
        let ids: Vec<NodeId> = self
            .query_all(selector)?
            .iter()
            .map(|element| element.id())
            .collect();

        for id in &ids {
            for name in names {
                self.events.tag(*id, name.as_ref());
            }
        }

        debug!(selector, tagged = ids.len(), "tagged events");
        Ok(ids.len())
    }
}

/// Text of every `<style>` element, in document order.
fn author_sheets(html: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("style") else {
        return Vec::new();
    };
    html.select(&selector)
        .map(|style| style.text().collect::<String>())
        .collect()
}
