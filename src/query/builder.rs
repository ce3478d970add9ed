use crate::dom::Document;
use crate::query::errors::QueryError;
use crate::query::collection::Collection;
use crate::query::matcher;
use scraper::ElementRef;

/// Incrementally composed selector.
///
/// ```
/// use opti_query::Document;
///
/// let doc = Document::parse(r#"<a class="x">1</a><a>2</a>"#);
/// let found = doc.multi().query().is("a").isnt(".x").collect().unwrap();
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<'d> {
    document: &'d Document,
    parts: Vec<String>,
}

impl<'d> QueryBuilder<'d> {
    pub(crate) fn new(document: &'d Document) -> Self {
        Self {
            document,
            parts: Vec::new(),
        }
    }

    /// Append `:is(selector)`.
    pub fn is(mut self, selector: &str) -> Self {
        self.parts.push(format!(":is({selector})"));
        self
    }

    /// Append `:not(selector)`.
    pub fn isnt(mut self, selector: &str) -> Self {
        self.parts.push(format!(":not({selector})"));
        self
    }

    /// The composed selector text, `*` when nothing was appended.
    pub fn to_selector(&self) -> String {
        if self.parts.is_empty() {
            "*".to_string()
        } else {
            self.parts.concat()
        }
    }

    pub fn first(&self) -> Result<Option<ElementRef<'d>>, QueryError> {
        matcher::select_first(self.document, &self.to_selector())
    }

    pub fn collect(&self) -> Result<Collection<ElementRef<'d>>, QueryError> {
        matcher::select_all(self.document, &self.to_selector()).map(Collection::from)
    }
}
