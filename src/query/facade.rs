//! The single-result (`$`) and multi-result (`$$`) entry points.

use crate::dom::Document;
use crate::query::errors::QueryError;
use crate::query::builder::QueryBuilder;
use crate::query::collection::Collection;
use crate::query::matcher;
use crate::query::narrow::{Narrow, NarrowAll};
use scraper::ElementRef;

/// Single-result facade.
#[derive(Debug, Clone, Copy)]
pub struct Single<'d> {
    document: &'d Document,
}

impl<'d> Single<'d> {
    /// First element matching the extended selector.
    pub fn select(&self, selector: &str) -> Result<Option<ElementRef<'d>>, QueryError> {
        matcher::select_first(self.document, selector)
    }

    /// Native lookup narrowed to a tag; see [`Narrow::tag`].
    pub fn assert(&self, selector: &str) -> Narrow<'d> {
        Narrow::new(self.document, selector)
    }

    /// Same as [`Single::assert`].
    pub fn explicit(&self, selector: &str) -> Narrow<'d> {
        Narrow::new(self.document, selector)
    }

    pub fn query(&self) -> QueryBuilder<'d> {
        QueryBuilder::new(self.document)
    }

    pub fn all(&self, _selector: &str) -> Result<Collection<ElementRef<'d>>, QueryError> {
        Err(QueryError::not_supported("$.all"))
    }

    pub fn tear(&self, _selector: &str) -> Result<ElementRef<'d>, QueryError> {
        Err(QueryError::not_supported("$.tear"))
    }

    pub fn with(&self, _selector: &str) -> Result<Option<ElementRef<'d>>, QueryError> {
        Err(QueryError::not_supported("$.with"))
    }
}

/// Multi-result facade.
#[derive(Debug, Clone, Copy)]
pub struct Multi<'d> {
    document: &'d Document,
}

impl<'d> Multi<'d> {
    /// Every element matching the extended selector, in document order.
    pub fn select(&self, selector: &str) -> Result<Collection<ElementRef<'d>>, QueryError> {
        matcher::select_all(self.document, selector).map(Collection::from)
    }

    pub fn assert(&self, selector: &str) -> NarrowAll<'d> {
        NarrowAll::new(self.document, selector)
    }

    pub fn explicit(&self, selector: &str) -> NarrowAll<'d> {
        NarrowAll::new(self.document, selector)
    }

    pub fn query(&self) -> QueryBuilder<'d> {
        QueryBuilder::new(self.document)
    }

    pub fn all(&self, _selector: &str) -> Result<Collection<Vec<ElementRef<'d>>>, QueryError> {
        Err(QueryError::not_supported("$$.all"))
    }

    pub fn live(&self, _selector: &str) -> Result<Collection<ElementRef<'d>>, QueryError> {
        Err(QueryError::not_supported("$$.live"))
    }

    pub fn with(&self, _selector: &str) -> Result<Collection<ElementRef<'d>>, QueryError> {
        Err(QueryError::not_supported("$$.with"))
    }

    pub fn tear(&self, _selector: &str) -> Result<Collection<ElementRef<'d>>, QueryError> {
        Err(QueryError::not_supported("$$.tear"))
    }
}

impl Document {
    pub fn single(&self) -> Single<'_> {
        Single { document: self }
    }

    pub fn multi(&self) -> Multi<'_> {
        Multi { document: self }
    }

    /// Shorthand for `self.single().select(selector)`.
    pub fn query_one(&self, selector: &str) -> Result<Option<ElementRef<'_>>, QueryError> {
        self.single().select(selector)
    }

    /// Shorthand for `self.multi().select(selector)`.
    pub fn query_all(&self, selector: &str) -> Result<Collection<ElementRef<'_>>, QueryError> {
        self.multi().select(selector)
    }
}
