//! Opti Query: extended CSS selector queries over HTML documents
//!
//! Selectors are written in a superset of CSS. Custom pseudo-classes such
//! as `:hidden`, `:hasText(...)`, `:style(...)` or `:event(...)` are either
//! rewritten into native selector syntax or lifted into a predicate table,
//! and the candidates the native engine returns are filtered against it.
//!
//! # Architecture
//!
//! - [`compile`]: ordered rewrite passes producing a [`CompiledQuery`]
//!   (native base selector plus predicate table).
//! - [`query`]: the candidate matcher, the single/multi facades, the query
//!   builder, result collections and tag narrowing.
//! - [`dom`]: the parsed document with its style resolver and event ledger.
//! - [`config`]: TOML configuration for user style sheets and event tags.
//!
//! # Example
//!
//! ```
//! use opti_query::Document;
//!
//! let doc = Document::parse(
//!     r#"<div id="x" style="display:none">x</div><div id="y">y</div>"#,
//! );
//!
//! let visible = doc.query_one("div:visible").unwrap().unwrap();
//! assert_eq!(visible.value().id(), Some("y"));
//!
//! let hidden = doc.query_all("div:hidden").unwrap();
//! assert_eq!(hidden.len(), 1);
//! ```

pub mod compile;
pub mod config;
pub mod dom;
pub mod query;

// Re-exports
pub use compile::{compile, parse_query, CompiledQuery, PredicateBag, PredicateTable};
pub use config::{load_from_path, load_from_str, ConfigError, QueryConfig};
pub use dom::{Document, DocumentError, DocumentOptions};
pub use query::{
    Collection, HtmlTag, Lookup, Multi, QueryBuilder, QueryError, Single, Typed,
};
