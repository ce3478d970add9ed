//! Query execution: matcher, facades, builder, collections and narrowing.

pub mod builder;
pub mod collection;
pub mod errors;
pub mod facade;
pub mod matcher;
pub mod narrow;

pub use builder::QueryBuilder;
pub use collection::Collection;
pub use errors::QueryError;
pub use facade::{Multi, Single};
pub use matcher::{native_selector, select_all, select_first, Matcher};
pub use narrow::{HtmlTag, Lookup, Narrow, NarrowAll, Typed};
