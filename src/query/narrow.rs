//! Tag narrowing: `assert(selector).tag::<T>()`.
//!
//! Narrowing bypasses the extended grammar and asks the native engine
//! directly, keeping only elements whose tag is `T::NAME`.

use crate::dom::Document;
use crate::query::errors::QueryError;
use crate::query::collection::Collection;
use crate::query::matcher::native_selector;
use scraper::ElementRef;
use std::fmt;
use std::marker::PhantomData;

/// An HTML element name known at compile time.
pub trait HtmlTag {
    const NAME: &'static str;
}

macro_rules! html_tags {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            #[doc = concat!("`<", $name, ">`")]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $ty;

            impl HtmlTag for $ty {
                const NAME: &'static str = $name;
            }
        )*
    };
}

html_tags! {
    Anchor => "a",
    Article => "article",
    Body => "body",
    Button => "button",
    Div => "div",
    Form => "form",
    H1 => "h1",
    H2 => "h2",
    H3 => "h3",
    Img => "img",
    Input => "input",
    Label => "label",
    Li => "li",
    Nav => "nav",
    Ol => "ol",
    SelectOption => "option",
    Paragraph => "p",
    Section => "section",
    Select => "select",
    Span => "span",
    Table => "table",
    Td => "td",
    TextArea => "textarea",
    Tr => "tr",
    Ul => "ul",
}

/// An element statically known to be a `T`.
pub struct Typed<'a, T: HtmlTag> {
    element: ElementRef<'a>,
    tag: PhantomData<T>,
}

impl<'a, T: HtmlTag> Typed<'a, T> {
    /// Wrap `element` if its tag name is `T::NAME`.
    pub fn new(element: ElementRef<'a>) -> Option<Self> {
        element
            .value()
            .name()
            .eq_ignore_ascii_case(T::NAME)
            .then_some(Self {
                element,
                tag: PhantomData,
            })
    }

    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    pub fn tag_name(&self) -> &'static str {
        T::NAME
    }

    pub fn id(&self) -> Option<&'a str> {
        self.element.value().id()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn text(&self) -> String {
        self.element.text().collect()
    }
}

impl<T: HtmlTag> Clone for Typed<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: HtmlTag> Copy for Typed<'_, T> {}

impl<T: HtmlTag> PartialEq for Typed<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
    }
}

impl<T: HtmlTag> fmt::Debug for Typed<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("tag", &T::NAME)
            .field("element", &self.element)
            .finish()
    }
}

impl<'a> Typed<'a, Anchor> {
    pub fn href(&self) -> Option<&'a str> {
        self.attr("href")
    }

    pub fn target(&self) -> Option<&'a str> {
        self.attr("target")
    }
}

impl<'a> Typed<'a, Input> {
    pub fn value(&self) -> Option<&'a str> {
        self.attr("value")
    }

    pub fn name(&self) -> Option<&'a str> {
        self.attr("name")
    }

    /// `type` attribute, `text` when absent.
    pub fn input_type(&self) -> &'a str {
        self.attr("type").unwrap_or("text")
    }

    pub fn is_checked(&self) -> bool {
        self.has_attr("checked")
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled")
    }
}

impl<'a> Typed<'a, Img> {
    pub fn src(&self) -> Option<&'a str> {
        self.attr("src")
    }

    pub fn alt(&self) -> Option<&'a str> {
        self.attr("alt")
    }
}

impl<'a> Typed<'a, Form> {
    pub fn action(&self) -> Option<&'a str> {
        self.attr("action")
    }

    /// `method` attribute, `get` when absent.
    pub fn method(&self) -> &'a str {
        self.attr("method").unwrap_or("get")
    }
}

impl<'a> Typed<'a, Button> {
    /// `type` attribute, `submit` when absent.
    pub fn button_type(&self) -> &'a str {
        self.attr("type").unwrap_or("submit")
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled")
    }
}

impl<'a> Typed<'a, Label> {
    pub fn for_id(&self) -> Option<&'a str> {
        self.attr("for")
    }
}

impl<'a> Typed<'a, SelectOption> {
    pub fn value(&self) -> Option<&'a str> {
        self.attr("value")
    }

    pub fn is_selected(&self) -> bool {
        self.has_attr("selected")
    }
}

/// Result of a single narrowing lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// Pending single-element narrowing.
#[derive(Debug, Clone)]
pub struct Narrow<'d> {
    document: &'d Document,
    selector: String,
}

impl<'d> Narrow<'d> {
    pub(crate) fn new(document: &'d Document, selector: &str) -> Self {
        Self {
            document,
            selector: selector.to_string(),
        }
    }

    /// First native match whose tag is `T::NAME`.
    pub fn tag<T: HtmlTag>(&self) -> Result<Lookup<Typed<'d, T>>, QueryError> {
        let selector = native_selector(&self.selector)?;
        Ok(self
            .document
            .html()
            .select(&selector)
            .find_map(Typed::new)
            .into())
    }
}

/// Pending multi-element narrowing.
#[derive(Debug, Clone)]
pub struct NarrowAll<'d> {
    document: &'d Document,
    selector: String,
}

impl<'d> NarrowAll<'d> {
    pub(crate) fn new(document: &'d Document, selector: &str) -> Self {
        Self {
            document,
            selector: selector.to_string(),
        }
    }

    /// Every native match whose tag is `T::NAME`.
    pub fn tag<T: HtmlTag>(&self) -> Result<Collection<Typed<'d, T>>, QueryError> {
        let selector = native_selector(&self.selector)?;
        Ok(self
            .document
            .html()
            .select(&selector)
            .filter_map(Typed::new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_to_matching_tag() {
        let doc = Document::parse(r#"<span class="l">s</span><a class="l" href="/x">a</a>"#);
        let anchor = Narrow::new(&doc, ".l").tag::<Anchor>().unwrap();
        assert_eq!(anchor.found().and_then(|a| a.href()), Some("/x"));
    }

    #[test]
    fn missing_tag_is_not_found() {
        let doc = Document::parse("<p class=\"l\">x</p>");
        let lookup = Narrow::new(&doc, ".l").tag::<Img>().unwrap();
        assert_eq!(lookup, Lookup::NotFound);
    }

    #[test]
    fn narrow_all_filters_by_tag() {
        let doc = Document::parse(
            r#"<input name="a" value="1"><input name="b"><textarea name="c"></textarea>"#,
        );
        let inputs = NarrowAll::new(&doc, "[name]").tag::<Input>().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].value(), Some("1"));
        assert_eq!(inputs[1].input_type(), "text");
    }

    #[test]
    fn custom_grammar_is_rejected_natively() {
        let doc = Document::parse("<p>x</p>");
        let err = Narrow::new(&doc, "p:hidden").tag::<Paragraph>().unwrap_err();
        assert!(err.is_native_rejection());
    }
}
