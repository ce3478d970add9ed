//! Style side channel for the matcher.
//!
//! Reads inline `style` attributes, parses `<style>` sheets into flat rules
//! with `cssparser`, cascades them by importance, origin, specificity and
//! source order, and resolves inherited and initial values for the handful
//! of properties the query grammar cares about. At-rules (`@media`,
//! `@supports`, ...) are skipped.

use cssparser::{
    parse_important, AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput,
    ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
};
use scraper::selector::{Parser as NativeSelectors, Simple};
use scraper::ElementRef;
use selectors::matching::{
    matches_selector, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, Selector as ComplexSelector, SelectorParseErrorKind};
use selectors::{NthIndexCache, SelectorList};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Built-in user-agent defaults.
pub const USER_AGENT_CSS: &str = r#"
[hidden], area, base, basefont, datalist, head, link, meta, noembed,
noframes, param, rp, script, style, template, title { display: none; }

html, body, address, article, aside, blockquote, details, dialog, dd, div,
dl, dt, fieldset, figcaption, figure, footer, form, h1, h2, h3, h4, h5, h6,
header, hgroup, hr, main, menu, nav, ol, p, pre, section, summary, ul { display: block; }

li { display: list-item; }
table { display: table; }
tr { display: table-row; }
td, th { display: table-cell; }
thead { display: table-header-group; }
tbody { display: table-row-group; }
tfoot { display: table-footer-group; }
"#;

/// Properties whose computed value is taken from the parent when undeclared.
const INHERITED: &[&str] = &[
    "visibility",
    "color",
    "cursor",
    "direction",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "letter-spacing",
    "line-height",
    "list-style",
    "text-align",
    "text-indent",
    "text-transform",
    "white-space",
    "word-spacing",
];

fn initial_value(property: &str) -> Option<&'static str> {
    match property {
        "display" => Some("inline"),
        "visibility" => Some("visible"),
        "opacity" => Some("1"),
        "position" => Some("static"),
        "float" => Some("none"),
        "overflow" => Some("visible"),
        "white-space" => Some("normal"),
        "text-align" => Some("start"),
        "font-style" => Some("normal"),
        "font-weight" => Some("normal"),
        _ => None,
    }
}

fn is_inherited(property: &str) -> bool {
    INHERITED.contains(&property)
}

/// Where a style sheet came from, in cascade order for normal declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    UserAgent,
    User,
    Author,
}

impl Origin {
    fn rank(self, important: bool) -> u8 {
        match (self, important) {
            (Origin::UserAgent, false) => 0,
            (Origin::User, false) => 1,
            (Origin::Author, false) => 2,
            (Origin::Author, true) => 0,
            (Origin::User, true) => 1,
            (Origin::UserAgent, true) => 2,
        }
    }
}

/// A single `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Parse a declaration block (`a: b; c: d !important`). Invalid
/// declarations are dropped.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    declaration_list(&mut Parser::new(&mut input))
}

fn declaration_list(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut declarations = DeclarationListParser;
    RuleBodyParser::<_, Declaration, ()>::new(input, &mut declarations)
        .filter_map(Result::ok)
        .collect()
}

/// Declaration list inside a style rule or a `style` attribute.
struct DeclarationListParser;

impl<'i> DeclarationParser<'i> for DeclarationListParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Declaration, ParseError<'i, ()>> {
        let start = input.position();
        let mut end = start;
        let mut important = false;

        while !input.is_exhausted() {
            if input.try_parse(parse_important).is_ok() {
                important = true;
                break;
            }
            let opens_block = matches!(
                input.next()?,
                Token::Function(_)
                    | Token::ParenthesisBlock
                    | Token::SquareBracketBlock
                    | Token::CurlyBracketBlock
            );
            if opens_block {
                input.parse_nested_block(|block| {
                    while block.next().is_ok() {}
                    Ok::<_, ParseError<'i, ()>>(())
                })?;
            }
            end = input.position();
        }
        input.expect_exhausted()?;

        let value = input.slice(start..end).trim();
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        Ok(Declaration {
            property: name.to_ascii_lowercase(),
            value: value.to_string(),
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct StyleRule {
    selectors: Vec<ComplexSelector<Simple>>,
    declarations: Vec<Declaration>,
}

impl StyleRule {
    /// Specificity of the most specific selector matching `element`.
    fn matching_specificity(&self, element: &ElementRef<'_>) -> Option<u32> {
        let mut nth_index_cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );

        self.selectors
            .iter()
            .filter(|selector| matches_selector(selector, 0, None, element, &mut context))
            .map(ComplexSelector::specificity)
            .max()
    }
}

enum SheetItem {
    Style(StyleRule),
    Skipped(String),
}

/// Top-level rule list: style rules are kept, at-rules are consumed whole.
struct RuleListParser;

impl<'i> QualifiedRuleParser<'i> for RuleListParser {
    type Prelude = SelectorList<Simple>;
    type QualifiedRule = SheetItem;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        SelectorList::parse(&NativeSelectors, input, ParseRelative::No)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok(SheetItem::Style(StyleRule {
            selectors: prelude.0.into_iter().collect(),
            declarations: declaration_list(input),
        }))
    }
}

impl<'i> AtRuleParser<'i> for RuleListParser {
    type Prelude = String;
    type AtRule = SheetItem;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        _input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(name.to_string())
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        Ok(SheetItem::Skipped(prelude))
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        _input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Ok(SheetItem::Skipped(prelude))
    }
}

/// A parsed style sheet with its cascade origin.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    origin: Origin,
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    /// Parse CSS text. Rules the native selector engine rejects are skipped
    /// with a warning, as browsers do; at-rules (`@media`, `@import`, ...)
    /// are skipped whole.
    pub fn parse(css: &str, origin: Origin) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rule_list = RuleListParser;
        let mut rules = Vec::new();

        for item in StyleSheetParser::new(&mut parser, &mut rule_list) {
            match item {
                Ok(SheetItem::Style(rule)) => rules.push(rule),
                Ok(SheetItem::Skipped(at_rule)) => {
                    debug!(at_rule = %at_rule, "skipping at-rule");
                }
                Err((error, rule)) => {
                    warn!(rule = rule.trim(), error = ?error.kind, "skipping style rule");
                }
            }
        }

        Self { origin, rules }
    }

    /// The built-in user-agent sheet.
    pub fn user_agent() -> Self {
        Self::parse(USER_AGENT_CSS, Origin::UserAgent)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolved visibility of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Weight {
    important: bool,
    origin: u8,
    inline: bool,
    specificity: u32,
    order: (usize, usize, usize),
}

/// Cascade over every sheet attached to a document.
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    sheets: Vec<StyleSheet>,
}

impl StyleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet; later sheets win ties.
    pub fn push(&mut self, sheet: StyleSheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[StyleSheet] {
        &self.sheets
    }

    /// Value declared in the element's own `style` attribute.
    pub fn inline(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        let style = element.value().attr("style")?;
        let mut best: Option<&Declaration> = None;
        let declarations = parse_declarations(style);

        for declaration in declarations.iter().filter(|d| d.property == property) {
            if best.map_or(true, |b| declaration.important || !b.important) {
                best = Some(declaration);
            }
        }

        best.map(|d| d.value.clone())
    }

    /// Value declared by user or author sheets, ignoring inline styles,
    /// inheritance and user-agent defaults.
    pub fn external(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        self.cascade(element, property, &[Origin::User, Origin::Author], false)
    }

    /// Winning declared value across all sheets and the inline style.
    pub fn cascaded(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        self.cascade(
            element,
            property,
            &[Origin::UserAgent, Origin::User, Origin::Author],
            true,
        )
    }

    /// Cascaded value with `inherit`/`initial`/`unset`, inheritance and
    /// initial values resolved.
    pub fn computed(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        let property = property.to_ascii_lowercase();
        match self.cascaded(element, &property) {
            Some(value) if value.eq_ignore_ascii_case("inherit") => {
                self.inherited(element, &property)
            }
            Some(value) if value.eq_ignore_ascii_case("initial") => {
                initial_value(&property).map(str::to_string)
            }
            Some(value) if value.eq_ignore_ascii_case("unset") => {
                if is_inherited(&property) {
                    self.inherited(element, &property)
                } else {
                    initial_value(&property).map(str::to_string)
                }
            }
            Some(value) => Some(value),
            None if is_inherited(&property) => self.inherited(element, &property),
            None => initial_value(&property).map(str::to_string),
        }
    }

    /// Inline value when explicitly set, otherwise the computed value.
    pub fn effective(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        let property = property.to_ascii_lowercase();
        self.inline(element, &property)
            .or_else(|| self.computed(element, &property))
    }

    /// Visible iff display is not `none`, visibility is not `hidden` and
    /// opacity is not zero.
    pub fn visibility(&self, element: ElementRef<'_>) -> Visibility {
        let display = self.effective(element, "display");
        let visibility = self.effective(element, "visibility");
        let opacity = self.effective(element, "opacity");

        let displayed = !display.is_some_and(|v| v.trim().eq_ignore_ascii_case("none"));
        let shown = !visibility.is_some_and(|v| v.trim().eq_ignore_ascii_case("hidden"));
        let opaque = !opacity.is_some_and(|v| is_zero_opacity(&v));

        if displayed && shown && opaque {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    fn inherited(&self, element: ElementRef<'_>, property: &str) -> Option<String> {
        match element.parent().and_then(ElementRef::wrap) {
            Some(parent) => self.computed(parent, property),
            None => initial_value(property).map(str::to_string),
        }
    }

    fn cascade(
        &self,
        element: ElementRef<'_>,
        property: &str,
        origins: &[Origin],
        include_inline: bool,
    ) -> Option<String> {
        let property = property.to_ascii_lowercase();
        let mut winner: Option<(Weight, &str)> = None;

        for (sheet_index, sheet) in self.sheets.iter().enumerate() {
            if !origins.contains(&sheet.origin) {
                continue;
            }
            for (rule_index, rule) in sheet.rules.iter().enumerate() {
                if !rule.declarations.iter().any(|d| d.property == property) {
                    continue;
                }
                let Some(specificity) = rule.matching_specificity(&element) else {
                    continue;
                };
                for (decl_index, declaration) in rule.declarations.iter().enumerate() {
                    if declaration.property != property {
                        continue;
                    }
                    let weight = Weight {
                        important: declaration.important,
                        origin: sheet.origin.rank(declaration.important),
                        inline: false,
                        specificity,
                        order: (sheet_index, rule_index, decl_index),
                    };
                    if winner
                        .as_ref()
                        .map_or(true, |(best, _)| weight.cmp(best) != Ordering::Less)
                    {
                        winner = Some((weight, declaration.value.as_str()));
                    }
                }
            }
        }

        let mut resolved = winner.map(|(weight, value)| (weight, value.to_string()));

        if include_inline {
            if let Some(style) = element.value().attr("style") {
                for (decl_index, declaration) in parse_declarations(style).into_iter().enumerate() {
                    if declaration.property != property {
                        continue;
                    }
                    let weight = Weight {
                        important: declaration.important,
                        origin: Origin::Author.rank(declaration.important),
                        inline: true,
                        specificity: 0,
                        order: (usize::MAX, 0, decl_index),
                    };
                    if resolved
                        .as_ref()
                        .map_or(true, |(best, _)| weight.cmp(best) != Ordering::Less)
                    {
                        resolved = Some((weight, declaration.value));
                    }
                }
            }
        }

        resolved.map(|(_, value)| value)
    }
}

fn is_zero_opacity(value: &str) -> bool {
    let value = value.trim();
    let parsed = match value.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f32>().ok(),
        None => value.parse::<f32>().ok(),
    };
    parsed.is_some_and(|v| v == 0.0)
}

/// Concatenated text content of an element and its descendants.
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(html: &'a Html, selector: &str) -> ElementRef<'a> {
        html.select(&Selector::parse(selector).unwrap()).next().unwrap()
    }

    fn resolver_for(css: &str) -> StyleResolver {
        let mut resolver = StyleResolver::new();
        resolver.push(StyleSheet::user_agent());
        resolver.push(StyleSheet::parse(css, Origin::Author));
        resolver
    }

    #[test]
    fn parses_declarations_with_important() {
        let decls = parse_declarations("Color: red; display:none !important;;bad");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].property, "color");
        assert!(!decls[0].important);
        assert_eq!(decls[1].value, "none");
        assert!(decls[1].important);
    }

    #[test]
    fn declaration_values_keep_functions_and_strings() {
        let decls = parse_declarations(
            "background: url(\"a;b.png\") no-repeat; content: \"x;y\" !IMPORTANT; color:",
        );
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value, "url(\"a;b.png\") no-repeat");
        assert_eq!(decls[1].value, "\"x;y\"");
        assert!(decls[1].important);
    }

    #[test]
    fn sheet_parser_skips_comments_and_at_rules() {
        let sheet = StyleSheet::parse(
            "/* c */ @import url(x.css); @media print { p { color: red } } a, b { color: blue }",
            Origin::Author,
        );
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.rules[0].selectors.len(), 2);
    }

    #[test]
    fn comment_opener_inside_string_keeps_later_rules() {
        let sheet = StyleSheet::parse(
            r#"p.q::before { content: "/*" } #a { display: none }"#,
            Origin::Author,
        );
        assert_eq!(sheet.len(), 1);

        let html = Html::parse_document(r#"<p id="a" class="q">x</p>"#);
        let mut resolver = StyleResolver::new();
        resolver.push(sheet);
        assert_eq!(resolver.visibility(first(&html, "#a")), Visibility::Hidden);
    }

    #[test]
    fn invalid_rule_does_not_swallow_neighbours() {
        let sheet = StyleSheet::parse(
            "p { color: red } p:unknown-thing { color: blue } em { color: green }",
            Origin::Author,
        );
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn specificity_follows_the_matching_selector() {
        let html = Html::parse_document(r#"<p id="t" class="x">hi</p>"#);
        let resolver = resolver_for(
            ":is(#t, p) { color: red } p.x { color: green } :where(#t) { color: blue }",
        );
        assert_eq!(resolver.cascaded(first(&html, "#t"), "color").as_deref(), Some("red"));

        let list = resolver_for("span, p.x { color: red } p.x { color: green }");
        assert_eq!(list.cascaded(first(&html, "#t"), "color").as_deref(), Some("green"));
    }

    #[test]
    fn cascade_prefers_specificity_then_order() {
        let html = Html::parse_document(r#"<p id="t" class="x">hi</p>"#);
        let resolver = resolver_for("p.x { color: red } p { color: blue } p.x { color: green }");
        let p = first(&html, "#t");
        assert_eq!(resolver.cascaded(p, "color").as_deref(), Some("green"));
    }

    #[test]
    fn important_author_beats_inline() {
        let html = Html::parse_document(r#"<p id="t" style="display:block">hi</p>"#);
        let resolver = resolver_for("#t { display: none !important }");
        let p = first(&html, "#t");
        assert_eq!(resolver.cascaded(p, "display").as_deref(), Some("none"));
        assert_eq!(resolver.inline(p, "display").as_deref(), Some("block"));
        assert_eq!(resolver.effective(p, "display").as_deref(), Some("block"));
    }

    #[test]
    fn external_ignores_inline_and_user_agent() {
        let html = Html::parse_document(r#"<div id="t" style="color: red">hi</div>"#);
        let resolver = resolver_for("div { color: blue }");
        let div = first(&html, "#t");
        assert_eq!(resolver.external(div, "color").as_deref(), Some("blue"));
        assert_eq!(resolver.external(div, "display"), None);
        assert_eq!(resolver.computed(div, "display").as_deref(), Some("block"));
    }

    #[test]
    fn visibility_is_inherited() {
        let html = Html::parse_document(
            r#"<div style="visibility:hidden"><span id="s">x</span></div>"#,
        );
        let resolver = resolver_for("");
        let span = first(&html, "#s");
        assert_eq!(resolver.computed(span, "visibility").as_deref(), Some("hidden"));
        assert_eq!(resolver.visibility(span), Visibility::Hidden);
    }

    #[test]
    fn opacity_zero_variants_hide() {
        for style in ["opacity:0", "opacity: 0.0", "opacity:0%"] {
            let markup = format!(r#"<p id="t" style="{style}">x</p>"#);
            let html = Html::parse_document(&markup);
            let resolver = resolver_for("");
            assert_eq!(resolver.visibility(first(&html, "#t")), Visibility::Hidden);
        }
    }

    #[test]
    fn hidden_attribute_uses_user_agent_sheet() {
        let html = Html::parse_document(r#"<p id="t" hidden>x</p><p id="u">y</p>"#);
        let resolver = resolver_for("");
        assert_eq!(resolver.visibility(first(&html, "#t")), Visibility::Hidden);
        assert_eq!(resolver.visibility(first(&html, "#u")), Visibility::Visible);
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let html = Html::parse_document("<div id=\"t\">a<b>b</b>c</div>");
        assert_eq!(text_content(first(&html, "#t")), "abc");
    }
}
