//! Property tests for the query pipeline

use opti_query::{compile, Document};
use proptest::prelude::*;
use scraper::Selector;

fn tag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["div", "p", "span", "li", "a", "section"])
}

fn simple_selector() -> impl Strategy<Value = String> {
    (
        tag(),
        prop::option::of(prop::sample::select(vec!["a", "b", "c"])),
        prop::option::of(prop::sample::select(vec![" > ", " ", " + ", " ~ "])),
        tag(),
    )
        .prop_map(|(outer, class, combinator, inner)| {
            let mut selector = outer.to_string();
            if let Some(class) = class {
                selector.push('.');
                selector.push_str(class);
            }
            if let Some(combinator) = combinator {
                selector.push_str(combinator);
                selector.push_str(inner);
            }
            selector
        })
}

fn styled_element() -> impl Strategy<Value = String> {
    (
        tag(),
        prop::sample::select(vec!["block", "none", "inline"]),
        prop::sample::select(vec!["visible", "hidden"]),
        prop::sample::select(vec!["1", "0", "0.0", "0.5", "0%"]),
        prop::sample::select(vec!["a", "b", "c"]),
    )
        .prop_map(|(tag, display, visibility, opacity, class)| {
            format!(
                r#"<{tag} class="{class}" style="display:{display};visibility:{visibility};opacity:{opacity}">t</{tag}>"#
            )
        })
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(styled_element(), 1..8).prop_map(|elements| {
        let mut markup = String::from("<div class=\"a\">");
        for element in &elements {
            markup.push_str(element);
        }
        markup.push_str("</div>");
        markup
    })
}

proptest! {
    #[test]
    fn plain_selectors_compile_to_themselves(selector in simple_selector()) {
        let compiled = compile(&selector).unwrap();
        prop_assert_eq!(compiled.base(), selector.as_str());
        prop_assert!(compiled.predicates().is_empty());
    }

    #[test]
    fn plain_selectors_match_native_engine(markup in document(), selector in simple_selector()) {
        let doc = Document::parse(&markup);
        let native = Selector::parse(&selector).unwrap();

        let expected: Vec<_> = doc.html().select(&native).collect();
        let actual = doc.query_all(&selector).unwrap().into_vec();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn hidden_and_visible_partition_candidates(markup in document(), name in tag()) {
        let doc = Document::parse(&markup);

        let all = doc.query_all(name).unwrap().into_vec();
        let hidden = doc.query_all(&format!("{name}:hidden")).unwrap().into_vec();
        let visible = doc.query_all(&format!("{name}:visible")).unwrap().into_vec();

        prop_assert_eq!(hidden.len() + visible.len(), all.len());
        for element in &hidden {
            prop_assert!(!visible.contains(element));
        }
    }
}
