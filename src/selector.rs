//! Caller-supplied element allowances.
//!
//! Whole-document sanitization can be given a CSS selector list: elements it
//! matches are kept even when their tag is not on the allow-list (their
//! attributes still go through the normal filter). Any selector `scraper`
//! understands works, combinators and `:not()` included.

use std::collections::HashSet;

use scraper::{Html, Selector};

use crate::arena_dom::{Node, Ref};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ExtraSelector {
    source: String,
    selector: Selector,
}

/// The elements of one parsed document that an [`ExtraSelector`] matched.
pub(crate) struct MatchedElements {
    nodes: HashSet<*const ()>,
}

fn node_key(node: &Node<'_>) -> *const () {
    node as *const Node<'_> as *const ()
}

impl ExtraSelector {
    pub fn parse(source: &str) -> Result<ExtraSelector> {
        match Selector::parse(source) {
            Ok(selector) => Ok(ExtraSelector {
                source: source.to_string(),
                selector,
            }),
            Err(error) => {
                debug!("rejected selector {:?}: {:?}", source, error);
                Err(Error::InvalidSelector(source.to_string()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Matches against `markup` and maps the result onto `document`, which
    /// must be the arena parse of the same markup. Both trees come out of
    /// html5ever's tree builder, so elements line up by document order.
    pub(crate) fn select(&self, markup: &str, document: Ref<'_>) -> MatchedElements {
        let html = Html::parse_document(markup);
        let matched: HashSet<_> = html.select(&self.selector).map(|element| element.id()).collect();
        let positions: HashSet<usize> = html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_element())
            .enumerate()
            .filter(|(_, node)| matched.contains(&node.id()))
            .map(|(position, _)| position)
            .collect();

        let nodes = document
            .descendants()
            .filter(|node| node.as_element().is_some())
            .enumerate()
            .filter(|(position, _)| positions.contains(position))
            .map(|(_, node)| node_key(node))
            .collect();
        MatchedElements { nodes }
    }
}

impl MatchedElements {
    pub(crate) fn contains(&self, node: &Node<'_>) -> bool {
        self.nodes.contains(&node_key(node))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::arena_dom::{parse_document, NodeData};

    fn matched_names(selector: &str, html: &str) -> Vec<String> {
        let selector = ExtraSelector::parse(selector).unwrap();
        let arena = typed_arena::Arena::new();
        let document = parse_document(&arena, html);
        let matched = selector.select(html, document);
        document
            .descendants()
            .filter(|node| matched.contains(node))
            .filter_map(|node| match node.data {
                NodeData::Element { ref name, .. } => Some(name.local.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn matches_type_selector() {
        assert_eq!(
            matched_names("custom-card", "<custom-card></custom-card><span></span>"),
            ["custom-card"]
        );
    }

    #[test]
    fn matches_class_and_id() {
        assert_eq!(
            matched_names("span.note", "<span class=\"big note\"></span><div class=\"note\"></div>"),
            ["span"]
        );
        assert_eq!(
            matched_names("#main", "<section id=\"main\"></section><p></p>"),
            ["section"]
        );
    }

    #[test]
    fn matches_attributes() {
        assert_eq!(
            matched_names("[data-widget]", "<x-widget data-widget></x-widget><p></p>"),
            ["x-widget"]
        );
        assert_eq!(
            matched_names(
                "[data-kind^=chart]",
                "<x-a data-kind=\"chart-bar\"></x-a><x-b data-kind=\"table\"></x-b>"
            ),
            ["x-a"]
        );
    }

    #[test]
    fn matches_combinators_and_negation() {
        assert_eq!(
            matched_names("div > x-item", "<div><x-item></x-item></div><x-item></x-item>"),
            ["x-item"]
        );
        assert_eq!(
            matched_names(
                "x-item:not(.hidden)",
                "<x-a class=\"hidden\"></x-a><x-item class=\"hidden\"></x-item><x-item></x-item>"
            )
            .len(),
            1
        );
    }

    #[test]
    fn matches_any_alternative() {
        assert_eq!(
            matched_names("video, .embed", "<p class=\"embed\"></p><video></video>"),
            ["p", "video"]
        );
    }

    #[test]
    fn positions_survive_tree_fixups() {
        // The parser moves the stray <x-item> in front of the table.
        assert_eq!(
            matched_names(
                "x-item",
                "<table><x-item></x-item><tr><td>1</td></tr></table>"
            ),
            ["x-item"]
        );
    }

    #[test]
    fn rejects_invalid_selectors() {
        assert!(ExtraSelector::parse("div >").is_err());
        assert!(ExtraSelector::parse("[").is_err());
        assert!(ExtraSelector::parse("").is_err());
        assert_eq!(ExtraSelector::parse("div span").unwrap().as_str(), "div span");
    }
}
