use html5ever::LocalName;
use regex::Regex;

use crate::arena_dom;
use crate::attributes::copy_allowed_attributes;
use crate::sanitizer::Sanitizer;
use crate::tree::{Element, Node};

lazy_static! {
    static ref CLOSE_TAG: Regex = Regex::new(r"^</\s*([A-Za-z][A-Za-z0-9-]*)\s*>$").unwrap();
}

fn escape_brackets(input: &str) -> String {
    input.replace('<', "&lt;").replace('>', "&gt;")
}

impl<'p> Sanitizer<'p> {
    /// Sanitizes a single open or close tag seen without any surrounding
    /// tree, as Markdown inline HTML is.
    ///
    /// Close tags are matched literally. Open tags are parsed on their own
    /// and rebuilt with the same attribute filter as [`sanitize_document`];
    /// children are never visited, only their text is carried over. A tag
    /// that is not allowed comes back with its angle brackets escaped; input
    /// that parses to no element at all is returned as given.
    ///
    /// [`sanitize_document`]: Sanitizer::sanitize_document
    pub fn sanitize_tag(&self, input: &str) -> String {
        let input = input.trim();
        if input.is_empty() {
            return String::new();
        }

        if let Some(captures) = CLOSE_TAG.captures(input) {
            let tag = LocalName::from(captures[1].to_ascii_lowercase());
            if self.policy().is_allowed_tag(&tag) || self.policy().is_content_tag(&tag) {
                return format!("</{}>", self.output_name(&tag));
            }
            trace!("escaping close tag {}", input);
            return escape_brackets(input);
        }

        let arena = typed_arena::Arena::new();
        let root = arena_dom::parse_fragment(&arena, input);
        let node = match root.children().find(|child| child.as_element().is_some()) {
            Some(node) => node,
            None => return input.to_string(),
        };
        let source = match node.as_element() {
            Some(source) => source,
            None => return input.to_string(),
        };

        let tag = source.local_name().clone();
        if !self.policy().is_allowed_tag(&tag) && !self.policy().is_content_tag(&tag) {
            trace!("escaping tag {}", input);
            return escape_brackets(input);
        }

        let mut element = Element::new(self.output_name(&tag));
        copy_allowed_attributes(self.policy(), &tag, &source, &mut element);
        let text = node.text_content();
        let empty = text.is_empty();
        if !empty {
            element.append(Node::Text(text));
        }

        let close = format!("</{}>", element.name);
        let mut html = Node::Element(element).to_html();
        if empty && html.ends_with(&close) {
            html.truncate(html.len() - close.len());
        }
        html
    }
}
