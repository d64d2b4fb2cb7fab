//! Allow-list HTML sanitizer.
//!
//! Untrusted markup is parsed with html5ever, rebuilt from the parts a
//! [`Policy`] allows and serialized again. Tags that are not allowed are not
//! dropped: their original markup is emitted as escaped text.
//!
//! ```
//! assert_eq!(
//!     html_escaper::sanitize_document("<a href=\"javascript:alert(1)\">Click me</a>"),
//!     "<a>Click me</a>"
//! );
//! assert_eq!(html_escaper::sanitize_tag("<script>"), "&lt;script&gt;");
//! ```
#![warn(clippy::all)]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate html5ever;
#[macro_use]
extern crate maplit;
#[macro_use]
extern crate log;

use std::collections::BTreeMap;

mod arena_dom;
mod attributes;
mod config;
mod css_parser;
mod error;
pub mod markdown;
mod policy;
mod sanitizer;
mod selector;
mod tag;
mod tree;

pub use config::default::DEFAULT_POLICY;
pub use css_parser::{parse_css_style_attribute, CssDeclaration};
pub use error::{Error, Result};
pub use policy::{Policy, PolicyConfig};
pub use sanitizer::Sanitizer;
pub use selector::ExtraSelector;

pub fn sanitize_document(html: &str) -> String {
    Sanitizer::new(&DEFAULT_POLICY).sanitize_document(html)
}

/// Like [`sanitize_document`], additionally keeping elements matched by the
/// selector list `extra_selector` (see [`ExtraSelector`]).
pub fn sanitize_document_with_selector(html: &str, extra_selector: &str) -> Result<String> {
    let selector = ExtraSelector::parse(extra_selector)?;
    Ok(Sanitizer::new(&DEFAULT_POLICY).sanitize_document_with(html, Some(&selector)))
}

pub fn sanitize_tag(tag: &str) -> String {
    Sanitizer::new(&DEFAULT_POLICY).sanitize_tag(tag)
}

/// Renders Markdown to HTML, sanitizing embedded HTML under the default
/// policy.
pub fn render_markdown(source: &str) -> String {
    markdown::render_markdown(Sanitizer::new(&DEFAULT_POLICY), source)
}

pub fn allowed_tags() -> &'static [String] {
    DEFAULT_POLICY.allowed_tags()
}

pub fn allowed_attributes() -> &'static BTreeMap<String, Vec<String>> {
    DEFAULT_POLICY.allowed_attributes()
}

pub fn allowed_css_styles() -> &'static [String] {
    DEFAULT_POLICY.allowed_css_properties()
}

pub fn allowed_schemas() -> &'static [String] {
    DEFAULT_POLICY.allowed_uri_schemes()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn getters_expose_default_tables() {
        assert!(allowed_tags().iter().any(|tag| tag == "p"));
        assert!(allowed_tags().iter().any(|tag| tag == "div"));
        assert!(allowed_attributes()["*"].iter().any(|name| name == "class"));
        assert!(allowed_attributes()["a"].iter().any(|name| name == "href"));
        assert!(allowed_css_styles().iter().any(|name| name == "color"));
        assert!(allowed_css_styles().iter().any(|name| name == "background-color"));
        assert!(allowed_schemas().iter().any(|scheme| scheme == "https:"));
        assert!(allowed_schemas().iter().all(|scheme| scheme.ends_with(':')));
    }

    #[test]
    fn selector_entry_point() {
        assert_eq!(
            sanitize_document_with_selector("<x-note>hi</x-note>", "x-note").unwrap(),
            "<x-note>hi</x-note>"
        );
        assert_eq!(
            sanitize_document_with_selector("<p><x-note>a</x-note></p><x-note>b</x-note>", "p > x-note")
                .unwrap(),
            "<p><x-note>a</x-note></p>&lt;x-note&gt;b&lt;/x-note&gt;"
        );
        assert!(matches!(
            sanitize_document_with_selector("<p></p>", "p >"),
            Err(Error::InvalidSelector(_))
        ));
    }
}
