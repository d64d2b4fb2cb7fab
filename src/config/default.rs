//! The default allow-lists. Kept as plain tables so a reviewer can audit
//! them without reading any sanitizer logic.

use std::collections::BTreeMap;

use crate::policy::Policy;

/// Tags kept as-is. Executable and embedding elements (`script`, `style`,
/// `iframe`, `object`, `embed`, `base`, `template`, `noscript`, ...) are
/// deliberately absent, as are elements whose text html5ever serializes
/// without escaping.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "b", "basefont", "bdi",
    "bdo", "big", "blink", "blockquote", "br", "button", "caption", "center", "cite", "code",
    "col", "colgroup", "command", "content", "data", "datalist", "dd", "del", "details", "dfn",
    "dialog", "dir", "div", "dl", "dt", "element", "em", "fieldset", "figcaption", "figure",
    "font", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "i",
    "image", "img", "input", "ins", "isindex", "kbd", "keygen", "label", "legend", "li",
    "listing", "main", "map", "mark", "marquee", "menu", "menuitem", "meter", "multicol", "nav",
    "nobr", "ol", "optgroup", "option", "output", "p", "picture", "pre", "progress", "q", "rp",
    "s", "samp", "section", "select", "shadow", "small", "spacer", "span", "strike", "strong",
    "sub", "summary", "sup", "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "time",
    "tr", "tt", "u", "ul", "var", "wbr",
];

/// Tags whose content is kept but which are rewritten to the container tag.
/// `google-sheets-html-origin` wraps content pasted from a spreadsheet.
pub const ALLOWED_CONTENT_TAGS: &[&str] = &["form", "google-sheets-html-origin"];

pub const CONTENT_CONTAINER: &str = "div";

pub const GLOBAL_ATTRIBUTES: &[&str] = &["id", "title", "class", "style"];

pub const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "alt", "title", "target", "rel"]),
    ("details", &["open"]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("td", &["colspan", "rowspan"]),
    ("th", &["colspan", "rowspan"]),
    ("tr", &["rowspan"]),
];

pub const ALLOWED_CSS_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "font-size",
    "font-weight",
    "text-align",
    "text-decoration",
    "width",
];

pub const ALLOWED_URI_SCHEMES: &[&str] = &["http:", "https:", "data:", "file:", "ftp:", "mailto:"];

pub const URI_ATTRIBUTES: &[&str] = &["href", "action"];

/// Inline tags dropped when nothing but whitespace is left inside them.
pub const COLLAPSIBLE_INLINE_TAGS: &[&str] = &["span", "b", "i", "u"];

pub const MAX_DEPTH: usize = 256;

pub fn strings(table: &[&str]) -> Vec<String> {
    table.iter().map(|entry| entry.to_string()).collect()
}

pub fn allowed_attributes() -> BTreeMap<String, Vec<String>> {
    let mut attributes = btreemap! {
        "*".to_string() => strings(GLOBAL_ATTRIBUTES),
    };
    attributes.extend(
        TAG_ATTRIBUTES
            .iter()
            .map(|(tag, names)| (tag.to_string(), strings(names))),
    );
    attributes
}

lazy_static! {
    pub static ref DEFAULT_POLICY: Policy = Policy::default();
}
