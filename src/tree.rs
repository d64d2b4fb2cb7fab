//! Owned output tree.
//!
//! Sanitized nodes are always built fresh; nothing here points back into the
//! parse arena. Each element owns its children and there are no parent links.

use std::io::{self, Write};

use html5ever::serialize::{AttrRef, Serialize, Serializer, TraversalScope};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, QualName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Zero or more nodes with no identity of their own. Appending a
    /// fragment appends its contents.
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: LocalName,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn empty() -> Node {
        Node::Fragment(vec![])
    }

    pub fn is_whitespace_text(&self) -> bool {
        match self {
            Node::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn to_html(&self) -> String {
        let mut output = vec![];
        let mut writer = HtmlWriter::new(&mut output);
        if let Err(error) = self.serialize(&mut writer, TraversalScope::IncludeNode) {
            warn!("could not serialize sanitized tree: {}", error);
        }
        String::from_utf8_lossy(&output).into_owned()
    }
}

impl Element {
    pub fn new(name: LocalName) -> Element {
        Element {
            name,
            attrs: vec![],
            children: vec![],
        }
    }

    pub fn set_attr(&mut self, name: LocalName, value: impl Into<String>) {
        let value = StrTendril::from(value.into());
        self.attrs.push(Attribute {
            name: QualName::new(None, ns!(), name),
            value,
        });
    }

    pub fn append(&mut self, node: Node) {
        match node {
            Node::Fragment(nodes) => self.children.extend(nodes),
            node => self.children.push(node),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.children.iter().all(Node::is_whitespace_text)
    }
}

enum SerializeOp<'a> {
    Open(&'a Node),
    Close(&'a LocalName),
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let mut ops = vec![];
        match (traversal_scope, self) {
            (TraversalScope::ChildrenOnly(_), Node::Element(element)) => {
                ops.extend(element.children.iter().rev().map(SerializeOp::Open))
            }
            _ => ops.push(SerializeOp::Open(self)),
        }

        while let Some(op) = ops.pop() {
            match op {
                SerializeOp::Open(Node::Element(element)) => {
                    serializer.start_elem(
                        QualName::new(None, ns!(html), element.name.clone()),
                        element.attrs.iter().map(|at| (&at.name, &at.value[..])),
                    )?;
                    // The parser drops one newline right after these start tags.
                    if matches!(&*element.name, "pre" | "textarea" | "listing")
                        && matches!(element.children.first(), Some(Node::Text(text)) if text.starts_with('\n'))
                    {
                        serializer.write_text("\n")?;
                    }
                    ops.push(SerializeOp::Close(&element.name));
                    ops.extend(element.children.iter().rev().map(SerializeOp::Open));
                }
                SerializeOp::Open(Node::Text(text)) => serializer.write_text(text)?,
                SerializeOp::Open(Node::Fragment(nodes)) => {
                    ops.extend(nodes.iter().rev().map(SerializeOp::Open))
                }
                SerializeOp::Close(name) => {
                    serializer.end_elem(QualName::new(None, ns!(html), name.clone()))?
                }
            }
        }

        Ok(())
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

// Text under these parents is written without escaping, as html5ever does.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

struct ElemInfo {
    name: LocalName,
    void: bool,
}

/// html5ever's HTML serialization rules, except that attribute values also
/// escape `<` and `>`.
struct HtmlWriter<W> {
    writer: W,
    stack: Vec<ElemInfo>,
}

impl<W: Write> HtmlWriter<W> {
    fn new(writer: W) -> Self {
        HtmlWriter {
            writer,
            stack: vec![],
        }
    }

    fn write_escaped(&mut self, text: &str, attr_mode: bool) -> io::Result<()> {
        for c in text.chars() {
            match c {
                '&' => self.writer.write_all(b"&amp;"),
                '\u{00A0}' => self.writer.write_all(b"&nbsp;"),
                '"' if attr_mode => self.writer.write_all(b"&quot;"),
                '<' => self.writer.write_all(b"&lt;"),
                '>' => self.writer.write_all(b"&gt;"),
                c => write!(self.writer, "{}", c),
            }?;
        }
        Ok(())
    }
}

impl<W: Write> Serializer for HtmlWriter<W> {
    fn start_elem<'a, AttrIter>(&mut self, name: QualName, attrs: AttrIter) -> io::Result<()>
    where
        AttrIter: Iterator<Item = AttrRef<'a>>,
    {
        if self.stack.last().map_or(false, |parent| parent.void) {
            self.stack.push(ElemInfo {
                name: name.local,
                void: true,
            });
            return Ok(());
        }

        write!(self.writer, "<{}", name.local)?;
        for (attr_name, value) in attrs {
            write!(self.writer, " {}=\"", attr_name.local)?;
            self.write_escaped(value, true)?;
            self.writer.write_all(b"\"")?;
        }
        self.writer.write_all(b">")?;

        let void = VOID_ELEMENTS.contains(&&*name.local);
        self.stack.push(ElemInfo {
            name: name.local,
            void,
        });
        Ok(())
    }

    fn end_elem(&mut self, name: QualName) -> io::Result<()> {
        match self.stack.pop() {
            Some(ref info) if info.void => Ok(()),
            _ => write!(self.writer, "</{}>", name.local),
        }
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        match self.stack.last() {
            Some(parent) if parent.void => Ok(()),
            Some(parent) if RAW_TEXT_ELEMENTS.contains(&&*parent.name) => {
                self.writer.write_all(text.as_bytes())
            }
            _ => self.write_escaped(text, false),
        }
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        write!(self.writer, "<!--{}-->", text)
    }

    fn write_doctype(&mut self, name: &str) -> io::Result<()> {
        write!(self.writer, "<!DOCTYPE {}>", name)
    }

    fn write_processing_instruction(&mut self, target: &str, data: &str) -> io::Result<()> {
        write!(self.writer, "<?{} {}>", target, data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn element(name: &str) -> Element {
        Element::new(LocalName::from(name))
    }

    #[test]
    fn appending_fragments_flattens_them() {
        let mut parent = element("div");
        parent.append(Node::empty());
        parent.append(Node::Fragment(vec![
            Node::Text("a".to_string()),
            Node::Text("b".to_string()),
        ]));
        assert_eq!(parent.children.len(), 2);
    }

    #[test]
    fn serializes_nested_elements() {
        let mut link = element("a");
        link.set_attr(local_name!("href"), "https://example.com/?a=1&b=\"2\"");
        link.append(Node::Text("x < y".to_string()));
        let mut paragraph = element("p");
        paragraph.append(Node::Element(link));
        paragraph.append(Node::Element(element("br")));
        assert_eq!(
            Node::Element(paragraph).to_html(),
            "<p><a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\">x &lt; y</a><br></p>"
        );
    }

    #[test]
    fn serializes_fragment_contents_only() {
        let fragment = Node::Fragment(vec![
            Node::Text("<script>".to_string()),
            Node::Element(element("b")),
        ]);
        assert_eq!(fragment.to_html(), "&lt;script&gt;<b></b>");
    }

    #[test]
    fn escapes_angle_brackets_in_attribute_values() {
        let mut paragraph = element("p");
        paragraph.set_attr(local_name!("title"), "<script>alert(1)</script>");
        assert_eq!(
            Node::Element(paragraph).to_html(),
            "<p title=\"&lt;script&gt;alert(1)&lt;/script&gt;\"></p>"
        );
    }

    #[test]
    fn keeps_leading_newline_of_preformatted_text() {
        let mut pre = element("pre");
        pre.append(Node::Text("\nx".to_string()));
        assert_eq!(Node::Element(pre).to_html(), "<pre>\n\nx</pre>");

        let mut div = element("div");
        div.append(Node::Text("\nx".to_string()));
        assert_eq!(Node::Element(div).to_html(), "<div>\nx</div>");
    }

    #[test]
    fn raw_text_parents_are_not_escaped() {
        let mut style = element("style");
        style.append(Node::Text("a > b { color: red }".to_string()));
        assert_eq!(Node::Element(style).to_html(), "<style>a > b { color: red }</style>");
    }

    #[test]
    fn blank_elements() {
        let mut span = element("span");
        assert!(span.is_blank());
        span.append(Node::Text(" \n ".to_string()));
        assert!(span.is_blank());
        span.append(Node::Element(element("img")));
        assert!(!span.is_blank());
    }
}
