use html5ever::LocalName;

use crate::arena_dom::{self, Children, NodeData, Ref};
use crate::attributes::copy_allowed_attributes;
use crate::policy::Policy;
use crate::selector::{ExtraSelector, MatchedElements};
use crate::tree::{Element, Node};

/// Rewrites untrusted HTML under a [`Policy`].
///
/// A `Sanitizer` only borrows its policy, so one policy can back any number
/// of sanitizers on any number of threads. Every call parses into its own
/// arena and builds its own output tree.
#[derive(Clone, Copy)]
pub struct Sanitizer<'p> {
    policy: &'p Policy,
}

// An allowed element whose children are still being visited.
struct Frame<'arena> {
    element: Element,
    children: Children<'arena>,
}

enum Step<'arena> {
    Done(Node),
    Open(Frame<'arena>),
}

impl<'p> Sanitizer<'p> {
    pub fn new(policy: &'p Policy) -> Sanitizer<'p> {
        Sanitizer { policy }
    }

    pub fn policy(&self) -> &'p Policy {
        self.policy
    }

    pub fn sanitize_document(&self, input: &str) -> String {
        self.sanitize_document_with(input, None)
    }

    /// Sanitizes a whole markup string. Elements matched by `extra` are
    /// allowed in addition to the policy's tags.
    pub fn sanitize_document_with(&self, input: &str, extra: Option<&ExtraSelector>) -> String {
        let input = input.trim();
        if input.is_empty() || input == "<br>" {
            return String::new();
        }

        let wrapped;
        let markup = if input.contains("<body") {
            input
        } else {
            wrapped = format!("<body>{}</body>", input);
            &wrapped
        };

        let arena = typed_arena::Arena::new();
        let document = arena_dom::parse_document(&arena, markup);
        let body = match document
            .first_child_element(&local_name!("html"))
            .and_then(|html| html.first_child_element(&local_name!("body")))
        {
            Some(body) => body,
            None => return String::new(),
        };

        let matched = extra.map(|selector| selector.select(markup, document));
        let mut container = Element::new(local_name!("body"));
        for child in body.children() {
            container.append(self.sanitize_subtree(child, matched.as_ref()));
        }
        break_lines(&mut container.children, false);

        Node::Fragment(container.children).to_html()
    }

    /// Sanitizes one parsed node and everything below it.
    ///
    /// Text is copied, comments and other non-element nodes disappear, and
    /// elements are either rebuilt from their allowed parts or, when not
    /// allowed, replaced by a text node holding their original markup. The
    /// walk keeps its own stack; elements nested deeper than the policy's
    /// `max_depth` are treated as not allowed.
    pub(crate) fn sanitize_subtree(&self, node: Ref<'_>, extra: Option<&MatchedElements>) -> Node {
        let mut stack = match self.enter(node, 0, extra) {
            Step::Done(done) => return done,
            Step::Open(frame) => vec![frame],
        };

        loop {
            let depth = stack.len();
            let next_child = match stack.last_mut() {
                Some(frame) => frame.children.next(),
                None => break,
            };

            match next_child {
                Some(child) => match self.enter(child, depth, extra) {
                    Step::Done(done) => {
                        if let Some(frame) = stack.last_mut() {
                            frame.element.append(done);
                        }
                    }
                    Step::Open(frame) => stack.push(frame),
                },
                None => {
                    let done = match stack.pop() {
                        Some(frame) => self.finish(frame),
                        None => break,
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.element.append(done),
                        None => return done,
                    }
                }
            }
        }

        Node::empty()
    }

    fn enter<'arena>(
        &self,
        node: Ref<'arena>,
        depth: usize,
        extra: Option<&MatchedElements>,
    ) -> Step<'arena> {
        match node.data {
            NodeData::Text { ref contents } => Step::Done(Node::Text(contents.borrow().to_string())),
            NodeData::Element { .. } => {
                let source = match node.as_element() {
                    Some(source) => source,
                    None => return Step::Done(Node::empty()),
                };
                let tag = source.local_name().clone();

                let allowed = self.policy.is_allowed_tag(&tag)
                    || self.policy.is_content_tag(&tag)
                    || extra.map_or(false, |matched| matched.contains(node));
                if !allowed {
                    trace!("neutralizing <{}>", tag);
                    return Step::Done(Node::Text(node.outer_html()));
                }
                if depth >= self.policy.max_depth() {
                    debug!(
                        "neutralizing <{}> nested deeper than {} elements",
                        tag,
                        self.policy.max_depth()
                    );
                    return Step::Done(Node::Text(node.outer_html()));
                }

                let mut element = Element::new(self.output_name(&tag));
                copy_allowed_attributes(self.policy, &tag, &source, &mut element);
                Step::Open(Frame {
                    element,
                    children: node.children(),
                })
            }
            NodeData::Document
            | NodeData::Doctype { .. }
            | NodeData::Comment { .. }
            | NodeData::ProcessingInstruction { .. } => Step::Done(Node::empty()),
        }
    }

    fn finish(&self, frame: Frame<'_>) -> Node {
        let element = frame.element;
        if self.policy.collapses_when_empty(&element.name) && element.is_blank() {
            trace!("dropping empty <{}>", element.name);
            return Node::empty();
        }
        Node::Element(element)
    }

    pub(crate) fn output_name(&self, tag: &LocalName) -> LocalName {
        if self.policy.is_content_tag(tag) {
            self.policy.container().clone()
        } else {
            tag.clone()
        }
    }
}

/// Inserts line breaks after `<br>` and between adjacent `<div>`s so the
/// serialized output diffs well. Only whitespace text is added, and never
/// inside elements where whitespace is significant.
fn break_lines(nodes: &mut Vec<Node>, closed_by_parent: bool) {
    let mut i = 0;
    while i < nodes.len() {
        if let Node::Element(ref mut element) = nodes[i] {
            if !matches!(&*element.name, "pre" | "textarea" | "listing") {
                let opens_with_div = element.name == local_name!("div")
                    && element.attrs.is_empty()
                    && matches!(
                        element.children.first(),
                        Some(Node::Element(child)) if child.name == local_name!("div")
                    );
                break_lines(&mut element.children, true);
                if opens_with_div {
                    element.children.insert(0, Node::Text("\n".to_string()));
                }
            }
        }

        let needs_break = match (&nodes[i], nodes.get(i + 1)) {
            (Node::Element(br), next) if br.name == local_name!("br") => match next {
                Some(Node::Text(text)) => !text.starts_with(char::is_whitespace),
                Some(_) => true,
                None => closed_by_parent,
            },
            (Node::Element(a), Some(Node::Element(b))) => {
                a.name == local_name!("div") && b.name == local_name!("div")
            }
            _ => false,
        };
        if needs_break {
            nodes.insert(i + 1, Node::Text("\n".to_string()));
            i += 1;
        }
        i += 1;
    }
}
