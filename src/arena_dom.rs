// Majority of the tree sink in this file is from the html5ever project.
// https://github.com/servo/html5ever/blob/45b2fca5c6/html5ever/examples/arena.rs
//
// Copyright 2014-2017 The html5ever Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Read-only parse tree for the sanitizer input.
//!
//! html5ever builds the tree into a `typed_arena::Arena` owned by a single
//! sanitize call. The sanitizer only ever reads it: it walks the nodes,
//! inspects element names and attributes, and serializes disallowed subtrees
//! back to markup so they can be emitted as text.

use std::borrow::Cow;
use std::cell::{self, Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io;
use std::ptr;

use html5ever::interface::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, QualName};

pub type Arena<'arena> = &'arena typed_arena::Arena<Node<'arena>>;

pub type Ref<'arena> = &'arena Node<'arena>;

pub type Link<'arena> = Cell<Option<Ref<'arena>>>;

/// Parses a complete document. The result is the `Document` node; html5ever
/// always synthesizes the `html`, `head` and `body` elements.
pub fn parse_document<'arena>(arena: Arena<'arena>, html: &str) -> Ref<'arena> {
    html5ever::parse_document(Sink::new(arena), Default::default()).one(html)
}

/// Parses `html` as the contents of a `<template>` element. That context
/// accepts any start tag, table parts included, so a lone `<td>` still yields
/// an element. The parsed nodes are the children of the returned root.
pub fn parse_fragment<'arena>(arena: Arena<'arena>, html: &str) -> Ref<'arena> {
    let document = html5ever::parse_fragment(
        Sink::new(arena),
        Default::default(),
        QualName::new(None, ns!(html), local_name!("template")),
        vec![],
    )
    .one(html);
    document
        .first_child_element(&local_name!("html"))
        .unwrap_or(document)
}

pub struct Sink<'arena> {
    pub arena: Arena<'arena>,
    pub document: Ref<'arena>,
    pub quirks_mode: Cell<QuirksMode>,
}

impl<'arena> Sink<'arena> {
    pub fn new(arena: Arena<'arena>) -> Self {
        Sink {
            arena,
            document: arena.alloc(Node::new(NodeData::Document)),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
        }
    }
}

pub struct Node<'arena> {
    pub parent: Link<'arena>,
    pub next_sibling: Link<'arena>,
    pub previous_sibling: Link<'arena>,
    pub first_child: Link<'arena>,
    pub last_child: Link<'arena>,
    pub data: NodeData<'arena>,
}

pub enum NodeData<'arena> {
    Document,
    Doctype {
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    },
    Text {
        contents: RefCell<StrTendril>,
    },
    Comment {
        contents: StrTendril,
    },
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
        template_contents: Option<Ref<'arena>>,
        mathml_annotation_xml_integration_point: bool,
    },
    ProcessingInstruction {
        target: StrTendril,
        contents: StrTendril,
    },
}

pub struct ElementView<'a> {
    name: &'a LocalName,
    attrs: cell::Ref<'a, Vec<Attribute>>,
}

impl<'a> ElementView<'a> {
    pub fn local_name(&self) -> &LocalName {
        self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }
}

impl<'arena> Node<'arena> {
    pub fn new(data: NodeData<'arena>) -> Self {
        Node {
            parent: Cell::new(None),
            previous_sibling: Cell::new(None),
            next_sibling: Cell::new(None),
            first_child: Cell::new(None),
            last_child: Cell::new(None),
            data,
        }
    }

    pub fn detach(&self) {
        let parent = self.parent.take();
        let previous_sibling = self.previous_sibling.take();
        let next_sibling = self.next_sibling.take();

        if let Some(next_sibling) = next_sibling {
            next_sibling.previous_sibling.set(previous_sibling);
        } else if let Some(parent) = parent {
            parent.last_child.set(previous_sibling);
        }

        if let Some(previous_sibling) = previous_sibling {
            previous_sibling.next_sibling.set(next_sibling);
        } else if let Some(parent) = parent {
            parent.first_child.set(next_sibling);
        }
    }

    pub fn append(&'arena self, new_child: &'arena Self) {
        new_child.detach();
        new_child.parent.set(Some(self));
        if let Some(last_child) = self.last_child.take() {
            new_child.previous_sibling.set(Some(last_child));
            debug_assert!(last_child.next_sibling.get().is_none());
            last_child.next_sibling.set(Some(new_child));
        } else {
            debug_assert!(self.first_child.get().is_none());
            self.first_child.set(Some(new_child));
        }
        self.last_child.set(Some(new_child));
    }

    pub fn insert_before(&'arena self, new_sibling: &'arena Self) {
        new_sibling.detach();
        new_sibling.parent.set(self.parent.get());
        new_sibling.next_sibling.set(Some(self));
        if let Some(previous_sibling) = self.previous_sibling.take() {
            new_sibling.previous_sibling.set(Some(previous_sibling));
            previous_sibling.next_sibling.set(Some(new_sibling));
        } else if let Some(parent) = self.parent.get() {
            parent.first_child.set(Some(new_sibling));
        }
        self.previous_sibling.set(Some(new_sibling));
    }

    /// Iterates the node's children in document order. Template elements
    /// yield the children of their contents document.
    pub fn children(&self) -> Children<'arena> {
        let first = match self.data {
            NodeData::Element {
                template_contents: Some(contents),
                ..
            } => contents.first_child.get(),
            _ => self.first_child.get(),
        };
        Children { next: first }
    }

    pub fn first_child_element(&self, name: &LocalName) -> Option<Ref<'arena>> {
        self.children().find(|child| match child.data {
            NodeData::Element { name: ref n, .. } => n.local == *name,
            _ => false,
        })
    }

    pub fn as_element(&self) -> Option<ElementView<'_>> {
        match self.data {
            NodeData::Element {
                ref name,
                ref attrs,
                ..
            } => Some(ElementView {
                name: &name.local,
                attrs: attrs.borrow(),
            }),
            _ => None,
        }
    }

    pub fn descendants(&self) -> Descendants<'arena> {
        let mut stack: Vec<Ref<'arena>> = self.children().collect();
        stack.reverse();
        Descendants { stack }
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for node in self.descendants() {
            if let NodeData::Text { ref contents } = node.data {
                text.push_str(&contents.borrow());
            }
        }
        text
    }

    /// Serializes the node itself, its attributes and all of its descendants
    /// exactly as parsed.
    pub fn outer_html(&self) -> String {
        let mut output = vec![];
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
            ..Default::default()
        };
        if let Err(error) = html5ever::serialize(&mut output, self, opts) {
            warn!("could not serialize {}: {}", self.data, error);
        }
        String::from_utf8_lossy(&output).into_owned()
    }
}

pub struct Children<'arena> {
    next: Option<Ref<'arena>>,
}

impl<'arena> Iterator for Children<'arena> {
    type Item = Ref<'arena>;

    fn next(&mut self) -> Option<Ref<'arena>> {
        let node = self.next?;
        self.next = node.next_sibling.get();
        Some(node)
    }
}

pub struct Descendants<'arena> {
    stack: Vec<Ref<'arena>>,
}

impl<'arena> Iterator for Descendants<'arena> {
    type Item = Ref<'arena>;

    fn next(&mut self) -> Option<Ref<'arena>> {
        let node = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(node.children());
        self.stack[start..].reverse();
        Some(node)
    }
}

impl<'arena> fmt::Display for NodeData<'arena> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeData::Document => write!(f, "Document"),
            NodeData::Doctype { name, .. } => write!(f, "Doctype: {}", name),
            NodeData::Text { contents } => write!(
                f,
                "Text: {}...",
                &contents.borrow().chars().take(10).collect::<String>()
            ),
            NodeData::ProcessingInstruction { .. } => write!(f, "ProcessingInstruction: ..."),
            NodeData::Comment { contents } => write!(
                f,
                "Comment: {}...",
                &contents.chars().take(10).collect::<String>()
            ),
            NodeData::Element { ref name, .. } => write!(f, "Element: {}", &name.local),
        }
    }
}

impl<'arena> Sink<'arena> {
    fn new_node(&self, data: NodeData<'arena>) -> Ref<'arena> {
        self.arena.alloc(Node::new(data))
    }

    fn append_common<P, A>(&self, child: NodeOrText<Ref<'arena>>, previous: P, append: A)
    where
        P: FnOnce() -> Option<Ref<'arena>>,
        A: FnOnce(Ref<'arena>),
    {
        let new_node = match child {
            NodeOrText::AppendText(text) => {
                // Append to an existing Text node if we have one.
                if let Some(&Node {
                    data: NodeData::Text { ref contents },
                    ..
                }) = previous()
                {
                    contents.borrow_mut().push_tendril(&text);
                    return;
                }
                self.new_node(NodeData::Text {
                    contents: RefCell::new(text),
                })
            }
            NodeOrText::AppendNode(node) => node,
        };

        append(new_node)
    }
}

impl<'arena> TreeSink for Sink<'arena> {
    type Handle = Ref<'arena>;
    type Output = Ref<'arena>;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Ref<'arena> {
        self.document
    }

    fn parse_error(&self, message: Cow<'static, str>) {
        trace!("html parse error: {}", message);
    }

    fn get_document(&self) -> Ref<'arena> {
        self.document
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn same_node(&self, x: &Ref<'arena>, y: &Ref<'arena>) -> bool {
        ptr::eq::<Node>(*x, *y)
    }

    fn elem_name(&self, target: &Ref<'arena>) -> Self::ElemName<'_> {
        match target.data {
            NodeData::Element { ref name, .. } => name,
            _ => panic!("not an element!"),
        }
    }

    fn get_template_contents(&self, target: &Ref<'arena>) -> Ref<'arena> {
        if let NodeData::Element {
            template_contents: Some(contents),
            ..
        } = target.data
        {
            contents
        } else {
            panic!("not a template element!")
        }
    }

    fn is_mathml_annotation_xml_integration_point(&self, target: &Ref<'arena>) -> bool {
        if let NodeData::Element {
            mathml_annotation_xml_integration_point,
            ..
        } = target.data
        {
            mathml_annotation_xml_integration_point
        } else {
            panic!("not an element!")
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Ref<'arena> {
        self.new_node(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents: if flags.template {
                Some(self.new_node(NodeData::Document))
            } else {
                None
            },
            mathml_annotation_xml_integration_point: flags.mathml_annotation_xml_integration_point,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Ref<'arena> {
        self.new_node(NodeData::Comment { contents: text })
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Ref<'arena> {
        self.new_node(NodeData::ProcessingInstruction {
            target,
            contents: data,
        })
    }

    fn append(&self, parent: &Ref<'arena>, child: NodeOrText<Ref<'arena>>) {
        self.append_common(
            child,
            || parent.last_child.get(),
            |new_node| parent.append(new_node),
        )
    }

    fn append_before_sibling(&self, sibling: &Ref<'arena>, child: NodeOrText<Ref<'arena>>) {
        self.append_common(
            child,
            || sibling.previous_sibling.get(),
            |new_node| sibling.insert_before(new_node),
        )
    }

    fn append_based_on_parent_node(
        &self,
        element: &Ref<'arena>,
        prev_element: &Ref<'arena>,
        child: NodeOrText<Ref<'arena>>,
    ) {
        if element.parent.get().is_some() {
            self.append_before_sibling(element, child)
        } else {
            self.append(prev_element, child)
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        self.document.append(self.new_node(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    fn add_attrs_if_missing(&self, target: &Ref<'arena>, attrs: Vec<Attribute>) {
        let mut existing = if let NodeData::Element { ref attrs, .. } = target.data {
            attrs.borrow_mut()
        } else {
            panic!("not an element")
        };

        let existing_names = existing
            .iter()
            .map(|e| e.name.clone())
            .collect::<HashSet<_>>();
        existing.extend(
            attrs
                .into_iter()
                .filter(|attr| !existing_names.contains(&attr.name)),
        );
    }

    fn remove_from_parent(&self, target: &Ref<'arena>) {
        target.detach()
    }

    fn reparent_children(&self, node: &Ref<'arena>, new_parent: &Ref<'arena>) {
        let mut next_child = node.first_child.get();
        while let Some(child) = next_child {
            next_child = child.next_sibling.get();
            new_parent.append(child)
        }
    }
}

enum SerializeOp<'s, 'arena> {
    Open(&'s Node<'arena>),
    Close(QualName),
}

// Walks with an explicit queue so arbitrarily deep input cannot exhaust the
// call stack while being turned back into text.
impl<'arena> Serialize for Node<'arena> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let mut ops = VecDeque::new();
        match traversal_scope {
            TraversalScope::IncludeNode => ops.push_back(SerializeOp::Open(self)),
            TraversalScope::ChildrenOnly(_) => {
                ops.extend(self.children().map(|child| SerializeOp::Open(child)));
            }
        }

        while let Some(op) = ops.pop_front() {
            match op {
                SerializeOp::Open(node) => match node.data {
                    NodeData::Element {
                        ref name,
                        ref attrs,
                        ..
                    } => {
                        serializer.start_elem(
                            name.clone(),
                            attrs.borrow().iter().map(|at| (&at.name, &at.value[..])),
                        )?;

                        ops.push_front(SerializeOp::Close(name.clone()));
                        let children: Vec<_> = node.children().collect();
                        for child in children.into_iter().rev() {
                            ops.push_front(SerializeOp::Open(child as &Node));
                        }
                    }
                    NodeData::Doctype { ref name, .. } => serializer.write_doctype(name)?,
                    NodeData::Text { ref contents } => serializer.write_text(&contents.borrow())?,
                    NodeData::Comment { ref contents } => serializer.write_comment(contents)?,
                    NodeData::ProcessingInstruction {
                        ref target,
                        ref contents,
                    } => serializer.write_processing_instruction(target, contents)?,
                    NodeData::Document => {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            "Can't serialize Document node itself",
                        ));
                    }
                },
                SerializeOp::Close(name) => serializer.end_elem(name)?,
            }
        }

        Ok(())
    }
}
