//! Scene nodes — an arena-backed markup tree and its serializer.
//!
//! Nodes refer to each other by index, never by reference, so a node
//! closed earlier can be looked up and reopened later. Element ids are
//! indexed as they are written.

use std::collections::HashMap;

use super::constants::XLINK_NS;

/// Index of a node in the [`Scene`] arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    /// Invisible container holding the declaration and the root element
    Document,
    Declaration,
    Element(String),
    Text(String),
}

#[derive(Debug, Clone)]
struct SceneNode {
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// The output document under construction.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    ids: HashMap<String, NodeId>,
}

impl Scene {
    /// An empty scene holding only the document container (node 0).
    pub fn new() -> Self {
        Self {
            nodes: vec![SceneNode::new(NodeKind::Document)],
            ids: HashMap::new(),
        }
    }

    pub fn document(&self) -> NodeId {
        0
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(SceneNode::new(kind));
        self.nodes.len() - 1
    }

    pub fn append_child(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push(NodeKind::Element(tag.to_string()));
        self.nodes[parent].children.push(id);
        id
    }

    pub fn prepend_child(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push(NodeKind::Element(tag.to_string()));
        self.nodes[parent].children.insert(0, id);
        id
    }

    /// Insert before the first `g` child of `parent`, or append when
    /// there is none.
    pub fn insert_before_first_group(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| self.tag(c) == Some("g"));
        let id = self.push(NodeKind::Element(tag.to_string()));
        match pos {
            Some(p) => self.nodes[parent].children.insert(p, id),
            None => self.nodes[parent].children.push(id),
        }
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeKind::Text(text.to_string()));
        self.nodes[parent].children.push(id);
        id
    }

    pub fn prepend_declaration(&mut self) -> NodeId {
        let id = self.push(NodeKind::Declaration);
        self.nodes[0].children.insert(0, id);
        id
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl ToString) {
        let value = value.to_string();
        if name == "id" {
            self.ids.insert(value.clone(), node);
        }
        let attrs = &mut self.nodes[node].attributes;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Set an attribute at the front of the attribute list.
    pub fn prepend_attr(&mut self, node: NodeId, name: &str, value: impl ToString) {
        let attrs = &mut self.nodes[node].attributes;
        attrs.retain(|(n, _)| n != name);
        attrs.insert(0, (name.to_string(), value.to_string()));
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node]
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        &self.nodes[node].attributes
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node].kind {
            NodeKind::Element(tag) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// Concatenated text content of a node's direct text children.
    pub fn text(&self, node: NodeId) -> String {
        self.nodes[node]
            .children
            .iter()
            .filter_map(|&c| match &self.nodes[c].kind {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Node carrying `id="<id>"`, if any.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// All element nodes with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.document(), &mut |n| {
            if self.tag(n) == Some(tag) {
                out.push(n);
            }
        });
        out
    }

    fn walk(&self, node: NodeId, f: &mut dyn FnMut(NodeId)) {
        f(node);
        for &c in &self.nodes[node].children {
            self.walk(c, f);
        }
    }

    /// Copy a parsed XML subtree (elements and text) under `parent`.
    pub fn append_copy(&mut self, parent: NodeId, source: roxmltree::Node) {
        if source.is_text() {
            if let Some(t) = source.text() {
                if !t.trim().is_empty() {
                    self.append_text(parent, t);
                }
            }
            return;
        }
        if !source.is_element() {
            return;
        }
        let node = self.append_child(parent, source.tag_name().name());
        for a in source.attributes() {
            let name = match a.namespace() {
                Some(ns) if ns == XLINK_NS => format!("xlink:{}", a.name()),
                Some(ns) if ns == XML_NS => format!("xml:{}", a.name()),
                _ => a.name().to_string(),
            };
            self.set_attr(node, &name, a.value());
        }
        for child in source.children() {
            self.append_copy(node, child);
        }
    }

    /// Copy a parsed XML subtree as the first child of `parent`.
    pub fn prepend_copy(&mut self, parent: NodeId, source: roxmltree::Node) {
        let before = self.nodes[parent].children.len();
        self.append_copy(parent, source);
        if self.nodes[parent].children.len() > before {
            if let Some(copied) = self.nodes[parent].children.pop() {
                self.nodes[parent].children.insert(0, copied);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Serialization
    // ═══════════════════════════════════════════════════════════════════

    /// Serialize with tab indentation, one element per line; elements
    /// whose only children are text are written inline.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for &c in &self.nodes[0].children {
            self.write_node(c, 0, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, depth: usize, out: &mut String) {
        let n = &self.nodes[node];
        match &n.kind {
            NodeKind::Document => {}
            NodeKind::Declaration => {
                out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
                out.push('\n');
            }
            NodeKind::Text(t) => {
                push_indent(out, depth);
                out.push_str(&escape_text(t));
                out.push('\n');
            }
            NodeKind::Element(tag) => {
                push_indent(out, depth);
                out.push('<');
                out.push_str(tag);
                for (name, value) in &n.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                if n.children.is_empty() {
                    out.push_str(" />\n");
                    return;
                }
                let text_only = n
                    .children
                    .iter()
                    .all(|&c| matches!(self.nodes[c].kind, NodeKind::Text(_)));
                if text_only {
                    out.push('>');
                    out.push_str(&escape_text(&self.text(node)));
                } else {
                    out.push_str(">\n");
                    for &c in &n.children {
                        self.write_node(c, depth + 1, out);
                    }
                    push_indent(out, depth);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push_str(">\n");
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_go_before_the_first_group() {
        let mut scene = Scene::new();
        let svg = scene.append_child(scene.document(), "svg");
        scene.append_child(svg, "g");
        let rect = scene.insert_before_first_group(svg, "rect");
        assert_eq!(scene.children(svg)[0], rect);
    }

    #[test]
    fn ids_are_indexed_when_written() {
        let mut scene = Scene::new();
        let svg = scene.append_child(scene.document(), "svg");
        let g = scene.append_child(svg, "g");
        scene.set_attr(g, "id", "m1");
        assert_eq!(scene.find_by_id("m1"), Some(g));
        assert_eq!(scene.find_by_id("m2"), None);
    }

    #[test]
    fn serializes_nested_markup() {
        let mut scene = Scene::new();
        let svg = scene.append_child(scene.document(), "svg");
        scene.set_attr(svg, "version", "1.1");
        scene.prepend_attr(svg, "width", "10px");
        let desc = scene.append_child(svg, "desc");
        scene.append_text(desc, "a < b");
        scene.append_child(svg, "g");
        assert_eq!(
            scene.serialize(),
            "<svg width=\"10px\" version=\"1.1\">\n\t<desc>a &lt; b</desc>\n\t<g />\n</svg>\n"
        );
    }

    #[test]
    fn copies_parsed_markup() {
        let xml = r#"<symbol xmlns="http://www.w3.org/2000/svg" id="E0A4" viewBox="0 0 1000 1000"><path d="M0 0"/></symbol>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut scene = Scene::new();
        let defs = scene.append_child(scene.document(), "defs");
        scene.append_copy(defs, doc.root_element());
        let symbol = scene.children(defs)[0];
        assert_eq!(scene.tag(symbol), Some("symbol"));
        assert_eq!(scene.attr(symbol, "viewBox"), Some("0 0 1000 1000"));
        assert_eq!(scene.tag(scene.children(symbol)[0]), Some("path"));
    }
}
