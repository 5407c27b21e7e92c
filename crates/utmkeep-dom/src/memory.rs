//! In-memory element tree implementing [`FormDocument`].

use std::collections::BTreeMap;

use utmkeep_core::HiddenFieldMarkup;

use crate::document::{FormDocument, NodeId};

const FORM_CONTROLS: [&str; 3] = ["input", "select", "textarea"];
const VOID_TAGS: [&str; 2] = ["input", "br"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    attrs: BTreeMap<String, String>,
    /// Live `value` property of form controls.
    value: String,
}

/// Arena-backed document. Node 0 is the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    /// Value writes and node insertions made through [`FormDocument`].
    mutations: usize,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                tag: "#document".to_string(),
                attrs: BTreeMap::new(),
                value: String::new(),
            }],
            mutations: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            value: String::new(),
        });
        id
    }

    /// Move `child` under `parent`. Ignored when `child` is `parent` or one
    /// of its ancestors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() {
            return;
        }
        if self.is_ancestor_or_self(child, parent) {
            return;
        }
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Set an attribute. Setting `value` also resets the live value, as it
    /// does for a control the user has not edited.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            if name == "value" {
                n.value = value.to_string();
            }
            n.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0)?.attrs.get(name).map(String::as_str)
    }

    /// Create `tag` with `attrs` and append it under `parent`.
    pub fn add_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attribute(id, name, value);
        }
        self.append_child(parent, id);
        id
    }

    /// `<form>` under the root, optionally with an `id`.
    pub fn add_form(&mut self, id: Option<&str>) -> NodeId {
        let root = self.root();
        match id {
            Some(id) => self.add_element(root, "form", &[("id", id)]),
            None => self.add_element(root, "form", &[]),
        }
    }

    /// `<input class=...>` under `parent`.
    pub fn add_input(&mut self, parent: NodeId, class: &str) -> NodeId {
        self.add_element(parent, "input", &[("type", "text"), ("class", class)])
    }

    /// Simulate typing into a control. Not counted as a mutation.
    pub fn type_value(&mut self, field: NodeId, value: &str) {
        if let Some(n) = self.nodes.get_mut(field.0) {
            n.value = value.to_string();
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.tag.as_str())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|x| x == class))
    }

    /// Descendants of `node` in document (pre-)order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Elements currently attached below the root.
    pub fn element_count(&self) -> usize {
        self.descendants(self.root()).len()
    }

    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Serialize the subtree under `node` as HTML. Controls render their
    /// live value.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        out.push('<');
        out.push_str(&node.tag);
        let is_control = FORM_CONTROLS.contains(&node.tag.as_str());
        for (name, value) in &node.attrs {
            if is_control && name == "value" {
                continue;
            }
            out.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
        if is_control && !node.value.is_empty() {
            out.push_str(&format!(" value=\"{}\"", escape(&node.value)));
        }
        out.push('>');
        if VOID_TAGS.contains(&node.tag.as_str()) {
            return;
        }
        for child in &node.children {
            self.write_html(*child, out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == self.root() {
                return true;
            }
            cur = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl FormDocument for MemoryDocument {
    fn forms(&self) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.tag(*id) == Some("form"))
            .collect()
    }

    fn form_by_id(&self, id: &str) -> Option<NodeId> {
        self.forms()
            .into_iter()
            .find(|f| self.attribute(*f, "id") == Some(id))
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    fn inputs_with_class(&self, scope: Option<NodeId>, class: &str) -> Vec<NodeId> {
        let scope = scope.unwrap_or_else(|| self.root());
        if !self.is_attached(scope) {
            return Vec::new();
        }
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.tag(*id) == Some("input") && self.has_class(*id, class))
            .collect()
    }

    fn field_by_name(&self, form: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(form).into_iter().find(|id| {
            self.tag(*id).is_some_and(|t| FORM_CONTROLS.contains(&t))
                && self.attribute(*id, "name") == Some(name)
        })
    }

    fn enclosing_form(&self, node: NodeId) -> Option<NodeId> {
        let mut cur = self.nodes.get(node.0)?.parent;
        while let Some(id) = cur {
            if self.tag(id) == Some("form") {
                return Some(id);
            }
            cur = self.nodes[id.0].parent;
        }
        None
    }

    fn value(&self, field: NodeId) -> String {
        self.nodes
            .get(field.0)
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&mut self, field: NodeId, value: &str) {
        if let Some(n) = self.nodes.get_mut(field.0) {
            n.value = value.to_string();
            self.mutations += 1;
        }
    }

    fn append_hidden_input(
        &mut self,
        form: NodeId,
        name: &str,
        value: &str,
        markup: &HiddenFieldMarkup,
    ) -> Option<NodeId> {
        if self.tag(form) != Some("form") {
            return None;
        }
        let input = self.create_element("input");
        self.set_attribute(input, "type", "hidden");
        self.set_attribute(input, "name", name);
        self.set_attribute(input, "value", value);

        let wrapper_tag = markup.wrapper_tag.as_deref().filter(|t| !t.is_empty());
        match wrapper_tag {
            Some(tag) => {
                let wrapper = self.create_element(tag);
                if let Some(class) = markup.wrapper_class.as_deref().filter(|c| !c.is_empty()) {
                    self.set_attribute(wrapper, "class", class);
                }
                self.append_child(wrapper, input);
                self.append_child(form, wrapper);
            }
            None => self.append_child(form, input),
        }
        self.mutations += 1;
        Some(input)
    }
}
