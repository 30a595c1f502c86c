use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::HashMap;
use crate::element::TEXT_NODE_VALUE;
use crate::props::{diff_props, Event, EventHandler, PropChange, PropValue, Props};
use crate::{HostError, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostNodeKind<'a> {
    Element(&'a str),
    Text,
}

/// Mutation primitives of the host tree. Nodes are opaque [`NodeId`] handles
/// owned by the host; the reconciler never reads host state back.
pub trait HostAdapter {
    fn create_node(&mut self, kind: HostNodeKind<'_>) -> Result<NodeId, HostError>;
    fn set_property(&mut self, node: NodeId, name: &str, value: &PropValue)
        -> Result<(), HostError>;
    fn clear_property(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;
    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn remove_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn apply_props(&mut self, node: NodeId, old: &Props, new: &Props) -> Result<(), HostError> {
        for change in diff_props(old, new) {
            match change {
                PropChange::RemoveListener { event, handler } => {
                    self.remove_listener(node, &event, &handler)?
                }
                PropChange::ClearProperty { name } => self.clear_property(node, &name)?,
                PropChange::SetProperty { name, value } => self.set_property(node, &name, &value)?,
                PropChange::AddListener { event, handler } => {
                    self.add_listener(node, &event, &handler)?
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    Create { node: NodeId, kind: String },
    SetProperty { node: NodeId, name: String, value: PropValue },
    ClearProperty { node: NodeId, name: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    AppendChild { parent: NodeId, child: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryNodeKind {
    Element(String),
    Text,
}

#[derive(Debug)]
pub struct MemoryNode {
    kind: MemoryNodeKind,
    properties: IndexMap<String, PropValue>,
    listeners: HashMap<String, Vec<EventHandler>>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
            listeners: HashMap::default(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn kind(&self) -> &MemoryNodeKind {
        &self.kind
    }

    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// In-memory host tree. Every mutation is recorded in an operation log so
/// tests can assert on exactly what a commit did.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>, // detached nodes are kept; ids are never reused
    ops: Vec<HostOp>,
    refuse_appends: bool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root container outside of any render. Not logged.
    pub fn create_container(&mut self, tag: &str) -> NodeId {
        self.nodes
            .push(MemoryNode::new(MemoryNodeKind::Element(tag.to_string())));
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Makes every later `append_child` fail with [`HostError::Refused`].
    pub fn refuse_appends(&mut self, refuse: bool) {
        self.refuse_appends = refuse;
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], HostError> {
        Ok(&self.get(id)?.children)
    }

    /// Concatenated text of every text node under `id`, in tree order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.kind == MemoryNodeKind::Text {
            if let Some(value) = node.property(TEXT_NODE_VALUE) {
                let _ = write!(out, "{value}");
            }
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    /// First node in the subtree of `root` (pre-order) matching `predicate`.
    pub fn find(&self, root: NodeId, predicate: impl Fn(&MemoryNode) -> bool) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(id)?;
            if predicate(node) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Invokes every listener registered for `event` on `node` and returns
    /// how many ran. Listeners may queue state updates; they cannot touch the
    /// host directly.
    pub fn dispatch(&self, node: NodeId, event: &str) -> Result<usize, HostError> {
        let handlers: Vec<EventHandler> = self
            .get(node)?
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        let payload = Event {
            name: Rc::from(event),
            target: node,
        };
        for handler in &handlers {
            handler.call(&payload);
        }
        Ok(handlers.len())
    }

    /// Compact markup of the subtree, without node ids or listeners.
    pub fn to_markup(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, root);
        out
    }

    fn write_markup(&self, out: &mut String, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            out.push_str("<missing>");
            return;
        };
        match &node.kind {
            MemoryNodeKind::Text => {
                if let Some(value) = node.property(TEXT_NODE_VALUE) {
                    let _ = write!(out, "{value}");
                }
            }
            MemoryNodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &node.properties {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for &child in &node.children {
                    self.write_markup(out, child);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        match &node.kind {
            MemoryNodeKind::Text => {
                let value = node
                    .property(TEXT_NODE_VALUE)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let _ = writeln!(output, "{indent}[{id}] {value:?}");
            }
            MemoryNodeKind::Element(tag) => {
                let _ = write!(output, "{indent}[{id}] <{tag}");
                for (name, value) in &node.properties {
                    let _ = write!(output, " {name}={value}");
                }
                let mut events: Vec<&String> = node.listeners.keys().collect();
                events.sort();
                for event in events {
                    let _ = write!(output, " @{event}");
                }
                output.push_str(">\n");
            }
        }
        for &child in &node.children {
            self.dump_node(output, child, depth + 1);
        }
    }

    fn get(&self, id: NodeId) -> Result<&MemoryNode, HostError> {
        self.nodes.get(id).ok_or(HostError::MissingNode { id })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes.get_mut(id).ok_or(HostError::MissingNode { id })
    }

    fn detach(&mut self, child: NodeId) -> Result<(), HostError> {
        if let Some(parent) = self.get(child)?.parent {
            self.get_mut(parent)?.children.retain(|&id| id != child);
            self.get_mut(child)?.parent = None;
        }
        Ok(())
    }
}

impl HostAdapter for MemoryHost {
    fn create_node(&mut self, kind: HostNodeKind<'_>) -> Result<NodeId, HostError> {
        let kind = match kind {
            HostNodeKind::Element(tag) => MemoryNodeKind::Element(tag.to_string()),
            HostNodeKind::Text => MemoryNodeKind::Text,
        };
        let label = match &kind {
            MemoryNodeKind::Element(tag) => tag.clone(),
            MemoryNodeKind::Text => "#text".to_string(),
        };
        self.nodes.push(MemoryNode::new(kind));
        let node = self.nodes.len() - 1;
        self.ops.push(HostOp::Create { node, kind: label });
        Ok(node)
    }

    fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.get_mut(node)?
            .properties
            .insert(name.to_string(), value.clone());
        self.ops.push(HostOp::SetProperty {
            node,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn clear_property(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.get_mut(node)?.properties.shift_remove(name);
        self.ops.push(HostOp::ClearProperty {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        let listeners = self
            .get_mut(node)?
            .listeners
            .entry(event.to_string())
            .or_default();
        // same handler registered twice stays a single listener
        if !listeners.iter().any(|existing| existing.ptr_eq(handler)) {
            listeners.push(handler.clone());
        }
        self.ops.push(HostOp::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        let target = self.get_mut(node)?;
        if let Some(listeners) = target.listeners.get_mut(event) {
            listeners.retain(|existing| !existing.ptr_eq(handler));
            if listeners.is_empty() {
                target.listeners.remove(event);
            }
        }
        self.ops.push(HostOp::RemoveListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        if self.refuse_appends {
            return Err(HostError::Refused {
                operation: "append_child",
                node: parent,
            });
        }
        self.get(parent)?;
        self.detach(child)?;
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::AppendChild { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let siblings = &mut self.get_mut(parent)?.children;
        let Some(position) = siblings.iter().position(|&id| id == child) else {
            return Err(HostError::NotAChild { parent, child });
        };
        siblings.remove(position);
        self.get_mut(child)?.parent = None;
        self.ops.push(HostOp::RemoveChild { parent, child });
        Ok(())
    }
}
