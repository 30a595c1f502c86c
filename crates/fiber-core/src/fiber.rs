//! The fiber arena: one mutable work node per tree position, linked by
//! `child`/`sibling`/`parent` so a walk can stop after any node and resume
//! from a plain cursor value.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slotmap::SlotMap;

use crate::collections::HashSet;
use crate::element::{Component, ElementKind};
use crate::hooks::HookCell;
use crate::props::Props;
use crate::NodeId;

slotmap::new_key_type! {
    pub struct FiberId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectTag {
    Placement,
    Update,
    Deletion,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FiberKind {
    Root,
    Host(Rc<str>),
    Text,
    Component(Component),
}

impl FiberKind {
    pub(crate) fn matches(&self, kind: &ElementKind) -> bool {
        match (self, kind) {
            (FiberKind::Host(a), ElementKind::Host(b)) => a == b,
            (FiberKind::Text, ElementKind::Text) => true,
            (FiberKind::Component(a), ElementKind::Component(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, FiberKind::Component(_))
    }
}

impl From<&ElementKind> for FiberKind {
    fn from(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => FiberKind::Host(tag.clone()),
            ElementKind::Text => FiberKind::Text,
            ElementKind::Component(component) => FiberKind::Component(component.clone()),
        }
    }
}

pub struct Fiber {
    pub(crate) kind: FiberKind,
    pub(crate) props: Rc<Props>,
    pub(crate) dom: Option<NodeId>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: Option<EffectTag>,
    pub(crate) hooks: Vec<HookCell>,
}

impl Fiber {
    pub(crate) fn root(container: NodeId, props: Rc<Props>, alternate: Option<FiberId>) -> Self {
        Self {
            kind: FiberKind::Root,
            props,
            dom: Some(container),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            effect: None,
            hooks: Vec::new(),
        }
    }

    pub(crate) fn new(kind: FiberKind, props: Rc<Props>, parent: FiberId) -> Self {
        Self {
            kind,
            props,
            dom: None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            effect: None,
            hooks: Vec::new(),
        }
    }

    pub(crate) fn set_dom(&mut self, node: NodeId) {
        debug_assert!(self.dom.is_none(), "fiber host node assigned twice");
        self.dom = Some(node);
    }

    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }

    pub fn dom(&self) -> Option<NodeId> {
        self.dom
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn effect(&self) -> Option<EffectTag> {
        self.effect
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("kind", &self.kind)
            .field("dom", &self.dom)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("alternate", &self.alternate)
            .field("effect", &self.effect)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Scheduler context: the fiber arena plus the cursor, the two roots and the
/// pending deletion list for the pass in flight.
#[derive(Default)]
pub struct FiberTree {
    fibers: SlotMap<FiberId, Fiber>,
    pub(crate) next_unit_of_work: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    pub(crate) current_root: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
}

impl FiberTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn current_root(&self) -> Option<FiberId> {
        self.current_root
    }

    pub fn wip_root(&self) -> Option<FiberId> {
        self.wip_root
    }

    pub fn next_unit_of_work(&self) -> Option<FiberId> {
        self.next_unit_of_work
    }

    pub fn deletions(&self) -> &[FiberId] {
        &self.deletions
    }

    pub(crate) fn insert(&mut self, fiber: Fiber) -> FiberId {
        self.fibers.insert(fiber)
    }

    /// Iterates the direct children of `id` in sibling order.
    pub fn children(&self, id: FiberId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|fiber| fiber.child),
        }
    }

    /// Pre-order walk of the subtree rooted at `root`, `root` included.
    pub fn descendants(&self, root: FiberId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            root,
            next: self.fibers.contains_key(root).then_some(root),
        }
    }

    /// Next fiber after `fiber` in pre-order: its child, else the sibling of
    /// the nearest ancestor (itself included) that has one. Never leaves the
    /// subtree of `root`.
    pub fn next_in_preorder(&self, fiber: FiberId, root: FiberId) -> Option<FiberId> {
        if let Some(child) = self[fiber].child {
            return Some(child);
        }
        let mut current = fiber;
        loop {
            if current == root {
                return None;
            }
            if let Some(sibling) = self[current].sibling {
                return Some(sibling);
            }
            current = self[current].parent?;
        }
    }

    /// Host node of the closest ancestor that owns one. Component fibers have
    /// no node of their own, so their children attach further up.
    pub fn host_parent(&self, fiber: FiberId) -> Option<NodeId> {
        let mut current = self.get(fiber)?.parent;
        while let Some(id) = current {
            let ancestor = &self[id];
            if let Some(dom) = ancestor.dom {
                return Some(dom);
            }
            current = ancestor.parent;
        }
        None
    }

    /// Host node owned by `fiber`, or for a component the first one found
    /// down its child chain.
    pub fn first_host_node(&self, fiber: FiberId) -> Option<NodeId> {
        let mut current = Some(fiber);
        while let Some(id) = current {
            let node = self.get(id)?;
            if let Some(dom) = node.dom {
                return Some(dom);
            }
            current = node.child;
        }
        None
    }

    pub(crate) fn discard_subtree(&mut self, root: FiberId) {
        let abandoned: Vec<FiberId> = self.descendants(root).collect();
        log::debug!("discarding {} work-in-progress fibers", abandoned.len());
        for id in abandoned {
            self.fibers.remove(id);
        }
    }

    /// Drops every fiber not reachable from the current root and cuts the
    /// survivors' links to the generation that was just replaced.
    pub(crate) fn sweep(&mut self) {
        let live: HashSet<FiberId> = match self.current_root {
            Some(root) => self.descendants(root).collect(),
            None => HashSet::default(),
        };
        let before = self.fibers.len();
        self.fibers.retain(|id, _| live.contains(&id));
        for fiber in self.fibers.values_mut() {
            fiber.alternate = None;
        }
        log::trace!("swept {} stale fibers", before - self.fibers.len());
    }
}

impl Index<FiberId> for FiberTree {
    type Output = Fiber;

    fn index(&self, id: FiberId) -> &Fiber {
        &self.fibers[id]
    }
}

impl IndexMut<FiberId> for FiberTree {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber {
        &mut self.fibers[id]
    }
}

pub struct Children<'a> {
    tree: &'a FiberTree,
    next: Option<FiberId>,
}

impl Iterator for Children<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(|fiber| fiber.sibling);
        Some(current)
    }
}

pub struct PreOrder<'a> {
    tree: &'a FiberTree,
    root: FiberId,
    next: Option<FiberId>,
}

impl Iterator for PreOrder<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let current = self.next?;
        self.next = self.tree.next_in_preorder(current, self.root);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut FiberTree, parent: FiberId, tag: &str) -> FiberId {
        tree.insert(Fiber::new(
            FiberKind::Host(Rc::from(tag)),
            Rc::new(Props::new()),
            parent,
        ))
    }

    // root
    // ├── a
    // │   ├── b
    // │   └── c
    // └── d
    fn sample() -> (FiberTree, [FiberId; 5]) {
        let mut tree = FiberTree::new();
        let root = tree.insert(Fiber::root(0, Rc::new(Props::new()), None));
        let a = leaf(&mut tree, root, "a");
        let b = leaf(&mut tree, a, "b");
        let c = leaf(&mut tree, a, "c");
        let d = leaf(&mut tree, root, "d");
        tree[root].child = Some(a);
        tree[a].sibling = Some(d);
        tree[a].child = Some(b);
        tree[b].sibling = Some(c);
        (tree, [root, a, b, c, d])
    }

    #[test]
    fn preorder_descends_then_backtracks() {
        let (tree, [root, a, b, c, d]) = sample();
        let order: Vec<_> = tree.descendants(root).collect();
        assert_eq!(order, vec![root, a, b, c, d]);
    }

    #[test]
    fn preorder_stays_inside_subtree() {
        let (tree, [_, a, b, c, _]) = sample();
        let order: Vec<_> = tree.descendants(a).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn children_follow_sibling_chain() {
        let (tree, [root, a, _, _, d]) = sample();
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, d]);
    }

    #[test]
    fn host_parent_skips_fibers_without_nodes() {
        let (mut tree, [root, a, b, _, _]) = sample();
        tree[root].dom = Some(7);
        assert_eq!(tree.host_parent(b), Some(7));
        tree[a].dom = Some(9);
        assert_eq!(tree.host_parent(b), Some(9));
    }

    #[test]
    fn sweep_keeps_only_current_generation() {
        let (mut tree, [root, a, _, _, _]) = sample();
        let stray = tree.insert(Fiber::root(1, Rc::new(Props::new()), None));
        tree[a].alternate = Some(stray);
        tree.current_root = Some(root);
        tree.sweep();
        assert_eq!(tree.len(), 5);
        assert!(tree.get(stray).is_none());
        assert_eq!(tree[a].alternate(), None);
    }
}
