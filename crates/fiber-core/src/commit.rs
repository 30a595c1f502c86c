use crate::fiber::{EffectTag, FiberId};
use crate::host::HostAdapter;
use crate::work_loop::{CommitStats, Reconciler};
use crate::ReconcileError;

impl<H: HostAdapter> Reconciler<H> {
    /// Applies the finished pass rooted at `root` to the host in one go:
    /// deletions first, then placements and updates in pre-order. On success
    /// `root` becomes the current tree and the previous generation is swept.
    pub(crate) fn commit_root(&mut self, root: FiberId) -> Result<CommitStats, ReconcileError> {
        let mut stats = CommitStats::default();

        for deleted in std::mem::take(&mut self.tree.deletions) {
            if self.commit_deletion(deleted)? {
                stats.deletions += 1;
            }
        }

        let order: Vec<FiberId> = self.tree.descendants(root).skip(1).collect();
        for id in order {
            let fiber = &self.tree[id];
            let Some(dom) = fiber.dom else {
                continue;
            };
            match fiber.effect {
                Some(EffectTag::Placement) => {
                    let parent = self
                        .tree
                        .host_parent(id)
                        .ok_or(ReconcileError::NoHostParent { fiber: id })?;
                    self.host.append_child(parent, dom)?;
                    stats.placements += 1;
                }
                Some(EffectTag::Update) => {
                    if let Some(alternate) = fiber.alternate {
                        let old = &self.tree[alternate].props;
                        self.host.apply_props(dom, old, &fiber.props)?;
                        stats.updates += 1;
                    }
                }
                Some(EffectTag::Deletion) | None => {}
            }
        }

        self.tree.current_root = Some(root);
        self.tree.wip_root = None;
        self.tree.next_unit_of_work = None;
        self.tree.sweep();
        log::debug!(
            "committed: {} placed, {} updated, {} deleted",
            stats.placements,
            stats.updates,
            stats.deletions
        );
        Ok(stats)
    }

    /// Detaches the host node of a deleted fiber. A component owns no node,
    /// so the first one down its child chain goes instead.
    fn commit_deletion(&mut self, fiber: FiberId) -> Result<bool, ReconcileError> {
        let Some(node) = self.tree.first_host_node(fiber) else {
            log::trace!("deleted fiber {fiber:?} never reached the host");
            return Ok(false);
        };
        let parent = self
            .tree
            .host_parent(fiber)
            .ok_or(ReconcileError::NoHostParent { fiber })?;
        self.host.remove_child(parent, node)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::element::{create_element, Child, Element};
    use crate::host::{HostOp, MemoryHost};
    use crate::platform::Unbounded;
    use crate::props::Props;
    use crate::work_loop::{CommitStats, Reconciler};
    use crate::{children, HostError, ReconcileError};

    fn wrapper(props: &Props) -> Element {
        create_element("p", Props::new(), children![props.text("label").unwrap_or("")])
    }

    #[test]
    fn deleted_component_removes_its_first_host_node() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::new(host);
        reconciler.render(
            create_element(
                "div",
                Props::new(),
                children![Element::component(
                    wrapper,
                    Props::new().with("label", "hi")
                )],
            ),
            container,
        );
        reconciler.flush().unwrap();
        let div = reconciler.host().children(container).unwrap()[0];
        let p = reconciler.host().children(div).unwrap()[0];
        reconciler.host_mut().take_ops();

        reconciler.render(create_element("div", Props::new(), children![]), container);
        let commits = reconciler.flush().unwrap();

        assert_eq!(
            commits,
            vec![CommitStats {
                placements: 0,
                updates: 1,
                deletions: 1,
            }]
        );
        assert_eq!(
            reconciler.host().ops(),
            &[HostOp::RemoveChild { parent: div, child: p }]
        );
    }

    #[test]
    fn refused_commit_poisons_the_reconciler() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::new(host);
        reconciler.render(create_element("a", Props::new(), children![]), container);
        reconciler.flush().unwrap();
        let committed = reconciler.current_root();

        reconciler.host_mut().refuse_appends(true);
        reconciler.render(create_element("b", Props::new(), children![]), container);
        let err = reconciler.work_loop(&Unbounded).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Host(HostError::Refused { operation: "append_child", .. })
        ));
        assert_eq!(reconciler.current_root(), committed);
        assert!(reconciler.is_poisoned());
        assert!(!reconciler.has_pending_work());
        assert_eq!(reconciler.work_loop(&Unbounded), Err(ReconcileError::Poisoned));
        assert_eq!(reconciler.flush(), Err(ReconcileError::Poisoned));

        reconciler.host_mut().refuse_appends(false);
        reconciler.render(create_element("c", Props::new(), children![]), container);
        assert!(!reconciler.has_pending_work());
    }

    #[test]
    fn failure_after_deletions_poisons_the_reconciler() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::new(host);
        let list = |items: &[&str]| {
            create_element(
                "ul",
                Props::new(),
                items
                    .iter()
                    .map(|item| Child::from(create_element(*item, Props::new(), children![]))),
            )
        };
        reconciler.render(list(&["li", "li"]), container);
        reconciler.flush().unwrap();

        // the second item is deleted, the replacement append is refused
        reconciler.host_mut().refuse_appends(true);
        reconciler.render(list(&["p"]), container);
        assert!(reconciler.flush().is_err());
        let ul = reconciler.host().children(container).unwrap()[0];
        assert_eq!(reconciler.host().children(ul).unwrap().len(), 0);

        assert_eq!(reconciler.flush(), Err(ReconcileError::Poisoned));
    }
}
