use crate::element::Element;
use crate::fiber::{EffectTag, Fiber, FiberId, FiberKind, FiberTree};

impl FiberTree {
    /// Diffs the children `wip` had in the committed tree against `elements`,
    /// position by position.
    ///
    /// Matching kinds at the same index become UPDATE fibers that keep the old
    /// host node; anything else is a PLACEMENT for the new element and a
    /// DELETION for the old fiber. There is no keyed matching, so reordered
    /// children are replaced in place.
    pub(crate) fn reconcile_children(&mut self, wip: FiberId, elements: &[Option<Element>]) {
        let mut old_fiber = self[wip].alternate.and_then(|alternate| self[alternate].child);
        let mut previous: Option<FiberId> = None;
        let mut index = 0;

        while index < elements.len() || old_fiber.is_some() {
            let element = elements.get(index).and_then(Option::as_ref);
            let same_type = match (old_fiber, element) {
                (Some(old), Some(element)) => self[old].kind.matches(element.kind()),
                _ => false,
            };

            let mut new_fiber = None;
            if let (true, Some(old), Some(element)) = (same_type, old_fiber, element) {
                let mut fiber =
                    Fiber::new(FiberKind::from(element.kind()), element.props().clone(), wip);
                fiber.dom = self[old].dom;
                fiber.alternate = Some(old);
                fiber.effect = Some(EffectTag::Update);
                new_fiber = Some(self.insert(fiber));
            } else if let Some(element) = element {
                let mut fiber =
                    Fiber::new(FiberKind::from(element.kind()), element.props().clone(), wip);
                fiber.effect = Some(EffectTag::Placement);
                new_fiber = Some(self.insert(fiber));
            }

            if let (Some(old), false) = (old_fiber, same_type) {
                self[old].effect = Some(EffectTag::Deletion);
                self.deletions.push(old);
            }

            old_fiber = old_fiber.and_then(|old| self[old].sibling);

            if let Some(fiber) = new_fiber {
                match previous {
                    None => self[wip].child = Some(fiber),
                    Some(prev) => self[prev].sibling = Some(fiber),
                }
                previous = Some(fiber);
            }
            index += 1;
        }

        if previous.is_none() {
            self[wip].child = None;
        }
        log::trace!("reconciled {index} child positions under {wip:?}");
    }
}
