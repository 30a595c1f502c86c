use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::props::{PropValue, Props};

pub const TEXT_NODE_VALUE: &str = "nodeValue";

type RenderFn = Rc<dyn Fn(&Props) -> Element>;
type BoxedRender = Box<dyn Fn(&Props) -> Element>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Identity {
    /// `fn` items and closure definitions each have their own type.
    Type(TypeId),
    /// `fn` pointers share one type and are told apart by code address.
    Code(usize),
    /// Boxed closures are erased; only clones of one component match.
    Instance(u64),
}

/// A function component.
///
/// The same `fn` item or closure definition always yields equal components
/// no matter how many times it is wrapped. A `fn` pointer compares by the
/// address it points at. A boxed closure is only equal to clones of the
/// component built from it, so rebuilding it every render remounts it.
#[derive(Clone)]
pub struct Component {
    identity: Identity,
    name: &'static str,
    render: RenderFn,
}

impl Component {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Element + 'static,
    {
        let erased = &render as &dyn Any;
        let identity = if let Some(code) = erased.downcast_ref::<fn(&Props) -> Element>() {
            Identity::Code(*code as usize)
        } else if erased.is::<BoxedRender>() {
            Identity::Instance(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
        } else {
            Identity::Type(TypeId::of::<F>())
        };
        Self {
            identity,
            name: std::any::type_name::<F>(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> Element {
        (self.render)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Host(Rc<str>),
    Text,
    Component(Component),
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(Rc::from(tag))
    }
}

impl From<Component> for ElementKind {
    fn from(component: Component) -> Self {
        ElementKind::Component(component)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    kind: ElementKind,
    props: Rc<Props>,
}

impl Element {
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }

    pub fn children(&self) -> &[Option<Element>] {
        self.props.children()
    }

    pub fn host(
        tag: &str,
        props: Props,
        children: impl IntoIterator<Item = Child>,
    ) -> Element {
        create_element(tag, props, children)
    }

    pub fn component<F>(render: F, props: Props) -> Element
    where
        F: Fn(&Props) -> Element + 'static,
    {
        create_element(Component::new(render), props, Vec::new())
    }
}

/// A child passed to [`create_element`]. Scalars become text elements and
/// [`Child::Empty`] keeps its position in the sibling list without producing
/// a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Element(Element),
    Text(Rc<str>),
    Empty,
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<Option<Element>> for Child {
    fn from(element: Option<Element>) -> Self {
        element.map_or(Child::Empty, Child::Element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

pub fn create_element(
    kind: impl Into<ElementKind>,
    props: Props,
    children: impl IntoIterator<Item = Child>,
) -> Element {
    let children = children
        .into_iter()
        .map(|child| match child {
            Child::Element(element) => Some(element),
            Child::Text(text) => Some(text_element(text)),
            Child::Empty => None,
        })
        .collect();
    Element {
        kind: kind.into(),
        props: Rc::new(props.with_children(children)),
    }
}

pub fn text_element(value: impl Into<Rc<str>>) -> Element {
    Element {
        kind: ElementKind::Text,
        props: Rc::new(Props::new().with(TEXT_NODE_VALUE, PropValue::Text(value.into()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::children;

    fn label(props: &Props) -> Element {
        text_element(props.text("value").unwrap_or_default())
    }

    #[test]
    fn scalars_are_wrapped_into_text_elements() {
        let element = create_element("p", Props::new(), children!["count: ", 3]);
        let kinds: Vec<_> = element
            .children()
            .iter()
            .map(|child| child.as_ref().map(|c| c.kind().clone()))
            .collect();
        assert_eq!(kinds, vec![Some(ElementKind::Text), Some(ElementKind::Text)]);
        let second = element.children()[1].as_ref().unwrap();
        assert_eq!(second.props().text(TEXT_NODE_VALUE), Some("3"));
        assert!(second.children().is_empty());
    }

    #[test]
    fn empty_children_keep_their_slot() {
        let element = create_element(
            "ul",
            Props::new(),
            children![None::<Element>, text_element("x")],
        );
        assert_eq!(element.children().len(), 2);
        assert!(element.children()[0].is_none());
    }

    #[test]
    fn construction_is_structurally_equal_for_equal_inputs() {
        let build = || create_element("div", Props::new().with("id", "a"), children!["hi"]);
        assert_eq!(build(), build());
    }

    #[test]
    fn components_compare_by_render_function_type() {
        assert_eq!(Component::new(label), Component::new(label));
        let other = |_: &Props| text_element("other");
        assert_ne!(Component::new(label), Component::new(other));
    }

    #[test]
    fn fn_pointers_compare_by_address() {
        fn other(_: &Props) -> Element {
            text_element("other")
        }
        let pages: [fn(&Props) -> Element; 2] = [label, other];
        assert_eq!(Component::new(pages[0]), Component::new(pages[0]));
        assert_ne!(Component::new(pages[0]), Component::new(pages[1]));
    }

    #[test]
    fn boxed_closures_only_match_their_own_clones() {
        let boxed = |text: &'static str| -> BoxedRender {
            Box::new(move |_: &Props| text_element(text))
        };
        let first = Component::new(boxed("a"));
        assert_eq!(first.clone(), first);
        assert_ne!(first, Component::new(boxed("a")));
        assert_ne!(first, Component::new(label));
    }
}
