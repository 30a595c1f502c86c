//! Element attributes, event handlers and the attribute diff applied on update.
//!
//! Props are an ordered attribute map plus the element's children. An attribute
//! whose name starts with `on` followed by at least one character is an *event
//! prop*: it never reaches the host as a plain property and is instead bound as
//! a listener on the lower-cased remainder of its name (`onClick` → `click`).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::element::Element;
use crate::NodeId;

pub const EVENT_PREFIX: &str = "on";

/// Event delivered to a listener by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub name: Rc<str>,
    pub target: NodeId,
}

/// Shared callback bound to an event prop. Two handlers are equal only if they
/// are the same allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Text(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(text) => f.write_str(text),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Text(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attributes: IndexMap<Rc<str>, PropValue>,
    children: Vec<Option<Element>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Binds `handler` to `event` (`"click"` is stored as `onClick`).
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.with(event_prop_name(event), EventHandler::new(handler))
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attributes.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_text)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
    }

    pub fn children(&self) -> &[Option<Element>] {
        &self.children
    }

    pub(crate) fn with_children(mut self, children: Vec<Option<Element>>) -> Self {
        self.children = children;
        self
    }
}

/// Returns the event name for an event prop, `None` for plain attributes.
pub fn event_name(prop: &str) -> Option<String> {
    prop.strip_prefix(EVENT_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_ascii_lowercase)
}

fn event_prop_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("{EVENT_PREFIX}{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => EVENT_PREFIX.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropChange {
    RemoveListener { event: String, handler: EventHandler },
    ClearProperty { name: Rc<str> },
    SetProperty { name: Rc<str>, value: PropValue },
    AddListener { event: String, handler: EventHandler },
}

/// Computes the host operations that turn `old` into `new`.
///
/// Changes come out grouped in application order: stale listeners are
/// removed, vanished properties cleared, new or changed properties set, and
/// finally new or changed listeners added. Unchanged values produce nothing,
/// so diffing a props value against itself is empty.
pub fn diff_props(old: &Props, new: &Props) -> Vec<PropChange> {
    let mut changes = Vec::new();

    for (name, value) in &old.attributes {
        let Some(event) = event_name(name) else {
            continue;
        };
        if let PropValue::Handler(handler) = value {
            if new.attributes.get(name) != Some(value) {
                changes.push(PropChange::RemoveListener {
                    event,
                    handler: handler.clone(),
                });
            }
        }
    }

    for name in old.attributes.keys() {
        if event_name(name).is_none() && !new.attributes.contains_key(name) {
            changes.push(PropChange::ClearProperty { name: name.clone() });
        }
    }

    for (name, value) in &new.attributes {
        if event_name(name).is_none() && old.attributes.get(name) != Some(value) {
            changes.push(PropChange::SetProperty {
                name: name.clone(),
                value: value.clone(),
            });
        }
    }

    for (name, value) in &new.attributes {
        let Some(event) = event_name(name) else {
            continue;
        };
        match value {
            PropValue::Handler(handler) => {
                if old.attributes.get(name) != Some(value) {
                    changes.push(PropChange::AddListener {
                        event,
                        handler: handler.clone(),
                    });
                }
            }
            other => log::warn!("ignoring non-handler value `{other}` for event prop `{name}`"),
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_strip_prefix_and_lowercase() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onMouseDown").as_deref(), Some("mousedown"));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("title"), None);
    }

    #[test]
    fn on_builder_stores_event_prop() {
        let props = Props::new().on("click", |_| {});
        assert!(props.get("onClick").and_then(PropValue::as_handler).is_some());
    }

    #[test]
    fn diff_against_itself_is_empty() {
        let props = Props::new().with("id", "a").on("click", |_| {});
        assert!(diff_props(&props, &props.clone()).is_empty());
    }

    #[test]
    fn diff_orders_removals_before_additions() {
        let f = EventHandler::new(|_| {});
        let g = EventHandler::new(|_| {});
        let old = Props::new()
            .with("id", "a")
            .with("title", "t")
            .with("onClick", f.clone());
        let new = Props::new().with("id", "b").with("onClick", g.clone());

        let changes = diff_props(&old, &new);
        assert_eq!(
            changes,
            vec![
                PropChange::RemoveListener {
                    event: "click".into(),
                    handler: f,
                },
                PropChange::ClearProperty {
                    name: Rc::from("title"),
                },
                PropChange::SetProperty {
                    name: Rc::from("id"),
                    value: PropValue::from("b"),
                },
                PropChange::AddListener {
                    event: "click".into(),
                    handler: g,
                },
            ]
        );
    }

    #[test]
    fn non_handler_event_values_are_ignored() {
        let old = Props::new();
        let new = Props::new().with("onClick", 3);
        assert!(diff_props(&old, &new).is_empty());
    }
}
