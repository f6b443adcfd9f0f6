//! Core types for spark-dom.
//!
//! These types flow through every stage of the reactive pipeline: component
//! state, props, template interpolations, effect getters and registry entries
//! all carry a [`Value`].
//!
//! # Equality
//!
//! `Value` equality is *shallow*, mirroring identity comparison of a dynamic
//! runtime: primitives compare by value, text by content, and lists, callbacks
//! and refs by identity. Two lists with the same elements are different values
//! unless they share the same allocation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::Ctx;
use crate::dom::NodeId;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a live component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Callback
// =============================================================================

/// Handler signature. The context is the instance the callback is bound to.
pub type HandlerFn = dyn Fn(&mut Ctx<'_>, &Event) -> anyhow::Result<()>;

/// A callable value: event handlers and callback props.
///
/// Registering a callback through a template binds it to the rendering
/// instance. Binding is sticky: a callback that was already bound (for example
/// one received from a parent as a prop) keeps its original owner.
#[derive(Clone)]
pub struct Callback {
    f: Rc<HandlerFn>,
    bound: Option<InstanceId>,
}

impl Callback {
    /// Wrap a closure as an unbound callback.
    pub fn new(f: impl Fn(&mut Ctx<'_>, &Event) -> anyhow::Result<()> + 'static) -> Self {
        Self {
            f: Rc::new(f),
            bound: None,
        }
    }

    /// Instance this callback runs against, if bound.
    pub fn bound_to(&self) -> Option<InstanceId> {
        self.bound
    }

    /// Bind to `owner` unless already bound.
    pub(crate) fn bind(&self, owner: InstanceId) -> Self {
        Self {
            f: self.f.clone(),
            bound: self.bound.or(Some(owner)),
        }
    }

    pub(crate) fn call(&self, ctx: &mut Ctx<'_>, event: &Event) -> anyhow::Result<()> {
        (self.f)(ctx, event)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f) && self.bound == other.bound
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("bound", &self.bound).finish_non_exhaustive()
    }
}

/// Shorthand for [`Callback::new`].
pub fn handler(f: impl Fn(&mut Ctx<'_>, &Event) -> anyhow::Result<()> + 'static) -> Callback {
    Callback::new(f)
}

// =============================================================================
// NodeRef
// =============================================================================

/// Reference cell populated with an element by a `ref=` binding.
///
/// Clones share the same cell.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<NodeId>>>);

impl NodeRef {
    /// Create a cell holding `initial`.
    pub fn new(initial: Option<NodeId>) -> Self {
        Self(Rc::new(RefCell::new(initial)))
    }

    /// The element currently held.
    pub fn current(&self) -> Option<NodeId> {
        *self.0.borrow()
    }

    pub(crate) fn set(&self, node: NodeId) {
        *self.0.borrow_mut() = Some(node);
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.current()).finish()
    }
}

// =============================================================================
// Event
// =============================================================================

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type without the `on` prefix (e.g. "click").
    pub kind: String,
    /// Element the event was dispatched on. Filled in by dispatch.
    pub target: Option<NodeId>,
    /// Arbitrary payload.
    pub detail: Value,
}

impl Event {
    /// Create an event of the given type with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            detail: Value::Null,
        }
    }

    /// Attach a payload.
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }
}

// =============================================================================
// Value
// =============================================================================

/// Dynamic value carried by state, props, template interpolations and effects.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(Rc<[Value]>),
    Callback(Callback),
    Ref(NodeRef),
}

impl Value {
    /// Build a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is a callable.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callback(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn as_node_ref(&self) -> Option<&NodeRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// JSON encoding used for plain attribute values.
    ///
    /// Non-finite numbers, callbacks and refs encode as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Callback(_) | Value::Ref(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Text(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

/// Largest integer an f64 holds exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Callback(a), Value::Callback(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

/// Default string form. `Null` renders as nothing.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Callback(_) => f.write_str("[callback]"),
            Value::Ref(_) => f.write_str("[ref]"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value.into())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::list(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_equality() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));

        // Lists compare by identity
        let list = Value::list(["a", "b"]);
        assert_eq!(list, list.clone());
        assert_ne!(list, Value::list(["a", "b"]));
    }

    #[test]
    fn test_callback_identity() {
        let cb = handler(|_, _| Ok(()));
        let bound = cb.bind(InstanceId(1));
        assert_ne!(cb, bound);
        assert_eq!(bound, bound.clone());
        assert_eq!(bound.bind(InstanceId(2)).bound_to(), Some(InstanceId(1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::list([1, 2]).to_string(), "1,2");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::from(3).to_json().to_string(), "3");
        assert_eq!(Value::from(0.5).to_json().to_string(), "0.5");
        assert_eq!(Value::from("x").to_json().to_string(), "\"x\"");
        assert_eq!(Value::Number(f64::INFINITY).to_json(), serde_json::Value::Null);
        assert_eq!(Value::list(["a"]).to_json().to_string(), "[\"a\"]");
    }

    #[test]
    fn test_node_ref_shares_cell() {
        let r = NodeRef::default();
        let other = r.clone();
        assert_eq!(r.current(), None);
        assert_eq!(r, other);
        assert_ne!(r, NodeRef::default());
    }
}
