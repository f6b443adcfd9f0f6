//! Markup Composer - literal segments and values to one markup string.

use crate::types::{InstanceId, Value};

use super::registry::CallbackRegistry;

/// Whether an attribute's value must go through the registry.
///
/// Props (`p:` prefix), event handlers (`on` prefix) and `ref`.
pub fn is_binding_attribute(name: &str) -> bool {
    name.starts_with("p:") || name.starts_with("on") || name == "ref"
}

/// Name of the attribute a segment ending in `=` assigns to.
fn trailing_attribute(segment: &str) -> Option<String> {
    let head = segment.strip_suffix('=')?;
    let head = head.trim_end_matches(|c: char| c.is_ascii_whitespace());
    let start = head
        .rfind(|c: char| c.is_ascii_whitespace() || matches!(c, '<' | '>' | '"' | '\''))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &head[start..];
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

/// Template composer for one render pass of one instance.
///
/// Callables are bound to the rendering instance when registered, unless
/// they were bound already.
pub struct Composer<'a> {
    registry: &'a mut CallbackRegistry,
    owner: InstanceId,
    pass: u64,
    registered: usize,
}

impl<'a> Composer<'a> {
    pub fn new(registry: &'a mut CallbackRegistry, owner: InstanceId, pass: u64) -> Self {
        Self {
            registry,
            owner,
            pass,
            registered: 0,
        }
    }

    /// Registry entries created by this composer so far.
    pub(crate) fn registered(&self) -> usize {
        self.registered
    }

    /// Join `segments`, substituting `values[i]` after `segments[i]`.
    ///
    /// The last segment is never followed by a value; surplus values are
    /// ignored and missing ones emit nothing.
    pub fn compose(&mut self, segments: &[&str], values: Vec<Value>) -> String {
        let mut out = String::new();
        let mut values = values.into_iter();
        let last = segments.len().saturating_sub(1);

        for (i, segment) in segments.iter().enumerate() {
            out.push_str(segment);
            if i == last {
                break;
            }
            let Some(value) = values.next() else { continue };

            match trailing_attribute(segment) {
                Some(name) if is_binding_attribute(&name) => {
                    let value = match value {
                        Value::Callback(cb) => Value::Callback(cb.bind(self.owner)),
                        other => other,
                    };
                    let key = self.registry.register(self.owner, self.pass, value);
                    self.registered += 1;
                    out.push_str(key.as_str());
                }
                Some(_) => out.push_str(&value.to_json().to_string()),
                None => match &value {
                    Value::List(items) => {
                        for item in items.iter() {
                            out.push_str(&item.to_string());
                        }
                    }
                    other => out.push_str(&other.to_string()),
                },
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::handler;

    #[test]
    fn test_trailing_attribute() {
        assert_eq!(trailing_attribute("<button onclick=").as_deref(), Some("onclick"));
        assert_eq!(trailing_attribute("<x-a p:Count=").as_deref(), Some("p:count"));
        assert_eq!(trailing_attribute("<div ref =").as_deref(), Some("ref"));
        assert_eq!(trailing_attribute("<span>").as_deref(), None);
        assert_eq!(trailing_attribute("a == b ? x =").as_deref(), Some("x"));
    }

    #[test]
    fn test_binding_detection_is_anchored() {
        assert!(is_binding_attribute("onclick"));
        assert!(is_binding_attribute("p:items"));
        assert!(is_binding_attribute("ref"));
        assert!(!is_binding_attribute("data-on"));
        assert!(!is_binding_attribute("href"));
        assert!(!is_binding_attribute("prefix"));
    }

    #[test]
    fn test_handler_registers_one_entry() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(7), 1);
        let out = h.compose(
            &["<button onclick=", ">go</button>"],
            vec![handler(|_, _| Ok(())).into()],
        );
        assert_eq!(h.registered(), 1);
        assert_eq!(out, "<button onclick=k0>go</button>");

        let cb = registry.resolve("k0").and_then(Value::as_callback).unwrap();
        assert_eq!(cb.bound_to(), Some(InstanceId(7)));
    }

    #[test]
    fn test_plain_attributes_are_json() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(0), 1);
        let out = h.compose(
            &["<div class=", " data-n=", " data-l=", "></div>"],
            vec![Value::from("big"), Value::from(3), Value::list([1, 2])],
        );
        assert_eq!(out, "<div class=\"big\" data-n=3 data-l=[1,2]></div>");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_text_values() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(0), 1);
        let items = Value::list(["<li>a</li>", "<li>b</li>"]);
        let out = h.compose(&["<ul>", "</ul><p>", "|", "</p>"], vec![items, Value::Null, Value::from(2.5)]);
        assert_eq!(out, "<ul><li>a</li><li>b</li></ul><p>|2.5</p>");
    }

    #[test]
    fn test_missing_and_surplus_values() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(0), 1);
        assert_eq!(h.compose(&["a", "b", "c"], vec![Value::from(1)]), "a1bc");
        assert_eq!(h.compose(&["a", "b"], vec![Value::from(1), Value::from(2)]), "a1b");
    }

    #[test]
    fn test_props_and_refs_are_registered() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(0), 1);
        let out = h.compose(
            &["<x-item p:label=", " ref=", "></x-item>"],
            vec![Value::from("hi"), crate::types::NodeRef::default().into()],
        );
        assert_eq!(out, "<x-item p:label=k0 ref=k1></x-item>");
        assert_eq!(registry.resolve("k0"), Some(&Value::from("hi")));
        assert!(registry.resolve("k1").is_some_and(|v| v.as_node_ref().is_some()));
    }

    #[test]
    fn test_macro() {
        let mut registry = CallbackRegistry::new("k");
        let mut h = Composer::new(&mut registry, InstanceId(0), 1);
        let count = 4;
        let out = crate::html!(h => "<span>" {count} "</span>");
        assert_eq!(out, "<span>4</span>");
    }
}
