//! Event and ref re-binding after a patch.

use crate::dom::{Document, NodeId};
use crate::error::{Result, RuntimeError};
use crate::markup::{CallbackKey, CallbackRegistry};
use crate::types::Value;

/// Re-scan every element under `root` (not entering nested render roots).
///
/// - `on<event>=key` installs a listener for `event`; the key is resolved
///   when the event is dispatched
/// - `ref=key` stores the element in the reference cell under `key`
///
/// Listeners from the previous scan are dropped first. Returns the number of
/// listeners installed.
pub fn bind_events(doc: &mut Document, registry: &CallbackRegistry, root: NodeId) -> Result<usize> {
    let mut installed = 0;
    for element in doc.descendant_elements(root) {
        doc.clear_listeners(element);
        let attrs = doc.attrs(element).to_vec();
        for attr in attrs {
            if let Some(event) = attr.name.strip_prefix("on") {
                if event.is_empty() {
                    continue;
                }
                doc.set_listener(element, event, CallbackKey::from(attr.value.as_str()));
                installed += 1;
            } else if attr.name == "ref" {
                match registry.resolve(&attr.value) {
                    Some(Value::Ref(cell)) => cell.set(element),
                    Some(_) => return Err(RuntimeError::NotARef { key: attr.value }),
                    None => return Err(RuntimeError::UnknownRef { key: attr.value }),
                }
            }
        }
    }
    Ok(installed)
}
