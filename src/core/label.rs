//! Hierarchical labels attached to every record
//!
//! A label is a free-form string produced by a [`LabelGenerator`]. The
//! conventional shape is a pipe-delimited list of `KEY: value` segments built
//! from a [`ServiceIdentity`]:
//!
//! ```text
//! SERVICE NAME: billing | SERVICE ID: b-01 | MODULE: invoices.rs | COMPONENT: Generator | PID: 4242
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Produces the label bound by a logger at creation time
pub type LabelGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Build a label from an optional generator; empty when absent
pub fn make_label(generator: Option<&LabelGenerator>) -> String {
    generator.map(|generate| generate()).unwrap_or_default()
}

/// Wrap a closure as a [`LabelGenerator`]
pub fn label_generator<F>(generate: F) -> LabelGenerator
where
    F: Fn() -> String + Send + Sync + 'static,
{
    Arc::new(generate)
}

/// Identity of the component emitting records
///
/// The process id is carried explicitly; nothing here reads global state
/// unless [`ServiceIdentity::for_current_process`] is called.
///
/// # Example
///
/// ```
/// use rust_sink_logger::core::ServiceIdentity;
///
/// let identity = ServiceIdentity::new("TestService", "TestID")
///     .with_module("orders.rs")
///     .with_component("OrderBook")
///     .with_process_id(7);
///
/// assert_eq!(
///     identity.label(),
///     "SERVICE NAME: TestService | SERVICE ID: TestID | MODULE: orders.rs | COMPONENT: OrderBook | PID: 7"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub service_name: String,
    pub service_id: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub process_id: Option<u32>,
}

impl ServiceIdentity {
    pub fn new(service_name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_id: service_id.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_process_id(mut self, process_id: u32) -> Self {
        self.process_id = Some(process_id);
        self
    }

    /// Inject the id of the running process
    #[must_use = "builder methods return a new value"]
    pub fn for_current_process(self) -> Self {
        self.with_process_id(std::process::id())
    }

    /// Same service, module and process; different component
    #[must_use]
    pub fn child(&self, component: impl Into<String>) -> Self {
        self.clone().with_component(component)
    }

    pub fn label(&self) -> String {
        let mut label = format!(
            "SERVICE NAME: {} | SERVICE ID: {} | MODULE: {} | COMPONENT: {}",
            self.service_name, self.service_id, self.module, self.component
        );
        if let Some(pid) = self.process_id {
            label.push_str(&format!(" | PID: {}", pid));
        }
        label
    }

    pub fn generator(&self) -> LabelGenerator {
        let label = self.label();
        Arc::new(move || label.clone())
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// `KEY: value` segments recovered from a rendered label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFields {
    entries: Vec<(String, String)>,
}

impl LabelFields {
    /// Look up a segment by key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn service_name(&self) -> Option<&str> {
        self.get("SERVICE NAME")
    }

    pub fn service_id(&self) -> Option<&str> {
        self.get("SERVICE ID")
    }

    pub fn module(&self) -> Option<&str> {
        self.get("MODULE")
    }

    pub fn component(&self) -> Option<&str> {
        self.get("COMPONENT")
    }

    pub fn process_id(&self) -> Option<&str> {
        self.get("PID")
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a label on `|`, then each segment at its first `:`
///
/// Segments without a `:` are skipped.
pub fn parse_label(label: &str) -> LabelFields {
    let entries = label
        .split('|')
        .filter_map(|segment| {
            let (key, value) = segment.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect();
    LabelFields { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_label_without_generator() {
        assert_eq!(make_label(None), "");
    }

    #[test]
    fn test_make_label_invokes_generator() {
        let generator = label_generator(|| "component=A".to_string());
        assert_eq!(make_label(Some(&generator)), "component=A");
    }

    #[test]
    fn test_label_without_pid() {
        let identity = ServiceIdentity::new("svc", "id-1")
            .with_module("main.rs")
            .with_component("Root");
        assert_eq!(
            identity.label(),
            "SERVICE NAME: svc | SERVICE ID: id-1 | MODULE: main.rs | COMPONENT: Root"
        );
    }

    #[test]
    fn test_child_identity_keeps_service() {
        let parent = ServiceIdentity::new("svc", "id-1")
            .with_component("Parent")
            .with_process_id(9);
        let child = parent.child("Child");
        assert_eq!(child.component, "Child");
        assert_eq!(child.service_name, "svc");
        assert_eq!(child.process_id, Some(9));
        assert_eq!(parent.component, "Parent");
    }

    #[test]
    fn test_parse_label_roundtrip() {
        let identity = ServiceIdentity::new("TestService", "TestID")
            .with_module("logger.rs")
            .with_component("ThisClass")
            .with_process_id(31337);
        let fields = parse_label(&identity.label());

        assert_eq!(fields.service_name(), Some("TestService"));
        assert_eq!(fields.service_id(), Some("TestID"));
        assert_eq!(fields.module(), Some("logger.rs"));
        assert_eq!(fields.component(), Some("ThisClass"));
        assert_eq!(fields.process_id(), Some("31337"));
    }

    #[test]
    fn test_parse_label_skips_free_text() {
        let fields = parse_label("plain text | component: B");
        assert_eq!(fields.entries().len(), 1);
        assert_eq!(fields.component(), Some("B"));
        assert!(parse_label("").is_empty());
    }
}
