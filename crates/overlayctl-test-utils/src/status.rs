//! Status document builder.

use serde_json::{Map, Value, json};

/// Fluent builder for `llarp.status` replies.
///
/// # Example
///
/// ```ignore
/// let doc = StatusDocBuilder::new()
///     .link(&["203.0.113.5:9000", "198.51.100.7:1090"])
///     .service("default", "lokitun0", "10.0.0.1/24")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatusDocBuilder {
    outbound: Vec<Value>,
    services: Map<String, Value>,
}

impl StatusDocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one outbound link with an established session per address.
    pub fn link(mut self, remote_addrs: &[&str]) -> Self {
        let sessions: Vec<Value> = remote_addrs
            .iter()
            .map(|addr| json!({ "remoteAddr": addr }))
            .collect();
        self.outbound
            .push(json!({ "sessions": { "established": sessions } }));
        self
    }

    /// Add a logical endpoint with both interface fields.
    pub fn service(mut self, name: &str, ifname: &str, ifaddr: &str) -> Self {
        self.services.insert(
            name.to_string(),
            json!({ "ifname": ifname, "ifaddr": ifaddr }),
        );
        self
    }

    /// The full reply, wrapped in `result`.
    pub fn build(self) -> Value {
        json!({
            "result": {
                "links": { "outbound": self.outbound },
                "services": Value::Object(self.services),
            }
        })
    }
}

/// A status document with two first hops and a `default` service.
pub fn default_status() -> Value {
    StatusDocBuilder::new()
        .link(&["203.0.113.5:9000"])
        .link(&["198.51.100.7:1090"])
        .service("default", "lokitun0", "10.0.0.1/24")
        .build()
}
