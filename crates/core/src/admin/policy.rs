use serde::{Deserialize, Serialize};

/// A named canned policy and its JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    /// The policy document itself
    pub document: serde_json::Value,
    /// The whole info response, wrapper fields included
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

impl Policy {
    /// Build from the body returned by the policy info endpoint
    ///
    /// Newer stores wrap the document as `{"PolicyName": .., "Policy": {..}}`;
    /// older ones return the bare document. `document` is the unwrapped policy
    /// either way; `raw` keeps the body exactly as received.
    pub fn from_response(name: impl Into<String>, body: serde_json::Value) -> Self {
        let document = body
            .get("Policy")
            .filter(|policy| policy.is_object())
            .cloned()
            .unwrap_or_else(|| body.clone());
        Self {
            name: name.into(),
            document,
            raw: body,
        }
    }

    /// `CreateDate` from a wrapped response
    pub fn create_date(&self) -> Option<&str> {
        self.raw.get("CreateDate").and_then(serde_json::Value::as_str)
    }

    /// Pretty-printed document
    pub fn document_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_else(|_| self.document.to_string())
    }
}
