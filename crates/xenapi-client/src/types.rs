//! Shared data structures for the XenAPI client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `Status` value the server uses for a successful call.
pub const STATUS_SUCCESS: &str = "Success";

// ── Result envelope ──────────────────────────────────────────────────────────

/// Envelope wrapped around every XenAPI result.
///
/// The server returns a struct with a `Status` discriminator: `"Success"`
/// carries the payload in `Value`; any other status is a failure described by
/// `ErrorDescription`, whose first element is the primary error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
    #[serde(rename = "ErrorDescription", default)]
    pub error_description: Vec<String>,
}

impl MethodResponse {
    /// Successful envelope carrying `value`.
    pub fn success(value: Value) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            value,
            error_description: Vec::new(),
        }
    }

    /// Failure envelope with the given error descriptor.
    pub fn failure(description: &[&str]) -> Self {
        Self {
            status: "Failure".to_string(),
            value: Value::Null,
            error_description: description.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether the server reported success.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Collapse the envelope into the payload or the primary error message.
    ///
    /// Every status other than `"Success"` is a failure; the descriptor list
    /// is normally non-empty, but an empty one falls back to the status
    /// string so the caller always gets a message.
    pub fn into_result(self) -> Result<Value, String> {
        if self.status == STATUS_SUCCESS {
            Ok(self.value)
        } else if let Some(message) = self.error_description.into_iter().next() {
            Err(message)
        } else {
            Err(format!("{} (no error description)", self.status))
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────────────

/// Login pair retained for parameterless re-login.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

// Keeps the password out of debug output and logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish()
    }
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_yields_value() {
        let response = MethodResponse::success(json!(["OpaqueRef:vm1", "OpaqueRef:vm2"]));
        assert!(response.is_success());
        assert_eq!(
            response.into_result(),
            Ok(json!(["OpaqueRef:vm1", "OpaqueRef:vm2"]))
        );
    }

    #[test]
    fn failure_envelope_surfaces_first_description_element() {
        let response = MethodResponse::failure(&["HANDLE_INVALID", "VM", "OpaqueRef:vm1"]);
        assert!(!response.is_success());
        assert_eq!(response.into_result(), Err("HANDLE_INVALID".to_string()));
    }

    #[test]
    fn any_non_success_status_is_a_failure() {
        let response = MethodResponse {
            status: "Working".to_string(),
            value: json!("ignored"),
            error_description: vec!["STILL_RUNNING".to_string()],
        };
        assert!(!response.is_success());
        assert_eq!(response.into_result(), Err("STILL_RUNNING".to_string()));
    }

    #[test]
    fn empty_error_description_falls_back_to_status() {
        let response = MethodResponse {
            status: "Failure".to_string(),
            value: Value::Null,
            error_description: Vec::new(),
        };
        assert_eq!(
            response.into_result(),
            Err("Failure (no error description)".to_string())
        );
    }

    #[test]
    fn envelope_deserializes_from_wire_member_names() {
        let response: MethodResponse = serde_json::from_value(json!({
            "Status": "Success",
            "Value": "OpaqueRef:session-1",
        }))
        .unwrap();
        assert!(response.is_success());
        assert_eq!(response.value, json!("OpaqueRef:session-1"));
        assert!(response.error_description.is_empty());
    }

    #[test]
    fn envelope_defaults_missing_value_to_null() {
        let response: MethodResponse = serde_json::from_value(json!({
            "Status": "Failure",
            "ErrorDescription": ["SESSION_INVALID", "OpaqueRef:session-1"],
        }))
        .unwrap();
        assert_eq!(response.value, Value::Null);
        assert_eq!(response.into_result(), Err("SESSION_INVALID".to_string()));
    }

    #[test]
    fn credentials_never_serialize_the_password() {
        let credentials = Credentials::new("root", "secret");
        let serialized = serde_json::to_value(&credentials).unwrap();
        assert_eq!(serialized, json!({ "user": "root" }));
    }

    #[test]
    fn credentials_debug_omits_the_password() {
        let rendered = format!("{:?}", Credentials::new("root", "secret"));
        assert!(rendered.contains("root"));
        assert!(!rendered.contains("secret"));
    }
}
