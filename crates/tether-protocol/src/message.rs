//! Messages exchanged on an established channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::frame;

/// Caller-assigned correlation number for an invocation.
pub type Serial = u64;

/// Every message that may cross a dedicated channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// The embedded side is ready to receive invocations.
    #[serde(rename = "zupass-client-ready")]
    ClientReady,
    /// Ask the host to reveal the embedded surface.
    #[serde(rename = "zupass-client-show")]
    ClientShow,
    /// Ask the host to hide the embedded surface.
    #[serde(rename = "zupass-client-hide")]
    ClientHide,
    /// Call a capability method by dotted path.
    #[serde(rename = "zupass-client-invoke")]
    Invoke(Invoke),
    /// Successful completion of an invocation.
    #[serde(rename = "zupass-client-invoke-result")]
    InvokeResult(InvokeResult),
    /// Failed invocation, or a channel-level failure when `serial` is absent.
    #[serde(rename = "zupass-client-invoke-error")]
    InvokeError(InvokeError),
}

/// Request to run the method at `function` with positional `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoke {
    /// Dot-separated path into the service registry, e.g. `fs.put`.
    #[serde(rename = "fn")]
    pub function: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Correlation number echoed by the response.
    pub serial: Serial,
}

/// Success response for the invocation with the same serial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResult {
    /// Value produced by the method; `null` when it returns nothing.
    #[serde(default)]
    pub result: Value,
    /// Serial of the originating [`Invoke`].
    pub serial: Serial,
}

/// Failure response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeError {
    /// Human-readable failure description.
    pub error: String,
    /// Serial of the failed [`Invoke`], when the failure can be attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<Serial>,
}

/// Borrowed split of an invocation target into service path and method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionPath<'a> {
    services: &'a str,
    method: &'a str,
}

impl<'a> FunctionPath<'a> {
    /// Splits `function` on its last `.`; everything before it is the path.
    pub fn parse(function: &'a str) -> Self {
        match function.rsplit_once('.') {
            Some((services, method)) => Self { services, method },
            None => Self {
                services: "",
                method: function,
            },
        }
    }

    /// Service names from the registry root, outermost first.
    ///
    /// Empty when the method lives directly on the root.
    pub fn services(&self) -> impl Iterator<Item = &'a str> + 'a {
        let services = self.services;
        services.split('.').filter(move |_| !services.is_empty())
    }

    /// Final segment naming the method.
    pub fn method(&self) -> &'a str {
        self.method
    }
}

impl Invoke {
    /// Creates an invocation request.
    pub fn new(function: impl Into<String>, args: Vec<Value>, serial: Serial) -> Self {
        Self {
            function: function.into(),
            args,
            serial,
        }
    }

    /// Splits the target into service path and method name.
    pub fn target(&self) -> FunctionPath<'_> {
        FunctionPath::parse(&self.function)
    }
}

impl Message {
    /// Builds a success response.
    pub fn invoke_result(serial: Serial, result: Value) -> Self {
        Self::InvokeResult(InvokeResult { result, serial })
    }

    /// Builds a failure response attributed to `serial`.
    pub fn invoke_error(serial: Serial, error: impl Into<String>) -> Self {
        Self::InvokeError(InvokeError {
            error: error.into(),
            serial: Some(serial),
        })
    }

    /// Builds a failure response that no request can be matched to.
    pub fn unattributed_error(error: impl Into<String>) -> Self {
        Self::InvokeError(InvokeError {
            error: error.into(),
            serial: None,
        })
    }

    /// Validates an untyped payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Malformed`] when the payload is not one of the
    /// known message shapes.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(SchemaError::from_json_error)
    }

    /// Validates a single JSONL line.
    ///
    /// # Errors
    ///
    /// Returns an error when the line is empty, too large, or not a known
    /// message shape.
    pub fn parse_line(line: &[u8]) -> Result<Self, SchemaError> {
        let trimmed = frame::checked_line(line)?;
        serde_json::from_slice(trimmed).map_err(SchemaError::from_json_error)
    }

    /// Wire discriminator, useful for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientReady => "zupass-client-ready",
            Self::ClientShow => "zupass-client-show",
            Self::ClientHide => "zupass-client-hide",
            Self::Invoke(_) => "zupass-client-invoke",
            Self::InvokeResult(_) => "zupass-client-invoke-result",
            Self::InvokeError(_) => "zupass-client-invoke-error",
        }
    }

    /// Serial carried by the message, if any.
    pub fn serial(&self) -> Option<Serial> {
        match self {
            Self::Invoke(invoke) => Some(invoke.serial),
            Self::InvokeResult(result) => Some(result.serial),
            Self::InvokeError(error) => error.serial,
            Self::ClientReady | Self::ClientShow | Self::ClientHide => None,
        }
    }

    /// Converts the message into its untyped JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Encode`] if serialization fails.
    pub fn to_value(&self) -> Result<Value, SchemaError> {
        serde_json::to_value(self).map_err(SchemaError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::ready(json!({"type": "zupass-client-ready"}), Message::ClientReady)]
    #[case::show(json!({"type": "zupass-client-show"}), Message::ClientShow)]
    #[case::hide(json!({"type": "zupass-client-hide"}), Message::ClientHide)]
    #[case::invoke(
        json!({"type": "zupass-client-invoke", "fn": "fs.put", "args": ["a", 1], "serial": 5}),
        Message::Invoke(Invoke::new("fs.put", vec![json!("a"), json!(1)], 5))
    )]
    #[case::result(
        json!({"type": "zupass-client-invoke-result", "result": 100, "serial": 7}),
        Message::invoke_result(7, json!(100))
    )]
    #[case::error(
        json!({"type": "zupass-client-invoke-error", "error": "boom", "serial": 2}),
        Message::invoke_error(2, "boom")
    )]
    #[case::unattributed_error(
        json!({"type": "zupass-client-invoke-error", "error": "boom"}),
        Message::unattributed_error("boom")
    )]
    fn discriminates_by_type_tag(#[case] raw: Value, #[case] expected: Message) {
        assert_eq!(Message::from_value(raw).expect("valid message"), expected);
    }

    #[rstest]
    #[case::unknown_type(json!({"type": "zupass-client-teleport"}))]
    #[case::missing_type(json!({"fn": "fs.get", "args": [], "serial": 1}))]
    #[case::missing_serial(json!({"type": "zupass-client-invoke", "fn": "fs.get", "args": []}))]
    #[case::missing_args(json!({"type": "zupass-client-invoke", "fn": "fs.get", "serial": 1}))]
    #[case::negative_serial(json!({"type": "zupass-client-invoke", "fn": "x", "args": [], "serial": -1}))]
    #[case::string_args(json!({"type": "zupass-client-invoke", "fn": "x", "args": "a", "serial": 1}))]
    #[case::not_an_object(json!("zupass-client-ready"))]
    #[case::null(Value::Null)]
    fn rejects_malformed_payloads(#[case] raw: Value) {
        assert!(matches!(
            Message::from_value(raw),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn invoke_result_without_result_field_decodes_as_null() {
        let message =
            Message::from_value(json!({"type": "zupass-client-invoke-result", "serial": 5}))
                .expect("valid result");
        assert_eq!(message, Message::invoke_result(5, Value::Null));
    }

    #[test]
    fn unattributed_error_omits_serial_on_the_wire() {
        let value = Message::unattributed_error("lost").to_value().expect("encode");
        assert_eq!(
            value,
            json!({"type": "zupass-client-invoke-error", "error": "lost"})
        );
    }

    #[test]
    fn invoke_serializes_function_as_fn() {
        let value = Message::Invoke(Invoke::new("identity.getIdentityCommitment", vec![], 7))
            .to_value()
            .expect("encode");
        assert_eq!(value["fn"], json!("identity.getIdentityCommitment"));
        assert_eq!(value["type"], json!("zupass-client-invoke"));
    }

    #[test]
    fn parse_line_trims_newline() {
        let message = Message::parse_line(b"{\"type\":\"zupass-client-ready\"}\r\n").expect("parse");
        assert_eq!(message, Message::ClientReady);
    }

    #[test]
    fn parse_line_rejects_blank_lines() {
        assert!(matches!(Message::parse_line(b"  \n"), Err(SchemaError::Empty)));
    }

    #[rstest]
    #[case::nested("fs.put", &["fs"], "put")]
    #[case::deep("a.b.c", &["a", "b"], "c")]
    #[case::root("ping", &[], "ping")]
    #[case::trailing_dot("fs.", &["fs"], "")]
    #[case::empty("", &[], "")]
    fn splits_function_paths(
        #[case] function: &str,
        #[case] services: &[&str],
        #[case] method: &str,
    ) {
        let path = FunctionPath::parse(function);
        assert_eq!(path.services().collect::<Vec<_>>(), services);
        assert_eq!(path.method(), method);
    }

    #[test]
    fn serial_accessor_covers_correlated_variants() {
        assert_eq!(Message::invoke_error(4, "x").serial(), Some(4));
        assert_eq!(Message::unattributed_error("x").serial(), None);
        assert_eq!(Message::ClientShow.serial(), None);
    }
}
