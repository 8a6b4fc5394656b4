//! XML-RPC codec for the XenAPI wire protocol.
//!
//! Builds `<methodCall>` request bodies and parses `<methodResponse>` bodies
//! into `serde_json::Value` trees. Two corners of the format matter for
//! XenServer specifically:
//!
//! - Scalar results usually arrive as untyped `<value>text</value>` elements,
//!   which XML-RPC defines as strings.
//! - Transport-level failures come back as `<fault>` structs, distinct from
//!   the in-band `{Status, …}` envelope carried by successful documents.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{XenError, XenResult};

// ── Request encoding ─────────────────────────────────────────────────────────

/// Escape text content for embedding in an XML body.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serialize one call as an XML-RPC `<methodCall>` document.
pub fn encode_method_call(method: &str, params: &[Value]) -> XenResult<String> {
    let mut body = String::with_capacity(256);
    body.push_str("<?xml version=\"1.0\"?>");
    body.push_str("<methodCall><methodName>");
    body.push_str(&xml_escape(method));
    body.push_str("</methodName><params>");
    for param in params {
        body.push_str("<param>");
        write_value(&mut body, param)?;
        body.push_str("</param>");
    }
    body.push_str("</params></methodCall>");
    Ok(body)
}

fn write_value(body: &mut String, value: &Value) -> XenResult<()> {
    body.push_str("<value>");
    match value {
        Value::Null => body.push_str("<nil/>"),
        Value::Bool(b) => {
            body.push_str("<boolean>");
            body.push_str(if *b { "1" } else { "0" });
            body.push_str("</boolean>");
        }
        Value::Number(n) => write_number(body, n)?,
        Value::String(s) => {
            body.push_str("<string>");
            body.push_str(&xml_escape(s));
            body.push_str("</string>");
        }
        Value::Array(items) => {
            body.push_str("<array><data>");
            for item in items {
                write_value(body, item)?;
            }
            body.push_str("</data></array>");
        }
        Value::Object(map) => {
            body.push_str("<struct>");
            for (name, item) in map {
                body.push_str("<member><name>");
                body.push_str(&xml_escape(name));
                body.push_str("</name>");
                write_value(body, item)?;
                body.push_str("</member>");
            }
            body.push_str("</struct>");
        }
    }
    body.push_str("</value>");
    Ok(())
}

fn write_number(body: &mut String, n: &serde_json::Number) -> XenResult<()> {
    if let Some(i) = n.as_i64() {
        // The wire <int> is four bytes; anything wider rides as a string,
        // which is how the server itself encodes 64-bit quantities.
        if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
            body.push_str("<int>");
            body.push_str(&i.to_string());
            body.push_str("</int>");
        } else {
            body.push_str("<string>");
            body.push_str(&i.to_string());
            body.push_str("</string>");
        }
    } else if let Some(u) = n.as_u64() {
        body.push_str("<string>");
        body.push_str(&u.to_string());
        body.push_str("</string>");
    } else if let Some(x) = n.as_f64() {
        body.push_str("<double>");
        body.push_str(&x.to_string());
        body.push_str("</double>");
    } else {
        return Err(XenError::Parse(format!("unrepresentable number {}", n)));
    }
    Ok(())
}

// ── Response parsing ─────────────────────────────────────────────────────────

/// Decoded `<methodResponse>` document.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcResponse {
    /// `<params>` response carrying the single result value.
    Success(Value),
    /// `<fault>` response.
    Fault { code: i64, message: String },
}

/// Scalar type elements recognized inside `<value>`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scalar {
    Str,
    Int,
    Boolean,
    Double,
    /// `dateTime.iso8601` / `base64`, surfaced verbatim as strings.
    Raw,
    Nil,
}

fn scalar_for(tag: &[u8]) -> Option<Scalar> {
    match tag {
        b"string" => Some(Scalar::Str),
        b"int" | b"i4" | b"i8" => Some(Scalar::Int),
        b"boolean" => Some(Scalar::Boolean),
        b"double" => Some(Scalar::Double),
        b"dateTime.iso8601" | b"base64" => Some(Scalar::Raw),
        b"nil" => Some(Scalar::Nil),
        _ => None,
    }
}

fn scalar_value(tag: Scalar, text: String) -> XenResult<Value> {
    match tag {
        Scalar::Str | Scalar::Raw => Ok(Value::String(text)),
        Scalar::Int => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| XenError::Parse(format!("invalid integer '{}'", text))),
        Scalar::Boolean => match text.trim() {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(XenError::Parse(format!("invalid boolean '{}'", other))),
        },
        Scalar::Double => {
            let parsed = text
                .trim()
                .parse::<f64>()
                .map_err(|_| XenError::Parse(format!("invalid double '{}'", text)))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| XenError::Parse(format!("non-finite double '{}'", text)))
        }
        Scalar::Nil => Ok(Value::Null),
    }
}

/// Partially built node while walking the value tree.
enum Frame {
    /// Inside `<value>`: bare text collected so far plus an optional typed payload.
    Value { typed: Option<Value>, text: String },
    /// Inside a scalar type element such as `<string>` or `<int>`.
    Scalar { tag: Scalar, text: String },
    /// Inside `<array>` (the `<data>` wrapper carries no state of its own).
    Array(Vec<Value>),
    /// Inside `<struct>`.
    Struct(Map<String, Value>),
    /// Inside `<member>`: pending name and value.
    Member { name: Option<String>, value: Option<Value> },
    /// Inside `<name>`.
    Name(String),
}

/// Attach a finished value to the innermost open container, or hand it back
/// as the document's result when no container is open.
fn attach(stack: &mut Vec<Frame>, value: Value) -> XenResult<Option<Value>> {
    match stack.last_mut() {
        None => Ok(Some(value)),
        Some(Frame::Array(items)) => {
            items.push(value);
            Ok(None)
        }
        Some(Frame::Member { value: slot, .. }) => {
            if slot.is_some() {
                return Err(XenError::Parse("struct member with two values".into()));
            }
            *slot = Some(value);
            Ok(None)
        }
        Some(_) => Err(XenError::Parse("misplaced <value> element".into())),
    }
}

/// Record the typed payload of the enclosing `<value>`.
fn set_typed(stack: &mut Vec<Frame>, value: Value) -> XenResult<()> {
    match stack.last_mut() {
        Some(Frame::Value { typed, .. }) => {
            if typed.is_some() {
                return Err(XenError::Parse("value with two type elements".into()));
            }
            *typed = Some(value);
            Ok(())
        }
        _ => Err(XenError::Parse("type element outside <value>".into())),
    }
}

/// Parse an XML-RPC `<methodResponse>` document.
///
/// Returns as soon as the top-level value completes; anything structurally
/// malformed, including a document that ends early, is a parse error naming
/// the reader position where known.
pub fn parse_method_response(xml: &str) -> XenResult<XmlRpcResponse> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut saw_response = false;
    let mut in_fault = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"methodResponse" => saw_response = true,
                    b"params" | b"param" | b"data" => {}
                    b"fault" => in_fault = true,
                    b"value" => {
                        if !saw_response {
                            return Err(XenError::Parse("not a methodResponse document".into()));
                        }
                        stack.push(Frame::Value { typed: None, text: String::new() });
                    }
                    b"array" => stack.push(Frame::Array(Vec::new())),
                    b"struct" => stack.push(Frame::Struct(Map::new())),
                    b"member" => stack.push(Frame::Member { name: None, value: None }),
                    b"name" => stack.push(Frame::Name(String::new())),
                    other => match scalar_for(other) {
                        Some(tag) => stack.push(Frame::Scalar { tag, text: String::new() }),
                        None => {
                            return Err(XenError::Parse(format!(
                                "unexpected element <{}> at position {}",
                                String::from_utf8_lossy(other),
                                reader.buffer_position()
                            )))
                        }
                    },
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"value" => {
                        if !saw_response {
                            return Err(XenError::Parse("not a methodResponse document".into()));
                        }
                        // <value/> is the empty string
                        if let Some(result) = attach(&mut stack, Value::String(String::new()))? {
                            return Ok(finish(in_fault, result));
                        }
                    }
                    b"array" => set_typed(&mut stack, Value::Array(Vec::new()))?,
                    b"struct" => set_typed(&mut stack, Value::Object(Map::new()))?,
                    b"params" | b"param" | b"data" => {}
                    b"fault" => in_fault = true,
                    other => match scalar_for(other) {
                        Some(tag) => set_typed(&mut stack, scalar_value(tag, String::new())?)?,
                        None => {
                            return Err(XenError::Parse(format!(
                                "unexpected element <{}/> at position {}",
                                String::from_utf8_lossy(other),
                                reader.buffer_position()
                            )))
                        }
                    },
                }
            }
            Ok(Event::Text(ref e)) => {
                let chunk = e.unescape().map_err(|err| {
                    XenError::Parse(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        err
                    ))
                })?;
                match stack.last_mut() {
                    Some(Frame::Value { text, .. })
                    | Some(Frame::Scalar { text, .. }) => text.push_str(&chunk),
                    Some(Frame::Name(text)) => text.push_str(&chunk),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"value" => match stack.pop() {
                        Some(Frame::Value { typed, text }) => {
                            let value = match typed {
                                Some(value) => value,
                                None => Value::String(text),
                            };
                            if let Some(result) = attach(&mut stack, value)? {
                                return Ok(finish(in_fault, result));
                            }
                        }
                        _ => return Err(XenError::Parse("mismatched </value>".into())),
                    },
                    b"array" => match stack.pop() {
                        Some(Frame::Array(items)) => set_typed(&mut stack, Value::Array(items))?,
                        _ => return Err(XenError::Parse("mismatched </array>".into())),
                    },
                    b"struct" => match stack.pop() {
                        Some(Frame::Struct(map)) => set_typed(&mut stack, Value::Object(map))?,
                        _ => return Err(XenError::Parse("mismatched </struct>".into())),
                    },
                    b"member" => match stack.pop() {
                        Some(Frame::Member { name: Some(name), value: Some(value) }) => {
                            match stack.last_mut() {
                                Some(Frame::Struct(map)) => {
                                    map.insert(name, value);
                                }
                                _ => {
                                    return Err(XenError::Parse(
                                        "<member> outside <struct>".into(),
                                    ))
                                }
                            }
                        }
                        Some(Frame::Member { .. }) => {
                            return Err(XenError::Parse("incomplete struct member".into()))
                        }
                        _ => return Err(XenError::Parse("mismatched </member>".into())),
                    },
                    b"name" => match stack.pop() {
                        Some(Frame::Name(text)) => match stack.last_mut() {
                            Some(Frame::Member { name, .. }) => *name = Some(text),
                            _ => return Err(XenError::Parse("<name> outside <member>".into())),
                        },
                        _ => return Err(XenError::Parse("mismatched </name>".into())),
                    },
                    other => match scalar_for(other) {
                        Some(_) => match stack.pop() {
                            Some(Frame::Scalar { tag, text }) => {
                                set_typed(&mut stack, scalar_value(tag, text)?)?
                            }
                            _ => {
                                return Err(XenError::Parse(format!(
                                    "mismatched </{}>",
                                    String::from_utf8_lossy(other)
                                )))
                            }
                        },
                        // methodResponse / params / param / data / fault
                        None => {}
                    },
                }
            }
            Ok(Event::Eof) => {
                return Err(XenError::Parse(
                    "response ended before a result value".into(),
                ))
            }
            Err(err) => {
                return Err(XenError::Parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    err
                )))
            }
            _ => {}
        }
    }
}

fn finish(in_fault: bool, value: Value) -> XmlRpcResponse {
    if !in_fault {
        return XmlRpcResponse::Success(value);
    }
    let code = value.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
    // Keep the server's own words even when the fault value is not the
    // usual {faultCode, faultString} struct.
    let message = match value {
        Value::Object(mut members) => match members.remove("faultString") {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => Value::Object(members).to_string(),
        },
        Value::String(text) => text,
        other => other.to_string(),
    };
    XmlRpcResponse::Fault { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escape_covers_the_five_entities() {
        assert_eq!(xml_escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn encode_builds_a_canonical_login_call() {
        let body = encode_method_call(
            "session.login_with_password",
            &[json!("root"), json!("secret")],
        )
        .unwrap();
        assert_eq!(
            body,
            "<?xml version=\"1.0\"?><methodCall>\
             <methodName>session.login_with_password</methodName>\
             <params><param><value><string>root</string></value></param>\
             <param><value><string>secret</string></value></param>\
             </params></methodCall>"
        );
    }

    #[test]
    fn encode_maps_each_scalar_type() {
        let body = encode_method_call(
            "VM.start",
            &[json!("OpaqueRef:vm1"), json!(false), json!(7), json!(1.5), json!(null)],
        )
        .unwrap();
        assert!(body.contains("<value><string>OpaqueRef:vm1</string></value>"));
        assert!(body.contains("<value><boolean>0</boolean></value>"));
        assert!(body.contains("<value><int>7</int></value>"));
        assert!(body.contains("<value><double>1.5</double></value>"));
        assert!(body.contains("<value><nil/></value>"));
    }

    #[test]
    fn encode_nests_arrays_and_structs() {
        let body = encode_method_call(
            "event.register",
            &[json!(["vm", "task"]), json!({ "classes": ["*"] })],
        )
        .unwrap();
        assert!(body.contains(
            "<value><array><data>\
             <value><string>vm</string></value>\
             <value><string>task</string></value>\
             </data></array></value>"
        ));
        assert!(body.contains(
            "<value><struct><member><name>classes</name>\
             <value><array><data><value><string>*</string></value></data></array></value>\
             </member></struct></value>"
        ));
    }

    #[test]
    fn encode_escapes_text_content() {
        let body = encode_method_call("VM.set_name_label", &[json!("a<b>&\"c'")]).unwrap();
        assert!(body.contains("<string>a&lt;b&gt;&amp;&quot;c&apos;</string>"));
    }

    #[test]
    fn encode_sends_wide_integers_as_strings() {
        let body = encode_method_call("VM.set_memory", &[json!(8_589_934_592i64)]).unwrap();
        assert!(body.contains("<value><string>8589934592</string></value>"));
        let body = encode_method_call("VM.set_memory", &[json!(u64::MAX)]).unwrap();
        assert!(body.contains(&format!("<value><string>{}</string></value>", u64::MAX)));
    }

    #[test]
    fn parse_reads_untyped_values_as_strings() {
        // Verbatim shape of a XenServer login response: bare text, no <string>.
        let xml = "<?xml version=\"1.0\"?>\n\
            <methodResponse><params><param><value><struct>\n\
            <member><name>Status</name><value>Success</value></member>\n\
            <member><name>Value</name><value>OpaqueRef:86f1a7a4</value></member>\n\
            </struct></value></param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(
            parsed,
            XmlRpcResponse::Success(json!({
                "Status": "Success",
                "Value": "OpaqueRef:86f1a7a4",
            }))
        );
    }

    #[test]
    fn parse_reads_typed_scalars() {
        let xml = "<methodResponse><params><param><value><array><data>\
            <value><int>42</int></value>\
            <value><i4>-7</i4></value>\
            <value><i8>8589934592</i8></value>\
            <value><boolean>1</boolean></value>\
            <value><boolean>0</boolean></value>\
            <value><double>2.5</double></value>\
            <value><dateTime.iso8601>20260823T10:00:00</dateTime.iso8601></value>\
            <value><base64>aGVsbG8=</base64></value>\
            <value><nil/></value>\
            </data></array></value></param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(
            parsed,
            XmlRpcResponse::Success(json!([
                42,
                -7,
                8589934592i64,
                true,
                false,
                2.5,
                "20260823T10:00:00",
                "aGVsbG8=",
                null,
            ]))
        );
    }

    #[test]
    fn parse_reads_empty_values_as_empty_strings() {
        let xml = "<methodResponse><params><param><value><array><data>\
            <value></value><value/>\
            </data></array></value></param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(parsed, XmlRpcResponse::Success(json!(["", ""])));
    }

    #[test]
    fn parse_handles_a_toplevel_bare_value() {
        let xml = "<methodResponse><params><param>\
            <value>true</value>\
            </param></params></methodResponse>";
        // Untyped text is a string even when it looks like a boolean.
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(parsed, XmlRpcResponse::Success(json!("true")));
    }

    #[test]
    fn parse_reads_nested_records() {
        let xml = "<methodResponse><params><param><value><array><data>\
            <value><struct>\
            <member><name>name_label</name><value>web-01</value></member>\
            <member><name>is_a_template</name><value><boolean>0</boolean></value></member>\
            <member><name>VCPUs_max</name><value><int>4</int></value></member>\
            <member><name>tags</name><value><array><data>\
            <value>prod</value><value>web</value>\
            </data></array></value></member>\
            </struct></value>\
            </data></array></value></param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(
            parsed,
            XmlRpcResponse::Success(json!([{
                "name_label": "web-01",
                "is_a_template": false,
                "VCPUs_max": 4,
                "tags": ["prod", "web"],
            }]))
        );
    }

    #[test]
    fn parse_unescapes_entities() {
        let xml = "<methodResponse><params><param>\
            <value><string>a&lt;b&amp;c&gt;d</string></value>\
            </param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(parsed, XmlRpcResponse::Success(json!("a<b&c>d")));
    }

    #[test]
    fn parse_surfaces_faults() {
        let xml = "<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>-32601</int></value></member>\
            <member><name>faultString</name><value>server error. requested method not found</value></member>\
            </struct></value></fault></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(
            parsed,
            XmlRpcResponse::Fault {
                code: -32601,
                message: "server error. requested method not found".to_string(),
            }
        );
    }

    #[test]
    fn parse_keeps_the_text_of_a_degenerate_fault() {
        // A bare scalar where the {faultCode, faultString} struct belongs.
        let xml = "<methodResponse><fault><value>boom</value></fault></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        assert_eq!(
            parsed,
            XmlRpcResponse::Fault {
                code: 0,
                message: "boom".to_string(),
            }
        );

        // A struct with a code but no faultString keeps its own rendering.
        let xml = "<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>500</int></value></member>\
            </struct></value></fault></methodResponse>";
        match parse_method_response(xml).unwrap() {
            XmlRpcResponse::Fault { code, message } => {
                assert_eq!(code, 500);
                assert!(message.contains("500"), "{}", message);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_malformed_documents() {
        let truncated = "<methodResponse><params><param><value><struct>";
        assert!(matches!(
            parse_method_response(truncated),
            Err(XenError::Parse(_))
        ));

        let unknown = "<methodResponse><params><param><value><widget>1</widget></value></param></params></methodResponse>";
        assert!(matches!(
            parse_method_response(unknown),
            Err(XenError::Parse(_))
        ));

        let bad_int = "<methodResponse><params><param><value><int>forty</int></value></param></params></methodResponse>";
        assert!(matches!(
            parse_method_response(bad_int),
            Err(XenError::Parse(_))
        ));

        let empty_params = "<methodResponse><params></params></methodResponse>";
        assert!(matches!(
            parse_method_response(empty_params),
            Err(XenError::Parse(_))
        ));

        let not_a_response = "<methodCall><methodName>VM.get_all</methodName></methodCall>";
        assert!(matches!(
            parse_method_response(not_a_response),
            Err(XenError::Parse(_))
        ));
    }

    #[test]
    fn parsed_envelope_deserializes_into_method_response() {
        let xml = "<methodResponse><params><param><value><struct>\
            <member><name>Status</name><value>Failure</value></member>\
            <member><name>ErrorDescription</name><value><array><data>\
            <value>SESSION_AUTHENTICATION_FAILED</value>\
            <value>root</value>\
            <value>Authentication failure</value>\
            </data></array></value></member>\
            </struct></value></param></params></methodResponse>";
        let parsed = parse_method_response(xml).unwrap();
        let value = match parsed {
            XmlRpcResponse::Success(value) => value,
            XmlRpcResponse::Fault { .. } => panic!("fault from a params document"),
        };
        let envelope: crate::types::MethodResponse = serde_json::from_value(value).unwrap();
        assert_eq!(
            envelope.into_result(),
            Err("SESSION_AUTHENTICATION_FAILED".to_string())
        );
    }
}
