//! Text payload extraction from raw records.

use serde_json::Value;

use crate::constants::TEXT_FIELD;
use crate::error::{Result, TallyError};

/// Pull the `text` field out of a JSON record.
///
/// Invalid JSON, a non-object record, a missing field or a non-string value
/// are all [`TallyError::Parse`]; callers treat that as "no text".
pub fn extract_text(raw: &str) -> Result<String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| TallyError::Parse {
        reason: format!("invalid json: {err}"),
    })?;
    let Value::Object(mut fields) = value else {
        return Err(TallyError::Parse {
            reason: "record is not a json object".into(),
        });
    };
    match fields.remove(TEXT_FIELD) {
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(TallyError::Parse {
            reason: format!("`{TEXT_FIELD}` is {}, not a string", json_kind(&other)),
        }),
        None => Err(TallyError::Parse {
            reason: format!("no `{TEXT_FIELD}` field"),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_field() {
        let text = extract_text(r#"{"id": 7, "text": "Ruby 3.3 is out", "user": {"lang": "en"}}"#)
            .unwrap();
        assert_eq!(text, "Ruby 3.3 is out");
    }

    #[test]
    fn missing_or_misshapen_text_is_a_parse_error() {
        for raw in [
            r#"{"limit": {"track": 12}}"#,
            r#"{"text": 42}"#,
            r#"{"text": null}"#,
            r#"["text"]"#,
            r#"{"text": "unterminated"#,
            "",
        ] {
            assert!(
                matches!(extract_text(raw), Err(TallyError::Parse { .. })),
                "{raw:?}"
            );
        }
    }
}
