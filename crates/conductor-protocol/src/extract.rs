use serde_json::Value;

/// Scans `text` for the first balanced `{...}` span and parses it as JSON.
/// Brace/bracket counting is string-and-escape aware so a `}` inside a
/// quoted string doesn't end the object early.
///
/// Returns the parsed value together with the byte range it occupied in
/// `text`, so callers can strip it back out to recover the surrounding
/// prose (used to synthesize a `message` field when the object lacks one).
pub fn extract_json_object(text: &str) -> Option<(Value, std::ops::Range<usize>)> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = offset + 1;
                    let span = &text[start..end];
                    if let Ok(value) = serde_json::from_str::<Value>(span) {
                        return Some((value, start..end));
                    }
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes the byte range `span` from `text` and trims the remainder,
/// used to recover the prose around an extracted JSON object.
pub fn strip_span(text: &str, span: &std::ops::Range<usize>) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..span.start]);
    out.push_str(&text[span.end..]);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_object() {
        let text = r#"here you go {"message": "hi", "n": 1} thanks"#;
        let (value, span) = extract_json_object(text).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(&text[span.clone()], r#"{"message": "hi", "n": 1}"#);
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = r#"{"message": "use a {} here"}"#;
        let (value, _) = extract_json_object(text).unwrap();
        assert_eq!(value["message"], "use a {} here");
    }

    #[test]
    fn returns_none_for_plain_text() {
        assert!(extract_json_object("just plain text, no json here").is_none());
    }

    #[test]
    fn strip_span_recovers_surrounding_prose() {
        let text = r#"Sure thing. {"message": "ok"} Let me know if you need more."#;
        let (_, span) = extract_json_object(text).unwrap();
        let stripped = strip_span(text, &span);
        assert_eq!(stripped, "Sure thing.  Let me know if you need more.");
    }
}
