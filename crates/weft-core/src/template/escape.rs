use crate::value::Value;

/// Escaping helper used for `{{ }}` (escape = true) and `{#html}` (escape = false).
pub type EscapeFn = fn(&Value, bool) -> String;

/// Converts a value to markup text.
///
/// Nullish values become empty. Functions are invoked and their result is
/// escaped. Arrays are escaped element-wise and joined with `,`; an array
/// nested in itself contributes nothing.
pub fn escape_html(input: &Value, escape: bool) -> String {
    escape_within(input, escape, &mut Vec::new())
}

fn escape_within(input: &Value, escape: bool, open: &mut Vec<*const ()>) -> String {
    match input {
        Value::Undefined | Value::Null => String::new(),
        Value::Function(f) => escape_within(&f.call(&[]), true, open),
        Value::Array(items) => {
            let ptr = input.container_ptr();
            if open.contains(&ptr) {
                return String::new();
            }
            open.push(ptr);
            let joined = items
                .borrow()
                .iter()
                .map(|item| escape_within(item, true, open))
                .collect::<Vec<_>>()
                .join(",");
            open.pop();
            joined
        }
        other => {
            let text = other.to_string();
            if !escape || !text.contains(['&', '<', '>', '"', '\'']) {
                return text;
            }
            let mut out = String::with_capacity(text.len() + 16);
            for ch in text.chars() {
                match ch {
                    '&' => out.push_str("&amp;"),
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '"' => out.push_str("&quot;"),
                    '\'' => out.push_str("&#039;"),
                    c => out.push(c),
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(&Value::from(r#"<a href="x">'&'</a>"#), true),
            "&lt;a href=&quot;x&quot;&gt;&#039;&amp;&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn raw_mode_leaves_text_alone() {
        assert_eq!(escape_html(&Value::from("<b>"), false), "<b>");
    }

    #[test]
    fn nullish_is_empty() {
        assert_eq!(escape_html(&Value::Null, true), "");
        assert_eq!(escape_html(&Value::Undefined, false), "");
    }

    #[test]
    fn functions_are_invoked_and_escaped() {
        let f = Value::function(|_| Value::from("<i>"));
        assert_eq!(escape_html(&f, false), "&lt;i&gt;");
    }

    #[test]
    fn arrays_escape_each_element() {
        let v = Value::array(vec![Value::from("<"), Value::Null, Value::from(2)]);
        assert_eq!(escape_html(&v, true), "&lt;,,2");
    }
}
