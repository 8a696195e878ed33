// ABOUTME: Go-text/template-style {{ .NAME }} string interpolation against exported bindings

use crate::env::ExportValue;
use std::collections::HashMap;

/// Substitutes every `{{ .NAME }}` placeholder in `template` with the
/// stringified value of `NAME` from `bindings`, and evaluates
/// `{{if .NAME}}...{{end}}` blocks by the same truthiness rule the evaluator
/// uses (missing name or a `false`/`null`/empty export hides the block).
/// Unknown placeholders are left as empty strings rather than erroring,
/// matching the original implementation's best-effort interpolation used for
/// building ad-hoc argument strings such as `tee("out-{{ .i }}.txt")`.
pub fn render(template: &str, bindings: &HashMap<String, ExportValue>) -> String {
    let mut out = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("{{") {
            if let Some(end) = template[i..].find("}}") {
                let inner = template[i + 2..i + end].trim();
                if let Some(cond) = inner.strip_prefix("if ") {
                    let (body, consumed) = extract_if_block(&template[i + end + 2..]);
                    if is_truthy(cond.trim(), bindings) {
                        out.push_str(&render(&body, bindings));
                    }
                    i += end + 2 + consumed;
                    continue;
                }
                out.push_str(&resolve(inner, bindings));
                i += end + 2;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn resolve(placeholder: &str, bindings: &HashMap<String, ExportValue>) -> String {
    let name = placeholder.trim_start_matches('.').trim();
    bindings.get(name).map(|v| v.to_string()).unwrap_or_default()
}

fn is_truthy(placeholder: &str, bindings: &HashMap<String, ExportValue>) -> bool {
    let name = placeholder.trim_start_matches('.').trim();
    match bindings.get(name) {
        None => false,
        Some(ExportValue::Null) => false,
        Some(ExportValue::Boolean(b)) => *b,
        Some(ExportValue::String(s)) => !s.is_empty(),
        Some(ExportValue::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Given the text right after `{{if ...}}`, finds the matching `{{end}}`,
/// returning the block body and how many bytes (including `{{end}}`) were
/// consumed. Does not support nested `if` blocks.
fn extract_if_block(rest: &str) -> (String, usize) {
    match rest.find("{{end}}") {
        Some(pos) => (rest[..pos].to_string(), pos + "{{end}}".len()),
        None => (rest.to_string(), rest.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, ExportValue)]) -> HashMap<String, ExportValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn substitutes_simple_placeholder() {
        let b = bindings(&[("name", ExportValue::String("smoosh".into()))]);
        assert_eq!(render("hello {{ .name }}", &b), "hello smoosh");
    }

    #[test]
    fn unknown_placeholder_renders_empty() {
        let b = bindings(&[]);
        assert_eq!(render("x={{ .missing }}", &b), "x=");
    }

    #[test]
    fn integer_placeholder_renders_as_number() {
        let b = bindings(&[("count", ExportValue::Integer(7))]);
        assert_eq!(render("{{ .count }} items", &b), "7 items");
    }

    #[test]
    fn if_block_renders_when_truthy() {
        let b = bindings(&[("verbose", ExportValue::Boolean(true))]);
        assert_eq!(render("{{if .verbose}}loud{{end}}", &b), "loud");
    }

    #[test]
    fn if_block_hidden_when_falsy() {
        let b = bindings(&[("verbose", ExportValue::Boolean(false))]);
        assert_eq!(render("{{if .verbose}}loud{{end}}", &b), "");
    }

    #[test]
    fn if_block_hidden_when_name_missing() {
        let b = bindings(&[]);
        assert_eq!(render("[{{if .missing}}x{{end}}]", &b), "[]");
    }

    #[test]
    fn text_outside_placeholders_is_untouched() {
        let b = bindings(&[]);
        assert_eq!(render("plain text, no braces", &b), "plain text, no braces");
    }
}
