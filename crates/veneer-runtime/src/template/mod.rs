//! Response body and header templating.
//!
//! Rendering is a structure-preserving deep walk over the response tree:
//! objects recurse per key, arrays per element, strings are substituted,
//! other scalars pass through unchanged. Two independent passes run:
//!
//! - **Pass A** substitutes request-context placeholders (`{{params.x}}`,
//!   `{{query.x}}`, `{{body.x}}`, `{{headers.x}}`) and the special tokens
//!   `{{timestamp}}`, `{{date}}`, `{{uuid}}`, `{{randomInt}}`.
//! - **Pass B** expands `{{faker.module.method}}` synthetic-data
//!   placeholders (see [`synth`]), and only runs when the tree contains one.
//!
//! When an entire string is a single placeholder, the produced value keeps
//! its JSON type (a substituted `"3"` becomes the number `3`, a `body.x`
//! object stays an object). Unresolvable placeholders are left as literal
//! text; rendering never fails.

pub mod synth;

use crate::context::RequestContext;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static CONTEXT_REGEX: OnceLock<Regex> = OnceLock::new();

fn context_regex() -> &'static Regex {
    CONTEXT_REGEX.get_or_init(|| {
        Regex::new(
            r"\{\{\s*(?:(params|query|headers|body)\.([A-Za-z0-9_][A-Za-z0-9_.-]*)|(timestamp|date|uuid|randomInt))\s*\}\}",
        )
        .unwrap()
    })
}

/// Render a response body tree against the request context (both passes).
pub fn render(value: &Value, ctx: &RequestContext) -> Value {
    let substituted = walk(value, ctx);
    if synth::has_synthetic_placeholders(&substituted) {
        synth::expand(&substituted)
    } else {
        substituted
    }
}

/// Render a header map's values. Headers stay strings, so substitution is
/// always string-level; synthetic placeholders expand too.
pub fn render_headers(
    headers: &std::collections::HashMap<String, String>,
    ctx: &RequestContext,
) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let substituted = substitute_string(v, ctx);
            let value = if substituted.contains("{{faker.") {
                synth::expand_text(&substituted)
            } else {
                substituted
            };
            (k.clone(), value)
        })
        .collect()
}

fn walk(value: &Value, ctx: &RequestContext) -> Value {
    match value {
        Value::String(s) => render_string(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_string(s: &str, ctx: &RequestContext) -> Value {
    let regex = context_regex();

    // Whole-string single placeholder: preserve the resolved value's type.
    if let Some(caps) = regex.captures(s) {
        if caps.get(0).map(|m| m.as_str() == s).unwrap_or(false) {
            if let Some(resolved) = resolve(&caps, ctx) {
                return typed_value(resolved);
            }
            return Value::String(s.to_string());
        }
    }

    Value::String(substitute_string(s, ctx))
}

/// String-level interpolation; unresolvable placeholders stay literal.
fn substitute_string(s: &str, ctx: &RequestContext) -> String {
    context_regex()
        .replace_all(s, |caps: &regex::Captures| match resolve(caps, ctx) {
            Some(Resolved::Text(text)) => text,
            // Strings from the body interpolate bare; compound values keep
            // their JSON rendering.
            Some(Resolved::Tree(Value::String(text))) => text,
            Some(Resolved::Tree(value)) => value.to_string(),
            None => caps[0].to_string(),
        })
        .to_string()
}

enum Resolved {
    Text(String),
    Tree(Value),
}

fn resolve(caps: &regex::Captures, ctx: &RequestContext) -> Option<Resolved> {
    if let Some(token) = caps.get(3) {
        let text = match token.as_str() {
            "timestamp" => chrono::Utc::now().timestamp_millis().to_string(),
            "date" => chrono::Utc::now().format("%Y-%m-%d").to_string(),
            "uuid" => uuid::Uuid::new_v4().to_string(),
            "randomInt" => {
                use rand::Rng;
                rand::thread_rng().gen_range(0..10_000).to_string()
            }
            _ => return None,
        };
        return Some(Resolved::Text(text));
    }

    let source = caps.get(1)?.as_str();
    let key = caps.get(2)?.as_str();

    match source {
        "params" => ctx.path_params.get(key).cloned().map(Resolved::Text),
        "query" => ctx.query.get(key).cloned().map(Resolved::Text),
        "headers" => ctx.header(key).map(|v| Resolved::Text(v.to_string())),
        "body" => lookup_body_path(&ctx.body, key).map(Resolved::Tree),
        _ => None,
    }
}

/// Dotted-path lookup into the request body; numeric segments index arrays.
fn lookup_body_path(body: &Value, path: &str) -> Option<Value> {
    let mut current = body;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn typed_value(resolved: Resolved) -> Value {
    match resolved {
        Resolved::Tree(value) => value,
        Resolved::Text(text) => {
            // A value that parses as JSON keeps its type ("3" -> 3,
            // "true" -> true); anything else stays a string.
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn test_ctx() -> RequestContext {
        let mut ctx = RequestContext::new(
            "POST",
            "/users/42",
            [("page".to_string(), "3".to_string())].into_iter().collect(),
            [("x-request-id".to_string(), "req-9".to_string())]
                .into_iter()
                .collect(),
            json!({"user": {"name": "Ada"}, "tags": ["a", "b"]}),
        );
        ctx.path_params.insert("id".to_string(), "42".to_string());
        ctx
    }

    #[test]
    fn test_params_substitution() {
        let rendered = render(&json!({"id": "{{params.id}}"}), &test_ctx());
        // whole-string placeholder parsing as JSON preserves the number
        assert_eq!(rendered, json!({"id": 42}));
    }

    #[test]
    fn test_query_whole_string_type_preservation() {
        let rendered = render(&json!("{{query.page}}"), &test_ctx());
        assert_eq!(rendered, json!(3));
    }

    #[test]
    fn test_interpolation_stays_string() {
        let rendered = render(&json!("page {{query.page}} of 10"), &test_ctx());
        assert_eq!(rendered, json!("page 3 of 10"));
    }

    #[test]
    fn test_body_path_yields_tree() {
        let rendered = render(&json!("{{body.user}}"), &test_ctx());
        assert_eq!(rendered, json!({"name": "Ada"}));

        let rendered = render(&json!("{{body.tags.1}}"), &test_ctx());
        assert_eq!(rendered, json!("b"));
    }

    #[test]
    fn test_body_string_interpolates_bare() {
        let rendered = render(&json!("hi {{body.user.name}}!"), &test_ctx());
        assert_eq!(rendered, json!("hi Ada!"));
    }

    #[test]
    fn test_headers_substitution() {
        let rendered = render(&json!({"rid": "{{headers.x-request-id}}"}), &test_ctx());
        assert_eq!(rendered, json!({"rid": "req-9"}));
    }

    #[test]
    fn test_unresolvable_stays_literal() {
        let rendered = render(&json!("{{query.missing}}"), &test_ctx());
        assert_eq!(rendered, json!("{{query.missing}}"));
    }

    #[test]
    fn test_non_string_scalars_untouched() {
        let rendered = render(&json!({"n": 7, "b": true, "z": null}), &test_ctx());
        assert_eq!(rendered, json!({"n": 7, "b": true, "z": null}));
    }

    #[test]
    fn test_uuid_token() {
        let rendered = render(&json!("{{uuid}}"), &test_ctx());
        let s = rendered.as_str().unwrap();
        assert!(uuid::Uuid::parse_str(s).is_ok());
    }

    #[test]
    fn test_random_int_token() {
        let rendered = render(&json!("{{randomInt}}"), &test_ctx());
        assert!(rendered.is_number());
    }

    #[test]
    fn test_date_token_format() {
        let rendered = render(&json!("today: {{date}}"), &test_ctx());
        let s = rendered.as_str().unwrap();
        assert!(s.starts_with("today: 2"));
        assert_eq!(s.len(), "today: ".len() + 10);
    }

    #[test]
    fn test_render_headers() {
        let headers: HashMap<String, String> =
            [("x-echo-page".to_string(), "{{query.page}}".to_string())]
                .into_iter()
                .collect();
        let rendered = render_headers(&headers, &test_ctx());
        assert_eq!(rendered.get("x-echo-page"), Some(&"3".to_string()));
    }

    #[test]
    fn test_nested_arrays_and_objects() {
        let body = json!({
            "items": [
                {"owner": "{{params.id}}"},
                {"owner": "{{params.id}}"}
            ]
        });
        let rendered = render(&body, &test_ctx());
        assert_eq!(rendered["items"][0]["owner"], json!(42));
        assert_eq!(rendered["items"][1]["owner"], json!(42));
    }
}
