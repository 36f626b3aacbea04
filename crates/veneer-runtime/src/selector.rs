//! Response-rule selection.
//!
//! Rules are evaluated in list order: the first rule whose match condition
//! is satisfied wins; otherwise the first `isDefault` rule; otherwise the
//! first rule in the list. Exactly one rule is ever returned.

use crate::catalog::types::{MatchCondition, ResponseRule};
use crate::context::RequestContext;
use serde_json::Value;

/// Pick the response rule for a request, or `None` when the endpoint
/// defines no responses at all.
pub fn select_response<'a>(
    responses: &'a [ResponseRule],
    ctx: &RequestContext,
) -> Option<&'a ResponseRule> {
    responses
        .iter()
        .find(|r| {
            r.match_condition
                .as_ref()
                .map(|m| condition_matches(m, ctx))
                .unwrap_or(false)
        })
        .or_else(|| responses.iter().find(|r| r.is_default))
        .or_else(|| responses.first())
}

/// Evaluate a match condition. All present sub-conditions must hold.
pub fn condition_matches(condition: &MatchCondition, ctx: &RequestContext) -> bool {
    // Query equality by string coercion: "1" and 1 compare equal. Type
    // distinctions are intentionally erased here; catalogs rely on it.
    if let Some(expected_query) = &condition.query {
        for (key, expected) in expected_query {
            match ctx.query.get(key) {
                Some(actual) if *actual == coerce_to_string(expected) => {}
                _ => return false,
            }
        }
    }

    // Header names compare case-insensitively, values exactly.
    if let Some(expected_headers) = &condition.headers {
        for (key, expected) in expected_headers {
            match ctx.header(key) {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }
    }

    // Deep structural equality against the request body.
    if let Some(expected_body) = &condition.body_equals {
        if ctx.body != *expected_body {
            return false;
        }
    }

    true
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
