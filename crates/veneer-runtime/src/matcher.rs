//! Path template compilation and matching.
//!
//! Templates use `:name` for a single non-slash segment; literal segments
//! must match exactly and segment counts must agree. Candidate endpoints are
//! tried in catalog declaration order and the first structural match wins;
//! there is no specificity ranking, so catalog authors control precedence by
//! ordering.

use std::collections::HashMap;

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl PathTemplate {
    /// Compile a template like `/users/:id/posts/:postId`.
    pub fn compile(template: &str) -> Self {
        let normalized = normalize_path(template);
        let segments = normalized
            .split('/')
            .skip(1) // leading slash yields an empty first split
            .map(|part| match part.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(part.to_string()),
            })
            .collect();
        PathTemplate { segments }
    }

    /// Match a concrete request path, extracting named parameters.
    ///
    /// The path is normalized before matching, so `/users/1/` and `/users/1`
    /// behave identically (the root path `/` is never stripped).
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let normalized = normalize_path(path);
        let parts: Vec<&str> = normalized.split('/').skip(1).collect();

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
            }
        }

        Some(params)
    }

    /// Parameter names declared in the template, in order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

/// Normalize a path: ensure a leading slash, strip a single trailing slash.
/// The root path `/` is left untouched.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().to_string();

    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let template = PathTemplate::compile("/users/active");
        assert!(template.match_path("/users/active").is_some());
        assert!(template.match_path("/users/42").is_none());
        assert!(template.match_path("/users").is_none());
    }

    #[test]
    fn test_param_extraction() {
        let template = PathTemplate::compile("/users/:id/posts/:postId");
        let params = template.match_path("/users/123/posts/456").unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));
        assert_eq!(params.get("postId"), Some(&"456".to_string()));
    }

    #[test]
    fn test_segment_count_must_agree() {
        let template = PathTemplate::compile("/users/:id");
        assert!(template.match_path("/users/1/extra").is_none());
        assert!(template.match_path("/users").is_none());
    }

    #[test]
    fn test_param_does_not_absorb_slash() {
        let template = PathTemplate::compile("/files/:name");
        assert!(template.match_path("/files/a/b").is_none());
    }

    #[test]
    fn test_trailing_slash_normalization() {
        let template = PathTemplate::compile("/users/:id");
        let with_slash = template.match_path("/users/7/").unwrap();
        let without = template.match_path("/users/7").unwrap();
        assert_eq!(with_slash, without);
    }

    #[test]
    fn test_missing_leading_slash() {
        let template = PathTemplate::compile("users/:id");
        assert!(template.match_path("users/9").is_some());
        assert!(template.match_path("/users/9").is_some());
    }

    #[test]
    fn test_root_path() {
        assert_eq!(normalize_path("/"), "/");
        let template = PathTemplate::compile("/");
        assert!(template.match_path("/").is_some());
    }

    #[test]
    fn test_declaration_order_wins_over_specificity() {
        // /users/:id declared before /users/active: the param template
        // captures "active" because evaluation stops at the first match.
        let first = PathTemplate::compile("/users/:id");
        let second = PathTemplate::compile("/users/active");

        let templates = [&first, &second];
        let matched = templates
            .iter()
            .find_map(|t| t.match_path("/users/active"))
            .unwrap();
        assert_eq!(matched.get("id"), Some(&"active".to_string()));
        // The literal template would also match, but is never reached.
        assert!(second.match_path("/users/active").is_some());
    }

    #[test]
    fn test_param_names() {
        let template = PathTemplate::compile("/a/:x/b/:y");
        assert_eq!(template.param_names(), vec!["x", "y"]);
    }
}
