//! HTTP semantics helpers.
//!
//! Tools are advertised with MCP `ToolAnnotations` derived from the HTTP method of the upstream
//! call they make, so clients can tell read-only lookups from state-changing commands.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Generate MCP tool annotations based on HTTP method semantics.
///
/// Notes:
/// - `openWorldHint` is always `true`: every tool talks to the upstream Sonarr instance.
/// - `POST` is treated as non-idempotent. Sonarr commands and series creation both change
///   upstream state on every successful call.
/// - For unknown/extension methods only `openWorldHint` is set.
#[must_use]
pub fn annotations_for_method(method: &Method, title: Option<&str>) -> ToolAnnotations {
    let (read_only_hint, destructive_hint, idempotent_hint) = match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => (Some(true), Some(false), Some(true)),
        Method::POST => (Some(false), Some(false), Some(false)),
        Method::PUT | Method::DELETE => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        Method::PATCH => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title: title.map(str::to_string),
        read_only_hint,
        destructive_hint,
        idempotent_hint,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::annotations_for_method;
    use reqwest::Method;

    #[test]
    fn get_is_readonly_and_idempotent() {
        let a = annotations_for_method(&Method::GET, Some("Series list"));
        assert_eq!(a.title.as_deref(), Some("Series list"));
        assert_eq!(a.read_only_hint, Some(true));
        assert_eq!(a.destructive_hint, Some(false));
        assert_eq!(a.idempotent_hint, Some(true));
        assert_eq!(a.open_world_hint, Some(true));
    }

    #[test]
    fn post_is_mutating_and_not_idempotent() {
        let a = annotations_for_method(&Method::POST, None);
        assert_eq!(a.read_only_hint, Some(false));
        assert_eq!(a.idempotent_hint, Some(false));
        assert_eq!(a.title, None);
    }

    #[test]
    fn unknown_method_only_sets_open_world() {
        let custom: Method = "PROPFIND".parse().expect("valid method token");
        let a = annotations_for_method(&custom, None);
        assert_eq!(a.read_only_hint, None);
        assert_eq!(a.destructive_hint, None);
        assert_eq!(a.idempotent_hint, None);
        assert_eq!(a.open_world_hint, Some(true));
    }
}
