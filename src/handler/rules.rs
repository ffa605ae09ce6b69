//! Rule engine: path matching, `$<name>` template substitution, and
//! server/client state materialisation (§4.7.3).

use crate::config::Rule;
use crate::store::ResourceStore;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// The outcome of evaluating every rule against one request path.
pub struct RuleMatch {
    pub server_state: Map<String, Value>,
    pub client_state: Option<Map<String, Value>>,
    /// Cleared the moment any state entry fails to load its resource;
    /// downgrades the final HTTP status to 503 (§4.7.4/§7).
    pub valid: bool,
}

/// Iterates rules in order, substituting parameters and resolving each
/// rule's state entries against `store`.
pub fn evaluate(rules: &[Rule], path: &str, store: &dyn ResourceStore) -> RuleMatch {
    let mut server_state = Map::new();
    let mut client_state: Option<Map<String, Value>> = None;
    let mut valid = true;

    for rule in rules {
        let Some(captures) = rule.path.captures(path) else {
            continue;
        };

        let mut params: HashMap<String, String> = HashMap::new();
        params.insert("url".to_string(), path.to_string());
        for i in 1..captures.len() {
            if let Some(m) = captures.get(i) {
                params.insert(i.to_string(), m.as_str().to_string());
            }
        }
        for name in rule.path.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                params.insert(name.to_string(), m.as_str().to_string());
            }
        }

        for entry in &rule.state {
            let key = substitute(&entry.key, &params);
            let resource = substitute(&entry.resource, &params);

            let value = match store.load(&resource) {
                Ok(payloads) => {
                    let data: Vec<String> = payloads
                        .iter()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .collect();
                    json!({ "data": data, "error": "" })
                }
                Err(_) => {
                    valid = false;
                    json!({ "error": "unknown resource" })
                }
            };

            server_state.insert(key.clone(), value.clone());
            if entry.export {
                client_state
                    .get_or_insert_with(Map::new)
                    .insert(key, value);
            }
        }

        if rule.last {
            break;
        }
    }

    RuleMatch {
        server_state,
        client_state,
        valid,
    }
}

/// Replaces every `$<name>` occurrence. Longer keys are substituted
/// first so `$10` isn't clobbered by a `$1` replacement.
fn substitute(template: &str, params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut result = template.to_string();
    for key in keys {
        result = result.replace(&format!("${key}"), &params[key]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use regex::Regex;

    fn rule(path: &str, entries: Vec<(&str, &str, bool)>, last: bool) -> Rule {
        Rule {
            path: Regex::new(path).unwrap(),
            state: entries
                .into_iter()
                .map(|(key, resource, export)| crate::config::StateEntry {
                    key: key.to_string(),
                    resource: resource.to_string(),
                    export,
                })
                .collect(),
            last,
        }
    }

    #[test]
    fn named_capture_is_substituted() {
        let store = InMemoryStore::new();
        store.insert("posts/42", bytes::Bytes::from_static(b"{\"title\":\"t\"}"));
        let rules = vec![rule(
            r"^/post/(?P<id>\d+)$",
            vec![("post.$id", "posts/$id", true)],
            false,
        )];
        let result = evaluate(&rules, "/post/42", &store);
        assert!(result.valid);
        let client = result.client_state.unwrap();
        assert_eq!(
            client.get("post.42").unwrap(),
            &json!({"data": ["{\"title\":\"t\"}"], "error": ""})
        );
    }

    #[test]
    fn missing_resource_marks_invalid() {
        let store = InMemoryStore::new();
        let rules = vec![rule(
            r"^/post/(?P<id>\d+)$",
            vec![("post.$id", "posts/$id", true)],
            false,
        )];
        let result = evaluate(&rules, "/post/42", &store);
        assert!(!result.valid);
        let client = result.client_state.unwrap();
        assert_eq!(client.get("post.42").unwrap(), &json!({"error": "unknown resource"}));
    }

    #[test]
    fn no_match_leaves_state_empty() {
        let store = InMemoryStore::new();
        let rules = vec![rule(r"^/only$", vec![("k", "r", false)], false)];
        let result = evaluate(&rules, "/other", &store);
        assert!(result.server_state.is_empty());
        assert!(result.valid);
    }

    #[test]
    fn last_flag_stops_iteration() {
        let store = InMemoryStore::new();
        store.insert("a", bytes::Bytes::from_static(b"a"));
        store.insert("b", bytes::Bytes::from_static(b"b"));
        let rules = vec![
            rule(r"^/x$", vec![("first", "a", false)], true),
            rule(r"^/x$", vec![("second", "b", false)], false),
        ];
        let result = evaluate(&rules, "/x", &store);
        assert!(result.server_state.contains_key("first"));
        assert!(!result.server_state.contains_key("second"));
    }

    #[test]
    fn numeric_capture_substitution_prefers_longer_index() {
        let store = InMemoryStore::new();
        store.insert("r10", bytes::Bytes::from_static(b"x"));
        let many_groups = format!("^{}$", "(a)".repeat(10));
        let rules = vec![rule(&many_groups, vec![("k", "r$10", false)], false)];
        let path = "a".repeat(10);
        let result = evaluate(&rules, &path, &store);
        assert!(result.valid);
    }
}
