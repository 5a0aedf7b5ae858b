//! Character and user names carried by a generation request.

use serde_json::{Map, Value};

/// Read-only view over the names a request uses for speaker attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptNames {
    pub char_name: String,
    pub user_name: String,
    pub group_names: Vec<String>,
}

impl PromptNames {
    /// Reads `char_name`, `user_name` and `group_names` from request parameters.
    ///
    /// Missing or mistyped fields fall back to empty values.
    #[must_use]
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let string = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let group_names = params
            .get("group_names")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            char_name: string("char_name"),
            user_name: string("user_name"),
            group_names,
        }
    }

    /// `true` if `text` already opens with `"<group member>: "`.
    #[must_use]
    pub fn starts_with_group_name(&self, text: &str) -> bool {
        self.group_names.iter().any(|name| {
            text.strip_prefix(name.as_str())
                .is_some_and(|rest| rest.starts_with(": "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_params() {
        let names = PromptNames::from_params(&params(json!({
            "char_name": "Alice",
            "user_name": "Bob",
            "group_names": ["Carol", "", 7, "Dave"]
        })));
        assert_eq!(names.char_name, "Alice");
        assert_eq!(names.user_name, "Bob");
        assert_eq!(names.group_names, vec!["Carol", "Dave"]);
    }

    #[test]
    fn test_from_params_missing_fields() {
        let names = PromptNames::from_params(&Map::new());
        assert_eq!(names, PromptNames::default());
    }

    #[test]
    fn test_starts_with_group_name() {
        let names = PromptNames {
            group_names: vec!["Carol".into()],
            ..PromptNames::default()
        };
        assert!(names.starts_with_group_name("Carol: hello"));
        assert!(!names.starts_with_group_name("Carol hello"));
        assert!(!names.starts_with_group_name("Caroline: hello"));
        assert!(!names.starts_with_group_name("hello"));
    }
}
