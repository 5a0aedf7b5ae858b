//! Caching-at-depth annotation for Claude-family prompts.
//!
//! Provider-side prompt caching is keyed to a fixed number of role
//! alternations from the end of the prompt. One walker serves every message
//! shape; [`CacheAnchor`] adapts how a single message gets marked.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The `cache_control` marker attached to a content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

impl CacheControl {
    /// An `ephemeral` marker with an optional TTL such as `"5m"` or `"1h"`.
    #[must_use]
    pub fn ephemeral(ttl: Option<String>) -> Self {
        Self {
            kind: "ephemeral".to_string(),
            ttl: ttl.filter(|t| !t.is_empty()),
        }
    }

    fn to_json(&self) -> Value {
        match &self.ttl {
            Some(ttl) => json!({"type": self.kind, "ttl": ttl}),
            None => json!({"type": self.kind}),
        }
    }
}

/// A message the depth walker can inspect and mark.
pub trait CacheAnchor {
    /// Role tag used to detect alternations.
    fn role(&self) -> &str;
    /// Marks the last content part of the message as cacheable.
    fn mark_cacheable(&mut self, control: &CacheControl);
}

/// Marks the messages sitting `depth` and `depth + 2` role switches from the
/// end of the prompt.
///
/// Trailing assistant turns (a prefill) are skipped before counting starts.
/// The walk stops once `depth + 2` has been marked.
pub fn cache_at_depth<M: CacheAnchor>(messages: &mut [M], depth: usize, control: &CacheControl) {
    let mut passed_prefill = false;
    let mut current = 0usize;
    let mut previous_role: Option<String> = None;

    for msg in messages.iter_mut().rev() {
        if !passed_prefill && msg.role() == "assistant" {
            continue;
        }
        passed_prefill = true;

        if previous_role.as_deref() == Some(msg.role()) {
            continue;
        }
        if current == depth || current == depth + 2 {
            msg.mark_cacheable(control);
        }
        if current == depth + 2 {
            break;
        }
        current += 1;
        previous_role = Some(msg.role().to_string());
    }
}

/// OpenAI-shaped JSON messages (OpenRouter). String content is promoted to a
/// one-element text array before marking.
impl CacheAnchor for Value {
    fn role(&self) -> &str {
        self.get("role").and_then(Value::as_str).unwrap_or_default()
    }

    fn mark_cacheable(&mut self, control: &CacheControl) {
        let Some(content) = self.get_mut("content") else {
            return;
        };
        if let Some(text) = content.as_str().map(String::from) {
            *content = json!([{"type": "text", "text": text}]);
        }
        if let Some(last) = content.as_array_mut().and_then(|parts| parts.last_mut())
            && let Some(obj) = last.as_object_mut()
        {
            obj.insert("cache_control".into(), control.to_json());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(roles: &[&str]) -> Vec<Value> {
        roles
            .iter()
            .enumerate()
            .map(|(i, r)| json!({"role": r, "content": format!("m{i}")}))
            .collect()
    }

    fn marked(messages: &[Value]) -> Vec<usize> {
        messages
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                m["content"]
                    .as_array()
                    .and_then(|parts| parts.last())
                    .is_some_and(|p| p.get("cache_control").is_some())
            })
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_depth_zero_marks_depth_zero_and_two() {
        let mut msgs = conversation(&["user", "assistant", "user", "assistant", "user"]);
        cache_at_depth(&mut msgs, 0, &CacheControl::ephemeral(None));
        assert_eq!(marked(&msgs), vec![2, 4]);
        assert!(msgs[0]["content"].is_string());
        assert!(msgs[1]["content"].is_string());
        assert!(msgs[3]["content"].is_string());
    }

    #[test]
    fn test_trailing_assistant_prefill_skipped() {
        let mut msgs = conversation(&["user", "assistant", "user", "assistant"]);
        cache_at_depth(&mut msgs, 0, &CacheControl::ephemeral(None));
        assert_eq!(marked(&msgs), vec![0, 2]);
    }

    #[test]
    fn test_depth_one() {
        let mut msgs = conversation(&["system", "user", "assistant", "user", "assistant", "user"]);
        cache_at_depth(&mut msgs, 1, &CacheControl::ephemeral(None));
        assert_eq!(marked(&msgs), vec![2, 4]);
    }

    #[test]
    fn test_same_role_run_counts_once() {
        let mut msgs = conversation(&["user", "user", "assistant", "user", "user"]);
        cache_at_depth(&mut msgs, 0, &CacheControl::ephemeral(None));
        // the newest message of each run is the one marked
        assert_eq!(marked(&msgs), vec![1, 4]);
    }

    #[test]
    fn test_ttl_serialized() {
        let mut msgs = conversation(&["user"]);
        cache_at_depth(&mut msgs, 0, &CacheControl::ephemeral(Some("1h".into())));
        assert_eq!(
            msgs[0]["content"][0]["cache_control"],
            json!({"type": "ephemeral", "ttl": "1h"})
        );
    }

    #[test]
    fn test_array_content_marks_last_part() {
        let mut msgs = vec![json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "a"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA"}}
            ]
        })];
        cache_at_depth(&mut msgs, 0, &CacheControl::ephemeral(None));
        assert!(msgs[0]["content"][0].get("cache_control").is_none());
        assert_eq!(
            msgs[0]["content"][1]["cache_control"],
            json!({"type": "ephemeral"})
        );
    }

    #[test]
    fn test_depth_beyond_prompt_marks_nothing() {
        let mut msgs = conversation(&["user", "assistant", "user"]);
        cache_at_depth(&mut msgs, 5, &CacheControl::ephemeral(None));
        assert!(marked(&msgs).is_empty());
    }
}
