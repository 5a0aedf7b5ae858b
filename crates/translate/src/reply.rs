//! Normalizes non-streaming provider replies into the chat completion shape.
//!
//! Every provider reply is reduced to
//! `{choices:[{index, message:{role, content}, finish_reason}], usage?}`.

use promptrelay_types::{RelayError, Result};
use serde_json::{Value, json};

/// Which reply layout a provider returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Already OpenAI-compatible.
    OpenAi,
    Claude,
    MakerSuite,
    Cohere,
    Ollama,
    /// OpenAI-compatible text completion (`choices[].text`).
    TextCompletion,
}

/// Reshapes `reply` according to `shape`.
///
/// `include_thoughts` keeps MakerSuite reasoning parts in the text.
///
/// # Errors
///
/// Returns [`RelayError::MalformedResponse`] when the reply text cannot be
/// found where the provider puts it.
pub fn normalize_reply(shape: ReplyShape, reply: Value, include_thoughts: bool) -> Result<Value> {
    match shape {
        ReplyShape::OpenAi | ReplyShape::TextCompletion => Ok(reply),
        ReplyShape::Claude => from_claude(&reply),
        ReplyShape::MakerSuite => from_makersuite(&reply, include_thoughts),
        ReplyShape::Cohere => from_cohere(&reply),
        ReplyShape::Ollama => from_ollama(&reply),
    }
}

fn envelope(content: &str, finish_reason: &str, usage: Option<(u64, u64)>) -> Value {
    let mut out = json!({
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason
        }]
    });
    if let Some((prompt_tokens, completion_tokens)) = usage {
        out["usage"] = json!({
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        });
    }
    out
}

fn usage_at(reply: &Value, prompt: &str, completion: &str) -> Option<(u64, u64)> {
    let prompt = reply.pointer(prompt).and_then(Value::as_u64)?;
    let completion = reply.pointer(completion).and_then(Value::as_u64).unwrap_or(0);
    Some((prompt, completion))
}

fn from_claude(reply: &Value) -> Result<Value> {
    let text = reply
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::MalformedResponse("claude reply has no text block".into()))?;

    let finish_reason = match reply.get("stop_reason").and_then(Value::as_str) {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        _ => "stop",
    };
    let usage = usage_at(reply, "/usage/input_tokens", "/usage/output_tokens");
    Ok(envelope(text, finish_reason, usage))
}

fn from_makersuite(reply: &Value, include_thoughts: bool) -> Result<Value> {
    let Some(candidate) = reply.pointer("/candidates/0") else {
        let reason = reply
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(RelayError::MalformedResponse(format!(
            "makersuite reply has no candidate: {reason}"
        )));
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let text = parts
        .iter()
        .filter(|p| include_thoughts || !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n");

    let finish_reason = match candidate.get("finishReason").and_then(Value::as_str) {
        Some("MAX_TOKENS") => "length",
        Some("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT") => "content_filter",
        _ => "stop",
    };
    let usage = usage_at(
        reply,
        "/usageMetadata/promptTokenCount",
        "/usageMetadata/candidatesTokenCount",
    );
    Ok(envelope(&text, finish_reason, usage))
}

fn from_cohere(reply: &Value) -> Result<Value> {
    let blocks = reply
        .pointer("/message/content")
        .and_then(Value::as_array)
        .ok_or_else(|| RelayError::MalformedResponse("cohere reply has no message content".into()))?;
    let text: String = blocks
        .iter()
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();

    let finish_reason = match reply.get("finish_reason").and_then(Value::as_str) {
        Some("MAX_TOKENS") => "length",
        Some("TOOL_CALL") => "tool_calls",
        _ => "stop",
    };
    let usage = usage_at(reply, "/usage/tokens/input_tokens", "/usage/tokens/output_tokens");
    Ok(envelope(&text, finish_reason, usage))
}

fn from_ollama(reply: &Value) -> Result<Value> {
    let text = reply
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::MalformedResponse("ollama reply has no response".into()))?;
    let finish_reason = match reply.get("done_reason").and_then(Value::as_str) {
        Some("length") => "length",
        _ => "stop",
    };
    let usage = usage_at(reply, "/prompt_eval_count", "/eval_count");
    Ok(envelope(text, finish_reason, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(out: &Value) -> &str {
        out["choices"][0]["message"]["content"].as_str().unwrap()
    }

    #[test]
    fn test_openai_passthrough() {
        let reply = json!({"choices": [{"message": {"content": "hi"}}], "id": "x"});
        let out = normalize_reply(ReplyShape::OpenAi, reply.clone(), false).unwrap();
        assert_eq!(out, reply);
    }

    #[test]
    fn test_claude_first_text_block() {
        let reply = json!({
            "content": [
                {"type": "tool_use", "id": "t", "name": "f", "input": {}},
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": "ignored"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let out = normalize_reply(ReplyShape::Claude, reply, false).unwrap();
        assert_eq!(content(&out), "Hello");
        assert_eq!(out["choices"][0]["finish_reason"], "length");
        assert_eq!(out["usage"]["total_tokens"], 15);
    }

    #[test]
    fn test_claude_without_text_is_malformed() {
        let err = normalize_reply(ReplyShape::Claude, json!({"content": []}), false).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));
    }

    #[test]
    fn test_makersuite_skips_thoughts_by_default() {
        let reply = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "pondering", "thought": true},
                    {"text": "Answer"},
                    {"text": "more"}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 4}
        });
        let out = normalize_reply(ReplyShape::MakerSuite, reply.clone(), false).unwrap();
        assert_eq!(content(&out), "Answer\n\nmore");
        assert_eq!(out["usage"]["prompt_tokens"], 8);

        let out = normalize_reply(ReplyShape::MakerSuite, reply, true).unwrap();
        assert_eq!(content(&out), "pondering\n\nAnswer\n\nmore");
    }

    #[test]
    fn test_makersuite_blocked_prompt() {
        let reply = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = normalize_reply(ReplyShape::MakerSuite, reply, false).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_cohere_text_blocks() {
        let reply = json!({
            "message": {"role": "assistant", "content": [{"type": "text", "text": "Hi"}]},
            "finish_reason": "COMPLETE"
        });
        let out = normalize_reply(ReplyShape::Cohere, reply, false).unwrap();
        assert_eq!(content(&out), "Hi");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert!(out.get("usage").is_none());
    }

    #[test]
    fn test_ollama_response() {
        let reply = json!({"response": "Once", "done_reason": "length", "prompt_eval_count": 3, "eval_count": 1});
        let out = normalize_reply(ReplyShape::Ollama, reply, false).unwrap();
        assert_eq!(content(&out), "Once");
        assert_eq!(out["choices"][0]["finish_reason"], "length");
        assert_eq!(out["usage"]["total_tokens"], 4);
    }

    #[test]
    fn test_ollama_missing_response() {
        let err = normalize_reply(ReplyShape::Ollama, json!({"done": true}), false).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));
    }
}
